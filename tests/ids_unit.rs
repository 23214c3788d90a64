//! Unit tests for the identifier hierarchy and sequence scopes.

use iridium_stomp_core::{
    ConnectionId, ConnectionIdGenerator, ConnectionScope, ConsumerId, DataStructureType,
    MessageId, ProducerId, ProducerScope, Sequence, SessionId, SessionScope, TransactionId,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Lineage
// =============================================================================

#[test]
fn session_id_reports_connection_and_sequence() {
    let conn = ConnectionId::new("conn-1");
    let session = SessionId::new(&conn, 7);
    assert_eq!(session.connection_id().value(), "conn-1");
    assert_eq!(session.value(), 7);
    assert_eq!(session.to_string(), "conn-1:7");
}

#[test]
fn message_id_lineage_reaches_connection() {
    let session = SessionId::new(&ConnectionId::new("c"), 2);
    let producer = ProducerId::new(&session, 3);
    let id = MessageId::new(&producer, 4);
    assert_eq!(id.connection_id().value(), "c");
    assert_eq!(id.producer_id().session_id().value(), 2);
    assert_eq!(id.producer_id().value(), 3);
    assert_eq!(id.producer_sequence_id(), 4);
    assert_eq!(id.to_string(), "c:2:3:4");
}

#[test]
fn consumer_and_producer_with_same_numbers_share_text_but_not_type() {
    let session = SessionId::new(&ConnectionId::new("c"), 1);
    let producer = ProducerId::new(&session, 1);
    let consumer = ConsumerId::new(&session, 1);
    assert_eq!(producer.to_string(), consumer.to_string());
    assert_ne!(
        producer.data_structure_type(),
        consumer.data_structure_type()
    );
}

#[test]
fn transaction_id_display() {
    let tx = TransactionId::new(&ConnectionId::new("conn"), 9);
    assert_eq!(tx.to_string(), "TX:conn:9");
    assert_eq!(tx.data_structure_type(), DataStructureType::LocalTransactionId);
}

#[test]
fn ids_with_same_parent_order_by_sequence() {
    let conn = ConnectionId::new("conn");
    let a = SessionId::new(&conn, 1);
    let b = SessionId::new(&conn, 2);
    assert!(a < b);
    assert_ne!(a, b);
}

#[test]
fn broker_revision_does_not_change_lineage() {
    let producer = ProducerId::new(&SessionId::new(&ConnectionId::new("c"), 1), 1);
    let mut id = MessageId::new(&producer, 10);
    id.set_broker_sequence_id(555);
    assert_eq!(id.broker_sequence_id(), 555);
    assert_eq!(id.producer_id(), &producer);
    assert_eq!(id.to_string(), "c:1:1:10");
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn message_id_parses_with_colons_in_connection_id() {
    let id: MessageId = "ID:broker-5123-1700000000-0:1:3:2:17".parse().unwrap();
    assert_eq!(id.connection_id().value(), "ID:broker-5123-1700000000-0:1");
    assert_eq!(id.producer_id().session_id().value(), 3);
    assert_eq!(id.producer_id().value(), 2);
    assert_eq!(id.producer_sequence_id(), 17);
}

#[test]
fn consumer_id_parses() {
    let id: ConsumerId = "conn:4:9".parse().unwrap();
    assert_eq!(id.session_id().value(), 4);
    assert_eq!(id.value(), 9);
}

#[test]
fn transaction_id_requires_prefix() {
    let tx: TransactionId = "TX:conn:3".parse().unwrap();
    assert_eq!(tx.value(), 3);
    assert!("conn:3".parse::<TransactionId>().is_err());
}

#[test]
fn parse_rejects_garbage() {
    assert!("no-numbers".parse::<SessionId>().is_err());
    assert!("c:1:x".parse::<ProducerId>().is_err());
    assert!("".parse::<MessageId>().is_err());
}

#[test]
fn display_then_parse_recovers_equal_id() {
    let scope = ConnectionScope::new(ConnectionId::new("ID:host-1"));
    let session = SessionScope::new(scope.next_session_id());
    let producer = ProducerScope::new(session.next_producer_id());
    let id = producer.next_message_id();
    let parsed: MessageId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
}

// =============================================================================
// Sequences and scopes
// =============================================================================

#[test]
fn sequence_starts_at_one() {
    let seq = Sequence::new();
    assert_eq!(seq.next(), 1);
    assert_eq!(seq.next(), 2);
    assert_eq!(seq.peek(), 3);
}

#[test]
fn sequence_starting_at() {
    let seq = Sequence::starting_at(100);
    assert_eq!(seq.next(), 100);
}

#[test]
fn scopes_allocate_children_of_their_own_id() {
    let scope = ConnectionScope::new(ConnectionId::new("conn"));
    let s1 = scope.next_session_id();
    let s2 = scope.next_session_id();
    assert_eq!((s1.value(), s2.value()), (1, 2));

    let session = SessionScope::new(s2.clone());
    let p = session.next_producer_id();
    let c = session.next_consumer_id();
    assert_eq!(p.session_id(), &s2);
    assert_eq!(c.session_id(), &s2);
    assert_eq!(p.value(), 1);
    assert_eq!(c.value(), 1);
}

#[test]
fn connection_scope_command_ids_increase() {
    let scope = ConnectionScope::new(ConnectionId::new("conn"));
    assert_eq!(scope.next_command_id(), 1);
    assert_eq!(scope.next_command_id(), 2);
}

#[test]
fn concurrent_producers_get_unique_gapless_ids() {
    let session = Arc::new(SessionScope::new(SessionId::new(
        &ConnectionId::new("conn"),
        1,
    )));
    let threads = 8;
    let per_thread = 500;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let session = session.clone();
            thread::spawn(move || {
                (0..per_thread)
                    .map(|_| session.next_producer_id().value())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for h in handles {
        for v in h.join().unwrap() {
            assert!(seen.insert(v), "duplicate sequence value {}", v);
        }
    }
    let total = (threads * per_thread) as i64;
    assert_eq!(seen.len() as i64, total);
    assert!((1..=total).all(|v| seen.contains(&v)));
}

// =============================================================================
// Connection id generation
// =============================================================================

#[test]
fn generator_produces_distinct_ids() {
    let generator = ConnectionIdGenerator::with_prefix("ID:test");
    let a = generator.generate();
    let b = generator.generate();
    assert_eq!(a.value(), "ID:test-1");
    assert_eq!(b.value(), "ID:test-2");
}

#[test]
fn default_generator_uses_id_prefix() {
    let generator = ConnectionIdGenerator::new();
    assert!(generator.prefix().starts_with("ID:"));
    assert!(generator.generate().value().starts_with(generator.prefix()));
}
