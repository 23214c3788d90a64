//! Unit tests for the command model: tags, visitation, cloning and the
//! message send lock.

use iridium_stomp_core::{
    AckType, BrokerError, Command, CommandError, CommandKind, CommandVisitor, ConnectionError,
    ConnectionId, ConnectionInfo, ConsumerId, ConsumerInfo, DataStructureType, Destination,
    ExceptionResponse, KeepAliveInfo, Message, MessageAck, MessageDispatch, MessageId,
    ProducerId, ProducerInfo, PropertyError, PropertyValue, RemoveInfo, RemovedObject, Response,
    SessionId, SessionInfo, ShutdownInfo, TransactionId, TransactionInfo, TransactionType,
    VisitResult,
};

fn producer() -> ProducerId {
    ProducerId::new(&SessionId::new(&ConnectionId::new("conn"), 1), 1)
}

fn consumer() -> ConsumerId {
    ConsumerId::new(&SessionId::new(&ConnectionId::new("conn"), 1), 1)
}

fn one_of_each() -> Vec<Command> {
    let conn = ConnectionId::new("conn");
    let info = ConnectionInfo::new(conn.clone());
    let tx = TransactionId::new(&conn, 1);
    let msg_id = MessageId::new(&producer(), 1);
    vec![
        Command::new(info.clone()),
        Command::new(SessionInfo::new(&info, 1)),
        Command::new(ProducerInfo::new(producer())),
        Command::new(ConsumerInfo::new(consumer(), Destination::queue("q"))),
        Command::new(RemoveInfo::new(RemovedObject::Consumer(consumer()))),
        Command::new(TransactionInfo::new(tx, TransactionType::Begin)),
        Command::new(Message::text("hi")),
        Command::new(MessageDispatch::new(consumer(), Message::new())),
        Command::new(MessageAck::new(AckType::Consumed, consumer(), msg_id)),
        Command::new(KeepAliveInfo),
        Command::new(ShutdownInfo),
        Command::new(Response::new(1)),
        Command::new(ExceptionResponse::new(1, BrokerError::new("bad"))),
        Command::new(ConnectionError::new(None, BrokerError::new("gone"))),
    ]
}

// =============================================================================
// Tags
// =============================================================================

#[test]
fn every_kind_has_a_distinct_tag() {
    let tags: Vec<u8> = one_of_each()
        .iter()
        .map(|c| c.data_structure_type().as_u8())
        .collect();
    let mut unique = tags.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), tags.len());
}

#[test]
fn tags_are_stable() {
    assert_eq!(DataStructureType::ConnectionInfo.as_u8(), 3);
    assert_eq!(DataStructureType::SessionInfo.as_u8(), 4);
    assert_eq!(DataStructureType::ConsumerInfo.as_u8(), 5);
    assert_eq!(DataStructureType::ProducerInfo.as_u8(), 6);
    assert_eq!(DataStructureType::Message.as_u8(), 23);
    assert_eq!(DataStructureType::Response.as_u8(), 30);
    assert_eq!(DataStructureType::ExceptionResponse.as_u8(), 31);
}

#[test]
fn unknown_tag_is_an_error() {
    assert_eq!(
        DataStructureType::try_from(250),
        Err(CommandError::UnknownDataStructureType(250))
    );
}

// =============================================================================
// Visitation
// =============================================================================

/// Records which handler ran and answers sessions with a response.
#[derive(Default)]
struct Recorder {
    calls: Vec<&'static str>,
}

impl CommandVisitor for Recorder {
    fn process_connection_info(&mut self, _: &Command, _: &ConnectionInfo) -> VisitResult {
        self.calls.push("connection");
        Ok(None)
    }

    fn process_session_info(&mut self, command: &Command, _: &SessionInfo) -> VisitResult {
        self.calls.push("session");
        Ok(Some(Response::new(command.command_id)))
    }

    fn process_message(&mut self, _: &Command, _: &Message) -> VisitResult {
        self.calls.push("message");
        Ok(None)
    }

    fn process_shutdown_info(&mut self, _: &Command, _: &ShutdownInfo) -> VisitResult {
        Err(CommandError::Unsupported(DataStructureType::ShutdownInfo))
    }
}

#[test]
fn visit_calls_exactly_one_handler() {
    let mut recorder = Recorder::default();
    let info = ConnectionInfo::new(ConnectionId::new("conn"));
    Command::new(info).visit(&mut recorder).unwrap();
    Command::new(Message::text("x")).visit(&mut recorder).unwrap();
    assert_eq!(recorder.calls, vec!["connection", "message"]);
}

#[test]
fn visit_returns_correlated_response() {
    let mut recorder = Recorder::default();
    let info = ConnectionInfo::new(ConnectionId::new("conn"));
    let cmd = Command::new(SessionInfo::new(&info, 3))
        .with_command_id(42)
        .with_response_required(true);
    let response = cmd.visit(&mut recorder).unwrap();
    assert_eq!(response, Some(Response::new(42)));
}

#[test]
fn unhandled_kinds_default_to_no_response() {
    let mut recorder = Recorder::default();
    for cmd in one_of_each() {
        if matches!(cmd.kind, CommandKind::ShutdownInfo(_) | CommandKind::SessionInfo(_)) {
            continue;
        }
        assert_eq!(cmd.visit(&mut recorder), Ok(None));
    }
}

#[test]
fn visitor_errors_propagate() {
    let mut recorder = Recorder::default();
    assert_eq!(
        Command::new(ShutdownInfo).visit(&mut recorder),
        Err(CommandError::Unsupported(DataStructureType::ShutdownInfo))
    );
}

// =============================================================================
// Construction and cloning
// =============================================================================

#[test]
fn session_info_from_connection_info() {
    let info = ConnectionInfo::new(ConnectionId::new("conn-1"));
    let session = SessionInfo::new(&info, 7);
    assert_eq!(session.session_id.connection_id().value(), "conn-1");
    assert_eq!(session.session_id.value(), 7);
}

#[test]
fn cloned_message_owns_its_message_id() {
    let mut original = Message::text("body");
    original.message_id = Some(MessageId::new(&producer(), 1));

    let mut clone = original.clone();
    clone
        .message_id
        .as_mut()
        .unwrap()
        .set_broker_sequence_id(99);
    clone.message_id = Some(MessageId::new(&producer(), 2));

    let id = original.message_id.as_ref().unwrap();
    assert_eq!(id.producer_sequence_id(), 1);
    assert_eq!(id.broker_sequence_id(), 0);
}

#[test]
fn cloned_command_is_independent() {
    let mut msg = Message::text("a");
    msg.producer_id = Some(producer());
    let original = Command::new(msg).with_command_id(5);
    let mut copy = original.clone();
    copy.command_id = 6;
    copy.as_message_mut().unwrap().producer_id = None;

    assert_eq!(original.command_id, 5);
    assert_eq!(original.as_message().unwrap().producer_id, Some(producer()));
}

#[test]
fn transaction_info_takes_connection_from_transaction() {
    let conn = ConnectionId::new("conn");
    let info = TransactionInfo::new(TransactionId::new(&conn, 2), TransactionType::Commit);
    assert_eq!(info.connection_id, conn);
}

#[test]
fn dispatch_copies_destination_and_counter_from_message() {
    let mut msg = Message::new();
    msg.destination = Some(Destination::queue("q"));
    msg.increment_redelivery_counter();
    let dispatch = MessageDispatch::new(consumer(), msg);
    assert_eq!(dispatch.destination, Some(Destination::queue("q")));
    assert_eq!(dispatch.redelivery_counter, 1);
}

#[test]
fn is_response_matches_response_kinds() {
    assert!(Command::new(Response::new(1)).is_response());
    assert!(Command::new(ExceptionResponse::new(1, BrokerError::new("x"))).is_response());
    assert!(!Command::new(KeepAliveInfo).is_response());
}

// =============================================================================
// Message state
// =============================================================================

#[test]
fn properties_stay_writable_after_send() {
    let mut msg = Message::text("payload");
    msg.on_send();
    assert!(msg.is_read_only_body());
    assert!(msg.is_read_only_properties());

    msg.set_property("custom", 42).unwrap();
    assert_eq!(msg.get_property("custom"), Some(PropertyValue::Int(42)));

    assert_eq!(msg.set_content("other"), Err(CommandError::ReadOnlyBody));
    assert_eq!(msg.content_str(), Some("payload"));
}

#[test]
fn clear_body_unlocks_content() {
    let mut msg = Message::text("payload");
    msg.on_send();
    msg.clear_body();
    assert!(msg.content().is_empty());
    msg.set_content(b"new".to_vec()).unwrap();
    assert_eq!(msg.content().to_vec(), b"new".to_vec());
}

#[test]
fn redelivery_counter_only_increments() {
    let mut msg = Message::new();
    assert_eq!(msg.redelivery_counter(), 0);
    msg.increment_redelivery_counter();
    msg.increment_redelivery_counter();
    assert_eq!(msg.redelivery_counter(), 2);
}

#[test]
fn expiration_zero_never_expires() {
    let msg = Message::new();
    assert!(!msg.is_expired_at(i64::MAX));
    assert!(!msg.is_expired());
}

#[test]
fn expiration_in_the_past() {
    let mut msg = Message::new();
    msg.expiration = 1_000;
    assert!(msg.is_expired_at(1_001));
    assert!(!msg.is_expired_at(1_000));
    assert!(msg.is_expired());
}

#[test]
fn default_priority_is_four() {
    assert_eq!(Message::new().priority, 4);
    assert_eq!(Message::text("x").priority, 4);
}

// =============================================================================
// Native property resolution
// =============================================================================

#[test]
fn group_id_property_writes_native_field() {
    let mut msg = Message::new();
    msg.set_property("JMSXGroupID", "group-a").unwrap();
    assert_eq!(msg.group_id.as_deref(), Some("group-a"));
    assert!(!msg.properties().contains("JMSXGroupID"));
    assert_eq!(
        msg.get_property("JMSXGroupID"),
        Some(PropertyValue::String("group-a".into()))
    );
}

#[test]
fn group_seq_accepts_any_integer_width() {
    let mut msg = Message::new();
    msg.set_property("JMSXGroupSeq", 3i64).unwrap();
    assert_eq!(msg.group_sequence, 3);
    assert!(msg.set_property("JMSXGroupSeq", "three").is_err());
}

#[test]
fn delivery_count_rejects_writes() {
    let mut msg = Message::new();
    assert_eq!(
        msg.set_property("JMSXDeliveryCount", 100),
        Err(CommandError::Property(PropertyError::ReadOnly(
            "JMSXDeliveryCount".into()
        )))
    );
    assert!(!msg.properties().contains("JMSXDeliveryCount"));
    assert_eq!(msg.get_property("JMSXDeliveryCount"), Some(PropertyValue::Int(1)));
    msg.increment_redelivery_counter();
    assert_eq!(msg.get_property("JMSXDeliveryCount"), Some(PropertyValue::Int(2)));
}

#[test]
fn unset_group_id_falls_back_to_map() {
    let msg = Message::new();
    assert_eq!(msg.get_property("JMSXGroupID"), None);
}

#[test]
fn marshalled_properties_round_trip_through_message() {
    let mut msg = Message::new();
    msg.set_property("a", true).unwrap();
    msg.set_property("b", "text").unwrap();
    let encoded = msg.marshalled_properties().unwrap();

    let mut other = Message::new();
    other.set_marshalled_properties(&encoded).unwrap();
    assert_eq!(other.properties(), msg.properties());
}

#[test]
fn corrupt_marshalled_properties_are_rejected() {
    let mut msg = Message::new();
    assert!(matches!(
        msg.set_marshalled_properties(&[0, 0, 0, 1]),
        Err(CommandError::Property(_))
    ));
}
