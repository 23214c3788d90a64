//! Structured, parent-scoped identifiers.
//!
//! Every identifier records its lineage: a `SessionId` knows the connection
//! it belongs to, a `ProducerId` knows its session, and a `MessageId` knows
//! the producer that sent it. The textual form joins that lineage with `:`
//! so an id seen in a log line or a `message-id` header can be traced back
//! to the connection that minted it.
//!
//! Sequence numbers are handed out by the scope objects (`ConnectionScope`,
//! `SessionScope`, `ProducerScope`). Each scope owns plain atomic counters,
//! so concurrent producers on one session never see duplicate or skipped
//! values and no global lock is involved.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::command::DataStructureType;

/// Error returned when an identifier cannot be parsed from its textual form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("invalid {kind} '{value}'")]
    Invalid { kind: &'static str, value: String },
}

/// Monotonic counter used to allocate sequence values within one scope.
///
/// The first value returned by `next` is `1`.
#[derive(Debug)]
pub struct Sequence {
    next: AtomicI64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a sequence whose first `next()` returns `first`.
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// Allocate the next value. Each value is returned exactly once.
    pub fn next(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The value the next call to `next` will return.
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Root identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    value: String,
}

impl ConnectionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub const fn data_structure_type(&self) -> DataStructureType {
        DataStructureType::ConnectionId
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Identifier of a session: the owning connection plus a sequence value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    connection_id: ConnectionId,
    value: i64,
}

impl SessionId {
    pub fn new(connection_id: &ConnectionId, value: i64) -> Self {
        Self {
            connection_id: connection_id.clone(),
            value,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub const fn data_structure_type(&self) -> DataStructureType {
        DataStructureType::SessionId
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection_id, self.value)
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (root, values) = split_lineage(s, 1, "session id")?;
        Ok(SessionId::new(&ConnectionId::new(root), values[0]))
    }
}

/// Identifier of a message producer within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId {
    session_id: SessionId,
    value: i64,
}

impl ProducerId {
    pub fn new(session_id: &SessionId, value: i64) -> Self {
        Self {
            session_id: session_id.clone(),
            value,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn connection_id(&self) -> &ConnectionId {
        self.session_id.connection_id()
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub const fn data_structure_type(&self) -> DataStructureType {
        DataStructureType::ProducerId
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session_id, self.value)
    }
}

impl FromStr for ProducerId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (root, values) = split_lineage(s, 2, "producer id")?;
        let session = SessionId::new(&ConnectionId::new(root), values[0]);
        Ok(ProducerId::new(&session, values[1]))
    }
}

/// Identifier of a message consumer within a session.
///
/// The textual form doubles as the STOMP subscription id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId {
    session_id: SessionId,
    value: i64,
}

impl ConsumerId {
    pub fn new(session_id: &SessionId, value: i64) -> Self {
        Self {
            session_id: session_id.clone(),
            value,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn connection_id(&self) -> &ConnectionId {
        self.session_id.connection_id()
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub const fn data_structure_type(&self) -> DataStructureType {
        DataStructureType::ConsumerId
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session_id, self.value)
    }
}

impl FromStr for ConsumerId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (root, values) = split_lineage(s, 2, "consumer id")?;
        let session = SessionId::new(&ConnectionId::new(root), values[0]);
        Ok(ConsumerId::new(&session, values[1]))
    }
}

/// Identifier of a single message.
///
/// The broker may revise a message id after accepting it; the revision is
/// kept in `broker_sequence_id` and does not alter the lineage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    producer_id: ProducerId,
    producer_sequence_id: i64,
    broker_sequence_id: i64,
}

impl MessageId {
    pub fn new(producer_id: &ProducerId, producer_sequence_id: i64) -> Self {
        Self {
            producer_id: producer_id.clone(),
            producer_sequence_id,
            broker_sequence_id: 0,
        }
    }

    pub fn producer_id(&self) -> &ProducerId {
        &self.producer_id
    }

    pub fn connection_id(&self) -> &ConnectionId {
        self.producer_id.connection_id()
    }

    pub fn producer_sequence_id(&self) -> i64 {
        self.producer_sequence_id
    }

    pub fn broker_sequence_id(&self) -> i64 {
        self.broker_sequence_id
    }

    /// Record the broker's revision of this id.
    pub fn set_broker_sequence_id(&mut self, value: i64) {
        self.broker_sequence_id = value;
    }

    pub const fn data_structure_type(&self) -> DataStructureType {
        DataStructureType::MessageId
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.producer_id, self.producer_sequence_id)
    }
}

impl FromStr for MessageId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (root, values) = split_lineage(s, 3, "message id")?;
        let session = SessionId::new(&ConnectionId::new(root), values[0]);
        let producer = ProducerId::new(&session, values[1]);
        Ok(MessageId::new(&producer, values[2]))
    }
}

/// Identifier of a local (connection-scoped) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId {
    connection_id: ConnectionId,
    value: i64,
}

impl TransactionId {
    pub fn new(connection_id: &ConnectionId, value: i64) -> Self {
        Self {
            connection_id: connection_id.clone(),
            value,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub const fn data_structure_type(&self) -> DataStructureType {
        DataStructureType::LocalTransactionId
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TX:{}:{}", self.connection_id, self.value)
    }
}

impl FromStr for TransactionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("TX:").ok_or_else(|| ParseIdError::Invalid {
            kind: "transaction id",
            value: s.to_string(),
        })?;
        let (root, values) = split_lineage(rest, 1, "transaction id")?;
        Ok(TransactionId::new(&ConnectionId::new(root), values[0]))
    }
}

/// Split `s` into a connection-id root and `depth` trailing numeric parts.
///
/// Connection ids may themselves contain `:`, so the numeric parts are taken
/// from the right.
fn split_lineage(
    s: &str,
    depth: usize,
    kind: &'static str,
) -> Result<(String, Vec<i64>), ParseIdError> {
    let invalid = || ParseIdError::Invalid {
        kind,
        value: s.to_string(),
    };
    let mut parts: Vec<&str> = s.rsplitn(depth + 1, ':').collect();
    if parts.len() != depth + 1 {
        return Err(invalid());
    }
    let root = parts.pop().ok_or_else(invalid)?;
    if root.is_empty() {
        return Err(invalid());
    }
    let mut values = Vec::with_capacity(depth);
    for part in parts.into_iter().rev() {
        values.push(part.parse::<i64>().map_err(|_| invalid())?);
    }
    Ok((root.to_string(), values))
}

/// Generates root `ConnectionId`s that are unique within this process.
#[derive(Debug)]
pub struct ConnectionIdGenerator {
    prefix: String,
    sequence: Sequence,
}

impl ConnectionIdGenerator {
    /// A generator using the process-wide default prefix
    /// (`ID:<pid>-<start millis>`).
    pub fn new() -> Self {
        Self::with_prefix(default_prefix())
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: Sequence::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self) -> ConnectionId {
        ConnectionId::new(format!("{}-{}", self.prefix, self.sequence.next()))
    }
}

impl Default for ConnectionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn default_prefix() -> String {
    static PREFIX: OnceLock<String> = OnceLock::new();
    PREFIX
        .get_or_init(|| {
            let started = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            format!("ID:{}-{}", std::process::id(), started)
        })
        .clone()
}

/// Sequence allocation for everything a connection owns directly.
#[derive(Debug)]
pub struct ConnectionScope {
    id: ConnectionId,
    sessions: Sequence,
    transactions: Sequence,
    pub(crate) temporary_destinations: Sequence,
    commands: AtomicI32,
}

impl ConnectionScope {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            sessions: Sequence::new(),
            transactions: Sequence::new(),
            temporary_destinations: Sequence::new(),
            commands: AtomicI32::new(1),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn next_session_id(&self) -> SessionId {
        SessionId::new(&self.id, self.sessions.next())
    }

    pub fn next_transaction_id(&self) -> TransactionId {
        TransactionId::new(&self.id, self.transactions.next())
    }

    /// Allocate a command id for correlating responses on this connection.
    pub fn next_command_id(&self) -> i32 {
        self.commands.fetch_add(1, Ordering::SeqCst)
    }
}

/// Sequence allocation for producers and consumers of one session.
#[derive(Debug)]
pub struct SessionScope {
    id: SessionId,
    producers: Sequence,
    consumers: Sequence,
}

impl SessionScope {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            producers: Sequence::new(),
            consumers: Sequence::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn next_producer_id(&self) -> ProducerId {
        ProducerId::new(&self.id, self.producers.next())
    }

    pub fn next_consumer_id(&self) -> ConsumerId {
        ConsumerId::new(&self.id, self.consumers.next())
    }
}

/// Sequence allocation for the messages of one producer.
#[derive(Debug)]
pub struct ProducerScope {
    id: ProducerId,
    messages: Sequence,
}

impl ProducerScope {
    pub fn new(id: ProducerId) -> Self {
        Self {
            id,
            messages: Sequence::new(),
        }
    }

    pub fn id(&self) -> &ProducerId {
        &self.id
    }

    pub fn next_message_id(&self) -> MessageId {
        MessageId::new(&self.id, self.messages.next())
    }
}
