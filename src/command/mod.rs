//! Typed protocol commands.
//!
//! A `Command` pairs the fields every command shares (command id and the
//! response-required flag) with a `CommandKind` payload. Each kind has a
//! fixed one-byte `DataStructureType` tag that marshalers key on, and
//! `Command::visit` dispatches to exactly one `CommandVisitor` method.
//!
//! All payload types own their identifiers, so `clone()` never leaves two
//! commands sharing an id.

mod info;
mod message;
mod response;

pub use info::{
    AckMode, ConnectionInfo, ConsumerInfo, KeepAliveInfo, ProducerInfo, RemoveInfo,
    RemovedObject, SessionInfo, ShutdownInfo, TransactionInfo, TransactionType,
};
pub use message::{AckType, Message, MessageAck, MessageDispatch, RESERVED_PROPERTY_PREFIX};
pub use response::{BrokerError, ConnectionError, ExceptionResponse, Response};

use thiserror::Error;

use crate::properties::PropertyError;

/// Errors raised by command operations and visitors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("message body is read-only")]
    ReadOnlyBody,
    #[error("unknown data structure type {0}")]
    UnknownDataStructureType(u8),
    #[error("property error: {0}")]
    Property(#[from] PropertyError),
    #[error("command {0:?} is not supported here")]
    Unsupported(DataStructureType),
}

/// Stable one-byte tags for every marshalable structure.
///
/// The numeric values never change; codecs select their marshaler by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DataStructureType {
    ConnectionInfo = 3,
    SessionInfo = 4,
    ConsumerInfo = 5,
    ProducerInfo = 6,
    TransactionInfo = 7,
    KeepAliveInfo = 10,
    ShutdownInfo = 11,
    RemoveInfo = 12,
    ConnectionError = 16,
    MessageDispatch = 21,
    MessageAck = 22,
    Message = 23,
    Response = 30,
    ExceptionResponse = 31,
    Queue = 100,
    Topic = 101,
    TemporaryQueue = 102,
    TemporaryTopic = 103,
    MessageId = 110,
    LocalTransactionId = 111,
    ConnectionId = 120,
    SessionId = 121,
    ConsumerId = 122,
    ProducerId = 123,
}

impl DataStructureType {
    pub const ALL: [DataStructureType; 24] = [
        DataStructureType::ConnectionInfo,
        DataStructureType::SessionInfo,
        DataStructureType::ConsumerInfo,
        DataStructureType::ProducerInfo,
        DataStructureType::TransactionInfo,
        DataStructureType::KeepAliveInfo,
        DataStructureType::ShutdownInfo,
        DataStructureType::RemoveInfo,
        DataStructureType::ConnectionError,
        DataStructureType::MessageDispatch,
        DataStructureType::MessageAck,
        DataStructureType::Message,
        DataStructureType::Response,
        DataStructureType::ExceptionResponse,
        DataStructureType::Queue,
        DataStructureType::Topic,
        DataStructureType::TemporaryQueue,
        DataStructureType::TemporaryTopic,
        DataStructureType::MessageId,
        DataStructureType::LocalTransactionId,
        DataStructureType::ConnectionId,
        DataStructureType::SessionId,
        DataStructureType::ConsumerId,
        DataStructureType::ProducerId,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DataStructureType {
    type Error = CommandError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DataStructureType::ALL
            .into_iter()
            .find(|t| t.as_u8() == value)
            .ok_or(CommandError::UnknownDataStructureType(value))
    }
}

/// The payload of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    ConnectionInfo(ConnectionInfo),
    SessionInfo(SessionInfo),
    ProducerInfo(ProducerInfo),
    ConsumerInfo(ConsumerInfo),
    RemoveInfo(RemoveInfo),
    TransactionInfo(TransactionInfo),
    Message(Box<Message>),
    MessageDispatch(Box<MessageDispatch>),
    MessageAck(MessageAck),
    KeepAliveInfo(KeepAliveInfo),
    ShutdownInfo(ShutdownInfo),
    Response(Response),
    ExceptionResponse(ExceptionResponse),
    ConnectionError(ConnectionError),
}

macro_rules! command_kind_from {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for CommandKind {
                fn from(v: $ty) -> Self {
                    CommandKind::$ty(v.into())
                }
            }
        )*
    };
}

command_kind_from!(
    ConnectionInfo,
    SessionInfo,
    ProducerInfo,
    ConsumerInfo,
    RemoveInfo,
    TransactionInfo,
    Message,
    MessageDispatch,
    MessageAck,
    KeepAliveInfo,
    ShutdownInfo,
    Response,
    ExceptionResponse,
    ConnectionError,
);

/// One protocol command exchanged with the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Connection-scoped id used to correlate a `Response`.
    pub command_id: i32,
    /// Whether the sender expects a `Response` for this command.
    pub response_required: bool,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(kind: impl Into<CommandKind>) -> Self {
        Self {
            command_id: 0,
            response_required: false,
            kind: kind.into(),
        }
    }

    /// Set the command id (builder style).
    pub fn with_command_id(mut self, command_id: i32) -> Self {
        self.command_id = command_id;
        self
    }

    /// Mark the command as expecting a response (builder style).
    pub fn with_response_required(mut self, required: bool) -> Self {
        self.response_required = required;
        self
    }

    pub fn data_structure_type(&self) -> DataStructureType {
        match &self.kind {
            CommandKind::ConnectionInfo(_) => DataStructureType::ConnectionInfo,
            CommandKind::SessionInfo(_) => DataStructureType::SessionInfo,
            CommandKind::ProducerInfo(_) => DataStructureType::ProducerInfo,
            CommandKind::ConsumerInfo(_) => DataStructureType::ConsumerInfo,
            CommandKind::RemoveInfo(_) => DataStructureType::RemoveInfo,
            CommandKind::TransactionInfo(_) => DataStructureType::TransactionInfo,
            CommandKind::Message(_) => DataStructureType::Message,
            CommandKind::MessageDispatch(_) => DataStructureType::MessageDispatch,
            CommandKind::MessageAck(_) => DataStructureType::MessageAck,
            CommandKind::KeepAliveInfo(_) => DataStructureType::KeepAliveInfo,
            CommandKind::ShutdownInfo(_) => DataStructureType::ShutdownInfo,
            CommandKind::Response(_) => DataStructureType::Response,
            CommandKind::ExceptionResponse(_) => DataStructureType::ExceptionResponse,
            CommandKind::ConnectionError(_) => DataStructureType::ConnectionError,
        }
    }

    /// True for `Response` and `ExceptionResponse`.
    pub fn is_response(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::Response(_) | CommandKind::ExceptionResponse(_)
        )
    }

    pub fn as_message(&self) -> Option<&Message> {
        match &self.kind {
            CommandKind::Message(m) => Some(m.as_ref()),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut Message> {
        match &mut self.kind {
            CommandKind::Message(m) => Some(m.as_mut()),
            _ => None,
        }
    }

    /// Double dispatch: call the one visitor method matching this command's
    /// kind and return whatever response it produces.
    pub fn visit(&self, visitor: &mut dyn CommandVisitor) -> VisitResult {
        match &self.kind {
            CommandKind::ConnectionInfo(v) => visitor.process_connection_info(self, v),
            CommandKind::SessionInfo(v) => visitor.process_session_info(self, v),
            CommandKind::ProducerInfo(v) => visitor.process_producer_info(self, v),
            CommandKind::ConsumerInfo(v) => visitor.process_consumer_info(self, v),
            CommandKind::RemoveInfo(v) => visitor.process_remove_info(self, v),
            CommandKind::TransactionInfo(v) => visitor.process_transaction_info(self, v),
            CommandKind::Message(v) => visitor.process_message(self, v),
            CommandKind::MessageDispatch(v) => visitor.process_message_dispatch(self, v),
            CommandKind::MessageAck(v) => visitor.process_message_ack(self, v),
            CommandKind::KeepAliveInfo(v) => visitor.process_keep_alive_info(self, v),
            CommandKind::ShutdownInfo(v) => visitor.process_shutdown_info(self, v),
            CommandKind::Response(v) => visitor.process_response(self, v),
            CommandKind::ExceptionResponse(v) => visitor.process_exception_response(self, v),
            CommandKind::ConnectionError(v) => visitor.process_connection_error(self, v),
        }
    }
}

/// Result of visiting a command: an optional correlated response.
pub type VisitResult = Result<Option<Response>, CommandError>;

/// One handler per command kind.
///
/// Every method defaults to "no response", so a visitor implements only the
/// kinds it handles. The enclosing `Command` is passed alongside the payload
/// so handlers can correlate on `command_id`.
#[allow(unused_variables)]
pub trait CommandVisitor {
    fn process_connection_info(&mut self, command: &Command, info: &ConnectionInfo) -> VisitResult {
        Ok(None)
    }

    fn process_session_info(&mut self, command: &Command, info: &SessionInfo) -> VisitResult {
        Ok(None)
    }

    fn process_producer_info(&mut self, command: &Command, info: &ProducerInfo) -> VisitResult {
        Ok(None)
    }

    fn process_consumer_info(&mut self, command: &Command, info: &ConsumerInfo) -> VisitResult {
        Ok(None)
    }

    fn process_remove_info(&mut self, command: &Command, info: &RemoveInfo) -> VisitResult {
        Ok(None)
    }

    fn process_transaction_info(
        &mut self,
        command: &Command,
        info: &TransactionInfo,
    ) -> VisitResult {
        Ok(None)
    }

    fn process_message(&mut self, command: &Command, message: &Message) -> VisitResult {
        Ok(None)
    }

    fn process_message_dispatch(
        &mut self,
        command: &Command,
        dispatch: &MessageDispatch,
    ) -> VisitResult {
        Ok(None)
    }

    fn process_message_ack(&mut self, command: &Command, ack: &MessageAck) -> VisitResult {
        Ok(None)
    }

    fn process_keep_alive_info(&mut self, command: &Command, info: &KeepAliveInfo) -> VisitResult {
        Ok(None)
    }

    fn process_shutdown_info(&mut self, command: &Command, info: &ShutdownInfo) -> VisitResult {
        Ok(None)
    }

    fn process_response(&mut self, command: &Command, response: &Response) -> VisitResult {
        Ok(None)
    }

    fn process_exception_response(
        &mut self,
        command: &Command,
        response: &ExceptionResponse,
    ) -> VisitResult {
        Ok(None)
    }

    fn process_connection_error(
        &mut self,
        command: &Command,
        error: &ConnectionError,
    ) -> VisitResult {
        Ok(None)
    }
}
