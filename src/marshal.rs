//! Translation between typed commands and STOMP frames.
//!
//! Outbound commands are marshaled by a function looked up by the command's
//! `DataStructureType` tag, so supporting a new kind means registering one
//! more function. Inbound frames are keyed by their STOMP command name.
//! Turning frames into bytes is the transport codec's job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;
use tracing::{debug, trace};

use crate::command::{
    AckType, BrokerError, Command, CommandKind, ConnectionError, DataStructureType,
    ExceptionResponse, Message, MessageDispatch, RemovedObject, Response, TransactionType,
};
use crate::destination::{Destination, DestinationError};
use crate::frame::Frame;
use crate::ids::{ConnectionId, ConsumerId, MessageId, ParseIdError};
use crate::properties::PropertyValue;

/// Errors produced while marshaling commands or unmarshaling frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarshalError {
    #[error("no marshaler registered for {0:?}")]
    NoMarshaler(DataStructureType),
    #[error("marshaler for {expected:?} received a {actual:?} command")]
    KindMismatch {
        expected: DataStructureType,
        actual: DataStructureType,
    },
    #[error("unsupported frame command '{0}'")]
    UnknownCommand(String),
    #[error("{command} frame is missing the '{header}' header")]
    MissingHeader {
        command: &'static str,
        header: &'static str,
    },
    #[error("invalid value '{value}' for header '{header}'")]
    InvalidHeader { header: &'static str, value: String },
    #[error("property '{0}' holds bytes, which a STOMP header cannot carry")]
    BinaryProperty(String),
    #[error(transparent)]
    Destination(#[from] DestinationError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}

/// Marshaling behaviour shared by every command on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalOptions {
    /// Add a `receipt` header to commands that require a response.
    pub request_receipts: bool,
    /// `activemq.prefetchSize` for consumers that do not set their own.
    pub prefetch_size: Option<u32>,
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self {
            request_receipts: true,
            prefetch_size: None,
        }
    }
}

impl MarshalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_receipts(mut self, request: bool) -> Self {
        self.request_receipts = request;
        self
    }

    pub fn prefetch_size(mut self, prefetch_size: u32) -> Self {
        self.prefetch_size = Some(prefetch_size);
        self
    }
}

/// Marshals one command kind. `Ok(None)` means the kind has no STOMP frame.
pub type MarshalFn = fn(&MarshalOptions, &Command) -> Result<Option<Frame>, MarshalError>;

/// Headers of a `MESSAGE` frame that map onto message fields rather than
/// generic properties.
const MESSAGE_HEADERS: [&str; 18] = [
    "destination",
    "message-id",
    "subscription",
    "ack",
    "correlation-id",
    "expires",
    "priority",
    "persistent",
    "reply-to",
    "timestamp",
    "type",
    "redelivered",
    "transaction",
    "content-length",
    "content-type",
    "JMSXGroupID",
    "JMSXGroupSeq",
    "JMSXDeliveryCount",
];

/// Per-connection translator between `Command`s and `Frame`s.
pub struct StompMarshaler {
    connection_id: ConnectionId,
    options: MarshalOptions,
    marshalers: HashMap<u8, MarshalFn>,
    /// Command id of the last `CONNECT`, answered by `CONNECTED`.
    connect_command_id: AtomicI32,
}

impl StompMarshaler {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self::with_options(connection_id, MarshalOptions::default())
    }

    pub fn with_options(connection_id: ConnectionId, options: MarshalOptions) -> Self {
        let mut marshaler = Self {
            connection_id,
            options,
            marshalers: HashMap::new(),
            connect_command_id: AtomicI32::new(0),
        };
        marshaler.register(DataStructureType::ConnectionInfo, marshal_connect);
        marshaler.register(DataStructureType::SessionInfo, no_frame);
        marshaler.register(DataStructureType::ProducerInfo, no_frame);
        marshaler.register(DataStructureType::ConsumerInfo, marshal_subscribe);
        marshaler.register(DataStructureType::RemoveInfo, marshal_remove);
        marshaler.register(DataStructureType::TransactionInfo, marshal_transaction);
        marshaler.register(DataStructureType::Message, marshal_send);
        marshaler.register(DataStructureType::MessageAck, marshal_ack);
        marshaler.register(DataStructureType::KeepAliveInfo, no_frame);
        marshaler.register(DataStructureType::ShutdownInfo, marshal_disconnect);
        marshaler
    }

    /// Install (or replace) the marshaler for `tag`, returning the previous one.
    pub fn register(&mut self, tag: DataStructureType, f: MarshalFn) -> Option<MarshalFn> {
        self.marshalers.insert(tag.as_u8(), f)
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn options(&self) -> &MarshalOptions {
        &self.options
    }

    /// Turn an outbound command into a frame.
    pub fn marshal(&self, command: &Command) -> Result<Option<Frame>, MarshalError> {
        let tag = command.data_structure_type();
        let f = self
            .marshalers
            .get(&tag.as_u8())
            .ok_or(MarshalError::NoMarshaler(tag))?;
        let is_connect = matches!(command.kind, CommandKind::ConnectionInfo(_));
        if is_connect {
            self.connect_command_id
                .store(command.command_id, Ordering::SeqCst);
        }
        let frame = f(&self.options, command)?.map(|frame| {
            // CONNECT is answered by CONNECTED, never by RECEIPT.
            if command.response_required && self.options.request_receipts && !is_connect {
                frame.receipt(command.command_id.to_string())
            } else {
                frame
            }
        });
        trace!(?tag, command_id = command.command_id, "marshaled command");
        Ok(frame)
    }

    /// Turn an inbound frame into a command.
    pub fn unmarshal(&self, frame: &Frame) -> Result<Command, MarshalError> {
        match frame.command.as_str() {
            "CONNECTED" => {
                let id = self.connect_command_id.load(Ordering::SeqCst);
                Ok(Command::new(Response::new(id)))
            }
            "RECEIPT" => {
                let id = receipt_id(frame)?.ok_or(MarshalError::MissingHeader {
                    command: "RECEIPT",
                    header: "receipt-id",
                })?;
                Ok(Command::new(Response::new(id)))
            }
            "ERROR" => self.unmarshal_error(frame),
            "MESSAGE" => self.unmarshal_message(frame),
            other => Err(MarshalError::UnknownCommand(other.to_string())),
        }
    }

    fn unmarshal_error(&self, frame: &Frame) -> Result<Command, MarshalError> {
        let error = BrokerError {
            message: frame
                .get_header("message")
                .unwrap_or("unknown error")
                .to_string(),
            details: (!frame.body.is_empty())
                .then(|| String::from_utf8_lossy(&frame.body).into_owned()),
        };
        let command = match receipt_id(frame)? {
            Some(id) => Command::new(ExceptionResponse::new(id, error)),
            None => Command::new(ConnectionError::new(Some(self.connection_id.clone()), error)),
        };
        Ok(command)
    }

    fn unmarshal_message(&self, frame: &Frame) -> Result<Command, MarshalError> {
        let consumer_id: ConsumerId = required(frame, "subscription")?.parse()?;
        let broker_message_id = required(frame, "message-id")?;
        let message_id = broker_message_id.parse::<MessageId>().ok();
        if message_id.is_none() {
            debug!(message_id = broker_message_id, "broker-assigned message id");
        }
        let owner = Some(&self.connection_id);
        let destination = Destination::from_stomp_str(required(frame, "destination")?, owner)?;

        let redelivery_counter = match parsed::<i32>(frame, "JMSXDeliveryCount")? {
            Some(count) => count.saturating_sub(1),
            None if frame.get_header("redelivered") == Some("true") => 1,
            None => 0,
        };

        let mut message =
            Message::bytes(frame.body.clone()).with_redelivery_counter(redelivery_counter);
        message.destination = Some(destination);
        message.message_id = message_id;
        message.broker_message_id = Some(broker_message_id.to_string());
        message.target_consumer_id = Some(consumer_id.clone());
        message.correlation_id = frame.get_header("correlation-id").map(str::to_string);
        message.message_type = frame.get_header("type").map(str::to_string);
        message.persistent = frame.get_header("persistent") == Some("true");
        message.expiration = parsed(frame, "expires")?.unwrap_or(0);
        message.timestamp = parsed(frame, "timestamp")?.unwrap_or(0);
        message.priority = parsed(frame, "priority")?.unwrap_or(4);
        message.group_id = frame.get_header("JMSXGroupID").map(str::to_string);
        message.group_sequence = parsed(frame, "JMSXGroupSeq")?.unwrap_or(0);
        message.reply_to = frame
            .get_header("reply-to")
            .map(|r| Destination::from_stomp_str(r, owner))
            .transpose()?;

        for (k, v) in &frame.headers {
            if MESSAGE_HEADERS.contains(&k.as_str()) || message.properties().contains(k) {
                continue;
            }
            message
                .set_property(k.clone(), v.as_str())
                .map_err(|_| MarshalError::InvalidHeader {
                    header: "property",
                    value: k.clone(),
                })?;
        }

        Ok(Command::new(MessageDispatch::new(consumer_id, message)))
    }
}

fn required<'a>(frame: &'a Frame, header: &'static str) -> Result<&'a str, MarshalError> {
    frame.get_header(header).ok_or(MarshalError::MissingHeader {
        command: "MESSAGE",
        header,
    })
}

fn parsed<T: std::str::FromStr>(
    frame: &Frame,
    header: &'static str,
) -> Result<Option<T>, MarshalError> {
    frame
        .parse_header::<T>(header)
        .map_err(|value| MarshalError::InvalidHeader { header, value })
}

fn receipt_id(frame: &Frame) -> Result<Option<i32>, MarshalError> {
    parsed(frame, "receipt-id")
}

fn mismatch(expected: DataStructureType, command: &Command) -> MarshalError {
    MarshalError::KindMismatch {
        expected,
        actual: command.data_structure_type(),
    }
}

fn no_frame(_: &MarshalOptions, _: &Command) -> Result<Option<Frame>, MarshalError> {
    Ok(None)
}

fn marshal_connect(_: &MarshalOptions, command: &Command) -> Result<Option<Frame>, MarshalError> {
    let CommandKind::ConnectionInfo(info) = &command.kind else {
        return Err(mismatch(DataStructureType::ConnectionInfo, command));
    };
    let frame = Frame::new("CONNECT")
        .header("accept-version", "1.1,1.2")
        .header("host", info.host.as_deref().unwrap_or("/"))
        .header_opt("login", info.user_name.as_deref())
        .header_opt("passcode", info.password.as_deref())
        .header_opt("client-id", info.client_id.as_deref());
    Ok(Some(frame))
}

fn marshal_subscribe(
    options: &MarshalOptions,
    command: &Command,
) -> Result<Option<Frame>, MarshalError> {
    let CommandKind::ConsumerInfo(info) = &command.kind else {
        return Err(mismatch(DataStructureType::ConsumerInfo, command));
    };
    let mut frame = Frame::new("SUBSCRIBE")
        .header("id", info.consumer_id.to_string())
        .header("destination", info.destination.to_stomp_string())
        .header("ack", info.ack_mode.as_str())
        .header_opt("selector", info.selector.as_deref())
        .header_opt(
            "activemq.prefetchSize",
            info.prefetch_size.or(options.prefetch_size),
        )
        .header_opt("activemq.subscriptionName", info.subscription_name.as_deref())
        .header("activemq.dispatchAsync", info.dispatch_async.to_string());
    if info.no_local {
        frame = frame.header("activemq.noLocal", "true");
    }
    Ok(Some(frame))
}

fn marshal_remove(_: &MarshalOptions, command: &Command) -> Result<Option<Frame>, MarshalError> {
    let CommandKind::RemoveInfo(info) = &command.kind else {
        return Err(mismatch(DataStructureType::RemoveInfo, command));
    };
    match &info.object_id {
        RemovedObject::Consumer(id) => Ok(Some(Frame::new("UNSUBSCRIBE").header("id", id.to_string()))),
        // Sessions and producers are client-side only; connections close
        // through ShutdownInfo.
        RemovedObject::Connection(_) | RemovedObject::Session(_) | RemovedObject::Producer(_) => {
            Ok(None)
        }
    }
}

fn marshal_transaction(
    _: &MarshalOptions,
    command: &Command,
) -> Result<Option<Frame>, MarshalError> {
    let CommandKind::TransactionInfo(info) = &command.kind else {
        return Err(mismatch(DataStructureType::TransactionInfo, command));
    };
    let name = match info.kind {
        TransactionType::Begin => "BEGIN",
        TransactionType::Commit => "COMMIT",
        TransactionType::Rollback => "ABORT",
    };
    Ok(Some(
        Frame::new(name).header("transaction", info.transaction_id.to_string()),
    ))
}

fn marshal_send(_: &MarshalOptions, command: &Command) -> Result<Option<Frame>, MarshalError> {
    let CommandKind::Message(message) = &command.kind else {
        return Err(mismatch(DataStructureType::Message, command));
    };
    let destination = message
        .destination
        .as_ref()
        .ok_or(MarshalError::MissingHeader {
            command: "SEND",
            header: "destination",
        })?;
    let mut frame = Frame::new("SEND")
        .header("destination", destination.to_stomp_string())
        .header_opt("correlation-id", message.correlation_id.as_deref())
        .header_opt(
            "reply-to",
            message.reply_to.as_ref().map(Destination::to_stomp_string),
        )
        .header_opt("type", message.message_type.as_deref())
        .header_opt("transaction", message.transaction_id.as_ref())
        .header("persistent", message.persistent.to_string())
        .header("priority", message.priority.to_string());
    if message.expiration != 0 {
        frame = frame.header("expires", message.expiration.to_string());
    }
    if message.timestamp != 0 {
        frame = frame.header("timestamp", message.timestamp.to_string());
    }
    if let Some(group) = &message.group_id {
        frame = frame
            .header("JMSXGroupID", group.as_str())
            .header("JMSXGroupSeq", message.group_sequence.to_string());
    }
    for (name, value) in message.properties().iter() {
        if matches!(value, PropertyValue::Bytes(_)) {
            return Err(MarshalError::BinaryProperty(name.to_string()));
        }
        frame = frame.header(name, value.to_string());
    }
    Ok(Some(frame.set_body(message.content().to_vec())))
}

fn marshal_ack(_: &MarshalOptions, command: &Command) -> Result<Option<Frame>, MarshalError> {
    let CommandKind::MessageAck(ack) = &command.kind else {
        return Err(mismatch(DataStructureType::MessageAck, command));
    };
    let name = match ack.ack_type {
        AckType::Consumed | AckType::Individual => "ACK",
        AckType::Poison => "NACK",
        // Delivery bookkeeping stays on the client.
        AckType::Delivered | AckType::Redelivered => return Ok(None),
    };
    let id = ack.ack_id().ok_or(MarshalError::MissingHeader {
        command: name,
        header: "id",
    })?;
    Ok(Some(
        Frame::new(name)
            .header("id", id)
            .header("subscription", ack.consumer_id.to_string())
            .header_opt("transaction", ack.transaction_id.as_ref()),
    ))
}

fn marshal_disconnect(
    _: &MarshalOptions,
    command: &Command,
) -> Result<Option<Frame>, MarshalError> {
    match command.kind {
        CommandKind::ShutdownInfo(_) => Ok(Some(Frame::new("DISCONNECT"))),
        _ => Err(mismatch(DataStructureType::ShutdownInfo, command)),
    }
}
