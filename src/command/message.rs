use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

use super::CommandError;
use crate::destination::Destination;
use crate::ids::{ConsumerId, MessageId, ProducerId, TransactionId};
use crate::properties::{PropertyError, PropertyMap, PropertyValue};

/// Prefix of property names that may resolve onto native message fields.
pub const RESERVED_PROPERTY_PREFIX: &str = "JMSX";

/// A message sent to, or delivered from, a destination.
///
/// Header fields are public. The body and the property map sit behind
/// accessors because of the send-time lock: once `on_send` has run, the body
/// rejects writes until `clear_body`. Properties stay writable regardless.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub producer_id: Option<ProducerId>,
    pub destination: Option<Destination>,
    pub transaction_id: Option<TransactionId>,
    pub message_id: Option<MessageId>,
    /// The `message-id` header exactly as the broker delivered it. Brokers
    /// that mint their own ids leave `message_id` unset.
    pub broker_message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub persistent: bool,
    /// Expiry as epoch milliseconds; `0` means the message never expires.
    pub expiration: i64,
    pub priority: u8,
    pub reply_to: Option<Destination>,
    /// Send time as epoch milliseconds.
    pub timestamp: i64,
    pub message_type: Option<String>,
    pub target_consumer_id: Option<ConsumerId>,
    pub group_id: Option<String>,
    pub group_sequence: i32,
    content: Bytes,
    properties: PropertyMap,
    redelivery_counter: i32,
    read_only_body: bool,
    read_only_properties: bool,
}

impl Message {
    pub fn new() -> Self {
        Self {
            priority: 4,
            ..Self::default()
        }
    }

    /// Build a message with a UTF-8 text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            content: Bytes::from(body.into()),
            ..Self::new()
        }
    }

    /// Build a message with a binary body.
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self {
            content: body.into(),
            ..Self::new()
        }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// The body as text, if it is valid UTF-8.
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Replace the body. Fails once the message has been sent.
    pub fn set_content(&mut self, content: impl Into<Bytes>) -> Result<(), CommandError> {
        if self.read_only_body {
            return Err(CommandError::ReadOnlyBody);
        }
        self.content = content.into();
        Ok(())
    }

    /// Empty the body and make it writable again.
    pub fn clear_body(&mut self) {
        self.content = Bytes::new();
        self.read_only_body = false;
    }

    /// Lock the body for sending. Runs once per send.
    pub fn on_send(&mut self) {
        self.read_only_body = true;
        self.read_only_properties = true;
    }

    pub fn is_read_only_body(&self) -> bool {
        self.read_only_body
    }

    /// Whether the message has passed through `on_send`. Property writes
    /// are accepted either way.
    pub fn is_read_only_properties(&self) -> bool {
        self.read_only_properties
    }

    pub fn redelivery_counter(&self) -> i32 {
        self.redelivery_counter
    }

    /// Record one more redelivery (a rollback or a negative acknowledgement).
    pub fn increment_redelivery_counter(&mut self) {
        self.redelivery_counter = self.redelivery_counter.saturating_add(1);
    }

    /// Seed the counter when a delivered message arrives already redelivered.
    pub(crate) fn with_redelivery_counter(mut self, counter: i32) -> Self {
        self.redelivery_counter = counter.max(0);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_millis())
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expiration != 0 && now_millis > self.expiration
    }

    /// The generic property map, without native-field resolution.
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Resolve a property: a reserved name backed by a native field wins over
    /// the generic map.
    pub fn get_property(&self, name: &str) -> Option<PropertyValue> {
        if let Some(native) = native_property(name) {
            if let Some(value) = (native.get)(self) {
                return Some(value);
            }
        }
        self.properties.get(name).cloned()
    }

    /// Set a property. Writable native fields take the value; native fields
    /// without a setter reject it; everything else lands in the generic map.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<(), CommandError> {
        let name = name.into();
        let value = value.into();
        if let Some(native) = native_property(&name) {
            let set = native.set.ok_or(PropertyError::ReadOnly(name))?;
            set(self, value)?;
            return Ok(());
        }
        self.properties.set(name, value);
        Ok(())
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    pub fn clear_properties(&mut self) {
        self.properties.clear();
        self.read_only_properties = false;
    }

    /// Encoded form of the generic property map.
    pub fn marshalled_properties(&self) -> Result<Bytes, CommandError> {
        Ok(self.properties.marshal()?)
    }

    /// Replace the generic property map from its encoded form.
    pub fn set_marshalled_properties(&mut self, data: &[u8]) -> Result<(), CommandError> {
        self.properties = PropertyMap::unmarshal(data)?;
        Ok(())
    }
}

type NativeGetter = fn(&Message) -> Option<PropertyValue>;
type NativeSetter = fn(&mut Message, PropertyValue) -> Result<(), PropertyError>;

struct NativeProperty {
    name: &'static str,
    get: NativeGetter,
    set: Option<NativeSetter>,
}

static NATIVE_PROPERTIES: [NativeProperty; 3] = [
    NativeProperty {
        name: "JMSXGroupID",
        get: |m| m.group_id.clone().map(PropertyValue::String),
        set: Some(|m, v| match v {
            PropertyValue::String(s) => {
                m.group_id = Some(s);
                Ok(())
            }
            _ => Err(PropertyError::TypeMismatch {
                name: "JMSXGroupID".into(),
                expected: "string",
            }),
        }),
    },
    NativeProperty {
        name: "JMSXGroupSeq",
        get: |m| Some(PropertyValue::Int(m.group_sequence)),
        set: Some(|m, v| {
            let seq = v
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| PropertyError::TypeMismatch {
                    name: "JMSXGroupSeq".into(),
                    expected: "int",
                })?;
            m.group_sequence = seq;
            Ok(())
        }),
    },
    NativeProperty {
        name: "JMSXDeliveryCount",
        get: |m| Some(PropertyValue::Int(m.redelivery_counter.saturating_add(1))),
        set: None,
    },
];

fn native_property(name: &str) -> Option<&'static NativeProperty> {
    if !name.starts_with(RESERVED_PROPERTY_PREFIX) {
        return None;
    }
    NATIVE_PROPERTIES.iter().find(|p| p.name == name)
}

/// Delivery of a message to one consumer; produced from a `MESSAGE` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDispatch {
    pub consumer_id: ConsumerId,
    pub destination: Option<Destination>,
    pub message: Message,
    pub redelivery_counter: i32,
}

impl MessageDispatch {
    pub fn new(consumer_id: ConsumerId, message: Message) -> Self {
        Self {
            consumer_id,
            destination: message.destination.clone(),
            redelivery_counter: message.redelivery_counter(),
            message,
        }
    }
}

/// Acknowledgement kinds, numbered as the broker numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckType {
    /// Delivered to the consumer but not yet processed.
    Delivered = 0,
    /// Processing failed past the redelivery limit.
    Poison = 1,
    /// Processed; the standard acknowledgement.
    Consumed = 2,
    Redelivered = 3,
    /// Acknowledges a single message rather than a range.
    Individual = 4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAck {
    pub ack_type: AckType,
    pub consumer_id: ConsumerId,
    pub destination: Option<Destination>,
    pub first_message_id: Option<MessageId>,
    pub last_message_id: Option<MessageId>,
    /// Broker-assigned id to acknowledge; takes precedence over
    /// `last_message_id` on the wire.
    pub broker_message_id: Option<String>,
    pub message_count: i32,
    pub transaction_id: Option<TransactionId>,
}

impl MessageAck {
    pub fn new(ack_type: AckType, consumer_id: ConsumerId, last_message_id: MessageId) -> Self {
        Self {
            ack_type,
            consumer_id,
            destination: None,
            first_message_id: None,
            last_message_id: Some(last_message_id),
            broker_message_id: None,
            message_count: 1,
            transaction_id: None,
        }
    }

    /// Acknowledge a delivered message, whichever form its id arrived in.
    pub fn for_dispatch(ack_type: AckType, dispatch: &MessageDispatch) -> Self {
        Self {
            ack_type,
            consumer_id: dispatch.consumer_id.clone(),
            destination: dispatch.destination.clone(),
            first_message_id: None,
            last_message_id: dispatch.message.message_id.clone(),
            broker_message_id: dispatch.message.broker_message_id.clone(),
            message_count: 1,
            transaction_id: None,
        }
    }

    /// The id the broker expects in the `ACK`/`NACK` `id` header.
    pub fn ack_id(&self) -> Option<String> {
        self.broker_message_id
            .clone()
            .or_else(|| self.last_message_id.as_ref().map(MessageId::to_string))
    }

    pub fn transaction(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }
}

fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
