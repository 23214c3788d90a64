use std::fmt;
use thiserror::Error;

use crate::command::DataStructureType;
use crate::ids::{ConnectionId, ConnectionScope};

/// Errors produced when converting STOMP destination strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("unknown destination prefix in '{0}'")]
    UnknownPrefix(String),
    #[error("empty destination name")]
    EmptyName,
    #[error("temporary destination '{0}' requires an owning connection")]
    MissingOwner(String),
}

/// The four destination families understood by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationType {
    Queue,
    Topic,
    TemporaryQueue,
    TemporaryTopic,
}

impl DestinationType {
    /// STOMP addressing prefix for this family.
    pub fn stomp_prefix(&self) -> &'static str {
        match self {
            DestinationType::Queue => "/queue/",
            DestinationType::Topic => "/topic/",
            DestinationType::TemporaryQueue => "/temp-queue/",
            DestinationType::TemporaryTopic => "/temp-topic/",
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            DestinationType::TemporaryQueue | DestinationType::TemporaryTopic
        )
    }

    pub fn is_topic(&self) -> bool {
        matches!(
            self,
            DestinationType::Topic | DestinationType::TemporaryTopic
        )
    }

    pub fn data_structure_type(&self) -> DataStructureType {
        match self {
            DestinationType::Queue => DataStructureType::Queue,
            DestinationType::Topic => DataStructureType::Topic,
            DestinationType::TemporaryQueue => DataStructureType::TemporaryQueue,
            DestinationType::TemporaryTopic => DataStructureType::TemporaryTopic,
        }
    }
}

/// A queue or topic address.
///
/// Temporary destinations always carry the `ConnectionId` that created them;
/// the constructors make it impossible to build one without it. Deleting a
/// temporary destination when its connection closes is up to the transport
/// layer; this type only carries what that layer needs.
///
/// Destination options (the `?key=value&...` suffix some brokers accept) are
/// kept apart from the physical name, in their original order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    physical_name: String,
    kind: DestinationType,
    owner: Option<ConnectionId>,
    options: Vec<(String, String)>,
}

impl Destination {
    pub fn queue(name: impl Into<String>) -> Self {
        Self::build(DestinationType::Queue, name.into(), None)
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Self::build(DestinationType::Topic, name.into(), None)
    }

    pub fn temporary_queue(owner: &ConnectionId, name: impl Into<String>) -> Self {
        Self::build(DestinationType::TemporaryQueue, name.into(), Some(owner.clone()))
    }

    pub fn temporary_topic(owner: &ConnectionId, name: impl Into<String>) -> Self {
        Self::build(DestinationType::TemporaryTopic, name.into(), Some(owner.clone()))
    }

    fn build(kind: DestinationType, name: String, owner: Option<ConnectionId>) -> Self {
        let (physical_name, options) = split_options(&name);
        Self {
            physical_name,
            kind,
            owner,
            options,
        }
    }

    pub fn destination_type(&self) -> DestinationType {
        self.kind
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    /// The connection that created this destination, for temporary
    /// destinations. Always `None` for plain queues and topics.
    pub fn owning_connection(&self) -> Option<&ConnectionId> {
        self.owner.as_ref()
    }

    pub fn is_temporary(&self) -> bool {
        self.kind.is_temporary()
    }

    pub fn is_topic(&self) -> bool {
        self.kind.is_topic()
    }

    pub fn is_queue(&self) -> bool {
        !self.kind.is_topic()
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Look up a destination option by key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Add a destination option (builder style).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Create a new destination of the same family (and, for temporary
    /// destinations, the same owning connection) with a different name.
    pub fn create_destination(&self, name: impl Into<String>) -> Destination {
        Self::build(self.kind, name.into(), self.owner.clone())
    }

    pub fn data_structure_type(&self) -> DataStructureType {
        self.kind.data_structure_type()
    }

    /// Render as a STOMP destination header value, e.g. `/queue/orders`.
    pub fn to_stomp_string(&self) -> String {
        let mut s = format!("{}{}", self.kind.stomp_prefix(), self.physical_name);
        for (i, (k, v)) in self.options.iter().enumerate() {
            s.push(if i == 0 { '?' } else { '&' });
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }

    /// Parse a STOMP destination header value.
    ///
    /// Temporary destinations are attributed to `owner`; parsing one without
    /// an owner is rejected.
    pub fn from_stomp_str(
        value: &str,
        owner: Option<&ConnectionId>,
    ) -> Result<Destination, DestinationError> {
        const FAMILIES: [DestinationType; 4] = [
            DestinationType::TemporaryQueue,
            DestinationType::TemporaryTopic,
            DestinationType::Queue,
            DestinationType::Topic,
        ];
        let kind = FAMILIES
            .into_iter()
            .find(|k| value.starts_with(k.stomp_prefix()))
            .ok_or_else(|| DestinationError::UnknownPrefix(value.to_string()))?;
        let name = &value[kind.stomp_prefix().len()..];
        if name.is_empty() || name.starts_with('?') {
            return Err(DestinationError::EmptyName);
        }
        match (kind.is_temporary(), owner) {
            (true, None) => Err(DestinationError::MissingOwner(value.to_string())),
            (true, Some(owner)) => Ok(Self::build(kind, name.to_string(), Some(owner.clone()))),
            (false, _) => Ok(Self::build(kind, name.to_string(), None)),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_stomp_string())
    }
}

fn split_options(name: &str) -> (String, Vec<(String, String)>) {
    let Some((physical, query)) = name.split_once('?') else {
        return (name.to_string(), Vec::new());
    };
    let options = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    (physical.to_string(), options)
}

impl ConnectionScope {
    /// Mint a temporary queue whose name is unique within this connection.
    pub fn create_temporary_queue(&self) -> Destination {
        Destination::temporary_queue(self.id(), self.next_temporary_name())
    }

    /// Mint a temporary topic whose name is unique within this connection.
    pub fn create_temporary_topic(&self) -> Destination {
        Destination::temporary_topic(self.id(), self.next_temporary_name())
    }

    fn next_temporary_name(&self) -> String {
        format!("{}:{}", self.id(), self.temporary_destinations.next())
    }
}
