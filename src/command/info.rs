use crate::destination::Destination;
use crate::ids::{ConnectionId, ConsumerId, ProducerId, SessionId, TransactionId};

/// Subscription acknowledgement modes as defined by STOMP 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

/// Opens a connection. Carries the credentials sent in `CONNECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub client_id: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    /// Virtual host for the `host` header; `/` when unset.
    pub host: Option<String>,
}

impl ConnectionInfo {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            client_id: None,
            user_name: None,
            password: None,
            host: None,
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn credentials(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
}

impl SessionInfo {
    /// Describe session `value` of the given connection.
    pub fn new(connection: &ConnectionInfo, value: i64) -> Self {
        Self {
            session_id: SessionId::new(&connection.connection_id, value),
        }
    }

    pub fn from_id(session_id: SessionId) -> Self {
        Self { session_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    /// Fixed destination, or `None` for an anonymous producer.
    pub destination: Option<Destination>,
}

impl ProducerInfo {
    pub fn new(producer_id: ProducerId) -> Self {
        Self {
            producer_id,
            destination: None,
        }
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }
}

/// Registers a consumer; marshals to `SUBSCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerInfo {
    pub consumer_id: ConsumerId,
    pub destination: Destination,
    pub ack_mode: AckMode,
    /// Number of unacknowledged messages the broker may push; `None` leaves
    /// the broker default in place.
    pub prefetch_size: Option<u32>,
    pub selector: Option<String>,
    /// Durable subscription name, for topics.
    pub subscription_name: Option<String>,
    pub no_local: bool,
    pub dispatch_async: bool,
}

impl ConsumerInfo {
    pub fn new(consumer_id: ConsumerId, destination: Destination) -> Self {
        Self {
            consumer_id,
            destination,
            ack_mode: AckMode::Auto,
            prefetch_size: None,
            selector: None,
            subscription_name: None,
            no_local: false,
            dispatch_async: true,
        }
    }

    pub fn ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn prefetch_size(mut self, prefetch_size: u32) -> Self {
        self.prefetch_size = Some(prefetch_size);
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn subscription_name(mut self, name: impl Into<String>) -> Self {
        self.subscription_name = Some(name.into());
        self
    }

    pub fn no_local(mut self, no_local: bool) -> Self {
        self.no_local = no_local;
        self
    }

    /// `activemq.dispatchAsync`; on by default.
    pub fn dispatch_async(mut self, dispatch_async: bool) -> Self {
        self.dispatch_async = dispatch_async;
        self
    }
}

/// The object a `RemoveInfo` tears down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovedObject {
    Connection(ConnectionId),
    Session(SessionId),
    Producer(ProducerId),
    Consumer(ConsumerId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveInfo {
    pub object_id: RemovedObject,
}

impl RemoveInfo {
    pub fn new(object_id: RemovedObject) -> Self {
        Self { object_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub connection_id: ConnectionId,
    pub transaction_id: TransactionId,
    pub kind: TransactionType,
}

impl TransactionInfo {
    pub fn new(transaction_id: TransactionId, kind: TransactionType) -> Self {
        Self {
            connection_id: transaction_id.connection_id().clone(),
            transaction_id,
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeepAliveInfo;

/// Graceful disconnect; marshals to `DISCONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownInfo;
