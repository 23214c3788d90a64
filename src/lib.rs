pub mod command;
pub mod correlator;
pub mod destination;
pub mod executor;
pub mod frame;
pub mod ids;
pub mod marshal;
pub mod properties;
pub mod redelivery;

pub use command::{
    AckMode, AckType, BrokerError, Command, CommandError, CommandKind, CommandVisitor,
    ConnectionError, ConnectionInfo, ConsumerInfo, DataStructureType, ExceptionResponse,
    KeepAliveInfo, Message, MessageAck, MessageDispatch, ProducerInfo, RemoveInfo, RemovedObject,
    Response, SessionInfo, ShutdownInfo, TransactionInfo, TransactionType, VisitResult,
};
pub use correlator::{CorrelationError, PendingResponse, ResponseCorrelator};
pub use destination::{Destination, DestinationError, DestinationType};
pub use executor::{ExecutorError, SerialExecutor, Task, WorkerPool};
pub use frame::Frame;
pub use ids::{
    ConnectionId, ConnectionIdGenerator, ConnectionScope, ConsumerId, MessageId, ParseIdError,
    ProducerId, ProducerScope, Sequence, SessionId, SessionScope, TransactionId,
};
pub use marshal::{MarshalError, MarshalFn, MarshalOptions, StompMarshaler};
pub use properties::{PropertyError, PropertyMap, PropertyValue};
pub use redelivery::RedeliveryPolicy;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_session_lineage_display() {
        let scope = ConnectionScope::new(ConnectionId::new("conn-1"));
        let session = SessionScope::new(scope.next_session_id());
        let producer = ProducerScope::new(session.next_producer_id());
        let id = producer.next_message_id();
        assert_eq!(id.to_string(), "conn-1:1:1:1");
    }
}
