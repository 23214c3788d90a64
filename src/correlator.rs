use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::command::{
    BrokerError, Command, CommandVisitor, ConnectionError, ExceptionResponse, Response,
    VisitResult,
};

/// Errors returned while waiting for a command's response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("no response for command {0} within timeout")]
    Timeout(i32),
    #[error("response for command {0} will never arrive: connection torn down")]
    Closed(i32),
    #[error("broker rejected command {command_id}: {error}")]
    Broker { command_id: i32, error: BrokerError },
}

/// Alias for the pending map: command id -> sender completing the waiter.
type PendingResponses = HashMap<i32, oneshot::Sender<Result<Response, BrokerError>>>;

/// Matches inbound `Response`/`ExceptionResponse` commands to the commands
/// that asked for them.
///
/// Register a command before sending it, then await the returned
/// `PendingResponse`. The correlator is also a `CommandVisitor`, so the
/// receive path can simply visit every inbound command with it.
#[derive(Clone, Default)]
pub struct ResponseCorrelator {
    pending: Arc<Mutex<PendingResponses>>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PendingResponses> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking `command`. Replaces any earlier registration with the
    /// same command id.
    pub fn register(&self, command: &Command) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(command.command_id, tx);
        PendingResponse {
            command_id: command.command_id,
            rx,
            correlator: self.clone(),
        }
    }

    /// Complete the waiter for `response.correlation_id`. Returns `false`
    /// when nothing was waiting.
    pub fn complete(&self, response: &Response) -> bool {
        self.resolve(response.correlation_id, Ok(*response))
    }

    /// Fail the waiter for `response.correlation_id` with the broker error.
    pub fn fail(&self, response: &ExceptionResponse) -> bool {
        warn!(
            command_id = response.correlation_id,
            error = %response.error,
            "broker returned an error response"
        );
        self.resolve(response.correlation_id, Err(response.error.clone()))
    }

    fn resolve(&self, command_id: i32, outcome: Result<Response, BrokerError>) -> bool {
        match self.lock().remove(&command_id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                debug!(command_id, "response for unknown or abandoned command");
                false
            }
        }
    }

    /// Drop every waiter; each sees `CorrelationError::Closed`.
    pub fn fail_all(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            debug!(count = drained.len(), "abandoning pending responses");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn forget(&self, command_id: i32) {
        self.lock().remove(&command_id);
    }
}

impl CommandVisitor for ResponseCorrelator {
    fn process_response(&mut self, _command: &Command, response: &Response) -> VisitResult {
        self.complete(response);
        Ok(None)
    }

    fn process_exception_response(
        &mut self,
        _command: &Command,
        response: &ExceptionResponse,
    ) -> VisitResult {
        self.fail(response);
        Ok(None)
    }

    fn process_connection_error(
        &mut self,
        _command: &Command,
        error: &ConnectionError,
    ) -> VisitResult {
        warn!(error = %error.error, "connection error, failing pending responses");
        self.fail_all();
        Ok(None)
    }
}

/// Handle for one registered command's response.
pub struct PendingResponse {
    command_id: i32,
    rx: oneshot::Receiver<Result<Response, BrokerError>>,
    correlator: ResponseCorrelator,
}

impl PendingResponse {
    pub fn command_id(&self) -> i32 {
        self.command_id
    }

    /// Wait for the response. On timeout the registration is removed so a
    /// late response is ignored.
    pub async fn wait(self, timeout: Duration) -> Result<Response, CorrelationError> {
        let command_id = self.command_id;
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(error))) => Err(CorrelationError::Broker { command_id, error }),
            Ok(Err(_)) => Err(CorrelationError::Closed(command_id)),
            Err(_) => {
                self.correlator.forget(command_id);
                Err(CorrelationError::Timeout(command_id))
            }
        }
    }
}
