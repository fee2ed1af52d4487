use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use logicrpc_frame::{CallRequest, CallResponse};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{CallOptions, ClientConfig};
use crate::connection::{Connection, ConnectionManager};
use crate::error::{ClientError, Result, TransportFault};

/// How one attempt ended, when it did not produce a reply.
enum AttemptError {
    /// Connection-level failure; possibly worth another attempt.
    Fault(TransportFault),
    /// Final for this call.
    Fatal(ClientError),
}

impl From<ClientError> for AttemptError {
    fn from(err: ClientError) -> Self {
        Self::Fatal(err)
    }
}

/// Deadline and cancellation shared by every attempt of one call.
#[derive(Clone, Copy)]
struct Limits<'a> {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: Option<&'a CancellationToken>,
}

impl Limits<'_> {
    fn timed_out(&self) -> ClientError {
        ClientError::Timeout(self.timeout.unwrap_or_default())
    }

    /// Resolves with the error that ends the call early.
    async fn expired(&self) -> ClientError {
        tokio::select! {
            _ = deadline_elapsed(self.deadline) => self.timed_out(),
            _ = cancelled(self.cancel) => ClientError::Cancelled,
        }
    }
}

/// Runs calls against the shared connection, reconnecting on faults.
pub(crate) struct CallOrchestrator {
    manager: ConnectionManager,
    config: ClientConfig,
}

impl CallOrchestrator {
    pub(crate) fn new(config: ClientConfig) -> Self {
        Self {
            manager: ConnectionManager::new(&config.socket_path, config.frame.clone()),
            config,
        }
    }

    pub(crate) fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `request` and wait for its reply.
    ///
    /// Transport faults other than malformed payloads trigger a reconnect
    /// after `retry_delay`, up to `max_attempts` attempts in total. A reply
    /// with `ok == false` is returned as-is.
    pub(crate) async fn call(&self, request: &CallRequest, options: &CallOptions) -> Result<CallResponse> {
        let payload = Bytes::from(
            request
                .encode()
                .map_err(|e| ClientError::InvalidParams(e.to_string()))?,
        );
        let max = self.config.frame.max_payload_size;
        if payload.len() > max {
            return Err(ClientError::RequestTooLarge {
                size: payload.len(),
                max,
            });
        }

        let timeout = options.timeout.or(self.config.call_timeout);
        let limits = Limits {
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
            cancel: options.cancel.as_ref(),
        };
        let attempts = self.config.effective_attempts();

        let mut attempt = 1;
        loop {
            if limits.cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(ClientError::Cancelled);
            }

            let fault = match self.attempt(request, payload.clone(), limits).await {
                Ok(response) => return Ok(response),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Fault(fault)) => fault,
            };

            if !fault.is_retryable() {
                return Err(fault.into());
            }
            if attempt >= attempts {
                return Err(ClientError::TransportUnavailable {
                    attempts: attempt,
                    last: fault,
                });
            }

            warn!(
                module_id = %request.module_id,
                method = %request.method,
                attempt,
                error = %fault,
                retry_in = ?self.config.retry_delay,
                "call failed on transport; reconnecting"
            );
            tokio::select! {
                _ = sleep(self.config.retry_delay) => {}
                err = limits.expired() => return Err(err),
            }
            attempt += 1;
        }
    }

    /// One connect, send and wait cycle.
    ///
    /// The deadline and cancel token cover every step, including waiting
    /// for the write queue. A call that gives up after queueing its frame
    /// still gets the frame written whole; only its slot is evicted.
    async fn attempt(
        &self,
        request: &CallRequest,
        payload: Bytes,
        limits: Limits<'_>,
    ) -> std::result::Result<CallResponse, AttemptError> {
        let conn = tokio::select! {
            conn = self.manager.connect() => conn.map_err(AttemptError::Fault)?,
            err = limits.expired() => return Err(err.into()),
        };
        let id = conn.mux().next_id()?;
        let mut slot = conn.mux().register(id).map_err(|err| match err {
            ClientError::ConnectFailed(m) => AttemptError::Fault(TransportFault::ConnectFailed(m)),
            ClientError::TransportClosed(m) => AttemptError::Fault(TransportFault::TransportClosed(m)),
            ClientError::MalformedPayload(m) => AttemptError::Fault(TransportFault::MalformedPayload(m)),
            other => AttemptError::Fatal(other),
        })?;
        let _lease = SlotLease { conn: &conn, id };

        let sent = tokio::select! {
            sent = conn.mux().send(id, payload) => sent,
            err = limits.expired() => return Err(abandon(&conn, id, err)),
        };
        if let Err(fault) = sent {
            self.fail(&conn, fault.clone());
            return Err(AttemptError::Fault(fault));
        }
        debug!(
            correlation_id = id,
            generation = conn.generation(),
            module_id = %request.module_id,
            method = %request.method,
            "request sent"
        );

        let outcome = tokio::select! {
            outcome = slot.wait() => outcome,
            err = limits.expired() => return Err(abandon(&conn, id, err)),
        };

        match outcome {
            Ok(response) => {
                debug!(correlation_id = id, ok = response.ok, "reply received");
                Ok(response)
            }
            Err(fault) => {
                self.fail(&conn, fault.clone());
                Err(AttemptError::Fault(fault))
            }
        }
    }

    fn fail(&self, conn: &Arc<Connection>, fault: TransportFault) {
        self.manager.reset(conn, fault);
    }
}

/// Give up on call `id`: a late reply for it becomes a stale ID.
fn abandon(conn: &Connection, id: u32, err: ClientError) -> AttemptError {
    conn.mux().evict(id);
    debug!(correlation_id = id, error = %err, "call abandoned");
    AttemptError::Fatal(err)
}

/// Evicts a registered slot when the attempt ends, including when the
/// caller drops the call future. Eviction of a resolved slot is a no-op.
struct SlotLease<'a> {
    conn: &'a Connection,
    id: u32,
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        if self.conn.mux().evict(self.id) {
            debug!(correlation_id = self.id, "call dropped before its reply");
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => pending().await,
    }
}
