use std::path::Path;
use std::sync::Arc;

use logicrpc_frame::{from_json, to_json, CallRequest, CallResponse, Payload};
#[cfg(feature = "schema")]
use logicrpc_schema::{CallTarget, SchemaRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{CallOptions, ClientConfig};
use crate::error::{ClientError, Result, TransportFault};
use crate::orchestrator::CallOrchestrator;

/// Cause given to calls failed by [`Client::disconnect`].
pub const DISCONNECT_CAUSE: &str = "client disconnected";

/// Handle to one logic backend.
///
/// Clones share the same connection and pending-call table, so a `Client`
/// can be handed to as many tasks as needed.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    orchestrator: CallOrchestrator,
    #[cfg(feature = "schema")]
    schemas: Option<Arc<SchemaRegistry>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("socket_path", &self.socket_path())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Client {
    /// Create a client. No connection is made until the first call.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator: CallOrchestrator::new(config),
                #[cfg(feature = "schema")]
                schemas: None,
            }),
        }
    }

    /// Create a client for `path` with default settings.
    pub fn with_socket_path(path: impl AsRef<Path>) -> Self {
        Self::new(ClientConfig::new(path))
    }

    /// Create a client that validates params and results against `schemas`.
    ///
    /// Calls without a registered schema pass through unchecked.
    #[cfg(feature = "schema")]
    pub fn with_schemas(config: ClientConfig, schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator: CallOrchestrator::new(config),
                schemas: Some(schemas),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.inner.orchestrator.config()
    }

    pub fn socket_path(&self) -> &Path {
        self.inner.orchestrator.manager().socket_path()
    }

    /// Send one call and return the backend's reply envelope unchanged.
    ///
    /// `ok == false` replies are returned as `Ok`; only transport and
    /// local failures become errors.
    pub async fn call_raw(
        &self,
        module_id: &str,
        method: &str,
        params: Payload,
        session_origin: &str,
    ) -> Result<CallResponse> {
        self.call_raw_with_options(module_id, method, params, session_origin, &CallOptions::default())
            .await
    }

    pub async fn call_raw_with_options(
        &self,
        module_id: &str,
        method: &str,
        params: Payload,
        session_origin: &str,
        options: &CallOptions,
    ) -> Result<CallResponse> {
        let params = match params {
            Payload::Nil => Payload::Map(Vec::new()),
            Payload::Map(map) => Payload::Map(map),
            other => {
                return Err(ClientError::InvalidParams(format!(
                    "params must be a map, got {}",
                    kind_of(&other)
                )))
            }
        };
        let request = CallRequest::new(module_id, method, params, session_origin);
        self.inner.orchestrator.call(&request, options).await
    }

    /// Call and return the result data, turning `ok == false` into
    /// [`ClientError::RemoteError`]. Missing data comes back as `nil`.
    pub async fn call_value(
        &self,
        module_id: &str,
        method: &str,
        params: Payload,
        session_origin: &str,
    ) -> Result<Payload> {
        self.call_value_with_options(module_id, method, params, session_origin, &CallOptions::default())
            .await
    }

    pub async fn call_value_with_options(
        &self,
        module_id: &str,
        method: &str,
        params: Payload,
        session_origin: &str,
        options: &CallOptions,
    ) -> Result<Payload> {
        #[cfg(feature = "schema")]
        self.validate_params(module_id, method, &params)?;

        let response = self
            .call_raw_with_options(module_id, method, params, session_origin, options)
            .await?;
        let data = response
            .into_result()
            .map_err(ClientError::RemoteError)?
            .unwrap_or(Payload::Nil);

        #[cfg(feature = "schema")]
        self.validate_result(module_id, method, &data)?;

        Ok(data)
    }

    /// Typed call: serialize `params`, decode the result data into `R`.
    ///
    /// Both directions go through the JSON data model, so binary values
    /// decode as byte arrays. A result that does not fit `R` fails with
    /// [`ClientError::SchemaMismatch`].
    pub async fn call<P, R>(&self, module_id: &str, method: &str, params: &P, session_origin: &str) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call_with_options(module_id, method, params, session_origin, &CallOptions::default())
            .await
    }

    pub async fn call_with_options<P, R>(
        &self,
        module_id: &str,
        method: &str,
        params: &P,
        session_origin: &str,
        options: &CallOptions,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(|e| ClientError::InvalidParams(e.to_string()))?;
        let data = self
            .call_value_with_options(module_id, method, from_json(&params), session_origin, options)
            .await?;
        serde_json::from_value(to_json(&data))
            .map_err(|e| ClientError::SchemaMismatch(format!("{module_id}.{method}: {e}")))
    }

    /// Open the connection now instead of on the first call.
    pub async fn connect(&self) -> Result<()> {
        self.inner.orchestrator.manager().connect().await?;
        Ok(())
    }

    /// Whether a live connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.inner.orchestrator.manager().is_connected()
    }

    /// Calls waiting on the current connection.
    pub fn pending_calls(&self) -> usize {
        self.inner.orchestrator.manager().pending_calls()
    }

    /// Sockets opened or attempted so far.
    pub fn connect_attempts(&self) -> u64 {
        self.inner.orchestrator.manager().connect_attempts()
    }

    /// Drop the current connection, failing its pending calls.
    ///
    /// Failed calls follow the normal retry policy. The next call
    /// reconnects.
    pub fn disconnect(&self) {
        self.inner
            .orchestrator
            .manager()
            .disconnect(TransportFault::TransportClosed(DISCONNECT_CAUSE.into()));
    }

    #[cfg(feature = "schema")]
    fn validate_params(&self, module_id: &str, method: &str, params: &Payload) -> Result<()> {
        if let Some(schemas) = &self.inner.schemas {
            schemas.validate_params(&CallTarget::new(module_id, method), &to_json(params))?;
        }
        Ok(())
    }

    #[cfg(feature = "schema")]
    fn validate_result(&self, module_id: &str, method: &str, data: &Payload) -> Result<()> {
        if let Some(schemas) = &self.inner.schemas {
            schemas
                .validate_result(&CallTarget::new(module_id, method), &to_json(data))
                .map_err(|e| ClientError::SchemaMismatch(e.to_string()))?;
        }
        Ok(())
    }
}

fn kind_of(value: &Payload) -> &'static str {
    match value {
        Payload::Nil => "nil",
        Payload::Boolean(_) => "bool",
        Payload::Integer(_) | Payload::F32(_) | Payload::F64(_) => "number",
        Payload::String(_) => "string",
        Payload::Binary(_) => "binary",
        Payload::Array(_) => "array",
        Payload::Map(_) => "map",
        Payload::Ext(..) => "ext",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn non_map_params_rejected_before_connecting() {
        let client = Client::with_socket_path("/tmp/lrpc-never-dialed.sock");
        let err = client
            .call_raw("test_module", "test_function", from_json(&json!([1, 2])), "s")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidParams(ref m) if m.contains("array")));

        let err = client
            .call_raw("test_module", "test_function", Payload::Binary(vec![1]), "s")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidParams(ref m) if m.contains("binary")));
        assert_eq!(client.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn oversized_request_rejected_before_connecting() {
        let config = ClientConfig::new("/tmp/lrpc-never-dialed.sock").with_max_payload_size(32);
        let client = Client::new(config);
        let err = client
            .call_raw(
                "test_module",
                "test_function",
                from_json(&json!({"pad": "x".repeat(64)})),
                "s",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RequestTooLarge { max: 32, .. }));
        assert_eq!(client.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let client = Client::with_socket_path("/tmp/lrpc-never-dialed.sock");
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let err = client
            .call_raw_with_options(
                "test_module",
                "test_function",
                Payload::Nil,
                "s",
                &CallOptions::default().with_cancel(token),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(client.connect_attempts(), 0);
    }

    #[test]
    fn fresh_client_is_idle() {
        let client = Client::with_socket_path("/tmp/lrpc-idle.sock");
        assert!(!client.is_connected());
        assert_eq!(client.pending_calls(), 0);
        client.disconnect();
        assert!(format!("{client:?}").contains("lrpc-idle.sock"));
    }
}
