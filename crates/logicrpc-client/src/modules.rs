//! Typed wrappers for backend modules.

use logicrpc_frame::{CallResponse, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::Client;
use crate::config::CallOptions;
use crate::error::Result;

/// A backend module addressed by a fixed module ID.
///
/// Implementors get [`RemoteModule::method`] and [`RemoteModule::invoke`]
/// for free and usually add one typed method per backend method on top.
#[allow(async_fn_in_trait)]
pub trait RemoteModule {
    const MODULE_ID: &'static str;

    /// Start a call to `method` on this module.
    fn method<'a>(client: &'a Client, method: &'a str) -> ModuleCall<'a> {
        ModuleCall::new(client, Self::MODULE_ID, method)
    }

    async fn invoke<P, R>(client: &Client, method: &str, params: &P, session_origin: &str) -> Result<R>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        Self::method(client, method)
            .origin(session_origin)
            .send(params)
            .await
    }
}

/// One method call bound to a client, a module and a session origin.
///
/// ```no_run
/// # async fn run(client: &logicrpc_client::Client) -> logicrpc_client::Result<()> {
/// use std::time::Duration;
///
/// use logicrpc_client::modules::ModuleCall;
/// use logicrpc_client::CallOptions;
///
/// let _reply: serde_json::Value = ModuleCall::new(client, "test_module", "test_function")
///     .origin("session-1")
///     .options(CallOptions::default().with_timeout(Duration::from_secs(2)))
///     .send(&serde_json::json!({"value": 2}))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ModuleCall<'a> {
    client: &'a Client,
    module_id: &'a str,
    method: &'a str,
    session_origin: &'a str,
    options: CallOptions,
}

impl<'a> ModuleCall<'a> {
    /// A call with an empty session origin and default options.
    pub fn new(client: &'a Client, module_id: &'a str, method: &'a str) -> Self {
        Self {
            client,
            module_id,
            method,
            session_origin: "",
            options: CallOptions::default(),
        }
    }

    pub fn origin(mut self, session_origin: &'a str) -> Self {
        self.session_origin = session_origin;
        self
    }

    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn module_id(&self) -> &str {
        self.module_id
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn session_origin(&self) -> &str {
        self.session_origin
    }

    /// Typed call; see [`Client::call`].
    pub async fn send<P, R>(self, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.client
            .call_with_options(self.module_id, self.method, params, self.session_origin, &self.options)
            .await
    }

    /// Untyped call returning the reply envelope; see [`Client::call_raw`].
    pub async fn send_raw(self, params: Payload) -> Result<CallResponse> {
        self.client
            .call_raw_with_options(self.module_id, self.method, params, self.session_origin, &self.options)
            .await
    }
}

/// The backend's built-in test module.
pub mod test_module {
    use serde::{Deserialize, Serialize};

    use super::RemoteModule;
    use crate::client::Client;
    use crate::error::Result;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TestParameters {
        pub value: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TestResponse {
        pub result: i64,
    }

    pub struct TestModule;

    impl RemoteModule for TestModule {
        const MODULE_ID: &'static str = "test_module";
    }

    impl TestModule {
        pub async fn test_function(
            client: &Client,
            params: &TestParameters,
            session_origin: &str,
        ) -> Result<TestResponse> {
            Self::method(client, "test_function")
                .origin(session_origin)
                .send(params)
                .await
        }

        pub async fn test_function2(
            client: &Client,
            params: &TestParameters,
            session_origin: &str,
        ) -> Result<TestResponse> {
            Self::invoke(client, "test_function2", params, session_origin).await
        }
    }
}
