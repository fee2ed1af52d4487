use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::client::Client;
use crate::config::ClientConfig;

/// Hands out one shared [`Client`] per socket path.
///
/// Every caller asking for the same path gets a handle to the same
/// connection. The registry is an ordinary value: create one at startup
/// and pass it to whatever needs backend access.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    template: ClientConfig,
    clients: Mutex<HashMap<PathBuf, Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clients created by this registry copy every setting from `template`
    /// except the socket path.
    pub fn with_config(template: ClientConfig) -> Self {
        Self {
            template,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Return the client for `path`, creating it on first use.
    pub fn get_or_create(&self, path: impl AsRef<Path>) -> Client {
        let path = path.as_ref();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(path) {
            return client.clone();
        }

        debug!(path = ?path, "creating backend client");
        let config = ClientConfig {
            socket_path: path.to_path_buf(),
            ..self.template.clone()
        };
        let client = Client::new(config);
        clients.insert(path.to_path_buf(), client.clone());
        client
    }

    /// Client for the template's socket path.
    pub fn default_client(&self) -> Client {
        self.get_or_create(self.template.socket_path.clone())
    }

    /// Forget the client for `path`. Existing handles keep working.
    pub fn remove(&self, path: impl AsRef<Path>) -> Option<Client> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
