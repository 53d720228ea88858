//! Client registry.
//!
//! Holds at most one [`CmsClient`] per provider. Owned by the composition
//! root and shared by the HTTP surfaces and the revalidation engine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::info;

use crate::cache::{rw_read, rw_write};
use crate::client::{ClientOptions, CmsClient, SourceError};
use crate::domain::ProviderKind;
use crate::providers::ProviderConfig;

const SOURCE: &str = "registry";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot configure {provider} client: {source}")]
    Configure {
        provider: ProviderKind,
        #[source]
        source: SourceError,
    },
}

pub struct ClientRegistry {
    options: ClientOptions,
    clients: RwLock<HashMap<ProviderKind, Arc<CmsClient>>>,
}

impl ClientRegistry {
    /// `options` apply to every client the registry constructs.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The registered client for `config`'s provider, constructing and
    /// registering it on first use.
    pub fn create_client(&self, config: &ProviderConfig) -> Result<Arc<CmsClient>, RegistryError> {
        let provider = config.kind();
        if let Some(existing) = self.get_client(provider) {
            return Ok(existing);
        }

        let source = config
            .build_source(self.options.preview, self.options.timeout)
            .map_err(|source| RegistryError::Configure { provider, source })?;
        let client = Arc::new(CmsClient::new(source, self.options.clone()));

        let mut clients = rw_write(&self.clients, SOURCE, "create_client");
        // Another caller may have won the race while the adapter was built.
        let registered = clients
            .entry(provider)
            .or_insert_with(|| Arc::clone(&client));
        if Arc::ptr_eq(registered, &client) {
            info!(
                provider = provider.as_str(),
                preview = self.options.preview,
                "Registered content client"
            );
        }
        Ok(Arc::clone(registered))
    }

    /// Register an already constructed client, replacing any previous one.
    pub fn register(&self, client: Arc<CmsClient>) {
        let provider = client.provider();
        rw_write(&self.clients, SOURCE, "register").insert(provider, client);
    }

    pub fn get_client(&self, provider: ProviderKind) -> Option<Arc<CmsClient>> {
        rw_read(&self.clients, SOURCE, "get_client")
            .get(&provider)
            .cloned()
    }

    /// Snapshot of every registered client.
    pub fn clients(&self) -> Vec<Arc<CmsClient>> {
        rw_read(&self.clients, SOURCE, "clients")
            .values()
            .cloned()
            .collect()
    }

    /// Forget every client. Their caches are left as they are; clients
    /// still held elsewhere keep working.
    pub fn clear_clients(&self) {
        let mut clients = rw_write(&self.clients, SOURCE, "clear_clients");
        let dropped = clients.len();
        clients.clear();
        info!(dropped, "Cleared content clients");
    }
}
