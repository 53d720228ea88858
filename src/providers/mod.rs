//! Content backend adapters.
//!
//! Each adapter implements [`ContentSource`] for one headless CMS and owns
//! its wire format; nothing native leaves this module.

pub mod contentful;
pub mod http;
pub mod sanity;
pub mod strapi;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

pub use self::contentful::{ContentfulClient, ContentfulConfig};
pub use self::sanity::{SanityClient, SanityConfig};
pub use self::strapi::{StrapiClient, StrapiConfig, StrapiVersion};
use crate::client::{ContentSource, SourceError};
use crate::domain::ProviderKind;

/// The configured backend, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Sanity(SanityConfig),
    Strapi(StrapiConfig),
    Contentful(ContentfulConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Sanity(_) => ProviderKind::Sanity,
            ProviderConfig::Strapi(_) => ProviderKind::Strapi,
            ProviderConfig::Contentful(_) => ProviderKind::Contentful,
        }
    }

    /// Construct the adapter. Credentials are validated here, so a bad
    /// configuration fails before any request is made.
    pub fn build_source(
        &self,
        preview: bool,
        timeout: Duration,
    ) -> Result<Arc<dyn ContentSource>, SourceError> {
        let source: Arc<dyn ContentSource> = match self {
            ProviderConfig::Sanity(config) => Arc::new(SanityClient::new(config, preview, timeout)?),
            ProviderConfig::Strapi(config) => Arc::new(StrapiClient::new(config, preview, timeout)?),
            ProviderConfig::Contentful(config) => {
                Arc::new(ContentfulClient::new(config, preview, timeout)?)
            }
        };
        Ok(source)
    }
}
