//! External path-cache purging.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::providers::http::user_agent;

/// Header carrying the shared secret on purge requests.
pub const PURGE_SECRET_HEADER: &str = "x-revalidate-secret";

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("invalid purge configuration: {0}")]
    Config(String),
    #[error("purge request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("purge endpoint answered {0}")]
    Status(u16),
}

/// Removes rendered pages from whatever sits in front of the site.
#[async_trait]
pub trait PathPurger: Send + Sync {
    async fn purge(&self, paths: &[String]) -> Result<(), PurgeError>;
}

/// Used when no external page cache is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPathPurger;

#[async_trait]
impl PathPurger for NoopPathPurger {
    async fn purge(&self, paths: &[String]) -> Result<(), PurgeError> {
        debug!(paths = paths.len(), "No path purger configured");
        Ok(())
    }
}

/// POSTs `{"paths": [...]}` to a revalidation endpoint.
#[derive(Debug, Clone)]
pub struct HttpPathPurger {
    client: Client,
    url: Url,
    secret: Option<String>,
}

impl HttpPathPurger {
    pub fn new(url: &str, secret: Option<String>, timeout: Duration) -> Result<Self, PurgeError> {
        let url = Url::parse(url)
            .map_err(|err| PurgeError::Config(format!("invalid purge url `{url}`: {err}")))?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            secret: secret.filter(|secret| !secret.is_empty()),
        })
    }
}

#[async_trait]
impl PathPurger for HttpPathPurger {
    async fn purge(&self, paths: &[String]) -> Result<(), PurgeError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut request = self
            .client
            .post(self.url.clone())
            .json(&json!({ "paths": paths }));
        if let Some(secret) = &self.secret {
            request = request.header(PURGE_SECRET_HEADER, secret);
        }
        let status = request.send().await?.status();
        debug!(
            url = %self.url,
            status = status.as_u16(),
            paths = paths.len(),
            "Path purge responded"
        );
        if status.is_success() {
            Ok(())
        } else {
            Err(PurgeError::Status(status.as_u16()))
        }
    }
}
