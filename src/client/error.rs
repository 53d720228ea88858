//! Adapter-native errors and the provider-independent taxonomy callers see.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::{ContentModel, ProviderKind};

const METRIC_BACKEND_ERROR: &str = "contentgate_backend_error_total";

/// Failure raised inside a provider adapter. Never crosses `CmsClient`.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("backend answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("no {model} matches `{key}`")]
    Missing { model: ContentModel, key: String },

    #[error("invalid adapter configuration: {0}")]
    Config(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl SourceError {
    pub fn missing(model: ContentModel, key: impl Into<String>) -> Self {
        Self::Missing {
            model,
            key: key.into(),
        }
    }

    pub fn decode(message: impl std::fmt::Display) -> Self {
        Self::Decode(message.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Network(Arc::new(err))
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// Classification of a failed content fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AuthFailed,
    Forbidden,
    ServerError,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Error surfaced by `CmsClient`, independent of the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?} from {provider}: {message}")]
pub struct ContentError {
    pub kind: ErrorKind,
    pub provider: ProviderKind,
    pub message: String,
}

impl ContentError {
    pub fn new(kind: ErrorKind, provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider,
            message: message.into(),
        }
    }

    /// Only backend outages are worth a single retry by the caller.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::ServerError
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// Map an adapter error onto the taxonomy.
pub fn classify(err: &SourceError) -> ErrorKind {
    match err {
        SourceError::Status { status, .. } => match *status {
            404 | 410 => ErrorKind::NotFound,
            401 => ErrorKind::AuthFailed,
            403 => ErrorKind::Forbidden,
            408 | 500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        },
        SourceError::Missing { .. } => ErrorKind::NotFound,
        SourceError::Timeout | SourceError::Network(_) => ErrorKind::ServerError,
        SourceError::Decode(_) | SourceError::Config(_) | SourceError::Unsupported(_) => {
            ErrorKind::Unknown
        }
    }
}

/// Classify, log with the provider name, and wrap.
pub(crate) fn into_content_error(
    provider: ProviderKind,
    method: &'static str,
    err: SourceError,
) -> ContentError {
    let kind = classify(&err);
    match kind {
        ErrorKind::NotFound => {}
        ErrorKind::AuthFailed | ErrorKind::Forbidden => warn!(
            provider = provider.as_str(),
            method,
            kind = ?kind,
            error = %err,
            "Content backend rejected credentials"
        ),
        ErrorKind::ServerError => warn!(
            provider = provider.as_str(),
            method,
            error = %err,
            "Content backend unavailable"
        ),
        ErrorKind::Unknown => error!(
            provider = provider.as_str(),
            method,
            error = %err,
            "Unexpected content backend failure"
        ),
    }
    counter!(
        METRIC_BACKEND_ERROR,
        "provider" => provider.as_str(),
        "kind" => kind.as_str()
    )
    .increment(1);
    ContentError::new(kind, provider, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> SourceError {
        SourceError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn http_statuses_map_to_taxonomy() {
        assert_eq!(classify(&status(404)), ErrorKind::NotFound);
        assert_eq!(classify(&status(401)), ErrorKind::AuthFailed);
        assert_eq!(classify(&status(403)), ErrorKind::Forbidden);
        assert_eq!(classify(&status(502)), ErrorKind::ServerError);
        assert_eq!(classify(&status(418)), ErrorKind::Unknown);
        assert_eq!(classify(&status(429)), ErrorKind::Unknown);
    }

    #[test]
    fn timeouts_are_server_errors() {
        assert_eq!(classify(&SourceError::Timeout), ErrorKind::ServerError);
    }

    #[test]
    fn missing_entities_are_not_found() {
        let err = SourceError::missing(ContentModel::Page, "about");
        assert_eq!(classify(&err), ErrorKind::NotFound);
    }

    #[test]
    fn decode_failures_are_unknown_and_not_retryable() {
        let err = into_content_error(
            ProviderKind::Sanity,
            "getPage",
            SourceError::decode("bad json"),
        );
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(!err.is_retryable());
        assert_eq!(err.provider, ProviderKind::Sanity);
    }
}
