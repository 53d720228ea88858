//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, ServeOverrides};

use crate::cache::CacheConfig;
use crate::client::ClientOptions;
use crate::domain::ProviderKind;
use crate::providers::ProviderConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "contentgate";
const ENV_PREFIX: &str = "CONTENTGATE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PURGE_TIMEOUT_SECS: u64 = 5;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
    pub client: ClientSettings,
    pub provider: ProviderConfig,
    pub revalidation: RevalidationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub preview: bool,
}

#[derive(Debug, Clone)]
pub struct RevalidationSettings {
    /// Required in `x-webhook-secret` on webhook and revalidation calls.
    pub webhook_secret: Option<String>,
    pub purge: Option<PurgeSettings>,
}

#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub url: String,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl Settings {
    /// Options shared by every client the registry builds.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            cache: self.cache.clone(),
            timeout: self.client.request_timeout,
            preview: self.client.preview,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_serve_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: CacheConfig,
    client: RawClientSettings,
    /// Kept untyped until the `kind` selector has been checked.
    provider: Option<Value>,
    revalidation: RawRevalidationSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = enabled;
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.default_ttl_secs = seconds;
        }
        if let Some(entries) = overrides.cache_max_entries {
            self.cache.max_entries = entries;
        }
        if let Some(preview) = overrides.preview {
            self.client.preview = Some(preview);
        }
        if let Some(seconds) = overrides.request_timeout_seconds {
            self.client.request_timeout_seconds = Some(seconds);
        }
        if let Some(secret) = overrides.webhook_secret.as_ref() {
            self.revalidation.webhook_secret = Some(secret.clone());
        }
        if let Some(url) = overrides.purge_url.as_ref() {
            self.revalidation.purge_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            client,
            provider,
            revalidation,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let client = build_client_settings(client)?;
        let provider = build_provider_settings(provider)?;
        let revalidation = build_revalidation_settings(revalidation)?;

        Ok(Self {
            server,
            logging,
            cache,
            client,
            provider,
            revalidation,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: CacheConfig) -> Result<CacheConfig, LoadError> {
    if cache.default_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_secs",
            "must be greater than zero",
        ));
    }
    if cache.max_entries == 0 {
        return Err(LoadError::invalid(
            "cache.max_entries",
            "must be greater than zero",
        ));
    }
    Ok(cache)
}

fn build_client_settings(client: RawClientSettings) -> Result<ClientSettings, LoadError> {
    let timeout_secs = client
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "client.request_timeout_seconds",
            "a backend request timeout is required",
        ));
    }
    Ok(ClientSettings {
        request_timeout: Duration::from_secs(timeout_secs),
        preview: client.preview.unwrap_or(false),
    })
}

/// The provider table is mandatory and its `kind` must name a registered
/// backend; credentials are then checked against that backend's schema.
fn build_provider_settings(provider: Option<Value>) -> Result<ProviderConfig, LoadError> {
    let provider =
        provider.ok_or_else(|| LoadError::invalid("provider", "a provider must be configured"))?;
    let kind = provider
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| LoadError::invalid("provider.kind", "missing provider selector"))?;
    let kind = ProviderKind::from_str(kind)
        .map_err(|err| LoadError::invalid("provider.kind", err.to_string()))?;

    let mut provider = provider;
    if let Value::Object(map) = &mut provider {
        map.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
    }
    serde_json::from_value(provider).map_err(|err| LoadError::invalid("provider", err.to_string()))
}

fn build_revalidation_settings(
    revalidation: RawRevalidationSettings,
) -> Result<RevalidationSettings, LoadError> {
    let non_empty = |value: Option<String>| {
        value.and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    };

    let purge = match non_empty(revalidation.purge_url) {
        Some(url) => {
            url::Url::parse(&url)
                .map_err(|err| LoadError::invalid("revalidation.purge_url", err.to_string()))?;
            let timeout_secs = revalidation
                .purge_timeout_seconds
                .unwrap_or(DEFAULT_PURGE_TIMEOUT_SECS);
            if timeout_secs == 0 {
                return Err(LoadError::invalid(
                    "revalidation.purge_timeout_seconds",
                    "must be greater than zero",
                ));
            }
            Some(PurgeSettings {
                url,
                secret: non_empty(revalidation.purge_secret),
                timeout: Duration::from_secs(timeout_secs),
            })
        }
        None => None,
    };

    Ok(RevalidationSettings {
        webhook_secret: non_empty(revalidation.webhook_secret),
        purge,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawClientSettings {
    request_timeout_seconds: Option<u64>,
    preview: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRevalidationSettings {
    webhook_secret: Option<String>,
    purge_url: Option<String>,
    purge_secret: Option<String>,
    purge_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
