use serde_json::json;

use super::*;

fn sanity_provider() -> Option<Value> {
    Some(json!({"kind": "sanity", "project_id": "abc123"}))
}

fn raw_with_provider() -> RawSettings {
    RawSettings {
        provider: sanity_provider(),
        ..Default::default()
    }
}

#[test]
fn defaults_resolve_with_a_provider() {
    let settings = Settings::from_raw(raw_with_provider()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(settings.cache.default_ttl(), Duration::from_secs(300));
    assert_eq!(settings.client.request_timeout, Duration::from_secs(10));
    assert!(!settings.client.preview);
    assert_eq!(settings.provider.kind(), ProviderKind::Sanity);
    assert!(settings.revalidation.webhook_secret.is_none());
    assert!(settings.revalidation.purge.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_provider();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.default_ttl_secs = 60;

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_ttl_seconds: Some(120),
        preview: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.default_ttl_secs, 120);
    assert!(settings.client_options().preview);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_provider();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn missing_provider_is_fatal() {
    let err = Settings::from_raw(RawSettings::default()).expect_err("provider required");
    assert!(matches!(err, LoadError::Invalid { key: "provider", .. }));
}

#[test]
fn unknown_provider_is_fatal() {
    let raw = RawSettings {
        provider: Some(json!({"kind": "wordpress", "url": "https://example.com"})),
        ..Default::default()
    };
    let err = Settings::from_raw(raw).expect_err("unknown provider");
    match err {
        LoadError::Invalid { key, reason } => {
            assert_eq!(key, "provider.kind");
            assert!(reason.contains("wordpress"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn provider_kind_is_case_insensitive() {
    let raw = RawSettings {
        provider: Some(json!({"kind": "Strapi", "url": "http://localhost:1337"})),
        ..Default::default()
    };
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.provider.kind(), ProviderKind::Strapi);
}

#[test]
fn missing_credentials_are_fatal() {
    let raw = RawSettings {
        provider: Some(json!({"kind": "contentful", "space_id": "space"})),
        ..Default::default()
    };
    let err = Settings::from_raw(raw).expect_err("access token required");
    assert!(matches!(err, LoadError::Invalid { key: "provider", .. }));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut raw = raw_with_provider();
    raw.client.request_timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("timeout required");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "client.request_timeout_seconds",
            ..
        }
    ));
}

#[test]
fn purge_settings_require_a_valid_url() {
    let mut raw = raw_with_provider();
    raw.revalidation.purge_url = Some("not a url".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = raw_with_provider();
    raw.revalidation.purge_url = Some("https://site.example.com/api/revalidate".to_string());
    raw.revalidation.purge_secret = Some("  ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    let purge = settings.revalidation.purge.expect("purge");
    assert!(purge.secret.is_none());
    assert_eq!(purge.timeout, Duration::from_secs(DEFAULT_PURGE_TIMEOUT_SECS));
}

#[test]
fn parse_cli_overrides() {
    let args = CliArgs::parse_from([
        "contentgate",
        "--server-host",
        "0.0.0.0",
        "--cache-enabled",
        "false",
        "--webhook-secret",
        "s3cret",
    ]);

    assert_eq!(args.overrides.server_host.as_deref(), Some("0.0.0.0"));
    assert_eq!(args.overrides.cache_enabled, Some(false));
    assert_eq!(args.overrides.webhook_secret.as_deref(), Some("s3cret"));
}

#[test]
fn loads_provider_table_from_config_file() {
    let path = std::env::temp_dir().join(format!(
        "contentgate-config-{}.toml",
        std::process::id()
    ));
    std::fs::write(
        &path,
        r#"
[server]
port = 8088

[cache]
default_ttl_secs = 45

[provider]
kind = "contentful"
space_id = "space"
access_token = "token"
locale = "de-DE"
"#,
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "contentgate",
        "--config-file",
        path.to_str().expect("utf-8 path"),
        "--server-port",
        "9090",
    ]);
    let settings = load(&args);
    let _ = std::fs::remove_file(&path);
    let settings = settings.expect("settings");

    assert_eq!(settings.server.addr.port(), 9090);
    assert_eq!(settings.cache.default_ttl_secs, 45);
    let ProviderConfig::Contentful(contentful) = &settings.provider else {
        panic!("expected contentful provider");
    };
    assert_eq!(contentful.locale, "de-DE");
    assert_eq!(contentful.environment, "master");
}
