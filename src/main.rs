use std::{future::IntoFuture, process, sync::Arc};

use contentgate::{
    application::error::AppError,
    config::{self, Settings},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
    registry::ClientRegistry,
    revalidation::{HttpPathPurger, NoopPathPurger, PathPurger, Revalidator},
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let state = build_state(&settings)?;
    serve_http(&settings, state).await
}

fn build_state(settings: &Settings) -> Result<HttpState, AppError> {
    let registry = Arc::new(ClientRegistry::new(settings.client_options()));
    let client = registry.create_client(&settings.provider)?;

    let purger: Arc<dyn PathPurger> = match &settings.revalidation.purge {
        Some(purge) => Arc::new(HttpPathPurger::new(
            &purge.url,
            purge.secret.clone(),
            purge.timeout,
        )?),
        None => Arc::new(NoopPathPurger),
    };

    info!(
        provider = client.provider().as_str(),
        preview = client.is_preview(),
        cache_enabled = settings.cache.enabled,
        cache_ttl_secs = settings.cache.default_ttl_secs,
        purge = settings.revalidation.purge.is_some(),
        webhook_secret = settings.revalidation.webhook_secret.is_some(),
        "Content gateway configured"
    );

    let revalidator = Arc::new(Revalidator::new(registry, purger));
    Ok(HttpState::new(
        revalidator,
        client.provider(),
        settings.revalidation.webhook_secret.clone(),
    ))
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "Listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| InfraError::server(err.to_string()).into());
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received, draining connections");
            shutdown.notify_one();
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(result) => result.map_err(|err| InfraError::server(err.to_string()).into()),
        Err(_) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}
