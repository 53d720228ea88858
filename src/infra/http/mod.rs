//! HTTP surface: content reads, webhooks and manual revalidation.

pub mod content;
pub mod error;
mod middleware;
pub mod webhooks;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use error::ApiError;
pub use middleware::REQUEST_ID_HEADER;
pub use webhooks::WEBHOOK_SECRET_HEADER;

use crate::client::CmsClient;
use crate::domain::ProviderKind;
use crate::revalidation::Revalidator;

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub revalidator: Arc<Revalidator>,
    /// Provider serving the content routes.
    pub provider: ProviderKind,
    pub webhook_secret: Option<Arc<str>>,
}

impl HttpState {
    pub fn new(
        revalidator: Arc<Revalidator>,
        provider: ProviderKind,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            revalidator,
            provider,
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }

    fn client(&self) -> Result<Arc<CmsClient>, ApiError> {
        self.revalidator
            .registry()
            .get_client(self.provider)
            .ok_or_else(|| ApiError::provider_unavailable(self.provider.as_str()))
    }
}

pub fn build_router(state: HttpState) -> Router {
    let content = Router::new()
        .route("/pages", get(content::list_pages))
        .route("/pages/{slug}", get(content::get_page))
        .route("/posts", get(content::list_posts))
        .route("/posts/{slug}", get(content::get_post))
        .route("/authors", get(content::list_authors))
        .route("/authors/{slug}", get(content::get_author))
        .route("/categories", get(content::list_categories))
        .route("/categories/{slug}", get(content::get_category))
        .route("/tags", get(content::list_tags))
        .route("/navigation/{id}", get(content::get_navigation))
        .route("/site-config", get(content::get_site_config))
        .route("/search", get(content::search));

    Router::new()
        .nest("/api/content", content)
        .route("/api/webhooks/{provider}", post(webhooks::receive_webhook))
        .route("/api/revalidate", post(webhooks::revalidate))
        .route("/healthz", get(content::healthz))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
