//! Canonical webhook payload consumed by the revalidation path.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::content::BaseContentItem;
use super::types::{ContentModel, UnknownModel, WebhookEvent};

/// A content change notification, normalized from whatever the backend sent.
///
/// Consumed once by revalidation and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub model: String,
    pub entry: BaseContentItem,
    pub provider: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl WebhookPayload {
    pub fn content_model(&self) -> Result<ContentModel, UnknownModel> {
        self.model.parse()
    }
}
