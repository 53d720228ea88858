//! Revalidation engine.
//!
//! Turns webhook payloads and manual triggers into tag invalidations on
//! every registered content store plus a purge of externally cached
//! paths. Callers always get a [`RevalidationOutcome`]; failures are
//! reported, never propagated.

mod planner;
mod purge;

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use planner::RevalidationPlan;
pub use purge::{HttpPathPurger, NoopPathPurger, PURGE_SECRET_HEADER, PathPurger, PurgeError};

use crate::cache::all_tag_categories;
use crate::domain::WebhookPayload;
use crate::registry::ClientRegistry;

const METRIC_REVALIDATION: &str = "contentgate_revalidation_total";

/// Paths purged by a full revalidation.
pub const ALWAYS_REVALIDATED_PATHS: [&str; 2] = ["/", "/blog"];

pub const FULL_REVALIDATION_MESSAGE: &str = "Full cache revalidation completed";

/// Manual trigger body: `{tags?, paths?, all?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RevalidationRequest {
    pub tags: Option<Vec<String>>,
    pub paths: Option<Vec<String>>,
    pub all: bool,
}

impl RevalidationRequest {
    /// True when the request names no tag, no path and is not a full run.
    pub fn is_empty(&self) -> bool {
        let blank = |values: &Option<Vec<String>>| {
            values
                .as_ref()
                .is_none_or(|values| values.iter().all(|value| value.trim().is_empty()))
        };
        !self.all && blank(&self.tags) && blank(&self.paths)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidationOutcome {
    pub success: bool,
    pub message: String,
}

impl RevalidationOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub struct Revalidator {
    registry: Arc<ClientRegistry>,
    purger: Arc<dyn PathPurger>,
}

impl Revalidator {
    pub fn new(registry: Arc<ClientRegistry>, purger: Arc<dyn PathPurger>) -> Self {
        Self { registry, purger }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub async fn handle_webhook(&self, payload: &WebhookPayload) -> RevalidationOutcome {
        let outcome = match RevalidationPlan::for_webhook(payload) {
            Ok(plan) => {
                info!(
                    provider = %payload.provider,
                    event = payload.event.as_str(),
                    model = %payload.model,
                    id = %payload.entry.id,
                    %plan,
                    "Planned webhook revalidation"
                );
                self.execute(&plan, |removed| {
                    format!(
                        "Revalidated {} {} ({} cache entries, {} paths)",
                        payload.model,
                        payload.event.as_str(),
                        removed,
                        plan.paths.len()
                    )
                })
                .await
            }
            Err(err) => {
                warn!(provider = %payload.provider, error = %err, "Rejected webhook");
                RevalidationOutcome::failed(err.to_string())
            }
        };
        record("webhook", &outcome);
        outcome
    }

    pub async fn revalidate(&self, request: RevalidationRequest) -> RevalidationOutcome {
        let outcome = if request.all {
            let plan = RevalidationPlan {
                tags: all_tag_categories(),
                paths: ALWAYS_REVALIDATED_PATHS
                    .iter()
                    .map(|path| path.to_string())
                    .collect(),
            };
            self.execute(&plan, |_| FULL_REVALIDATION_MESSAGE.to_string())
                .await
        } else {
            let plan = RevalidationPlan {
                tags: clean(request.tags),
                paths: clean(request.paths),
            };
            if plan.is_empty() {
                RevalidationOutcome::failed("Nothing to revalidate: provide tags, paths or all")
            } else {
                self.execute(&plan, |removed| {
                    format!(
                        "Revalidated {} tags ({} cache entries) and {} paths",
                        plan.tags.len(),
                        removed,
                        plan.paths.len()
                    )
                })
                .await
            }
        };
        record("manual", &outcome);
        outcome
    }

    async fn execute(
        &self,
        plan: &RevalidationPlan,
        message: impl FnOnce(usize) -> String,
    ) -> RevalidationOutcome {
        let removed = if plan.tags.is_empty() {
            0
        } else {
            let tags: Vec<String> = plan.tags.iter().cloned().collect();
            self.registry
                .clients()
                .iter()
                .map(|client| client.revalidate_cache(Some(&tags)))
                .sum()
        };

        let paths: Vec<String> = plan.paths.iter().cloned().collect();
        match self.purger.purge(&paths).await {
            Ok(()) => RevalidationOutcome::ok(message(removed)),
            Err(err) => {
                warn!(error = %err, paths = paths.len(), "Path purge failed");
                RevalidationOutcome::failed(format!(
                    "Invalidated {removed} cache entries but path purge failed: {err}"
                ))
            }
        }
    }
}

fn clean(values: Option<Vec<String>>) -> BTreeSet<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn record(trigger: &'static str, outcome: &RevalidationOutcome) {
    let result = if outcome.success { "success" } else { "failure" };
    counter!(METRIC_REVALIDATION, "trigger" => trigger, "outcome" => result).increment(1);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingPurger {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl PathPurger for RecordingPurger {
        async fn purge(&self, paths: &[String]) -> Result<(), PurgeError> {
            self.calls
                .lock()
                .expect("calls")
                .push(paths.to_vec());
            if self.fail {
                Err(PurgeError::Status(500))
            } else {
                Ok(())
            }
        }
    }

    fn revalidator(fail: bool) -> (Revalidator, Arc<RecordingPurger>) {
        let purger = Arc::new(RecordingPurger {
            fail,
            ..Default::default()
        });
        let registry = Arc::new(ClientRegistry::new(Default::default()));
        (Revalidator::new(registry, purger.clone()), purger)
    }

    #[tokio::test]
    async fn full_revalidation_purges_fixed_paths() {
        let (revalidator, purger) = revalidator(false);
        let outcome = revalidator
            .revalidate(RevalidationRequest {
                all: true,
                ..Default::default()
            })
            .await;
        assert_eq!(outcome, RevalidationOutcome::ok(FULL_REVALIDATION_MESSAGE));
        let calls = purger.calls.lock().expect("calls");
        assert_eq!(calls.as_slice(), &[vec!["/".to_string(), "/blog".to_string()]]);
    }

    #[tokio::test]
    async fn empty_request_is_reported() {
        let (revalidator, purger) = revalidator(false);
        let outcome = revalidator
            .revalidate(RevalidationRequest {
                tags: Some(vec![" ".to_string()]),
                ..Default::default()
            })
            .await;
        assert!(!outcome.success);
        assert!(purger.calls.lock().expect("calls").is_empty());
    }

    #[tokio::test]
    async fn purge_failure_becomes_outcome() {
        let (revalidator, _) = revalidator(true);
        let outcome = revalidator
            .revalidate(RevalidationRequest {
                paths: Some(vec!["/about".to_string()]),
                ..Default::default()
            })
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("path purge failed"));
    }
}
