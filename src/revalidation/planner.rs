//! Webhook to invalidation plan.
//!
//! A pure mapping: no cache or network access happens here.

use std::collections::BTreeSet;
use std::fmt;

use crate::cache::change_tags;
use crate::domain::{ContentModel, UnknownModel, WebhookEvent, WebhookPayload};

/// Slugs that address the site root rather than `/<slug>`.
const HOME_SLUGS: [&str; 3] = ["", "home", "index"];

/// Tags to invalidate in every content store and paths to purge from the
/// external page cache.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RevalidationPlan {
    pub tags: BTreeSet<String>,
    pub paths: BTreeSet<String>,
}

impl fmt::Display for RevalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RevalidationPlan {{ tags: {}, paths: {} }}",
            self.tags.len(),
            self.paths.len()
        )
    }
}

impl RevalidationPlan {
    pub fn for_webhook(payload: &WebhookPayload) -> Result<Self, UnknownModel> {
        let model = payload.content_model()?;
        Ok(Self::for_change(
            model,
            payload.event,
            &payload.entry.id,
            &payload.entry.slug,
        ))
    }

    pub fn for_change(model: ContentModel, event: WebhookEvent, id: &str, slug: &str) -> Self {
        // Removals carry the listing tag as well as the entity tags, so a
        // deleted item leaves listings and single lookups together.
        let mut tags = change_tags(model, event, id, slug);
        let mut paths = BTreeSet::new();

        match model {
            ContentModel::BlogPost => {
                paths.insert("/blog".to_string());
                if !slug.is_empty() {
                    paths.insert(format!("/blog/{slug}"));
                }
            }
            ContentModel::Page => {
                if HOME_SLUGS.contains(&slug) {
                    paths.insert("/".to_string());
                } else {
                    paths.insert(format!("/{slug}"));
                }
            }
            // Post listings render author names and taxonomy.
            ContentModel::Author | ContentModel::Category | ContentModel::Tag => {
                tags.insert(ContentModel::BlogPost.collection_tag().to_string());
                paths.insert("/blog".to_string());
                if !slug.is_empty() {
                    paths.insert(format!("/blog/{}/{slug}", archive_segment(model)));
                }
            }
            // Every page renders the site chrome.
            ContentModel::Navigation | ContentModel::SiteConfig => {
                paths.insert("/".to_string());
            }
        }

        Self { tags, paths }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.paths.is_empty()
    }
}

fn archive_segment(model: ContentModel) -> &'static str {
    match model {
        ContentModel::Author => "author",
        ContentModel::Category => "category",
        _ => "tag",
    }
}
