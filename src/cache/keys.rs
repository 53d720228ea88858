//! Cache key construction and tag sets.
//!
//! Keys are `<method>:<sha256 of the canonical JSON parameters>`. The
//! canonical form sorts object keys recursively, so two parameter values
//! that are deep-equal produce the same key whatever their field order.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{ContentModel, ProviderKind, WebhookEvent};

/// Tag attached to every cached search result.
pub const SEARCH_TAG: &str = "search";

/// Build the deterministic cache key for a client method call.
pub fn cache_key<P>(method: &str, params: &P) -> Result<String, serde_json::Error>
where
    P: Serialize + ?Sized,
{
    let encoded = canonical_json(params)?;
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    Ok(format!("{method}:{}", hex::encode(hasher.finalize())))
}

/// Serialize `params` as JSON with every object's keys in sorted order.
pub fn canonical_json<P>(params: &P) -> Result<String, serde_json::Error>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(params)?;
    serde_json::to_string(&canonicalize(value))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Tags for a single cached entity: provider, model, `<model>:<id>` and
/// `<model>:<slug>`.
pub fn entity_tags(
    provider: ProviderKind,
    model: ContentModel,
    id: &str,
    slug: &str,
) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(provider.as_str().to_string());
    tags.insert(model.name().to_string());
    tags.insert(model.entity_tag(id));
    if !slug.is_empty() {
        tags.insert(model.entity_tag(slug));
    }
    tags
}

/// Tags for a cached listing: provider, model and the model's collection tag.
pub fn collection_tags(provider: ProviderKind, model: ContentModel) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(provider.as_str().to_string());
    tags.insert(model.name().to_string());
    tags.insert(model.collection_tag().to_string());
    tags
}

/// Tags for a cached search: provider, `search`, and the model and
/// collection tag of each searched model.
pub fn search_tags(provider: ProviderKind, models: &[ContentModel]) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(provider.as_str().to_string());
    tags.insert(SEARCH_TAG.to_string());
    for model in models {
        tags.insert(model.name().to_string());
        tags.insert(model.collection_tag().to_string());
    }
    tags
}

/// Tags a content change invalidates in one provider store.
///
/// Upserts only touch the listing; removals also drop the entity itself
/// under both its id and its slug.
pub fn change_tags(
    model: ContentModel,
    event: WebhookEvent,
    id: &str,
    slug: &str,
) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(model.collection_tag().to_string());
    if event.is_removal() {
        tags.insert(model.entity_tag(id));
        if !slug.is_empty() {
            tags.insert(model.entity_tag(slug));
        }
    }
    tags
}

/// Every tag category a store can hold, used for full revalidation.
pub fn all_tag_categories() -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for model in ContentModel::ALL {
        tags.insert(model.name().to_string());
        tags.insert(model.collection_tag().to_string());
    }
    tags.insert(SEARCH_TAG.to_string());
    tags
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::ContentQuery;

    #[test]
    fn key_ignores_field_order() {
        let a = json!({"limit": 10, "filters": {"b": "2", "a": "1"}, "search": "rust"});
        let b = json!({"search": "rust", "filters": {"a": "1", "b": "2"}, "limit": 10});

        assert_eq!(
            cache_key("getBlogPosts", &a).expect("key"),
            cache_key("getBlogPosts", &b).expect("key")
        );
    }

    #[test]
    fn key_separates_methods_and_values() {
        let params = json!({"slug": "about"});
        let page = cache_key("getPage", &params).expect("key");
        let post = cache_key("getBlogPost", &params).expect("key");
        let other = cache_key("getPage", &json!({"slug": "contact"})).expect("key");

        assert!(page.starts_with("getPage:"));
        assert_ne!(page, post);
        assert_ne!(page, other);
    }

    #[test]
    fn equal_queries_share_a_key() {
        let first = ContentQuery::new()
            .with_filter("category", "news")
            .with_filter("author", "ada")
            .with_limit(5);
        let second = ContentQuery::new()
            .with_limit(5)
            .with_filter("author", "ada")
            .with_filter("category", "news");

        assert_eq!(
            cache_key("getBlogPosts", &first).expect("key"),
            cache_key("getBlogPosts", &second).expect("key")
        );
    }

    #[test]
    fn canonical_json_sorts_nested_objects() {
        let encoded = canonical_json(&json!({"z": [{"y": 1, "x": 2}], "a": null})).expect("json");
        assert_eq!(encoded, r#"{"a":null,"z":[{"x":2,"y":1}]}"#);
    }

    #[test]
    fn entity_tags_cover_id_and_slug() {
        let tags = entity_tags(ProviderKind::Sanity, ContentModel::BlogPost, "42", "hello-world");
        let expected: BTreeSet<String> = ["sanity", "blogPost", "blogPost:42", "blogPost:hello-world"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn listing_tags_carry_provider_and_model() {
        let tags = collection_tags(ProviderKind::Strapi, ContentModel::BlogPost);
        let expected: BTreeSet<String> = ["strapi", "blogPost", "blogPosts"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tags, expected);

        let tags = search_tags(ProviderKind::Sanity, &[ContentModel::Page, ContentModel::BlogPost]);
        for tag in ["sanity", SEARCH_TAG, "page", "pages", "blogPost", "blogPosts"] {
            assert!(tags.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn upserts_only_touch_the_collection() {
        let tags = change_tags(ContentModel::Page, WebhookEvent::Updated, "7", "about");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["pages".to_string()]);
    }

    #[test]
    fn removals_drop_the_entity() {
        let tags = change_tags(ContentModel::BlogPost, WebhookEvent::Deleted, "42", "hello-world");
        let expected: BTreeSet<String> = ["blogPosts", "blogPost:42", "blogPost:hello-world"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn all_categories_include_models_and_collections() {
        let tags = all_tag_categories();
        assert!(tags.contains("blogPost"));
        assert!(tags.contains("blogPosts"));
        assert!(tags.contains("siteConfig"));
        assert!(tags.contains(SEARCH_TAG));
    }
}
