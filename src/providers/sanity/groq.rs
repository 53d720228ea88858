//! GROQ query construction.
//!
//! Every user-supplied value travels as a `$param`; only field paths are
//! spliced into the query text, and those are restricted to identifier
//! characters first.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{ContentQuery, OrderDirection};

const PUBLISHED_ONLY: &str = r#"!(_id in path("drafts.**"))"#;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct GroqQuery {
    pub text: String,
    pub params: BTreeMap<String, Value>,
}

impl GroqQuery {
    /// Query-string pairs for the HTTP API: `query` plus one `$name` per
    /// parameter, JSON-encoded.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        let mut pairs = vec![("query".to_string(), self.text)];
        pairs.extend(
            self.params
                .into_iter()
                .map(|(name, value)| (format!("${name}"), value.to_string())),
        );
        pairs
    }
}

fn visibility(preview: bool) -> Option<&'static str> {
    (!preview).then_some(PUBLISHED_ONLY)
}

fn join_filters(mut clauses: Vec<String>, preview: bool) -> String {
    if let Some(clause) = visibility(preview) {
        clauses.push(clause.to_string());
    }
    clauses.join(" && ")
}

/// Single document of `doc_type` whose slug or id equals `$key`.
pub(super) fn single(doc_type: &str, key: &str, projection: &str, preview: bool) -> GroqQuery {
    let filter = join_filters(
        vec![
            "_type == $type".to_string(),
            "(slug.current == $key || _id == $key)".to_string(),
        ],
        preview,
    );
    let mut params = BTreeMap::new();
    params.insert("type".to_string(), json!(doc_type));
    params.insert("key".to_string(), json!(key));
    GroqQuery {
        text: format!("*[{filter}][0]{projection}"),
        params,
    }
}

/// The one document of a singleton type.
pub(super) fn singleton(doc_type: &str, projection: &str, preview: bool) -> GroqQuery {
    let filter = join_filters(vec!["_type == $type".to_string()], preview);
    let mut params = BTreeMap::new();
    params.insert("type".to_string(), json!(doc_type));
    GroqQuery {
        text: format!("*[{filter}] | order(_updatedAt desc)[0]{projection}"),
        params,
    }
}

/// `{"items": [...], "total": n}` for one page of `doc_type`.
pub(super) fn listing(
    doc_type: &str,
    projection: &str,
    query: &ContentQuery,
    default_order: &str,
    preview: bool,
) -> GroqQuery {
    let mut params = BTreeMap::new();
    params.insert("type".to_string(), json!(doc_type));

    let mut clauses = vec!["_type == $type".to_string()];
    for (index, (field, value)) in query.filters.iter().enumerate() {
        let name = format!("f{index}");
        match filter_clause(field, &name) {
            Some(clause) => {
                clauses.push(clause);
                params.insert(name, json!(value));
            }
            None => debug!(field = %field, "Ignoring filter on unsupported field"),
        }
    }
    if let Some(text) = query.search_text() {
        clauses.push(SEARCH_CLAUSE.to_string());
        params.insert("search".to_string(), json!(format!("{text}*")));
    }
    let filter = join_filters(clauses, preview);

    let order = query
        .order_by
        .as_deref()
        .and_then(field_path)
        .unwrap_or_else(|| default_order.to_string());
    let direction = query.direction().as_str();
    let start = query.effective_offset();
    let end = start.saturating_add(query.effective_limit());

    GroqQuery {
        text: format!(
            r#"{{"items": *[{filter}] | order({order} {direction})[{start}...{end}]{projection}, "total": count(*[{filter}])}}"#
        ),
        params,
    }
}

const SEARCH_CLAUSE: &str =
    "(title match $search || excerpt match $search || pt::text(body) match $search)";

/// Search across several document types in one request.
pub(super) fn search(
    doc_types: &[&str],
    projection: &str,
    text: &str,
    limit: u32,
    preview: bool,
) -> GroqQuery {
    let filter = join_filters(
        vec!["_type in $types".to_string(), SEARCH_CLAUSE.to_string()],
        preview,
    );
    let mut params = BTreeMap::new();
    params.insert("types".to_string(), json!(doc_types));
    params.insert("search".to_string(), json!(format!("{text}*")));
    GroqQuery {
        text: format!(
            "*[{filter}] | order(_updatedAt {})[0...{limit}]{projection}",
            OrderDirection::Desc.as_str()
        ),
        params,
    }
}

fn filter_clause(field: &str, param: &str) -> Option<String> {
    match field {
        "category" | "categories" => Some(format!("${param} in categories[]->slug.current")),
        "tag" | "tags" => Some(format!("${param} in tags[]->slug.current")),
        "author" => Some(format!("author->slug.current == ${param}")),
        other => field_path(other).map(|path| format!("{path} == ${param}")),
    }
}

/// Canonical field name to a GROQ attribute path, or `None` when the name
/// is not a plain identifier path.
pub(super) fn field_path(field: &str) -> Option<String> {
    let mapped = match field {
        "id" => "_id",
        "createdAt" => "_createdAt",
        "updatedAt" => "_updatedAt",
        "slug" => "slug.current",
        other => other,
    };
    let valid = mapped
        .split('.')
        .all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    valid.then(|| mapped.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_uses_params_and_hides_drafts() {
        let query = single("post", "hello", "{title}", false);
        assert_eq!(
            query.text,
            r#"*[_type == $type && (slug.current == $key || _id == $key) && !(_id in path("drafts.**"))][0]{title}"#
        );
        assert_eq!(query.params.get("key"), Some(&json!("hello")));
    }

    #[test]
    fn preview_includes_drafts() {
        let query = single("post", "hello", "{title}", true);
        assert!(!query.text.contains("drafts.**"));
    }

    #[test]
    fn listing_translates_pagination_order_and_filters() {
        let query = ContentQuery::new()
            .with_offset(20)
            .with_limit(10)
            .with_order("createdAt", OrderDirection::Asc)
            .with_filter("category", "news");
        let groq = listing("post", "{title}", &query, "publishedAt", false);

        assert!(groq.text.contains("order(_createdAt asc)[20...30]"));
        assert!(groq.text.contains("$f0 in categories[]->slug.current"));
        assert!(groq.text.contains(r#""total": count(*["#));
        assert_eq!(groq.params.get("f0"), Some(&json!("news")));
    }

    #[test]
    fn largest_offset_saturates_the_slice() {
        let query = ContentQuery::new().with_offset(u32::MAX);
        let groq = listing("post", "{title}", &query, "publishedAt", false);

        assert!(groq.text.contains(&format!("[{max}...{max}]", max = u32::MAX)));
    }

    #[test]
    fn unsafe_field_names_are_dropped() {
        assert_eq!(field_path("seo.title"), Some("seo.title".to_string()));
        assert_eq!(field_path("title) || true || (x"), None);
        assert_eq!(field_path("1abc"), None);

        let query = ContentQuery::new()
            .with_order("title desc) | order(x", OrderDirection::Asc)
            .with_filter("a == b", "c");
        let groq = listing("page", "{title}", &query, "_updatedAt", false);
        assert!(groq.text.contains("order(_updatedAt asc)"));
        assert!(!groq.params.contains_key("f0"));
    }

    #[test]
    fn pairs_encode_params_as_json() {
        let pairs = single("page", "about", "{title}", false).into_pairs();
        assert!(pairs.contains(&("$key".to_string(), "\"about\"".to_string())));
        assert!(pairs.contains(&("$type".to_string(), "\"page\"".to_string())));
        assert_eq!(pairs[0].0, "query");
    }

    #[test]
    fn search_matches_prefixes() {
        let groq = search(&["page", "post"], "{title}", "rust", 20, false);
        assert_eq!(groq.params.get("search"), Some(&json!("rust*")));
        assert_eq!(groq.params.get("types"), Some(&json!(["page", "post"])));
        assert!(groq.text.contains("[0...20]"));
    }
}
