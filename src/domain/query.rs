//! Query value objects and paginated collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{ContentModel, UnknownModel};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Page size used for each searched content type.
pub const SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

/// Content types a free-text search can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    Page,
    BlogPost,
}

impl SearchType {
    pub fn model(self) -> ContentModel {
        match self {
            SearchType::Page => ContentModel::Page,
            SearchType::BlogPost => ContentModel::BlogPost,
        }
    }

    /// Models covered by a search narrowed to `scope`, or all searchable ones.
    pub fn models(scope: Option<SearchType>) -> Vec<ContentModel> {
        match scope {
            Some(kind) => vec![kind.model()],
            None => vec![ContentModel::Page, ContentModel::BlogPost],
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = UnknownModel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.parse::<ContentModel>()? {
            ContentModel::Page => Ok(SearchType::Page),
            ContentModel::BlogPost => Ok(SearchType::BlogPost),
            _ => Err(UnknownModel(value.to_string())),
        }
    }
}

/// Listing parameters shared by every collection query.
///
/// Constructed once and never mutated; the `with_*` helpers return a new
/// value. `filters` is an ordered map so identical filter sets always
/// encode identically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_direction: Option<OrderDirection>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ContentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(&self, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub fn with_offset(&self, offset: u32) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }

    pub fn with_order(&self, field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            order_by: Some(field.into()),
            order_direction: Some(direction),
            ..self.clone()
        }
    }

    pub fn with_filter(&self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let mut filters = self.filters.clone();
        filters.insert(field.into(), value.into());
        Self {
            filters,
            ..self.clone()
        }
    }

    pub fn with_search(&self, text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..self.clone()
        }
    }

    /// Page size clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    pub fn direction(&self) -> OrderDirection {
        self.order_direction.unwrap_or_default()
    }

    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(offset: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let page = offset / limit + 1;
        let total_pages = total.div_ceil(u64::from(limit));
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: u64::from(offset) + u64::from(limit) < total,
            has_prev: offset > 0,
        }
    }
}

/// Paginated result of a listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub meta: PaginationMeta,
}

impl<T> Collection<T> {
    pub fn new(items: Vec<T>, total: u64, query: &ContentQuery) -> Self {
        let meta = PaginationMeta::new(
            query.effective_offset(),
            query.effective_limit(),
            total,
        );
        Self { items, total, meta }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Collection<U> {
        Collection {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(ContentQuery::new().effective_limit(), DEFAULT_LIMIT);
        assert_eq!(ContentQuery::new().with_limit(0).effective_limit(), 1);
        assert_eq!(ContentQuery::new().with_limit(500).effective_limit(), MAX_LIMIT);
    }

    #[test]
    fn builders_leave_original_untouched() {
        let base = ContentQuery::new().with_limit(5);
        let filtered = base.with_filter("category", "news");
        assert!(base.filters.is_empty());
        assert_eq!(filtered.filters.get("category").map(String::as_str), Some("news"));
        assert_eq!(filtered.limit, Some(5));
    }

    #[test]
    fn pagination_meta_middle_page() {
        let meta = PaginationMeta::new(10, 10, 35);
        assert_eq!(meta.page, 2);
        assert_eq!(meta.total_pages, 4);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn pagination_meta_last_page() {
        let meta = PaginationMeta::new(30, 10, 35);
        assert_eq!(meta.page, 4);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn pagination_meta_empty() {
        let meta = PaginationMeta::new(0, 10, 0);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn search_type_accepts_model_aliases() {
        assert_eq!("post".parse::<SearchType>(), Ok(SearchType::BlogPost));
        assert_eq!("page".parse::<SearchType>(), Ok(SearchType::Page));
        assert!("author".parse::<SearchType>().is_err());
        assert_eq!(SearchType::models(None).len(), 2);
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(ContentQuery::new().with_search("   ").search_text(), None);
        assert_eq!(ContentQuery::new().with_search(" rust ").search_text(), Some("rust"));
    }
}
