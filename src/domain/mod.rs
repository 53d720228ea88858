//! Canonical content vocabulary shared by every provider.

pub mod content;
pub mod query;
pub mod types;
pub mod webhook;

pub use content::{
    Author, BaseContentItem, BlogPost, Category, MAX_RELATED_POSTS, MediaAsset, Navigation,
    NavigationItem, Page, PostSummary, RichTextContent, SearchHit, SeoMetadata, SiteConfig, Tag,
    UNKNOWN_AUTHOR_NAME,
};
pub use query::{
    Collection, ContentQuery, DEFAULT_LIMIT, MAX_LIMIT, OrderDirection, PaginationMeta, SEARCH_LIMIT,
    SearchType,
};
pub use types::{
    ContentModel, ContentStatus, ProviderKind, UnknownModel, UnknownProvider, WebhookEvent,
};
pub use webhook::WebhookPayload;
