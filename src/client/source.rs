use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use super::error::SourceError;
use crate::domain::{
    Author, BlogPost, Category, Collection, ContentQuery, Navigation, Page, ProviderKind,
    SEARCH_LIMIT, SearchHit, SearchType, SiteConfig, Tag, WebhookPayload,
};

/// Provider adapter contract.
///
/// Implementations translate canonical queries into backend requests and
/// native responses into canonical entities. They never cache, and they
/// report failures as [`SourceError`]; classification happens in
/// [`CmsClient`](super::CmsClient).
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn page(&self, slug: &str) -> Result<Page, SourceError>;

    async fn pages(&self, query: &ContentQuery) -> Result<Collection<Page>, SourceError>;

    async fn blog_post(&self, slug: &str) -> Result<BlogPost, SourceError>;

    async fn blog_posts(&self, query: &ContentQuery) -> Result<Collection<BlogPost>, SourceError>;

    async fn author(&self, slug: &str) -> Result<Author, SourceError>;

    async fn authors(&self, query: &ContentQuery) -> Result<Collection<Author>, SourceError>;

    async fn category(&self, slug: &str) -> Result<Category, SourceError>;

    async fn categories(&self, query: &ContentQuery)
    -> Result<Collection<Category>, SourceError>;

    async fn tags(&self, query: &ContentQuery) -> Result<Collection<Tag>, SourceError>;

    async fn navigation(&self, id: &str) -> Result<Navigation, SourceError>;

    async fn site_config(&self) -> Result<SiteConfig, SourceError>;

    /// Free-text search over pages and posts. The default runs the listing
    /// queries with a search term; adapters with a native search override it.
    async fn search(
        &self,
        text: &str,
        scope: Option<SearchType>,
    ) -> Result<Vec<SearchHit>, SourceError> {
        let query = ContentQuery::new()
            .with_search(text)
            .with_limit(SEARCH_LIMIT);
        let (pages, posts) = match scope {
            Some(SearchType::Page) => (self.pages(&query).await?.items, Vec::new()),
            Some(SearchType::BlogPost) => (Vec::new(), self.blog_posts(&query).await?.items),
            None => {
                let (pages, posts) =
                    futures::try_join!(self.pages(&query), self.blog_posts(&query))?;
                (pages.items, posts.items)
            }
        };

        let mut hits: Vec<SearchHit> = pages.into_iter().map(SearchHit::Page).collect();
        hits.extend(posts.into_iter().map(SearchHit::BlogPost));
        Ok(hits)
    }

    /// Header in which the backend names the webhook operation, if any.
    fn webhook_event_header(&self) -> Option<&'static str> {
        None
    }

    /// Normalize a backend-native webhook body. `None` when the body is not
    /// something this backend sends.
    fn parse_webhook(
        &self,
        _body: &Value,
        _event_header: Option<&str>,
        _received_at: OffsetDateTime,
    ) -> Option<WebhookPayload> {
        None
    }
}
