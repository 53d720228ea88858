//! Base client: cache-wrapped access to one content provider.
//!
//! [`CmsClient`] owns an adapter and a [`TaggedCache`]. Every read builds
//! a deterministic key, serves live hits without touching the backend, and
//! on a miss calls the adapter under a timeout and stores the result with
//! its tags. Failures are classified and never cached.

mod cached;
pub mod error;
mod source;
pub mod transform;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::cache::{
    CacheConfig, Clock, SystemClock, TaggedCache, cache_key, change_tags, collection_tags,
    entity_tags, search_tags,
};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, Collection, ContentModel, ContentQuery,
    MAX_LIMIT, Navigation, Page, ProviderKind, SearchHit, SearchType, SiteConfig, Tag,
    UnknownModel, WebhookPayload,
};

pub use cached::{Cacheable, CachedContent};
pub use error::{ContentError, ErrorKind, SourceError, classify};
pub use source::ContentSource;

use error::into_content_error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-client behavior resolved from configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub cache: CacheConfig,
    /// Upper bound on a single adapter call.
    pub timeout: Duration,
    /// Serve draft and archived entities.
    pub preview: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            preview: false,
        }
    }
}

/// Cache-wrapped client for one provider.
pub struct CmsClient {
    source: Arc<dyn ContentSource>,
    cache: TaggedCache<CachedContent>,
    options: ClientOptions,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsClient")
            .field("provider", &self.source.provider())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CmsClient {
    pub fn new(source: Arc<dyn ContentSource>, options: ClientOptions) -> Self {
        Self::with_clock(source, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn ContentSource>,
        options: ClientOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache =
            TaggedCache::with_clock(source.provider().as_str(), &options.cache, Arc::clone(&clock));
        Self {
            source,
            cache,
            options,
            clock,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.source.provider()
    }

    pub fn cache(&self) -> &TaggedCache<CachedContent> {
        &self.cache
    }

    pub fn is_preview(&self) -> bool {
        self.options.preview
    }

    pub async fn get_page(&self, slug: &str) -> Result<Page, ContentError> {
        let provider = self.provider();
        self.cached(
            "getPage",
            &json!({ "slug": slug }),
            |page: &Page| entity_tags(provider, ContentModel::Page, &page.base.id, &page.base.slug),
            async {
                let page = self.source.page(slug).await?;
                self.ensure_visible(ContentModel::Page, slug, &page.base)?;
                Ok::<_, SourceError>(page)
            },
        )
        .await
    }

    pub async fn get_pages(&self, query: &ContentQuery) -> Result<Collection<Page>, ContentError> {
        self.cached(
            "getPages",
            query,
            self.listing_tags(ContentModel::Page),
            self.source.pages(query),
        )
        .await
    }

    pub async fn get_blog_post(&self, slug: &str) -> Result<BlogPost, ContentError> {
        let provider = self.provider();
        self.cached(
            "getBlogPost",
            &json!({ "slug": slug }),
            |post: &BlogPost| {
                entity_tags(provider, ContentModel::BlogPost, &post.base.id, &post.base.slug)
            },
            async {
                let post = self.source.blog_post(slug).await?;
                self.ensure_visible(ContentModel::BlogPost, slug, &post.base)?;
                Ok::<_, SourceError>(post)
            },
        )
        .await
    }

    pub async fn get_blog_posts(
        &self,
        query: &ContentQuery,
    ) -> Result<Collection<BlogPost>, ContentError> {
        self.cached(
            "getBlogPosts",
            query,
            self.listing_tags(ContentModel::BlogPost),
            self.source.blog_posts(query),
        )
        .await
    }

    pub async fn get_author(&self, slug: &str) -> Result<Author, ContentError> {
        let provider = self.provider();
        self.cached(
            "getAuthor",
            &json!({ "slug": slug }),
            |author: &Author| {
                entity_tags(provider, ContentModel::Author, &author.base.id, &author.base.slug)
            },
            async {
                let author = self.source.author(slug).await?;
                self.ensure_visible(ContentModel::Author, slug, &author.base)?;
                Ok::<_, SourceError>(author)
            },
        )
        .await
    }

    pub async fn get_authors(
        &self,
        query: &ContentQuery,
    ) -> Result<Collection<Author>, ContentError> {
        self.cached(
            "getAuthors",
            query,
            self.listing_tags(ContentModel::Author),
            self.source.authors(query),
        )
        .await
    }

    pub async fn get_category(&self, slug: &str) -> Result<Category, ContentError> {
        let provider = self.provider();
        self.cached(
            "getCategory",
            &json!({ "slug": slug }),
            |category: &Category| {
                entity_tags(
                    provider,
                    ContentModel::Category,
                    &category.base.id,
                    &category.base.slug,
                )
            },
            async {
                let category = self.source.category(slug).await?;
                self.ensure_visible(ContentModel::Category, slug, &category.base)?;
                Ok::<_, SourceError>(category)
            },
        )
        .await
    }

    pub async fn get_categories(
        &self,
        query: &ContentQuery,
    ) -> Result<Collection<Category>, ContentError> {
        self.cached(
            "getCategories",
            query,
            self.listing_tags(ContentModel::Category),
            self.source.categories(query),
        )
        .await
    }

    pub async fn get_tags(&self, query: &ContentQuery) -> Result<Collection<Tag>, ContentError> {
        self.cached(
            "getTags",
            query,
            self.listing_tags(ContentModel::Tag),
            self.source.tags(query),
        )
        .await
    }

    pub async fn get_navigation(&self, id: &str) -> Result<Navigation, ContentError> {
        let provider = self.provider();
        self.cached(
            "getNavigation",
            &json!({ "id": id }),
            |navigation: &Navigation| {
                entity_tags(
                    provider,
                    ContentModel::Navigation,
                    &navigation.base.id,
                    &navigation.base.slug,
                )
            },
            async {
                let navigation = self.source.navigation(id).await?;
                self.ensure_visible(ContentModel::Navigation, id, &navigation.base)?;
                Ok::<_, SourceError>(navigation)
            },
        )
        .await
    }

    pub async fn get_site_config(&self) -> Result<SiteConfig, ContentError> {
        let provider = self.provider();
        self.cached(
            "getSiteConfig",
            &json!({}),
            |config: &SiteConfig| {
                entity_tags(
                    provider,
                    ContentModel::SiteConfig,
                    &config.base.id,
                    &config.base.slug,
                )
            },
            self.source.site_config(),
        )
        .await
    }

    /// Free-text search over pages and posts, optionally narrowed to one type.
    pub async fn search(
        &self,
        text: &str,
        scope: Option<SearchType>,
    ) -> Result<Collection<SearchHit>, ContentError> {
        let provider = self.provider();
        let text = text.trim();
        let listing = ContentQuery::new().with_limit(MAX_LIMIT);
        if text.is_empty() {
            return Ok(Collection::new(Vec::new(), 0, &listing));
        }

        let models = SearchType::models(scope);
        self.cached(
            "search",
            &json!({ "text": text, "type": scope }),
            move |_: &Collection<SearchHit>| search_tags(provider, &models),
            async {
                let mut hits = self.source.search(text, scope).await?;
                if !self.options.preview {
                    hits.retain(|hit| hit.base().is_public());
                }
                let total = hits.len() as u64;
                Ok::<_, SourceError>(Collection::new(hits, total, &listing))
            },
        )
        .await
    }

    /// Drop entries carrying any of `tags`, or everything when `None`.
    /// Returns the number of entries removed.
    pub fn revalidate_cache(&self, tags: Option<&[String]>) -> usize {
        let provider = self.provider().as_str();
        match tags {
            Some(tags) => {
                let removed = self.cache.invalidate_by_tags(tags);
                info!(provider, tags = ?tags, removed, "Revalidated content cache by tag");
                removed
            }
            None => {
                let removed = self.cache.len();
                self.cache.clear();
                info!(provider, removed, "Cleared content cache");
                removed
            }
        }
    }

    /// Apply the default invalidation policy for one content change.
    pub fn handle_webhook(&self, payload: &WebhookPayload) -> Result<usize, UnknownModel> {
        let model = payload.content_model()?;
        let tags = change_tags(
            model,
            payload.event,
            &payload.entry.id,
            &payload.entry.slug,
        );
        let removed = self.cache.invalidate_by_tags(&tags);
        info!(
            provider = self.provider().as_str(),
            event = payload.event.as_str(),
            model = model.name(),
            id = %payload.entry.id,
            removed,
            "Applied webhook invalidation"
        );
        Ok(removed)
    }

    /// Header carrying the backend's webhook operation name, if it uses one.
    pub fn webhook_event_header(&self) -> Option<&'static str> {
        self.source.webhook_event_header()
    }

    /// Accept either the canonical payload or the backend's native body.
    pub fn parse_webhook(&self, body: &Value, event_header: Option<&str>) -> Option<WebhookPayload> {
        serde_json::from_value::<WebhookPayload>(body.clone())
            .ok()
            .or_else(|| {
                self.source
                    .parse_webhook(body, event_header, self.clock.now())
            })
    }

    fn listing_tags<T>(&self, model: ContentModel) -> impl FnOnce(&T) -> BTreeSet<String> {
        let provider = self.provider();
        move |_: &T| collection_tags(provider, model)
    }

    fn ensure_visible(
        &self,
        model: ContentModel,
        key: &str,
        base: &BaseContentItem,
    ) -> Result<(), SourceError> {
        if self.options.preview || base.is_public() {
            Ok(())
        } else {
            Err(SourceError::missing(model, key))
        }
    }

    async fn cached<T, P, F>(
        &self,
        method: &'static str,
        params: &P,
        tags: impl FnOnce(&T) -> BTreeSet<String>,
        fetch: F,
    ) -> Result<T, ContentError>
    where
        T: Cacheable,
        P: Serialize + ?Sized,
        F: Future<Output = Result<T, SourceError>>,
    {
        let provider = self.provider();
        if !self.options.cache.enabled {
            return self.fetch(method, fetch).await;
        }

        let key = cache_key(method, params).map_err(|err| {
            ContentError::new(
                ErrorKind::Unknown,
                provider,
                format!("cannot encode cache key: {err}"),
            )
        })?;
        if let Some(hit) = self.cache.get(&key).and_then(T::from_cached) {
            debug!(provider = provider.as_str(), method, "Content served from cache");
            return Ok(hit);
        }

        // Invalidations landing while the adapter call is in flight must win.
        let generation = self.cache.generation();
        let value = self.fetch(method, fetch).await?;
        let tags = tags(&value);
        self.cache.set_if_unchanged(
            generation,
            key,
            value.clone().into_cached(),
            self.options.cache.default_ttl(),
            tags,
        );
        Ok(value)
    }

    async fn fetch<T>(
        &self,
        method: &'static str,
        fetch: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, ContentError> {
        let result = match tokio::time::timeout(self.options.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout),
        };
        result.map_err(|err| into_content_error(self.provider(), method, err))
    }
}
