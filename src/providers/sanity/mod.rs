//! Sanity adapter.
//!
//! Reads through the GROQ HTTP query API:
//! `https://{project}.api.sanity.io/v{version}/data/query/{dataset}`.
//! Drafts are excluded unless the client runs in preview mode.

mod documents;
mod groq;
mod portable_text;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;

use self::documents::{SanityDoc, SanityPage, canonical_id};
use self::groq::GroqQuery;
use super::http::ApiClient;
use crate::client::transform::parse_timestamp;
use crate::client::{ContentSource, SourceError};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, Collection, ContentModel, ContentQuery,
    ContentStatus, Navigation, Page, ProviderKind, SEARCH_LIMIT, SearchHit, SearchType,
    SiteConfig, Tag, WebhookEvent, WebhookPayload,
};

const DEFAULT_API_VERSION: &str = "2025-02-19";
const DEFAULT_DATASET: &str = "production";
const OPERATION_HEADER: &str = "sanity-operation";

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_dataset() -> String {
    DEFAULT_DATASET.to_string()
}

/// `[provider]` settings when `kind = "sanity"`.
#[derive(Debug, Clone, Deserialize)]
pub struct SanityConfig {
    pub project_id: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Read token; required for private datasets and preview.
    #[serde(default)]
    pub token: Option<String>,
    /// Read through the CDN (`apicdn.sanity.io`). Ignored in preview.
    #[serde(default)]
    pub use_cdn: bool,
    /// Replaces `https://{project}.api.sanity.io`.
    #[serde(default)]
    pub api_host: Option<String>,
}

impl SanityConfig {
    fn base_url(&self, preview: bool) -> String {
        let host = match &self.api_host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => {
                let api = if self.use_cdn && !preview { "apicdn" } else { "api" };
                format!("https://{}.{api}.sanity.io", self.project_id)
            }
        };
        let version = self.api_version.trim_start_matches('v');
        format!("{host}/v{version}/")
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

/// Sanity document type for each canonical model.
fn document_type(model: ContentModel) -> &'static str {
    match model {
        ContentModel::Page => "page",
        ContentModel::BlogPost => "post",
        ContentModel::Author => "author",
        ContentModel::Category => "category",
        ContentModel::Tag => "tag",
        ContentModel::Navigation => "navigation",
        ContentModel::SiteConfig => "siteSettings",
    }
}

fn model_for_type(doc_type: &str) -> Option<ContentModel> {
    ContentModel::ALL
        .into_iter()
        .find(|model| document_type(*model) == doc_type)
        .or_else(|| doc_type.parse().ok())
}

pub struct SanityClient {
    api: ApiClient,
    dataset: String,
    preview: bool,
}

impl SanityClient {
    pub fn new(config: &SanityConfig, preview: bool, timeout: Duration) -> Result<Self, SourceError> {
        if config.project_id.trim().is_empty() && config.api_host.is_none() {
            return Err(SourceError::Config("sanity project_id is required".to_string()));
        }
        if config.dataset.trim().is_empty() {
            return Err(SourceError::Config("sanity dataset is required".to_string()));
        }
        let api = ApiClient::new(&config.base_url(preview), config.token.clone(), timeout)?;
        Ok(Self {
            api,
            dataset: config.dataset.clone(),
            preview,
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: GroqQuery) -> Result<T, SourceError> {
        let mut pairs = query.into_pairs();
        let perspective = if self.preview { "drafts" } else { "published" };
        pairs.push(("perspective".to_string(), perspective.to_string()));
        let response: QueryResponse<T> = self
            .api
            .get_json(&format!("data/query/{}", self.dataset), &pairs)
            .await?;
        Ok(response.result)
    }

    async fn single(
        &self,
        model: ContentModel,
        key: &str,
        projection: &str,
    ) -> Result<SanityDoc, SourceError> {
        let query = groq::single(document_type(model), key, projection, self.preview);
        self.query::<Option<SanityDoc>>(query)
            .await?
            .ok_or_else(|| SourceError::missing(model, key))
    }

    async fn listing(
        &self,
        model: ContentModel,
        projection: &str,
        query: &ContentQuery,
    ) -> Result<SanityPage, SourceError> {
        let default_order = match model {
            ContentModel::BlogPost => "publishedAt",
            _ => "_updatedAt",
        };
        let groq = groq::listing(
            document_type(model),
            projection,
            query,
            default_order,
            self.preview,
        );
        self.query(groq).await
    }

    fn collect<T>(
        page: SanityPage,
        query: &ContentQuery,
        map: impl Fn(SanityDoc) -> T,
    ) -> Collection<T> {
        let items = page.items.into_iter().map(map).collect();
        Collection::new(items, page.total, query)
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[async_trait]
impl ContentSource for SanityClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Sanity
    }

    async fn page(&self, slug: &str) -> Result<Page, SourceError> {
        let doc = self
            .single(ContentModel::Page, slug, &documents::page_projection())
            .await?;
        Ok(doc.into_page(now()))
    }

    async fn pages(&self, query: &ContentQuery) -> Result<Collection<Page>, SourceError> {
        let page = self
            .listing(ContentModel::Page, &documents::page_projection(), query)
            .await?;
        let now = now();
        Ok(Self::collect(page, query, |doc| doc.into_page(now)))
    }

    async fn blog_post(&self, slug: &str) -> Result<BlogPost, SourceError> {
        let doc = self
            .single(ContentModel::BlogPost, slug, &documents::post_projection())
            .await?;
        Ok(doc.into_post(now()))
    }

    async fn blog_posts(&self, query: &ContentQuery) -> Result<Collection<BlogPost>, SourceError> {
        let page = self
            .listing(ContentModel::BlogPost, &documents::post_projection(), query)
            .await?;
        let now = now();
        Ok(Self::collect(page, query, |doc| doc.into_post(now)))
    }

    async fn author(&self, slug: &str) -> Result<Author, SourceError> {
        let doc = self
            .single(ContentModel::Author, slug, &documents::author_projection())
            .await?;
        Ok(doc.into_author(now()))
    }

    async fn authors(&self, query: &ContentQuery) -> Result<Collection<Author>, SourceError> {
        let page = self
            .listing(ContentModel::Author, &documents::author_projection(), query)
            .await?;
        let now = now();
        Ok(Self::collect(page, query, |doc| doc.into_author(now)))
    }

    async fn category(&self, slug: &str) -> Result<Category, SourceError> {
        let doc = self
            .single(ContentModel::Category, slug, &documents::category_projection())
            .await?;
        Ok(doc.into_category(now()))
    }

    async fn categories(&self, query: &ContentQuery) -> Result<Collection<Category>, SourceError> {
        let page = self
            .listing(ContentModel::Category, &documents::category_projection(), query)
            .await?;
        let now = now();
        Ok(Self::collect(page, query, |doc| doc.into_category(now)))
    }

    async fn tags(&self, query: &ContentQuery) -> Result<Collection<Tag>, SourceError> {
        let page = self
            .listing(ContentModel::Tag, &documents::tag_projection(), query)
            .await?;
        let now = now();
        Ok(Self::collect(page, query, |doc| doc.into_tag(now)))
    }

    async fn navigation(&self, id: &str) -> Result<Navigation, SourceError> {
        let doc = self
            .single(ContentModel::Navigation, id, &documents::navigation_projection())
            .await?;
        Ok(doc.into_navigation(now()))
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        let query = groq::singleton(
            document_type(ContentModel::SiteConfig),
            &documents::site_projection(),
            self.preview,
        );
        let doc = self
            .query::<Option<SanityDoc>>(query)
            .await?
            .ok_or_else(|| SourceError::missing(ContentModel::SiteConfig, "siteSettings"))?;
        Ok(doc.into_site_config(now()))
    }

    /// One GROQ request across both types.
    async fn search(
        &self,
        text: &str,
        scope: Option<SearchType>,
    ) -> Result<Vec<SearchHit>, SourceError> {
        let types: Vec<&str> = SearchType::models(scope)
            .into_iter()
            .map(document_type)
            .collect();
        let query = groq::search(
            &types,
            &documents::search_projection(),
            text,
            SEARCH_LIMIT,
            self.preview,
        );
        let docs: Vec<SanityDoc> = self.query(query).await?;
        let now = now();
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let model = doc.doc_type.as_deref().and_then(model_for_type);
                match model {
                    Some(ContentModel::Page) => Some(SearchHit::Page(doc.into_page(now))),
                    Some(ContentModel::BlogPost) => Some(SearchHit::BlogPost(doc.into_post(now))),
                    _ => None,
                }
            })
            .collect())
    }

    fn webhook_event_header(&self) -> Option<&'static str> {
        Some(OPERATION_HEADER)
    }

    /// GROQ-powered webhooks send the document (or a projection of it) as
    /// the body and the operation in `sanity-operation`.
    fn parse_webhook(
        &self,
        body: &Value,
        event_header: Option<&str>,
        received_at: OffsetDateTime,
    ) -> Option<WebhookPayload> {
        let model = body
            .get("_type")
            .and_then(Value::as_str)
            .and_then(model_for_type)?;
        let raw_id = body.get("_id").and_then(Value::as_str)?;
        let operation =
            event_header.or_else(|| body.get("operation").and_then(Value::as_str));
        let event = match operation {
            Some("create") => WebhookEvent::Created,
            Some("delete") => WebhookEvent::Deleted,
            _ => WebhookEvent::Updated,
        };
        let id = canonical_id(raw_id);
        let slug = body
            .get("slug")
            .and_then(|slug| slug.get("current").or(Some(slug)))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let created_at = parse_timestamp(body.get("_createdAt")).unwrap_or(received_at);

        Some(WebhookPayload {
            event,
            model: model.name().to_string(),
            entry: BaseContentItem {
                id,
                slug,
                created_at,
                updated_at: parse_timestamp(body.get("_updatedAt")).unwrap_or(created_at),
                published_at: parse_timestamp(body.get("publishedAt")),
                status: if raw_id.starts_with("drafts.") {
                    ContentStatus::Draft
                } else {
                    ContentStatus::Published
                },
            },
            provider: ProviderKind::Sanity.as_str().to_string(),
            timestamp: received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn config(server: &MockServer) -> SanityConfig {
        SanityConfig {
            project_id: "abc123".to_string(),
            dataset: "production".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: Some("read-token".to_string()),
            use_cdn: false,
            api_host: Some(server.base_url()),
        }
    }

    fn client(server: &MockServer) -> SanityClient {
        SanityClient::new(&config(server), false, Duration::from_secs(5)).expect("client")
    }

    const QUERY_PATH: &str = "/v2025-02-19/data/query/production";

    #[test]
    fn base_url_follows_cdn_and_preview() {
        let mut config = SanityConfig {
            project_id: "abc123".to_string(),
            dataset: "production".to_string(),
            api_version: "v2024-01-01".to_string(),
            token: None,
            use_cdn: true,
            api_host: None,
        };
        assert_eq!(config.base_url(false), "https://abc123.apicdn.sanity.io/v2024-01-01/");
        assert_eq!(config.base_url(true), "https://abc123.api.sanity.io/v2024-01-01/");
        config.use_cdn = false;
        assert_eq!(config.base_url(false), "https://abc123.api.sanity.io/v2024-01-01/");
    }

    #[test]
    fn missing_project_is_a_config_error() {
        let config = SanityConfig {
            project_id: " ".to_string(),
            dataset: "production".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: None,
            use_cdn: false,
            api_host: None,
        };
        let err = SanityClient::new(&config, false, Duration::from_secs(1)).err();
        assert!(matches!(err, Some(SourceError::Config(_))));
    }

    #[tokio::test]
    async fn fetches_post_by_slug() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path(QUERY_PATH)
                .query_param("$key", "\"hello-world\"")
                .query_param("$type", "\"post\"")
                .query_param("perspective", "published")
                .header("authorization", "Bearer read-token");
            then.status(200).json_body(json!({
                "ms": 3,
                "result": {
                    "id": "post-1",
                    "type": "post",
                    "slug": "hello-world",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-02T00:00:00Z",
                    "title": "Hello world",
                    "body": [{"_type": "block", "children": [{"text": "Hi"}]}],
                    "author": {"id": "a1", "slug": "ada", "name": "Ada"}
                }
            }));
        });

        let post = client(&server).blog_post("hello-world").await.expect("post");
        mock.assert();
        assert_eq!(post.base.id, "post-1");
        assert_eq!(post.author.name, "Ada");
        assert_eq!(post.content.plain_text, "Hi");
    }

    #[tokio::test]
    async fn null_result_is_missing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path(QUERY_PATH);
            then.status(200).json_body(json!({"result": null}));
        });

        let err = client(&server).page("nope").await.expect_err("missing");
        assert!(matches!(
            err,
            SourceError::Missing {
                model: ContentModel::Page,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn listing_reads_items_and_total() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path(QUERY_PATH).query_param("$type", "\"tag\"");
            then.status(200).json_body(json!({
                "result": {
                    "items": [
                        {"id": "t1", "slug": "rust", "name": "Rust"},
                        {"id": "t2", "slug": "web", "name": "Web"}
                    ],
                    "total": 12
                }
            }));
        });

        let query = ContentQuery::new().with_limit(2);
        let tags = client(&server).tags(&query).await.expect("tags");
        assert_eq!(tags.items.len(), 2);
        assert_eq!(tags.total, 12);
        assert_eq!(tags.meta.total_pages, 6);
        assert!(tags.meta.has_next);
    }

    #[tokio::test]
    async fn search_splits_hits_by_type() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET")
                .path(QUERY_PATH)
                .query_param("$search", "\"rust*\"");
            then.status(200).json_body(json!({
                "result": [
                    {"id": "p1", "type": "page", "slug": "about", "title": "About Rust"},
                    {"id": "b1", "type": "post", "slug": "intro", "title": "Intro to Rust"}
                ]
            }));
        });

        let hits = client(&server).search("rust", None).await.expect("search");
        assert!(matches!(hits[0], SearchHit::Page(_)));
        assert!(matches!(hits[1], SearchHit::BlogPost(_)));
    }

    #[test]
    fn native_webhook_is_normalized() {
        let server = MockServer::start();
        let body = json!({
            "_id": "drafts.post-1",
            "_type": "post",
            "slug": {"current": "hello-world"},
            "_createdAt": "2024-01-01T00:00:00Z"
        });
        let received = datetime!(2024-02-01 0:00 UTC);

        let payload = client(&server)
            .parse_webhook(&body, Some("delete"), received)
            .expect("payload");
        assert_eq!(payload.event, WebhookEvent::Deleted);
        assert_eq!(payload.model, "blogPost");
        assert_eq!(payload.entry.id, "post-1");
        assert_eq!(payload.entry.slug, "hello-world");
        assert_eq!(payload.entry.status, ContentStatus::Draft);
        assert_eq!(payload.provider, "sanity");
    }

    #[test]
    fn unknown_document_types_are_ignored() {
        let server = MockServer::start();
        let body = json!({"_id": "x", "_type": "sanity.imageAsset"});
        assert!(
            client(&server)
                .parse_webhook(&body, None, datetime!(2024-02-01 0:00 UTC))
                .is_none()
        );
    }
}
