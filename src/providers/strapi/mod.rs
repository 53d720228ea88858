//! Strapi adapter.
//!
//! Reads the REST API (`{url}/api/{collection}`) of Strapi 4 or 5. Listing
//! parameters use Strapi's bracket syntax (`pagination[start]`,
//! `filters[slug][$eq]`, ...). Strapi 5 selects drafts with `status`,
//! Strapi 4 with `publicationState`.

mod blocks;
mod entries;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use url::Url;

use self::entries::{EntryMapper, StrapiEntry, flatten};
use super::http::ApiClient;
use crate::client::transform::{MarkdownRenderer, normalize_id, parse_timestamp};
use crate::client::{ContentSource, SourceError};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, Collection, ContentModel, ContentQuery,
    ContentStatus, Navigation, Page, ProviderKind, SiteConfig, Tag, WebhookEvent,
    WebhookPayload,
};

/// Fields matched by free-text search.
const SEARCH_FIELDS: [&str; 3] = ["title", "excerpt", "content"];

/// Relations populated on blog posts.
const POST_POPULATE: [&str; 6] = ["cover", "author", "category", "categories", "tags", "seo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrapiVersion {
    V4,
    #[default]
    V5,
}

/// API ids (plural for collection types) for each canonical model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrapiCollections {
    pub pages: String,
    pub posts: String,
    pub authors: String,
    pub categories: String,
    pub tags: String,
    pub navigation: String,
    /// Single type.
    pub site_config: String,
}

impl Default for StrapiCollections {
    fn default() -> Self {
        Self {
            pages: "pages".to_string(),
            posts: "articles".to_string(),
            authors: "authors".to_string(),
            categories: "categories".to_string(),
            tags: "tags".to_string(),
            navigation: "navigations".to_string(),
            site_config: "global".to_string(),
        }
    }
}

impl StrapiCollections {
    fn for_model(&self, model: ContentModel) -> &str {
        match model {
            ContentModel::Page => &self.pages,
            ContentModel::BlogPost => &self.posts,
            ContentModel::Author => &self.authors,
            ContentModel::Category => &self.categories,
            ContentModel::Tag => &self.tags,
            ContentModel::Navigation => &self.navigation,
            ContentModel::SiteConfig => &self.site_config,
        }
    }

    /// Model for a webhook `model` field (the singular API id).
    fn model_for(&self, name: &str) -> Option<ContentModel> {
        ContentModel::ALL
            .into_iter()
            .find(|model| {
                let collection = self.for_model(*model);
                collection == name || collection.trim_end_matches('s') == name
            })
            .or_else(|| name.parse().ok())
    }
}

/// `[provider]` settings when `kind = "strapi"`.
#[derive(Debug, Clone, Deserialize)]
pub struct StrapiConfig {
    /// Server root, e.g. `http://localhost:1337`.
    pub url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub version: StrapiVersion,
    #[serde(default)]
    pub collections: StrapiCollections,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    total: u64,
}

pub struct StrapiClient {
    api: ApiClient,
    media_base: Url,
    version: StrapiVersion,
    collections: StrapiCollections,
    preview: bool,
    renderer: MarkdownRenderer,
}

impl StrapiClient {
    pub fn new(config: &StrapiConfig, preview: bool, timeout: Duration) -> Result<Self, SourceError> {
        let root = config.url.trim().trim_end_matches('/');
        if root.is_empty() {
            return Err(SourceError::Config("strapi url is required".to_string()));
        }
        let media_base = Url::parse(&format!("{root}/"))
            .map_err(|err| SourceError::Config(format!("invalid strapi url `{root}`: {err}")))?;
        let api = ApiClient::new(&format!("{root}/api"), config.api_token.clone(), timeout)?;
        Ok(Self {
            api,
            media_base,
            version: config.version,
            collections: config.collections.clone(),
            preview,
            renderer: MarkdownRenderer::new(),
        })
    }

    fn mapper(&self) -> EntryMapper<'_> {
        EntryMapper {
            renderer: &self.renderer,
            media_base: &self.media_base,
            now: OffsetDateTime::now_utc(),
        }
    }

    fn publication_param(&self) -> (String, String) {
        match self.version {
            StrapiVersion::V5 => (
                "status".to_string(),
                if self.preview { "draft" } else { "published" }.to_string(),
            ),
            StrapiVersion::V4 => (
                "publicationState".to_string(),
                if self.preview { "preview" } else { "live" }.to_string(),
            ),
        }
    }

    fn populate_params(model: ContentModel) -> Vec<(String, String)> {
        match model {
            ContentModel::BlogPost => POST_POPULATE
                .iter()
                .enumerate()
                .map(|(index, relation)| (format!("populate[{index}]"), (*relation).to_string()))
                .collect(),
            _ => vec![("populate".to_string(), "*".to_string())],
        }
    }

    async fn fetch(
        &self,
        model: ContentModel,
        mut params: Vec<(String, String)>,
    ) -> Result<Envelope, SourceError> {
        params.extend(Self::populate_params(model));
        params.push(self.publication_param());
        self.api
            .get_json(self.collections.for_model(model), &params)
            .await
    }

    async fn single(&self, model: ContentModel, slug: &str) -> Result<StrapiEntry, SourceError> {
        let params = vec![
            ("filters[slug][$eq]".to_string(), slug.to_string()),
            ("pagination[limit]".to_string(), "1".to_string()),
        ];
        let envelope = self.fetch(model, params).await?;
        let first = match flatten(envelope.data) {
            Value::Array(items) => items.into_iter().next(),
            Value::Null => None,
            other => Some(other),
        };
        let entry = first.ok_or_else(|| SourceError::missing(model, slug))?;
        Ok(serde_json::from_value(entry)?)
    }

    async fn listing(
        &self,
        model: ContentModel,
        query: &ContentQuery,
    ) -> Result<(Vec<StrapiEntry>, u64), SourceError> {
        let envelope = self.fetch(model, list_params(model, query)).await?;
        let entries: Vec<StrapiEntry> = match flatten(envelope.data) {
            Value::Null => Vec::new(),
            data => serde_json::from_value(data)?,
        };
        let total = envelope
            .meta
            .pagination
            .map(|pagination| pagination.total)
            .unwrap_or(entries.len() as u64);
        Ok((entries, total))
    }

    async fn collect<T>(
        &self,
        model: ContentModel,
        query: &ContentQuery,
        map: impl Fn(&EntryMapper<'_>, StrapiEntry) -> T,
    ) -> Result<Collection<T>, SourceError> {
        let (entries, total) = self.listing(model, query).await?;
        let mapper = self.mapper();
        let items = entries.into_iter().map(|entry| map(&mapper, entry)).collect();
        Ok(Collection::new(items, total, query))
    }
}

/// Strapi field for a canonical field name.
fn field_name(field: &str) -> &str {
    match field {
        "id" => "documentId",
        other => other,
    }
}

fn list_params(model: ContentModel, query: &ContentQuery) -> Vec<(String, String)> {
    let mut params = vec![
        (
            "pagination[start]".to_string(),
            query.effective_offset().to_string(),
        ),
        (
            "pagination[limit]".to_string(),
            query.effective_limit().to_string(),
        ),
        ("pagination[withCount]".to_string(), "true".to_string()),
    ];

    let default_order = match model {
        ContentModel::BlogPost => "publishedAt",
        _ => "updatedAt",
    };
    let order = query.order_by.as_deref().unwrap_or(default_order);
    params.push((
        "sort".to_string(),
        format!("{}:{}", field_name(order), query.direction().as_str()),
    ));

    for (field, value) in &query.filters {
        let key = match field.as_str() {
            "category" => "filters[category][slug][$eq]".to_string(),
            "tag" | "tags" => "filters[tags][slug][$eq]".to_string(),
            "author" => "filters[author][slug][$eq]".to_string(),
            other => format!("filters[{}][$eq]", field_name(other)),
        };
        params.push((key, value.clone()));
    }

    if let Some(text) = query.search_text() {
        for (index, field) in SEARCH_FIELDS.iter().enumerate() {
            params.push((
                format!("filters[$or][{index}][{field}][$containsi]"),
                text.to_string(),
            ));
        }
    }
    params
}

fn webhook_event(event: &str) -> Option<WebhookEvent> {
    match event {
        "entry.create" => Some(WebhookEvent::Created),
        "entry.update" => Some(WebhookEvent::Updated),
        "entry.delete" => Some(WebhookEvent::Deleted),
        "entry.publish" => Some(WebhookEvent::Published),
        "entry.unpublish" => Some(WebhookEvent::Unpublished),
        _ => None,
    }
}

#[async_trait]
impl ContentSource for StrapiClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Strapi
    }

    async fn page(&self, slug: &str) -> Result<Page, SourceError> {
        let entry = self.single(ContentModel::Page, slug).await?;
        Ok(self.mapper().page(entry))
    }

    async fn pages(&self, query: &ContentQuery) -> Result<Collection<Page>, SourceError> {
        self.collect(ContentModel::Page, query, |mapper, entry| mapper.page(entry))
            .await
    }

    async fn blog_post(&self, slug: &str) -> Result<BlogPost, SourceError> {
        let entry = self.single(ContentModel::BlogPost, slug).await?;
        Ok(self.mapper().post(entry))
    }

    async fn blog_posts(&self, query: &ContentQuery) -> Result<Collection<BlogPost>, SourceError> {
        self.collect(ContentModel::BlogPost, query, |mapper, entry| mapper.post(entry))
            .await
    }

    async fn author(&self, slug: &str) -> Result<Author, SourceError> {
        let entry = self.single(ContentModel::Author, slug).await?;
        Ok(self.mapper().author(entry))
    }

    async fn authors(&self, query: &ContentQuery) -> Result<Collection<Author>, SourceError> {
        self.collect(ContentModel::Author, query, |mapper, entry| mapper.author(entry))
            .await
    }

    async fn category(&self, slug: &str) -> Result<Category, SourceError> {
        let entry = self.single(ContentModel::Category, slug).await?;
        Ok(self.mapper().category(entry))
    }

    async fn categories(&self, query: &ContentQuery) -> Result<Collection<Category>, SourceError> {
        self.collect(ContentModel::Category, query, |mapper, entry| {
            mapper.category(entry)
        })
        .await
    }

    async fn tags(&self, query: &ContentQuery) -> Result<Collection<Tag>, SourceError> {
        self.collect(ContentModel::Tag, query, |mapper, entry| mapper.tag(entry))
            .await
    }

    async fn navigation(&self, id: &str) -> Result<Navigation, SourceError> {
        let entry = self.single(ContentModel::Navigation, id).await?;
        Ok(self.mapper().navigation(entry))
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        let envelope = self.fetch(ContentModel::SiteConfig, Vec::new()).await?;
        let data = flatten(envelope.data);
        if data.is_null() {
            return Err(SourceError::missing(
                ContentModel::SiteConfig,
                self.collections.site_config.clone(),
            ));
        }
        let entry: StrapiEntry = serde_json::from_value(data)?;
        Ok(self.mapper().site_config(entry))
    }

    /// Strapi's webhook body: `{event, model, entry, createdAt}`, with
    /// `model` being the singular API id.
    fn parse_webhook(
        &self,
        body: &Value,
        _event_header: Option<&str>,
        received_at: OffsetDateTime,
    ) -> Option<WebhookPayload> {
        let event = body
            .get("event")
            .and_then(Value::as_str)
            .and_then(webhook_event)?;
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .and_then(|name| self.collections.model_for(name))?;
        let entry = flatten(body.get("entry")?.clone());

        let id = entry
            .get("documentId")
            .and_then(normalize_id)
            .or_else(|| entry.get("id").and_then(normalize_id))?;
        let slug = entry
            .get("slug")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let created_at = parse_timestamp(entry.get("createdAt")).unwrap_or(received_at);
        let published_at = parse_timestamp(entry.get("publishedAt"));

        Some(WebhookPayload {
            event,
            model: model.name().to_string(),
            entry: BaseContentItem {
                id,
                slug,
                created_at,
                updated_at: parse_timestamp(entry.get("updatedAt")).unwrap_or(created_at),
                status: if published_at.is_some() {
                    ContentStatus::Published
                } else {
                    ContentStatus::Draft
                },
                published_at,
            },
            provider: ProviderKind::Strapi.as_str().to_string(),
            timestamp: parse_timestamp(body.get("createdAt")).unwrap_or(received_at),
        })
    }
}
