//! Contentful adapter.
//!
//! Reads the Content Delivery API (`cdn.contentful.com`), or the Content
//! Preview API (`preview.contentful.com`) when the client runs in preview
//! mode. Linked entries and assets are resolved from the `includes` block
//! of each response.

mod entries;
mod rich_text;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use self::entries::{ContentfulEntry, EntriesResponse, EntryMapper, Includes};
use super::http::ApiClient;
use crate::client::transform::{MarkdownRenderer, parse_timestamp};
use crate::client::{ContentSource, SourceError};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, Collection, ContentModel, ContentQuery,
    ContentStatus, Navigation, OrderDirection, Page, ProviderKind, SiteConfig, Tag,
    WebhookEvent, WebhookPayload,
};

const DELIVERY_HOST: &str = "https://cdn.contentful.com";
const PREVIEW_HOST: &str = "https://preview.contentful.com";
const TOPIC_HEADER: &str = "x-contentful-topic";
/// Link levels Contentful expands into `includes`.
const INCLUDE_DEPTH: &str = "2";

fn default_environment() -> String {
    "master".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

/// Content type ids for each canonical model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentfulTypes {
    pub page: String,
    pub blog_post: String,
    pub author: String,
    pub category: String,
    pub tag: String,
    pub navigation: String,
    pub site_config: String,
}

impl Default for ContentfulTypes {
    fn default() -> Self {
        Self {
            page: "page".to_string(),
            blog_post: "blogPost".to_string(),
            author: "author".to_string(),
            category: "category".to_string(),
            tag: "tag".to_string(),
            navigation: "navigation".to_string(),
            site_config: "siteConfig".to_string(),
        }
    }
}

impl ContentfulTypes {
    fn for_model(&self, model: ContentModel) -> &str {
        match model {
            ContentModel::Page => &self.page,
            ContentModel::BlogPost => &self.blog_post,
            ContentModel::Author => &self.author,
            ContentModel::Category => &self.category,
            ContentModel::Tag => &self.tag,
            ContentModel::Navigation => &self.navigation,
            ContentModel::SiteConfig => &self.site_config,
        }
    }

    fn model_for(&self, content_type: &str) -> Option<ContentModel> {
        ContentModel::ALL
            .into_iter()
            .find(|model| self.for_model(*model) == content_type)
            .or_else(|| content_type.parse().ok())
    }
}

/// `[provider]` settings when `kind = "contentful"`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentfulConfig {
    pub space_id: String,
    /// Delivery API token.
    pub access_token: String,
    /// Preview API token; required when preview is enabled.
    #[serde(default)]
    pub preview_token: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Replaces the delivery/preview host.
    #[serde(default)]
    pub api_host: Option<String>,
    #[serde(default)]
    pub content_types: ContentfulTypes,
}

impl ContentfulConfig {
    fn base_url(&self, preview: bool) -> String {
        let host = match &self.api_host {
            Some(host) => host.trim_end_matches('/'),
            None if preview => PREVIEW_HOST,
            None => DELIVERY_HOST,
        };
        format!(
            "{host}/spaces/{}/environments/{}/",
            self.space_id, self.environment
        )
    }
}

pub struct ContentfulClient {
    api: ApiClient,
    locale: String,
    types: ContentfulTypes,
    preview: bool,
    renderer: MarkdownRenderer,
}

/// Contentful query path for a canonical field name.
fn field_path(field: &str) -> String {
    match field {
        "id" => "sys.id".to_string(),
        "createdAt" => "sys.createdAt".to_string(),
        "updatedAt" => "sys.updatedAt".to_string(),
        other => format!("fields.{other}"),
    }
}

impl ContentfulClient {
    pub fn new(
        config: &ContentfulConfig,
        preview: bool,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        if config.space_id.trim().is_empty() {
            return Err(SourceError::Config("contentful space_id is required".to_string()));
        }
        let token = if preview {
            config.preview_token.clone().ok_or_else(|| {
                SourceError::Config("contentful preview_token is required in preview".to_string())
            })?
        } else {
            config.access_token.clone()
        };
        if token.trim().is_empty() {
            return Err(SourceError::Config("contentful access token is required".to_string()));
        }
        let api = ApiClient::new(&config.base_url(preview), Some(token), timeout)?;
        Ok(Self {
            api,
            locale: config.locale.clone(),
            types: config.content_types.clone(),
            preview,
            renderer: MarkdownRenderer::new(),
        })
    }

    fn mapper(&self) -> EntryMapper<'_> {
        EntryMapper {
            renderer: &self.renderer,
            preview: self.preview,
            now: OffsetDateTime::now_utc(),
        }
    }

    async fn entries(
        &self,
        model: ContentModel,
        mut params: Vec<(String, String)>,
    ) -> Result<(Vec<ContentfulEntry>, u64), SourceError> {
        params.extend([
            (
                "content_type".to_string(),
                self.types.for_model(model).to_string(),
            ),
            ("locale".to_string(), self.locale.clone()),
            ("include".to_string(), INCLUDE_DEPTH.to_string()),
        ]);
        let response: EntriesResponse = self.api.get_json("entries", &params).await?;
        let includes = Includes::new(&response.items, response.includes);
        let entries = response
            .items
            .into_iter()
            .map(|item| serde_json::from_value(includes.resolve(item)))
            .collect::<Result<Vec<ContentfulEntry>, _>>()?;
        Ok((entries, response.total))
    }

    async fn single(&self, model: ContentModel, slug: &str) -> Result<ContentfulEntry, SourceError> {
        let params = vec![
            ("fields.slug".to_string(), slug.to_string()),
            ("limit".to_string(), "1".to_string()),
        ];
        let (entries, _) = self.entries(model, params).await?;
        entries
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::missing(model, slug))
    }

    async fn collect<T>(
        &self,
        model: ContentModel,
        query: &ContentQuery,
        map: impl Fn(&EntryMapper<'_>, ContentfulEntry) -> T,
    ) -> Result<Collection<T>, SourceError> {
        let (entries, total) = self.entries(model, self.list_params(model, query)).await?;
        let mapper = self.mapper();
        let items = entries.into_iter().map(|entry| map(&mapper, entry)).collect();
        Ok(Collection::new(items, total, query))
    }

    fn list_params(&self, model: ContentModel, query: &ContentQuery) -> Vec<(String, String)> {
        let mut params = vec![
            ("skip".to_string(), query.effective_offset().to_string()),
            ("limit".to_string(), query.effective_limit().to_string()),
        ];

        let order = match query.order_by.as_deref() {
            Some(field) => field_path(field),
            None if model == ContentModel::BlogPost => "sys.createdAt".to_string(),
            None => "sys.updatedAt".to_string(),
        };
        let order = match query.direction() {
            OrderDirection::Asc => order,
            OrderDirection::Desc => format!("-{order}"),
        };
        params.push(("order".to_string(), order));

        for (field, value) in &query.filters {
            let relation = match field.as_str() {
                "category" => Some(("category", ContentModel::Category)),
                "tag" | "tags" => Some(("tags", ContentModel::Tag)),
                "author" => Some(("author", ContentModel::Author)),
                _ => None,
            };
            match relation {
                Some((field, target)) => {
                    params.push((
                        format!("fields.{field}.sys.contentType.sys.id"),
                        self.types.for_model(target).to_string(),
                    ));
                    params.push((format!("fields.{field}.fields.slug"), value.clone()));
                }
                None => params.push((field_path(field), value.clone())),
            }
        }

        if let Some(text) = query.search_text() {
            params.push(("query".to_string(), text.to_string()));
        }
        params
    }
}

fn topic_event(topic: &str) -> Option<WebhookEvent> {
    let (kind, action) = topic
        .strip_prefix("ContentManagement.")?
        .split_once('.')?;
    if kind != "Entry" {
        return None;
    }
    match action {
        "create" => Some(WebhookEvent::Created),
        "save" | "auto_save" | "unarchive" => Some(WebhookEvent::Updated),
        "publish" => Some(WebhookEvent::Published),
        "unpublish" => Some(WebhookEvent::Unpublished),
        "delete" | "archive" => Some(WebhookEvent::Deleted),
        _ => None,
    }
}

#[async_trait]
impl ContentSource for ContentfulClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Contentful
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
        let params = vec![("limit".to_string(), "1".to_string())];
        let (entries, _) = self.entries(ContentModel::SiteConfig, params).await?;
        let entry = entries.into_iter().next().ok_or_else(|| {
            SourceError::missing(ContentModel::SiteConfig, self.types.site_config.clone())
        })?;
        Ok(self.mapper().site_config(entry))
    }

    fn webhook_event_header(&self) -> Option<&'static str> {
        Some(TOPIC_HEADER)
    }

    /// Management webhooks carry the entry with localized fields
    /// (`fields.slug.en-US`) and the action in `X-Contentful-Topic`.
    fn parse_webhook(
        &self,
        body: &Value,
        event_header: Option<&str>,
        received_at: OffsetDateTime,
    ) -> Option<WebhookPayload> {
        let sys = body.get("sys")?;
        let deleted = sys.get("type").and_then(Value::as_str) == Some("DeletedEntry");
        let event = match event_header.and_then(topic_event) {
            Some(event) => event,
            None if deleted => WebhookEvent::Deleted,
            None => return None,
        };
        let model = sys
            .pointer("/contentType/sys/id")
            .and_then(Value::as_str)
            .and_then(|content_type| self.types.model_for(content_type))?;
        let id = sys.get("id").and_then(Value::as_str)?.to_string();
        let slug = body
            .pointer("/fields/slug")
            .and_then(|slug| slug.get(&self.locale).or(Some(slug)))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let created_at = parse_timestamp(sys.get("createdAt")).unwrap_or(received_at);
        let published_at = parse_timestamp(sys.get("publishedAt"));

        Some(WebhookPayload {
            event,
            model: model.name().to_string(),
            entry: BaseContentItem {
                id,
                slug,
                created_at,
                updated_at: parse_timestamp(sys.get("updatedAt")).unwrap_or(created_at),
                status: if published_at.is_some() && !event.is_removal() {
                    ContentStatus::Published
                } else {
                    ContentStatus::Draft
                },
                published_at,
            },
            provider: ProviderKind::Contentful.as_str().to_string(),
            timestamp: received_at,
        })
    }
}
