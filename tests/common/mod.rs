#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::datetime;
use tower::ServiceExt;

use contentgate::client::{ClientOptions, CmsClient, ContentSource, SourceError};
use contentgate::domain::{
    Author, BaseContentItem, BlogPost, Category, Collection, ContentModel, ContentQuery,
    ContentStatus, Navigation, NavigationItem, Page, ProviderKind, RichTextContent, SeoMetadata,
    SiteConfig, Tag,
};
use contentgate::infra::http::{HttpState, build_router};
use contentgate::registry::ClientRegistry;
use contentgate::revalidation::{PathPurger, PurgeError, Revalidator};

pub const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

pub fn base(id: &str, slug: &str) -> BaseContentItem {
    BaseContentItem {
        id: id.to_string(),
        slug: slug.to_string(),
        created_at: NOW,
        updated_at: NOW,
        published_at: Some(NOW),
        status: ContentStatus::Published,
    }
}

fn rich_text(text: &str) -> RichTextContent {
    RichTextContent {
        raw: Value::String(text.to_string()),
        html: format!("<p>{text}</p>"),
        plain_text: text.to_string(),
        markdown: Some(text.to_string()),
    }
}

pub fn page(id: &str, slug: &str) -> Page {
    Page {
        base: base(id, slug),
        title: slug.to_string(),
        excerpt: None,
        content: rich_text("About us"),
        featured_image: None,
        template: None,
        parent_id: None,
        seo: SeoMetadata::derived(slug, ""),
    }
}

pub fn post(id: &str, slug: &str) -> BlogPost {
    BlogPost {
        base: base(id, slug),
        title: slug.to_string(),
        excerpt: Some("First post".to_string()),
        content: rich_text("Hello"),
        featured_image: None,
        author: Author::unknown(NOW),
        categories: Vec::new(),
        tags: Vec::new(),
        related_posts: Vec::new(),
        seo: SeoMetadata::derived(slug, "First post"),
    }
}

/// In-memory backend that counts calls and can be switched into failure.
#[derive(Default)]
pub struct StubSource {
    calls: AtomicUsize,
    failure: Mutex<Option<u16>>,
    last_query: Mutex<Option<ContentQuery>>,
}

impl StubSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, status: Option<u16>) {
        *self.failure.lock().expect("failure lock") = status;
    }

    pub fn last_query(&self) -> Option<ContentQuery> {
        self.last_query.lock().expect("query lock").clone()
    }

    fn tick(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.failure.lock().expect("failure lock") {
            Some(status) => Err(SourceError::Status {
                status,
                body: "stub failure".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn record(&self, query: &ContentQuery) {
        *self.last_query.lock().expect("query lock") = Some(query.clone());
    }
}

#[async_trait]
impl ContentSource for StubSource {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Sanity
    }

    async fn page(&self, slug: &str) -> Result<Page, SourceError> {
        self.tick()?;
        match slug {
            "missing" => Err(SourceError::missing(ContentModel::Page, slug)),
            _ => Ok(page("p1", slug)),
        }
    }

    async fn pages(&self, query: &ContentQuery) -> Result<Collection<Page>, SourceError> {
        self.tick()?;
        self.record(query);
        Ok(Collection::new(vec![page("p1", "about")], 1, query))
    }

    async fn blog_post(&self, slug: &str) -> Result<BlogPost, SourceError> {
        self.tick()?;
        Ok(post("42", slug))
    }

    async fn blog_posts(&self, query: &ContentQuery) -> Result<Collection<BlogPost>, SourceError> {
        self.tick()?;
        self.record(query);
        Ok(Collection::new(vec![post("42", "hello-world")], 1, query))
    }

    async fn author(&self, slug: &str) -> Result<Author, SourceError> {
        self.tick()?;
        let mut author = Author::unknown(NOW);
        author.base = base("a1", slug);
        author.name = "Ada".to_string();
        Ok(author)
    }

    async fn authors(&self, query: &ContentQuery) -> Result<Collection<Author>, SourceError> {
        self.tick()?;
        Ok(Collection::new(Vec::new(), 0, query))
    }

    async fn category(&self, slug: &str) -> Result<Category, SourceError> {
        self.tick()?;
        Ok(Category {
            base: base("c1", slug),
            name: slug.to_string(),
            description: None,
            parent_id: None,
        })
    }

    async fn categories(
        &self,
        query: &ContentQuery,
    ) -> Result<Collection<Category>, SourceError> {
        self.tick()?;
        Ok(Collection::new(Vec::new(), 0, query))
    }

    async fn tags(&self, query: &ContentQuery) -> Result<Collection<Tag>, SourceError> {
        self.tick()?;
        Ok(Collection::new(Vec::new(), 0, query))
    }

    async fn navigation(&self, id: &str) -> Result<Navigation, SourceError> {
        self.tick()?;
        Ok(Navigation {
            base: base(id, id),
            title: "Main".to_string(),
            items: vec![NavigationItem {
                label: "Blog".to_string(),
                href: "/blog".to_string(),
                external: false,
                children: Vec::new(),
            }],
        })
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        self.tick()?;
        Ok(SiteConfig {
            base: base("site", "site"),
            title: "Example".to_string(),
            description: None,
            url: Some("https://example.com".to_string()),
            logo: None,
            favicon: None,
            social: Default::default(),
            seo: SeoMetadata::derived("Example", ""),
        })
    }
}

/// Records purged path sets.
#[derive(Default)]
pub struct RecordingPurger {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingPurger {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("purger lock").clone()
    }
}

#[async_trait]
impl PathPurger for RecordingPurger {
    async fn purge(&self, paths: &[String]) -> Result<(), PurgeError> {
        self.calls.lock().expect("purger lock").push(paths.to_vec());
        Ok(())
    }
}

pub struct Harness {
    pub source: Arc<StubSource>,
    pub client: Arc<CmsClient>,
    pub purger: Arc<RecordingPurger>,
    pub router: Router,
}

pub fn harness(secret: Option<&str>) -> Harness {
    let source = Arc::new(StubSource::default());
    let client = Arc::new(CmsClient::new(source.clone(), ClientOptions::default()));
    let registry = Arc::new(ClientRegistry::new(ClientOptions::default()));
    registry.register(client.clone());

    let purger = Arc::new(RecordingPurger::default());
    let revalidator = Arc::new(Revalidator::new(registry, purger.clone()));
    let state = HttpState::new(
        revalidator,
        ProviderKind::Sanity,
        secret.map(str::to_string),
    );

    Harness {
        source,
        client,
        purger,
        router: build_router(state),
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (Response<Body>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let (parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (Response::from_parts(parts, Body::empty()), json)
}
