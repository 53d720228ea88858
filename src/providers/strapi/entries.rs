//! Strapi entries and their canonical mapping.
//!
//! Strapi 4 wraps every entry in `{id, attributes}` and every relation in
//! `{data: ...}`; Strapi 5 returns flat documents. [`flatten`] folds the
//! former into the latter so one set of types covers both.

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use url::Url;

use super::blocks;
use crate::client::transform::{
    MarkdownRenderer, author_or_unknown, cap_related, collapse_whitespace, derive_excerpt,
    mime_from_filename, normalize_id, parse_rfc3339, seo_or_derived, string_map,
};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, ContentStatus, MediaAsset, Navigation,
    NavigationItem, Page, PostSummary, RichTextContent, SeoMetadata, SiteConfig, Tag,
};

/// Fold v4 envelopes (`attributes`, `{data}` relations) into flat objects.
pub(super) fn flatten(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            let is_relation = map.contains_key("data")
                && map.keys().all(|key| key == "data" || key == "meta");
            if is_relation {
                return map.remove("data").map(flatten).unwrap_or(Value::Null);
            }
            if let Some(Value::Object(attributes)) = map.remove("attributes") {
                for (key, value) in attributes {
                    map.entry(key).or_insert(value);
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, flatten(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(flatten).collect()),
        other => other,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct StrapiEntry {
    pub id: Option<Value>,
    pub document_id: Option<String>,
    pub slug: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub published_at: Option<String>,
    #[serde(alias = "siteName")]
    pub title: Option<String>,
    pub name: Option<String>,
    pub excerpt: Option<String>,
    #[serde(alias = "siteDescription")]
    pub description: Option<String>,
    pub content: Option<Value>,
    pub body: Option<Value>,
    pub blocks: Option<Vec<Value>>,
    pub bio: Option<Value>,
    pub email: Option<String>,
    pub cover: Option<StrapiMedia>,
    pub featured_image: Option<StrapiMedia>,
    pub image: Option<StrapiMedia>,
    pub avatar: Option<StrapiMedia>,
    pub logo: Option<StrapiMedia>,
    pub favicon: Option<StrapiMedia>,
    pub template: Option<String>,
    pub parent: Option<Box<StrapiEntry>>,
    pub author: Option<Box<StrapiEntry>>,
    pub category: Option<Box<StrapiEntry>>,
    pub categories: Option<Vec<StrapiEntry>>,
    pub tags: Option<Vec<StrapiEntry>>,
    pub related_posts: Option<Vec<StrapiEntry>>,
    pub items: Option<Vec<StrapiNavItem>>,
    pub url: Option<String>,
    pub social: Option<Value>,
    #[serde(alias = "defaultSeo")]
    pub seo: Option<StrapiSeo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct StrapiMedia {
    pub id: Option<Value>,
    pub document_id: Option<String>,
    pub url: Option<String>,
    pub mime: Option<String>,
    pub name: Option<String>,
    pub alternative_text: Option<String>,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Kilobytes, as Strapi reports it.
    pub size: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct StrapiSeo {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    /// Comma-separated.
    pub keywords: Option<String>,
    #[serde(alias = "shareImage")]
    pub meta_image: Option<StrapiMedia>,
    pub canonical_url: Option<String>,
    pub meta_robots: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct StrapiNavItem {
    #[serde(alias = "title")]
    pub label: Option<String>,
    #[serde(alias = "path", alias = "url")]
    pub href: Option<String>,
    pub external: Option<bool>,
    #[serde(alias = "items")]
    pub children: Option<Vec<StrapiNavItem>>,
}

/// Shared context for turning entries into canonical values.
pub(super) struct EntryMapper<'a> {
    pub renderer: &'a MarkdownRenderer,
    pub media_base: &'a Url,
    pub now: OffsetDateTime,
}

impl StrapiEntry {
    /// `documentId` when present (Strapi 5), otherwise the numeric id.
    pub fn canonical_id(&self) -> String {
        self.document_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.id.as_ref().and_then(normalize_id))
            .unwrap_or_default()
    }

    fn title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

impl EntryMapper<'_> {
    fn base(&self, entry: &StrapiEntry) -> BaseContentItem {
        let id = entry.canonical_id();
        let created_at = entry.created_at.as_deref().and_then(parse_rfc3339);
        let updated_at = entry.updated_at.as_deref().and_then(parse_rfc3339);
        let published_at = entry.published_at.as_deref().and_then(parse_rfc3339);
        BaseContentItem {
            slug: entry.slug.clone().unwrap_or_else(|| id.clone()),
            id,
            created_at: created_at.or(updated_at).unwrap_or(self.now),
            updated_at: updated_at.or(created_at).unwrap_or(self.now),
            status: if published_at.is_some() {
                ContentStatus::Published
            } else {
                ContentStatus::Draft
            },
            published_at,
        }
    }

    fn rich_text(&self, value: &Value) -> RichTextContent {
        match value {
            Value::String(markdown) => self.renderer.render(markdown),
            Value::Array(_) => blocks::render(value),
            _ => RichTextContent::default(),
        }
    }

    /// Body from `content`, `body`, or the `shared.rich-text` components of
    /// a dynamic zone.
    fn content(&self, entry: &StrapiEntry) -> RichTextContent {
        if let Some(value) = entry.content.as_ref().or(entry.body.as_ref()) {
            return self.rich_text(value);
        }
        let markdown: Vec<&str> = entry
            .blocks
            .iter()
            .flatten()
            .filter(|block| {
                block.get("__component").and_then(Value::as_str) == Some("shared.rich-text")
            })
            .filter_map(|block| block.get("body").and_then(Value::as_str))
            .collect();
        if markdown.is_empty() {
            RichTextContent::default()
        } else {
            self.renderer.render(&markdown.join("\n\n"))
        }
    }

    pub fn media(&self, media: StrapiMedia) -> Option<MediaAsset> {
        let raw_url = media.url?;
        let url = self
            .media_base
            .join(&raw_url)
            .map(String::from)
            .unwrap_or(raw_url);
        let filename = media
            .name
            .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());
        Some(MediaAsset {
            id: media
                .document_id
                .or_else(|| media.id.as_ref().and_then(normalize_id))
                .unwrap_or_else(|| url.clone()),
            mime_type: media.mime.unwrap_or_else(|| mime_from_filename(&filename)),
            url,
            filename,
            alt: media.alternative_text,
            title: media.caption,
            width: media.width,
            height: media.height,
            size: media.size.map(|kb| (kb * 1024.0).round() as u64),
        })
    }

    fn first_media(&self, candidates: [Option<StrapiMedia>; 3]) -> Option<MediaAsset> {
        candidates
            .into_iter()
            .flatten()
            .find_map(|media| self.media(media))
    }

    fn seo(&self, seo: Option<StrapiSeo>) -> Option<SeoMetadata> {
        let seo = seo?;
        let robots = seo.meta_robots.unwrap_or_default().to_ascii_lowercase();
        Some(SeoMetadata {
            title: seo.meta_title.unwrap_or_default(),
            description: seo.meta_description.unwrap_or_default(),
            keywords: seo
                .keywords
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(str::to_string)
                .collect(),
            og_title: None,
            og_description: None,
            og_image: seo.meta_image.and_then(|media| self.media(media)),
            canonical_url: seo.canonical_url,
            no_index: robots.contains("noindex"),
            no_follow: robots.contains("nofollow"),
        })
    }

    pub fn page(&self, entry: StrapiEntry) -> Page {
        let base = self.base(&entry);
        let content = self.content(&entry);
        let title = entry.title();
        let excerpt = entry
            .excerpt
            .or(entry.description)
            .or_else(|| derive_excerpt(&content.plain_text));
        let featured_image = self.first_media([entry.featured_image, entry.cover, entry.image]);
        Page {
            seo: seo_or_derived(
                self.seo(entry.seo),
                &title,
                excerpt.as_deref(),
                featured_image.as_ref(),
            ),
            base,
            title,
            excerpt,
            content,
            featured_image,
            template: entry.template,
            parent_id: entry.parent.map(|parent| parent.canonical_id()),
        }
    }

    pub fn author(&self, entry: StrapiEntry) -> Author {
        let bio = match &entry.bio {
            Some(Value::String(text)) => Some(text.clone()),
            Some(value @ Value::Array(_)) => {
                Some(blocks::render(value).plain_text).filter(|text| !text.is_empty())
            }
            _ => None,
        };
        Author {
            base: self.base(&entry),
            name: entry.title(),
            bio,
            email: entry.email,
            avatar: self.first_media([entry.avatar, entry.image, None]),
            social: string_map(entry.social.as_ref()),
        }
    }

    pub fn category(&self, entry: StrapiEntry) -> Category {
        Category {
            base: self.base(&entry),
            name: entry.title(),
            description: entry.description,
            parent_id: entry.parent.map(|parent| parent.canonical_id()),
        }
    }

    pub fn tag(&self, entry: StrapiEntry) -> Tag {
        Tag {
            base: self.base(&entry),
            name: entry.title(),
        }
    }

    fn summary(&self, entry: StrapiEntry) -> PostSummary {
        PostSummary {
            id: entry.canonical_id(),
            title: entry.title(),
            slug: entry.slug.unwrap_or_default(),
            excerpt: entry.excerpt.or(entry.description),
            featured_image: self.first_media([entry.featured_image, entry.cover, entry.image]),
        }
    }

    pub fn post(&self, entry: StrapiEntry) -> BlogPost {
        let base = self.base(&entry);
        let content = self.content(&entry);
        let title = entry.title();
        let excerpt = entry
            .excerpt
            .or(entry.description)
            .or_else(|| derive_excerpt(&content.plain_text));
        let featured_image = self.first_media([entry.featured_image, entry.cover, entry.image]);

        let mut categories: Vec<Category> = entry
            .categories
            .unwrap_or_default()
            .into_iter()
            .map(|category| self.category(category))
            .collect();
        if let Some(category) = entry.category {
            categories.push(self.category(*category));
        }
        let related = entry
            .related_posts
            .unwrap_or_default()
            .into_iter()
            .map(|related| self.summary(related))
            .collect();

        BlogPost {
            seo: seo_or_derived(
                self.seo(entry.seo),
                &title,
                excerpt.as_deref(),
                featured_image.as_ref(),
            ),
            related_posts: cap_related(related, &base.id),
            base,
            title,
            excerpt,
            content,
            featured_image,
            author: author_or_unknown(entry.author.map(|author| self.author(*author)), self.now),
            categories,
            tags: entry
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|tag| self.tag(tag))
                .collect(),
        }
    }

    pub fn navigation(&self, entry: StrapiEntry) -> Navigation {
        Navigation {
            base: self.base(&entry),
            title: entry.title(),
            items: entry
                .items
                .unwrap_or_default()
                .into_iter()
                .filter_map(nav_item)
                .collect(),
        }
    }

    pub fn site_config(&self, entry: StrapiEntry) -> SiteConfig {
        let base = self.base(&entry);
        let title = entry.title();
        let description = entry.description.map(|text| collapse_whitespace(&text));
        let logo = self.first_media([entry.logo, entry.image, None]);
        SiteConfig {
            seo: seo_or_derived(
                self.seo(entry.seo),
                &title,
                description.as_deref(),
                logo.as_ref(),
            ),
            base,
            title,
            description,
            url: entry.url,
            logo,
            favicon: entry.favicon.and_then(|media| self.media(media)),
            social: string_map(entry.social.as_ref()),
        }
    }
}

fn nav_item(item: StrapiNavItem) -> Option<NavigationItem> {
    let label = item.label?;
    let href = item.href.unwrap_or_else(|| "#".to_string());
    Some(NavigationItem {
        external: item
            .external
            .unwrap_or_else(|| href.starts_with("http://") || href.starts_with("https://")),
        label,
        href,
        children: item
            .children
            .unwrap_or_default()
            .into_iter()
            .filter_map(nav_item)
            .collect(),
    })
}
