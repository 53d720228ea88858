//! Contentful entries, link resolution and canonical mapping.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::rich_text::{self, absolute_asset_url};
use crate::client::transform::{
    MarkdownRenderer, author_or_unknown, cap_related, derive_excerpt, mime_from_filename,
    parse_rfc3339, seo_or_derived, string_map,
};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, ContentStatus, MediaAsset, Navigation,
    NavigationItem, Page, PostSummary, RichTextContent, SeoMetadata, SiteConfig, Tag,
};

/// Nesting depth up to which links are replaced by their targets.
const MAX_LINK_DEPTH: usize = 4;

/// `GET /entries` response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct EntriesResponse {
    pub total: u64,
    pub items: Vec<Value>,
    pub includes: RawIncludes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawIncludes {
    #[serde(rename = "Entry")]
    pub entries: Vec<Value>,
    #[serde(rename = "Asset")]
    pub assets: Vec<Value>,
}

/// Linked entries and assets of one response, by id.
pub(super) struct Includes {
    entries: HashMap<String, Value>,
    assets: HashMap<String, Value>,
}

fn sys_id(value: &Value) -> Option<&str> {
    value.pointer("/sys/id").and_then(Value::as_str)
}

impl Includes {
    /// Top-level items are indexed too: entries may link to each other.
    pub fn new(items: &[Value], raw: RawIncludes) -> Self {
        let index = |values: Vec<Value>| -> HashMap<String, Value> {
            values
                .into_iter()
                .filter_map(|value| sys_id(&value).map(|id| (id.to_string(), value.clone())))
                .collect()
        };
        let mut entries = index(raw.entries);
        for item in items {
            if let Some(id) = sys_id(item) {
                entries.entry(id.to_string()).or_insert_with(|| item.clone());
            }
        }
        Self {
            entries,
            assets: index(raw.assets),
        }
    }

    /// Replace `{"sys": {"type": "Link"}}` objects with their targets.
    /// Links that cannot be resolved become `null`.
    pub fn resolve(&self, value: Value) -> Value {
        self.resolve_at(value, 0)
    }

    fn resolve_at(&self, value: Value, depth: usize) -> Value {
        match value {
            Value::Object(map) => {
                let link = map
                    .get("sys")
                    .filter(|sys| sys.get("type").and_then(Value::as_str) == Some("Link"));
                if let Some(sys) = link {
                    if depth >= MAX_LINK_DEPTH {
                        return Value::Null;
                    }
                    let id = sys.get("id").and_then(Value::as_str).unwrap_or_default();
                    let target = match sys.get("linkType").and_then(Value::as_str) {
                        Some("Asset") => self.assets.get(id),
                        _ => self.entries.get(id),
                    };
                    return target
                        .cloned()
                        .map(|target| self.resolve_at(target, depth + 1))
                        .unwrap_or(Value::Null);
                }
                Value::Object(
                    map.into_iter()
                        .map(|(key, value)| {
                            let resolved = if key == "sys" {
                                value
                            } else {
                                self.resolve_at(value, depth)
                            };
                            (key, resolved)
                        })
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.resolve_at(item, depth))
                    .filter(|item| !item.is_null())
                    .collect(),
            ),
            other => other,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct Sys {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub published_at: Option<String>,
    pub published_version: Option<u64>,
    pub content_type: Option<Value>,
}

impl Sys {
    pub fn content_type_id(&self) -> Option<&str> {
        self.content_type
            .as_ref()
            .and_then(|content_type| content_type.pointer("/sys/id"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ContentfulEntry {
    pub sys: Sys,
    pub fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct Fields {
    #[serde(alias = "siteName")]
    pub title: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    #[serde(alias = "siteDescription")]
    pub description: Option<String>,
    #[serde(alias = "body")]
    pub content: Option<Value>,
    #[serde(alias = "publishDate")]
    pub published_at: Option<String>,
    pub bio: Option<Value>,
    pub email: Option<String>,
    #[serde(alias = "heroImage")]
    pub featured_image: Option<Asset>,
    pub image: Option<Asset>,
    pub avatar: Option<Asset>,
    pub logo: Option<Asset>,
    pub favicon: Option<Asset>,
    pub template: Option<String>,
    pub parent: Option<Box<ContentfulEntry>>,
    pub author: Option<Box<ContentfulEntry>>,
    pub category: Option<Box<ContentfulEntry>>,
    pub categories: Vec<ContentfulEntry>,
    pub tags: Vec<ContentfulEntry>,
    pub related_posts: Vec<ContentfulEntry>,
    pub items: Vec<Value>,
    pub url: Option<String>,
    pub social: Option<Value>,
    pub seo: Option<Box<ContentfulEntry>>,
    // SEO entry fields.
    pub keywords: Vec<String>,
    pub no_index: bool,
    pub no_follow: bool,
    pub canonical_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Asset {
    pub sys: Sys,
    pub fields: AssetFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct AssetFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: Option<AssetFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct AssetFile {
    pub url: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub details: Option<Value>,
}

impl Asset {
    fn into_media(self) -> Option<MediaAsset> {
        let file = self.fields.file.filter(|file| !file.url.is_empty())?;
        let url = absolute_asset_url(&file.url);
        let filename = file
            .file_name
            .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());
        let details = file.details.unwrap_or_default();
        let dimension = |key: &str| {
            details
                .pointer(&format!("/image/{key}"))
                .and_then(Value::as_u64)
                .and_then(|value| u32::try_from(value).ok())
        };
        Some(MediaAsset {
            id: if self.sys.id.is_empty() {
                url.clone()
            } else {
                self.sys.id
            },
            mime_type: file
                .content_type
                .unwrap_or_else(|| mime_from_filename(&filename)),
            width: dimension("width"),
            height: dimension("height"),
            size: details.get("size").and_then(Value::as_u64),
            url,
            filename,
            alt: self.fields.description,
            title: self.fields.title,
        })
    }
}

fn first_media(candidates: [Option<Asset>; 3]) -> Option<MediaAsset> {
    candidates.into_iter().flatten().find_map(Asset::into_media)
}

/// Shared context for turning entries into canonical values.
pub(super) struct EntryMapper<'a> {
    pub renderer: &'a MarkdownRenderer,
    pub preview: bool,
    pub now: OffsetDateTime,
}

impl ContentfulEntry {
    fn title(&self) -> String {
        self.fields
            .title
            .clone()
            .or_else(|| self.fields.name.clone())
            .unwrap_or_default()
    }
}

impl EntryMapper<'_> {
    fn base(&self, entry: &ContentfulEntry) -> BaseContentItem {
        let sys = &entry.sys;
        let created_at = sys.created_at.as_deref().and_then(parse_rfc3339);
        let updated_at = sys.updated_at.as_deref().and_then(parse_rfc3339);
        let published_at = entry
            .fields
            .published_at
            .as_deref()
            .or(sys.published_at.as_deref())
            .and_then(parse_rfc3339);
        // The delivery API only ever serves published entries.
        let is_published =
            !self.preview || sys.published_at.is_some() || sys.published_version.is_some();
        BaseContentItem {
            id: sys.id.clone(),
            slug: entry.fields.slug.clone().unwrap_or_else(|| sys.id.clone()),
            created_at: created_at.or(updated_at).unwrap_or(self.now),
            updated_at: updated_at.or(created_at).unwrap_or(self.now),
            published_at: if is_published {
                published_at.or(created_at)
            } else {
                None
            },
            status: if is_published {
                ContentStatus::Published
            } else {
                ContentStatus::Draft
            },
        }
    }

    fn rich_text(&self, value: Option<&Value>) -> RichTextContent {
        match value {
            Some(Value::String(markdown)) => self.renderer.render(markdown),
            Some(document @ Value::Object(_)) => rich_text::render(document),
            _ => RichTextContent::default(),
        }
    }

    fn seo(&self, seo: Option<Box<ContentfulEntry>>) -> Option<SeoMetadata> {
        let seo = seo?.fields;
        Some(SeoMetadata {
            title: seo.title.unwrap_or_default(),
            description: seo.description.unwrap_or_default(),
            keywords: seo.keywords,
            og_title: None,
            og_description: None,
            og_image: seo.image.and_then(Asset::into_media),
            canonical_url: seo.canonical_url,
            no_index: seo.no_index,
            no_follow: seo.no_follow,
        })
    }

    pub fn page(&self, entry: ContentfulEntry) -> Page {
        let base = self.base(&entry);
        let title = entry.title();
        let fields = entry.fields;
        let content = self.rich_text(fields.content.as_ref());
        let excerpt = fields
            .excerpt
            .or(fields.description)
            .or_else(|| derive_excerpt(&content.plain_text));
        let featured_image = first_media([fields.featured_image, fields.image, None]);
        Page {
            seo: seo_or_derived(
                self.seo(fields.seo),
                &title,
                excerpt.as_deref(),
                featured_image.as_ref(),
            ),
            base,
            title,
            excerpt,
            content,
            featured_image,
            template: fields.template,
            parent_id: fields.parent.map(|parent| parent.sys.id),
        }
    }

    pub fn author(&self, entry: ContentfulEntry) -> Author {
        let base = self.base(&entry);
        let name = entry.title();
        let fields = entry.fields;
        let bio = match &fields.bio {
            Some(Value::String(text)) => Some(text.clone()),
            Some(document @ Value::Object(_)) => {
                Some(rich_text::render(document).plain_text).filter(|text| !text.is_empty())
            }
            _ => None,
        };
        Author {
            base,
            name,
            bio,
            email: fields.email,
            avatar: first_media([fields.avatar, fields.image, None]),
            social: string_map(fields.social.as_ref()),
        }
    }

    pub fn category(&self, entry: ContentfulEntry) -> Category {
        Category {
            base: self.base(&entry),
            name: entry.title(),
            description: entry.fields.description,
            parent_id: entry.fields.parent.map(|parent| parent.sys.id),
        }
    }

    pub fn tag(&self, entry: ContentfulEntry) -> Tag {
        Tag {
            base: self.base(&entry),
            name: entry.title(),
        }
    }

    fn summary(entry: ContentfulEntry) -> PostSummary {
        let title = entry.title();
        let fields = entry.fields;
        PostSummary {
            slug: fields.slug.unwrap_or_else(|| entry.sys.id.clone()),
            id: entry.sys.id,
            title,
            excerpt: fields.excerpt.or(fields.description),
            featured_image: first_media([fields.featured_image, fields.image, None]),
        }
    }

    pub fn post(&self, entry: ContentfulEntry) -> BlogPost {
        let base = self.base(&entry);
        let title = entry.title();
        let fields = entry.fields;
        let content = self.rich_text(fields.content.as_ref());
        let excerpt = fields
            .excerpt
            .or(fields.description)
            .or_else(|| derive_excerpt(&content.plain_text));
        let featured_image = first_media([fields.featured_image, fields.image, None]);

        let mut categories: Vec<Category> = fields
            .categories
            .into_iter()
            .map(|category| self.category(category))
            .collect();
        if let Some(category) = fields.category {
            categories.push(self.category(*category));
        }
        let related = fields.related_posts.into_iter().map(Self::summary).collect();

        BlogPost {
            seo: seo_or_derived(
                self.seo(fields.seo),
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
            author: author_or_unknown(fields.author.map(|author| self.author(*author)), self.now),
            categories,
            tags: fields.tags.into_iter().map(|tag| self.tag(tag)).collect(),
        }
    }

    pub fn navigation(&self, entry: ContentfulEntry) -> Navigation {
        Navigation {
            base: self.base(&entry),
            title: entry.title(),
            items: entry.fields.items.iter().filter_map(nav_item).collect(),
        }
    }

    pub fn site_config(&self, entry: ContentfulEntry) -> SiteConfig {
        let base = self.base(&entry);
        let title = entry.title();
        let fields = entry.fields;
        let logo = first_media([fields.logo, fields.image, None]);
        SiteConfig {
            seo: seo_or_derived(
                self.seo(fields.seo),
                &title,
                fields.description.as_deref(),
                logo.as_ref(),
            ),
            base,
            title,
            description: fields.description,
            url: fields.url,
            logo,
            favicon: fields.favicon.and_then(Asset::into_media),
            social: string_map(fields.social.as_ref()),
        }
    }
}

/// Navigation items are either linked `navigationItem` entries or plain
/// JSON objects.
fn nav_item(value: &Value) -> Option<NavigationItem> {
    let fields = value.get("fields").unwrap_or(value);
    let label = fields
        .get("label")
        .or_else(|| fields.get("title"))
        .and_then(Value::as_str)?
        .to_string();
    let href = fields
        .get("href")
        .or_else(|| fields.get("url"))
        .or_else(|| fields.get("path"))
        .and_then(Value::as_str)
        .unwrap_or("#")
        .to_string();
    let external = fields
        .get("external")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| href.starts_with("http://") || href.starts_with("https://"));
    let children = fields
        .get("children")
        .and_then(Value::as_array)
        .map(|children| children.iter().filter_map(nav_item).collect())
        .unwrap_or_default();
    Some(NavigationItem {
        label,
        href,
        external,
        children,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn link(kind: &str, id: &str) -> Value {
        json!({"sys": {"type": "Link", "linkType": kind, "id": id}})
    }

    #[test]
    fn resolves_links_and_drops_dangling_ones() {
        let items = vec![json!({
            "sys": {"id": "post-1", "type": "Entry"},
            "fields": {
                "author": link("Entry", "author-1"),
                "tags": [link("Entry", "tag-1"), link("Entry", "gone")],
                "featuredImage": link("Asset", "asset-1")
            }
        })];
        let includes = Includes::new(
            &items,
            RawIncludes {
                entries: vec![
                    json!({"sys": {"id": "author-1", "type": "Entry"}, "fields": {"name": "Ada"}}),
                    json!({"sys": {"id": "tag-1", "type": "Entry"}, "fields": {"name": "rust"}}),
                ],
                assets: vec![json!({
                    "sys": {"id": "asset-1", "type": "Asset"},
                    "fields": {"file": {"url": "//images.ctfassets.net/a.png"}}
                })],
            },
        );

        let resolved = includes.resolve(items[0].clone());
        assert_eq!(resolved.pointer("/fields/author/fields/name"), Some(&json!("Ada")));
        assert_eq!(resolved.pointer("/fields/tags").and_then(Value::as_array).map(Vec::len), Some(1));
        assert_eq!(
            resolved.pointer("/fields/featuredImage/fields/file/url"),
            Some(&json!("//images.ctfassets.net/a.png"))
        );
    }

    #[test]
    fn self_referencing_links_terminate() {
        let items = vec![json!({
            "sys": {"id": "a", "type": "Entry"},
            "fields": {"parent": link("Entry", "a")}
        })];
        let includes = Includes::new(&items, RawIncludes::default());
        let resolved = includes.resolve(items[0].clone());
        assert!(resolved.pointer("/fields/parent/sys/id").is_some());
    }

    #[test]
    fn maps_post_with_placeholder_author() {
        let renderer = MarkdownRenderer::new();
        let mapper = EntryMapper {
            renderer: &renderer,
            preview: false,
            now: datetime!(2024-06-01 0:00 UTC),
        };
        let entry: ContentfulEntry = serde_json::from_value(json!({
            "sys": {"id": "post-1", "type": "Entry", "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-03T00:00:00Z"},
            "fields": {
                "title": "Hello",
                "slug": "hello",
                "body": "Plain *markdown* body",
                "featuredImage": {
                    "sys": {"id": "asset-1"},
                    "fields": {"title": "Cover", "file": {
                        "url": "//images.ctfassets.net/cover.jpg",
                        "contentType": "image/jpeg",
                        "fileName": "cover.jpg",
                        "details": {"size": 2048, "image": {"width": 800, "height": 600}}
                    }}
                }
            }
        }))
        .expect("entry");

        let post = mapper.post(entry);
        assert_eq!(post.base.status, ContentStatus::Published);
        assert_eq!(post.base.published_at, Some(datetime!(2024-01-01 0:00 UTC)));
        assert_eq!(post.author.name, crate::domain::UNKNOWN_AUTHOR_NAME);
        assert_eq!(post.content.plain_text, "Plain markdown body");
        let image = post.featured_image.expect("image");
        assert_eq!(image.url, "https://images.ctfassets.net/cover.jpg");
        assert_eq!((image.width, image.height, image.size), (Some(800), Some(600), Some(2048)));
        assert_eq!(post.seo.title, "Hello");
    }

    #[test]
    fn preview_entries_without_publish_info_are_drafts() {
        let renderer = MarkdownRenderer::new();
        let mapper = EntryMapper {
            renderer: &renderer,
            preview: true,
            now: datetime!(2024-06-01 0:00 UTC),
        };
        let entry: ContentfulEntry = serde_json::from_value(json!({
            "sys": {"id": "p1", "createdAt": "2024-01-01T00:00:00Z"},
            "fields": {"title": "Draft", "slug": "draft"}
        }))
        .expect("entry");
        let page = mapper.page(entry);
        assert_eq!(page.base.status, ContentStatus::Draft);
        assert_eq!(page.base.published_at, None);
    }

    #[test]
    fn navigation_items_from_entries_and_objects() {
        let items = [
            json!({"sys": {"id": "n1"}, "fields": {"label": "Docs", "href": "https://docs.example.com"}}),
            json!({"label": "Blog", "url": "/blog", "children": [{"label": "Rust", "href": "/blog/rust"}]}),
            json!({"href": "/no-label"}),
        ];
        let parsed: Vec<NavigationItem> = items.iter().filter_map(nav_item).collect();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].external);
        assert_eq!(parsed[1].children[0].href, "/blog/rust");
    }
}
