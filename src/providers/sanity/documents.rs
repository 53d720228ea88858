//! GROQ projections and their canonical mapping.
//!
//! Projections rename Sanity's system fields (`_id`, `_createdAt`, ...) and
//! dereference assets so the documents below map onto canonical entities
//! without further lookups.

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::portable_text;
use crate::client::transform::{
    author_or_unknown, cap_related, derive_excerpt, mime_from_filename, parse_rfc3339,
    seo_or_derived, string_map,
};
use crate::domain::{
    Author, BaseContentItem, BlogPost, Category, ContentStatus, MediaAsset, Navigation,
    NavigationItem, Page, PostSummary, RichTextContent, SeoMetadata, SiteConfig, Tag,
};

const DRAFT_PREFIX: &str = "drafts.";

const BASE: &str = r#""id": _id, "originalId": _originalId, "type": _type, "slug": slug.current, "createdAt": _createdAt, "updatedAt": _updatedAt, publishedAt"#;

const IMAGE: &str = r#"{alt, "asset": asset->{"id": _id, url, mimeType, originalFilename, size, "width": metadata.dimensions.width, "height": metadata.dimensions.height}}"#;

fn seo() -> String {
    format!(
        r#""seo": seo{{"title": coalesce(metaTitle, title), "description": coalesce(metaDescription, description), keywords, ogTitle, ogDescription, "ogImage": ogImage{IMAGE}, canonicalUrl, noIndex, noFollow}}"#
    )
}

pub(super) fn page_projection() -> String {
    format!(
        r#"{{{BASE}, title, excerpt, body, "featuredImage": mainImage{IMAGE}, template, "parentId": parent._ref, {}}}"#,
        seo()
    )
}

pub(super) fn author_projection() -> String {
    format!(r#"{{{BASE}, name, bio, email, "avatar": image{IMAGE}, social}}"#)
}

pub(super) fn category_projection() -> String {
    format!(r#"{{{BASE}, "name": coalesce(name, title), description, "parentId": parent._ref}}"#)
}

pub(super) fn tag_projection() -> String {
    format!(r#"{{{BASE}, "name": coalesce(name, title)}}"#)
}

pub(super) fn post_projection() -> String {
    format!(
        r#"{{{BASE}, title, excerpt, body, "featuredImage": mainImage{IMAGE}, "author": author->{author}, "categories": categories[]->{category}, "tags": tags[]->{tag}, "relatedPosts": relatedPosts[0...4]->{{"id": _id, title, "slug": slug.current, excerpt, "featuredImage": mainImage{IMAGE}}}, {seo}}}"#,
        author = author_projection(),
        category = category_projection(),
        tag = tag_projection(),
        seo = seo(),
    )
}

/// Both searchable types; `type` tells them apart afterwards.
pub(super) fn search_projection() -> String {
    post_projection()
}

pub(super) fn navigation_projection() -> String {
    let item = r#""label": coalesce(label, title), "href": coalesce(href, url, "/" + page->slug.current), external"#;
    format!(
        r#"{{{BASE}, title, "items": items[]{{{item}, "children": children[]{{{item}, "children": children[]{{{item}}}}}}}}}"#
    )
}

pub(super) fn site_projection() -> String {
    format!(
        r#"{{{BASE}, title, description, url, "logo": logo{IMAGE}, "favicon": favicon{IMAGE}, social, {}}}"#,
        seo()
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct SanityDoc {
    pub id: String,
    pub original_id: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub slug: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub published_at: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub excerpt: Option<String>,
    pub description: Option<String>,
    pub bio: Option<Value>,
    pub email: Option<String>,
    pub body: Option<Value>,
    pub featured_image: Option<SanityImage>,
    pub avatar: Option<SanityImage>,
    pub logo: Option<SanityImage>,
    pub favicon: Option<SanityImage>,
    pub template: Option<String>,
    pub parent_id: Option<String>,
    pub url: Option<String>,
    pub author: Option<Box<SanityDoc>>,
    pub categories: Option<Vec<SanityDoc>>,
    pub tags: Option<Vec<SanityDoc>>,
    pub related_posts: Option<Vec<SanityDoc>>,
    pub items: Option<Vec<SanityNavItem>>,
    pub social: Option<Value>,
    pub seo: Option<SanitySeo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SanityImage {
    pub alt: Option<String>,
    pub asset: Option<SanityAsset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct SanityAsset {
    pub id: String,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub original_filename: Option<String>,
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct SanitySeo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<SanityImage>,
    pub canonical_url: Option<String>,
    pub no_index: Option<bool>,
    pub no_follow: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SanityNavItem {
    pub label: Option<String>,
    pub href: Option<String>,
    pub external: Option<bool>,
    pub children: Option<Vec<SanityNavItem>>,
}

/// Listing envelope produced by `groq::listing`.
#[derive(Debug, Deserialize)]
pub(super) struct SanityPage {
    #[serde(default)]
    pub items: Vec<SanityDoc>,
    #[serde(default)]
    pub total: u64,
}

pub(super) fn canonical_id(id: &str) -> String {
    id.strip_prefix(DRAFT_PREFIX).unwrap_or(id).to_string()
}

impl SanityDoc {
    fn is_draft(&self) -> bool {
        self.id.starts_with(DRAFT_PREFIX)
            || self
                .original_id
                .as_deref()
                .is_some_and(|id| id.starts_with(DRAFT_PREFIX))
    }

    fn base(&self, now: OffsetDateTime) -> BaseContentItem {
        let id = canonical_id(&self.id);
        let created_at = self.created_at.as_deref().and_then(parse_rfc3339);
        let updated_at = self.updated_at.as_deref().and_then(parse_rfc3339);
        BaseContentItem {
            slug: self.slug.clone().unwrap_or_else(|| id.clone()),
            id,
            created_at: created_at.or(updated_at).unwrap_or(now),
            updated_at: updated_at.or(created_at).unwrap_or(now),
            published_at: self.published_at.as_deref().and_then(parse_rfc3339),
            status: if self.is_draft() {
                ContentStatus::Draft
            } else {
                ContentStatus::Published
            },
        }
    }

    fn title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }

    fn content(&self) -> RichTextContent {
        self.body
            .as_ref()
            .map(portable_text::render)
            .unwrap_or_default()
    }

    pub fn into_page(self, now: OffsetDateTime) -> Page {
        let base = self.base(now);
        let content = self.content();
        let title = self.title();
        let excerpt = self
            .excerpt
            .clone()
            .or_else(|| derive_excerpt(&content.plain_text));
        let featured_image = self.featured_image.and_then(SanityImage::into_media);
        Page {
            base,
            seo: seo_or_derived(
                self.seo.map(|seo| seo.into_canonical()),
                &title,
                excerpt.as_deref(),
                featured_image.as_ref(),
            ),
            title,
            excerpt,
            content,
            featured_image,
            template: self.template,
            parent_id: self.parent_id.as_deref().map(canonical_id),
        }
    }

    pub fn into_author(self, now: OffsetDateTime) -> Author {
        Author {
            base: self.base(now),
            name: self.title(),
            bio: self.bio.as_ref().and_then(portable_text::plain_text),
            email: self.email,
            avatar: self.avatar.and_then(SanityImage::into_media),
            social: string_map(self.social.as_ref()),
        }
    }

    pub fn into_category(self, now: OffsetDateTime) -> Category {
        Category {
            base: self.base(now),
            name: self.title(),
            description: self.description,
            parent_id: self.parent_id.as_deref().map(canonical_id),
        }
    }

    pub fn into_tag(self, now: OffsetDateTime) -> Tag {
        Tag {
            base: self.base(now),
            name: self.title(),
        }
    }

    fn into_summary(self) -> PostSummary {
        PostSummary {
            id: canonical_id(&self.id),
            title: self.title(),
            slug: self.slug.unwrap_or_default(),
            excerpt: self.excerpt,
            featured_image: self.featured_image.and_then(SanityImage::into_media),
        }
    }

    pub fn into_post(self, now: OffsetDateTime) -> BlogPost {
        let base = self.base(now);
        let content = self.content();
        let title = self.title();
        let excerpt = self
            .excerpt
            .clone()
            .or_else(|| derive_excerpt(&content.plain_text));
        let featured_image = self.featured_image.and_then(SanityImage::into_media);
        let related = self
            .related_posts
            .unwrap_or_default()
            .into_iter()
            .map(SanityDoc::into_summary)
            .collect();

        BlogPost {
            seo: seo_or_derived(
                self.seo.map(|seo| seo.into_canonical()),
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
            author: author_or_unknown(self.author.map(|author| (*author).into_author(now)), now),
            categories: self
                .categories
                .unwrap_or_default()
                .into_iter()
                .map(|doc| doc.into_category(now))
                .collect(),
            tags: self
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|doc| doc.into_tag(now))
                .collect(),
        }
    }

    pub fn into_navigation(self, now: OffsetDateTime) -> Navigation {
        Navigation {
            base: self.base(now),
            title: self.title(),
            items: self
                .items
                .unwrap_or_default()
                .into_iter()
                .filter_map(SanityNavItem::into_canonical)
                .collect(),
        }
    }

    pub fn into_site_config(self, now: OffsetDateTime) -> SiteConfig {
        let base = self.base(now);
        let title = self.title();
        let logo = self.logo.and_then(SanityImage::into_media);
        SiteConfig {
            base,
            seo: seo_or_derived(
                self.seo.map(|seo| seo.into_canonical()),
                &title,
                self.description.as_deref(),
                logo.as_ref(),
            ),
            title,
            description: self.description,
            url: self.url,
            logo,
            favicon: self.favicon.and_then(SanityImage::into_media),
            social: string_map(self.social.as_ref()),
        }
    }
}

impl SanityImage {
    pub fn into_media(self) -> Option<MediaAsset> {
        let asset = self.asset?;
        let url = asset.url?;
        let filename = asset
            .original_filename
            .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());
        Some(MediaAsset {
            id: asset.id,
            mime_type: asset
                .mime_type
                .unwrap_or_else(|| mime_from_filename(&filename)),
            url,
            filename,
            alt: self.alt,
            title: None,
            width: asset.width,
            height: asset.height,
            size: asset.size,
        })
    }
}

impl SanitySeo {
    fn into_canonical(self) -> SeoMetadata {
        SeoMetadata {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            keywords: self.keywords.unwrap_or_default(),
            og_title: self.og_title,
            og_description: self.og_description,
            og_image: self.og_image.and_then(SanityImage::into_media),
            canonical_url: self.canonical_url,
            no_index: self.no_index.unwrap_or(false),
            no_follow: self.no_follow.unwrap_or(false),
        }
    }
}

impl SanityNavItem {
    fn into_canonical(self) -> Option<NavigationItem> {
        let label = self.label?;
        let href = self.href.unwrap_or_else(|| "#".to_string());
        Some(NavigationItem {
            external: self
                .external
                .unwrap_or_else(|| href.starts_with("http://") || href.starts_with("https://")),
            label,
            href,
            children: self
                .children
                .unwrap_or_default()
                .into_iter()
                .filter_map(SanityNavItem::into_canonical)
                .collect(),
        })
    }
}
