//! Shared domain enumerations used across adapters, the cache and webhooks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Publication state of a canonical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, ContentStatus::Published)
    }
}

/// Registered content backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Sanity,
    Strapi,
    Contentful,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Sanity,
        ProviderKind::Strapi,
        ProviderKind::Contentful,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Sanity => "sanity",
            ProviderKind::Strapi => "strapi",
            ProviderKind::Contentful => "contentful",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported content provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sanity" => Ok(ProviderKind::Sanity),
            "strapi" => Ok(ProviderKind::Strapi),
            "contentful" => Ok(ProviderKind::Contentful),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Canonical content models. Each owns a model tag (`blogPost`) used on
/// single-entity cache entries and a collection tag (`blogPosts`) used on
/// listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentModel {
    Page,
    BlogPost,
    Author,
    Category,
    Tag,
    Navigation,
    SiteConfig,
}

impl ContentModel {
    pub const ALL: [ContentModel; 7] = [
        ContentModel::Page,
        ContentModel::BlogPost,
        ContentModel::Author,
        ContentModel::Category,
        ContentModel::Tag,
        ContentModel::Navigation,
        ContentModel::SiteConfig,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContentModel::Page => "page",
            ContentModel::BlogPost => "blogPost",
            ContentModel::Author => "author",
            ContentModel::Category => "category",
            ContentModel::Tag => "tag",
            ContentModel::Navigation => "navigation",
            ContentModel::SiteConfig => "siteConfig",
        }
    }

    /// Tag carried by every listing of this model. Singletons share it
    /// with their model tag.
    pub fn collection_tag(self) -> &'static str {
        match self {
            ContentModel::Page => "pages",
            ContentModel::BlogPost => "blogPosts",
            ContentModel::Author => "authors",
            ContentModel::Category => "categories",
            ContentModel::Tag => "tags",
            ContentModel::Navigation => "navigation",
            ContentModel::SiteConfig => "siteConfig",
        }
    }

    pub fn is_singleton(self) -> bool {
        matches!(self, ContentModel::Navigation | ContentModel::SiteConfig)
    }

    /// `"<model>:<key>"`, where key is an id or a slug.
    pub fn entity_tag(self, key: &str) -> String {
        format!("{}:{key}", self.name())
    }
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported content model `{0}`")]
pub struct UnknownModel(pub String);

impl FromStr for ContentModel {
    type Err = UnknownModel;

    /// Accepts camelCase, kebab-case, snake_case and the common backend
    /// aliases (`post`, `blog`, `settings`, ...).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let folded: String = value
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();

        let model = match folded.as_str() {
            "page" | "pages" => ContentModel::Page,
            "blogpost" | "blogposts" | "post" | "posts" | "article" | "articles" | "blog" => {
                ContentModel::BlogPost
            }
            "author" | "authors" | "person" => ContentModel::Author,
            "category" | "categories" => ContentModel::Category,
            "tag" | "tags" => ContentModel::Tag,
            "navigation" | "nav" | "menu" => ContentModel::Navigation,
            "siteconfig" | "siteconfiguration" | "sitesettings" | "settings" | "global" => {
                ContentModel::SiteConfig
            }
            _ => return Err(UnknownModel(value.to_string())),
        };
        Ok(model)
    }
}

/// Content change reported by a backend webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    Created,
    Updated,
    Deleted,
    Published,
    Unpublished,
}

impl WebhookEvent {
    /// Deletions and unpublishes must disappear from every surface at once.
    pub fn is_removal(self) -> bool {
        matches!(self, WebhookEvent::Deleted | WebhookEvent::Unpublished)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEvent::Created => "created",
            WebhookEvent::Updated => "updated",
            WebhookEvent::Deleted => "deleted",
            WebhookEvent::Published => "published",
            WebhookEvent::Unpublished => "unpublished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parsing_is_case_insensitive() {
        assert_eq!("Sanity".parse::<ProviderKind>(), Ok(ProviderKind::Sanity));
        assert_eq!(" strapi ".parse::<ProviderKind>(), Ok(ProviderKind::Strapi));
        assert_eq!(
            "wordpress".parse::<ProviderKind>(),
            Err(UnknownProvider("wordpress".to_string()))
        );
    }

    #[test]
    fn model_aliases_resolve() {
        assert_eq!("blogPost".parse::<ContentModel>(), Ok(ContentModel::BlogPost));
        assert_eq!("blog-post".parse::<ContentModel>(), Ok(ContentModel::BlogPost));
        assert_eq!("blog_post".parse::<ContentModel>(), Ok(ContentModel::BlogPost));
        assert_eq!("post".parse::<ContentModel>(), Ok(ContentModel::BlogPost));
        assert_eq!("siteConfig".parse::<ContentModel>(), Ok(ContentModel::SiteConfig));
        assert!("invoice".parse::<ContentModel>().is_err());
    }

    #[test]
    fn tags_follow_naming_scheme() {
        assert_eq!(ContentModel::BlogPost.collection_tag(), "blogPosts");
        assert_eq!(ContentModel::BlogPost.entity_tag("42"), "blogPost:42");
        assert_eq!(ContentModel::Category.collection_tag(), "categories");
        assert!(ContentModel::SiteConfig.is_singleton());
    }

    #[test]
    fn removal_events() {
        assert!(WebhookEvent::Deleted.is_removal());
        assert!(WebhookEvent::Unpublished.is_removal());
        assert!(!WebhookEvent::Published.is_removal());
    }
}
