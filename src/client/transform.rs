//! Normalization helpers shared by every provider adapter.
//!
//! Adapters own their wire formats; everything here is about producing
//! well-formed canonical values from whatever leaves they find.

use std::collections::{BTreeMap, HashSet};

use ammonia::Builder as AmmoniaBuilder;
use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::{
    Author, MAX_RELATED_POSTS, MediaAsset, PostSummary, RichTextContent, SeoMetadata,
};

/// Characters kept when an excerpt is derived from body text.
pub const EXCERPT_CHARS: usize = 160;

/// Markdown to sanitized HTML plus a plain-text projection.
pub struct MarkdownRenderer {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::default();
        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;
        options.render.r#unsafe = true;

        Self {
            options,
            sanitizer: content_sanitizer(),
        }
    }

    pub fn render(&self, markdown: &str) -> RichTextContent {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        if format_html(root, &self.options, &mut html).is_err() {
            html = format!("<pre>{}</pre>", escape_html(markdown));
        }

        RichTextContent {
            raw: Value::String(markdown.to_string()),
            html: self.sanitizer.clean(&html).to_string(),
            plain_text: collapse_whitespace(&collect_block_text(root)),
            markdown: Some(markdown.to_string()),
        }
    }

    /// Sanitize HTML produced elsewhere with the same allow-list.
    pub fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html).to_string()
    }
}

fn content_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    let tags: HashSet<&'static str> = HashSet::from([
        "a", "blockquote", "br", "code", "del", "em", "figcaption", "figure", "h1", "h2", "h3",
        "h4", "h5", "h6", "hr", "i", "img", "input", "li", "ol", "p", "pre", "s", "span",
        "strong", "sub", "sup", "table", "tbody", "td", "th", "thead", "tr", "u", "ul",
    ]);
    builder.tags(tags);
    builder.add_tag_attributes("img", &["width", "height", "title"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_generic_attributes(&["class", "id"]);
    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());
    builder
}

fn collect_block_text(root: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        let is_block = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::CodeBlock(block) => buffer.push_str(&block.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
            data.value.block()
        };
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
        if is_block {
            buffer.push(' ');
        }
    }

    let mut text = String::new();
    walk(root, &mut text);
    text
}

/// Escape text for inclusion in generated HTML, attribute values included.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `EXCERPT_CHARS` characters of `plain_text`, cut at a word boundary.
pub fn derive_excerpt(plain_text: &str) -> Option<String> {
    let trimmed = plain_text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return Some(trimmed.to_string());
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    let cut = match cut.rfind(' ') {
        Some(index) if index > 0 => &cut[..index],
        _ => cut.as_str(),
    };
    Some(format!("{}…", cut.trim_end()))
}

/// Backends hand out ids as strings or integers; the canonical id is a string.
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub fn parse_timestamp(value: Option<&Value>) -> Option<OffsetDateTime> {
    value.and_then(Value::as_str).and_then(parse_rfc3339)
}

pub fn parse_rfc3339(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text.trim(), &Rfc3339).ok()
}

/// String-valued entries of a JSON object; anything else is dropped.
pub fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| {
                    value
                        .as_str()
                        .filter(|text| !text.is_empty())
                        .map(|text| (key.clone(), text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Keep provider SEO when present, otherwise derive it from the entity.
pub fn seo_or_derived(
    seo: Option<SeoMetadata>,
    title: &str,
    excerpt: Option<&str>,
    image: Option<&MediaAsset>,
) -> SeoMetadata {
    let mut seo = seo.unwrap_or_else(|| SeoMetadata::derived(title, excerpt.unwrap_or_default()));
    if seo.title.is_empty() {
        seo.title = title.to_string();
    }
    if seo.description.is_empty() {
        seo.description = excerpt.unwrap_or_default().to_string();
    }
    if seo.og_image.is_none() {
        seo.og_image = image.cloned();
    }
    seo
}

pub fn author_or_unknown(author: Option<Author>, now: OffsetDateTime) -> Author {
    author.unwrap_or_else(|| Author::unknown(now))
}

pub fn cap_related(mut related: Vec<PostSummary>, own_id: &str) -> Vec<PostSummary> {
    related.retain(|summary| summary.id != own_id);
    related.truncate(MAX_RELATED_POSTS);
    related
}

/// MIME type guessed from a file name, for backends that omit it.
pub fn mime_from_filename(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::domain::UNKNOWN_AUTHOR_NAME;

    #[test]
    fn markdown_renders_html_and_text() {
        let rendered = MarkdownRenderer::new().render("# Title\n\nSome *bold* words.");
        assert!(rendered.html.contains("<h1>Title</h1>"));
        assert!(rendered.html.contains("<em>bold</em>"));
        assert_eq!(rendered.plain_text, "Title Some bold words.");
        assert_eq!(rendered.markdown.as_deref(), Some("# Title\n\nSome *bold* words."));
    }

    #[test]
    fn markdown_output_is_sanitized() {
        let rendered = MarkdownRenderer::new().render("hi <script>alert(1)</script>");
        assert!(!rendered.html.contains("<script"));
    }

    #[test]
    fn escape_keeps_spaces() {
        assert_eq!(escape_html(r#"a <b> & "c""#), "a &lt;b&gt; &amp; &quot;c&quot;");
    }

    #[test]
    fn excerpt_cuts_on_word_boundary() {
        let long = "word ".repeat(60);
        let excerpt = derive_excerpt(&long).expect("excerpt");
        assert!(excerpt.ends_with('…'));
        assert!(excerpt.chars().count() <= EXCERPT_CHARS + 1);
        assert_eq!(derive_excerpt("   "), None);
    }

    #[test]
    fn ids_normalize_to_strings() {
        assert_eq!(normalize_id(&json!(42)), Some("42".to_string()));
        assert_eq!(normalize_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(normalize_id(&json!(null)), None);
    }

    #[test]
    fn seo_falls_back_to_title_and_excerpt() {
        let seo = seo_or_derived(None, "Hello", Some("Intro"), None);
        assert_eq!(seo.title, "Hello");
        assert_eq!(seo.description, "Intro");
    }

    #[test]
    fn missing_author_becomes_placeholder() {
        let author = author_or_unknown(None, datetime!(2024-01-01 0:00 UTC));
        assert_eq!(author.name, UNKNOWN_AUTHOR_NAME);
    }

    #[test]
    fn related_posts_are_capped_and_exclude_self() {
        let summary = |id: &str| PostSummary {
            id: id.to_string(),
            slug: id.to_string(),
            title: id.to_string(),
            excerpt: None,
            featured_image: None,
        };
        let related = cap_related(
            vec![summary("self"), summary("a"), summary("b"), summary("c"), summary("d")],
            "self",
        );
        let ids: Vec<_> = related.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn mime_is_guessed_from_the_extension() {
        assert_eq!(mime_from_filename("hero.JPG"), "image/jpeg");
        assert_eq!(mime_from_filename("diagram.svg"), "image/svg+xml");
        assert_eq!(mime_from_filename("talk.webm"), "video/webm");
        assert_eq!(mime_from_filename("notes"), "application/octet-stream");
    }

    #[test]
    fn timestamps_parse_rfc3339() {
        let value = json!("2024-03-01T12:00:00Z");
        assert_eq!(
            parse_timestamp(Some(&value)),
            Some(datetime!(2024-03-01 12:00 UTC))
        );
        assert_eq!(parse_timestamp(Some(&json!("yesterday"))), None);
    }
}
