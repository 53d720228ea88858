//! Contentful rich text documents to HTML and plain text.
//!
//! Expects embedded asset targets to be resolved already (see
//! `entries::Includes`); unresolved embeds are dropped.

use serde_json::Value;

use crate::client::transform::{collapse_whitespace, escape_html};
use crate::domain::RichTextContent;

pub(super) fn render(document: &Value) -> RichTextContent {
    let mut html = String::new();
    let mut text = String::new();
    render_children(document, &mut html, &mut text);
    RichTextContent {
        raw: document.clone(),
        html,
        plain_text: collapse_whitespace(&text),
        markdown: None,
    }
}

fn render_children(node: &Value, html: &mut String, text: &mut String) {
    let children = node
        .get("content")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for child in children {
        render_node(child, html, text);
    }
}

fn block(tag: &str, node: &Value, html: &mut String, text: &mut String) {
    html.push_str(&format!("<{tag}>"));
    render_children(node, html, text);
    html.push_str(&format!("</{tag}>"));
    text.push(' ');
}

fn render_node(node: &Value, html: &mut String, text: &mut String) {
    let node_type = node
        .get("nodeType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match node_type {
        "text" => render_text(node, html, text),
        "paragraph" => block("p", node, html, text),
        "blockquote" => block("blockquote", node, html, text),
        "unordered-list" => block("ul", node, html, text),
        "ordered-list" => block("ol", node, html, text),
        "list-item" => block("li", node, html, text),
        "table" => block("table", node, html, text),
        "table-row" => block("tr", node, html, text),
        "table-cell" => block("td", node, html, text),
        "table-header-cell" => block("th", node, html, text),
        "hr" => html.push_str("<hr>"),
        "hyperlink" => {
            let uri = node
                .pointer("/data/uri")
                .and_then(Value::as_str)
                .unwrap_or("#");
            html.push_str(&format!(r#"<a href="{}">"#, escape_html(uri)));
            render_children(node, html, text);
            html.push_str("</a>");
        }
        "embedded-asset-block" => {
            let file = node.pointer("/data/target/fields/file");
            let url = file.and_then(|file| file.get("url")).and_then(Value::as_str);
            if let Some(url) = url {
                let alt = node
                    .pointer("/data/target/fields/description")
                    .or_else(|| node.pointer("/data/target/fields/title"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                html.push_str(&format!(
                    r#"<figure><img src="{}" alt="{}"></figure>"#,
                    escape_html(&absolute_asset_url(url)),
                    escape_html(alt)
                ));
            }
        }
        heading if heading.starts_with("heading-") => {
            let level = heading
                .trim_start_matches("heading-")
                .parse::<u8>()
                .unwrap_or(2)
                .clamp(1, 6);
            block(&format!("h{level}"), node, html, text);
        }
        // Entry embeds and entry hyperlinks render their text only.
        _ => render_children(node, html, text),
    }
}

fn render_text(node: &Value, html: &mut String, text: &mut String) {
    let value = node.get("value").and_then(Value::as_str).unwrap_or_default();
    text.push_str(value);

    let marks = node
        .get("marks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut rendered = escape_html(value);
    for mark in marks {
        let tag = match mark.get("type").and_then(Value::as_str) {
            Some("bold") => "strong",
            Some("italic") => "em",
            Some("underline") => "u",
            Some("code") => "code",
            Some("superscript") => "sup",
            Some("subscript") => "sub",
            Some("strikethrough") => "s",
            _ => continue,
        };
        rendered = format!("<{tag}>{rendered}</{tag}>");
    }
    html.push_str(&rendered);
}

/// Asset URLs come protocol-relative (`//images.ctfassets.net/...`).
pub(super) fn absolute_asset_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_document() {
        let document = json!({
            "nodeType": "document",
            "content": [
                {"nodeType": "heading-2", "content": [{"nodeType": "text", "value": "Intro", "marks": []}]},
                {"nodeType": "paragraph", "content": [
                    {"nodeType": "text", "value": "Go ", "marks": []},
                    {"nodeType": "hyperlink", "data": {"uri": "https://example.com"}, "content": [
                        {"nodeType": "text", "value": "here", "marks": [{"type": "bold"}]}
                    ]}
                ]},
                {"nodeType": "unordered-list", "content": [
                    {"nodeType": "list-item", "content": [
                        {"nodeType": "paragraph", "content": [{"nodeType": "text", "value": "a", "marks": []}]}
                    ]}
                ]},
                {"nodeType": "hr", "content": []}
            ]
        });
        let rendered = render(&document);
        assert_eq!(
            rendered.html,
            r#"<h2>Intro</h2><p>Go <a href="https://example.com"><strong>here</strong></a></p><ul><li><p>a</p></li></ul><hr>"#
        );
        assert_eq!(rendered.plain_text, "Intro Go here a");
    }

    #[test]
    fn embedded_assets_become_figures() {
        let document = json!({
            "nodeType": "document",
            "content": [{
                "nodeType": "embedded-asset-block",
                "data": {"target": {"sys": {"id": "a1", "type": "Asset"}, "fields": {
                    "title": "Logo",
                    "file": {"url": "//images.ctfassets.net/logo.png"}
                }}},
                "content": []
            }]
        });
        assert_eq!(
            render(&document).html,
            r#"<figure><img src="https://images.ctfassets.net/logo.png" alt="Logo"></figure>"#
        );
    }

    #[test]
    fn unresolved_embeds_are_dropped() {
        let document = json!({
            "nodeType": "document",
            "content": [{
                "nodeType": "embedded-asset-block",
                "data": {"target": null},
                "content": []
            }]
        });
        assert!(render(&document).html.is_empty());
    }
}
