//! Strapi 5 "blocks" rich text to HTML and plain text.

use serde_json::Value;

use crate::client::transform::{collapse_whitespace, escape_html};
use crate::domain::RichTextContent;

pub(super) fn render(raw: &Value) -> RichTextContent {
    let mut html = String::new();
    let mut text = String::new();
    for node in raw.as_array().map(Vec::as_slice).unwrap_or_default() {
        render_node(node, &mut html, &mut text);
        text.push(' ');
    }
    RichTextContent {
        raw: raw.clone(),
        html,
        plain_text: collapse_whitespace(&text),
        markdown: None,
    }
}

fn render_children(node: &Value, html: &mut String, text: &mut String) {
    let children = node
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for child in children {
        render_node(child, html, text);
    }
}

fn wrapped(tag: &str, node: &Value, html: &mut String, text: &mut String) {
    html.push_str(&format!("<{tag}>"));
    render_children(node, html, text);
    html.push_str(&format!("</{tag}>"));
    text.push(' ');
}

fn render_node(node: &Value, html: &mut String, text: &mut String) {
    match node.get("type").and_then(Value::as_str) {
        Some("text") => render_text(node, html, text),
        Some("paragraph") => wrapped("p", node, html, text),
        Some("quote") => wrapped("blockquote", node, html, text),
        Some("list-item") => wrapped("li", node, html, text),
        Some("heading") => {
            let level = node
                .get("level")
                .and_then(Value::as_u64)
                .unwrap_or(2)
                .clamp(1, 6);
            wrapped(&format!("h{level}"), node, html, text);
        }
        Some("list") => {
            let tag = match node.get("format").and_then(Value::as_str) {
                Some("ordered") => "ol",
                _ => "ul",
            };
            wrapped(tag, node, html, text);
        }
        Some("code") => {
            html.push_str("<pre><code>");
            render_children(node, html, text);
            html.push_str("</code></pre>");
        }
        Some("link") => {
            let url = node.get("url").and_then(Value::as_str).unwrap_or("#");
            html.push_str(&format!(r#"<a href="{}">"#, escape_html(url)));
            render_children(node, html, text);
            html.push_str("</a>");
        }
        Some("image") => {
            if let Some(url) = node.pointer("/image/url").and_then(Value::as_str) {
                let alt = node
                    .pointer("/image/alternativeText")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                html.push_str(&format!(
                    r#"<figure><img src="{}" alt="{}"></figure>"#,
                    escape_html(url),
                    escape_html(alt)
                ));
            }
        }
        _ => render_children(node, html, text),
    }
}

fn render_text(node: &Value, html: &mut String, text: &mut String) {
    let value = node.get("text").and_then(Value::as_str).unwrap_or_default();
    text.push_str(value);

    let flag = |name: &str| node.get(name).and_then(Value::as_bool).unwrap_or(false);
    let mut rendered = escape_html(value);
    for (name, tag) in [
        ("code", "code"),
        ("bold", "strong"),
        ("italic", "em"),
        ("underline", "u"),
        ("strikethrough", "s"),
    ] {
        if flag(name) {
            rendered = format!("<{tag}>{rendered}</{tag}>");
        }
    }
    html.push_str(&rendered);
}
