//! Portable Text to HTML and plain text.
//!
//! Handles the block, span, list and image shapes the standard Sanity
//! editor produces. Unknown block types are skipped.

use serde_json::Value;

use crate::client::transform::{collapse_whitespace, escape_html};
use crate::domain::RichTextContent;

pub(super) fn render(raw: &Value) -> RichTextContent {
    let blocks = raw.as_array().map(Vec::as_slice).unwrap_or_default();
    let mut html = String::new();
    let mut text = Vec::new();
    let mut open_list: Option<&'static str> = None;

    for block in blocks {
        let list = block
            .get("listItem")
            .and_then(Value::as_str)
            .map(|kind| if kind == "number" { "ol" } else { "ul" });
        if open_list != list {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{tag}>"));
            }
            if let Some(tag) = list {
                html.push_str(&format!("<{tag}>"));
            }
            open_list = list;
        }

        match block.get("_type").and_then(Value::as_str) {
            Some("block") => {
                let (inner, plain) = render_spans(block);
                let tag = if list.is_some() {
                    "li"
                } else {
                    block_tag(block.get("style").and_then(Value::as_str))
                };
                html.push_str(&format!("<{tag}>{inner}</{tag}>"));
                text.push(plain);
            }
            Some("image") => {
                if let Some(url) = block.pointer("/asset/url").and_then(Value::as_str) {
                    let alt = block.get("alt").and_then(Value::as_str).unwrap_or_default();
                    html.push_str(&format!(
                        r#"<figure><img src="{}" alt="{}"></figure>"#,
                        escape_html(url),
                        escape_html(alt)
                    ));
                }
            }
            Some("code") => {
                let code = block.get("code").and_then(Value::as_str).unwrap_or_default();
                html.push_str(&format!("<pre><code>{}</code></pre>", escape_html(code)));
                text.push(code.to_string());
            }
            _ => {}
        }
    }
    if let Some(tag) = open_list {
        html.push_str(&format!("</{tag}>"));
    }

    RichTextContent {
        raw: raw.clone(),
        html,
        plain_text: collapse_whitespace(&text.join(" ")),
        markdown: None,
    }
}

/// Plain text of a Portable Text array, or the string itself.
pub(super) fn plain_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text.clone()),
        Value::Array(_) => Some(render(raw).plain_text).filter(|text| !text.is_empty()),
        _ => None,
    }
}

fn block_tag(style: Option<&str>) -> &'static str {
    match style {
        Some("h1") => "h1",
        Some("h2") => "h2",
        Some("h3") => "h3",
        Some("h4") => "h4",
        Some("h5") => "h5",
        Some("h6") => "h6",
        Some("blockquote") => "blockquote",
        _ => "p",
    }
}

fn render_spans(block: &Value) -> (String, String) {
    let mark_defs = block
        .get("markDefs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let children = block
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut html = String::new();
    let mut plain = String::new();
    for span in children {
        let Some(text) = span.get("text").and_then(Value::as_str) else {
            continue;
        };
        plain.push_str(text);

        let mut rendered = escape_html(text);
        let marks = span
            .get("marks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for mark in marks.iter().filter_map(Value::as_str) {
            rendered = apply_mark(mark, mark_defs, rendered);
        }
        html.push_str(&rendered);
    }
    (html, plain)
}

fn apply_mark(mark: &str, mark_defs: &[Value], inner: String) -> String {
    let wrap = |tag: &str| format!("<{tag}>{inner}</{tag}>");
    match mark {
        "strong" => wrap("strong"),
        "em" => wrap("em"),
        "code" => wrap("code"),
        "underline" => wrap("u"),
        "strike-through" => wrap("s"),
        key => {
            let href = mark_defs
                .iter()
                .find(|def| def.get("_key").and_then(Value::as_str) == Some(key))
                .filter(|def| def.get("_type").and_then(Value::as_str) == Some("link"))
                .and_then(|def| def.get("href").and_then(Value::as_str));
            match href {
                Some(href) => format!(r#"<a href="{}">{inner}</a>"#, escape_html(href)),
                None => inner,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_styles_marks_and_links() {
        let raw = json!([
            {"_type": "block", "style": "h2", "children": [{"_type": "span", "text": "Intro"}]},
            {
                "_type": "block",
                "style": "normal",
                "markDefs": [{"_key": "l1", "_type": "link", "href": "https://example.com"}],
                "children": [
                    {"_type": "span", "text": "Read ", "marks": []},
                    {"_type": "span", "text": "this", "marks": ["strong", "l1"]}
                ]
            }
        ]);
        let rendered = render(&raw);
        assert_eq!(
            rendered.html,
            r#"<h2>Intro</h2><p>Read <a href="https://example.com"><strong>this</strong></a></p>"#
        );
        assert_eq!(rendered.plain_text, "Intro Read this");
        assert_eq!(rendered.raw, raw);
    }

    #[test]
    fn groups_list_items() {
        let raw = json!([
            {"_type": "block", "listItem": "bullet", "children": [{"text": "a"}]},
            {"_type": "block", "listItem": "bullet", "children": [{"text": "b"}]},
            {"_type": "block", "listItem": "number", "children": [{"text": "c"}]},
            {"_type": "block", "children": [{"text": "d"}]}
        ]);
        assert_eq!(
            render(&raw).html,
            "<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol><p>d</p>"
        );
    }

    #[test]
    fn escapes_text() {
        let raw = json!([{"_type": "block", "children": [{"text": "<script>"}]}]);
        assert!(!render(&raw).html.contains("<script>"));
    }

    #[test]
    fn non_array_renders_empty() {
        let rendered = render(&Value::Null);
        assert!(rendered.html.is_empty());
        assert!(rendered.plain_text.is_empty());
    }
}
