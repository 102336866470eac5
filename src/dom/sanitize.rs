//! Allow-list HTML sanitizer.
//!
//! Spreadsheet cells, tooltip definitions and published documents all pass
//! through here before they reach a render target. Disallowed elements are
//! unwrapped (their text survives) unless they carry executable or
//! invisible content, in which case the whole subtree is dropped.
//! Sanitization is total: any input yields a (possibly empty) result.

use indexmap::IndexMap;

use crate::dom::parser::{parse_document_body, parse_fragment};
use crate::dom::{DomNode, NodeType};

const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "strong", "i", "em", "u", "s", "small", "sup", "sub", "mark", "code", "pre",
    "p", "br", "hr", "div", "span", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "ul",
    "ol", "li", "table", "thead", "tbody", "tr", "td", "th", "img", "figure", "figcaption",
];

/// Elements removed together with everything inside them.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "form", "input",
    "button", "select", "textarea", "svg", "head", "title", "meta", "link",
];

fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "title"],
        "img" => &["src", "alt", "title"],
        "td" | "th" => &["colspan", "rowspan"],
        _ => &["title"],
    }
}

fn is_safe_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    if let Some(idx) = lower.find(':') {
        // Only a scheme before any path separator counts
        let scheme = &lower[..idx];
        if !scheme.contains('/') && !scheme.contains('?') && !scheme.contains('#') {
            return matches!(scheme, "http" | "https" | "mailto");
        }
    }
    true
}

/// Allow-list sanitizer.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer;

impl Sanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Sanitize a cell or tooltip value into a fragment node.
    ///
    /// Plain text with line breaks keeps them as `<br>`.
    pub fn sanitize_fragment(&self, raw: &str) -> DomNode {
        let source = if raw.contains('<') {
            raw.to_string()
        } else {
            escape_plain(raw).replace("\r\n", "\n").replace('\n', "<br>")
        };
        let parsed = parse_fragment(&source);
        DomNode::fragment(self.clean_children(parsed.children))
    }

    /// Sanitize a full published document, keeping only its body.
    pub fn sanitize_document(&self, raw: &str) -> DomNode {
        let parsed = parse_document_body(raw);
        DomNode::fragment(self.clean_children(parsed.children))
    }

    /// Sanitize and serialize back to an HTML string.
    pub fn sanitize_html(&self, raw: &str) -> String {
        self.sanitize_fragment(raw).to_html()
    }

    fn clean_children(&self, children: Vec<DomNode>) -> Vec<DomNode> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            self.clean_into(child, &mut out);
        }
        out
    }

    fn clean_into(&self, node: DomNode, out: &mut Vec<DomNode>) {
        match node.node_type {
            NodeType::Text => out.push(node),
            NodeType::Fragment => {
                let cleaned = self.clean_children(node.children);
                out.extend(cleaned);
            }
            NodeType::Element => {
                let tag = node.tag.to_ascii_lowercase();
                if DROPPED_TAGS.contains(&tag.as_str()) {
                    return;
                }
                let children = self.clean_children(node.children);
                if !ALLOWED_TAGS.contains(&tag.as_str()) {
                    // Unwrap: keep the content, lose the element
                    out.extend(children);
                    return;
                }

                let permitted = allowed_attrs(&tag);
                let mut attrs = IndexMap::new();
                for (k, v) in node.attributes {
                    let key = k.to_ascii_lowercase();
                    if !permitted.contains(&key.as_str()) {
                        continue;
                    }
                    if (key == "href" || key == "src") && !is_safe_url(&v) {
                        continue;
                    }
                    attrs.insert(key, v);
                }
                if tag == "a" {
                    attrs.insert("target".to_string(), "_blank".to_string());
                    attrs.insert("rel".to_string(), "noopener noreferrer".to_string());
                }
                out.push(DomNode::element(tag, attrs, children));
            }
        }
    }
}

fn escape_plain(s: &str) -> String {
    s.replace('&', "&amp;").replace('>', "&gt;")
}
