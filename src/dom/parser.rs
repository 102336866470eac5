use crate::dom::DomNode;
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node};

/// Tags whose children should be stripped (invisible/script content)
const SKIP_CHILDREN: &[&str] = &["script", "style", "noscript", "svg", "template"];

/// Parse an HTML fragment (a spreadsheet cell, a tooltip) into a fragment node.
pub fn parse_fragment(html: &str) -> DomNode {
    let fragment = Html::parse_fragment(html);
    DomNode::fragment(convert_children(fragment.root_element()))
}

/// Parse a full published document and return the contents of its `<body>`.
///
/// Falls back to the whole root element when there is no body.
pub fn parse_document_body(html: &str) -> DomNode {
    let document = Html::parse_document(html);

    let body = scraper::Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());

    match body {
        Some(body) => DomNode::fragment(convert_children(body)),
        None => DomNode::fragment(convert_children(document.root_element())),
    }
}

fn convert_children(el: ElementRef<'_>) -> Vec<DomNode> {
    let mut children = Vec::new();

    for child_ref in el.children() {
        match child_ref.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child_ref) {
                    children.push(convert_element(child_el));
                }
            }
            Node::Text(t) => {
                let s = t.text.to_string();
                if !s.is_empty() {
                    children.push(DomNode::text(s));
                }
            }
            _ => {}
        }
    }

    children
}

fn convert_element(el: ElementRef<'_>) -> DomNode {
    let tag = el.value().name.local.as_ref().to_string();
    let attributes: IndexMap<String, String> = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Skip children of invisible elements
    if SKIP_CHILDREN.contains(&tag.as_str()) {
        return DomNode::element(tag, attributes, Vec::new());
    }

    DomNode::element(tag, attributes, convert_children(el))
}
