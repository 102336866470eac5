pub mod parser;
pub mod sanitize;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Container with no tag of its own (a parsed fragment or render pane)
    Fragment,
    Element,
    Text,
}

/// Elements serialized without a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

/// In-memory markup node.
///
/// Rendered content, sanitized prose and version panes are all kept as
/// `DomNode` trees so they can be annotated, cloned into popups and
/// rendered by the UI without a browser.
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

impl DomNode {
    pub fn fragment(children: Vec<DomNode>) -> Self {
        Self {
            tag: String::new(),
            attributes: IndexMap::new(),
            text: String::new(),
            children,
            node_type: NodeType::Fragment,
        }
    }

    pub fn element(
        tag: impl Into<String>,
        attrs: IndexMap<String, String>,
        children: Vec<DomNode>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attributes: attrs,
            text: String::new(),
            children,
            node_type: NodeType::Element,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            tag: String::new(),
            attributes: IndexMap::new(),
            text: content.into(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    /// `<tag class="...">text</tag>` shorthand used by the renderer.
    pub fn with_class(tag: &str, class: &str, children: Vec<DomNode>) -> Self {
        let mut attrs = IndexMap::new();
        attrs.insert("class".to_string(), class.to_string());
        Self::element(tag, attrs, children)
    }

    /// Recursively count all nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Collect all text content recursively
    pub fn collect_text(&self) -> String {
        let mut buf = String::new();
        self.collect_text_inner(&mut buf);
        buf
    }

    fn collect_text_inner(&self, buf: &mut String) {
        if !self.text.is_empty() {
            buf.push_str(&self.text);
        }
        for child in &self.children {
            child.collect_text_inner(buf);
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Collect references to every descendant (including self) matching `pred`.
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&DomNode) -> bool) -> Vec<&'a DomNode> {
        let mut out = Vec::new();
        self.find_all_inner(pred, &mut out);
        out
    }

    fn find_all_inner<'a>(&'a self, pred: &dyn Fn(&DomNode) -> bool, out: &mut Vec<&'a DomNode>) {
        if pred(self) {
            out.push(self);
        }
        for child in &self.children {
            child.find_all_inner(pred, out);
        }
    }

    /// Apply `f` to every descendant (including self), parents first.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut DomNode)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Serialize back to HTML. Text and attribute values are escaped.
    pub fn to_html(&self) -> String {
        let mut buf = String::new();
        self.write_html(&mut buf);
        buf
    }

    fn write_html(&self, buf: &mut String) {
        match self.node_type {
            NodeType::Text => buf.push_str(&escape_text(&self.text)),
            NodeType::Fragment => {
                for child in &self.children {
                    child.write_html(buf);
                }
            }
            NodeType::Element => {
                buf.push('<');
                buf.push_str(&self.tag);
                for (k, v) in &self.attributes {
                    buf.push(' ');
                    buf.push_str(k);
                    buf.push_str("=\"");
                    buf.push_str(&escape_attr(v));
                    buf.push('"');
                }
                buf.push('>');
                if VOID_TAGS.contains(&self.tag.as_str()) {
                    return;
                }
                for child in &self.children {
                    child.write_html(buf);
                }
                buf.push_str("</");
                buf.push_str(&self.tag);
                buf.push('>');
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_nested_markup() {
        let node = DomNode::fragment(vec![
            DomNode::element("p", IndexMap::new(), vec![DomNode::text("a < b")]),
            DomNode::element("br", IndexMap::new(), Vec::new()),
        ]);
        assert_eq!(node.to_html(), "<p>a &lt; b</p><br>");
    }

    #[test]
    fn class_lookup_splits_on_whitespace() {
        let node = DomNode::with_class("span", "reference active", Vec::new());
        assert!(node.has_class("reference"));
        assert!(node.has_class("active"));
        assert!(!node.has_class("ref"));
    }

    #[test]
    fn collects_text_in_document_order() {
        let node = DomNode::fragment(vec![
            DomNode::text("Know "),
            DomNode::with_class("span", "reference", vec![DomNode::text("thyself")]),
        ]);
        assert_eq!(node.collect_text(), "Know thyself");
        assert_eq!(node.node_count(), 4);
    }
}
