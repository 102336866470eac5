//! Glossary reference highlighting.
//!
//! Text nodes are scanned for known terms; each hit becomes a
//! `<span class="reference">` marker. Markers then get their tooltip bound
//! exactly once, so repeated passes over the same tree are harmless.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::dom::sanitize::Sanitizer;
use crate::dom::DomNode;
use crate::net::sheet::{cell, Row};

pub const REFERENCE_CLASS: &str = "reference";
const TOOLTIP_ATTR: &str = "data-tooltip";
const BOUND_ATTR: &str = "data-tooltip-bound";

/// Elements whose text is never annotated.
const SKIP_TAGS: &[&str] = &["script", "style"];

/// Term → sanitized tooltip HTML.
#[derive(Debug, Clone, Default)]
pub struct TooltipTable {
    entries: HashMap<String, String>,
}

impl TooltipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the reference sheet. Accepts `References`/`Data` columns,
    /// or the older `Word`/`Tooltip` pair.
    pub fn from_rows(rows: &[Row], sanitizer: &Sanitizer) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            let term = cell(row, "References").or_else(|| cell(row, "Word"));
            let data = cell(row, "Data").or_else(|| cell(row, "Tooltip"));
            if let (Some(term), Some(data)) = (term, data) {
                entries.insert(term.to_string(), sanitizer.sanitize_html(data));
            }
        }
        log::info!("Loaded {} reference tooltips", entries.len());
        Self { entries }
    }

    pub fn insert(&mut self, term: impl Into<String>, html: impl Into<String>) {
        self.entries.insert(term.into(), html.into());
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, term: &str) -> Option<&str> {
        self.entries.get(term).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Terms ordered longest first (ties broken alphabetically).
    pub fn terms_longest_first(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        terms
    }
}

/// Outcome of one annotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationStats {
    pub markers_created: usize,
    pub tooltips_bound: usize,
}

/// Wraps glossary terms found in text nodes and binds their tooltips.
#[derive(Debug, Clone)]
pub struct ReferenceAnnotator {
    table: TooltipTable,
    pattern: Option<Regex>,
}

impl ReferenceAnnotator {
    pub fn new(table: TooltipTable) -> Self {
        let pattern = build_pattern(&table.terms_longest_first());
        Self { table, pattern }
    }

    pub fn table(&self) -> &TooltipTable {
        &self.table
    }

    /// Wrap terms and bind tooltips in one go.
    pub fn apply(&self, root: &mut DomNode) -> AnnotationStats {
        let markers_created = self.annotate(root);
        let tooltips_bound = self.bind_tooltips(root);
        AnnotationStats {
            markers_created,
            tooltips_bound,
        }
    }

    /// Wrap every whole-word term occurrence in a reference marker.
    /// Returns the number of markers created.
    pub fn annotate(&self, root: &mut DomNode) -> usize {
        match &self.pattern {
            Some(re) => annotate_node(root, re),
            None => 0,
        }
    }

    /// Attach tooltips to markers that have not been initialized yet.
    /// Returns the number newly bound.
    pub fn bind_tooltips(&self, root: &mut DomNode) -> usize {
        let mut bound = 0;
        root.walk_mut(&mut |node: &mut DomNode| {
            if !node.has_class(REFERENCE_CLASS) || node.attr(BOUND_ATTR).is_some() {
                return;
            }
            let term = node.collect_text();
            if let Some(html) = self.table.get(term.trim()) {
                node.set_attr(TOOLTIP_ATTR, html);
            }
            node.set_attr(BOUND_ATTR, "true");
            bound += 1;
        });
        bound
    }
}

/// Tooltip HTML bound to a marker, if any.
pub fn tooltip_of(node: &DomNode) -> Option<&str> {
    node.attr(TOOLTIP_ATTR)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// One alternation, longest terms first so the leftmost-first regex
/// semantics never let a short term shadow a longer one.
fn build_pattern(terms: &[&str]) -> Option<Regex> {
    if terms.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = terms
        .iter()
        .map(|term| {
            let starts_word = term.chars().next().map(is_word_char).unwrap_or(false);
            let ends_word = term.chars().last().map(is_word_char).unwrap_or(false);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(term),
                if ends_word { r"\b" } else { "" }
            )
        })
        .collect();
    match Regex::new(&alternatives.join("|")) {
        Ok(re) => Some(re),
        Err(e) => {
            log::warn!("Reference pattern rejected: {}", e);
            None
        }
    }
}

fn annotate_node(node: &mut DomNode, re: &Regex) -> usize {
    if SKIP_TAGS.contains(&node.tag.as_str()) || node.has_class(REFERENCE_CLASS) {
        return 0;
    }

    let mut created = 0;
    let children = std::mem::take(&mut node.children);
    let mut rebuilt = Vec::with_capacity(children.len());

    for mut child in children {
        if !child.is_text() {
            created += annotate_node(&mut child, re);
            rebuilt.push(child);
            continue;
        }

        let text = child.text.as_str();
        let mut last = 0;
        for m in re.find_iter(text) {
            if m.start() > last {
                rebuilt.push(DomNode::text(&text[last..m.start()]));
            }
            rebuilt.push(DomNode::with_class(
                "span",
                REFERENCE_CLASS,
                vec![DomNode::text(m.as_str())],
            ));
            created += 1;
            last = m.end();
        }
        if last == 0 {
            rebuilt.push(child);
        } else if last < text.len() {
            rebuilt.push(DomNode::text(&text[last..]));
        }
    }

    node.children = rebuilt;
    created
}

/// Debounced re-annotation trigger for the content area.
///
/// Structural changes mark the watch dirty; a pass is due once no further
/// change has arrived for `debounce`. Changes made while the annotator is
/// writing are ignored, which keeps a pass from re-triggering itself.
#[derive(Debug, Clone)]
pub struct ReferenceWatch {
    debounce: Duration,
    dirty_since: Option<Instant>,
    writing: bool,
}

impl ReferenceWatch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            dirty_since: None,
            writing: false,
        }
    }

    /// Record a structural change at `now`.
    pub fn notify(&mut self, now: Instant) {
        if self.writing {
            return;
        }
        self.dirty_since = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Run `pass` if the debounce interval has elapsed. Returns whether it ran.
    pub fn run_if_due(&mut self, now: Instant, pass: impl FnOnce(&mut Self)) -> bool {
        match self.dirty_since {
            Some(since) if now.duration_since(since) >= self.debounce => {
                self.dirty_since = None;
                self.writing = true;
                pass(self);
                self.writing = false;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_fragment;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn annotator() -> ReferenceAnnotator {
        let mut table = TooltipTable::new();
        table.insert("Logos", "<b>Reason</b> as cosmic order");
        table.insert("Logos spermatikos", "The seminal reason");
        table.insert("Stoa", "Painted porch");
        ReferenceAnnotator::new(table)
    }

    fn markers(node: &DomNode) -> Vec<String> {
        node.find_all(&|n| n.has_class(REFERENCE_CLASS))
            .into_iter()
            .map(|n| n.collect_text())
            .collect()
    }

    #[test]
    fn longest_term_wins() {
        let mut node = parse_fragment("The Logos spermatikos seeds the Logos.");
        annotator().apply(&mut node);
        assert_eq!(markers(&node), vec!["Logos spermatikos", "Logos"]);
    }

    #[test]
    fn whole_words_only_and_case_sensitive() {
        let mut node = parse_fragment("Stoas and stoa and Stoa");
        annotator().apply(&mut node);
        assert_eq!(markers(&node), vec!["Stoa"]);
        assert_eq!(node.collect_text(), "Stoas and stoa and Stoa");
    }

    #[test]
    fn skips_script_and_existing_markers() {
        let mut node = DomNode::fragment(vec![
            DomNode::element("style", Default::default(), vec![DomNode::text("Stoa {}")]),
            DomNode::with_class("span", REFERENCE_CLASS, vec![DomNode::text("Stoa")]),
        ]);
        let created = annotator().annotate(&mut node);
        assert_eq!(created, 0);
    }

    #[test]
    fn repeated_passes_are_idempotent() {
        let a = annotator();
        let mut node = parse_fragment("<p>Zeno taught at the Stoa about the Logos.</p>");
        let first = a.apply(&mut node);
        assert_eq!(first.markers_created, 2);
        assert_eq!(first.tooltips_bound, 2);

        let snapshot = node.clone();
        let second = a.apply(&mut node);
        assert_eq!(second, AnnotationStats::default());
        assert_eq!(node, snapshot);
    }

    #[test]
    fn tooltip_uses_exact_lookup() {
        let mut node = parse_fragment("the Stoa");
        annotator().apply(&mut node);
        let marker = node.find_all(&|n| n.has_class(REFERENCE_CLASS))[0];
        assert_eq!(tooltip_of(marker), Some("Painted porch"));
    }

    #[test]
    fn legacy_columns_are_accepted() {
        let rows = crate::net::sheet::parse_csv("Word,Tooltip\nApeiron,<i>boundless</i>\n").unwrap();
        let table = TooltipTable::from_rows(&rows, &Sanitizer::new());
        assert_eq!(table.get("Apeiron"), Some("<i>boundless</i>"));
    }

    #[test]
    fn watch_debounces_and_ignores_own_writes() {
        let start = Instant::now();
        let mut watch = ReferenceWatch::new(Duration::from_millis(100));
        watch.notify(start);
        assert!(!watch.run_if_due(start + Duration::from_millis(50), |_| {}));

        let ran = watch.run_if_due(start + Duration::from_millis(120), |w| {
            // the pass's own mutations must not re-arm the watch
            w.notify(start + Duration::from_millis(120));
        });
        assert!(ran);
        assert!(!watch.is_pending());
    }

    proptest! {
        #[test]
        fn annotation_never_changes_text(words in proptest::collection::vec("[A-Za-z]{1,8}|Stoa|Logos", 0..20)) {
            let text = words.join(" ");
            let mut node = parse_fragment(&text);
            let a = annotator();
            a.apply(&mut node);
            let once = node.clone();
            a.apply(&mut node);
            prop_assert_eq!(node.collect_text(), text);
            prop_assert_eq!(node, once);
        }
    }
}
