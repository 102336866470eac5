//! Content rendering: rows or documents → render-target data.
//!
//! A sheet becomes a `RowTable` of `RowGroup`s, one per rendered data row.
//! Each group keeps its sanitized version cells so switching tabs is a pure
//! pane replacement; the tab strip is derived from `versions` and never
//! rebuilt.

use std::sync::Arc;

use thiserror::Error;

use crate::content::annotate::ReferenceAnnotator;
use crate::content::columns::default_tab_for_column;
use crate::content::ContentType;
use crate::dom::sanitize::Sanitizer;
use crate::dom::DomNode;
use crate::net::sheet::{cell, Row, SheetError};

/// Column prefix marking a content version.
pub const VERSION_PREFIX: &str = "D:";

/// Inline, user-visible failure of one content item.
#[derive(Debug, Clone, Error)]
pub enum ContentError {
    #[error("Failed to load content: {0}")]
    Load(#[from] SheetError),
    #[error("No rows found")]
    NoRows,
    #[error("No version columns found")]
    NoVersionColumns,
    #[error("No content to display")]
    NothingToDisplay,
    #[error("Document is empty")]
    EmptyDocument,
}

/// What a worker thread hands back for one title.
#[derive(Debug, Clone)]
pub enum LoadedSource {
    Rows(Vec<Row>),
    Document(String),
}

/// A `D:` column of the sheet header.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionColumn {
    pub name: String,
    /// 1-based position among all version columns (the tab label)
    pub position: usize,
}

impl VersionColumn {
    /// Column name without the `D:` marker.
    pub fn label(&self) -> &str {
        self.name.trim_start_matches(VERSION_PREFIX).trim()
    }
}

/// A non-empty version cell of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionCell {
    pub position: usize,
    pub content: DomNode,
}

/// One comparison column's view of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContainer {
    pub active_tab: usize,
    pub pane: DomNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotesBlock {
    pub index: String,
    pub content: DomNode,
    pub expanded: bool,
}

/// How a notes toggle was honoured.
#[derive(Debug, Clone, PartialEq)]
pub enum NotesToggle {
    /// Inline panel under the row, now expanded or collapsed
    Inline { expanded: bool },
    /// Narrow viewport: show this content in the shared overlay
    Overlay(DomNode),
}

/// One source row across every comparison column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    /// 1-based index of the source data row
    pub row_number: usize,
    /// Chapter heading emitted before this group
    pub chapter: Option<String>,
    pub versions: Vec<VersionCell>,
    pub containers: Vec<RowContainer>,
    pub notes: Option<NotesBlock>,
}

impl RowGroup {
    /// Whether a tab strip is shown (more than one non-empty version).
    pub fn has_tabs(&self) -> bool {
        self.versions.len() > 1
    }

    pub fn version(&self, position: usize) -> Option<&VersionCell> {
        self.versions.iter().find(|v| v.position == position)
    }

    /// `preferred` if that version is non-empty, else the first available.
    pub fn resolve_tab(&self, preferred: usize) -> usize {
        if self.version(preferred).is_some() {
            preferred
        } else {
            self.versions.first().map(|v| v.position).unwrap_or(preferred)
        }
    }
}

/// Header above one comparison column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnHeader {
    pub index: usize,
    pub default_tab: usize,
}

/// Tabular rendering of a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RowTable {
    pub version_columns: Vec<VersionColumn>,
    pub headers: Vec<ColumnHeader>,
    pub groups: Vec<RowGroup>,
}

impl RowTable {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Added columns stay below the number of version columns.
    pub fn can_add_column(&self) -> bool {
        self.column_count().saturating_sub(1) < self.version_columns.len()
    }

    /// The remove affordance only exists beyond the first column.
    pub fn can_remove_column(&self) -> bool {
        self.column_count() > 1
    }

    /// Group rendered from the given 1-based source row.
    pub fn group_index_for_row(&self, row_number: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.row_number == row_number)
    }
}

/// State of one title's render target.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBody {
    Loading,
    Prose(DomNode),
    Rows(RowTable),
    Error(String),
    NotLoaded,
}

/// A title's persistent render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent {
    pub title: String,
    pub content_type: Option<ContentType>,
    pub body: RenderedBody,
}

impl RenderedContent {
    pub fn loading(title: &str, content_type: ContentType) -> Self {
        Self {
            title: title.to_string(),
            content_type: Some(content_type),
            body: RenderedBody::Loading,
        }
    }

    /// Placeholder for a title the registry does not know.
    pub fn not_loaded(title: &str) -> Self {
        Self {
            title: title.to_string(),
            content_type: None,
            body: RenderedBody::NotLoaded,
        }
    }

    pub fn rows(&self) -> Option<&RowTable> {
        match &self.body {
            RenderedBody::Rows(t) => Some(t),
            _ => None,
        }
    }

    pub fn rows_mut(&mut self) -> Option<&mut RowTable> {
        match &mut self.body {
            RenderedBody::Rows(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.body == RenderedBody::Loading
    }
}

/// Turns fetched sources into render targets.
#[derive(Debug, Clone)]
pub struct ContentRenderer {
    sanitizer: Sanitizer,
    annotator: Arc<ReferenceAnnotator>,
}

impl ContentRenderer {
    pub fn new(annotator: Arc<ReferenceAnnotator>) -> Self {
        Self {
            sanitizer: Sanitizer::new(),
            annotator,
        }
    }

    pub fn annotator(&self) -> &ReferenceAnnotator {
        &self.annotator
    }

    /// Render a finished load into a body. Failures become inline errors.
    pub fn render(&self, title: &str, loaded: Result<LoadedSource, SheetError>) -> RenderedBody {
        let result = match loaded {
            Ok(LoadedSource::Rows(rows)) => self.render_rows(&rows).map(RenderedBody::Rows),
            Ok(LoadedSource::Document(html)) => self.render_document(&html).map(RenderedBody::Prose),
            Err(e) => Err(ContentError::from(e)),
        };
        match result {
            Ok(body) => body,
            Err(e) => {
                log::error!("Content '{}' failed: {}", title, e);
                RenderedBody::Error(e.to_string())
            }
        }
    }

    /// Sanitized, annotated prose from a published document.
    pub fn render_document(&self, html: &str) -> Result<DomNode, ContentError> {
        let mut body = self.sanitizer.sanitize_document(html);
        if body.collect_text().trim().is_empty() {
            return Err(ContentError::EmptyDocument);
        }
        self.annotator.apply(&mut body);
        Ok(body)
    }

    /// One `RowGroup` per data row that has at least one non-empty version.
    pub fn render_rows(&self, rows: &[Row]) -> Result<RowTable, ContentError> {
        let first = rows.first().ok_or(ContentError::NoRows)?;

        let version_columns: Vec<VersionColumn> = first
            .keys()
            .filter(|k| k.starts_with(VERSION_PREFIX))
            .enumerate()
            .map(|(i, name)| VersionColumn {
                name: name.clone(),
                position: i + 1,
            })
            .collect();
        if version_columns.is_empty() {
            return Err(ContentError::NoVersionColumns);
        }

        let default_tab = default_tab_for_column(0, version_columns.len());
        let mut previous_chapter: Option<String> = None;
        let mut groups = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let versions: Vec<VersionCell> = version_columns
                .iter()
                .filter_map(|col| {
                    cell(row, &col.name).map(|raw| VersionCell {
                        position: col.position,
                        content: self.sanitizer.sanitize_fragment(raw),
                    })
                })
                .collect();
            if versions.is_empty() {
                continue;
            }

            let chapter_value = cell(row, "Chapter").map(str::to_string);
            let chapter = match &chapter_value {
                Some(ch) if previous_chapter.as_ref() != Some(ch) => Some(ch.clone()),
                _ => None,
            };
            previous_chapter = chapter_value;

            let notes = match (cell(row, "Notes"), cell(row, "Index")) {
                (Some(notes), Some(index)) => {
                    let mut content = self.sanitizer.sanitize_fragment(notes);
                    self.annotator.apply(&mut content);
                    Some(NotesBlock {
                        index: index.to_string(),
                        content,
                        expanded: false,
                    })
                }
                _ => None,
            };

            let mut group = RowGroup {
                row_number: i + 1,
                chapter,
                versions,
                containers: Vec::new(),
                notes,
            };
            let container = self.make_container(&group, default_tab);
            group.containers.push(container);
            groups.push(group);
        }

        if groups.is_empty() {
            return Err(ContentError::NothingToDisplay);
        }

        Ok(RowTable {
            version_columns,
            headers: vec![ColumnHeader {
                index: 0,
                default_tab,
            }],
            groups,
        })
    }

    /// A container showing `preferred` (or the first available version).
    pub fn make_container(&self, group: &RowGroup, preferred: usize) -> RowContainer {
        let active_tab = group.resolve_tab(preferred);
        RowContainer {
            active_tab,
            pane: self.make_pane(group, active_tab),
        }
    }

    fn make_pane(&self, group: &RowGroup, position: usize) -> DomNode {
        let mut pane = group
            .version(position)
            .map(|v| v.content.clone())
            .unwrap_or_else(|| DomNode::fragment(Vec::new()));
        self.annotator.apply(&mut pane);
        pane
    }

    /// Switch one container to another tab: replaces only its pane and
    /// refreshes reference highlighting. Empty or unknown tabs are refused.
    pub fn select_tab(&self, table: &mut RowTable, group: usize, column: usize, tab: usize) -> bool {
        let Some(g) = table.groups.get(group) else {
            return false;
        };
        if g.version(tab).is_none() || column >= g.containers.len() {
            return false;
        }
        let pane = self.make_pane(g, tab);
        let container = &mut table.groups[group].containers[column];
        container.active_tab = tab;
        container.pane = pane;
        true
    }

    /// Re-run reference highlighting over every pane of a body.
    pub fn refresh_references(&self, body: &mut RenderedBody) -> usize {
        match body {
            RenderedBody::Prose(node) => self.annotator.apply(node).markers_created,
            RenderedBody::Rows(table) => table
                .groups
                .iter_mut()
                .flat_map(|g| g.containers.iter_mut())
                .map(|c| self.annotator.apply(&mut c.pane).markers_created)
                .sum(),
            _ => 0,
        }
    }
}

/// Toggle a row's notes. Narrow viewports use the shared overlay instead
/// of expanding the inline panel.
pub fn toggle_notes(group: &mut RowGroup, viewport_width: f32, narrow_px: f32) -> Option<NotesToggle> {
    let notes = group.notes.as_mut()?;
    if viewport_width < narrow_px {
        return Some(NotesToggle::Overlay(notes.content.clone()));
    }
    notes.expanded = !notes.expanded;
    Some(NotesToggle::Inline {
        expanded: notes.expanded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::annotate::{TooltipTable, REFERENCE_CLASS};
    use crate::net::sheet::parse_csv;
    use pretty_assertions::assert_eq;

    fn renderer() -> ContentRenderer {
        let mut table = TooltipTable::new();
        table.insert("Forms", "Eternal patterns");
        ContentRenderer::new(Arc::new(ReferenceAnnotator::new(table)))
    }

    const REPUBLIC: &str = "Chapter,D:Greek,D:Jowett,D:Bloom,Notes,Index\n\
        Book I,κατέβην,I went down,I went down yesterday,,\n\
        Book I,,Only Jowett,,A note,1.1\n\
        Book II,,,,,\n\
        Book II,,the Forms,<b>Bloom</b>,,\n";

    #[test]
    fn one_group_per_rendered_row() {
        let rows = parse_csv(REPUBLIC).unwrap();
        let table = renderer().render_rows(&rows).unwrap();
        assert_eq!(table.version_columns.len(), 3);
        let numbers: Vec<usize> = table.groups.iter().map(|g| g.row_number).collect();
        assert_eq!(numbers, vec![1, 2, 4]);
    }

    #[test]
    fn chapters_emit_on_change_only() {
        let rows = parse_csv(REPUBLIC).unwrap();
        let table = renderer().render_rows(&rows).unwrap();
        let chapters: Vec<Option<&str>> = table.groups.iter().map(|g| g.chapter.as_deref()).collect();
        assert_eq!(chapters, vec![Some("Book I"), None, Some("Book II")]);
    }

    #[test]
    fn single_version_has_no_tabs() {
        let rows = parse_csv(REPUBLIC).unwrap();
        let table = renderer().render_rows(&rows).unwrap();
        let g = &table.groups[1];
        assert!(!g.has_tabs());
        assert_eq!(g.containers[0].active_tab, 2);
        assert_eq!(g.containers[0].pane.collect_text(), "Only Jowett");
    }

    #[test]
    fn multi_version_has_exactly_one_active_tab() {
        let rows = parse_csv(REPUBLIC).unwrap();
        let table = renderer().render_rows(&rows).unwrap();
        for g in table.groups.iter().filter(|g| g.has_tabs()) {
            let active: Vec<usize> = g
                .versions
                .iter()
                .filter(|v| v.position == g.containers[0].active_tab)
                .map(|v| v.position)
                .collect();
            assert_eq!(active.len(), 1);
            let expected = g.version(active[0]).unwrap().content.collect_text();
            assert_eq!(g.containers[0].pane.collect_text(), expected);
        }
    }

    #[test]
    fn default_tab_falls_back_to_first_available() {
        let rows = parse_csv(REPUBLIC).unwrap();
        let table = renderer().render_rows(&rows).unwrap();
        // Row 4 has no D:Greek; column 0 defaults to tab 1 → falls back to 2
        let g = &table.groups[2];
        assert_eq!(g.containers[0].active_tab, 2);
        let labels: Vec<usize> = g.versions.iter().map(|v| v.position).collect();
        assert_eq!(labels, vec![2, 3]);
    }

    #[test]
    fn select_tab_replaces_pane_and_refreshes_references() {
        let r = renderer();
        let rows = parse_csv(REPUBLIC).unwrap();
        let mut table = r.render_rows(&rows).unwrap();
        let versions_before = table.groups[2].versions.clone();

        assert!(r.select_tab(&mut table, 2, 0, 3));
        assert_eq!(table.groups[2].containers[0].pane.collect_text(), "Bloom");

        assert!(r.select_tab(&mut table, 2, 0, 2));
        let pane = &table.groups[2].containers[0].pane;
        assert_eq!(pane.find_all(&|n| n.has_class(REFERENCE_CLASS)).len(), 1);
        assert_eq!(table.groups[2].versions, versions_before);

        assert!(!r.select_tab(&mut table, 2, 0, 1), "empty tab must be refused");
    }

    #[test]
    fn notes_need_notes_and_index() {
        let rows = parse_csv(REPUBLIC).unwrap();
        let mut table = renderer().render_rows(&rows).unwrap();
        assert!(table.groups[0].notes.is_none());
        let notes = table.groups[1].notes.as_ref().unwrap();
        assert_eq!(notes.index, "1.1");
        assert!(!notes.expanded);

        let wide = toggle_notes(&mut table.groups[1], 1200.0, 768.0);
        assert_eq!(wide, Some(NotesToggle::Inline { expanded: true }));
        let narrow = toggle_notes(&mut table.groups[1], 400.0, 768.0);
        assert!(matches!(narrow, Some(NotesToggle::Overlay(_))));
        assert!(table.groups[1].notes.as_ref().unwrap().expanded);
    }

    #[test]
    fn empty_data_is_distinguishable() {
        let r = renderer();
        assert!(matches!(r.render_rows(&[]), Err(ContentError::NoRows)));

        let no_versions = parse_csv("Title,Notes\nA,B\n").unwrap();
        assert!(matches!(r.render_rows(&no_versions), Err(ContentError::NoVersionColumns)));

        let all_empty = parse_csv("Chapter,D:Text\nOne,\n").unwrap();
        assert!(matches!(r.render_rows(&all_empty), Err(ContentError::NothingToDisplay)));
    }

    #[test]
    fn documents_render_as_prose() {
        let body = renderer().render(
            "Meditations",
            Ok(LoadedSource::Document(
                "<html><body><p>On the Forms</p><script>x()</script></body></html>".into(),
            )),
        );
        match body {
            RenderedBody::Prose(node) => {
                assert_eq!(node.collect_text(), "On the Forms");
                assert_eq!(node.find_all(&|n| n.has_class(REFERENCE_CLASS)).len(), 1);
            }
            other => panic!("expected prose, got {:?}", other),
        }
    }
}
