//! Content items: the index sheet's rows turned into typed records.

pub mod annotate;
pub mod columns;
pub mod registry;
pub mod render;

use std::fmt;
use std::str::FromStr;

use crate::map::Point;
use crate::net::sheet::{cell, Row};

/// Which sidebar list an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentType {
    Article,
    Book,
    Breakdown,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [ContentType::Article, ContentType::Book, ContentType::Breakdown];

    /// Value used in the `type` query parameter and the sheet's Type column.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::Book => "book",
            ContentType::Breakdown => "breakdown",
        }
    }

    pub fn plural_label(self) -> &'static str {
        match self {
            ContentType::Article => "Articles",
            ContentType::Book => "Books",
            ContentType::Breakdown => "Breakdowns",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "article" | "articles" => Ok(ContentType::Article),
            "book" | "books" => Ok(ContentType::Book),
            "breakdown" | "breakdowns" => Ok(ContentType::Breakdown),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

/// How a content link is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Published document: rendered as sanitized prose
    Document,
    /// Published sheet: rendered as tabbed row groups
    Sheet,
}

impl SourceKind {
    pub fn from_link(link: &str) -> Self {
        let lower = link.trim().to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or("");
        if lower.contains("docs.google.com/document/")
            || path.ends_with(".html")
            || path.ends_with(".htm")
        {
            SourceKind::Document
        } else {
            SourceKind::Sheet
        }
    }
}

/// One entry of the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub title: String,
    pub link: String,
    pub content_type: ContentType,
    pub tag: Option<String>,
    pub parent_title: Option<String>,
    pub explicit_position: Option<Point>,
}

impl ContentItem {
    /// Build an item from an index-sheet row.
    ///
    /// Rows without a Title, or with an unrecognized Type, yield `None`.
    pub fn from_row(row: &Row) -> Option<Self> {
        let title = cell(row, "Title")?.to_string();
        let content_type = match cell(row, "Type").map(str::parse::<ContentType>) {
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                log::warn!("Skipping '{}': {}", title, e);
                return None;
            }
            None => {
                log::warn!("Skipping '{}': no Type", title);
                return None;
            }
        };

        let explicit_position = match (cell(row, "X"), cell(row, "Y")) {
            (Some(x), Some(y)) => match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => Some(Point::new(x, y)),
                _ => None,
            },
            _ => None,
        };

        Some(Self {
            title,
            link: cell(row, "Link").unwrap_or_default().to_string(),
            content_type,
            tag: cell(row, "Tag").map(str::to_string),
            parent_title: cell(row, "Parent").map(str::to_string),
            explicit_position,
        })
    }

    pub fn source_kind(&self) -> SourceKind {
        SourceKind::from_link(&self.link)
    }
}

/// Parse every usable row of the index sheet, in sheet order.
pub fn items_from_rows(rows: &[Row]) -> Vec<ContentItem> {
    rows.iter().filter_map(ContentItem::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::sheet::parse_csv;

    #[test]
    fn parses_index_rows() {
        let rows = parse_csv(
            "Title,Link,Type,Tag,Parent,X,Y\n\
             Republic,https://x/pub?output=csv,Book,Reason,Wisdom,12.5,-40\n\
             Untyped,https://x,,Reason,,,\n\
             Meditations,https://x/doc.html,article,,,abc,3\n",
        )
        .unwrap();
        let items = items_from_rows(&rows);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content_type, ContentType::Book);
        assert_eq!(items[0].explicit_position, Some(Point::new(12.5, -40.0)));
        assert_eq!(items[0].parent_title.as_deref(), Some("Wisdom"));
        assert_eq!(items[1].explicit_position, None);
        assert_eq!(items[1].source_kind(), SourceKind::Document);
    }

    #[test]
    fn source_kind_ignores_query() {
        assert_eq!(
            SourceKind::from_link("https://docs.google.com/document/d/e/x/pub"),
            SourceKind::Document
        );
        assert_eq!(
            SourceKind::from_link("https://docs.google.com/spreadsheets/d/x/pub?output=csv&x=a.html"),
            SourceKind::Sheet
        );
    }
}
