//! Spreadsheet and document sources.
//!
//! `ContentSource` is the transport seam: the registry and the boot
//! pipeline only ever ask it for rows or document HTML, so tests swap in
//! `FakeSource` and never touch the network.

use indexmap::IndexMap;
use thiserror::Error;

use super::fetch::{fetch_text, FetchError};

/// One spreadsheet record: column name → cell text, in header order.
pub type Row = IndexMap<String, String>;

#[derive(Debug, Clone, Error)]
pub enum SheetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Malformed CSV: {0}")]
    Csv(String),
    #[error("Loader stopped before replying")]
    Interrupted,
}

/// Where content comes from.
pub trait ContentSource: Send + Sync {
    /// Fetch a published sheet and parse it into rows.
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, SheetError>;

    /// Fetch a published document's raw HTML.
    fn fetch_document(&self, url: &str) -> Result<String, SheetError>;
}

/// Live HTTP source (blocking; call from a worker thread).
#[derive(Debug, Default, Clone)]
pub struct HttpSource;

impl ContentSource for HttpSource {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, SheetError> {
        let result = fetch_text(url)?;
        parse_csv(&result.body)
    }

    fn fetch_document(&self, url: &str) -> Result<String, SheetError> {
        Ok(fetch_text(url)?.body)
    }
}

/// Parse CSV text (first record = header) into ordered rows.
///
/// Short records are padded with empty cells and header names are trimmed,
/// so every row carries every column. Fully blank records are dropped.
pub fn parse_csv(text: &str) -> Result<Vec<Row>, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SheetError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SheetError::Csv(e.to_string()))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row = Row::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let cell = record.get(i).unwrap_or("");
            row.insert(name.clone(), cell.to_string());
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Read a trimmed, non-empty cell.
pub fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// In-memory source for tests: URL → canned response, with a fetch counter.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct FakeSource {
        sheets: HashMap<String, Result<String, SheetError>>,
        documents: HashMap<String, String>,
        delay: Option<Duration>,
        panics: HashSet<String>,
        fetches: AtomicUsize,
        log: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_sheet(mut self, url: &str, csv: &str) -> Self {
            self.sheets.insert(url.to_string(), Ok(csv.to_string()));
            self
        }

        pub fn with_failure(mut self, url: &str) -> Self {
            self.sheets.insert(
                url.to_string(),
                Err(SheetError::Fetch(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                })),
            );
            self
        }

        pub fn with_document(mut self, url: &str, html: &str) -> Self {
            self.documents.insert(url.to_string(), html.to_string());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Fetching `url` panics inside the worker.
        pub fn with_panic(mut self, url: &str) -> Self {
            self.panics.insert(url.to_string());
            self
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        pub fn fetched_urls(&self) -> Vec<String> {
            self.log.lock().map(|l| l.clone()).unwrap_or_default()
        }

        fn record(&self, url: &str) {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut log) = self.log.lock() {
                log.push(url.to_string());
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.panics.contains(url) {
                panic!("fetch of {} blew up", url);
            }
        }
    }

    impl ContentSource for FakeSource {
        fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, SheetError> {
            self.record(url);
            match self.sheets.get(url) {
                Some(Ok(csv)) => parse_csv(csv),
                Some(Err(e)) => Err(e.clone()),
                None => Err(SheetError::Fetch(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                })),
            }
        }

        fn fetch_document(&self, url: &str) -> Result<String, SheetError> {
            self.record(url);
            self.documents.get(url).cloned().ok_or_else(|| {
                SheetError::Fetch(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rows_keep_header_order() {
        let rows = parse_csv("Title,D:Greek,D:English\nRepublic,Πολιτεία,The Republic\n").unwrap();
        assert_eq!(rows.len(), 1);
        let cols: Vec<&str> = rows[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(cols, vec!["Title", "D:Greek", "D:English"]);
    }

    #[test]
    fn short_records_are_padded() {
        let rows = parse_csv("Title,Tag,Parent\nEthics\n").unwrap();
        assert_eq!(rows[0].get("Parent").map(String::as_str), Some(""));
    }

    #[test]
    fn quoted_cells_keep_commas_and_newlines() {
        let rows = parse_csv("Title,D:Text\nMeno,\"Virtue, then:\nteachable?\"\n").unwrap();
        assert_eq!(cell(&rows[0], "D:Text"), Some("Virtue, then:\nteachable?"));
    }

    #[test]
    fn blank_records_are_dropped() {
        let rows = parse_csv("Title,Tag\n,\nPhaedo,Reason\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(cell(&rows[0], "Title"), Some("Phaedo"));
    }
}
