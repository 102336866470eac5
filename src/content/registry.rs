//! Per-title metadata and render targets, loaded lazily.
//!
//! `ensure_loaded` flips the loaded flag before a worker thread is spawned,
//! so a title is fetched at most once per session. Finished fetches come
//! back over a channel that the UI thread drains with `poll`.

use std::collections::HashMap;
use std::sync::{mpsc, Arc};

use indexmap::IndexMap;

use crate::content::columns::ColumnManager;
use crate::content::render::{ContentRenderer, LoadedSource, RenderedContent};
use crate::content::{ContentItem, ContentType, SourceKind};
use crate::net::sheet::{ContentSource, SheetError};

type LoadMessage = (String, Result<LoadedSource, SheetError>);
type RepaintHook = Arc<dyn Fn() + Send + Sync>;

/// A worker's single reply. Sent on drop, so a worker that unwinds still
/// reports `SheetError::Interrupted` instead of leaving its title in flight.
struct Reply {
    title: String,
    tx: mpsc::Sender<LoadMessage>,
    repaint: Option<RepaintHook>,
    result: Option<Result<LoadedSource, SheetError>>,
}

impl Drop for Reply {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or(Err(SheetError::Interrupted));
        let _ = self.tx.send((std::mem::take(&mut self.title), result));
        if let Some(repaint) = &self.repaint {
            repaint();
        }
    }
}

/// Lazy-load bookkeeping for one title.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentMeta {
    pub link: String,
    pub content_type: ContentType,
    pub loaded: bool,
}

/// Result of `ensure_loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    AlreadyLoaded,
    Started,
    Unknown,
}

pub struct ContentRegistry {
    source: Arc<dyn ContentSource>,
    renderer: ContentRenderer,
    items: IndexMap<String, ContentItem>,
    metas: HashMap<String, ContentMeta>,
    targets: HashMap<String, RenderedContent>,
    tx: mpsc::Sender<LoadMessage>,
    rx: mpsc::Receiver<LoadMessage>,
    in_flight: usize,
    repaint: Option<RepaintHook>,
}

impl ContentRegistry {
    pub fn new(source: Arc<dyn ContentSource>, renderer: ContentRenderer) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            renderer,
            items: IndexMap::new(),
            metas: HashMap::new(),
            targets: HashMap::new(),
            tx,
            rx,
            in_flight: 0,
            repaint: None,
        }
    }

    /// Called from worker threads after each finished fetch.
    pub fn set_repaint_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.repaint = Some(Arc::new(hook));
    }

    pub fn renderer(&self) -> &ContentRenderer {
        &self.renderer
    }

    /// Store an item with an empty render target. No fetch happens.
    pub fn register(&mut self, item: ContentItem) {
        if self.items.contains_key(&item.title) {
            log::warn!("Duplicate title '{}' overwrites the earlier entry", item.title);
        }
        self.metas.insert(
            item.title.clone(),
            ContentMeta {
                link: item.link.clone(),
                content_type: item.content_type,
                loaded: false,
            },
        );
        self.targets.insert(
            item.title.clone(),
            RenderedContent::loading(&item.title, item.content_type),
        );
        self.items.insert(item.title.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.items.contains_key(title)
    }

    pub fn item(&self, title: &str) -> Option<&ContentItem> {
        self.items.get(title)
    }

    /// Items in registration order.
    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.values()
    }

    pub fn items_of_type(&self, content_type: ContentType) -> impl Iterator<Item = &ContentItem> {
        self.items.values().filter(move |i| i.content_type == content_type)
    }

    pub fn meta(&self, title: &str) -> Option<&ContentMeta> {
        self.metas.get(title)
    }

    pub fn get(&self, title: &str) -> Option<&RenderedContent> {
        self.targets.get(title)
    }

    pub fn get_mut(&mut self, title: &str) -> Option<&mut RenderedContent> {
        self.targets.get_mut(title)
    }

    /// Deep copy of a title's target, for popups. Unknown titles get the
    /// "not loaded" placeholder.
    pub fn clone_content(&self, title: &str) -> RenderedContent {
        self.targets
            .get(title)
            .cloned()
            .unwrap_or_else(|| RenderedContent::not_loaded(title))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Start fetching `title` unless it was already started.
    pub fn ensure_loaded(&mut self, title: &str) -> LoadState {
        let Some(meta) = self.metas.get_mut(title) else {
            log::debug!("ensure_loaded: unknown title '{}'", title);
            return LoadState::Unknown;
        };
        if meta.loaded {
            log::debug!("Cache hit: '{}'", title);
            return LoadState::AlreadyLoaded;
        }
        meta.loaded = true;

        let link = meta.link.clone();
        let kind = SourceKind::from_link(&link);
        let source = Arc::clone(&self.source);
        let reply = Reply {
            title: title.to_string(),
            tx: self.tx.clone(),
            repaint: self.repaint.clone(),
            result: None,
        };
        self.in_flight += 1;
        log::info!("Loading '{}' ({:?}) from {}", title, kind, link);

        std::thread::spawn(move || {
            let mut reply = reply;
            reply.result = Some(match kind {
                SourceKind::Sheet => source.fetch_rows(&link).map(LoadedSource::Rows),
                SourceKind::Document => source.fetch_document(&link).map(LoadedSource::Document),
            });
        });

        LoadState::Started
    }

    /// Drain finished fetches into their targets. Returns the titles that
    /// completed, in arrival order.
    pub fn poll(&mut self) -> Vec<String> {
        let mut done = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            done.push(self.finish(message));
        }
        done
    }

    /// Block until every started fetch has been rendered.
    pub fn wait_idle(&mut self) -> Vec<String> {
        let mut done = Vec::new();
        while self.in_flight > 0 {
            match self.rx.recv() {
                Ok(message) => done.push(self.finish(message)),
                Err(_) => break,
            }
        }
        done
    }

    fn finish(&mut self, (title, result): LoadMessage) -> String {
        self.in_flight = self.in_flight.saturating_sub(1);
        let body = self.renderer.render(&title, result);
        match self.targets.get_mut(&title) {
            Some(target) => target.body = body,
            None => log::warn!("Load finished for unregistered title '{}'", title),
        }
        title
    }

    /// Switch a tab inside one title's row table.
    pub fn select_tab(&mut self, title: &str, group: usize, column: usize, tab: usize) -> bool {
        match self.targets.get_mut(title).and_then(RenderedContent::rows_mut) {
            Some(table) => self.renderer.select_tab(table, group, column, tab),
            None => false,
        }
    }

    /// Column manager for a loaded row table.
    pub fn columns(&mut self, title: &str) -> Option<ColumnManager<'_>> {
        let table = self.targets.get_mut(title)?.rows_mut()?;
        Some(ColumnManager::new(table, &self.renderer))
    }

    /// Re-run reference highlighting over a title's target.
    pub fn refresh_references(&mut self, title: &str) -> usize {
        match self.targets.get_mut(title) {
            Some(target) => self.renderer.refresh_references(&mut target.body),
            None => 0,
        }
    }
}
