//! Navigation: which item is current, history entries and the location URL.
//!
//! Every navigation says where it came from (`NavOrigin`). Only user clicks
//! push history; popstate and deep-link navigations replay state without
//! touching the stack.

use url::Url;

use crate::content::registry::{ContentRegistry, LoadState};
use crate::content::render::RenderedBody;
use crate::content::ContentType;

pub const TYPE_PARAM: &str = "type";
pub const CONTENT_PARAM: &str = "content";
pub const ROW_PARAM: &str = "row";
pub const TAB_PARAM: &str = "tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOrigin {
    UserClick,
    Popstate,
    DeepLink,
}

/// State object stored with a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryState {
    pub content_type: ContentType,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub state: Option<HistoryState>,
    pub location: Url,
}

/// Back/forward stack with a cursor.
#[derive(Debug, Clone)]
pub struct BrowserHistory {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl BrowserHistory {
    pub fn new(location: Url) -> Self {
        Self {
            entries: vec![HistoryEntry {
                state: None,
                location,
            }],
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    /// Truncate forward entries, then append.
    pub fn push(&mut self, state: HistoryState, location: Url) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry {
            state: Some(state),
            location,
        });
        self.index = self.entries.len() - 1;
    }

    /// Rewrite the current entry's location in place.
    pub fn replace_location(&mut self, location: Url) {
        self.entries[self.index].location = location;
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn back(&mut self) -> Option<&HistoryEntry> {
        if !self.can_go_back() {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    pub fn forward(&mut self) -> Option<&HistoryEntry> {
        if !self.can_go_forward() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }
}

/// Query parameters of a location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepLink {
    pub content_type: Option<ContentType>,
    pub title: Option<String>,
    /// 1-based source data row
    pub row: Option<usize>,
    /// 1-based version column
    pub tab: Option<usize>,
}

impl DeepLink {
    pub fn from_url(location: &Url) -> Self {
        let mut link = DeepLink::default();
        for (key, value) in location.query_pairs() {
            match key.as_ref() {
                TYPE_PARAM => link.content_type = value.parse().ok(),
                CONTENT_PARAM => {
                    let title = value.trim();
                    if !title.is_empty() {
                        link.title = Some(title.to_string());
                    }
                }
                ROW_PARAM => link.row = value.parse().ok().filter(|&n| n > 0),
                TAB_PARAM => link.tab = value.parse().ok().filter(|&n| n > 0),
                _ => {}
            }
        }
        link
    }

    fn addresses_row(&self) -> bool {
        self.row.is_some() || self.tab.is_some()
    }
}

/// Result of a `show_content` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Shown(LoadState),
    /// Title is not in the registry; a placeholder is shown
    NotLoaded,
}

/// Row the content view should scroll to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTarget {
    pub title: String,
    pub group: usize,
}

/// Rebuild `base` with its query replaced by `pairs`.
fn with_query<K: AsRef<str>, V: AsRef<str>>(base: &Url, pairs: &[(K, V)]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key.as_ref(), value.as_ref());
        }
    }
    url
}

pub struct NavigationController {
    history: BrowserHistory,
    current: Option<HistoryState>,
    pending: Option<(String, DeepLink)>,
    scroll_target: Option<ScrollTarget>,
}

impl NavigationController {
    pub fn new(location: Url) -> Self {
        Self {
            history: BrowserHistory::new(location),
            current: None,
            pending: None,
            scroll_target: None,
        }
    }

    pub fn history(&self) -> &BrowserHistory {
        &self.history
    }

    pub fn location(&self) -> &Url {
        &self.history.current().location
    }

    pub fn current(&self) -> Option<&HistoryState> {
        self.current.as_ref()
    }

    /// Title of the active sidebar entry.
    pub fn active_title(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.title.as_str())
    }

    pub fn take_scroll_target(&mut self) -> Option<ScrollTarget> {
        self.scroll_target.take()
    }

    /// Show `title`, triggering its lazy load.
    pub fn show_content(
        &mut self,
        registry: &mut ContentRegistry,
        content_type: ContentType,
        title: &str,
        origin: NavOrigin,
        deep_link: Option<DeepLink>,
    ) -> NavOutcome {
        self.scroll_target = None;
        self.pending = None;
        self.current = Some(HistoryState {
            content_type,
            title: title.to_string(),
        });

        if !registry.contains(title) {
            log::warn!("Content not loaded: '{}'", title);
            return NavOutcome::NotLoaded;
        }
        log::info!("Showing {} '{}' ({:?})", content_type, title, origin);

        let load = registry.ensure_loaded(title);

        if origin == NavOrigin::UserClick {
            let location = with_query(
                self.location(),
                &[
                    (TYPE_PARAM, content_type.as_str().to_string()),
                    (CONTENT_PARAM, title.to_string()),
                ],
            );
            self.history.push(
                HistoryState {
                    content_type,
                    title: title.to_string(),
                },
                location,
            );
        }

        if let Some(link) = deep_link.filter(DeepLink::addresses_row) {
            self.pending = Some((title.to_string(), link));
            self.apply_pending(registry);
        }

        NavOutcome::Shown(load)
    }

    /// Resolve the start-up location. Returns `None` when it names no
    /// known item (the library is shown instead).
    pub fn initial_load(&mut self, registry: &mut ContentRegistry, location: Url) -> Option<NavOutcome> {
        self.history.replace_location(location.clone());
        let link = DeepLink::from_url(&location);
        let title = link.title.clone()?;
        let Some(item) = registry.item(&title) else {
            log::warn!("Deep link names unknown content '{}'", title);
            return None;
        };
        let content_type = item.content_type;
        if link.content_type.is_some_and(|t| t != content_type) {
            log::warn!(
                "Deep link type {:?} does not match '{}' ({})",
                link.content_type,
                title,
                content_type
            );
            return None;
        }
        Some(self.show_content(registry, content_type, &title, NavOrigin::DeepLink, Some(link)))
    }

    /// Restore a history entry's state without pushing.
    pub fn popstate(&mut self, registry: &mut ContentRegistry, state: Option<HistoryState>) -> Option<NavOutcome> {
        match state {
            Some(state) => Some(self.show_content(
                registry,
                state.content_type,
                &state.title,
                NavOrigin::Popstate,
                None,
            )),
            None => {
                self.current = None;
                self.pending = None;
                self.scroll_target = None;
                None
            }
        }
    }

    pub fn back(&mut self, registry: &mut ContentRegistry) -> Option<NavOutcome> {
        let state = self.history.back()?.state.clone();
        self.popstate(registry, state)
    }

    pub fn forward(&mut self, registry: &mut ContentRegistry) -> Option<NavOutcome> {
        let state = self.history.forward()?.state.clone();
        self.popstate(registry, state)
    }

    /// Feed titles returned by `ContentRegistry::poll`.
    pub fn on_loaded(&mut self, registry: &mut ContentRegistry, titles: &[String]) {
        let waiting = matches!(&self.pending, Some((t, _)) if titles.contains(t));
        if waiting {
            self.apply_pending(registry);
        }
    }

    /// Apply a pending row/tab request once its title has rendered.
    fn apply_pending(&mut self, registry: &mut ContentRegistry) {
        let Some((title, link)) = self.pending.take() else {
            return;
        };
        let Some(target) = registry.get(&title) else {
            return;
        };
        let group = match &target.body {
            RenderedBody::Loading => {
                self.pending = Some((title, link));
                return;
            }
            RenderedBody::Rows(table) => table.group_index_for_row(link.row.unwrap_or(1)),
            _ => None,
        };
        let Some(group) = group else {
            log::debug!("Deep link row {:?} not rendered in '{}'", link.row, title);
            return;
        };
        if let Some(tab) = link.tab {
            if !registry.select_tab(&title, group, 0, tab) {
                log::debug!("Deep link tab {} unavailable in '{}'", tab, title);
            }
        }
        self.scroll_target = Some(ScrollTarget { title, group });
    }

    /// Reflect a tab choice in the current URL (replaces, never pushes).
    ///
    /// Deep links replay into column 0, so only that column is recorded.
    /// Returns whether the location changed.
    pub fn record_tab_selection(&mut self, column: usize, row: usize, tab: usize) -> bool {
        if column != 0 {
            return false;
        }
        let mut pairs: Vec<(String, String)> = self
            .location()
            .query_pairs()
            .filter(|(k, _)| k != ROW_PARAM && k != TAB_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.push((ROW_PARAM.to_string(), row.to_string()));
        pairs.push((TAB_PARAM.to_string(), tab.to_string()));
        let location = with_query(self.location(), &pairs);
        self.history.replace_location(location);
        true
    }
}
