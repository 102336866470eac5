//! Navigation methods for `WisdomApp`.
//!
//! Covers the asynchronous boot (`start_boot`, `check_boot`), per-frame load
//! polling, and the user-facing navigation entry points: sidebar clicks,
//! back/forward and typed locations.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;
use url::Url;

use wisdom_browser::content::ContentType;
use wisdom_browser::engine::pipeline::{BootError, WisdomContext, WisdomEngine};
use wisdom_browser::nav::{DeepLink, NavOrigin, NavOutcome};

use super::{BootState, WisdomApp};

impl WisdomApp {
    pub fn wisdom_mut(&mut self) -> Option<&mut WisdomContext> {
        match &mut self.boot {
            BootState::Ready(ctx) => Some(ctx.as_mut()),
            _ => None,
        }
    }

    /// Fetch the index, tooltip and shape sheets off the UI thread.
    pub fn start_boot(&mut self, ctx: &egui::Context) {
        let (tx, rx) = mpsc::channel();
        self.boot = BootState::Loading(rx);

        let engine = WisdomEngine::new(self.config.clone(), Arc::clone(&self.source));
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(engine.fetch_boot_data());
            ctx.request_repaint();
        });
    }

    /// Poll the boot channel and assemble the context when data arrives.
    pub fn check_boot(&mut self, ctx: &egui::Context) {
        let BootState::Loading(rx) = &self.boot else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(BootError {
                message: "boot worker exited".to_string(),
                phase: "fetch",
            }),
        };

        let context = result
            .and_then(|data| WisdomContext::new(self.config.clone(), Arc::clone(&self.source), data));
        match context {
            Ok(mut wisdom) => {
                let repaint = ctx.clone();
                wisdom.registry.set_repaint_hook(move || repaint.request_repaint());
                if wisdom.start().is_none() {
                    log::info!("No start item; showing the library");
                }
                self.location_input = wisdom.nav.location().to_string();
                self.boot = BootState::Ready(Box::new(wisdom));
            }
            Err(e) => {
                log::error!("Boot failed: {}", e);
                self.boot = BootState::Failed(e.to_string());
            }
        }
    }

    /// Drain finished loads. Returns whether another frame is needed soon.
    pub fn poll_loads(&mut self) -> bool {
        let BootState::Ready(wisdom) = &mut self.boot else {
            return false;
        };
        let done = wisdom.poll(Instant::now());
        if !done.is_empty() {
            self.map.layer.refresh_popups(&wisdom.registry, &done);
        }
        wisdom.registry.in_flight() > 0 || wisdom.reference_watch.is_pending()
    }

    fn sync_location(&mut self) {
        if let Some(wisdom) = self.context() {
            self.location_input = wisdom.nav.location().to_string();
        }
    }

    fn report(&mut self, outcome: Option<NavOutcome>) {
        self.status = match outcome {
            Some(NavOutcome::NotLoaded) => Some("Content not loaded".to_string()),
            _ => None,
        };
        self.overlay = None;
        self.sync_location();
    }

    /// Sidebar or map "open" click.
    pub fn open_item(&mut self, content_type: ContentType, title: &str) {
        let outcome = self.wisdom_mut().map(|w| {
            w.nav
                .show_content(&mut w.registry, content_type, title, NavOrigin::UserClick, None)
        });
        self.show_map = false;
        self.report(outcome);
    }

    /// Navigate one step back in history.
    pub fn go_back(&mut self) {
        let outcome = self.wisdom_mut().and_then(|w| w.nav.back(&mut w.registry));
        self.report(outcome);
    }

    /// Navigate one step forward in history.
    pub fn go_forward(&mut self) {
        let outcome = self.wisdom_mut().and_then(|w| w.nav.forward(&mut w.registry));
        self.report(outcome);
    }

    /// Open the typed location. A bare query is taken relative to the
    /// current location.
    pub fn open_location(&mut self) {
        let input = self.location_input.trim().to_string();
        let Some(wisdom) = self.wisdom_mut() else {
            return;
        };
        let parsed = Url::parse(&input).or_else(|_| wisdom.nav.location().join(&input));
        let location = match parsed {
            Ok(url) => url,
            Err(e) => {
                self.status = Some(format!("Invalid location: {}", e));
                return;
            }
        };

        let link = DeepLink::from_url(&location);
        let outcome = match link.title.clone() {
            Some(title) => {
                let content_type = link
                    .content_type
                    .or_else(|| wisdom.registry.item(&title).map(|i| i.content_type))
                    .unwrap_or(ContentType::Article);
                Some(wisdom.nav.show_content(
                    &mut wisdom.registry,
                    content_type,
                    &title,
                    NavOrigin::UserClick,
                    Some(link),
                ))
            }
            None => wisdom.nav.popstate(&mut wisdom.registry, None),
        };
        self.show_map = false;
        self.report(outcome);
    }
}
