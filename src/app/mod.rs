//! `WisdomApp` — the top-level egui application state.
//!
//! This module declares the `WisdomApp` struct and its `eframe::App` impl.
//! Most methods are split across the sibling sub-modules:
//!
//! - `navigation` — boot, sidebar clicks, history, per-frame polling
//! - `toolbar`    — location bar and reader controls
//! - `content`    — sidebar, library listing and the content view
//! - `map`        — the wisdom map canvas and its popups

pub mod content;
pub mod map;
pub mod navigation;
pub mod toolbar;

use std::sync::{mpsc, Arc};
use std::time::Duration;

use eframe::egui;

use wisdom_browser::config::WisdomConfig;
use wisdom_browser::dom::DomNode;
use wisdom_browser::engine::pipeline::{BootData, BootError, WisdomContext};
use wisdom_browser::map::graph::SceneGraph;
use wisdom_browser::map::interaction::MapInteractionLayer;
use wisdom_browser::map::shape::ShapeScene;
use wisdom_browser::net::sheet::{ContentSource, HttpSource};
use wisdom_browser::prefs::{MemoryStore, PreferenceStore, Preferences, Theme, FONT_KEY, THEME_KEY};

use crate::ui::{ReaderStyle, SERIF_FAMILY};

pub enum BootState {
    Loading(mpsc::Receiver<Result<BootData, BootError>>),
    Ready(Box<WisdomContext>),
    Failed(String),
}

/// Map canvas state, kept across openings of the map.
pub struct MapView {
    pub scene: SceneGraph,
    pub layer: MapInteractionLayer,
    pub background: Option<ShapeScene>,
    pub built: bool,
    pub dragging: Option<String>,
    /// Highest popup z already raised to the top layer
    pub raised_z: u64,
}

impl Default for MapView {
    fn default() -> Self {
        let mut scene = SceneGraph::new();
        let layer = MapInteractionLayer::new();
        layer.attach(&mut scene);
        Self {
            scene,
            layer,
            background: None,
            built: false,
            dragging: None,
            raised_z: 0,
        }
    }
}

pub struct WisdomApp {
    pub config: WisdomConfig,
    pub source: Arc<dyn ContentSource>,
    pub boot: BootState,
    pub prefs: Preferences,
    pub serif_available: bool,
    pub location_input: String,
    pub show_map: bool,
    pub map: MapView,
    /// Notes shown in the shared overlay on narrow viewports
    pub overlay: Option<DomNode>,
    pub status: Option<String>,
}

/// eframe storage seen as a preference store.
struct EframeStore<'a>(&'a mut dyn eframe::Storage);

impl PreferenceStore for EframeStore<'_> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.0.get_string(key)
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.0.set_string(key, value);
    }
}

/// Register a system serif font as the `serif` family, if one exists.
fn load_serif_font(ctx: &egui::Context) -> bool {
    let font_paths = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
        "/usr/share/fonts/TTF/DejaVuSerif.ttf",
        "/System/Library/Fonts/Supplemental/Georgia.ttf",
        "C:\\Windows\\Fonts\\georgia.ttf",
    ];
    let mut fonts = egui::FontDefinitions::default();
    for path in &font_paths {
        if let Ok(data) = std::fs::read(path) {
            fonts
                .font_data
                .insert(SERIF_FAMILY.to_owned(), egui::FontData::from_owned(data));
            fonts.families.insert(
                egui::FontFamily::Name(SERIF_FAMILY.into()),
                vec![SERIF_FAMILY.to_owned()],
            );
            ctx.set_fonts(fonts);
            log::info!("Serif font loaded from {}", path);
            return true;
        }
    }
    log::debug!("No serif font found; serif falls back to proportional");
    false
}

impl WisdomApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: WisdomConfig) -> Self {
        let mut store = MemoryStore::default();
        if let Some(storage) = cc.storage {
            for key in [FONT_KEY, THEME_KEY] {
                if let Some(value) = storage.get_string(key) {
                    store.set_string(key, value);
                }
            }
        }
        let prefs = Preferences::load(&store);
        let serif_available = load_serif_font(&cc.egui_ctx);

        let mut app = Self {
            location_input: config.start_location.clone(),
            config,
            source: Arc::new(HttpSource),
            boot: BootState::Failed(String::new()),
            prefs,
            serif_available,
            show_map: false,
            map: MapView::default(),
            overlay: None,
            status: None,
        };
        app.apply_theme(&cc.egui_ctx);
        app.start_boot(&cc.egui_ctx);
        app
    }

    pub fn reader_style(&self) -> ReaderStyle {
        ReaderStyle::new(self.prefs.font, self.serif_available)
    }

    pub fn apply_theme(&self, ctx: &egui::Context) {
        ctx.set_visuals(match self.prefs.theme {
            Theme::Light => egui::Visuals::light(),
            Theme::Dark => egui::Visuals::dark(),
        });
    }

    pub fn context(&self) -> Option<&WisdomContext> {
        match &self.boot {
            BootState::Ready(ctx) => Some(ctx.as_ref()),
            _ => None,
        }
    }
}

impl eframe::App for WisdomApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_boot(ctx);
        let busy = self.poll_loads();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_toolbar(ui, ctx);
            ui.add_space(4.0);
        });

        if let Some(status) = &self.status {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.small(status);
            });
        }

        match &self.boot {
            BootState::Loading(_) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.spinner();
                    });
                });
                ctx.request_repaint_after(Duration::from_millis(100));
                return;
            }
            BootState::Failed(message) => {
                let message = message.clone();
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.colored_label(egui::Color32::from_rgb(255, 80, 80), message);
                });
                return;
            }
            BootState::Ready(_) => {}
        }

        if self.show_map {
            egui::CentralPanel::default().show(ctx, |ui| self.draw_map(ui, ctx));
        } else {
            egui::SidePanel::left("sidebar")
                .resizable(true)
                .default_width(220.0)
                .show(ctx, |ui| self.draw_sidebar(ui));
            egui::CentralPanel::default().show(ctx, |ui| self.draw_content(ui, ctx));
        }
        self.draw_overlay(ctx);

        if busy {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.prefs.save(&mut EframeStore(storage));
    }
}
