//! Content-area rendering for `WisdomApp`.
//!
//! - `draw_sidebar` lists registered items grouped by type
//! - `draw_content` shows the library or the active title
//! - `draw_overlay` hosts notes opened on a narrow viewport
//!
//! Drawing only reads the registry; clicks are collected as
//! `ContentAction`s and applied once the frame's borrows are released.

use std::time::Instant;

use eframe::egui;

use wisdom_browser::content::registry::ContentRegistry;
use wisdom_browser::content::render::{
    toggle_notes, NotesToggle, RenderedBody, RenderedContent, RowGroup, RowTable,
};
use wisdom_browser::content::ContentType;

use crate::ui::{render_node, ReaderStyle};

use super::WisdomApp;

const ERROR_RED: egui::Color32 = egui::Color32::from_rgb(255, 80, 80);

#[derive(Debug, Clone)]
enum ContentAction {
    Open {
        content_type: ContentType,
        title: String,
    },
    SelectTab {
        group: usize,
        column: usize,
        tab: usize,
        row: usize,
    },
    ToggleNotes {
        group: usize,
    },
    AddColumn,
    RemoveColumn,
    ResetColumns,
    OpenLink(String),
}

impl WisdomApp {
    /// Left panel: one collapsible list per content type.
    pub fn draw_sidebar(&mut self, ui: &mut egui::Ui) {
        let Some(wisdom) = self.context() else {
            return;
        };
        let active = wisdom.nav.active_title();
        let mut clicked = None;

        egui::ScrollArea::vertical().show(ui, |ui| {
            for content_type in ContentType::ALL {
                let mut items = wisdom.registry.items_of_type(content_type).peekable();
                if items.peek().is_none() {
                    continue;
                }
                egui::CollapsingHeader::new(content_type.plural_label())
                    .default_open(true)
                    .show(ui, |ui| {
                        for item in items {
                            let selected = active == Some(item.title.as_str());
                            if ui.selectable_label(selected, &item.title).clicked() {
                                clicked = Some((item.content_type, item.title.clone()));
                            }
                        }
                    });
            }
        });

        if let Some((content_type, title)) = clicked {
            self.open_item(content_type, &title);
        }
    }

    /// Central panel: the active title, or the library when none is shown.
    pub fn draw_content(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let style = self.reader_style();
        let width = ui.available_width();
        let scroll = self.wisdom_mut().and_then(|w| w.nav.take_scroll_target());
        let Some(wisdom) = self.context() else {
            return;
        };

        let mut actions = Vec::new();
        let active = wisdom.nav.active_title().map(str::to_string);
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| match &active {
                None => draw_library(ui, &wisdom.registry, &mut actions),
                Some(title) => {
                    let scroll_group = scroll
                        .as_ref()
                        .filter(|target| &target.title == title)
                        .map(|target| target.group);
                    match wisdom.registry.get(title) {
                        Some(content) => {
                            draw_target(ui, content, &style, scroll_group, &mut actions)
                        }
                        None => {
                            ui.heading(title);
                            ui.label("Content not loaded");
                        }
                    }
                }
            });

        if let Some(title) = active {
            self.apply_actions(ctx, &title, actions, width);
        } else if let Some(ContentAction::Open { content_type, title }) = actions.pop() {
            self.open_item(content_type, &title);
        }
    }

    fn apply_actions(&mut self, ctx: &egui::Context, title: &str, actions: Vec<ContentAction>, width: f32) {
        let narrow_px = self.config.narrow_viewport_px;
        let Some(wisdom) = self.wisdom_mut() else {
            return;
        };

        let mut structural = false;
        let mut tab_selected = false;
        let mut overlay = None;
        let mut open = None;
        for action in actions {
            match action {
                ContentAction::SelectTab {
                    group,
                    column,
                    tab,
                    row,
                } => {
                    if wisdom.registry.select_tab(title, group, column, tab) {
                        tab_selected |= wisdom.nav.record_tab_selection(column, row, tab);
                        structural = true;
                    }
                }
                ContentAction::ToggleNotes { group } => {
                    let group = wisdom
                        .registry
                        .get_mut(title)
                        .and_then(RenderedContent::rows_mut)
                        .and_then(|table| table.groups.get_mut(group));
                    match group.and_then(|g| toggle_notes(g, width, narrow_px)) {
                        Some(NotesToggle::Overlay(node)) => overlay = Some(node),
                        Some(NotesToggle::Inline { .. }) => structural = true,
                        None => {}
                    }
                }
                ContentAction::AddColumn => {
                    if let Some(mut columns) = wisdom.registry.columns(title) {
                        structural |= columns.add_column();
                    }
                }
                ContentAction::RemoveColumn => {
                    if let Some(mut columns) = wisdom.registry.columns(title) {
                        structural |= columns.remove_column();
                    }
                }
                ContentAction::ResetColumns => {
                    if let Some(mut columns) = wisdom.registry.columns(title) {
                        columns.reset_columns();
                        structural = true;
                    }
                }
                ContentAction::OpenLink(href) => ctx.open_url(egui::OpenUrl::new_tab(href)),
                ContentAction::Open {
                    content_type,
                    title: next,
                } => open = Some((content_type, next)),
            }
        }

        if structural {
            wisdom.reference_watch.notify(Instant::now());
        }
        let location = tab_selected.then(|| wisdom.nav.location().to_string());

        if let Some(location) = location {
            self.location_input = location;
        }
        if overlay.is_some() {
            self.overlay = overlay;
        }
        if let Some((content_type, next)) = open {
            self.open_item(content_type, &next);
        }
    }

    /// Shared notes overlay for narrow viewports.
    pub fn draw_overlay(&mut self, ctx: &egui::Context) {
        let Some(node) = &self.overlay else {
            return;
        };
        let style = self.reader_style();
        let mut open = true;
        egui::Window::new("Notes")
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .default_width(360.0)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let mut ignored = None;
                    render_node(ui, node, &style, &mut ignored);
                });
            });
        if !open {
            self.overlay = None;
        }
    }
}

fn draw_library(ui: &mut egui::Ui, registry: &ContentRegistry, actions: &mut Vec<ContentAction>) {
    ui.heading("Library");
    ui.add_space(8.0);
    for content_type in ContentType::ALL {
        let items: Vec<_> = registry.items_of_type(content_type).collect();
        if items.is_empty() {
            continue;
        }
        ui.label(egui::RichText::new(format!("{} ({})", content_type.plural_label(), items.len())).strong());
        for item in items {
            if ui.link(&item.title).clicked() {
                actions.push(ContentAction::Open {
                    content_type: item.content_type,
                    title: item.title.clone(),
                });
            }
        }
        ui.add_space(6.0);
    }
}

fn draw_target(
    ui: &mut egui::Ui,
    content: &RenderedContent,
    style: &ReaderStyle,
    scroll_group: Option<usize>,
    actions: &mut Vec<ContentAction>,
) {
    ui.heading(&content.title);
    ui.add_space(6.0);
    match &content.body {
        RenderedBody::Loading => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading...");
            });
        }
        RenderedBody::NotLoaded => {
            ui.label("Content not loaded");
        }
        RenderedBody::Error(message) => {
            ui.colored_label(ERROR_RED, message);
        }
        RenderedBody::Prose(root) => {
            let mut clicked = None;
            render_node(ui, root, style, &mut clicked);
            if let Some(href) = clicked {
                actions.push(ContentAction::OpenLink(href));
            }
        }
        RenderedBody::Rows(table) => draw_rows(ui, table, style, scroll_group, actions),
    }
}

fn draw_rows(
    ui: &mut egui::Ui,
    table: &RowTable,
    style: &ReaderStyle,
    scroll_group: Option<usize>,
    actions: &mut Vec<ContentAction>,
) {
    ui.horizontal(|ui| {
        ui.label(format!("Columns: {}", table.column_count()));
        if table.can_remove_column() && ui.button("\u{2212}").clicked() {
            actions.push(ContentAction::RemoveColumn);
        }
        if ui.add_enabled(table.can_add_column(), egui::Button::new("+")).clicked() {
            actions.push(ContentAction::AddColumn);
        }
        if table.can_remove_column() && ui.button("Reset").clicked() {
            actions.push(ContentAction::ResetColumns);
        }
    });
    ui.separator();

    for (index, group) in table.groups.iter().enumerate() {
        if let Some(chapter) = &group.chapter {
            ui.add_space(10.0);
            ui.label(style_heading(style, chapter));
            ui.add_space(4.0);
        }
        let response = ui
            .vertical(|ui| draw_group(ui, table, index, group, style, actions))
            .response;
        if scroll_group == Some(index) {
            response.scroll_to_me(Some(egui::Align::TOP));
        }
        ui.separator();
    }
}

fn style_heading(style: &ReaderStyle, text: &str) -> egui::RichText {
    egui::RichText::new(text)
        .family(style.family.clone())
        .size(style.size + 5.0)
        .strong()
}

fn draw_group(
    ui: &mut egui::Ui,
    table: &RowTable,
    index: usize,
    group: &RowGroup,
    style: &ReaderStyle,
    actions: &mut Vec<ContentAction>,
) {
    if !group.containers.is_empty() {
        ui.columns(group.containers.len(), |cols| {
            for (column, (ui, container)) in cols.iter_mut().zip(&group.containers).enumerate() {
                if group.has_tabs() {
                    ui.horizontal_wrapped(|ui| {
                        for version in &group.versions {
                            let label = table
                                .version_columns
                                .iter()
                                .find(|v| v.position == version.position)
                                .map(|v| v.label())
                                .unwrap_or_default();
                            let tab = ui
                                .selectable_label(
                                    container.active_tab == version.position,
                                    version.position.to_string(),
                                )
                                .on_hover_text(label);
                            if tab.clicked() && container.active_tab != version.position {
                                actions.push(ContentAction::SelectTab {
                                    group: index,
                                    column,
                                    tab: version.position,
                                    row: group.row_number,
                                });
                            }
                        }
                    });
                }
                let mut clicked = None;
                render_node(ui, &container.pane, style, &mut clicked);
                if let Some(href) = clicked {
                    actions.push(ContentAction::OpenLink(href));
                }
            }
        });
    }

    if let Some(notes) = &group.notes {
        let arrow = if notes.expanded { "\u{25BE}" } else { "\u{25B8}" };
        if ui.small_button(format!("{} Notes {}", arrow, notes.index)).clicked() {
            actions.push(ContentAction::ToggleNotes { group: index });
        }
        if notes.expanded {
            egui::Frame::group(ui.style()).show(ui, |ui| {
                let mut clicked = None;
                render_node(ui, &notes.content, style, &mut clicked);
                if let Some(href) = clicked {
                    actions.push(ContentAction::OpenLink(href));
                }
            });
        }
    }
}
