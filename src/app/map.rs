//! Wisdom map canvas for `WisdomApp`.
//!
//! The scene is built once from the registry and kept in `MapView`. Each
//! frame handles pan/zoom/drag input, forwards clicks to the scene as
//! widget events, paints the background shape, edges and nodes, and shows
//! the open popups as windows stacked by their z order.

use eframe::egui::{self, Color32, Pos2, Stroke};

use wisdom_browser::content::render::{RenderedBody, RenderedContent};
use wisdom_browser::map::graph::GraphEvent;
use wisdom_browser::map::interaction::{Emphasis, MapAction, Popup, MAX_SCALE, MIN_SCALE};
use wisdom_browser::map::shape::{flatten_path, scene_bounds, ShapeScene};
use wisdom_browser::map::{Bounds, Branch, NodeShape, Point};

use crate::ui::{render_node, ReaderStyle};

use super::{BootState, MapView, WisdomApp};

const FILTER_TAGS: [Branch; 5] = [
    Branch::Wisdom,
    Branch::Reality,
    Branch::Reason,
    Branch::Right,
    Branch::Musings,
];
const NODE_RADIUS: f32 = 6.0;
const CURVE_STEPS: usize = 8;
const POPUP_SALT: &str = "map_popup";

fn branch_color(branch: Branch) -> Color32 {
    match branch {
        Branch::Root => Color32::from_gray(140),
        Branch::Wisdom => Color32::from_rgb(200, 160, 40),
        Branch::Reality => Color32::from_rgb(70, 150, 80),
        Branch::Reason => Color32::from_rgb(60, 110, 200),
        Branch::Right => Color32::from_rgb(190, 70, 70),
        Branch::Musings => Color32::from_rgb(140, 90, 180),
        Branch::Other => Color32::from_gray(120),
    }
}

/// Canvas-local screen units to egui positions and back.
#[derive(Clone, Copy)]
struct Canvas {
    origin: Pos2,
}

impl Canvas {
    fn local(self, pos: Pos2) -> Point {
        Point::new((pos.x - self.origin.x) as f64, (pos.y - self.origin.y) as f64)
    }

    fn pos(self, p: Point) -> Pos2 {
        egui::pos2(self.origin.x + p.x as f32, self.origin.y + p.y as f32)
    }
}

impl WisdomApp {
    /// Full-panel map view.
    pub fn draw_map(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let style = self.reader_style();
        let BootState::Ready(wisdom) = &mut self.boot else {
            return;
        };
        let map = &mut self.map;

        let fit = !map.built;
        if !map.built {
            wisdom.build_map(&mut map.scene);
            map.background = Some(wisdom.map_background(&map.scene));
            map.built = true;
        }

        if let Some(report) = draw_controls(ui, map) {
            ctx.copy_text(report);
            self.status = Some("Node positions copied to the clipboard".to_string());
        }

        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas = Canvas {
            origin: response.rect.min,
        };
        if fit {
            fit_view(map, response.rect.size());
        }

        handle_input(ui, &response, canvas, map);
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                map.layer.click_at(&mut map.scene, canvas.local(pos));
            }
        }
        map.layer.process_events(&mut map.scene, &mut wisdom.registry);

        if map.scene.physics_enabled() {
            map.scene.step_physics();
            ctx.request_repaint();
        }

        paint_background(&painter, canvas, map);
        paint_graph(&painter, canvas, map, ui.visuals().text_color());

        let Some(requested) = draw_popups(ctx, map, &style) else {
            return;
        };
        if let Some(MapAction::OpenInMain {
            content_type,
            title,
        }) = map.layer.open_in_main(&requested, &wisdom.registry)
        {
            self.open_item(content_type, &title);
        }
    }
}

/// Search box, tag filter and toggles. Returns the position report when
/// edit mode is left.
fn draw_controls(ui: &mut egui::Ui, map: &mut MapView) -> Option<String> {
    let mut report = None;
    ui.horizontal_wrapped(|ui| {
        let mut search = map.layer.filter().search.clone();
        if ui
            .add(egui::TextEdit::singleline(&mut search).hint_text("Search...").desired_width(160.0))
            .changed()
        {
            map.layer.set_search(&search);
        }

        ui.separator();
        if ui.selectable_label(map.layer.filter().is_all_tags(), "All").clicked() {
            map.layer.select_all_tags();
        }
        for branch in FILTER_TAGS {
            let on = map.layer.filter().tags.contains(branch.as_str());
            let text = egui::RichText::new(branch.as_str()).color(branch_color(branch));
            if ui.selectable_label(on, text).clicked() {
                map.layer.toggle_tag(branch.as_str());
            }
        }

        ui.separator();
        if ui.selectable_label(map.layer.show_labels(), "Labels").clicked() {
            map.layer.toggle_labels();
        }
        if ui.selectable_label(map.scene.physics_enabled(), "Physics").clicked() {
            map.layer.toggle_physics(&mut map.scene);
        }
        let editing = map.layer.edit_mode();
        if ui
            .selectable_label(editing, "Edit")
            .on_hover_text("Drag nodes; leaving edit mode copies their positions")
            .clicked()
        {
            report = map.layer.set_edit_mode(&mut map.scene, !editing);
        }
    });
    report
}

/// Fit nodes and background into the canvas.
fn fit_view(map: &mut MapView, size: egui::Vec2) {
    let nodes = Bounds::from_points(map.scene.nodes().map(|n| n.position));
    let background = map.background.as_ref().and_then(scene_bounds);
    let bounds = match (nodes, background) {
        (Some(a), Some(b)) => Bounds::from_points([a.min, a.max, b.min, b.max]),
        (a, b) => a.or(b),
    };
    let Some(bounds) = bounds else {
        return;
    };
    let scale = (size.x as f64 / bounds.width().max(1.0)).min(size.y as f64 / bounds.height().max(1.0)) * 0.9;
    let view = map.layer.view_mut();
    view.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    view.offset = Point::new(size.x as f64 / 2.0, size.y as f64 / 2.0) - bounds.center() * view.scale;
}

fn handle_input(ui: &egui::Ui, response: &egui::Response, canvas: Canvas, map: &mut MapView) {
    let pointer = response.interact_pointer_pos().or(response.hover_pos());

    if response.drag_started() && map.layer.edit_mode() {
        map.dragging = pointer.and_then(|p| map.layer.hit_test(&map.scene, canvas.local(p)));
    }
    if response.dragged() {
        match (&map.dragging, pointer) {
            (Some(id), Some(p)) => {
                let world = map.layer.view().to_world(canvas.local(p));
                map.scene.drag_node(id, world);
            }
            _ => {
                let delta = response.drag_delta();
                map.layer.view_mut().pan(Point::new(delta.x as f64, delta.y as f64));
            }
        }
    }
    if response.drag_stopped() {
        if let Some(id) = map.dragging.take() {
            if let Some(position) = map.scene.node(&id).map(|n| n.position) {
                map.scene.dispatch(GraphEvent::DragEnd { node: id, position });
            }
        }
    }

    if let Some(p) = response.hover_pos() {
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll != 0.0 {
            map.layer
                .view_mut()
                .zoom_at(canvas.local(p), (scroll as f64 * 0.002).exp());
        }
    }
}

fn paint_background(painter: &egui::Painter, canvas: Canvas, map: &MapView) {
    let view = map.layer.view();
    let to_pos = |p: Point| canvas.pos(view.to_screen(p));
    let scale = view.scale as f32;
    let fill = Color32::from_rgba_unmultiplied(120, 150, 90, 60);
    let edge = Color32::from_rgba_unmultiplied(80, 110, 60, 140);

    match &map.background {
        Some(ShapeScene::Ribbons(ribbons)) => {
            for ribbon in ribbons {
                let mut mesh = egui::Mesh::default();
                for (left, right) in ribbon.left.iter().zip(&ribbon.right) {
                    mesh.colored_vertex(to_pos(*left), fill);
                    mesh.colored_vertex(to_pos(*right), fill);
                }
                for i in 0..ribbon.left.len().saturating_sub(1) as u32 {
                    let base = i * 2;
                    mesh.add_triangle(base, base + 1, base + 2);
                    mesh.add_triangle(base + 1, base + 3, base + 2);
                }
                painter.add(mesh);

                let outline: Vec<Pos2> = flatten_path(&ribbon.outline, CURVE_STEPS)
                    .into_iter()
                    .map(to_pos)
                    .collect();
                painter.add(egui::Shape::closed_line(outline, Stroke::new(1.0, edge)));
            }
        }
        Some(ShapeScene::Fallback(glyph)) => {
            painter.line_segment(
                [to_pos(glyph.stem.0), to_pos(glyph.stem.1)],
                Stroke::new(4.0 * scale, edge),
            );
            painter.circle_stroke(
                to_pos(glyph.loop_center),
                glyph.loop_radius as f32 * scale,
                Stroke::new(3.0 * scale, edge),
            );
            for leaf in &glyph.leaves {
                let color = branch_color(leaf.branch).gamma_multiply(0.2);
                painter.add(egui::epaint::QuadraticBezierShape::from_points_stroke(
                    [to_pos(leaf.from), to_pos(leaf.control), to_pos(leaf.to)],
                    false,
                    Color32::TRANSPARENT,
                    Stroke::new(leaf.size as f32 * scale, color),
                ));
            }
        }
        None => {}
    }
}

fn paint_graph(painter: &egui::Painter, canvas: Canvas, map: &MapView, text_color: Color32) {
    let view = map.layer.view();
    let to_pos = |p: Point| canvas.pos(view.to_screen(p));
    let emphasis = map.layer.emphasis(&map.scene);
    let dimmed = |id: &str| emphasis.get(id) == Some(&Emphasis::Dimmed);

    for edge in map.scene.edges() {
        let (Some(a), Some(b)) = (map.scene.node(&edge.from), map.scene.node(&edge.to)) else {
            continue;
        };
        let alpha = if dimmed(&edge.from) || dimmed(&edge.to) { 0.15 } else { 0.6 };
        painter.line_segment(
            [to_pos(a.position), to_pos(b.position)],
            Stroke::new(1.0, text_color.gamma_multiply(alpha)),
        );
    }

    for node in map.scene.nodes() {
        let p = to_pos(node.position);
        let faded = dimmed(&node.id);
        let mut color = branch_color(node.group);
        if faded {
            color = color.gamma_multiply(0.25);
        }
        match node.shape {
            NodeShape::Dot => {
                painter.circle_filled(p, NODE_RADIUS, color);
            }
            NodeShape::Square => {
                painter.rect_filled(
                    egui::Rect::from_center_size(p, egui::Vec2::splat(NODE_RADIUS * 2.0)),
                    0.0,
                    color,
                );
            }
            NodeShape::Diamond => {
                let r = NODE_RADIUS * 1.3;
                painter.add(egui::Shape::convex_polygon(
                    vec![
                        p + egui::vec2(0.0, -r),
                        p + egui::vec2(r, 0.0),
                        p + egui::vec2(0.0, r),
                        p + egui::vec2(-r, 0.0),
                    ],
                    color,
                    Stroke::NONE,
                ));
            }
        }
        if map.layer.focus() == Some(node.id.as_str()) {
            painter.circle_stroke(p, NODE_RADIUS + 4.0, Stroke::new(2.0, text_color));
        }
        if map.layer.show_labels() {
            let label_color = if faded { text_color.gamma_multiply(0.3) } else { text_color };
            painter.text(
                p + egui::vec2(0.0, NODE_RADIUS + 2.0),
                egui::Align2::CENTER_TOP,
                &node.label,
                egui::FontId::proportional(12.0),
                label_color,
            );
        }
    }
}

/// Popup windows, lowest z first. Returns a title whose "Open" was clicked.
fn draw_popups(ctx: &egui::Context, map: &mut MapView, style: &ReaderStyle) -> Option<String> {
    let popups: Vec<Popup> = map.layer.popups_by_z().into_iter().cloned().collect();
    let mut requested = None;
    let mut closed = Vec::new();

    for popup in &popups {
        let mut open = true;
        egui::Window::new(&popup.title)
            .id(egui::Id::new((POPUP_SALT, &popup.title)))
            .open(&mut open)
            .default_width(360.0)
            .show(ctx, |ui| {
                if ui.button("Open").clicked() {
                    requested = Some(popup.title.clone());
                }
                ui.separator();
                egui::ScrollArea::vertical()
                    .max_height(320.0)
                    .show(ui, |ui| draw_preview(ui, &popup.content, style));
            });
        if !open {
            closed.push(popup.title.clone());
        }
    }

    if let Some(top) = popups.last() {
        if top.z > map.raised_z {
            ctx.move_to_top(egui::LayerId::new(
                egui::Order::Middle,
                egui::Id::new((POPUP_SALT, &top.title)),
            ));
            map.raised_z = top.z;
        }
    }
    for title in closed {
        map.layer.close_popup(&title);
    }
    requested
}

/// Read-only popup body: prose, or the first column of each row.
fn draw_preview(ui: &mut egui::Ui, content: &RenderedContent, style: &ReaderStyle) {
    let mut ignored = None;
    match &content.body {
        RenderedBody::Loading => {
            ui.spinner();
        }
        RenderedBody::NotLoaded => {
            ui.label("Content not loaded");
        }
        RenderedBody::Error(message) => {
            ui.colored_label(Color32::from_rgb(255, 80, 80), message);
        }
        RenderedBody::Prose(root) => render_node(ui, root, style, &mut ignored),
        RenderedBody::Rows(table) => {
            for group in &table.groups {
                if let Some(chapter) = &group.chapter {
                    ui.strong(chapter);
                }
                if let Some(container) = group.containers.first() {
                    render_node(ui, &container.pane, style, &mut ignored);
                }
            }
        }
    }
}
