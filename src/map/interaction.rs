//! Map interaction: filtering, focus, popups, toggles and the view transform.
//!
//! Widget events are queued by handlers registered in `attach` and handled
//! in `process_events` on the UI thread, after the widget has finished
//! dispatching.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use indexmap::IndexMap;

use super::graph::{GraphEvent, GraphEventKind, GraphWidget, SceneGraph};
use super::{MapNode, Point};
use crate::content::registry::ContentRegistry;
use crate::content::render::RenderedContent;
use crate::content::ContentType;

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 4.0;
/// Hit radius in screen units.
pub const HIT_RADIUS: f64 = 20.0;

/// Label search intersected with a tag selection (empty = All).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapFilter {
    pub search: String,
    pub tags: BTreeSet<String>,
}

impl MapFilter {
    pub fn is_all_tags(&self) -> bool {
        self.tags.is_empty()
    }

    /// Whether a search or tag selection narrows the map.
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || !self.tags.is_empty()
    }

    pub fn matches(&self, node: &MapNode) -> bool {
        let needle = self.search.trim().to_lowercase();
        let label_ok = needle.is_empty() || node.label.to_lowercase().contains(&needle);
        let tag_ok = self.tags.is_empty()
            || self.tags.contains(node.group.as_str())
            || node.tag.as_ref().is_some_and(|t| self.tags.contains(t));
        label_ok && tag_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Normal,
    Dimmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    pub content: RenderedContent,
    pub z: u64,
}

/// Requests the map makes of the surrounding app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapAction {
    /// Show this title in the main view and close the map
    OpenInMain {
        content_type: ContentType,
        title: String,
    },
}

/// Screen = world × scale + offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub offset: Point,
    pub scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset: Point::default(),
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn to_world(&self, screen: Point) -> Point {
        (screen - self.offset) * (1.0 / self.scale)
    }

    pub fn to_screen(&self, world: Point) -> Point {
        world * self.scale + self.offset
    }

    pub fn pan(&mut self, delta: Point) {
        self.offset = self.offset + delta;
    }

    /// Zoom by `factor`, keeping the world point under `pivot` fixed.
    pub fn zoom_at(&mut self, pivot: Point, factor: f64) {
        let anchor = self.to_world(pivot);
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.offset = pivot - anchor * self.scale;
    }
}

pub struct MapInteractionLayer {
    filter: MapFilter,
    focus: Option<String>,
    popups: Vec<Popup>,
    next_z: u64,
    show_labels: bool,
    edit_mode: bool,
    view: ViewTransform,
    events: Rc<RefCell<VecDeque<GraphEvent>>>,
}

impl Default for MapInteractionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MapInteractionLayer {
    pub fn new() -> Self {
        Self {
            filter: MapFilter::default(),
            focus: None,
            popups: Vec::new(),
            next_z: 0,
            show_labels: true,
            edit_mode: false,
            view: ViewTransform::default(),
            events: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Route the widget's click and drag events into this layer.
    pub fn attach(&self, widget: &mut dyn GraphWidget) {
        for kind in [GraphEventKind::Click, GraphEventKind::DragEnd] {
            let queue = Rc::clone(&self.events);
            widget.on(kind, Box::new(move |e| queue.borrow_mut().push_back(e.clone())));
        }
    }

    pub fn filter(&self) -> &MapFilter {
        &self.filter
    }

    pub fn set_search(&mut self, search: &str) {
        self.filter.search = search.to_string();
    }

    /// Toggle one tag in the multi-select.
    pub fn toggle_tag(&mut self, tag: &str) {
        if !self.filter.tags.remove(tag) {
            self.filter.tags.insert(tag.to_string());
        }
    }

    pub fn select_all_tags(&mut self) {
        self.filter.tags.clear();
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Per-node emphasis. Under focus the node, its neighbours and any
    /// active filter match stay normal; without a filter, focus alone decides.
    pub fn emphasis(&self, scene: &SceneGraph) -> IndexMap<String, Emphasis> {
        let focused: Option<BTreeSet<&str>> = self.focus.as_deref().map(|id| {
            let mut set: BTreeSet<&str> = scene.neighbors(id).into_iter().collect();
            set.insert(id);
            set
        });
        scene
            .nodes()
            .map(|node| {
                let visible = match &focused {
                    Some(set) => {
                        set.contains(node.id.as_str())
                            || (self.filter.is_active() && self.filter.matches(node))
                    }
                    None => self.filter.matches(node),
                };
                let emphasis = if visible { Emphasis::Normal } else { Emphasis::Dimmed };
                (node.id.clone(), emphasis)
            })
            .collect()
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    /// Node under a screen point, within `HIT_RADIUS` screen units.
    pub fn hit_test(&self, scene: &SceneGraph, screen: Point) -> Option<String> {
        let world = self.view.to_world(screen);
        scene
            .node_at(world, HIT_RADIUS / self.view.scale)
            .map(str::to_string)
    }

    /// Turn a screen click into a widget event.
    pub fn click_at(&self, scene: &mut SceneGraph, screen: Point) {
        let node = self.hit_test(scene, screen);
        scene.dispatch(GraphEvent::Click {
            node,
            pointer: self.view.to_world(screen),
        });
    }

    /// Drain queued widget events.
    pub fn process_events(&mut self, scene: &mut SceneGraph, registry: &mut ContentRegistry) {
        let pending: Vec<GraphEvent> = self.events.borrow_mut().drain(..).collect();
        for event in pending {
            match event {
                GraphEvent::Click { node: Some(id), .. } => {
                    if self.focus.as_deref() == Some(id.as_str()) {
                        self.focus = None;
                    } else {
                        self.focus = Some(id.clone());
                        self.open_popup(&id, registry);
                    }
                }
                GraphEvent::Click { node: None, .. } => self.focus = None,
                GraphEvent::DragEnd { node, position } => {
                    if self.edit_mode {
                        scene.drag_node(&node, position);
                    }
                }
            }
        }
    }

    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    /// Popups ordered for drawing, lowest first.
    pub fn popups_by_z(&self) -> Vec<&Popup> {
        let mut sorted: Vec<&Popup> = self.popups.iter().collect();
        sorted.sort_by_key(|p| p.z);
        sorted
    }

    fn bump_z(&mut self) -> u64 {
        self.next_z += 1;
        self.next_z
    }

    /// Open a popup for `title`, or raise it if already open. Titles
    /// without backing content are ignored.
    pub fn open_popup(&mut self, title: &str, registry: &mut ContentRegistry) -> bool {
        if !registry.contains(title) {
            return false;
        }
        let z = self.bump_z();
        if let Some(popup) = self.popups.iter_mut().find(|p| p.title == title) {
            popup.z = z;
            return true;
        }
        registry.ensure_loaded(title);
        self.popups.push(Popup {
            title: title.to_string(),
            content: registry.clone_content(title),
            z,
        });
        true
    }

    pub fn close_popup(&mut self, title: &str) {
        self.popups.retain(|p| p.title != title);
    }

    /// Re-clone popups still showing a loading placeholder.
    pub fn refresh_popups(&mut self, registry: &ContentRegistry, loaded: &[String]) {
        for popup in self.popups.iter_mut() {
            if popup.content.is_loading() && loaded.contains(&popup.title) {
                popup.content = registry.clone_content(&popup.title);
            }
        }
    }

    /// The popup header's "open" action.
    pub fn open_in_main(&mut self, title: &str, registry: &ContentRegistry) -> Option<MapAction> {
        let item = registry.item(title)?;
        let action = MapAction::OpenInMain {
            content_type: item.content_type,
            title: title.to_string(),
        };
        self.close_popup(title);
        Some(action)
    }

    pub fn show_labels(&self) -> bool {
        self.show_labels
    }

    pub fn toggle_labels(&mut self) {
        self.show_labels = !self.show_labels;
    }

    pub fn toggle_physics(&mut self, scene: &mut SceneGraph) {
        scene.set_physics(!scene.physics_enabled());
        scene.redraw();
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Enter or leave edit mode. Leaving re-fixes the nodes and returns
    /// (and logs) the position report.
    pub fn set_edit_mode(&mut self, scene: &mut SceneGraph, on: bool) -> Option<String> {
        if self.edit_mode == on {
            return None;
        }
        self.edit_mode = on;
        scene.set_all_fixed(!on);
        scene.redraw();
        if on {
            return None;
        }
        let report = position_report(scene);
        log::info!("Node positions:\n{}", report);
        Some(report)
    }
}

/// `Title,X,Y` lines for every node, rounded to whole units.
pub fn position_report(scene: &SceneGraph) -> String {
    let mut out = String::from("Title,X,Y\n");
    for node in scene.nodes() {
        let title = if node.id.contains([',', '"']) {
            format!("\"{}\"", node.id.replace('"', "\"\""))
        } else {
            node.id.clone()
        };
        out.push_str(&format!(
            "{},{},{}\n",
            title,
            node.position.x.round(),
            node.position.y.round()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::annotate::{ReferenceAnnotator, TooltipTable};
    use crate::content::render::{ContentRenderer, RenderedBody};
    use crate::content::ContentItem;
    use crate::map::graph::tests::node;
    use crate::map::{Branch, MapEdge};
    use crate::net::sheet::fake::FakeSource;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn scene() -> SceneGraph {
        let mut g = SceneGraph::new();
        g.add_node(node("Sophia", Branch::Wisdom, Point::new(0.0, 0.0))).unwrap();
        g.add_node(node("Logos", Branch::Reason, Point::new(-100.0, -200.0))).unwrap();
        g.add_node(node("Physis", Branch::Reality, Point::new(100.0, -200.0))).unwrap();
        g.add_node(node("Kosmos", Branch::Reality, Point::new(150.0, -250.0))).unwrap();
        g.add_edge(MapEdge {
            from: "Sophia".into(),
            to: "Physis".into(),
        })
        .unwrap();
        g
    }

    fn registry() -> ContentRegistry {
        let source = FakeSource::new().with_sheet("https://s.test/physis.csv", "D:Text\nNature\n");
        let renderer = ContentRenderer::new(Arc::new(ReferenceAnnotator::new(TooltipTable::new())));
        let mut reg = ContentRegistry::new(Arc::new(source), renderer);
        reg.register(ContentItem {
            title: "Physis".into(),
            link: "https://s.test/physis.csv".into(),
            content_type: ContentType::Article,
            tag: Some("Reality".into()),
            parent_title: Some("Sophia".into()),
            explicit_position: None,
        });
        reg
    }

    fn dimmed(layer: &MapInteractionLayer, scene: &SceneGraph) -> Vec<String> {
        layer
            .emphasis(scene)
            .into_iter()
            .filter(|(_, e)| *e == Emphasis::Dimmed)
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn filter_then_focus_then_restore() {
        let mut scene = scene();
        let mut reg = registry();
        let mut layer = MapInteractionLayer::new();
        layer.attach(&mut scene);

        layer.toggle_tag("Reason");
        assert_eq!(dimmed(&layer, &scene), vec!["Sophia", "Physis", "Kosmos"]);

        scene.dispatch(GraphEvent::Click {
            node: Some("Physis".into()),
            pointer: Point::new(100.0, -200.0),
        });
        layer.process_events(&mut scene, &mut reg);
        assert_eq!(layer.focus(), Some("Physis"));
        // Logos matches the Reason filter and stays lit under focus
        assert_eq!(dimmed(&layer, &scene), vec!["Kosmos"]);
        assert_eq!(layer.emphasis(&scene)["Logos"], Emphasis::Normal);

        scene.dispatch(GraphEvent::Click {
            node: Some("Physis".into()),
            pointer: Point::new(100.0, -200.0),
        });
        layer.process_events(&mut scene, &mut reg);
        assert_eq!(dimmed(&layer, &scene), vec!["Sophia", "Physis", "Kosmos"]);
        assert_eq!(scene.len(), 4, "filtering never removes nodes");
        reg.wait_idle();
    }

    #[test]
    fn focus_without_filter_dims_the_rest() {
        let mut scene = scene();
        let mut reg = registry();
        let mut layer = MapInteractionLayer::new();
        layer.attach(&mut scene);
        assert!(!layer.filter().is_active());

        layer.click_at(&mut scene, Point::new(100.0, -200.0));
        layer.process_events(&mut scene, &mut reg);
        assert_eq!(layer.focus(), Some("Physis"));
        assert_eq!(dimmed(&layer, &scene), vec!["Logos", "Kosmos"]);
        reg.wait_idle();
    }

    #[test]
    fn search_is_case_insensitive() {
        let scene = scene();
        let mut layer = MapInteractionLayer::new();
        layer.set_search("LOG");
        assert_eq!(dimmed(&layer, &scene), vec!["Sophia", "Physis", "Kosmos"]);
        layer.set_search("");
        layer.select_all_tags();
        assert!(dimmed(&layer, &scene).is_empty());
    }

    #[test]
    fn popups_stack_and_refocus() {
        let mut reg = registry();
        let mut layer = MapInteractionLayer::new();
        assert!(layer.open_popup("Physis", &mut reg));
        assert!(!layer.open_popup("Kosmos", &mut reg), "no backing content");
        assert!(layer.open_popup("Physis", &mut reg));
        assert_eq!(layer.popups().len(), 1);
        assert_eq!(layer.popups()[0].z, 2);

        let done = reg.wait_idle();
        layer.refresh_popups(&reg, &done);
        assert!(matches!(layer.popups()[0].content.body, RenderedBody::Rows(_)));

        let action = layer.open_in_main("Physis", &reg);
        assert_eq!(
            action,
            Some(MapAction::OpenInMain {
                content_type: ContentType::Article,
                title: "Physis".into()
            })
        );
        assert!(layer.popups().is_empty());
    }

    #[test]
    fn empty_canvas_click_clears_focus() {
        let mut scene = scene();
        let mut reg = registry();
        let mut layer = MapInteractionLayer::new();
        layer.attach(&mut scene);
        layer.click_at(&mut scene, Point::new(-100.0, -195.0));
        layer.process_events(&mut scene, &mut reg);
        assert_eq!(layer.focus(), Some("Logos"));

        layer.click_at(&mut scene, Point::new(500.0, 500.0));
        layer.process_events(&mut scene, &mut reg);
        assert_eq!(layer.focus(), None);
    }

    #[test]
    fn zoom_is_clamped_and_hit_radius_scales() {
        let scene = scene();
        let mut layer = MapInteractionLayer::new();
        layer.view_mut().zoom_at(Point::default(), 100.0);
        assert_eq!(layer.view().scale, MAX_SCALE);
        // 20 screen units at 4x is 5 world units
        assert_eq!(layer.hit_test(&scene, Point::new(0.0, 24.0)), None);
        assert_eq!(layer.hit_test(&scene, Point::new(0.0, 16.0)).as_deref(), Some("Sophia"));

        layer.view_mut().zoom_at(Point::new(10.0, 10.0), 0.001);
        assert_eq!(layer.view().scale, MIN_SCALE);
    }

    #[test]
    fn zoom_keeps_pivot_fixed() {
        let mut view = ViewTransform::default();
        view.pan(Point::new(30.0, 40.0));
        let pivot = Point::new(200.0, 100.0);
        let before = view.to_world(pivot);
        view.zoom_at(pivot, 2.0);
        let after = view.to_world(pivot);
        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn edit_mode_unfixes_and_reports() {
        let mut scene = scene();
        let mut reg = registry();
        let mut layer = MapInteractionLayer::new();
        layer.attach(&mut scene);

        assert_eq!(layer.set_edit_mode(&mut scene, true), None);
        assert!(scene.nodes().all(|n| !n.fixed));
        scene.dispatch(GraphEvent::DragEnd {
            node: "Logos".into(),
            position: Point::new(-90.4, -210.6),
        });
        layer.process_events(&mut scene, &mut reg);

        let report = layer.set_edit_mode(&mut scene, false).unwrap();
        assert!(scene.nodes().all(|n| n.fixed));
        assert_eq!(report.lines().next(), Some("Title,X,Y"));
        assert!(report.contains("Logos,-90,-211\n"));
    }
}
