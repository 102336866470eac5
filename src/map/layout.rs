//! Node classification and placement.
//!
//! Placement priority per node: override table, then the row's own X/Y,
//! then the branch's computed position. The result depends only on the
//! item list, the shape parts and the geometry, so equal inputs always lay
//! out identically.

use indexmap::IndexMap;
use serde::Deserialize;

use super::graph::{GraphError, GraphWidget};
use super::shape::{ShapeParts, SEED_PART};
use super::{Branch, MapEdge, MapNode, NodeShape, Point};
use crate::content::ContentItem;

pub const ROOT_SENTINEL: &str = "Root";
pub const MUSING_SENTINEL: &str = "Musing";
pub const MUSINGS_TAG: &str = "Musings";

/// Control and tip of a leaf curve starting at the branch point.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LeafCurve {
    pub control: Point,
    pub tip: Point,
}

/// Constants of the phi glyph, in world units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhiGeometry {
    pub stem_base: Point,
    pub branch_point: Point,
    pub loop_center: Point,
    pub loop_radius: f64,
    pub root_spacing: f64,
    pub reality: LeafCurve,
    pub reason: LeafCurve,
    pub right: LeafCurve,
    pub musings_origin: Point,
    pub musings_spacing: Point,
    pub other_origin: Point,
    pub other_spacing: Point,
    pub leaf_padding: f64,
    pub default_ribbon_width: f64,
}

impl Default for PhiGeometry {
    fn default() -> Self {
        Self {
            stem_base: Point::new(0.0, 220.0),
            branch_point: Point::new(0.0, -100.0),
            loop_center: Point::new(0.0, 40.0),
            loop_radius: 110.0,
            root_spacing: 120.0,
            reality: LeafCurve {
                control: Point::new(140.0, -180.0),
                tip: Point::new(200.0, -280.0),
            },
            reason: LeafCurve {
                control: Point::new(-140.0, -180.0),
                tip: Point::new(-200.0, -280.0),
            },
            right: LeafCurve {
                control: Point::new(30.0, -220.0),
                tip: Point::new(0.0, -360.0),
            },
            musings_origin: Point::new(-520.0, -200.0),
            musings_spacing: Point::new(110.0, 70.0),
            other_origin: Point::new(-60.0, 260.0),
            other_spacing: Point::new(120.0, 60.0),
            leaf_padding: 30.0,
            default_ribbon_width: 12.0,
        }
    }
}

impl PhiGeometry {
    /// Leaf curve of a leaf branch; other branches get the Right leaf.
    pub fn leaf(&self, branch: Branch) -> LeafCurve {
        match branch {
            Branch::Reality => self.reality,
            Branch::Reason => self.reason,
            _ => self.right,
        }
    }
}

/// Branch for an item, first match wins.
pub fn classify(item: &ContentItem) -> Branch {
    let parent = item.parent_title.as_deref();
    let tag = item.tag.as_deref();
    if parent == Some(ROOT_SENTINEL) {
        return Branch::Root;
    }
    if parent == Some(MUSING_SENTINEL) || tag == Some(MUSINGS_TAG) {
        return Branch::Musings;
    }
    tag.and_then(Branch::from_thematic_tag).unwrap_or(Branch::Other)
}

pub fn quadratic_bezier(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
    let u = 1.0 - t;
    p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t)
}

/// Running distance from the first point to each point.
pub fn cumulative_lengths(points: &[Point]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += points[i - 1].distance(*p);
        }
        out.push(total);
    }
    out
}

/// Point at `fraction` of the polyline's arc length.
pub fn point_at_fraction(points: &[Point], fraction: f64) -> Option<Point> {
    let first = *points.first()?;
    let cumulative = cumulative_lengths(points);
    let total = cumulative.last().copied().unwrap_or(0.0);
    if total == 0.0 {
        return Some(first);
    }
    let target = fraction.clamp(0.0, 1.0) * total;
    for i in 1..points.len() {
        if cumulative[i] >= target {
            let span = cumulative[i] - cumulative[i - 1];
            if span == 0.0 {
                return Some(points[i]);
            }
            let t = (target - cumulative[i - 1]) / span;
            return Some(points[i - 1].lerp(points[i], t));
        }
    }
    points.last().copied()
}

/// Nodes and edges ready for a graph widget.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapLayout {
    pub nodes: Vec<MapNode>,
    pub edges: Vec<MapEdge>,
}

#[derive(Debug, Clone)]
pub struct MapLayoutEngine {
    geometry: PhiGeometry,
    overrides: IndexMap<String, Point>,
}

impl MapLayoutEngine {
    pub fn new(geometry: PhiGeometry, overrides: IndexMap<String, Point>) -> Self {
        Self { geometry, overrides }
    }

    pub fn geometry(&self) -> &PhiGeometry {
        &self.geometry
    }

    /// Place every item and collect parent → child edges.
    pub fn layout(&self, items: &[ContentItem], shapes: &ShapeParts) -> MapLayout {
        let mut buckets: IndexMap<Branch, Vec<&ContentItem>> = IndexMap::new();
        let mut seen = std::collections::HashSet::new();
        for item in items {
            if !seen.insert(item.title.as_str()) {
                log::warn!("Map: duplicate node '{}' ignored", item.title);
                continue;
            }
            buckets.entry(classify(item)).or_default().push(item);
        }

        let seed: Vec<Point> = shapes
            .get(SEED_PART)
            .map(|p| p.centerline())
            .unwrap_or_default();

        let mut nodes = Vec::with_capacity(items.len());
        for branch in Branch::ALL {
            let Some(members) = buckets.get(&branch) else {
                continue;
            };
            let count = members.len();
            for (rank, item) in members.iter().enumerate() {
                let position = self
                    .overrides
                    .get(&item.title)
                    .copied()
                    .or(item.explicit_position)
                    .unwrap_or_else(|| self.computed(branch, rank, count, &seed));
                nodes.push(MapNode {
                    id: item.title.clone(),
                    label: item.title.clone(),
                    group: branch,
                    tag: item.tag.clone(),
                    shape: NodeShape::from(item.content_type),
                    position,
                    fixed: true,
                    parent_title: item.parent_title.clone(),
                    content_type: item.content_type,
                });
            }
        }

        let edges = nodes
            .iter()
            .filter_map(|node| {
                let parent = node.parent_title.as_deref()?.trim();
                if parent.is_empty()
                    || parent == ROOT_SENTINEL
                    || parent == MUSING_SENTINEL
                    || parent == node.id
                {
                    return None;
                }
                Some(MapEdge {
                    from: parent.to_string(),
                    to: node.id.clone(),
                })
            })
            .collect();

        MapLayout { nodes, edges }
    }

    fn computed(&self, branch: Branch, rank: usize, count: usize, seed: &[Point]) -> Point {
        let g = &self.geometry;
        match branch {
            Branch::Root => {
                let offset = rank as f64 - (count as f64 - 1.0) / 2.0;
                Point::new(g.loop_center.x + g.root_spacing * offset, g.loop_center.y)
            }
            Branch::Wisdom => {
                let fraction = if count > 1 {
                    rank as f64 / (count - 1) as f64
                } else {
                    0.0
                };
                point_at_fraction(seed, fraction).unwrap_or(g.loop_center)
            }
            Branch::Reality | Branch::Reason | Branch::Right => {
                let curve = g.leaf(branch);
                let t = (rank + 1) as f64 / (count + 1) as f64;
                quadratic_bezier(g.branch_point, curve.control, curve.tip, t)
            }
            Branch::Musings => grid(g.musings_origin, g.musings_spacing, 3, rank),
            Branch::Other => grid(g.other_origin, g.other_spacing, 2, rank),
        }
    }

    /// Lay out and push into a widget. Edges to parents that are not on the
    /// map are skipped. Returns the number of nodes added.
    pub fn build(
        &self,
        items: &[ContentItem],
        shapes: &ShapeParts,
        widget: &mut dyn GraphWidget,
    ) -> usize {
        let layout = self.layout(items, shapes);
        let mut added = 0;
        for node in layout.nodes {
            match widget.add_node(node) {
                Ok(()) => added += 1,
                Err(e) => log::warn!("Map: {}", e),
            }
        }
        for edge in layout.edges {
            if let Err(e) = widget.add_edge(edge) {
                match e {
                    GraphError::UnknownNode(_) => log::warn!("Map: edge skipped, {}", e),
                    GraphError::DuplicateNode(_) => log::warn!("Map: {}", e),
                }
            }
        }
        widget.redraw();
        log::info!("Map built with {} nodes", added);
        added
    }
}

fn grid(origin: Point, spacing: Point, columns: usize, rank: usize) -> Point {
    let col = (rank % columns) as f64;
    let row = (rank / columns) as f64;
    Point::new(origin.x + col * spacing.x, origin.y + row * spacing.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentType;
    use crate::map::graph::SceneGraph;
    use crate::map::shape::{ShapePart, ShapePoint};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn item(title: &str, tag: Option<&str>, parent: Option<&str>) -> ContentItem {
        ContentItem {
            title: title.to_string(),
            link: String::new(),
            content_type: ContentType::Article,
            tag: tag.map(str::to_string),
            parent_title: parent.map(str::to_string),
            explicit_position: None,
        }
    }

    fn seed(points: &[(f64, f64)]) -> ShapeParts {
        let mut parts = ShapeParts::new();
        parts.insert(
            SEED_PART.to_string(),
            ShapePart {
                name: SEED_PART.to_string(),
                points: points
                    .iter()
                    .enumerate()
                    .map(|(i, &(x, y))| ShapePoint {
                        order: i as f64,
                        position: Point::new(x, y),
                        width: None,
                    })
                    .collect(),
            },
        );
        parts
    }

    fn engine() -> MapLayoutEngine {
        MapLayoutEngine::new(PhiGeometry::default(), IndexMap::new())
    }

    fn position(layout: &MapLayout, id: &str) -> Point {
        layout.nodes.iter().find(|n| n.id == id).map(|n| n.position).unwrap()
    }

    #[test]
    fn classification_order() {
        assert_eq!(classify(&item("a", Some("Reason"), Some("Root"))), Branch::Root);
        assert_eq!(classify(&item("b", Some("Reason"), Some("Musing"))), Branch::Musings);
        assert_eq!(classify(&item("c", Some("Musings"), None)), Branch::Musings);
        assert_eq!(classify(&item("d", Some("Reality"), Some("x"))), Branch::Reality);
        assert_eq!(classify(&item("e", Some("reason"), None)), Branch::Other);
        assert_eq!(classify(&item("f", None, None)), Branch::Other);
    }

    #[test]
    fn arc_length_resampling() {
        let path = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert_eq!(point_at_fraction(&path, 0.0), Some(Point::new(0.0, 0.0)));
        assert_eq!(point_at_fraction(&path, 0.25), Some(Point::new(5.0, 0.0)));
        assert_eq!(point_at_fraction(&path, 0.5), Some(Point::new(10.0, 0.0)));
        assert_eq!(point_at_fraction(&path, 0.75), Some(Point::new(10.0, 5.0)));
        assert_eq!(point_at_fraction(&path, 1.0), Some(Point::new(10.0, 10.0)));
    }

    #[test]
    fn wisdom_nodes_follow_the_seed() {
        let items: Vec<ContentItem> = ["Sophia", "Phronesis", "Nous"]
            .iter()
            .map(|t| item(t, Some("Wisdom"), None))
            .collect();
        let layout = engine().layout(&items, &seed(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]));
        assert_eq!(position(&layout, "Sophia"), Point::new(0.0, 0.0));
        assert_eq!(position(&layout, "Phronesis"), Point::new(10.0, 0.0));
        assert_eq!(position(&layout, "Nous"), Point::new(10.0, 10.0));

        let single = engine().layout(&items[..1], &seed(&[(3.0, 4.0), (9.0, 9.0)]));
        assert_eq!(position(&single, "Sophia"), Point::new(3.0, 4.0));

        let no_seed = engine().layout(&items, &ShapeParts::new());
        assert!(no_seed.nodes.iter().all(|n| n.position == PhiGeometry::default().loop_center));
    }

    #[test]
    fn bezier_midpoint() {
        let mid = quadratic_bezier(
            Point::new(0.0, -100.0),
            Point::new(140.0, -180.0),
            Point::new(200.0, -280.0),
            0.5,
        );
        assert_eq!(mid, Point::new(120.0, -185.0));

        let layout = engine().layout(&[item("Physis", Some("Reality"), None)], &ShapeParts::new());
        assert_eq!(position(&layout, "Physis"), Point::new(120.0, -185.0));
    }

    #[test]
    fn root_nodes_are_centred() {
        let items = vec![
            item("A", None, Some("Root")),
            item("B", None, Some("Root")),
            item("C", None, Some("Root")),
        ];
        let layout = engine().layout(&items, &ShapeParts::new());
        let xs: Vec<f64> = ["A", "B", "C"].iter().map(|t| position(&layout, t).x).collect();
        assert_eq!(xs, vec![-120.0, 0.0, 120.0]);
        assert!(layout.edges.is_empty());
    }

    #[test]
    fn placement_priority() {
        let mut overrides = IndexMap::new();
        overrides.insert("Logos".to_string(), Point::new(1.0, 1.0));
        let engine = MapLayoutEngine::new(PhiGeometry::default(), overrides);

        let mut logos = item("Logos", Some("Reason"), None);
        logos.explicit_position = Some(Point::new(9.0, 9.0));
        let mut ethos = item("Ethos", Some("Reason"), None);
        ethos.explicit_position = Some(Point::new(5.0, 6.0));

        let layout = engine.layout(&[logos, ethos], &ShapeParts::new());
        assert_eq!(position(&layout, "Logos"), Point::new(1.0, 1.0));
        assert_eq!(position(&layout, "Ethos"), Point::new(5.0, 6.0));
    }

    #[test]
    fn edges_skip_sentinels_and_dangling_parents() {
        let items = vec![
            item("Wisdom", Some("Wisdom"), Some("Root")),
            item("Reason", Some("Reason"), Some("Wisdom")),
            item("Self", Some("Reason"), Some("Self")),
            item("Idle", Some("Musings"), Some("Musing")),
            item("Orphan", Some("Reason"), Some("Nowhere")),
        ];
        let layout = engine().layout(&items, &ShapeParts::new());
        assert_eq!(layout.edges.len(), 2);

        let mut scene = SceneGraph::new();
        let added = engine().build(&items, &ShapeParts::new(), &mut scene);
        assert_eq!(added, 5);
        assert_eq!(
            scene.edges(),
            &[MapEdge {
                from: "Wisdom".into(),
                to: "Reason".into()
            }]
        );
        assert_eq!(scene.redraw_count(), 1);
    }

    #[test]
    fn grids_wrap() {
        let items: Vec<ContentItem> = (0..4).map(|i| item(&format!("M{}", i), Some("Musings"), None)).collect();
        let layout = engine().layout(&items, &ShapeParts::new());
        assert_eq!(position(&layout, "M3"), Point::new(-520.0, -130.0));
    }

    proptest! {
        #[test]
        fn layout_is_deterministic(specs in proptest::collection::vec((0usize..7, 0usize..5), 0..30)) {
            let tags = ["Wisdom", "Reality", "Reason", "Right", "Musings", "", "Other"];
            let items: Vec<ContentItem> = specs
                .iter()
                .enumerate()
                .map(|(i, &(t, p))| {
                    let parent = if p == 0 { Some("Root".to_string()) } else if p == 1 { Some(format!("n{}", i / 2)) } else { None };
                    ContentItem {
                        title: format!("n{}", i),
                        link: String::new(),
                        content_type: ContentType::Book,
                        tag: Some(tags[t].to_string()).filter(|s| !s.is_empty()),
                        parent_title: parent,
                        explicit_position: None,
                    }
                })
                .collect();
            let shapes = seed(&[(0.0, 0.0), (30.0, 40.0), (-20.0, 80.0)]);
            let a = engine().layout(&items, &shapes);
            let b = engine().layout(&items, &shapes);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.nodes.iter().all(|n| n.position.is_finite()));
            prop_assert_eq!(a.nodes.len(), items.len());
        }
    }
}
