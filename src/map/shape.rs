//! The phi glyph behind the map.
//!
//! Shape-sheet parts become variable-width ribbons. Without shape data a
//! stem, a loop and three leaves sized from the placed nodes are drawn
//! instead.

use indexmap::IndexMap;

use super::graph::SceneGraph;
use super::layout::PhiGeometry;
use super::{Bounds, Branch, Point};
use crate::net::sheet::{cell, Row};

/// Name of the part Wisdom nodes are spread along.
pub const SEED_PART: &str = "seed";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapePoint {
    pub order: f64,
    pub position: Point,
    pub width: Option<f64>,
}

/// One named centerline, sorted by `order`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePart {
    pub name: String,
    pub points: Vec<ShapePoint>,
}

impl ShapePart {
    pub fn centerline(&self) -> Vec<Point> {
        self.points.iter().map(|p| p.position).collect()
    }
}

pub type ShapeParts = IndexMap<String, ShapePart>;

fn number(row: &Row, column: &str) -> Option<f64> {
    cell(row, column)?.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Group shape-sheet rows (`Part`, `Order`, `X`, `Y`, `Width`) by part.
/// Rows missing a part name or coordinates are skipped.
pub fn parse_shape_rows(rows: &[Row]) -> ShapeParts {
    let mut parts = ShapeParts::new();
    for (i, row) in rows.iter().enumerate() {
        let (Some(name), Some(x), Some(y)) = (cell(row, "Part"), number(row, "X"), number(row, "Y")) else {
            log::debug!("Shape row {} skipped", i + 1);
            continue;
        };
        let point = ShapePoint {
            order: number(row, "Order").unwrap_or(i as f64),
            position: Point::new(x, y),
            width: number(row, "Width").filter(|w| *w > 0.0),
        };
        parts
            .entry(name.to_string())
            .or_insert_with(|| ShapePart {
                name: name.to_string(),
                points: Vec::new(),
            })
            .points
            .push(point);
    }
    for part in parts.values_mut() {
        part.points.sort_by(|a, b| a.order.total_cmp(&b.order));
    }
    parts
}

/// Outline step, in canvas terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, to: Point },
    Close,
}

/// Flatten an outline into a polyline, `steps` segments per curve.
pub fn flatten_path(commands: &[PathCommand], steps: usize) -> Vec<Point> {
    let mut points: Vec<Point> = Vec::new();
    let mut cursor = Point::default();
    for cmd in commands {
        match *cmd {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => {
                points.push(p);
                cursor = p;
            }
            PathCommand::QuadTo { control, to } => {
                for s in 1..=steps.max(1) {
                    let t = s as f64 / steps.max(1) as f64;
                    points.push(quadratic(cursor, control, to, t));
                }
                cursor = to;
            }
            PathCommand::Close => {}
        }
    }
    points
}

fn quadratic(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
    let u = 1.0 - t;
    p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ribbon {
    pub part: String,
    pub left: Vec<Point>,
    pub right: Vec<Point>,
    pub outline: Vec<PathCommand>,
}

/// Offset a part's centerline by half its local width on each side.
/// Parts with fewer than two points have no ribbon.
pub fn build_ribbon(part: &ShapePart, default_width: f64) -> Option<Ribbon> {
    let n = part.points.len();
    if n < 2 {
        return None;
    }
    let centre = part.centerline();
    let chord = centre[n - 1] - centre[0];

    let mut left = Vec::with_capacity(n);
    let mut right = Vec::with_capacity(n);
    for (i, point) in part.points.iter().enumerate() {
        let direction = if i == 0 || i == n - 1 {
            chord
        } else {
            centre[i + 1] - centre[i - 1]
        };
        let offset = direction.normal() * (point.width.unwrap_or(default_width) / 2.0);
        left.push(point.position + offset);
        right.push(point.position - offset);
    }

    let mut outline = vec![PathCommand::MoveTo(left[0])];
    for i in 1..n - 1 {
        outline.push(PathCommand::QuadTo {
            control: left[i],
            to: left[i].midpoint(left[i + 1]),
        });
    }
    outline.push(PathCommand::LineTo(left[n - 1]));
    outline.push(PathCommand::LineTo(right[n - 1]));
    for i in (1..n - 1).rev() {
        outline.push(PathCommand::QuadTo {
            control: right[i],
            to: right[i].midpoint(right[i - 1]),
        });
    }
    outline.push(PathCommand::LineTo(right[0]));
    outline.push(PathCommand::Close);

    Some(Ribbon {
        part: part.name.clone(),
        left,
        right,
        outline,
    })
}

/// A leaf of the fallback glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub branch: Branch,
    pub from: Point,
    pub control: Point,
    pub to: Point,
    /// Stroke width, grown with the branch's node spread
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackGlyph {
    pub stem: (Point, Point),
    pub loop_center: Point,
    pub loop_radius: f64,
    pub leaves: Vec<Leaf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeScene {
    Ribbons(Vec<Ribbon>),
    Fallback(FallbackGlyph),
}

/// Builds the background for a laid-out scene.
#[derive(Debug, Clone)]
pub struct MapShapeRenderer {
    geometry: PhiGeometry,
}

impl MapShapeRenderer {
    pub fn new(geometry: PhiGeometry) -> Self {
        Self { geometry }
    }

    pub fn render(&self, parts: &ShapeParts, scene: &SceneGraph) -> ShapeScene {
        let ribbons: Vec<Ribbon> = parts
            .values()
            .filter_map(|part| {
                let ribbon = build_ribbon(part, self.geometry.default_ribbon_width);
                if ribbon.is_none() {
                    log::debug!("Shape part '{}' has too few points", part.name);
                }
                ribbon
            })
            .collect();
        if ribbons.is_empty() {
            ShapeScene::Fallback(self.fallback(scene))
        } else {
            ShapeScene::Ribbons(ribbons)
        }
    }

    /// Stem, loop, and a leaf towards each branch's node cluster.
    pub fn fallback(&self, scene: &SceneGraph) -> FallbackGlyph {
        let g = &self.geometry;
        let leaves = Branch::LEAVES
            .iter()
            .map(|&branch| {
                let curve = g.leaf(branch);
                let (to, size) = match scene.branch_bounds(branch) {
                    Some(bounds) => (
                        bounds.center(),
                        bounds.width().max(bounds.height()) + 2.0 * g.leaf_padding,
                    ),
                    None => (curve.tip, 2.0 * g.leaf_padding),
                };
                Leaf {
                    branch,
                    from: g.branch_point,
                    control: curve.control,
                    to,
                    size,
                }
            })
            .collect();
        FallbackGlyph {
            stem: (g.stem_base, g.branch_point),
            loop_center: g.loop_center,
            loop_radius: g.loop_radius,
            leaves,
        }
    }
}

/// Bounds of every ribbon, for fitting the view.
pub fn scene_bounds(scene: &ShapeScene) -> Option<Bounds> {
    match scene {
        ShapeScene::Ribbons(ribbons) => Bounds::from_points(
            ribbons
                .iter()
                .flat_map(|r| r.left.iter().chain(r.right.iter()).copied()),
        ),
        ShapeScene::Fallback(glyph) => Bounds::from_points(
            [glyph.stem.0, glyph.stem.1]
                .into_iter()
                .chain(glyph.leaves.iter().map(|l| l.to)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::graph::tests::node;
    use crate::map::graph::GraphWidget;
    use crate::net::sheet::parse_csv;
    use pretty_assertions::assert_eq;

    fn part(points: &[(f64, f64, Option<f64>)]) -> ShapePart {
        ShapePart {
            name: "stem".into(),
            points: points
                .iter()
                .enumerate()
                .map(|(i, &(x, y, width))| ShapePoint {
                    order: i as f64,
                    position: Point::new(x, y),
                    width,
                })
                .collect(),
        }
    }

    #[test]
    fn rows_group_and_sort() {
        let rows = parse_csv(
            "Part,Order,X,Y,Width\n\
             seed,2,10,0,\n\
             seed,1,0,0,4\n\
             stem,1,0,0,\n\
             ,1,5,5,\n\
             seed,3,10,abc,\n",
        )
        .unwrap();
        let parts = parse_shape_rows(&rows);
        assert_eq!(parts.len(), 2);
        let seed = &parts[SEED_PART];
        assert_eq!(seed.centerline(), vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(seed.points[0].width, Some(4.0));
    }

    #[test]
    fn straight_ribbon_offsets_by_half_width() {
        let ribbon = build_ribbon(&part(&[(0.0, 0.0, Some(4.0)), (10.0, 0.0, None)]), 2.0).unwrap();
        assert_eq!(ribbon.left, vec![Point::new(0.0, 2.0), Point::new(10.0, 1.0)]);
        assert_eq!(ribbon.right, vec![Point::new(0.0, -2.0), Point::new(10.0, -1.0)]);
        assert_eq!(ribbon.outline.first(), Some(&PathCommand::MoveTo(Point::new(0.0, 2.0))));
        assert_eq!(ribbon.outline.last(), Some(&PathCommand::Close));
    }

    #[test]
    fn interior_points_are_smoothed() {
        let ribbon = build_ribbon(
            &part(&[(0.0, 0.0, None), (10.0, 0.0, None), (20.0, 0.0, None), (30.0, 0.0, None)]),
            2.0,
        )
        .unwrap();
        let curves = ribbon
            .outline
            .iter()
            .filter(|c| matches!(c, PathCommand::QuadTo { .. }))
            .count();
        assert_eq!(curves, 4);
        let flat = flatten_path(&ribbon.outline, 4);
        assert!(flat.iter().all(|p| p.y.abs() <= 1.0 + 1e-9));
    }

    #[test]
    fn short_parts_fall_back() {
        assert!(build_ribbon(&part(&[(0.0, 0.0, None)]), 2.0).is_none());

        let mut parts = ShapeParts::new();
        parts.insert("dot".into(), part(&[(1.0, 1.0, None)]));
        let mut scene = SceneGraph::new();
        scene.add_node(node("Logos", Branch::Reason, Point::new(-100.0, -200.0))).unwrap();
        scene.add_node(node("Nous", Branch::Reason, Point::new(-140.0, -240.0))).unwrap();

        let renderer = MapShapeRenderer::new(PhiGeometry::default());
        match renderer.render(&parts, &scene) {
            ShapeScene::Fallback(glyph) => {
                let reason = glyph.leaves.iter().find(|l| l.branch == Branch::Reason).unwrap();
                assert_eq!(reason.to, Point::new(-120.0, -220.0));
                let padding = PhiGeometry::default().leaf_padding;
                assert_eq!(reason.size, 40.0 + 2.0 * padding);
                assert_eq!(glyph.leaves.len(), 3);
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }
}
