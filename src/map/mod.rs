//! The wisdom map: content items as a node graph over the phi glyph.

pub mod graph;
pub mod interaction;
pub mod layout;
pub mod shape;

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::Deserialize;

use crate::content::ContentType;

/// World-space point (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (other - self).length()
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        self + (other - self) * t
    }

    pub fn midpoint(self, other: Point) -> Point {
        self.lerp(other, 0.5)
    }

    /// Unit normal (rotated 90° counter-clockwise), or zero for a zero vector.
    pub fn normal(self) -> Point {
        let len = self.length();
        if len == 0.0 {
            return Point::default();
        }
        Point::new(-self.y / len, self.x / len)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned bounds of a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds { min: first, max: first };
        for p in iter {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(self.max)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Thematic branch a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Branch {
    Root,
    Wisdom,
    Reality,
    Reason,
    Right,
    Musings,
    Other,
}

impl Branch {
    pub const ALL: [Branch; 7] = [
        Branch::Root,
        Branch::Wisdom,
        Branch::Reality,
        Branch::Reason,
        Branch::Right,
        Branch::Musings,
        Branch::Other,
    ];

    /// The three leaves of the glyph.
    pub const LEAVES: [Branch; 3] = [Branch::Reality, Branch::Reason, Branch::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Root => "Root",
            Branch::Wisdom => "Wisdom",
            Branch::Reality => "Reality",
            Branch::Reason => "Reason",
            Branch::Right => "Right",
            Branch::Musings => "Musings",
            Branch::Other => "Other",
        }
    }

    /// One of the four thematic tags, matched exactly.
    pub fn from_thematic_tag(tag: &str) -> Option<Branch> {
        match tag {
            "Wisdom" => Some(Branch::Wisdom),
            "Reality" => Some(Branch::Reality),
            "Reason" => Some(Branch::Reason),
            "Right" => Some(Branch::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Dot,
    Square,
    Diamond,
}

impl From<ContentType> for NodeShape {
    fn from(t: ContentType) -> Self {
        match t {
            ContentType::Article => NodeShape::Dot,
            ContentType::Book => NodeShape::Square,
            ContentType::Breakdown => NodeShape::Diamond,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapNode {
    pub id: String,
    pub label: String,
    pub group: Branch,
    pub tag: Option<String>,
    pub shape: NodeShape,
    pub position: Point,
    pub fixed: bool,
    pub parent_title: Option<String>,
    pub content_type: ContentType,
}

/// Directed parent → child edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEdge {
    pub from: String,
    pub to: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_math() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(a.lerp(b, 0.5), Point::new(1.5, 2.0));
        assert_eq!(Point::new(2.0, 0.0).normal(), Point::new(-0.0, 1.0));
        assert_eq!(Point::default().normal(), Point::default());
    }

    #[test]
    fn bounds_center() {
        let b = Bounds::from_points([Point::new(-10.0, 0.0), Point::new(10.0, 20.0), Point::new(0.0, 5.0)]).unwrap();
        assert_eq!(b.center(), Point::new(0.0, 10.0));
        assert_eq!((b.width(), b.height()), (20.0, 20.0));
        assert!(Bounds::from_points(Vec::new()).is_none());
    }
}
