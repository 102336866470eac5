//! Graph widget capability and its in-memory scene.
//!
//! Layout, shape and interaction code only talk to `GraphWidget`. The app
//! draws a `SceneGraph` on an egui canvas; tests inspect it directly.

use indexmap::IndexMap;
use thiserror::Error;

use super::{Bounds, Branch, MapEdge, MapNode, Point};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node '{0}' already exists")]
    DuplicateNode(String),
    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEventKind {
    Click,
    DragEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// Click on a node, or on empty canvas when `node` is `None`
    Click { node: Option<String>, pointer: Point },
    DragEnd { node: String, position: Point },
}

impl GraphEvent {
    pub fn kind(&self) -> GraphEventKind {
        match self {
            GraphEvent::Click { .. } => GraphEventKind::Click,
            GraphEvent::DragEnd { .. } => GraphEventKind::DragEnd,
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&GraphEvent)>;

/// What the map needs from a graph-drawing widget.
pub trait GraphWidget {
    fn add_node(&mut self, node: MapNode) -> Result<(), GraphError>;
    fn add_edge(&mut self, edge: MapEdge) -> Result<(), GraphError>;
    fn position(&self, id: &str) -> Option<Point>;
    fn on(&mut self, kind: GraphEventKind, handler: EventHandler);
    fn redraw(&mut self);
}

/// In-memory graph: nodes in insertion order, edges, handlers.
#[derive(Default)]
pub struct SceneGraph {
    nodes: IndexMap<String, MapNode>,
    edges: Vec<MapEdge>,
    handlers: Vec<(GraphEventKind, EventHandler)>,
    physics: bool,
    redraws: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MapNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&MapNode> {
        self.nodes.get(id)
    }

    pub fn edges(&self) -> &[MapEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Drop all nodes and edges. Handlers stay registered.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Ids directly connected to `id`, either direction.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.from == id {
                    Some(e.to.as_str())
                } else if e.to == id {
                    Some(e.from.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Move a node. Fixed nodes stay put.
    pub fn drag_node(&mut self, id: &str, position: Point) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if !node.fixed => {
                node.position = position;
                true
            }
            _ => false,
        }
    }

    pub fn set_all_fixed(&mut self, fixed: bool) {
        for node in self.nodes.values_mut() {
            node.fixed = fixed;
        }
    }

    pub fn physics_enabled(&self) -> bool {
        self.physics
    }

    pub fn set_physics(&mut self, enabled: bool) {
        self.physics = enabled;
    }

    /// Nearest node within `radius` of `point`.
    pub fn node_at(&self, point: Point, radius: f64) -> Option<&str> {
        self.nodes
            .values()
            .map(|n| (n, n.position.distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n.id.as_str())
    }

    pub fn branch_bounds(&self, branch: Branch) -> Option<Bounds> {
        Bounds::from_points(
            self.nodes
                .values()
                .filter(|n| n.group == branch)
                .map(|n| n.position),
        )
    }

    /// Hand an event to every handler registered for its kind.
    pub fn dispatch(&mut self, event: GraphEvent) {
        let kind = event.kind();
        for (k, handler) in self.handlers.iter_mut() {
            if *k == kind {
                handler(&event);
            }
        }
    }

    /// One relaxation step for unfixed nodes: edges pull, nodes push apart.
    pub fn step_physics(&mut self) {
        const SPRING_LENGTH: f64 = 80.0;
        const SPRING: f64 = 0.02;
        const REPULSION: f64 = 400.0;

        if !self.physics {
            return;
        }
        let positions: Vec<(String, Point, bool)> = self
            .nodes
            .values()
            .map(|n| (n.id.clone(), n.position, n.fixed))
            .collect();
        let mut forces: IndexMap<&str, Point> = IndexMap::new();

        for (i, (id, p, fixed)) in positions.iter().enumerate() {
            if *fixed {
                continue;
            }
            let mut force = Point::default();
            for (j, (_, q, _)) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }
                let delta = *p - *q;
                let dist = delta.length().max(1.0);
                force = force + delta * (REPULSION / (dist * dist * dist));
            }
            for other in self.neighbors(id) {
                if let Some(q) = self.nodes.get(other).map(|n| n.position) {
                    let delta = q - *p;
                    let dist = delta.length().max(1.0);
                    force = force + delta * (SPRING * (dist - SPRING_LENGTH) / dist);
                }
            }
            forces.insert(id.as_str(), force);
        }

        let moves: Vec<(String, Point)> = forces
            .into_iter()
            .map(|(id, f)| (id.to_string(), f))
            .collect();
        for (id, force) in moves {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.position = node.position + force;
            }
        }
    }
}

impl GraphWidget for SceneGraph {
    fn add_node(&mut self, node: MapNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn add_edge(&mut self, edge: MapEdge) -> Result<(), GraphError> {
        for end in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(end) {
                return Err(GraphError::UnknownNode(end.clone()));
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    fn position(&self, id: &str) -> Option<Point> {
        self.nodes.get(id).map(|n| n.position)
    }

    fn on(&mut self, kind: GraphEventKind, handler: EventHandler) {
        self.handlers.push((kind, handler));
    }

    fn redraw(&mut self) {
        self.redraws += 1;
    }
}
