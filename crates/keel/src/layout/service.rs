//! Contract of the external layout algorithm service.
//!
//! The service receives the whole node tree with sizes, optional initial
//! position hints and per-group padding, plus the edges and the algorithm
//! options. It answers with the same tree annotated with positions. Child
//! positions, in both hints and answers, are relative to the parent's origin.

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use keel_core::{
    geometry::{Insets, Point, Size},
    identifier::Id,
};

/// Placement algorithm requested from the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Layered drawing of directed graphs (Sugiyama method).
    #[default]
    Layered,
    /// Row-major grid that ignores edges.
    Grid,
}

/// Main flow direction of the drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Down,
    Right,
    Up,
    Left,
}

impl Direction {
    /// Returns true when layers advance along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }
}

/// Options forwarded with every service request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    algorithm: Algorithm,
    direction: Direction,
    node_spacing: f32,
    layer_spacing: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::new(Algorithm::default(), Direction::default()).with_spacing(50.0, 80.0)
    }
}

impl LayoutOptions {
    pub fn new(algorithm: Algorithm, direction: Direction) -> Self {
        Self {
            algorithm,
            direction,
            node_spacing: 0.0,
            layer_spacing: 0.0,
        }
    }

    /// Sets the gap between nodes of a layer and between layers.
    pub fn with_spacing(mut self, node_spacing: f32, layer_spacing: f32) -> Self {
        self.node_spacing = node_spacing;
        self.layer_spacing = layer_spacing;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn node_spacing(&self) -> f32 {
        self.node_spacing
    }

    pub fn layer_spacing(&self) -> f32 {
        self.layer_spacing
    }
}

/// A node of a service request. Groups carry their members as `children`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestNode {
    pub id: Id,
    pub size: Size,
    /// Suggested position, relative to the parent for children.
    pub initial: Option<Point>,
    /// Space kept between this node's border and its children.
    pub padding: Insets,
    pub children: Vec<RequestNode>,
}

impl RequestNode {
    pub fn new(id: Id, size: Size) -> Self {
        Self {
            id,
            size,
            initial: None,
            padding: Insets::default(),
            children: Vec::new(),
        }
    }
}

/// A hyperedge of a service request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEdge {
    pub id: Id,
    pub sources: Vec<Id>,
    pub targets: Vec<Id>,
}

/// Full input of one service call.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRequest {
    pub nodes: Vec<RequestNode>,
    pub edges: Vec<RequestEdge>,
    pub options: LayoutOptions,
}

impl LayoutRequest {
    /// Returns the number of nodes at every depth.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[RequestNode]) -> usize {
            nodes.iter().map(|node| 1 + count(&node.children)).sum()
        }
        count(&self.nodes)
    }
}

/// A node of a service answer, positioned relative to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: Id,
    pub position: Point,
    pub children: Vec<PlacedNode>,
}

impl PlacedNode {
    pub fn new(id: Id, position: Point) -> Self {
        Self {
            id,
            position,
            children: Vec::new(),
        }
    }
}

/// Full answer of one service call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResponse {
    pub nodes: Vec<PlacedNode>,
}

/// Failure reported by a layout service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Layout service rejected the request: {0}")]
    Rejected(String),

    #[error("Layout algorithm panicked: {0}")]
    Panicked(String),

    #[error("Layout service did not place node {0}")]
    MissingNode(Id),
}

/// An automatic layout algorithm, possibly running out of process.
///
/// Calls are independent of each other; the service keeps no state between
/// requests that affects the result.
pub trait LayoutService {
    /// Computes positions for every node of `request`.
    fn layout(
        &self,
        request: &LayoutRequest,
    ) -> impl Future<Output = Result<LayoutResponse, ServiceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_count_includes_children() {
        let mut group = RequestNode::new(Id::new("group"), Size::new(300.0, 200.0));
        group
            .children
            .push(RequestNode::new(Id::new("inner"), Size::new(50.0, 20.0)));
        let request = LayoutRequest {
            nodes: vec![group, RequestNode::new(Id::new("outer"), Size::new(50.0, 20.0))],
            edges: Vec::new(),
            options: LayoutOptions::default(),
        };
        assert_eq!(request.node_count(), 3);
    }

    #[test]
    fn test_direction_axis() {
        assert!(!Direction::Down.is_horizontal());
        assert!(!Direction::Up.is_horizontal());
        assert!(Direction::Right.is_horizontal());
        assert!(Direction::Left.is_horizontal());
    }

    #[test]
    fn test_default_options() {
        let options = LayoutOptions::default();
        assert_eq!(options.algorithm(), Algorithm::Layered);
        assert_eq!(options.direction(), Direction::Down);
        assert_eq!(options.node_spacing(), 50.0);
        assert_eq!(options.layer_spacing(), 80.0);
    }
}
