//! Incremental layout and the external layout service it wraps.
//!
//! - [`LayoutService`] - contract of the automatic layout algorithm
//! - [`LayeredService`] - bundled in-process service (`rust-sugiyama`)
//! - [`IncrementalLayoutEngine`] - computes positions only where needed

mod incremental;
mod layered;
mod service;

pub use incremental::IncrementalLayoutEngine;
pub use layered::LayeredService;
pub use service::{
    Algorithm, Direction, LayoutOptions, LayoutRequest, LayoutResponse, LayoutService,
    PlacedNode, RequestEdge, RequestNode, ServiceError,
};

use keel_core::{
    geometry::Size,
    graph::{GraphEdge, GraphNode},
    identifier::Id,
};

/// What the engine needs to know about a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutNodeInfo {
    pub id: Id,
    pub size: Size,
    pub parent: Option<Id>,
}

impl LayoutNodeInfo {
    pub fn new(id: Id, size: Size) -> Self {
        Self {
            id,
            size,
            parent: None,
        }
    }

    /// Places the node inside a group node (builder style).
    pub fn with_parent(mut self, parent: Id) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl From<&GraphNode> for LayoutNodeInfo {
    fn from(node: &GraphNode) -> Self {
        Self {
            id: node.id(),
            size: node.size(),
            parent: node.parent(),
        }
    }
}

/// What the engine needs to know about an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEdgeInfo {
    pub id: Id,
    pub source: Id,
    pub target: Id,
}

impl LayoutEdgeInfo {
    pub fn new(id: Id, source: Id, target: Id) -> Self {
        Self { id, source, target }
    }
}

impl From<&GraphEdge> for LayoutEdgeInfo {
    fn from(edge: &GraphEdge) -> Self {
        Self::new(edge.id(), edge.source(), edge.target())
    }
}
