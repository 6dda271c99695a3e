//! Graph revisions as delivered by the import/parsing collaborator.
//!
//! A [`DiffableGraph`] is one immutable revision of the diagram: an ordered set
//! of [`GraphNode`]s plus the [`GraphEdge`]s between them. Node order is the
//! order in which the importer produced the nodes and is preserved everywhere
//! downstream.

use indexmap::IndexMap;
use log::warn;

use crate::{geometry::Size, identifier::Id};

/// Size given to nodes whose importer did not measure them.
pub const DEFAULT_NODE_SIZE: Size = Size::new(150.0, 50.0);

/// A node of one graph revision.
///
/// Only [`kind`](Self::kind) and [`label`](Self::label) take part in change
/// classification. Size and parent are carried through to layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    id: Id,
    kind: String,
    label: String,
    size: Size,
    parent: Option<Id>,
}

impl GraphNode {
    /// Creates a top-level node with the [`DEFAULT_NODE_SIZE`].
    pub fn new(id: impl Into<Id>, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            size: DEFAULT_NODE_SIZE,
            parent: None,
        }
    }

    /// Sets the measured size of the node (builder style).
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Places the node inside a group node (builder style).
    pub fn with_parent(mut self, parent: impl Into<Id>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Notation-specific node type, e.g. `service` or `database`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    /// Returns true when `other` differs in a field that counts as a content change.
    pub fn is_modified_from(&self, other: &GraphNode) -> bool {
        self.kind != other.kind || self.label != other.label
    }
}

/// A directed edge of one graph revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    id: Id,
    source: Id,
    target: Id,
}

impl GraphEdge {
    pub fn new(id: impl Into<Id>, source: impl Into<Id>, target: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn source(&self) -> Id {
        self.source
    }

    pub fn target(&self) -> Id {
        self.target
    }
}

/// One immutable revision of the diagram graph.
///
/// Node ids are unique within a revision. When the input repeats an id, the
/// later node replaces the earlier one but keeps the earlier node's place in
/// the ordering (last write wins).
///
/// # Examples
///
/// ```
/// use keel_core::graph::{DiffableGraph, GraphEdge, GraphNode};
///
/// let graph = DiffableGraph::new(
///     [
///         GraphNode::new("a", "service", "A"),
///         GraphNode::new("b", "service", "B"),
///         GraphNode::new("a", "database", "A2"),
///     ],
///     [GraphEdge::new("a-b", "a", "b")],
/// );
///
/// assert_eq!(graph.len(), 2);
/// let first = graph.nodes().next().unwrap();
/// assert_eq!(first.id(), "a");
/// assert_eq!(first.kind(), "database");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffableGraph {
    nodes: IndexMap<Id, GraphNode>,
    edges: Vec<GraphEdge>,
}

impl DiffableGraph {
    /// Builds a revision from nodes and edges.
    pub fn new(
        nodes: impl IntoIterator<Item = GraphNode>,
        edges: impl IntoIterator<Item = GraphEdge>,
    ) -> Self {
        let mut indexed = IndexMap::new();
        for node in nodes {
            let id = node.id();
            if indexed.insert(id, node).is_some() {
                warn!(node_id:% = id; "Duplicate node id in graph revision, keeping the last one");
            }
        }

        Self {
            nodes: indexed,
            edges: edges.into_iter().collect(),
        }
    }

    /// Builds a revision without edges.
    pub fn from_nodes(nodes: impl IntoIterator<Item = GraphNode>) -> Self {
        Self::new(nodes, Vec::<GraphEdge>::new())
    }

    /// Returns a revision without nodes or edges.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the nodes in revision order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Returns the node ids in revision order.
    pub fn node_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node(&self, id: Id) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Returns the number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
