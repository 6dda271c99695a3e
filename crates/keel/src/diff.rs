//! Classification of node changes between two graph revisions.
//!
//! Nodes are matched by id. A matched node counts as modified when its kind or
//! label changed; size, parent and edges never affect classification.

use log::debug;

use keel_core::{graph::DiffableGraph, identifier::Id};

/// Node ids of a new revision classified against an old one.
///
/// The four lists are disjoint. Every node of the new revision is in exactly
/// one of `added`, `modified` and `unchanged`; every node that only the old
/// revision has is in `removed`. Each list keeps the iteration order of the
/// revision it was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDiff {
    added: Vec<Id>,
    removed: Vec<Id>,
    modified: Vec<Id>,
    unchanged: Vec<Id>,
}

impl GraphDiff {
    pub fn added(&self) -> &[Id] {
        &self.added
    }

    pub fn removed(&self) -> &[Id] {
        &self.removed
    }

    pub fn modified(&self) -> &[Id] {
        &self.modified
    }

    pub fn unchanged(&self) -> &[Id] {
        &self.unchanged
    }

    /// Ids present in both revisions: `unchanged` followed by `modified`.
    pub fn retained(&self) -> impl Iterator<Item = Id> + '_ {
        self.unchanged.iter().chain(&self.modified).copied()
    }

    /// Returns true when no node was added, removed or modified.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Classifies the nodes of `new` against `old`.
///
/// # Examples
///
/// ```
/// use keel::diff;
/// use keel_core::{
///     graph::{DiffableGraph, GraphNode},
///     identifier::Id,
/// };
///
/// let old = DiffableGraph::from_nodes([
///     GraphNode::new("a", "service", "A"),
///     GraphNode::new("b", "service", "B"),
/// ]);
/// let new = DiffableGraph::from_nodes([
///     GraphNode::new("a", "service", "Renamed"),
///     GraphNode::new("c", "service", "C"),
/// ]);
///
/// let changes = diff(&old, &new);
/// assert_eq!(changes.added(), [Id::new("c")]);
/// assert_eq!(changes.removed(), [Id::new("b")]);
/// assert_eq!(changes.modified(), [Id::new("a")]);
/// assert!(changes.unchanged().is_empty());
/// ```
pub fn diff(old: &DiffableGraph, new: &DiffableGraph) -> GraphDiff {
    let mut changes = GraphDiff::default();

    for node in new.nodes() {
        match old.node(node.id()) {
            None => changes.added.push(node.id()),
            Some(previous) if node.is_modified_from(previous) => {
                changes.modified.push(node.id());
            }
            Some(_) => changes.unchanged.push(node.id()),
        }
    }

    changes.removed = old.node_ids().filter(|id| !new.contains_node(*id)).collect();

    debug!(
        added = changes.added.len(),
        removed = changes.removed.len(),
        modified = changes.modified.len(),
        unchanged = changes.unchanged.len();
        "Graph diff computed"
    );

    changes
}
