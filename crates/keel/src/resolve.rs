//! Decides which nodes keep their coordinates and which need placement.

use log::{debug, trace};

use keel_core::{
    geometry::Point,
    graph::DiffableGraph,
    identifier::Id,
    position::PositionMap,
};

use crate::diff::{GraphDiff, diff};

/// Positions to keep for a new revision plus the ids still needing placement.
///
/// `positions` has an entry for every node of the new revision and none for
/// removed nodes. Ids in `needs_layout` carry a `(0, 0)` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionResolution {
    positions: PositionMap,
    needs_layout: Vec<Id>,
    diff: GraphDiff,
}

impl PositionResolution {
    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Ids without a trustworthy position, in resolution order.
    pub fn needs_layout(&self) -> &[Id] {
        &self.needs_layout
    }

    /// The classification this resolution was derived from.
    pub fn diff(&self) -> &GraphDiff {
        &self.diff
    }

    /// Positions of the ids that do not need layout.
    pub fn pinned(&self) -> PositionMap {
        self.positions
            .iter()
            .filter(|(id, _)| !self.needs_layout.contains(id))
            .map(|(id, position)| (*id, *position))
            .collect()
    }

    pub fn into_parts(self) -> (PositionMap, Vec<Id>) {
        (self.positions, self.needs_layout)
    }
}

/// Resolves the positions to use for `new` given the positions known for `old`.
///
/// Retained nodes (unchanged, then modified) keep their current position when
/// one is recorded. Retained nodes without one and every added node are
/// seeded with `(0, 0)` and listed as needing layout. Removed nodes are dropped.
///
/// # Examples
///
/// ```
/// use keel::resolve;
/// use keel_core::{
///     geometry::Point,
///     graph::{DiffableGraph, GraphNode},
///     identifier::Id,
///     position::PositionMap,
/// };
///
/// let old = DiffableGraph::from_nodes([GraphNode::new("a", "service", "A")]);
/// let new = DiffableGraph::from_nodes([
///     GraphNode::new("a", "service", "A"),
///     GraphNode::new("b", "service", "B"),
/// ]);
/// let mut current = PositionMap::new();
/// current.insert(Id::new("a"), Point::new(120.0, 40.0));
///
/// let resolution = resolve(&old, &new, &current);
/// assert_eq!(resolution.positions()[&Id::new("a")], Point::new(120.0, 40.0));
/// assert_eq!(resolution.positions()[&Id::new("b")], Point::default());
/// assert_eq!(resolution.needs_layout(), [Id::new("b")]);
/// ```
pub fn resolve(
    old: &DiffableGraph,
    new: &DiffableGraph,
    current: &PositionMap,
) -> PositionResolution {
    let diff = diff(old, new);
    let mut positions = PositionMap::with_capacity(new.len());
    let mut needs_layout = Vec::new();

    for id in diff.retained() {
        match current.get(&id) {
            Some(position) => {
                positions.insert(id, *position);
            }
            None => {
                positions.insert(id, Point::default());
                needs_layout.push(id);
            }
        }
    }

    for &id in diff.added() {
        positions.insert(id, Point::default());
        needs_layout.push(id);
    }

    debug!(
        kept = positions.len() - needs_layout.len(),
        needs_layout = needs_layout.len();
        "Positions resolved"
    );
    trace!(positions:?; "Resolved positions");

    PositionResolution {
        positions,
        needs_layout,
        diff,
    }
}
