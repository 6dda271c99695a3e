//! Live diagram state: node positions, their provenance and spatial history.
//!
//! [`DiagramState`] is the single owner of the live nodes and edges. Graph
//! updates and reflows go through three phases so the state is never borrowed
//! across the layout service call:
//!
//! 1. [`prepare_graph`](DiagramState::prepare_graph) or
//!    [`prepare_reflow`](DiagramState::prepare_reflow) validates the input and
//!    captures everything the layout needs in a [`PendingLayout`].
//! 2. [`PendingLayout::compute`] runs the incremental layout.
//! 3. [`apply_layout`](DiagramState::apply_layout) merges the result, unless a
//!    newer graph revision was prepared in the meantime.
//!
//! [`set_graph`](DiagramState::set_graph) and [`reflow`](DiagramState::reflow)
//! run all three phases in one call.

use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use indexmap::IndexMap;
use log::{debug, info, trace};

use keel_core::{
    geometry::{Insets, Point, Size},
    graph::{DiffableGraph, GraphEdge},
    identifier::Id,
    position::{PositionMap, PositionSource},
};

use crate::{
    config::AppConfig,
    error::KeelError,
    history::LayoutHistory,
    layout::{IncrementalLayoutEngine, LayoutEdgeInfo, LayoutNodeInfo, LayoutService},
    resolve::resolve,
};

/// A node as currently shown: graph attributes plus position and provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNode {
    id: Id,
    kind: String,
    label: String,
    size: Size,
    parent: Option<Id>,
    position: Point,
    source: PositionSource,
}

impl LiveNode {
    pub fn id(&self) -> Id {
        self.id
    }

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

    /// Absolute top-left corner.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn source(&self) -> PositionSource {
        self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutKind {
    Update,
    Reflow,
}

/// Everything a layout computation needs, detached from the state.
#[must_use = "a pending layout does nothing until computed and applied"]
pub struct PendingLayout<S> {
    engine: Rc<IncrementalLayoutEngine<S>>,
    revision: u64,
    kind: LayoutKind,
    nodes: Vec<LayoutNodeInfo>,
    edges: Vec<LayoutEdgeInfo>,
    pinned: PositionMap,
    needs_layout: Vec<Id>,
}

impl<S: LayoutService> PendingLayout<S> {
    /// Revision the layout is computed for.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn needs_layout(&self) -> &[Id] {
        &self.needs_layout
    }

    /// Runs the incremental layout. The engine is skipped when no node needs
    /// placement.
    pub async fn compute(self) -> ComputedLayout {
        let positions = if self.needs_layout.is_empty() {
            self.pinned
        } else {
            self.engine
                .layout(&self.nodes, &self.edges, &self.pinned, &self.needs_layout)
                .await
        };

        ComputedLayout {
            revision: self.revision,
            kind: self.kind,
            positions,
            needs_layout: self.needs_layout.into_iter().collect(),
        }
    }
}

/// Result of [`PendingLayout::compute`], tagged with its revision.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedLayout {
    revision: u64,
    kind: LayoutKind,
    positions: PositionMap,
    needs_layout: HashSet<Id>,
}

impl ComputedLayout {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }
}

/// Outcome of [`DiagramState::apply_layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutApplication {
    Applied,
    /// The result was computed for a revision that is no longer current and
    /// was dropped.
    Stale,
}

impl LayoutApplication {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Owner of the live diagram state.
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use keel::{DiagramState, LayoutHistory, layout::{IncrementalLayoutEngine, LayeredService}};
/// use keel_core::{
///     geometry::Point,
///     graph::{DiffableGraph, GraphEdge, GraphNode},
///     identifier::Id,
///     position::PositionSource,
/// };
///
/// let engine = IncrementalLayoutEngine::new(LayeredService::new());
/// let mut state = DiagramState::new(engine, LayoutHistory::new(50));
///
/// let graph = DiffableGraph::new(
///     [GraphNode::new("a", "service", "A"), GraphNode::new("b", "service", "B")],
///     [GraphEdge::new("ab", "a", "b")],
/// );
/// block_on(state.set_graph(graph)).unwrap();
/// assert_eq!(state.position_source(Id::new("a")), PositionSource::LayoutComputed);
///
/// state.on_node_drag(Id::new("a"), Point::new(500.0, 500.0)).unwrap();
/// assert!(state.on_drag_end());
/// assert!(state.undo());
/// assert_ne!(state.node(Id::new("a")).unwrap().position(), Point::new(500.0, 500.0));
/// ```
pub struct DiagramState<S> {
    engine: Rc<IncrementalLayoutEngine<S>>,
    nodes: IndexMap<Id, LiveNode>,
    edges: Vec<GraphEdge>,
    /// Most recently prepared revision, the base of the next diff.
    previous: DiffableGraph,
    revision: u64,
    /// Revision the live nodes belong to.
    live_revision: u64,
    history: LayoutHistory,
    /// Positions before the drag gesture in progress.
    drag_origin: Option<PositionMap>,
}

impl<S: LayoutService> DiagramState<S> {
    pub fn new(engine: IncrementalLayoutEngine<S>, history: LayoutHistory) -> Self {
        Self {
            engine: Rc::new(engine),
            nodes: IndexMap::new(),
            edges: Vec::new(),
            previous: DiffableGraph::empty(),
            revision: 0,
            live_revision: 0,
            history,
            drag_origin: None,
        }
    }

    /// Creates a state around `service` configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`KeelError::Config`] when the configuration is invalid.
    pub fn from_config(service: S, config: &AppConfig) -> Result<Self, KeelError> {
        config.validate()?;

        let layout = config.layout();
        let engine = IncrementalLayoutEngine::new(service)
            .with_options(layout.options())
            .with_group_padding(Insets::uniform(layout.group_padding()))
            .with_fallback_margin(layout.fallback_margin());
        let history = LayoutHistory::new(config.history().max_snapshots());
        Ok(Self::new(engine, history))
    }

    /// Validates `graph`, resolves which positions to keep and starts a new
    /// revision.
    ///
    /// The returned layout must be computed and passed to
    /// [`apply_layout`](Self::apply_layout) to update the live nodes.
    ///
    /// # Errors
    ///
    /// Rejects graphs with an edge endpoint or parent that is not a node of
    /// the same revision, or with a cycle of parents. Nothing changes then.
    pub fn prepare_graph(&mut self, graph: DiffableGraph) -> Result<PendingLayout<S>, KeelError> {
        self.history.finish_applying();
        validate(&graph)?;

        let resolution = resolve(&self.previous, &graph, &self.positions());
        let pinned = resolution.pinned();
        let (_, needs_layout) = resolution.into_parts();

        self.revision += 1;
        let pending = PendingLayout {
            engine: Rc::clone(&self.engine),
            revision: self.revision,
            kind: LayoutKind::Update,
            nodes: graph.nodes().map(LayoutNodeInfo::from).collect(),
            edges: graph.edges().iter().map(LayoutEdgeInfo::from).collect(),
            pinned,
            needs_layout,
        };
        self.previous = graph;

        debug!(
            revision = self.revision,
            needs_layout = pending.needs_layout.len();
            "Graph update prepared"
        );
        Ok(pending)
    }

    /// Starts a full re-layout of the live nodes that ignores every pin.
    ///
    /// A reflow is computed for the revision of the live nodes. It is dropped
    /// when that revision is no longer the latest, which covers updates
    /// prepared before or after the reflow.
    pub fn prepare_reflow(&mut self) -> PendingLayout<S> {
        self.history.finish_applying();

        let nodes: Vec<LayoutNodeInfo> = self
            .nodes
            .values()
            .map(|node| LayoutNodeInfo {
                id: node.id,
                size: node.size,
                parent: node.parent,
            })
            .collect();
        let needs_layout = nodes.iter().map(|node| node.id).collect();

        debug!(revision = self.live_revision, nodes = nodes.len(); "Reflow prepared");
        PendingLayout {
            engine: Rc::clone(&self.engine),
            revision: self.live_revision,
            kind: LayoutKind::Reflow,
            nodes,
            edges: self.edges.iter().map(LayoutEdgeInfo::from).collect(),
            pinned: PositionMap::new(),
            needs_layout,
        }
    }

    /// Merges a computed layout into the live nodes.
    ///
    /// Results for a revision other than the current one are dropped, and so
    /// are reflows while a prepared update has not been applied yet. A graph
    /// update rebuilds the live nodes in graph order: placed nodes are tagged
    /// [`PositionSource::LayoutComputed`], all others keep their live position
    /// and source. A reflow moves every node, tags it `LayoutComputed` and is
    /// recorded in the history.
    pub fn apply_layout(&mut self, computed: ComputedLayout) -> LayoutApplication {
        let current = match computed.kind {
            LayoutKind::Update => computed.revision == self.revision,
            LayoutKind::Reflow => {
                computed.revision == self.live_revision && self.live_revision == self.revision
            }
        };
        if !current {
            debug!(
                computed = computed.revision,
                current = self.revision,
                live = self.live_revision;
                "Dropping stale layout result"
            );
            return LayoutApplication::Stale;
        }

        match computed.kind {
            LayoutKind::Update => self.apply_update(&computed),
            LayoutKind::Reflow => self.apply_reflow(&computed),
        }
        trace!(positions:? = self.positions(); "Live positions");
        LayoutApplication::Applied
    }

    fn apply_update(&mut self, computed: &ComputedLayout) {
        let mut live = std::mem::take(&mut self.nodes);
        self.nodes = self
            .previous
            .nodes()
            .map(|node| {
                let id = node.id();
                let kept = live.swap_remove(&id);
                let (position, source) = match kept {
                    Some(kept) if !computed.needs_layout.contains(&id) => {
                        (kept.position, kept.source)
                    }
                    _ if computed.needs_layout.contains(&id) => (
                        computed.positions.get(&id).copied().unwrap_or_default(),
                        PositionSource::LayoutComputed,
                    ),
                    _ => (
                        computed.positions.get(&id).copied().unwrap_or_default(),
                        PositionSource::Default,
                    ),
                };
                let live_node = LiveNode {
                    id,
                    kind: node.kind().to_string(),
                    label: node.label().to_string(),
                    size: node.size(),
                    parent: node.parent(),
                    position,
                    source,
                };
                (id, live_node)
            })
            .collect();
        self.edges = self.previous.edges().to_vec();
        self.live_revision = computed.revision;

        info!(
            revision = self.revision,
            nodes = self.nodes.len(),
            placed = computed.needs_layout.len();
            "Graph update applied"
        );
    }

    fn apply_reflow(&mut self, computed: &ComputedLayout) {
        let before = self.positions();
        for node in self.nodes.values_mut() {
            if let Some(position) = computed.positions.get(&node.id) {
                node.position = *position;
                node.source = PositionSource::LayoutComputed;
            }
        }
        self.drag_origin = None;

        info!(nodes = self.nodes.len(); "Reflow applied");
        self.commit(before, "reflow");
    }

    /// Replaces the graph and places every node that needs it.
    ///
    /// Does not record a history snapshot.
    pub async fn set_graph(&mut self, graph: DiffableGraph) -> Result<LayoutApplication, KeelError> {
        let pending = self.prepare_graph(graph)?;
        let computed = pending.compute().await;
        Ok(self.apply_layout(computed))
    }

    /// Lays out every live node from scratch and records the result.
    pub async fn reflow(&mut self) -> LayoutApplication {
        let pending = self.prepare_reflow();
        let computed = pending.compute().await;
        self.apply_layout(computed)
    }

    /// Moves a node during a drag gesture.
    ///
    /// No history entry is written until [`on_drag_end`](Self::on_drag_end).
    ///
    /// # Errors
    ///
    /// Returns [`KeelError::UnknownNode`] when `id` is not a live node.
    pub fn on_node_drag(&mut self, id: Id, position: Point) -> Result<(), KeelError> {
        self.history.finish_applying();

        if !self.nodes.contains_key(&id) {
            return Err(KeelError::UnknownNode(id));
        }
        if self.drag_origin.is_none() {
            self.drag_origin = Some(self.positions());
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
            node.source = PositionSource::UserDragged;
        }
        trace!(node_id:% = id, x = position.x(), y = position.y(); "Node dragged");
        Ok(())
    }

    /// Ends the drag gesture and records it as one undoable step.
    ///
    /// Without a drag in progress the live table is recorded as is, with no
    /// baseline. Returns false when the history ignored the snapshot.
    pub fn on_drag_end(&mut self) -> bool {
        match self.drag_origin.take() {
            Some(before) => self.commit(before, "drag"),
            None => {
                debug!("Drag end without a drag in progress");
                let positions = self.positions();
                self.history.save(&positions, "drag")
            }
        }
    }

    /// Overwrites positions in bulk, e.g. when a document with persisted
    /// coordinates is loaded, and records the result.
    ///
    /// Returns whether a history snapshot was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`KeelError::UnknownNode`] when any id is not a live node. No
    /// position changes then.
    pub fn set_node_positions(
        &mut self,
        positions: &PositionMap,
        source: PositionSource,
    ) -> Result<bool, KeelError> {
        if let Some(unknown) = positions.keys().find(|id| !self.nodes.contains_key(*id)) {
            return Err(KeelError::UnknownNode(*unknown));
        }

        let before = self.positions();
        for (id, position) in positions {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position = *position;
                node.source = source;
            }
        }

        info!(nodes = positions.len(), source:% = source; "Positions set");
        Ok(self.commit(before, source.as_str()))
    }

    /// Restores the previous snapshot. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        self.history.finish_applying();
        match self.history.undo() {
            Some(positions) => {
                self.apply_snapshot(&positions);
                info!(nodes = positions.len(); "Undo applied");
                true
            }
            None => false,
        }
    }

    /// Re-applies the snapshot undone last. Returns false when there is none.
    pub fn redo(&mut self) -> bool {
        self.history.finish_applying();
        match self.history.redo() {
            Some(positions) => {
                self.apply_snapshot(&positions);
                info!(nodes = positions.len(); "Redo applied");
                true
            }
            None => false,
        }
    }

    /// Moves the live nodes the snapshot knows about. Other nodes are left
    /// alone.
    fn apply_snapshot(&mut self, positions: &PositionMap) {
        for node in self.nodes.values_mut() {
            if let Some(position) = positions.get(&node.id) {
                node.position = *position;
                node.source = PositionSource::Restored;
            }
        }
        self.drag_origin = None;
    }

    /// Records the live positions as `label`, preceded by a baseline of
    /// `before` when the history does not end there already.
    fn commit(&mut self, before: PositionMap, label: &str) -> bool {
        if self.history.is_applying() {
            debug!(label; "History is being applied, not recording");
            return false;
        }

        let recorded = self.history.current().map(|snapshot| snapshot.positions());
        if !before.is_empty() && recorded != Some(&before) {
            self.history.save(&before, "baseline");
        }
        let after = self.positions();
        self.history.save(&after, label)
    }

    // ===================
    // Read access
    // ===================

    /// Provenance of a node's position; [`PositionSource::Default`] for
    /// unknown ids.
    pub fn position_source(&self, id: Id) -> PositionSource {
        self.nodes
            .get(&id)
            .map_or(PositionSource::Default, |node| node.source)
    }

    /// Live nodes in graph order.
    pub fn nodes(&self) -> impl Iterator<Item = &LiveNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: Id) -> Option<&LiveNode> {
        self.nodes.get(&id)
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Copy of the live position table.
    pub fn positions(&self) -> PositionMap {
        self.nodes
            .values()
            .map(|node| (node.id, node.position))
            .collect()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Revision of the most recently prepared graph update.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn history(&self) -> &LayoutHistory {
        &self.history
    }

    pub fn engine(&self) -> &IncrementalLayoutEngine<S> {
        &self.engine
    }
}

/// Checks that edges and parents only reference nodes of `graph` and that no
/// node is its own ancestor.
fn validate(graph: &DiffableGraph) -> Result<(), KeelError> {
    for edge in graph.edges() {
        for endpoint in [edge.source(), edge.target()] {
            if !graph.contains_node(endpoint) {
                return Err(KeelError::DanglingEdge {
                    edge: edge.id(),
                    node: endpoint,
                });
            }
        }
    }

    let parents: HashMap<Id, Id> = graph
        .nodes()
        .filter_map(|node| node.parent().map(|parent| (node.id(), parent)))
        .collect();
    for (&node, &parent) in &parents {
        if !graph.contains_node(parent) {
            return Err(KeelError::UnknownParent { node, parent });
        }
    }

    for &start in parents.keys() {
        let mut seen = HashSet::new();
        let mut current = parents.get(&start).copied();
        while let Some(ancestor) = current {
            if ancestor == start {
                return Err(KeelError::ParentCycle(start));
            }
            if !seen.insert(ancestor) {
                break;
            }
            current = parents.get(&ancestor).copied();
        }
    }

    Ok(())
}
