//! Incremental layout on top of an external [`LayoutService`].
//!
//! The whole graph is always sent to the service so edge routing and relative
//! ordering stay consistent, with pinned positions attached as hints. The
//! answer is then only trusted for the nodes that need placement; every other
//! node is put back at its pinned position.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, trace, warn};

use keel_core::{
    geometry::{Insets, Point},
    identifier::Id,
    position::PositionMap,
};

use super::{
    LayoutEdgeInfo, LayoutNodeInfo,
    service::{
        LayoutOptions, LayoutRequest, LayoutResponse, LayoutService, PlacedNode, RequestEdge,
        RequestNode, ServiceError,
    },
};

/// Origin of top-level hints.
const TOP_LEVEL: Option<Point> = Some(Point::new(0.0, 0.0));

/// Computes coordinates for the nodes that need them and keeps all others.
#[derive(Debug)]
pub struct IncrementalLayoutEngine<S> {
    service: S,
    options: LayoutOptions,
    group_padding: Insets,
    fallback_margin: f32,
}

impl<S: LayoutService> IncrementalLayoutEngine<S> {
    /// Create an engine with default options around `service`
    pub fn new(service: S) -> Self {
        Self {
            service,
            options: LayoutOptions::default(),
            group_padding: Insets::uniform(20.0),
            fallback_margin: 40.0,
        }
    }

    /// Set the algorithm, direction and spacing sent to the service
    pub fn with_options(mut self, options: LayoutOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the padding requested around the children of group nodes
    pub fn with_group_padding(mut self, padding: Insets) -> Self {
        self.group_padding = padding;
        self
    }

    /// Set the vertical gap used by the fallback placement
    pub fn with_fallback_margin(mut self, margin: f32) -> Self {
        self.fallback_margin = margin;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// Returns positions for every node in `nodes`.
    ///
    /// - No nodes: returns an empty map without calling the service.
    /// - Nothing needs layout: returns `pinned` restricted to `nodes`, without
    ///   calling the service.
    /// - Otherwise the service lays out the full graph. Ids in `needs_layout`
    ///   take the service's answer; all other ids keep their pinned position.
    ///
    /// Service failures never reach the caller: pinned ids keep their
    /// position and the rest are stacked below them.
    pub async fn layout(
        &self,
        nodes: &[LayoutNodeInfo],
        edges: &[LayoutEdgeInfo],
        pinned: &PositionMap,
        needs_layout: &[Id],
    ) -> PositionMap {
        if nodes.is_empty() {
            return PositionMap::new();
        }

        if needs_layout.is_empty() {
            debug!(nodes = nodes.len(); "Nothing needs layout, keeping pinned positions");
            return nodes
                .iter()
                .filter_map(|node| pinned.get(&node.id).map(|position| (node.id, *position)))
                .collect();
        }

        let request = self.build_request(nodes, edges, pinned);
        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            needs_layout = needs_layout.len();
            "Requesting layout from service"
        );

        let outcome = match self.service.layout(&request).await {
            Ok(response) => merge_response(nodes, &response, pinned, needs_layout),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(positions) => {
                trace!(positions:?; "Merged layout positions");
                positions
            }
            Err(err) => {
                warn!(error:% = err; "Layout service failed, using fallback placement");
                fallback_positions(nodes, pinned, needs_layout, self.fallback_margin)
            }
        }
    }

    /// Builds the request tree, attaching pinned positions as hints.
    fn build_request(
        &self,
        nodes: &[LayoutNodeInfo],
        edges: &[LayoutEdgeInfo],
        pinned: &PositionMap,
    ) -> LayoutRequest {
        let known: HashSet<Id> = nodes.iter().map(|node| node.id).collect();
        let mut children: IndexMap<Id, Vec<usize>> = IndexMap::new();
        let mut roots = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            match node.parent.filter(|parent| known.contains(parent)) {
                Some(parent) => children.entry(parent).or_default().push(index),
                None => roots.push(index),
            }
        }

        let mut visited = HashSet::new();
        let mut tree: Vec<RequestNode> = roots
            .into_iter()
            .filter_map(|index| {
                self.request_node(index, TOP_LEVEL, nodes, &children, pinned, &mut visited)
            })
            .collect();

        // Nodes only reachable through a parent cycle are laid out at top level.
        for index in 0..nodes.len() {
            if !visited.contains(&index) {
                warn!(node_id:% = nodes[index].id; "Node unreachable from the top level");
                tree.extend(self.request_node(
                    index,
                    TOP_LEVEL,
                    nodes,
                    &children,
                    pinned,
                    &mut visited,
                ));
            }
        }

        LayoutRequest {
            nodes: tree,
            edges: edges
                .iter()
                .map(|edge| RequestEdge {
                    id: edge.id,
                    sources: vec![edge.source],
                    targets: vec![edge.target],
                })
                .collect(),
            options: self.options,
        }
    }

    /// Builds the request node for `nodes[index]` and its members.
    ///
    /// `parent_origin` is the absolute position hints are made relative to;
    /// `None` when the parent itself has no pinned position.
    fn request_node(
        &self,
        index: usize,
        parent_origin: Option<Point>,
        nodes: &[LayoutNodeInfo],
        children: &IndexMap<Id, Vec<usize>>,
        pinned: &PositionMap,
        visited: &mut HashSet<usize>,
    ) -> Option<RequestNode> {
        if !visited.insert(index) {
            return None;
        }

        let info = &nodes[index];
        let absolute = pinned.get(&info.id).copied();
        let mut node = RequestNode::new(info.id, info.size);
        node.initial = absolute
            .zip(parent_origin)
            .map(|(position, origin)| position.sub_point(origin));

        if let Some(members) = children.get(&info.id) {
            node.padding = self.group_padding;
            node.children = members
                .iter()
                .filter_map(|&member| {
                    self.request_node(member, absolute, nodes, children, pinned, visited)
                })
                .collect();
        }

        Some(node)
    }
}

/// Flattens the answer to absolute positions and restores pinned ids.
fn merge_response(
    nodes: &[LayoutNodeInfo],
    response: &LayoutResponse,
    pinned: &PositionMap,
    needs_layout: &[Id],
) -> Result<PositionMap, ServiceError> {
    fn flatten(placed: &[PlacedNode], origin: Point, absolute: &mut HashMap<Id, Point>) {
        for node in placed {
            let position = node.position.add_point(origin);
            absolute.insert(node.id, position);
            flatten(&node.children, position, absolute);
        }
    }

    let mut computed = HashMap::new();
    flatten(&response.nodes, Point::default(), &mut computed);

    let needs_layout: HashSet<Id> = needs_layout.iter().copied().collect();
    nodes
        .iter()
        .map(|node| {
            let position = match (needs_layout.contains(&node.id), pinned.get(&node.id)) {
                (false, Some(position)) => *position,
                _ => computed
                    .get(&node.id)
                    .copied()
                    .ok_or(ServiceError::MissingNode(node.id))?,
            };
            Ok((node.id, position))
        })
        .collect()
}

/// Deterministic placement used when the service fails.
///
/// Pinned ids keep their position. The others are stacked at `x = 0`, starting
/// `margin` below the bottom edge of the lowest pinned node (or at `y = 0`
/// without pinned nodes), each advancing by its height plus `margin`.
pub(crate) fn fallback_positions(
    nodes: &[LayoutNodeInfo],
    pinned: &PositionMap,
    needs_layout: &[Id],
    margin: f32,
) -> PositionMap {
    let needs_layout: HashSet<Id> = needs_layout.iter().copied().collect();
    let pinned_bottom = nodes
        .iter()
        .filter(|node| !needs_layout.contains(&node.id))
        .filter_map(|node| {
            pinned
                .get(&node.id)
                .map(|position| position.y() + node.size.height())
        })
        .reduce(f32::max);

    let mut cursor = pinned_bottom.map_or(0.0, |bottom| bottom + margin);
    nodes
        .iter()
        .filter_map(|node| {
            if !needs_layout.contains(&node.id) {
                return pinned.get(&node.id).map(|position| (node.id, *position));
            }
            let position = Point::new(0.0, cursor);
            cursor += node.size.height() + margin;
            Some((node.id, position))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use futures::executor::block_on;

    use keel_core::geometry::Size;

    use super::*;

    /// Places every node at a fixed spot derived from its request order and
    /// records what it was asked.
    #[derive(Default)]
    struct RecordingService {
        calls: Cell<usize>,
        last_request: RefCell<Option<LayoutRequest>>,
    }

    impl LayoutService for RecordingService {
        async fn layout(&self, request: &LayoutRequest) -> Result<LayoutResponse, ServiceError> {
            self.calls.set(self.calls.get() + 1);
            *self.last_request.borrow_mut() = Some(request.clone());

            fn place(nodes: &[RequestNode], base: f32) -> Vec<PlacedNode> {
                nodes
                    .iter()
                    .enumerate()
                    .map(|(i, node)| PlacedNode {
                        id: node.id,
                        position: Point::new(base + 1000.0, base + 100.0 * (i as f32 + 1.0)),
                        children: place(&node.children, 5.0),
                    })
                    .collect()
            }
            Ok(LayoutResponse {
                nodes: place(&request.nodes, 0.0),
            })
        }
    }

    struct FailingService;

    impl LayoutService for FailingService {
        async fn layout(&self, _request: &LayoutRequest) -> Result<LayoutResponse, ServiceError> {
            Err(ServiceError::Rejected("offline".to_string()))
        }
    }

    /// Answers without any node.
    struct ForgetfulService;

    impl LayoutService for ForgetfulService {
        async fn layout(&self, _request: &LayoutRequest) -> Result<LayoutResponse, ServiceError> {
            Ok(LayoutResponse::default())
        }
    }

    fn info(name: &str) -> LayoutNodeInfo {
        LayoutNodeInfo::new(Id::new(name), Size::new(100.0, 40.0))
    }

    fn pins(entries: &[(&str, f32, f32)]) -> PositionMap {
        entries
            .iter()
            .map(|&(name, x, y)| (Id::new(name), Point::new(x, y)))
            .collect()
    }

    #[test]
    fn test_empty_nodes_skip_service() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let positions = block_on(engine.layout(&[], &[], &pins(&[("a", 1.0, 1.0)]), &[Id::new("a")]));
        assert!(positions.is_empty());
        assert_eq!(engine.service().calls.get(), 0);
    }

    #[test]
    fn test_nothing_to_layout_returns_pinned_subset() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let pinned = pins(&[("a", 1.0, 2.0), ("b", 3.0, 4.0), ("gone", 9.0, 9.0)]);
        let positions = block_on(engine.layout(&[info("a"), info("b")], &[], &pinned, &[]));

        assert_eq!(positions, pins(&[("a", 1.0, 2.0), ("b", 3.0, 4.0)]));
        assert_eq!(engine.service().calls.get(), 0);
    }

    #[test]
    fn test_pinned_nodes_are_restored() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let edges = [LayoutEdgeInfo::new(Id::new("ab"), Id::new("a"), Id::new("b"))];
        let pinned = pins(&[("a", 7.0, 8.0)]);

        let positions = block_on(engine.layout(
            &[info("a"), info("b")],
            &edges,
            &pinned,
            &[Id::new("b")],
        ));

        assert_eq!(engine.service().calls.get(), 1);
        assert_eq!(positions[&Id::new("a")], Point::new(7.0, 8.0));
        assert_eq!(positions[&Id::new("b")], Point::new(1000.0, 200.0));
    }

    #[test]
    fn test_request_contains_all_nodes_with_hints() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let edges = [LayoutEdgeInfo::new(Id::new("ab"), Id::new("a"), Id::new("b"))];
        block_on(engine.layout(
            &[info("a"), info("b")],
            &edges,
            &pins(&[("a", 7.0, 8.0)]),
            &[Id::new("b")],
        ));

        let request = engine.service().last_request.borrow().clone().unwrap();
        assert_eq!(request.nodes.len(), 2);
        assert_eq!(request.nodes[0].initial, Some(Point::new(7.0, 8.0)));
        assert_eq!(request.nodes[1].initial, None);
        assert_eq!(request.edges.len(), 1);
        assert_eq!(request.edges[0].sources, vec![Id::new("a")]);
        assert_eq!(request.edges[0].targets, vec![Id::new("b")]);
    }

    #[test]
    fn test_group_hints_are_relative_and_results_absolute() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let nodes = [
            LayoutNodeInfo::new(Id::new("group"), Size::new(400.0, 300.0)),
            info("inner").with_parent(Id::new("group")),
            info("new_inner").with_parent(Id::new("group")),
        ];
        let pinned = pins(&[("group", 100.0, 100.0), ("inner", 130.0, 150.0)]);

        let positions = block_on(engine.layout(&nodes, &[], &pinned, &[Id::new("new_inner")]));

        let request = engine.service().last_request.borrow().clone().unwrap();
        assert_eq!(request.nodes.len(), 1);
        let group = &request.nodes[0];
        assert_eq!(group.padding, Insets::uniform(20.0));
        assert_eq!(group.children[0].initial, Some(Point::new(30.0, 50.0)));

        // The service placed the group at (1000, 100) and its second child at
        // (1005, 205) relative to it.
        assert_eq!(positions[&Id::new("group")], Point::new(100.0, 100.0));
        assert_eq!(positions[&Id::new("inner")], Point::new(130.0, 150.0));
        assert_eq!(positions[&Id::new("new_inner")], Point::new(2005.0, 305.0));
    }

    #[test]
    fn test_unknown_parent_is_top_level() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let nodes = [info("orphan").with_parent(Id::new("missing"))];
        block_on(engine.layout(&nodes, &[], &PositionMap::new(), &[Id::new("orphan")]));

        let request = engine.service().last_request.borrow().clone().unwrap();
        assert_eq!(request.nodes.len(), 1);
        assert_eq!(request.nodes[0].id, Id::new("orphan"));
    }

    #[test]
    fn test_parent_cycle_still_laid_out() {
        let engine = IncrementalLayoutEngine::new(RecordingService::default());
        let nodes = [
            info("x").with_parent(Id::new("y")),
            info("y").with_parent(Id::new("x")),
        ];
        let positions = block_on(engine.layout(
            &nodes,
            &[],
            &PositionMap::new(),
            &[Id::new("x"), Id::new("y")],
        ));
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_service_failure_falls_back() {
        let engine = IncrementalLayoutEngine::new(FailingService).with_fallback_margin(10.0);
        let pinned = pins(&[("a", 50.0, 200.0)]);

        let positions = block_on(engine.layout(
            &[info("a"), info("b"), info("c")],
            &[],
            &pinned,
            &[Id::new("b"), Id::new("c")],
        ));

        assert_eq!(positions[&Id::new("a")], Point::new(50.0, 200.0));
        assert_eq!(positions[&Id::new("b")], Point::new(0.0, 250.0));
        assert_eq!(positions[&Id::new("c")], Point::new(0.0, 300.0));
    }

    #[test]
    fn test_missing_answer_falls_back() {
        let engine = IncrementalLayoutEngine::new(ForgetfulService);
        let positions = block_on(engine.layout(
            &[info("a")],
            &[],
            &PositionMap::new(),
            &[Id::new("a")],
        ));
        assert_eq!(positions[&Id::new("a")], Point::new(0.0, 0.0));
    }

    #[test]
    fn test_fallback_without_pins_starts_at_origin() {
        let positions = fallback_positions(
            &[info("a"), info("b")],
            &PositionMap::new(),
            &[Id::new("a"), Id::new("b")],
            40.0,
        );
        assert_eq!(positions[&Id::new("a")], Point::new(0.0, 0.0));
        assert_eq!(positions[&Id::new("b")], Point::new(0.0, 80.0));
    }
}
