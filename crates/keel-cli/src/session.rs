//! Session scripts and their replay.
//!
//! A session is a TOML document with a list of `[[step]]` tables, each tagged
//! by its `action`:
//!
//! ```toml
//! [[step]]
//! action = "graph"
//! nodes = [
//!     { id = "api", type = "service", label = "API" },
//!     { id = "db", type = "database", label = "DB", width = 120, height = 80 },
//! ]
//! edges = [{ id = "api-db", source = "api", target = "db" }]
//!
//! [[step]]
//! action = "drag"
//! node = "api"
//! x = 400
//! y = 40
//!
//! [[step]]
//! action = "drag-end"
//! ```

use futures::executor::block_on;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use keel::{DiagramState, layout::LayoutService};
use keel_core::{
    geometry::{Point, Size},
    graph::{DEFAULT_NODE_SIZE, DiffableGraph, GraphEdge, GraphNode},
    identifier::Id,
    position::{PositionMap, PositionSource},
};

use crate::error::CliError;

/// A parsed session script.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Session {
    #[serde(default, rename = "step")]
    steps: Vec<Step>,
}

/// One action of a session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Replace the graph with a new revision.
    Graph {
        #[serde(default)]
        nodes: Vec<NodeSpec>,
        #[serde(default)]
        edges: Vec<EdgeSpec>,
    },
    /// Move a node as part of a drag gesture.
    Drag { node: String, x: f32, y: f32 },
    DragEnd,
    Reflow,
    Undo,
    Redo,
    /// Apply persisted positions as if a document was opened.
    Load { positions: Vec<PositionSpec> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeSpec {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    label: String,
    width: Option<f32>,
    height: Option<f32>,
    parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EdgeSpec {
    /// Defaults to `source->target`.
    id: Option<String>,
    source: String,
    target: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionSpec {
    node: String,
    x: f32,
    y: f32,
}

impl Session {
    /// Parses a session script. `name` is only used in error reports.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Session`] pointing at the offending part of
    /// `content`.
    pub fn parse(name: &str, content: &str) -> Result<Self, CliError> {
        toml::from_str(content)
            .map_err(|err| CliError::session(name, content, err.message(), err.span()))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs every step against `state` in order, stopping at the first
    /// rejected step.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Step`] with the 1-based step number when the
    /// engine rejects a step.
    pub fn replay<S: LayoutService>(&self, state: &mut DiagramState<S>) -> Result<(), CliError> {
        info!(steps = self.steps.len(); "Replaying session");

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            debug!(step = number, action = step.action(); "Replaying step");
            step.apply(state).map_err(|source| CliError::Step {
                step: number,
                action: step.action(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Step {
    /// The `action` tag of this step.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Graph { .. } => "graph",
            Self::Drag { .. } => "drag",
            Self::DragEnd => "drag-end",
            Self::Reflow => "reflow",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Load { .. } => "load",
        }
    }

    fn apply<S: LayoutService>(&self, state: &mut DiagramState<S>) -> Result<(), keel::KeelError> {
        match self {
            Self::Graph { nodes, edges } => {
                let graph = DiffableGraph::new(
                    nodes.iter().map(NodeSpec::to_node),
                    edges.iter().map(EdgeSpec::to_edge),
                );
                let applied = block_on(state.set_graph(graph))?;
                debug!(applied:?; "Graph step done");
            }
            Self::Drag { node, x, y } => {
                state.on_node_drag(Id::new(node), Point::new(*x, *y))?;
            }
            Self::DragEnd => {
                if !state.on_drag_end() {
                    debug!("Drag end recorded nothing");
                }
            }
            Self::Reflow => {
                block_on(state.reflow());
            }
            Self::Undo => {
                if !state.undo() {
                    debug!("Nothing to undo");
                }
            }
            Self::Redo => {
                if !state.redo() {
                    debug!("Nothing to redo");
                }
            }
            Self::Load { positions } => {
                let positions: PositionMap = positions
                    .iter()
                    .map(|spec| (Id::new(&spec.node), Point::new(spec.x, spec.y)))
                    .collect();
                state.set_node_positions(&positions, PositionSource::Loaded)?;
            }
        }
        Ok(())
    }
}

impl NodeSpec {
    fn to_node(&self) -> GraphNode {
        let size = Size::new(
            self.width.unwrap_or(DEFAULT_NODE_SIZE.width()),
            self.height.unwrap_or(DEFAULT_NODE_SIZE.height()),
        );
        let node = GraphNode::new(self.id.as_str(), self.kind.as_str(), self.label.as_str())
            .with_size(size);
        match &self.parent {
            Some(parent) => node.with_parent(parent.as_str()),
            None => node,
        }
    }
}

impl EdgeSpec {
    fn to_edge(&self) -> GraphEdge {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.source, self.target));
        GraphEdge::new(id.as_str(), self.source.as_str(), self.target.as_str())
    }
}

/// Final state written by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutput {
    pub can_undo: bool,
    pub can_redo: bool,
    pub history_len: usize,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub id: Id,
    pub x: f32,
    pub y: f32,
    pub source: PositionSource,
}

impl SessionOutput {
    pub fn from_state<S: LayoutService>(state: &DiagramState<S>) -> Self {
        Self {
            can_undo: state.can_undo(),
            can_redo: state.can_redo(),
            history_len: state.history_len(),
            nodes: state
                .nodes()
                .map(|node| NodeOutput {
                    id: node.id(),
                    x: node.position().x(),
                    y: node.position().y(),
                    source: node.source(),
                })
                .collect(),
        }
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Output`] when serialization fails.
    pub fn to_toml(&self) -> Result<String, CliError> {
        toml::to_string(self).map_err(|err| CliError::Output(err.to_string()))
    }
}
