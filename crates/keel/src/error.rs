//! Error types for Keel operations.
//!
//! Diffing, position resolution and history are total and never fail, and the
//! incremental layout engine absorbs layout service failures. The only errors
//! surfaced to callers are precondition violations rejected by
//! [`DiagramState`](crate::DiagramState) before it touches any state, and
//! invalid configuration.

use thiserror::Error;

use keel_core::identifier::Id;

/// The main error type for Keel operations.
#[derive(Debug, Error, PartialEq)]
pub enum KeelError {
    #[error("Unknown node: {0}")]
    UnknownNode(Id),

    #[error("Edge {edge} references unknown node {node}")]
    DanglingEdge { edge: Id, node: Id },

    #[error("Node {node} references unknown parent {parent}")]
    UnknownParent { node: Id, parent: Id },

    #[error("Node {0} is its own ancestor")]
    ParentCycle(Id),

    #[error("Configuration error: {0}")]
    Config(String),
}
