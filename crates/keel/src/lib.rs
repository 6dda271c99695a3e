//! Keel - Position stability and incremental layout for diagram editors.
//!
//! Keeps node coordinates stable across edits of a diagram graph while
//! delegating geometric placement to an automatic layout service. Four pieces
//! build on each other:
//!
//! - [`diff()`] classifies the nodes of a new graph revision against the previous one.
//! - [`resolve()`] decides which positions survive and which nodes need placement.
//! - [`layout::IncrementalLayoutEngine`] asks the layout service for the missing
//!   positions without moving pinned nodes.
//! - [`LayoutHistory`] keeps a bounded undo/redo history of position tables.
//!
//! [`DiagramState`] owns the live nodes and sequences these steps for graph
//! updates, drags, reflows, undo and redo.

pub mod config;
pub mod layout;

mod diff;
mod error;
mod history;
mod resolve;
mod state;

pub use keel_core::{geometry, graph, identifier, position};

pub use diff::{GraphDiff, diff};
pub use error::KeelError;
pub use history::{LayoutHistory, PositionSnapshot};
pub use resolve::{PositionResolution, resolve};
pub use state::{ComputedLayout, DiagramState, LayoutApplication, LiveNode, PendingLayout};
