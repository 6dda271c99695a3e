//! Keel Core Types
//!
//! This crate provides the foundational types shared by the Keel layout engine
//! and its collaborators:
//!
//! - **Identifiers**: Interned node and edge ids ([`identifier::Id`])
//! - **Geometry**: Points, sizes and insets ([`geometry`] module)
//! - **Graph**: Graph revisions produced by importers ([`graph`] module)
//! - **Positions**: Position tables and provenance tags ([`position`] module)

pub mod geometry;
pub mod graph;
pub mod identifier;
pub mod position;
