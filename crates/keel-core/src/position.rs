//! Position tables and their provenance.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{geometry::Point, identifier::Id};

/// Node id to top-left position.
///
/// Insertion order follows graph order where a table is derived from a graph.
/// Equality is order-independent.
pub type PositionMap = IndexMap<Id, Point>;

/// Where a node's current coordinates came from.
///
/// # Examples
///
/// ```
/// use keel_core::position::PositionSource;
///
/// assert_eq!(PositionSource::default(), PositionSource::Default);
/// assert_eq!(PositionSource::UserDragged.to_string(), "user-dragged");
/// assert!(PositionSource::Loaded.is_pinned());
/// assert!(!PositionSource::LayoutComputed.is_pinned());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionSource {
    /// Moved by the user.
    UserDragged,
    /// Placed by the automatic layout algorithm or its fallback.
    LayoutComputed,
    /// Restored from a saved document.
    Loaded,
    /// Applied from undo/redo history.
    Restored,
    /// Never placed.
    #[default]
    Default,
}

impl PositionSource {
    /// Returns the kebab-case tag of this source.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserDragged => "user-dragged",
            Self::LayoutComputed => "layout-computed",
            Self::Loaded => "loaded",
            Self::Restored => "restored",
            Self::Default => "default",
        }
    }

    /// Returns true for positions a person chose and layout must not move.
    pub fn is_pinned(self) -> bool {
        matches!(self, Self::UserDragged | Self::Loaded)
    }
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
