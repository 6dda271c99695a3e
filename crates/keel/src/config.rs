//! Configuration types for the Keel layout engine.
//!
//! All types implement [`serde::Deserialize`] so collaborators can load them
//! from external sources. Every section and field falls back to its default.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining layout and history settings.
//! - [`LayoutConfig`] - Algorithm, flow direction, spacing and fallback placement.
//! - [`HistoryConfig`] - Bound on the undo/redo history.
//!
//! # Example
//!
//! ```
//! # use keel::config::AppConfig;
//! let config = AppConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.history().max_snapshots(), 50);
//! ```

use serde::Deserialize;

use crate::{
    error::KeelError,
    layout::{Algorithm, Direction, LayoutOptions},
};

/// Top-level configuration combining layout and history settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Layout configuration section.
    #[serde(default)]
    layout: LayoutConfig,

    /// History configuration section.
    #[serde(default)]
    history: HistoryConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(layout: LayoutConfig, history: HistoryConfig) -> Self {
        Self { layout, history }
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the history configuration.
    pub fn history(&self) -> &HistoryConfig {
        &self.history
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`KeelError::Config`] for negative or non-finite spacing,
    /// padding or margins, and for a history that can hold no snapshot.
    pub fn validate(&self) -> Result<(), KeelError> {
        self.layout.validate()?;
        self.history.validate()
    }
}

/// Layout algorithm, direction, spacing and fallback settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    algorithm: Algorithm,
    direction: Direction,
    /// Gap between neighbouring nodes of one layer.
    node_spacing: f32,
    /// Gap between consecutive layers.
    layer_spacing: f32,
    /// Padding between a group node's border and its children.
    group_padding: f32,
    /// Vertical gap used by the fallback placement.
    fallback_margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            direction: Direction::default(),
            node_spacing: 50.0,
            layer_spacing: 80.0,
            group_padding: 20.0,
            fallback_margin: 40.0,
        }
    }
}

impl LayoutConfig {
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_spacing(mut self, node_spacing: f32, layer_spacing: f32) -> Self {
        self.node_spacing = node_spacing;
        self.layer_spacing = layer_spacing;
        self
    }

    pub fn with_group_padding(mut self, padding: f32) -> Self {
        self.group_padding = padding;
        self
    }

    pub fn with_fallback_margin(mut self, margin: f32) -> Self {
        self.fallback_margin = margin;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn node_spacing(&self) -> f32 {
        self.node_spacing
    }

    pub fn layer_spacing(&self) -> f32 {
        self.layer_spacing
    }

    pub fn group_padding(&self) -> f32 {
        self.group_padding
    }

    pub fn fallback_margin(&self) -> f32 {
        self.fallback_margin
    }

    /// Returns the options forwarded to the layout service.
    pub fn options(&self) -> LayoutOptions {
        LayoutOptions::new(self.algorithm, self.direction)
            .with_spacing(self.node_spacing, self.layer_spacing)
    }

    fn validate(&self) -> Result<(), KeelError> {
        for (name, value) in [
            ("node_spacing", self.node_spacing),
            ("layer_spacing", self.layer_spacing),
            ("group_padding", self.group_padding),
            ("fallback_margin", self.fallback_margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(KeelError::Config(format!(
                    "layout.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Undo/redo history settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Oldest snapshots are evicted beyond this count.
    max_snapshots: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_snapshots: 50 }
    }
}

impl HistoryConfig {
    pub fn new(max_snapshots: usize) -> Self {
        Self { max_snapshots }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    fn validate(&self) -> Result<(), KeelError> {
        if self.max_snapshots == 0 {
            return Err(KeelError::Config(
                "history.max_snapshots must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        let layout = config.layout();
        assert_eq!(layout.algorithm(), Algorithm::Layered);
        assert_eq!(layout.direction(), Direction::Down);
        assert_eq!(layout.node_spacing(), 50.0);
        assert_eq!(layout.layer_spacing(), 80.0);
        assert_eq!(layout.group_padding(), 20.0);
        assert_eq!(layout.fallback_margin(), 40.0);
    }

    #[test]
    fn test_builders() {
        let layout = LayoutConfig::default()
            .with_algorithm(Algorithm::Grid)
            .with_direction(Direction::Right)
            .with_spacing(10.0, 20.0)
            .with_group_padding(5.0)
            .with_fallback_margin(15.0);
        assert_eq!(layout.algorithm(), Algorithm::Grid);
        assert_eq!(layout.direction(), Direction::Right);
        assert_eq!(layout.node_spacing(), 10.0);
        assert_eq!(layout.layer_spacing(), 20.0);
        assert_eq!(layout.group_padding(), 5.0);
        assert_eq!(layout.fallback_margin(), 15.0);

        let options = layout.options();
        assert_eq!(options.algorithm(), Algorithm::Grid);
        assert_eq!(options.node_spacing(), 10.0);
    }

    #[test]
    fn test_validate_rejects_negative_spacing() {
        let config = AppConfig::new(
            LayoutConfig::default().with_spacing(-1.0, 80.0),
            HistoryConfig::default(),
        );
        assert!(matches!(config.validate(), Err(KeelError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_nan_margin() {
        let config = AppConfig::new(
            LayoutConfig::default().with_fallback_margin(f32::NAN),
            HistoryConfig::default(),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_history() {
        let config = AppConfig::new(LayoutConfig::default(), HistoryConfig::new(0));
        assert!(matches!(config.validate(), Err(KeelError::Config(_))));
    }
}
