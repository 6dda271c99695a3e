//! In-process layout service built on the Sugiyama method.
//!
//! Each sibling level of the request tree is laid out on its own: edges whose
//! endpoints live deeper in the tree are lifted to the sibling that contains
//! them, and children are placed inside their parent after the parent's
//! padding. Position hints are accepted but not used; stability comes from
//! the incremental engine restoring pinned positions afterwards.

use std::{collections::HashMap, panic};

use log::debug;
use rust_sugiyama::configure::Config;

use keel_core::{
    geometry::{Point, Size},
    identifier::Id,
};

use super::service::{
    Algorithm, Direction, LayoutOptions, LayoutRequest, LayoutResponse, LayoutService, PlacedNode,
    RequestEdge, RequestNode, ServiceError,
};

/// Tolerance used when grouping coordinates into columns and layers.
const COORDINATE_EPSILON: f64 = 1e-6;

/// Layout service running `rust-sugiyama` (layered) or a plain grid in process.
#[derive(Debug, Clone)]
pub struct LayeredService {
    /// Offset of the drawing from the origin.
    margin: f32,
}

impl Default for LayeredService {
    fn default() -> Self {
        Self::new()
    }
}

impl LayeredService {
    pub fn new() -> Self {
        Self { margin: 20.0 }
    }

    /// Set the offset of the top-level drawing from the origin
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    fn place_level(
        &self,
        siblings: &[RequestNode],
        edges: &[RequestEdge],
        options: &LayoutOptions,
        origin: Point,
    ) -> Result<Vec<PlacedNode>, ServiceError> {
        let lifted = lift_edges(siblings, edges);
        let positions = match options.algorithm() {
            Algorithm::Layered => layered_positions(siblings, &lifted, options)?,
            Algorithm::Grid => grid_positions(siblings, options),
        };

        siblings
            .iter()
            .zip(positions)
            .map(|(node, position)| {
                let children = self.place_level(
                    &node.children,
                    edges,
                    options,
                    node.padding.content_offset(),
                )?;
                Ok(PlacedNode {
                    id: node.id,
                    position: position.add_point(origin),
                    children,
                })
            })
            .collect()
    }
}

impl LayoutService for LayeredService {
    async fn layout(&self, request: &LayoutRequest) -> Result<LayoutResponse, ServiceError> {
        debug!(
            nodes = request.node_count(),
            edges = request.edges.len();
            "Running layered layout service"
        );
        let origin = Point::new(self.margin, self.margin);
        let nodes = self.place_level(&request.nodes, &request.edges, &request.options, origin)?;
        Ok(LayoutResponse { nodes })
    }
}

/// Maps every edge onto pairs of sibling indices, dropping self-loops and duplicates.
fn lift_edges(siblings: &[RequestNode], edges: &[RequestEdge]) -> Vec<(u32, u32)> {
    fn claim(node: &RequestNode, index: u32, owners: &mut HashMap<Id, u32>) {
        owners.insert(node.id, index);
        for child in &node.children {
            claim(child, index, owners);
        }
    }

    let mut owners = HashMap::new();
    for (index, node) in siblings.iter().enumerate() {
        claim(node, index as u32, &mut owners);
    }

    let mut lifted = Vec::new();
    for edge in edges {
        for source in &edge.sources {
            for target in &edge.targets {
                let (Some(&s), Some(&t)) = (owners.get(source), owners.get(target)) else {
                    continue;
                };
                if s != t && !lifted.contains(&(s, t)) {
                    lifted.push((s, t));
                }
            }
        }
    }
    lifted
}

/// Largest node size of a level, in the top-down frame.
fn cell_size(siblings: &[RequestNode], direction: Direction) -> Size {
    let cell = siblings
        .iter()
        .fold(Size::default(), |acc, node| acc.max(node.size));
    if direction.is_horizontal() {
        cell.transpose()
    } else {
        cell
    }
}

/// Turns (cross-axis slot, layer) pairs of a top-down drawing into positions
/// for the requested direction.
fn orient(slots: &[(usize, usize)], cell: Size, options: &LayoutOptions) -> Vec<Point> {
    let cross_step = cell.width() + options.node_spacing();
    let layer_step = cell.height() + options.layer_spacing();
    let max_layer = slots.iter().map(|&(_, layer)| layer).max().unwrap_or(0);

    slots
        .iter()
        .map(|&(slot, layer)| {
            let layer = match options.direction() {
                Direction::Down | Direction::Right => layer,
                Direction::Up | Direction::Left => max_layer - layer,
            };
            let point = Point::new(slot as f32 * cross_step, layer as f32 * layer_step);
            if options.direction().is_horizontal() {
                point.transpose()
            } else {
                point
            }
        })
        .collect()
}

fn grid_positions(siblings: &[RequestNode], options: &LayoutOptions) -> Vec<Point> {
    let columns = (siblings.len() as f64).sqrt().ceil().max(1.0) as usize;
    let slots: Vec<(usize, usize)> = (0..siblings.len())
        .map(|index| (index % columns, index / columns))
        .collect();
    orient(&slots, cell_size(siblings, options.direction()), options)
}

fn layered_positions(
    siblings: &[RequestNode],
    edges: &[(u32, u32)],
    options: &LayoutOptions,
) -> Result<Vec<Point>, ServiceError> {
    let mut slots: Vec<Option<(usize, usize)>> = vec![None; siblings.len()];
    let mut next_slot = 0;

    if !edges.is_empty() {
        debug!(
            nodes = siblings.len(),
            edges = edges.len();
            "Applying Sugiyama algorithm"
        );

        let owned_edges = edges.to_vec();
        let layouts = panic::catch_unwind(move || {
            let config = Config {
                minimum_length: 1,
                vertex_spacing: 3.0,
                ..Default::default()
            };
            rust_sugiyama::from_edges(&owned_edges, &config)
        })
        .map_err(|err| ServiceError::Panicked(panic_message(err.as_ref())))?;

        for (coords, _, _) in &layouts {
            let coords: HashMap<usize, (f64, f64)> = coords
                .iter()
                .map(|&(id, (x, y))| (id as usize, (x as f64, y as f64)))
                .collect();
            let flip = layers_point_upwards(&coords, edges);

            let columns = distinct_sorted(coords.values().map(|&(x, _)| x));
            let layers = distinct_sorted(
                coords
                    .values()
                    .map(|&(_, y)| if flip { -y } else { y }),
            );

            for (&index, &(x, y)) in &coords {
                let Some(slot) = slots.get_mut(index) else {
                    debug!(index; "Ignoring vertex outside of the request");
                    continue;
                };
                let y = if flip { -y } else { y };
                *slot = Some((next_slot + rank(&columns, x), rank(&layers, y)));
            }
            next_slot += columns.len();
        }
    }

    // Nodes without edges go to the first layer, after the components.
    let slots: Vec<(usize, usize)> = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                next_slot += 1;
                (next_slot - 1, 0)
            })
        })
        .collect();

    Ok(orient(&slots, cell_size(siblings, options.direction()), options))
}

/// Returns true when most edges point from a larger to a smaller y.
fn layers_point_upwards(coords: &HashMap<usize, (f64, f64)>, edges: &[(u32, u32)]) -> bool {
    let mut downwards = 0;
    let mut upwards = 0;
    for &(source, target) in edges {
        if let (Some(&(_, sy)), Some(&(_, ty))) =
            (coords.get(&(source as usize)), coords.get(&(target as usize)))
        {
            if sy < ty {
                downwards += 1;
            } else if sy > ty {
                upwards += 1;
            }
        }
    }
    upwards > downwards
}

fn distinct_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values.dedup_by(|a, b| (*a - *b).abs() < COORDINATE_EPSILON);
    values
}

fn rank(sorted: &[f64], value: f64) -> usize {
    sorted
        .iter()
        .position(|&candidate| (candidate - value).abs() < COORDINATE_EPSILON)
        .unwrap_or(0)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}
