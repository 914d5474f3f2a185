#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! A* search over a passability mask on a 4-connected, uniform-cost grid.
//!
//! Search nodes live in a flat arena and reference their predecessor by
//! index. Among open nodes with equal `f = g + h` the earliest discovered one
//! is expanded first, so a fixed input always yields the same path.

use std::{cmp::Reverse, collections::BinaryHeap};

use civ_tactics_core::{CellCoord, GridDimensions, GridError, Passability};
use tracing::debug;

const STEP_COST: u32 = 1;

/// Ordered waypoints from the search start to its goal, both inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    waypoints: Vec<CellCoord>,
}

impl Path {
    /// Every waypoint in travel order.
    #[must_use]
    pub fn waypoints(&self) -> &[CellCoord] {
        &self.waypoints
    }

    /// Number of unit steps along the path.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.waypoints.len().saturating_sub(1)
    }

    /// First waypoint.
    #[must_use]
    pub fn start(&self) -> Option<CellCoord> {
        self.waypoints.first().copied()
    }

    /// Last waypoint.
    #[must_use]
    pub fn goal(&self) -> Option<CellCoord> {
        self.waypoints.last().copied()
    }

    /// Consumes the path, yielding its waypoints.
    #[must_use]
    pub fn into_waypoints(self) -> Vec<CellCoord> {
        self.waypoints
    }
}

#[derive(Clone, Copy, Debug)]
struct PathNode {
    cell: CellCoord,
    g: u32,
    h: u32,
    parent: Option<usize>,
}

impl PathNode {
    fn f(&self) -> u32 {
        self.g + self.h
    }
}

/// Reusable search workspace.
///
/// Buffers are reset, not reallocated, between searches over grids of the
/// same size. Nothing else carries over from one search to the next.
#[derive(Debug, Default)]
pub struct PathSearch {
    dimensions: Option<GridDimensions>,
    nodes: Vec<PathNode>,
    slots: Vec<Option<usize>>,
    closed: Vec<bool>,
    open: BinaryHeap<Reverse<(u32, usize)>>,
    expanded: usize,
}

impl PathSearch {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes expanded by the most recent search.
    #[must_use]
    pub fn expanded(&self) -> usize {
        self.expanded
    }

    /// Finds a shortest path from `start` to `goal` through cells the mask marks passable.
    ///
    /// Returns `Ok(None)` when the goal cannot be reached. The start cell
    /// itself is not required to be passable.
    pub fn find_path<M>(
        &mut self,
        mask: &M,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Option<Path>, GridError>
    where
        M: Passability + ?Sized,
    {
        let dimensions = mask.dimensions();
        dimensions.check(start)?;
        dimensions.check(goal)?;
        self.reset(dimensions);

        let start_node = self.discover(dimensions, start, 0, goal, None);
        self.open.push(Reverse((self.nodes[start_node].f(), start_node)));

        while let Some(Reverse((f, node_index))) = self.open.pop() {
            let node = self.nodes[node_index];
            if f != node.f() {
                continue;
            }
            let Some(cell_index) = dimensions.index(node.cell) else {
                continue;
            };
            if self.closed[cell_index] {
                continue;
            }

            if node.cell == goal {
                let path = self.reconstruct(node_index);
                debug!(
                    %start,
                    %goal,
                    steps = path.step_count(),
                    expanded = self.expanded,
                    "path found"
                );
                return Ok(Some(path));
            }

            self.closed[cell_index] = true;
            self.expanded += 1;

            for neighbor in node.cell.neighbors() {
                let Some(neighbor_index) = dimensions.index(neighbor) else {
                    continue;
                };
                if self.closed[neighbor_index] || !mask.is_passable(neighbor) {
                    continue;
                }

                let g = node.g + STEP_COST;
                let slot = self.slots[neighbor_index];
                match slot {
                    None => {
                        let discovered =
                            self.discover(dimensions, neighbor, g, goal, Some(node_index));
                        self.open.push(Reverse((self.nodes[discovered].f(), discovered)));
                    }
                    Some(existing) if g < self.nodes[existing].g => {
                        let entry = &mut self.nodes[existing];
                        entry.g = g;
                        entry.parent = Some(node_index);
                        self.open.push(Reverse((entry.f(), existing)));
                    }
                    Some(_) => {}
                }
            }
        }

        debug!(%start, %goal, expanded = self.expanded, "no path");
        Ok(None)
    }

    fn reset(&mut self, dimensions: GridDimensions) {
        let cell_count = dimensions.cell_count();
        if self.dimensions != Some(dimensions) {
            self.slots = vec![None; cell_count];
            self.closed = vec![false; cell_count];
            self.dimensions = Some(dimensions);
        } else {
            self.slots.fill(None);
            self.closed.fill(false);
        }
        self.nodes.clear();
        self.open.clear();
        self.expanded = 0;
    }

    fn discover(
        &mut self,
        dimensions: GridDimensions,
        cell: CellCoord,
        g: u32,
        goal: CellCoord,
        parent: Option<usize>,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(PathNode {
            cell,
            g,
            h: cell.manhattan_distance(goal),
            parent,
        });
        if let Some(slot) = dimensions
            .index(cell)
            .and_then(|cell_index| self.slots.get_mut(cell_index))
        {
            *slot = Some(index);
        }
        index
    }

    fn reconstruct(&self, goal_node: usize) -> Path {
        let mut waypoints = Vec::new();
        let mut cursor = Some(goal_node);
        while let Some(index) = cursor {
            let node = self.nodes[index];
            waypoints.push(node.cell);
            cursor = node.parent;
        }
        waypoints.reverse();
        Path { waypoints }
    }
}

/// Runs a single search in a fresh workspace.
pub fn find_path<M>(
    mask: &M,
    start: CellCoord,
    goal: CellCoord,
) -> Result<Option<Path>, GridError>
where
    M: Passability + ?Sized,
{
    PathSearch::new().find_path(mask, start, goal)
}
