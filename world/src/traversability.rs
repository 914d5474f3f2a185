//! Per-mobility-class passability masks derived from terrain.

use std::collections::HashMap;

use civ_tactics_core::{
    CellCoord, GridDimensions, GridError, MobilityClass, Passability, PassabilityMask,
    TerrainType,
};
use thiserror::Error;

use crate::grid::GridMap;

/// Reasons a passability mask could not be produced for a query.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ResolveError {
    /// No mask was configured for the mobility class.
    #[error("no passability mask configured for {0:?}")]
    Unconfigured(MobilityClass),
    /// The class may not end a move on the destination terrain.
    #[error("{class:?} may not stop on {terrain:?}")]
    DestinationForbidden {
        /// Requested mobility class.
        class: MobilityClass,
        /// Terrain of the destination cell.
        terrain: TerrainType,
    },
    /// The destination lies outside the grid.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Passability masks computed once from the grid's terrain.
#[derive(Clone, Debug)]
pub struct TraversabilityResolver {
    dimensions: GridDimensions,
    terrain: Vec<TerrainType>,
    masks: HashMap<MobilityClass, PassabilityMask>,
}

impl TraversabilityResolver {
    /// Builds masks for every mobility class.
    #[must_use]
    pub fn from_grid(grid: &GridMap) -> Self {
        Self::with_classes(grid, &MobilityClass::ALL)
    }

    /// Builds masks for the listed classes only; other classes fail to resolve.
    #[must_use]
    pub fn with_classes(grid: &GridMap, classes: &[MobilityClass]) -> Self {
        let terrain: Vec<TerrainType> = grid
            .cells()
            .iter()
            .map(|cell| cell.terrain().kind())
            .collect();
        let dimensions = grid.dimensions();

        let masks = classes
            .iter()
            .map(|class| (*class, build_mask(*class, dimensions, &terrain)))
            .collect();

        Self {
            dimensions,
            terrain,
            masks,
        }
    }

    /// Reports whether a mask exists for the class.
    #[must_use]
    pub fn is_configured(&self, class: MobilityClass) -> bool {
        self.masks.contains_key(&class)
    }

    /// Unmodified mask stored for the class.
    pub fn mask(&self, class: MobilityClass) -> Result<&PassabilityMask, ResolveError> {
        self.masks
            .get(&class)
            .ok_or(ResolveError::Unconfigured(class))
    }

    /// Mask to search for a move of `class` ending at `goal`.
    ///
    /// The goal cell is always passable in the returned view.
    pub fn resolve(
        &self,
        class: MobilityClass,
        goal: CellCoord,
    ) -> Result<ResolvedMask<'_>, ResolveError> {
        self.dimensions.check(goal)?;
        let base = self.mask(class)?;

        let terrain = self
            .dimensions
            .index(goal)
            .and_then(|index| self.terrain.get(index).copied())
            .ok_or(GridError::OutOfBounds {
                cell: goal,
                height: self.dimensions.height(),
                width: self.dimensions.width(),
            })?;
        if !class.may_stop_on(terrain) {
            return Err(ResolveError::DestinationForbidden { class, terrain });
        }

        Ok(ResolvedMask { base, goal })
    }
}

fn build_mask(
    class: MobilityClass,
    dimensions: GridDimensions,
    terrain: &[TerrainType],
) -> PassabilityMask {
    match class {
        MobilityClass::GroundSimple => PassabilityMask::from_fn(dimensions, |cell| {
            dimensions
                .index(cell)
                .and_then(|index| terrain.get(index))
                .map_or(false, |kind| !kind.is_water())
        }),
        // No terrain in this ruleset is impassable to these classes.
        MobilityClass::GroundAmphibious
        | MobilityClass::WaterCapable
        | MobilityClass::FlightCapable => PassabilityMask::filled(dimensions, true),
    }
}

/// Stored mask with the destination cell forced passable.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedMask<'a> {
    base: &'a PassabilityMask,
    goal: CellCoord,
}

impl ResolvedMask<'_> {
    /// Destination the mask was resolved for.
    #[must_use]
    pub const fn goal(&self) -> CellCoord {
        self.goal
    }
}

impl Passability for ResolvedMask<'_> {
    fn dimensions(&self) -> GridDimensions {
        self.base.dimensions()
    }

    fn is_passable(&self, cell: CellCoord) -> bool {
        cell == self.goal || self.base.is_passable(cell)
    }
}
