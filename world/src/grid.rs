//! Fixed rectangular cell grid with per-cell terrain and occupancy.

use civ_tactics_core::{
    CellCoord, GridDimensions, GridError, OwnerId, Terrain, UnitId, WorldBorders,
};
use glam::Vec2;

use crate::terrain::TerrainSource;

/// Dense row-major grid of terrain cells.
///
/// Dimensions and terrain are fixed at construction; only occupancy changes
/// afterwards.
#[derive(Clone, Debug)]
pub struct GridMap {
    dimensions: GridDimensions,
    spacing: f32,
    cells: Vec<Cell>,
}

impl GridMap {
    /// Allocates every cell and asks `source` for its terrain in row-major order.
    pub fn initialize(
        dimensions: GridDimensions,
        spacing: f32,
        source: &mut dyn TerrainSource,
    ) -> Result<Self, GridError> {
        if dimensions.is_empty() {
            return Err(GridError::InvalidDimensions {
                height: dimensions.height(),
                width: dimensions.width(),
            });
        }
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(GridError::InvalidSpacing(spacing));
        }

        let cells = dimensions
            .coords()
            .map(|coord| Cell::new(coord, source.terrain_at(coord)))
            .collect();

        Ok(Self {
            dimensions,
            spacing,
            cells,
        })
    }

    /// Dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Distance between neighbouring cell centres in world units.
    #[must_use]
    pub const fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Cell stored at the coordinate.
    pub fn cell_at(&self, coord: CellCoord) -> Result<&Cell, GridError> {
        self.dimensions.check(coord)?;
        self.dimensions
            .index(coord)
            .and_then(|index| self.cells.get(index))
            .ok_or(GridError::OutOfBounds {
                cell: coord,
                height: self.dimensions.height(),
                width: self.dimensions.width(),
            })
    }

    pub(crate) fn cell_at_mut(&mut self, coord: CellCoord) -> Result<&mut Cell, GridError> {
        self.dimensions.check(coord)?;
        let out_of_bounds = GridError::OutOfBounds {
            cell: coord,
            height: self.dimensions.height(),
            width: self.dimensions.width(),
        };
        match self.dimensions.index(coord) {
            Some(index) => self.cells.get_mut(index).ok_or(out_of_bounds),
            None => Err(out_of_bounds),
        }
    }

    /// Every cell in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// World-space extents derived from spacing and dimensions.
    #[must_use]
    pub fn world_borders(&self) -> WorldBorders {
        WorldBorders::new(
            Vec2::ZERO,
            Vec2::new(
                self.dimensions.height() as f32 * self.spacing,
                self.dimensions.width() as f32 * self.spacing,
            ),
        )
    }

    /// Converts a grid coordinate into the world-space position of its centre.
    #[must_use]
    pub fn to_world_position(&self, coord: CellCoord) -> Vec2 {
        Vec2::new(
            coord.x() as f32 * self.spacing,
            coord.y() as f32 * self.spacing,
        )
    }

    /// Converts a sequence of grid coordinates into world-space positions.
    #[must_use]
    pub fn to_world_positions(&self, coords: &[CellCoord]) -> Vec<Vec2> {
        coords
            .iter()
            .map(|coord| self.to_world_position(*coord))
            .collect()
    }

    /// Converts a world-space position back into the nearest in-bounds grid coordinate.
    pub fn to_cell_coord(&self, position: Vec2) -> Result<CellCoord, GridError> {
        let scaled = (position / self.spacing).round();
        let coord = CellCoord::new(scaled.x as i32, scaled.y as i32);
        self.dimensions.check(coord)?;
        Ok(coord)
    }
}

/// Outcome of adding a unit to a cell's occupancy list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OccupancyChange {
    /// The cell was empty; the unit's owner now holds the cell.
    Established,
    /// The unit joined occupants of the same faction.
    Joined,
    /// The unit entered a cell held by a different faction.
    Contact {
        /// Faction holding the cell.
        incumbent: OwnerId,
    },
}

/// Single grid cell carrying terrain and the ordered list of occupying units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    coord: CellCoord,
    terrain: Terrain,
    occupants: Vec<UnitId>,
    belonging: Option<OwnerId>,
}

impl Cell {
    fn new(coord: CellCoord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            occupants: Vec::new(),
            belonging: None,
        }
    }

    /// Coordinate identifying the cell.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Terrain assigned at grid construction.
    #[must_use]
    pub const fn terrain(&self) -> Terrain {
        self.terrain
    }

    /// Units occupying the cell in arrival order.
    #[must_use]
    pub fn occupants(&self) -> &[UnitId] {
        &self.occupants
    }

    /// Faction holding the cell, if any unit occupies it.
    #[must_use]
    pub const fn belonging(&self) -> Option<OwnerId> {
        self.belonging
    }

    /// Reports whether any unit occupies the cell.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        !self.occupants.is_empty()
    }

    pub(crate) fn add_occupant(&mut self, unit: UnitId, owner: OwnerId) -> OccupancyChange {
        let change = match self.belonging {
            None => {
                self.belonging = Some(owner);
                OccupancyChange::Established
            }
            Some(incumbent) if incumbent == owner => OccupancyChange::Joined,
            Some(incumbent) => OccupancyChange::Contact { incumbent },
        };
        self.occupants.push(unit);
        change
    }

    pub(crate) fn remove_occupant(&mut self, unit: UnitId) -> bool {
        let Some(position) = self.occupants.iter().position(|occupant| *occupant == unit) else {
            return false;
        };
        let _ = self.occupants.remove(position);
        if self.occupants.is_empty() {
            self.belonging = None;
        }
        true
    }
}
