#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tactical grid layer.
//!
//! This crate defines the vocabulary that connects adapters, the
//! authoritative world, and the pure systems. Adapters and scheduled tasks
//! submit [`Command`] values describing desired mutations, the world executes
//! those commands via its `apply` entry point, and then journals [`Event`]
//! values that report what actually changed. Systems query immutable views,
//! such as a [`PassabilityMask`], and respond with new command batches.

use std::{
    fmt,
    ops::{Add, Sub},
};

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a single grid cell expressed as `x` and `y` indices.
///
/// `x` runs along the grid height and `y` along the grid width, so an
/// in-bounds coordinate satisfies `0 <= x < height` and `0 <= y < width`.
/// Components are signed so that offsets and differences can be expressed
/// with the same type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    x: i32,
    y: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Index along the grid height.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Index along the grid width.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Reports whether `other` differs by exactly one step along exactly one axis.
    #[must_use]
    pub fn is_adjacent(self, other: CellCoord) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// The four axis-aligned neighbours in `+x`, `-x`, `+y`, `-y` order.
    ///
    /// Neighbours are not bounds checked.
    #[must_use]
    pub fn neighbors(self) -> [CellCoord; 4] {
        [
            self + IVec2::X,
            self + IVec2::NEG_X,
            self + IVec2::Y,
            self + IVec2::NEG_Y,
        ]
    }

    /// Coordinate displaced by `offset`, or `None` when a component overflows.
    #[must_use]
    pub fn checked_offset(self, offset: IVec2) -> Option<CellCoord> {
        Some(CellCoord::new(
            self.x.checked_add(offset.x)?,
            self.y.checked_add(offset.y)?,
        ))
    }

    /// Formats the coordinate on two lines, as drawn on cell labels.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}\n{}", self.x, self.y)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Add for CellCoord {
    type Output = CellCoord;

    fn add(self, rhs: CellCoord) -> CellCoord {
        CellCoord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for CellCoord {
    type Output = CellCoord;

    fn sub(self, rhs: CellCoord) -> CellCoord {
        CellCoord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<IVec2> for CellCoord {
    type Output = CellCoord;

    fn add(self, rhs: IVec2) -> CellCoord {
        CellCoord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub<IVec2> for CellCoord {
    type Output = CellCoord;

    fn sub(self, rhs: IVec2) -> CellCoord {
        CellCoord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(i32, i32)> for CellCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<IVec2> for CellCoord {
    fn from(vector: IVec2) -> Self {
        Self::new(vector.x, vector.y)
    }
}

impl From<CellCoord> for IVec2 {
    fn from(cell: CellCoord) -> Self {
        IVec2::new(cell.x, cell.y)
    }
}

/// Fixed dimensions of a rectangular grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDimensions {
    height: u32,
    width: u32,
}

impl GridDimensions {
    /// Creates a new dimensions descriptor.
    #[must_use]
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Number of cells along the `x` axis.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells along the `y` axis.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Total number of cells contained in the grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let count = u64::from(self.height) * u64::from(self.width);
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    /// Reports whether the grid contains no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Reports whether the coordinate lies inside the grid bounds.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        u32::try_from(cell.x()).map_or(false, |x| x < self.height)
            && u32::try_from(cell.y()).map_or(false, |y| y < self.width)
    }

    /// Row-major offset of the coordinate, or `None` when it lies outside the grid.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let x = usize::try_from(cell.x()).ok()?;
        let y = usize::try_from(cell.y()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        x.checked_mul(width)?.checked_add(y)
    }

    /// Coordinate stored at the provided row-major offset.
    #[must_use]
    pub fn coord_at(&self, index: usize) -> Option<CellCoord> {
        if index >= self.cell_count() {
            return None;
        }
        let width = usize::try_from(self.width).ok()?;
        let x = i32::try_from(index / width).ok()?;
        let y = i32::try_from(index % width).ok()?;
        Some(CellCoord::new(x, y))
    }

    /// Iterator over every coordinate in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = CellCoord> {
        let dimensions = *self;
        (0..dimensions.cell_count()).filter_map(move |index| dimensions.coord_at(index))
    }

    /// Fails with [`GridError::OutOfBounds`] when the coordinate lies outside the grid.
    pub fn check(&self, cell: CellCoord) -> Result<(), GridError> {
        if self.contains(cell) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                cell,
                height: self.height,
                width: self.width,
            })
        }
    }
}

/// Errors raised by grid construction and grid queries.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum GridError {
    /// A grid must contain at least one cell along each axis.
    #[error("grid dimensions {height}x{width} contain no cells")]
    InvalidDimensions {
        /// Requested height.
        height: u32,
        /// Requested width.
        width: u32,
    },
    /// Cell spacing must be a finite, strictly positive length.
    #[error("cell spacing {0} must be finite and positive")]
    InvalidSpacing(f32),
    /// The coordinate lies outside `[0, height) x [0, width)`.
    #[error("cell {cell} lies outside the {height}x{width} grid")]
    OutOfBounds {
        /// Offending coordinate.
        cell: CellCoord,
        /// Grid height.
        height: u32,
        /// Grid width.
        width: u32,
    },
}

/// Terrain classification assigned to every cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainType {
    /// Arid open ground.
    Desert,
    /// Open water, impassable to ground-only units.
    Water,
    /// High ground.
    Mountain,
    /// Open fertile ground.
    Grassland,
    /// Wooded ground.
    Forest,
}

impl TerrainType {
    /// Every terrain classification in declaration order.
    pub const ALL: [TerrainType; 5] = [
        Self::Desert,
        Self::Water,
        Self::Mountain,
        Self::Grassland,
        Self::Forest,
    ];

    /// Single-character symbol used by textual terrain layouts.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Desert => 'D',
            Self::Water => 'W',
            Self::Mountain => 'M',
            Self::Grassland => 'G',
            Self::Forest => 'F',
        }
    }

    /// Parses a layout symbol, accepting either case.
    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|terrain| terrain.symbol() == symbol.to_ascii_uppercase())
    }

    /// Reports whether the terrain is water.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Water)
    }
}

/// Static resource attributes implied by a cell's terrain.
///
/// The tactical core never reads these values; they are carried for the
/// economy layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainYield {
    /// Production points.
    pub production: u32,
    /// Trade points.
    pub trade: u32,
    /// Culture points.
    pub culture: u32,
    /// Coin points.
    pub coin: u32,
}

/// Terrain classification together with its resource attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Terrain {
    kind: TerrainType,
    yields: TerrainYield,
}

impl Terrain {
    /// Creates terrain of the provided kind with explicit yields.
    #[must_use]
    pub const fn new(kind: TerrainType, yields: TerrainYield) -> Self {
        Self { kind, yields }
    }

    /// Terrain classification.
    #[must_use]
    pub const fn kind(&self) -> TerrainType {
        self.kind
    }

    /// Resource attributes of the terrain.
    #[must_use]
    pub const fn yields(&self) -> TerrainYield {
        self.yields
    }
}

impl From<TerrainType> for Terrain {
    fn from(kind: TerrainType) -> Self {
        Self::new(kind, TerrainYield::default())
    }
}

/// Movement capability category that decides which terrain a unit may enter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityClass {
    /// Ground unit that cannot enter water.
    GroundSimple,
    /// Ground unit able to cross water on the way but not stop in it.
    GroundAmphibious,
    /// Unit able to stay in water.
    WaterCapable,
    /// Flying unit.
    FlightCapable,
}

impl MobilityClass {
    /// Every mobility class in declaration order.
    pub const ALL: [MobilityClass; 4] = [
        Self::GroundSimple,
        Self::GroundAmphibious,
        Self::WaterCapable,
        Self::FlightCapable,
    ];

    /// Reports whether a unit of this class may end its move on the terrain.
    #[must_use]
    pub const fn may_stop_on(self, terrain: TerrainType) -> bool {
        match self {
            Self::GroundSimple | Self::GroundAmphibious => !terrain.is_water(),
            Self::WaterCapable | Self::FlightCapable => true,
        }
    }
}

/// Unique identifier assigned to a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Creates a new unit identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of the faction that owns a unit ("belonging").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(u32);

impl OwnerId {
    /// Creates a new owner identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Read-only passability query consumed by the pathfinder.
pub trait Passability {
    /// Dimensions of the searched grid.
    fn dimensions(&self) -> GridDimensions;

    /// Reports whether the cell may be entered. Out-of-bounds cells are never passable.
    fn is_passable(&self, cell: CellCoord) -> bool;
}

/// Dense boolean grid marking which cells a mobility class may enter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassabilityMask {
    dimensions: GridDimensions,
    cells: Vec<bool>,
}

impl PassabilityMask {
    /// Creates a mask where every cell carries the same value.
    #[must_use]
    pub fn filled(dimensions: GridDimensions, passable: bool) -> Self {
        Self {
            dimensions,
            cells: vec![passable; dimensions.cell_count()],
        }
    }

    /// Creates a mask by evaluating `passable` for every cell in row-major order.
    #[must_use]
    pub fn from_fn<F>(dimensions: GridDimensions, mut passable: F) -> Self
    where
        F: FnMut(CellCoord) -> bool,
    {
        Self {
            dimensions,
            cells: dimensions.coords().map(&mut passable).collect(),
        }
    }

    /// Overrides the passability of a single cell.
    pub fn set(&mut self, cell: CellCoord, passable: bool) -> Result<(), GridError> {
        self.dimensions.check(cell)?;
        if let Some(slot) = self
            .dimensions
            .index(cell)
            .and_then(|index| self.cells.get_mut(index))
        {
            *slot = passable;
        }
        Ok(())
    }

    /// Number of passable cells in the mask.
    #[must_use]
    pub fn passable_count(&self) -> usize {
        self.cells.iter().filter(|passable| **passable).count()
    }
}

impl Passability for PassabilityMask {
    fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    fn is_passable(&self, cell: CellCoord) -> bool {
        self.dimensions
            .index(cell)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(false)
    }
}

/// Maximum and minimum world-space extents of the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldBorders {
    min: Vec2,
    max: Vec2,
}

impl WorldBorders {
    /// Creates borders from explicit extents.
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Lower world-space extent.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Upper world-space extent.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Clamps a world-space point into the borders, as camera movers do.
    #[must_use]
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min, self.max)
    }
}

/// Phase of the interactive move command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SelectionPhase {
    /// No move command is in progress.
    #[default]
    Idle,
    /// A unit is selected and the player is choosing its destination.
    WaitingForDestination {
        /// Unit that will be moved.
        unit: UnitId,
        /// Cell the unit occupied when it was selected.
        origin: CellCoord,
    },
    /// The selected unit is travelling along the committed path.
    AnimatingMove {
        /// Unit that is moving.
        unit: UnitId,
    },
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Places a new unit onto a cell.
    PlaceUnit {
        /// Mobility class of the unit.
        mobility: MobilityClass,
        /// Faction that owns the unit.
        owner: OwnerId,
        /// Cell that receives the unit.
        cell: CellCoord,
    },
    /// Moves a unit's occupancy from its current cell to `to` and snaps its position there.
    RelocateUnit {
        /// Unit being relocated.
        unit: UnitId,
        /// Destination cell.
        to: CellCoord,
    },
    /// Relocates a unit by an integer offset from its current cell.
    ShiftUnit {
        /// Unit being relocated.
        unit: UnitId,
        /// Offset applied to the unit's cell.
        offset: IVec2,
    },
    /// Updates a unit's world-space position without touching occupancy.
    SetUnitPosition {
        /// Unit being repositioned.
        unit: UnitId,
        /// New world-space position.
        position: Vec2,
    },
    /// Highlights a cell.
    Mark {
        /// Cell to highlight.
        cell: CellCoord,
    },
    /// Clears every highlight.
    UnmarkAll,
}

/// Events journaled by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Confirms that a unit was placed.
    UnitPlaced {
        /// Identifier allocated to the unit.
        unit: UnitId,
        /// Faction that owns the unit.
        owner: OwnerId,
        /// Mobility class of the unit.
        mobility: MobilityClass,
        /// Cell the unit occupies.
        cell: CellCoord,
    },
    /// Reports that a placement request was rejected.
    UnitPlacementRejected {
        /// Requested cell.
        cell: CellCoord,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Confirms that a unit's occupancy moved between two cells.
    UnitRelocated {
        /// Unit that moved.
        unit: UnitId,
        /// Cell the unit occupied before moving.
        from: CellCoord,
        /// Cell the unit occupies after moving.
        to: CellCoord,
    },
    /// Reports that a relocation or repositioning request was rejected.
    UnitRelocationRejected {
        /// Unit targeted by the request.
        unit: UnitId,
        /// Specific reason the request failed.
        reason: RelocationError,
    },
    /// A unit entered a cell already held by a different faction.
    ///
    /// This is the combat trigger point; combat resolution subscribes here.
    ConflictTriggered {
        /// Contested cell.
        cell: CellCoord,
        /// Faction that established the cell's belonging.
        incumbent: OwnerId,
        /// Faction of the arriving unit.
        challenger: OwnerId,
        /// Arriving unit.
        unit: UnitId,
    },
    /// Confirms that a cell was highlighted.
    CellMarked {
        /// Highlighted cell.
        cell: CellCoord,
    },
    /// Reports that a highlight request named a cell outside the grid.
    MarkRejected {
        /// Requested cell.
        cell: CellCoord,
    },
    /// Confirms that every highlight was cleared.
    MarksCleared,
}

/// Reasons a unit placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementError {
    /// The requested cell lies outside the grid.
    OutOfBounds,
}

/// Reasons a relocation request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelocationError {
    /// No unit with the provided identifier exists.
    MissingUnit,
    /// The destination lies outside the grid.
    OutOfBounds,
}
