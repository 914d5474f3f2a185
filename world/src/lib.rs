#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative tactical world state: terrain grid, units, occupancy and highlights.

mod grid;
mod terrain;
mod traversability;

use std::collections::BTreeMap;

use civ_tactics_core::{
    CellCoord, Command, Event, MobilityClass, OwnerId, PlacementError, RelocationError,
    SelectionPhase, UnitId,
};
use glam::Vec2;
use tracing::{debug, info, warn};

pub use grid::{Cell, GridMap, OccupancyChange};
pub use terrain::{
    SeededTerrain, TerrainConfig, TerrainError, TerrainLayout, TerrainSource, TerrainYieldTable,
    UniformTerrain,
};
pub use traversability::{ResolveError, ResolvedMask, TraversabilityResolver};

/// Unit standing on the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    id: UnitId,
    owner: OwnerId,
    mobility: MobilityClass,
    cell: CellCoord,
    position: Vec2,
}

impl Unit {
    /// Identifier allocated by the world.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Faction that owns the unit.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Mobility class of the unit.
    #[must_use]
    pub const fn mobility(&self) -> MobilityClass {
        self.mobility
    }

    /// Cell whose occupancy list contains the unit.
    ///
    /// While a move is animating this remains the origin cell until arrival.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Current world-space position of the unit.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }
}

/// Represents the authoritative tactical world state.
#[derive(Debug)]
pub struct World {
    grid: GridMap,
    resolver: TraversabilityResolver,
    units: BTreeMap<UnitId, Unit>,
    next_unit_id: u32,
    marked: Vec<CellCoord>,
}

impl World {
    /// Creates a world over the grid with masks for every mobility class.
    #[must_use]
    pub fn new(grid: GridMap) -> Self {
        let resolver = TraversabilityResolver::from_grid(&grid);
        Self::with_resolver(grid, resolver)
    }

    /// Creates a world that only resolves the listed mobility classes.
    #[must_use]
    pub fn with_mobility_classes(grid: GridMap, classes: &[MobilityClass]) -> Self {
        let resolver = TraversabilityResolver::with_classes(&grid, classes);
        Self::with_resolver(grid, resolver)
    }

    fn with_resolver(grid: GridMap, resolver: TraversabilityResolver) -> Self {
        Self {
            grid,
            resolver,
            units: BTreeMap::new(),
            next_unit_id: 0,
            marked: Vec::new(),
        }
    }

    fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId::new(self.next_unit_id);
        self.next_unit_id = self.next_unit_id.saturating_add(1);
        id
    }

    fn place_unit(
        &mut self,
        mobility: MobilityClass,
        owner: OwnerId,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) {
        if !self.grid.dimensions().contains(cell) {
            out_events.push(Event::UnitPlacementRejected {
                cell,
                reason: PlacementError::OutOfBounds,
            });
            return;
        }

        let id = self.allocate_unit_id();
        let unit = Unit {
            id,
            owner,
            mobility,
            cell,
            position: self.grid.to_world_position(cell),
        };
        let _ = self.units.insert(id, unit);
        info!(unit = id.get(), owner = owner.get(), %cell, ?mobility, "unit placed");
        out_events.push(Event::UnitPlaced {
            unit: id,
            owner,
            mobility,
            cell,
        });
        self.enter_cell(id, owner, cell, out_events);
    }

    fn relocate_unit(&mut self, unit_id: UnitId, to: CellCoord, out_events: &mut Vec<Event>) {
        let Some(unit) = self.units.get(&unit_id) else {
            out_events.push(Event::UnitRelocationRejected {
                unit: unit_id,
                reason: RelocationError::MissingUnit,
            });
            return;
        };
        if !self.grid.dimensions().contains(to) {
            out_events.push(Event::UnitRelocationRejected {
                unit: unit_id,
                reason: RelocationError::OutOfBounds,
            });
            return;
        }

        let from = unit.cell;
        let owner = unit.owner;
        let position = self.grid.to_world_position(to);
        if let Some(unit) = self.units.get_mut(&unit_id) {
            unit.cell = to;
            unit.position = position;
        }

        if from != to {
            if let Ok(origin) = self.grid.cell_at_mut(from) {
                let _ = origin.remove_occupant(unit_id);
            }
            self.enter_cell(unit_id, owner, to, out_events);
        }

        info!(unit = unit_id.get(), %from, %to, "unit relocated");
        out_events.push(Event::UnitRelocated {
            unit: unit_id,
            from,
            to,
        });
    }

    fn enter_cell(
        &mut self,
        unit: UnitId,
        owner: OwnerId,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) {
        let Ok(target) = self.grid.cell_at_mut(cell) else {
            return;
        };
        if let OccupancyChange::Contact { incumbent } = target.add_occupant(unit, owner) {
            warn!(
                %cell,
                incumbent = incumbent.get(),
                challenger = owner.get(),
                "conflicting factions share a cell"
            );
            out_events.push(Event::ConflictTriggered {
                cell,
                incumbent,
                challenger: owner,
                unit,
            });
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::PlaceUnit {
            mobility,
            owner,
            cell,
        } => world.place_unit(mobility, owner, cell, out_events),
        Command::RelocateUnit { unit, to } => world.relocate_unit(unit, to, out_events),
        Command::ShiftUnit { unit, offset } => {
            let Some(from) = world.units.get(&unit).map(Unit::cell) else {
                out_events.push(Event::UnitRelocationRejected {
                    unit,
                    reason: RelocationError::MissingUnit,
                });
                return;
            };
            let Some(to) = from.checked_offset(offset) else {
                out_events.push(Event::UnitRelocationRejected {
                    unit,
                    reason: RelocationError::OutOfBounds,
                });
                return;
            };
            world.relocate_unit(unit, to, out_events);
        }
        Command::SetUnitPosition { unit, position } => match world.units.get_mut(&unit) {
            Some(entry) => entry.position = position,
            None => out_events.push(Event::UnitRelocationRejected {
                unit,
                reason: RelocationError::MissingUnit,
            }),
        },
        Command::Mark { cell } => {
            if !world.grid.dimensions().contains(cell) {
                out_events.push(Event::MarkRejected { cell });
                return;
            }
            if !world.marked.contains(&cell) {
                world.marked.push(cell);
            }
            out_events.push(Event::CellMarked { cell });
        }
        Command::UnmarkAll => {
            debug!(count = world.marked.len(), "clearing highlights");
            world.marked.clear();
            out_events.push(Event::MarksCleared);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use civ_tactics_core::{CellCoord, GridError, MobilityClass, UnitId, WorldBorders};
    use glam::Vec2;

    use super::{Cell, GridMap, ResolveError, ResolvedMask, Unit, World};

    /// Provides read-only access to the terrain grid.
    #[must_use]
    pub fn grid(world: &World) -> &GridMap {
        &world.grid
    }

    /// Cell stored at the coordinate.
    pub fn cell_at(world: &World, coord: CellCoord) -> Result<&Cell, GridError> {
        world.grid.cell_at(coord)
    }

    /// World-space extents of the grid.
    #[must_use]
    pub fn world_borders(world: &World) -> WorldBorders {
        world.grid.world_borders()
    }

    /// World-space position of a grid coordinate.
    #[must_use]
    pub fn to_world_position(world: &World, coord: CellCoord) -> Vec2 {
        world.grid.to_world_position(coord)
    }

    /// Unit registered under the identifier.
    #[must_use]
    pub fn unit(world: &World, unit: UnitId) -> Option<&Unit> {
        world.units.get(&unit)
    }

    /// Every unit in identifier order.
    pub fn units(world: &World) -> impl Iterator<Item = &Unit> {
        world.units.values()
    }

    /// Units occupying the cell in arrival order.
    pub fn units_at(world: &World, coord: CellCoord) -> Result<&[UnitId], GridError> {
        world.grid.cell_at(coord).map(Cell::occupants)
    }

    /// Highlighted cells in marking order.
    #[must_use]
    pub fn marked_cells(world: &World) -> &[CellCoord] {
        &world.marked
    }

    /// Passability view for a move of `class` ending at `goal`.
    pub fn resolve_passability(
        world: &World,
        class: MobilityClass,
        goal: CellCoord,
    ) -> Result<ResolvedMask<'_>, ResolveError> {
        world.resolver.resolve(class, goal)
    }
}

/// World state together with the journal of events it emitted.
///
/// Scheduled tasks receive the stage on every tick and mutate the world
/// exclusively through [`Stage::apply`].
#[derive(Debug)]
pub struct Stage {
    world: World,
    events: Vec<Event>,
    selection: SelectionPhase,
}

impl Stage {
    /// Wraps the world with an empty journal and an idle selection.
    #[must_use]
    pub fn new(world: World) -> Self {
        Self {
            world,
            events: Vec::new(),
            selection: SelectionPhase::Idle,
        }
    }

    /// Read-only access to the world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Applies the command and journals the resulting events.
    pub fn apply(&mut self, command: Command) {
        apply(&mut self.world, command, &mut self.events);
    }

    /// Events journaled since the last drain.
    ///
    /// The journal is unbounded; owners drain it once per frame.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Removes and returns every journaled event.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Current phase of the interactive move command.
    #[must_use]
    pub const fn selection_phase(&self) -> SelectionPhase {
        self.selection
    }

    /// Records the phase of the interactive move command.
    pub fn set_selection_phase(&mut self, phase: SelectionPhase) {
        self.selection = phase;
    }
}
