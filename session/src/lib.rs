#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Boundary surface of the tactical grid layer.
//!
//! A [`Session`] owns the world stage and the cooperative scheduler for one
//! play session. External collaborators (rendering, input, UI) query the
//! grid, request mutations, drive the scheduler with one [`Session::tick`]
//! per frame and feed pointer input into the selection flow.

mod config;

use std::time::Duration;

use civ_tactics_core::{
    CellCoord, Command, Event, GridDimensions, GridError, MobilityClass, OwnerId, PlacementError,
    RelocationError, SelectionPhase, UnitId, WorldBorders,
};
use civ_tactics_system_movement::{CompletionHook, MovementError, PathMove, SegmentMove};
use civ_tactics_system_pathfinding::{Path, PathSearch};
use civ_tactics_system_scheduler::{Scheduler, TaskHandle, TickReport};
use civ_tactics_system_selection::{PointerPick, SelectDestination};
use civ_tactics_world::{
    query, Cell, GridMap, ResolveError, Stage, TerrainError, Unit, World,
};
use glam::{IVec2, Vec2};
use thiserror::Error;
use tracing::{debug, info};

pub use config::SessionConfig;

/// Errors reported by session operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SessionError {
    /// A coordinate or the grid construction parameters were invalid.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// The terrain description could not be interpreted.
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    /// No passability mask could be produced for the query.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A move could not be scheduled.
    #[error(transparent)]
    Movement(#[from] MovementError),
    /// The world refused to place a unit.
    #[error("placement at {cell} rejected: {reason:?}")]
    PlacementRejected {
        /// Requested cell.
        cell: CellCoord,
        /// Reason reported by the world.
        reason: PlacementError,
    },
    /// The world refused to relocate a unit.
    #[error("relocation of unit {} rejected: {reason:?}", .unit.get())]
    RelocationRejected {
        /// Unit targeted by the request.
        unit: UnitId,
        /// Reason reported by the world.
        reason: RelocationError,
    },
    /// The picked cell holds no unit to select.
    #[error("no unit occupies {0}")]
    NoUnitAt(CellCoord),
    /// Another interactive move command is still running.
    #[error("a move command is already in progress")]
    SelectionInProgress,
    /// The session configuration is unusable.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(&'static str),
}

/// One play session: world state, pending tasks and pacing.
#[derive(Debug)]
pub struct Session {
    stage: Stage,
    scheduler: Scheduler<Stage>,
    search: PathSearch,
    frames_per_step: u32,
    input_delay: Duration,
    selection: Option<TaskHandle>,
}

impl Session {
    /// Builds the grid described by `config` and starts an empty session.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let dimensions = GridDimensions::new(config.height, config.width);
        let mut source = config.terrain.into_source(dimensions, config.yields)?;
        let grid = GridMap::initialize(dimensions, config.cell_spacing, source.as_mut())?;
        let input_delay = Duration::try_from_secs_f32(config.input_delay_secs).map_err(|_| {
            SessionError::InvalidConfig("input delay must be a non-negative number of seconds")
        })?;
        Self::from_world(World::new(grid), config.frames_per_step, input_delay)
    }

    /// Starts a session over an existing world.
    pub fn from_world(
        world: World,
        frames_per_step: u32,
        input_delay: Duration,
    ) -> Result<Self, SessionError> {
        if frames_per_step == 0 {
            return Err(SessionError::InvalidConfig(
                "frames per step must be positive",
            ));
        }
        let dimensions = query::grid(&world).dimensions();
        info!(
            height = dimensions.height(),
            width = dimensions.width(),
            frames_per_step,
            "session started"
        );
        Ok(Self {
            stage: Stage::new(world),
            scheduler: Scheduler::new(),
            search: PathSearch::new(),
            frames_per_step,
            input_delay,
            selection: None,
        })
    }

    /// World state together with its event journal.
    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Read-only access to the world.
    #[must_use]
    pub const fn world(&self) -> &World {
        self.stage.world()
    }

    /// Ticks spent on every path segment.
    #[must_use]
    pub const fn frames_per_step(&self) -> u32 {
        self.frames_per_step
    }

    /// Time a new selection ignores the pointer.
    #[must_use]
    pub const fn input_delay(&self) -> Duration {
        self.input_delay
    }

    /// World-space extents of the grid, for camera clamping.
    #[must_use]
    pub fn world_borders(&self) -> WorldBorders {
        query::world_borders(self.world())
    }

    /// World-space position of a grid coordinate.
    #[must_use]
    pub fn to_world_position(&self, coord: CellCoord) -> Vec2 {
        query::to_world_position(self.world(), coord)
    }

    /// Cell stored at the coordinate.
    pub fn cell_at(&self, coord: CellCoord) -> Result<&Cell, SessionError> {
        Ok(query::cell_at(self.world(), coord)?)
    }

    /// Unit registered under the identifier.
    #[must_use]
    pub fn unit(&self, unit: UnitId) -> Option<&Unit> {
        query::unit(self.world(), unit)
    }

    /// Shortest route from `start` to `end` for the mobility class.
    ///
    /// A destination the class may not stop on yields `Ok(None)`, exactly
    /// like an unreachable one.
    pub fn find_path(
        &mut self,
        start: CellCoord,
        end: CellCoord,
        class: MobilityClass,
    ) -> Result<Option<Path>, SessionError> {
        let mask = match query::resolve_passability(self.stage.world(), class, end) {
            Ok(mask) => mask,
            Err(ResolveError::DestinationForbidden { class, terrain }) => {
                debug!(%start, %end, ?class, ?terrain, "destination forbidden");
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };
        Ok(self.search.find_path(&mask, start, end)?)
    }

    fn journal_since(&self, mark: usize) -> &[Event] {
        self.stage.events().get(mark..).unwrap_or_default()
    }

    /// Places a new unit and returns its identifier.
    pub fn place_unit(
        &mut self,
        mobility: MobilityClass,
        owner: OwnerId,
        cell: CellCoord,
    ) -> Result<UnitId, SessionError> {
        let mark = self.stage.events().len();
        self.stage.apply(Command::PlaceUnit {
            mobility,
            owner,
            cell,
        });

        let mut reason = PlacementError::OutOfBounds;
        for event in self.journal_since(mark) {
            match event {
                Event::UnitPlaced { unit, .. } => return Ok(*unit),
                Event::UnitPlacementRejected { reason: cause, .. } => reason = *cause,
                _ => {}
            }
        }
        Err(SessionError::PlacementRejected { cell, reason })
    }

    /// Instantly relocates a unit by an integer offset, returning its new cell.
    pub fn shift_unit(&mut self, unit: UnitId, offset: IVec2) -> Result<CellCoord, SessionError> {
        let mark = self.stage.events().len();
        self.stage.apply(Command::ShiftUnit { unit, offset });

        let mut reason = RelocationError::MissingUnit;
        for event in self.journal_since(mark) {
            match event {
                Event::UnitRelocated { to, .. } => return Ok(*to),
                Event::UnitRelocationRejected { reason: cause, .. } => reason = *cause,
                _ => {}
            }
        }
        Err(SessionError::RelocationRejected { unit, reason })
    }

    /// Animates a unit straight onto `destination`.
    pub fn move_unit(
        &mut self,
        unit: UnitId,
        destination: CellCoord,
    ) -> Result<TaskHandle, SessionError> {
        let task = SegmentMove::to_cell(self.world(), unit, destination, self.frames_per_step)?;
        Ok(self.scheduler.schedule_task(Box::new(task)))
    }

    /// Animates a unit through `path`, running `on_complete` once on arrival.
    pub fn move_unit_along(
        &mut self,
        unit: UnitId,
        path: &[CellCoord],
        on_complete: Option<CompletionHook>,
    ) -> Result<TaskHandle, SessionError> {
        let task = PathMove::new(self.world(), unit, path, self.frames_per_step, on_complete)?;
        Ok(self.scheduler.schedule_task(Box::new(task)))
    }

    /// Highlights a cell. Highlights never affect pathing.
    pub fn mark(&mut self, cell: CellCoord) -> Result<(), SessionError> {
        query::grid(self.world()).dimensions().check(cell)?;
        self.stage.apply(Command::Mark { cell });
        Ok(())
    }

    /// Clears every highlight.
    pub fn unmark_all(&mut self) {
        self.stage.apply(Command::UnmarkAll);
    }

    /// Highlighted cells in marking order.
    #[must_use]
    pub fn marked_cells(&self) -> &[CellCoord] {
        query::marked_cells(self.world())
    }

    /// Starts the interactive move command for `unit`.
    pub fn begin_selection(
        &mut self,
        unit: UnitId,
        pointer: Box<dyn PointerPick>,
    ) -> Result<TaskHandle, SessionError> {
        if self.selection_pending() {
            return Err(SessionError::SelectionInProgress);
        }
        let task = SelectDestination::new(self.world(), unit, pointer, self.frames_per_step)?
            .with_input_delay(self.input_delay);
        let handle = self.scheduler.schedule_task(Box::new(task));
        self.selection = Some(handle);
        info!(unit = unit.get(), %handle, "selection started");
        Ok(handle)
    }

    /// Starts the interactive move command for the first unit standing on `cell`.
    pub fn begin_selection_at(
        &mut self,
        cell: CellCoord,
        pointer: Box<dyn PointerPick>,
    ) -> Result<TaskHandle, SessionError> {
        let unit = query::units_at(self.world(), cell)?
            .first()
            .copied()
            .ok_or(SessionError::NoUnitAt(cell))?;
        self.begin_selection(unit, pointer)
    }

    /// Phase of the interactive move command.
    ///
    /// A selection still inside its input delay reads as
    /// [`SelectionPhase::Idle`]; [`Session::selection_pending`] reports it.
    #[must_use]
    pub const fn selection_phase(&self) -> SelectionPhase {
        self.stage.selection_phase()
    }

    /// Reports whether an interactive move command is scheduled, input delay included.
    #[must_use]
    pub fn selection_pending(&self) -> bool {
        self.selection
            .map_or(false, |active| self.scheduler.is_pending(active))
    }

    /// Advances every pending task by one frame.
    ///
    /// Events accumulate in the journal until [`Session::drain_events`] is
    /// called. A held selection preview journals a `MarksCleared` and one
    /// `CellMarked` per route cell every frame, so embedders drain once per
    /// frame. A faulted selection is dropped like a cancelled one.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let report = self.scheduler.tick(dt, &mut self.stage);
        if let Some(active) = self.selection {
            if report.faulted.iter().any(|(handle, _)| *handle == active) {
                self.end_selection();
            } else if !self.scheduler.is_pending(active) {
                self.selection = None;
            }
        }
        report
    }

    /// Stops a scheduled task. Unknown or finished handles are ignored.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let cancelled = self.scheduler.cancel(handle);
        if cancelled && self.selection == Some(handle) {
            self.end_selection();
        }
        cancelled
    }

    fn end_selection(&mut self) {
        self.selection = None;
        self.stage.apply(Command::UnmarkAll);
        self.stage.set_selection_phase(SelectionPhase::Idle);
    }

    /// Number of tasks still registered.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Removes and returns every journaled event.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.stage.drain_events()
    }

    /// Cancels every pending task and clears transient interaction state.
    ///
    /// Returns the number of tasks dropped.
    pub fn shutdown(&mut self) -> usize {
        let dropped = self.scheduler.cancel_all();
        self.end_selection();
        info!(dropped, ticks = self.scheduler.ticks(), "session shut down");
        dropped
    }
}
