#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Scheduled tasks that animate units between grid cells.
//!
//! A segment is traversed in a fixed number of frames: every tick translates
//! the unit by `(destination - start) / frames` and the final tick snaps it
//! onto the destination so no floating-point drift accumulates. Occupancy is
//! only updated when the final destination is reached.

use std::fmt;

use civ_tactics_core::{CellCoord, Command, GridError, UnitId};
use civ_tactics_system_scheduler::{Progress, Task, TaskContext, TaskFault};
use civ_tactics_world::{query, Stage, Unit, World};
use glam::Vec2;
use thiserror::Error;
use tracing::{debug, info};

/// Callback run exactly once when a multi-segment move arrives.
pub type CompletionHook = Box<dyn FnOnce(&mut Stage)>;

/// Reasons a move could not be scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum MovementError {
    /// The move lists no waypoints.
    #[error("move has no waypoints")]
    EmptyPath,
    /// Segments must last at least one frame.
    #[error("frames per segment must be positive")]
    ZeroFrames,
    /// The unit is not registered with the world.
    #[error("unit {} does not exist", .0.get())]
    MissingUnit(UnitId),
    /// A waypoint lies outside the grid.
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Clone, Copy, Debug)]
struct Stepper {
    target: Vec2,
    displacement: Vec2,
    remaining: u32,
}

impl Stepper {
    fn begin(from: Vec2, target: Vec2, frames: u32) -> Self {
        Self {
            target,
            displacement: (target - from) / frames as f32,
            remaining: frames,
        }
    }

    /// Position after one more frame and whether the target was reached.
    fn advance(&mut self, current: Vec2) -> (Vec2, bool) {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            (self.target, true)
        } else {
            (current + self.displacement, false)
        }
    }
}

fn lookup(world: &World, unit: UnitId) -> Result<&Unit, MovementError> {
    query::unit(world, unit).ok_or(MovementError::MissingUnit(unit))
}

fn current_position(stage: &Stage, unit: UnitId) -> Result<Vec2, TaskFault> {
    query::unit(stage.world(), unit)
        .map(Unit::position)
        .ok_or_else(|| TaskFault::new(format!("unit {} vanished while moving", unit.get())))
}

/// Translates a unit along a single straight segment.
#[derive(Debug)]
pub struct SegmentMove {
    unit: UnitId,
    destination: Vec2,
    arrival: Option<CellCoord>,
    frames: u32,
    stepper: Option<Stepper>,
}

impl SegmentMove {
    /// Moves the unit's world position to `destination` without changing occupancy.
    pub fn toward(
        world: &World,
        unit: UnitId,
        destination: Vec2,
        frames: u32,
    ) -> Result<Self, MovementError> {
        if frames == 0 {
            return Err(MovementError::ZeroFrames);
        }
        let _ = lookup(world, unit)?;
        Ok(Self {
            unit,
            destination,
            arrival: None,
            frames,
            stepper: None,
        })
    }

    /// Moves the unit onto `cell`, transferring occupancy on the final frame.
    pub fn to_cell(
        world: &World,
        unit: UnitId,
        cell: CellCoord,
        frames: u32,
    ) -> Result<Self, MovementError> {
        query::grid(world).dimensions().check(cell)?;
        let destination = query::to_world_position(world, cell);
        let mut segment = Self::toward(world, unit, destination, frames)?;
        segment.arrival = Some(cell);
        Ok(segment)
    }
}

impl Task<Stage> for SegmentMove {
    fn poll(&mut self, cx: &mut TaskContext<'_, Stage>) -> Result<Progress, TaskFault> {
        let current = current_position(cx.state(), self.unit)?;
        let (destination, frames) = (self.destination, self.frames);
        let stepper = self
            .stepper
            .get_or_insert_with(|| Stepper::begin(current, destination, frames));
        let (position, reached) = stepper.advance(current);

        let unit = self.unit;
        let stage = cx.state_mut();
        stage.apply(Command::SetUnitPosition { unit, position });
        if !reached {
            return Ok(Progress::Pending);
        }
        if let Some(to) = self.arrival {
            stage.apply(Command::RelocateUnit { unit, to });
        }
        Ok(Progress::Complete)
    }
}

/// Walks a unit through an ordered list of waypoints, one segment at a time.
pub struct PathMove {
    unit: UnitId,
    targets: Vec<(CellCoord, Vec2)>,
    next: usize,
    frames: u32,
    stepper: Option<Stepper>,
    on_complete: Option<CompletionHook>,
}

impl fmt::Debug for PathMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMove")
            .field("unit", &self.unit)
            .field("targets", &self.targets)
            .field("next", &self.next)
            .field("frames", &self.frames)
            .field("stepper", &self.stepper)
            .field("has_hook", &self.on_complete.is_some())
            .finish()
    }
}

impl PathMove {
    /// Prepares a move spending `frames` ticks on every segment.
    ///
    /// A leading waypoint equal to the unit's current cell is dropped, since
    /// there is nothing to traverse to reach it.
    pub fn new(
        world: &World,
        unit: UnitId,
        waypoints: &[CellCoord],
        frames: u32,
        on_complete: Option<CompletionHook>,
    ) -> Result<Self, MovementError> {
        if waypoints.is_empty() {
            return Err(MovementError::EmptyPath);
        }
        if frames == 0 {
            return Err(MovementError::ZeroFrames);
        }
        let origin = lookup(world, unit)?.cell();
        let dimensions = query::grid(world).dimensions();
        for waypoint in waypoints {
            dimensions.check(*waypoint)?;
        }

        let skip = usize::from(waypoints.first() == Some(&origin));
        let targets: Vec<(CellCoord, Vec2)> = waypoints[skip..]
            .iter()
            .map(|cell| (*cell, query::to_world_position(world, *cell)))
            .collect();
        debug!(
            unit = unit.get(),
            %origin,
            segments = targets.len(),
            frames,
            "path move prepared"
        );

        Ok(Self {
            unit,
            targets,
            next: 0,
            frames,
            stepper: None,
            on_complete,
        })
    }

    /// Number of segments still to traverse.
    #[must_use]
    pub fn remaining_segments(&self) -> usize {
        self.targets.len().saturating_sub(self.next)
    }

    fn arrive(&mut self, stage: &mut Stage) {
        if let Some(&(to, _)) = self.targets.last() {
            stage.apply(Command::RelocateUnit {
                unit: self.unit,
                to,
            });
            info!(unit = self.unit.get(), %to, "unit arrived");
        }
        if let Some(hook) = self.on_complete.take() {
            hook(stage);
        }
    }
}

impl Task<Stage> for PathMove {
    fn poll(&mut self, cx: &mut TaskContext<'_, Stage>) -> Result<Progress, TaskFault> {
        let current = current_position(cx.state(), self.unit)?;
        let mut stepper = match self.stepper {
            Some(stepper) => stepper,
            None => match self.targets.get(self.next) {
                Some(&(_, target)) => Stepper::begin(current, target, self.frames),
                None => {
                    self.arrive(cx.state_mut());
                    return Ok(Progress::Complete);
                }
            },
        };

        let (position, reached) = stepper.advance(current);
        cx.state_mut().apply(Command::SetUnitPosition {
            unit: self.unit,
            position,
        });
        if !reached {
            self.stepper = Some(stepper);
            return Ok(Progress::Pending);
        }

        self.stepper = None;
        self.next += 1;
        if self.next < self.targets.len() {
            return Ok(Progress::Pending);
        }
        self.arrive(cx.state_mut());
        Ok(Progress::Complete)
    }
}
