#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Interactive move command: pick a destination with the pointer, then travel there.
//!
//! The flow runs as one scheduled task moving through
//! `Idle -> WaitingForDestination -> AnimatingMove -> Idle`. While the
//! selection button is held the tentative route to the hovered cell is
//! recomputed and highlighted every tick; releasing the button commits the
//! last route as a multi-segment move.

mod pointer;

use std::{fmt, time::Duration};

use civ_tactics_core::{CellCoord, Command, MobilityClass, SelectionPhase, UnitId};
use civ_tactics_system_movement::{CompletionHook, MovementError, PathMove};
use civ_tactics_system_pathfinding::{Path, PathSearch};
use civ_tactics_system_scheduler::{Progress, Task, TaskContext, TaskFault};
use civ_tactics_world::{query, Stage, Unit, World};
use tracing::{debug, info};

pub use pointer::{PointerPick, PointerSample, ScriptedPointer};

/// Mobility class used to preview and commit interactive moves.
pub const SELECTION_MOBILITY: MobilityClass = MobilityClass::GroundSimple;

enum Phase {
    Arming { elapsed: Duration },
    Waiting,
    Animating(PathMove),
}

/// Scheduled task driving one interactive move command for a unit.
pub struct SelectDestination {
    unit: UnitId,
    pointer: Box<dyn PointerPick>,
    frames: u32,
    input_delay: Duration,
    search: PathSearch,
    tentative: Option<Path>,
    phase: Phase,
}

impl fmt::Debug for SelectDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            Phase::Arming { .. } => "arming",
            Phase::Waiting => "waiting",
            Phase::Animating(_) => "animating",
        };
        f.debug_struct("SelectDestination")
            .field("unit", &self.unit)
            .field("frames", &self.frames)
            .field("input_delay", &self.input_delay)
            .field("tentative", &self.tentative)
            .field("phase", &phase)
            .finish()
    }
}

impl SelectDestination {
    /// Prepares a selection for `unit`, moving `frames` ticks per path segment.
    pub fn new(
        world: &World,
        unit: UnitId,
        pointer: Box<dyn PointerPick>,
        frames: u32,
    ) -> Result<Self, MovementError> {
        if frames == 0 {
            return Err(MovementError::ZeroFrames);
        }
        if query::unit(world, unit).is_none() {
            return Err(MovementError::MissingUnit(unit));
        }
        Ok(Self {
            unit,
            pointer,
            frames,
            input_delay: Duration::ZERO,
            search: PathSearch::new(),
            tentative: None,
            phase: Phase::Arming {
                elapsed: Duration::ZERO,
            },
        })
    }

    /// Ignores the pointer until `delay` of frame time has accumulated.
    #[must_use]
    pub fn with_input_delay(mut self, delay: Duration) -> Self {
        self.input_delay = delay;
        self
    }

    /// Route previewed during the most recent held frame.
    #[must_use]
    pub fn tentative_path(&self) -> Option<&Path> {
        self.tentative.as_ref()
    }

    fn origin(&self, stage: &Stage) -> Result<CellCoord, TaskFault> {
        query::unit(stage.world(), self.unit)
            .map(Unit::cell)
            .ok_or_else(|| {
                TaskFault::new(format!("selected unit {} no longer exists", self.unit.get()))
            })
    }

    fn route_to(&mut self, world: &World, start: CellCoord, goal: CellCoord) -> Option<Path> {
        let mask = match query::resolve_passability(world, SELECTION_MOBILITY, goal) {
            Ok(mask) => mask,
            Err(error) => {
                debug!(%goal, %error, "no route to hovered cell");
                return None;
            }
        };
        match self.search.find_path(&mask, start, goal) {
            Ok(path) => path,
            Err(error) => {
                debug!(%goal, %error, "route search rejected");
                None
            }
        }
    }

    fn preview(&mut self, stage: &mut Stage) -> Result<(), TaskFault> {
        let start = self.origin(stage)?;
        stage.apply(Command::UnmarkAll);
        self.tentative = match self.pointer.pick() {
            Some(goal) => self.route_to(stage.world(), start, goal),
            None => None,
        };
        if let Some(path) = &self.tentative {
            for cell in path.waypoints() {
                stage.apply(Command::Mark { cell: *cell });
            }
        }
        Ok(())
    }

    fn commit(&mut self, stage: &mut Stage, path: &Path) -> Result<(), TaskFault> {
        let hook: CompletionHook = Box::new(|stage: &mut Stage| {
            stage.apply(Command::UnmarkAll);
            stage.set_selection_phase(SelectionPhase::Idle);
        });
        let movement = PathMove::new(
            stage.world(),
            self.unit,
            path.waypoints(),
            self.frames,
            Some(hook),
        )
        .map_err(|error| TaskFault::new(error.to_string()))?;

        info!(
            unit = self.unit.get(),
            steps = path.step_count(),
            "destination committed"
        );
        stage.set_selection_phase(SelectionPhase::AnimatingMove { unit: self.unit });
        self.phase = Phase::Animating(movement);
        Ok(())
    }
}

impl Task<Stage> for SelectDestination {
    fn poll(&mut self, cx: &mut TaskContext<'_, Stage>) -> Result<Progress, TaskFault> {
        if let Phase::Arming { elapsed } = &mut self.phase {
            *elapsed = elapsed.saturating_add(cx.frame().dt());
            if *elapsed < self.input_delay {
                return Ok(Progress::Pending);
            }
            let origin = self.origin(cx.state())?;
            cx.state_mut()
                .set_selection_phase(SelectionPhase::WaitingForDestination {
                    unit: self.unit,
                    origin,
                });
            debug!(unit = self.unit.get(), %origin, "waiting for destination");
            self.phase = Phase::Waiting;
        }

        if let Phase::Animating(movement) = &mut self.phase {
            return movement.poll(cx);
        }

        if self.pointer.is_held() {
            self.preview(cx.state_mut())?;
            return Ok(Progress::Pending);
        }

        let Some(path) = self.tentative.take() else {
            // Released without a usable route; wait for the next press.
            return Ok(Progress::Pending);
        };
        self.commit(cx.state_mut(), &path)?;
        Ok(Progress::Pending)
    }
}
