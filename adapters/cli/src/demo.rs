//! Scripted pointer gestures replayed against a session.

use std::time::Duration;

use anyhow::{Context, Result};
use civ_tactics_core::{CellCoord, Event, MobilityClass, OwnerId, SelectionPhase, UnitId};
use civ_tactics_session::{Session, SessionConfig, SessionError};
use civ_tactics_system_selection::ScriptedPointer;
use civ_tactics_world::query;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Demo file contents: the session to build and the gestures to replay.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct DemoScript {
    /// Grid and pacing parameters.
    pub(crate) session: SessionConfig,
    /// Gestures replayed in order.
    pub(crate) gestures: Vec<Gesture>,
}

impl DemoScript {
    /// Parses a demo script from TOML text.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("demo script is not valid TOML")
    }
}

/// One press of the selection button.
///
/// Pressing an empty cell places a unit there. Pressing an occupied cell
/// starts the move command for its first unit and drags over `drag`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct Gesture {
    /// Cell under the pointer when the button goes down.
    pub(crate) press: CellCoord,
    /// Cells hovered while the button is held, the last one is the destination.
    #[serde(default)]
    pub(crate) drag: Vec<CellCoord>,
    /// Frames spent over each dragged cell.
    #[serde(default = "default_hold_ticks")]
    pub(crate) hold_ticks: usize,
    /// Faction of a unit placed by this gesture.
    #[serde(default = "default_owner")]
    pub(crate) owner: u32,
    /// Mobility class of a unit placed by this gesture.
    #[serde(default = "default_mobility")]
    pub(crate) mobility: MobilityClass,
}

fn default_hold_ticks() -> usize {
    1
}

fn default_owner() -> u32 {
    1
}

fn default_mobility() -> MobilityClass {
    MobilityClass::GroundSimple
}

/// What a gesture ended up doing.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(crate) enum GestureOutcome {
    /// A new unit was placed.
    Placed { unit: UnitId, cell: CellCoord },
    /// The selected unit finished its move.
    Moved {
        unit: UnitId,
        from: CellCoord,
        to: CellCoord,
        ticks: usize,
    },
    /// The move command ran out of frames and was cancelled.
    Abandoned { unit: UnitId, ticks: usize },
    /// The session refused the gesture.
    Rejected { cell: CellCoord, reason: String },
}

/// Final state of one unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct UnitSummary {
    unit: UnitId,
    owner: OwnerId,
    mobility: MobilityClass,
    cell: CellCoord,
    position: [f32; 2],
}

/// Everything a replay produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct DemoReport {
    /// Outcome of each gesture, in script order.
    pub(crate) outcomes: Vec<GestureOutcome>,
    /// Journal of every world event.
    pub(crate) events: Vec<Event>,
    /// Units registered once the replay finished.
    pub(crate) units: Vec<UnitSummary>,
    /// Frames ticked across the whole replay.
    pub(crate) ticks: usize,
}

/// Replays `gestures` against the session, ticking `frame` at a time.
///
/// A move command is given at most `max_ticks` frames before it is cancelled.
pub(crate) fn replay(
    session: &mut Session,
    gestures: &[Gesture],
    frame: Duration,
    max_ticks: usize,
) -> DemoReport {
    let mut outcomes = Vec::with_capacity(gestures.len());
    let mut events = Vec::new();
    let mut ticks = 0;

    for (index, gesture) in gestures.iter().enumerate() {
        let outcome = play(session, gesture, frame, max_ticks, &mut ticks);
        debug!(index, ?outcome, "gesture replayed");
        events.extend(session.drain_events());
        outcomes.push(outcome);
    }

    let units = query::units(session.world())
        .map(|unit| UnitSummary {
            unit: unit.id(),
            owner: unit.owner(),
            mobility: unit.mobility(),
            cell: unit.cell(),
            position: unit.position().to_array(),
        })
        .collect();
    let dropped = session.shutdown();
    if dropped > 0 {
        warn!(dropped, "tasks still pending after replay");
    }

    DemoReport {
        outcomes,
        events,
        units,
        ticks,
    }
}

fn play(
    session: &mut Session,
    gesture: &Gesture,
    frame: Duration,
    max_ticks: usize,
    ticks: &mut usize,
) -> GestureOutcome {
    let cell = gesture.press;
    let occupant = match query::units_at(session.world(), cell) {
        Ok(units) => units.first().copied(),
        Err(error) => {
            return GestureOutcome::Rejected {
                cell,
                reason: error.to_string(),
            }
        }
    };

    let Some(unit) = occupant else {
        return match session.place_unit(gesture.mobility, OwnerId::new(gesture.owner), cell) {
            Ok(unit) => GestureOutcome::Placed { unit, cell },
            Err(error) => rejected(cell, &error),
        };
    };

    let pointer = ScriptedPointer::drag(&gesture.drag, gesture.hold_ticks);
    let handle = match session.begin_selection(unit, Box::new(pointer)) {
        Ok(handle) => handle,
        Err(error) => return rejected(cell, &error),
    };

    let mut spent = 0;
    while spent < max_ticks {
        let report = session.tick(frame);
        spent += 1;
        *ticks += 1;
        if let Some((_, fault)) = report.faulted.iter().find(|(task, _)| *task == handle) {
            return GestureOutcome::Rejected {
                cell,
                reason: fault.to_string(),
            };
        }
        if report.completed.contains(&handle) {
            let to = session.unit(unit).map_or(cell, |moved| moved.cell());
            info!(unit = unit.get(), from = %cell, %to, spent, "unit moved");
            return GestureOutcome::Moved {
                unit,
                from: cell,
                to,
                ticks: spent,
            };
        }
    }

    let _ = session.cancel(handle);
    debug_assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    warn!(unit = unit.get(), spent, "move command abandoned");
    GestureOutcome::Abandoned { unit, ticks: spent }
}

fn rejected(cell: CellCoord, error: &SessionError) -> GestureOutcome {
    warn!(%cell, %error, "gesture rejected");
    GestureOutcome::Rejected {
        cell,
        reason: error.to_string(),
    }
}
