use std::{cell::Cell, rc::Rc, time::Duration};

use civ_tactics_core::{
    CellCoord, Event, GridDimensions, GridError, MobilityClass, OwnerId, PlacementError,
    RelocationError, SelectionPhase, TerrainType, UnitId,
};
use civ_tactics_session::{Session, SessionConfig, SessionError};
use civ_tactics_system_movement::MovementError;
use civ_tactics_system_selection::ScriptedPointer;
use civ_tactics_world::{
    GridMap, ResolveError, Stage, TerrainConfig, TerrainError, UniformTerrain, World,
};
use glam::{IVec2, Vec2};

const FRAME: Duration = Duration::from_millis(16);

fn config(height: u32, width: u32) -> SessionConfig {
    SessionConfig {
        height,
        width,
        frames_per_step: 2,
        input_delay_secs: 0.0,
        ..SessionConfig::default()
    }
}

fn layout_session(rows: &[&str]) -> Session {
    Session::new(SessionConfig {
        height: rows.len() as u32,
        width: rows[0].len() as u32,
        frames_per_step: 1,
        input_delay_secs: 0.0,
        terrain: TerrainConfig::Layout {
            rows: rows.iter().map(|row| row.to_string()).collect(),
        },
        ..SessionConfig::default()
    })
    .expect("valid session")
}

fn ground(session: &mut Session, owner: u32, cell: CellCoord) -> UnitId {
    session
        .place_unit(MobilityClass::GroundSimple, OwnerId::new(owner), cell)
        .expect("placement accepted")
}

#[test]
fn config_parses_from_toml_with_defaults() {
    let config: SessionConfig = toml::from_str(
        r#"
height = 4
width = 6

[terrain]
kind = "seeded"
seed = 99

[yields.water]
coin = 3
"#,
    )
    .expect("valid config");

    assert_eq!(config.height, 4);
    assert_eq!(config.width, 6);
    assert_eq!(config.cell_spacing, 10.0);
    assert_eq!(config.frames_per_step, 10);
    assert_eq!(config.input_delay_secs, 1.0);
    assert_eq!(config.yields.water.coin, 3);
    assert!(matches!(config.terrain, TerrainConfig::Seeded { seed: 99, .. }));

    let session = Session::new(config).expect("valid session");
    assert_eq!(session.input_delay(), Duration::from_secs(1));
}

#[test]
fn invalid_configurations_are_rejected() {
    assert_eq!(
        Session::new(SessionConfig {
            height: 0,
            ..SessionConfig::default()
        })
        .map(|_| ()),
        Err(SessionError::Grid(GridError::InvalidDimensions {
            height: 0,
            width: 8
        }))
    );
    assert!(matches!(
        Session::new(SessionConfig {
            frames_per_step: 0,
            ..SessionConfig::default()
        }),
        Err(SessionError::InvalidConfig(_))
    ));
    assert!(matches!(
        Session::new(SessionConfig {
            input_delay_secs: -1.0,
            ..SessionConfig::default()
        }),
        Err(SessionError::InvalidConfig(_))
    ));
    assert!(matches!(
        Session::new(SessionConfig {
            height: 2,
            width: 2,
            terrain: TerrainConfig::Layout {
                rows: vec!["GG".to_string()],
            },
            ..SessionConfig::default()
        }),
        Err(SessionError::Terrain(TerrainError::RowCount { .. }))
    ));
}

#[test]
fn grid_queries_expose_borders_and_positions() {
    let session = Session::new(config(3, 5)).expect("valid session");
    let borders = session.world_borders();

    assert_eq!(borders.max(), Vec2::new(30.0, 50.0));
    assert_eq!(
        borders.clamp(Vec2::new(-4.0, 80.0)),
        Vec2::new(0.0, 50.0)
    );
    assert_eq!(
        session.to_world_position(CellCoord::new(2, 4)),
        Vec2::new(20.0, 40.0)
    );
    let cell = session.cell_at(CellCoord::new(2, 4)).expect("in bounds");
    assert_eq!(cell.terrain().kind(), TerrainType::Grassland);
    assert!(matches!(
        session.cell_at(CellCoord::new(3, 0)),
        Err(SessionError::Grid(GridError::OutOfBounds { .. }))
    ));
}

#[test]
fn three_by_three_route_takes_four_steps() {
    let mut session = Session::new(config(3, 3)).expect("valid session");
    let path = session
        .find_path(
            CellCoord::new(0, 0),
            CellCoord::new(2, 2),
            MobilityClass::GroundSimple,
        )
        .expect("valid query")
        .expect("reachable");

    assert_eq!(path.step_count(), 4);
    assert_eq!(path.start(), Some(CellCoord::new(0, 0)));
    assert_eq!(path.goal(), Some(CellCoord::new(2, 2)));
}

#[test]
fn water_destination_fails_fast_for_ground_units() {
    let mut session = layout_session(&["GGG", "GWG", "GGG"]);
    let start = CellCoord::new(0, 0);
    let water = CellCoord::new(1, 1);

    for class in [MobilityClass::GroundSimple, MobilityClass::GroundAmphibious] {
        assert_eq!(session.find_path(start, water, class), Ok(None));
    }
    let naval = session
        .find_path(start, water, MobilityClass::WaterCapable)
        .expect("valid query")
        .expect("reachable");
    assert_eq!(naval.step_count(), 2);

    let detour = session
        .find_path(start, CellCoord::new(2, 2), MobilityClass::GroundSimple)
        .expect("valid query")
        .expect("reachable");
    assert!(!detour.waypoints().contains(&water));
}

#[test]
fn amphibious_units_cross_water_that_ground_units_cannot() {
    let mut session = layout_session(&["GWG"]);
    let start = CellCoord::new(0, 0);
    let goal = CellCoord::new(0, 2);

    assert_eq!(
        session.find_path(start, goal, MobilityClass::GroundSimple),
        Ok(None)
    );
    let crossing = session
        .find_path(start, goal, MobilityClass::GroundAmphibious)
        .expect("valid query")
        .expect("reachable");
    assert_eq!(crossing.step_count(), 2);
    assert_eq!(
        crossing.waypoints(),
        &[start, CellCoord::new(0, 1), goal][..]
    );
}

#[test]
fn unconfigured_mobility_class_is_a_configuration_error() {
    let grid = GridMap::initialize(
        GridDimensions::new(2, 2),
        1.0,
        &mut UniformTerrain::new(TerrainType::Grassland.into()),
    )
    .expect("valid grid");
    let world = World::with_mobility_classes(grid, &[MobilityClass::GroundSimple]);
    let mut session = Session::from_world(world, 1, Duration::ZERO).expect("valid session");

    assert_eq!(
        session.find_path(
            CellCoord::new(0, 0),
            CellCoord::new(1, 1),
            MobilityClass::FlightCapable
        ),
        Err(SessionError::Resolve(ResolveError::Unconfigured(
            MobilityClass::FlightCapable
        )))
    );
}

#[test]
fn placement_reports_rejections_and_conflicts() {
    let mut session = Session::new(config(2, 2)).expect("valid session");
    assert_eq!(
        session.place_unit(
            MobilityClass::GroundSimple,
            OwnerId::new(1),
            CellCoord::new(2, 0)
        ),
        Err(SessionError::PlacementRejected {
            cell: CellCoord::new(2, 0),
            reason: PlacementError::OutOfBounds,
        })
    );

    let cell = CellCoord::new(1, 1);
    let first = ground(&mut session, 1, cell);
    let second = ground(&mut session, 2, cell);

    assert_ne!(first, second);
    assert_eq!(
        session.cell_at(cell).expect("in bounds").belonging(),
        Some(OwnerId::new(1))
    );
    assert!(session
        .drain_events()
        .contains(&Event::ConflictTriggered {
            cell,
            incumbent: OwnerId::new(1),
            challenger: OwnerId::new(2),
            unit: second,
        }));
}

#[test]
fn shift_unit_moves_by_vector() {
    let mut session = Session::new(config(3, 3)).expect("valid session");
    let unit = ground(&mut session, 1, CellCoord::new(1, 1));

    assert_eq!(
        session.shift_unit(unit, IVec2::new(1, 1)),
        Ok(CellCoord::new(2, 2))
    );
    assert_eq!(
        session.shift_unit(unit, IVec2::new(1, 0)),
        Err(SessionError::RelocationRejected {
            unit,
            reason: RelocationError::OutOfBounds,
        })
    );
    assert_eq!(
        session.shift_unit(unit, IVec2::new(i32::MAX, 0)),
        Err(SessionError::RelocationRejected {
            unit,
            reason: RelocationError::OutOfBounds,
        })
    );
    assert_eq!(
        session.unit(unit).expect("unit exists").cell(),
        CellCoord::new(2, 2)
    );
    assert_eq!(
        session.shift_unit(UnitId::new(50), IVec2::ZERO),
        Err(SessionError::RelocationRejected {
            unit: UnitId::new(50),
            reason: RelocationError::MissingUnit,
        })
    );
}

#[test]
fn multi_segment_move_through_the_session() {
    let mut session = Session::new(config(3, 3)).expect("valid session");
    let unit = ground(&mut session, 1, CellCoord::new(0, 0));
    let arrivals = Rc::new(Cell::new(0));
    let counter = Rc::clone(&arrivals);

    let handle = session
        .move_unit_along(
            unit,
            &[
                CellCoord::new(0, 0),
                CellCoord::new(1, 0),
                CellCoord::new(1, 1),
            ],
            Some(Box::new(move |_: &mut Stage| counter.set(counter.get() + 1))),
        )
        .expect("valid move");

    let mut ticks = 0;
    while session.pending_tasks() > 0 {
        ticks += 1;
        let report = session.tick(FRAME);
        assert!(report.faulted.is_empty());
        assert!(ticks <= 10, "move never completed");
        if ticks == 4 {
            assert_eq!(report.completed, vec![handle]);
        }
    }

    assert_eq!(ticks, 4);
    assert_eq!(arrivals.get(), 1);
    let moved = session.unit(unit).expect("unit exists");
    assert_eq!(moved.position(), Vec2::new(10.0, 10.0));
    assert_eq!(moved.cell(), CellCoord::new(1, 1));
}

#[test]
fn single_segment_move_and_move_validation() {
    let mut session = Session::new(config(2, 3)).expect("valid session");
    let unit = ground(&mut session, 1, CellCoord::new(0, 0));

    let _ = session
        .move_unit(unit, CellCoord::new(1, 2))
        .expect("valid move");
    let _ = session.tick(FRAME);
    assert_eq!(
        session.unit(unit).expect("unit exists").position(),
        Vec2::new(5.0, 10.0)
    );
    let _ = session.tick(FRAME);
    assert_eq!(
        session.unit(unit).expect("unit exists").cell(),
        CellCoord::new(1, 2)
    );

    assert_eq!(
        session.move_unit_along(unit, &[], None),
        Err(SessionError::Movement(MovementError::EmptyPath))
    );
}

#[test]
fn selection_flow_moves_the_picked_unit() {
    let mut session = Session::new(SessionConfig {
        input_delay_secs: 0.5,
        ..config(3, 3)
    })
    .expect("valid session");
    let origin = CellCoord::new(0, 0);
    let goal = CellCoord::new(0, 2);
    let unit = ground(&mut session, 1, origin);

    let handle = session
        .begin_selection_at(origin, Box::new(ScriptedPointer::drag(&[goal], 1)))
        .expect("selection started");
    assert_eq!(
        session.begin_selection(unit, Box::new(ScriptedPointer::default())),
        Err(SessionError::SelectionInProgress)
    );

    let _ = session.tick(Duration::from_millis(250));
    assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    assert!(session.selection_pending());
    let _ = session.tick(Duration::from_millis(250));
    assert_eq!(
        session.selection_phase(),
        SelectionPhase::WaitingForDestination { unit, origin }
    );
    assert_eq!(session.marked_cells().len(), 3);

    let _ = session.tick(FRAME);
    assert_eq!(
        session.selection_phase(),
        SelectionPhase::AnimatingMove { unit }
    );

    let mut completed = false;
    for _ in 0..4 {
        completed |= session.tick(FRAME).completed.contains(&handle);
    }
    assert!(completed);
    assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    assert!(session.marked_cells().is_empty());
    assert!(!session.selection_pending());
    assert_eq!(session.unit(unit).expect("unit exists").cell(), goal);

    assert!(session
        .begin_selection(unit, Box::new(ScriptedPointer::default()))
        .is_ok());
}

#[test]
fn preview_events_accumulate_until_drained() {
    let mut session = Session::new(config(3, 3)).expect("valid session");
    let unit = ground(&mut session, 1, CellCoord::new(0, 0));
    let _ = session.drain_events();
    let _ = session
        .begin_selection(
            unit,
            Box::new(ScriptedPointer::drag(&[CellCoord::new(0, 2)], 3)),
        )
        .expect("selection started");

    for _ in 0..3 {
        let _ = session.tick(FRAME);
    }
    let events = session.drain_events();
    let cleared = events
        .iter()
        .filter(|event| matches!(event, Event::MarksCleared))
        .count();
    let marked = events
        .iter()
        .filter(|event| matches!(event, Event::CellMarked { .. }))
        .count();
    assert_eq!(cleared, 3);
    assert_eq!(marked, 9);

    assert!(session.drain_events().is_empty());
}

#[test]
fn selecting_an_empty_cell_is_reported() {
    let mut session = Session::new(config(2, 2)).expect("valid session");
    assert_eq!(
        session.begin_selection_at(CellCoord::new(1, 1), Box::new(ScriptedPointer::default())),
        Err(SessionError::NoUnitAt(CellCoord::new(1, 1)))
    );
}

#[test]
fn cancelling_a_selection_returns_to_idle() {
    let mut session = Session::new(config(3, 3)).expect("valid session");
    let unit = ground(&mut session, 1, CellCoord::new(0, 0));
    let handle = session
        .begin_selection(
            unit,
            Box::new(ScriptedPointer::drag(&[CellCoord::new(2, 2)], 5)),
        )
        .expect("selection started");
    let _ = session.tick(FRAME);
    assert!(!session.marked_cells().is_empty());

    assert!(session.cancel(handle));
    assert!(!session.cancel(handle));
    assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    assert!(session.marked_cells().is_empty());
}

#[test]
fn shutdown_cancels_pending_work() {
    let mut session = Session::new(config(3, 3)).expect("valid session");
    let unit = ground(&mut session, 1, CellCoord::new(0, 0));
    let _ = session
        .move_unit(unit, CellCoord::new(2, 2))
        .expect("valid move");
    session.mark(CellCoord::new(1, 1)).expect("in bounds");
    assert!(session.mark(CellCoord::new(3, 3)).is_err());

    assert_eq!(session.shutdown(), 1);
    assert_eq!(session.pending_tasks(), 0);
    assert!(session.marked_cells().is_empty());

    let _ = session.tick(FRAME);
    assert_eq!(
        session.unit(unit).expect("unit exists").position(),
        Vec2::ZERO
    );
}
