use std::{cell::Cell, rc::Rc, time::Duration};

use civ_tactics_system_scheduler::{Progress, Scheduler, Task, TaskContext, TaskFault};

const FRAME: Duration = Duration::from_millis(16);

#[test]
fn cancelled_before_first_tick_is_never_polled() {
    let mut scheduler = Scheduler::<u32>::new();
    let mut polls = 0;
    let handle = scheduler.schedule(|cx| {
        *cx.state_mut() += 1;
        false
    });

    assert!(scheduler.cancel(handle));
    for _ in 0..3 {
        let _ = scheduler.tick(FRAME, &mut polls);
    }
    assert_eq!(polls, 0);
    assert!(!scheduler.is_pending(handle));
    assert!(scheduler.is_empty());
}

#[test]
fn cancelling_unknown_or_finished_handles_is_a_no_op() {
    let mut scheduler = Scheduler::<()>::new();
    let handle = scheduler.schedule(|_| true);
    let report = scheduler.tick(FRAME, &mut ());

    assert_eq!(report.completed, vec![handle]);
    assert!(!scheduler.cancel(handle));
    assert!(!scheduler.cancel(handle));

    let live = scheduler.schedule(|_| false);
    assert!(scheduler.cancel(live));
    assert!(!scheduler.cancel(live));
}

#[test]
fn tasks_run_in_registration_order() {
    let mut scheduler = Scheduler::<Vec<&'static str>>::new();
    let mut log = Vec::new();
    for name in ["first", "second", "third"] {
        let _ = scheduler.schedule(move |cx| {
            cx.state_mut().push(name);
            false
        });
    }

    let _ = scheduler.tick(FRAME, &mut log);
    let _ = scheduler.tick(FRAME, &mut log);
    assert_eq!(
        log,
        vec!["first", "second", "third", "first", "second", "third"]
    );
}

#[test]
fn completion_mid_tick_leaves_remaining_tasks_untouched() {
    let mut scheduler = Scheduler::<Vec<&'static str>>::new();
    let mut log = Vec::new();
    let _ = scheduler.schedule(|cx| {
        cx.state_mut().push("a");
        false
    });
    let middle = scheduler.schedule(|cx| {
        cx.state_mut().push("b");
        true
    });
    let _ = scheduler.schedule(|cx| {
        cx.state_mut().push("c");
        false
    });

    let report = scheduler.tick(FRAME, &mut log);
    assert_eq!(report.completed, vec![middle]);
    let _ = scheduler.tick(FRAME, &mut log);

    assert_eq!(log, vec!["a", "b", "c", "a", "c"]);
    assert_eq!(scheduler.len(), 2);
}

#[test]
fn self_cancellation_stops_a_task() {
    let mut scheduler = Scheduler::<u32>::new();
    let mut polls = 0;
    let handle = scheduler.schedule(|cx| {
        *cx.state_mut() += 1;
        let own = cx.handle();
        let _ = cx.cancel(own);
        false
    });

    let report = scheduler.tick(FRAME, &mut polls);
    let _ = scheduler.tick(FRAME, &mut polls);

    assert_eq!(polls, 1);
    assert!(report.completed.is_empty());
    assert!(!scheduler.is_pending(handle));
}

#[test]
fn cancellation_during_a_tick_skips_later_tasks_immediately() {
    let mut scheduler = Scheduler::<Vec<&'static str>>::new();
    let mut log = Vec::new();
    let victim = Rc::new(Cell::new(None));

    let target = Rc::clone(&victim);
    let _ = scheduler.schedule(move |cx| {
        cx.state_mut().push("canceller");
        if let Some(handle) = target.get() {
            assert!(cx.cancel(handle));
        }
        true
    });
    victim.set(Some(scheduler.schedule(|cx| {
        cx.state_mut().push("victim");
        false
    })));

    let _ = scheduler.tick(FRAME, &mut log);
    let _ = scheduler.tick(FRAME, &mut log);

    assert_eq!(log, vec!["canceller"]);
    assert!(scheduler.is_empty());
}

#[test]
fn tasks_spawned_mid_tick_start_on_the_next_tick() {
    let mut scheduler = Scheduler::<Vec<u64>>::new();
    let mut log = Vec::new();
    let _ = scheduler.schedule(|cx| {
        let _ = cx.schedule(|inner| {
            let index = inner.frame().index();
            inner.state_mut().push(index);
            true
        });
        true
    });

    let _ = scheduler.tick(FRAME, &mut log);
    assert!(log.is_empty());
    assert_eq!(scheduler.len(), 1);

    let _ = scheduler.tick(FRAME, &mut log);
    assert_eq!(log, vec![1]);
    assert!(scheduler.is_empty());
}

#[test]
fn delay_fires_once_the_threshold_accumulates() {
    let mut scheduler = Scheduler::<Vec<u64>>::new();
    let mut fired = Vec::new();
    let handle = scheduler.delay(Duration::from_secs(1), |cx| {
        let index = cx.frame().index();
        cx.state_mut().push(index);
    });

    let mut completed_at = None;
    for tick in 0..5 {
        let report = scheduler.tick(Duration::from_millis(400), &mut fired);
        if report.completed.contains(&handle) {
            completed_at = Some(tick);
        }
    }

    assert_eq!(fired, vec![2]);
    assert_eq!(completed_at, Some(2));
}

#[test]
fn zero_delay_fires_on_the_first_tick() {
    let mut scheduler = Scheduler::<u32>::new();
    let mut count = 0;
    let _ = scheduler.delay(Duration::ZERO, |cx| *cx.state_mut() += 1);

    let _ = scheduler.tick(Duration::ZERO, &mut count);
    assert_eq!(count, 1);
    assert!(scheduler.is_empty());
}

struct FailsOnSecondPoll {
    polls: u32,
}

impl Task<u32> for FailsOnSecondPoll {
    fn poll(&mut self, cx: &mut TaskContext<'_, u32>) -> Result<Progress, TaskFault> {
        self.polls += 1;
        *cx.state_mut() += 1;
        if self.polls == 2 {
            return Err(TaskFault::new("second poll"));
        }
        Ok(Progress::Pending)
    }
}

#[test]
fn faulted_tasks_are_deregistered_and_reported() {
    let mut scheduler = Scheduler::<u32>::new();
    let mut polls = 0;
    let handle = scheduler.schedule_task(Box::new(FailsOnSecondPoll { polls: 0 }));

    assert!(scheduler.tick(FRAME, &mut polls).faulted.is_empty());
    let report = scheduler.tick(FRAME, &mut polls);
    let _ = scheduler.tick(FRAME, &mut polls);

    assert_eq!(report.faulted, vec![(handle, TaskFault::new("second poll"))]);
    assert_eq!(polls, 2);
    assert!(!scheduler.is_pending(handle));
}

#[test]
fn cancel_all_drops_pending_and_freshly_spawned_tasks() {
    let mut scheduler = Scheduler::<u32>::new();
    let mut polls = 0;
    let _ = scheduler.schedule(|cx| {
        *cx.state_mut() += 1;
        let _ = cx.schedule(|_| false);
        false
    });
    let _ = scheduler.tick(FRAME, &mut polls);
    assert_eq!(scheduler.len(), 2);

    assert_eq!(scheduler.cancel_all(), 2);
    let _ = scheduler.tick(FRAME, &mut polls);
    assert_eq!(polls, 1);
    assert!(scheduler.is_empty());
}
