/// Session, scheduler and replay integration tests.
use narrative_constraints::core::scheduler::{Scheduler, SchedulerConfig};
use narrative_constraints::core::script::{parse_script, replay};
use narrative_constraints::core::session::Session;
use narrative_constraints::stories::reentry::Reentry;
use narrative_constraints::stories::stave::{Stave, StaveNotice};
use std::time::{Duration, Instant};

const SCRIPT: &str = "
tick x30
> accept
> routes
tick 2 x100
> diag
> trace surfcom
> main
> seal 3B
tick x400
";

fn replayed(seed: u64) -> Session<Stave> {
    let steps = parse_script(SCRIPT).unwrap();
    let mut session = Session::new(Stave::default(), seed);
    replay(&mut session, &steps, |_| {});
    session
}

#[test]
fn same_seed_same_script_same_snapshot() {
    let a = replayed(2024);
    let b = replayed(2024);
    assert_eq!(*a.snapshot(), *b.snapshot());
}

#[test]
fn reset_replays_identically() {
    let steps = parse_script(SCRIPT).unwrap();
    let mut session = Session::new(Stave::default(), 5);
    replay(&mut session, &steps, |_| {});
    let first = session.snapshot();
    session.reset();
    replay(&mut session, &steps, |_| {});
    assert_eq!(*first, *session.snapshot());
}

#[test]
fn seeds_change_the_route_table() {
    let base = Session::new(Stave::default(), 0).snapshot();
    let differs = (1..6u64).any(|seed| Session::new(Stave::default(), seed).snapshot().pme.routes != base.pme.routes);
    assert!(differs);
}

#[test]
fn garbage_input_leaves_state_alone() {
    let mut session = Session::new(Stave::default(), 1);
    let before = session.snapshot();
    let step = session.submit("open the pod bay doors");
    assert_eq!(*step.snapshot, *before);
    assert!(matches!(step.notices.as_slice(), [StaveNotice::NotUnderstood(_)]));
    assert!(step.events.is_empty());
}

#[test]
fn scheduler_ticks_stave_in_the_background() {
    let config = SchedulerConfig { cadence_ms: 2, dt: 1.0 };
    let mut scheduler = Scheduler::start(Session::new(Stave::default(), 9), &config).unwrap();
    for expected in 1..=5u64 {
        let step = scheduler
            .updates()
            .recv_timeout(Duration::from_secs(5))
            .expect("tick arrives");
        assert_eq!(step.snapshot.system.tick_count, expected);
    }
    let step = scheduler.submit("status");
    assert!(matches!(step.notices.as_slice(), [StaveNotice::Status(_)]));
    scheduler.stop();
    assert!(!scheduler.is_running());
}

#[test]
fn scheduler_stops_itself_when_reentry_ends() {
    let config = SchedulerConfig { cadence_ms: 1, dt: 1.0 };
    let scheduler = Scheduler::start(Session::new(Reentry::default(), 0), &config).unwrap();
    let deadline = Instant::now() + Duration::from_secs(20);
    while !scheduler.is_terminal() {
        assert!(Instant::now() < deadline, "reentry did not reach its ending");
        std::thread::sleep(Duration::from_millis(5));
    }
    let last = scheduler.snapshot();
    assert!(last.scrub >= 95.0);
    assert_eq!(last.attractor_proximity, 1.0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler.is_running() {
        assert!(Instant::now() < deadline, "worker kept running after the ending");
        std::thread::sleep(Duration::from_millis(5));
    }
}
