/// Twenty Years Away driven through a session.
use narrative_constraints::core::session::Session;
use narrative_constraints::core::story::Story;
use narrative_constraints::stories::reentry::{Reentry, ReentryEvent, ReentryFlag, ReentryNotice, ReentryRule, SyncPoint};

#[test]
fn idle_drift_walks_the_whole_timeline() {
    let story = Reentry::default();
    let mut session = Session::new(Reentry::default(), 0);
    let mut events = Vec::new();
    let mut ticks = 0;
    while !session.is_terminal() && ticks < 1000 {
        let step = session.tick(1.0);
        assert_eq!(story.validate(&step.snapshot), Ok(()));
        events.extend(step.events);
        ticks += 1;
    }
    assert!(session.is_terminal());

    let reached: Vec<SyncPoint> = events
        .iter()
        .filter_map(|e| match e {
            ReentryEvent::SyncPointReached(sp) => Some(*sp),
            _ => None,
        })
        .collect();
    assert_eq!(reached, vec![SyncPoint::Sp2, SyncPoint::Sp3, SyncPoint::Sp4, SyncPoint::Sp5]);

    let fired: Vec<ReentryRule> = events
        .iter()
        .filter_map(|e| match e {
            ReentryEvent::TransformationFired(rule) => Some(*rule),
            _ => None,
        })
        .collect();
    assert_eq!(fired, ReentryRule::ALL.to_vec());
    assert_eq!(events.iter().filter(|e| **e == ReentryEvent::Ended).count(), 1);
    assert_eq!(events.iter().filter(|e| **e == ReentryEvent::FieldEngaged).count(), 1);
}

#[test]
fn jumping_the_scrubber_skips_the_escape_threshold() {
    let mut session = Session::new(Reentry::default(), 0);
    session.submit("scrub 99");
    let s = session.snapshot();
    assert!(!s.transformations.fired(ReentryRule::EscapeThreshold));
    assert!(!s.terminal);
    assert_eq!(s.attractor_proximity, 0.75);
    assert!(s.hysteresis.is_set(ReentryFlag::MetricTrustEroded));

    session.submit("scrub 20");
    session.submit("scrub 29");
    let s = session.snapshot();
    assert!(s.transformations.fired(ReentryRule::EscapeThreshold));
    assert!(!s.terminal, "the ending needs the scrubber back past 95");

    let step = session.submit("scrub 96");
    assert!(step.snapshot.terminal);
    assert!(step.events.contains(&ReentryEvent::Ended));
}

#[test]
fn status_reports_the_archival_voice() {
    let mut session = Session::new(Reentry::default(), 0);
    session.submit("probe 2");
    let step = session.submit("status");
    match step.notices.as_slice() {
        [ReentryNotice::Status { message, .. }] => assert!(message.contains("gap")),
        other => panic!("unexpected notices {:?}", other),
    }
}
