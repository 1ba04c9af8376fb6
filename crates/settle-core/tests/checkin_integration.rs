//! Integration tests for adaptive check-ins at the session level.
//!
//! The session controller is the only trigger point: these tests drive it
//! with wall-clock ticks and verify when the check-in surfaces and how a
//! response bends the rest of the session.

use chrono::{DateTime, Duration, TimeZone, Utc};
use settle_core::{
    Activity, Adjustment, CheckInConfig, CheckInResponse, Event, Feeling, Library, Phase,
    SessionController, SessionMode, SessionStatus,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn response(feeling: Feeling, adjustment: Option<Adjustment>) -> CheckInResponse {
    CheckInResponse {
        feeling,
        wants_to_adjust: adjustment.is_some(),
        adjustment,
    }
}

#[test]
fn test_check_in_surfaces_mid_focus() {
    let library = Library::builtin();
    let activity = Activity::from_focus(&library, "gentle-start").unwrap();
    let mut c = SessionController::new(CheckInConfig::default());
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    // too early in both wall-clock and progress terms
    assert!(c
        .tick(at(100))
        .iter()
        .all(|e| !matches!(e, Event::CheckInTriggered { .. })));

    let events = c.tick(at(250));
    let triggered = events.iter().find_map(|e| match e {
        Event::CheckInTriggered {
            elapsed_secs,
            progress,
            ..
        } => Some((*elapsed_secs, *progress)),
        _ => None,
    });
    let (elapsed, progress) = triggered.expect("check-in should fire mid-session");
    assert_eq!(elapsed, 250);
    assert!(progress > 0.4 && progress < 0.5);
}

#[test]
fn test_only_one_automatic_check_in_per_session() {
    let library = Library::builtin();
    let activity = Activity::from_focus(&library, "deep-block").unwrap();
    let mut c = SessionController::new(CheckInConfig::default());
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    let first = c.tick(at(1200));
    assert!(first
        .iter()
        .any(|e| matches!(e, Event::CheckInTriggered { .. })));

    // later windows would qualify, but the budget is spent
    for s in [1500, 1800, 2000] {
        assert!(c
            .tick(at(s))
            .iter()
            .all(|e| !matches!(e, Event::CheckInTriggered { .. })));
    }
    assert_eq!(c.check_in_state().check_ins_shown, 1);
}

#[test]
fn test_struggling_shortens_the_next_phase() {
    let library = Library::builtin();
    let activity = Activity::from_breathing(&library, "box").unwrap();
    let mut c = SessionController::new(CheckInConfig::default());
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    let events = c
        .respond_to_check_in(response(Feeling::Struggling, None), at(1))
        .unwrap();
    assert!(matches!(events[0], Event::CheckInApplied { .. }));
    assert!((c.pacing() - 0.8).abs() < 1e-6);

    // the in-flight countdown is untouched; the next phase is scaled
    assert_eq!(c.descriptor().unwrap().countdown_remaining, 4);
    let events = c.tick(at(4));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PhaseChanged {
            phase: Phase::HoldIn,
            countdown_secs: 3,
            ..
        }
    )));
}

#[test]
fn test_extend_stretches_the_next_phase() {
    let library = Library::builtin();
    let activity = Activity::from_breathing(&library, "four-seven-eight").unwrap();
    let mut c = SessionController::new(CheckInConfig::default());
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    c.respond_to_check_in(response(Feeling::Better, Some(Adjustment::Extend)), at(1))
        .unwrap();
    assert!((c.pacing() - 1.1).abs() < 1e-6);

    // 7s hold stretches to 8
    let events = c.tick(at(4));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PhaseChanged {
            phase: Phase::HoldIn,
            countdown_secs: 8,
            ..
        }
    )));
}

#[test]
fn test_take_break_pauses_the_session() {
    let library = Library::builtin();
    let activity = Activity::from_breathing(&library, "box").unwrap();
    let mut c = SessionController::new(CheckInConfig::default());
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    let events = c
        .respond_to_check_in(response(Feeling::Same, Some(Adjustment::TakeBreak)), at(2))
        .unwrap();
    assert!(matches!(events[0], Event::CheckInApplied { .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SessionPaused { .. })));
    assert_eq!(c.status(), Some(SessionStatus::Paused));
}

#[test]
fn test_end_early_abandons_the_session() {
    let library = Library::builtin();
    let activity = Activity::from_breathing(&library, "box").unwrap();
    let mut c = SessionController::new(CheckInConfig::default());
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    let events = c
        .respond_to_check_in(
            response(Feeling::Struggling, Some(Adjustment::EndEarly)),
            at(2),
        )
        .unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SessionAbandoned { .. })));
    assert_eq!(c.status(), Some(SessionStatus::Abandoned));
    assert!(c.snapshot(at(3)).is_none());

    // pacing still went down before the session ended
    assert!((c.pacing() - 0.8).abs() < 1e-6);
}

#[test]
fn test_disabled_check_ins_never_surface() {
    let library = Library::builtin();
    let activity = Activity::from_focus(&library, "gentle-start").unwrap();
    let config = CheckInConfig {
        enabled: false,
        ..CheckInConfig::default()
    };
    let mut c = SessionController::new(config);
    c.start(SessionMode::Single, vec![activity], t0()).unwrap();

    for s in [250, 300, 420] {
        assert!(c
            .tick(at(s))
            .iter()
            .all(|e| !matches!(e, Event::CheckInTriggered { .. })));
    }
}
