mod common;

use common::*;
use legym_cli::activity::ActivityState;
use legym_cli::error::EngineError;

fn catalog_reply() -> legym_cli::Result<legym_cli::api::Reply> {
    activity_list(vec![
        activity("a", "Morning Run", true, false, false),
        activity("b", "Badminton", true, true, false),
        activity("c", "Yoga", true, true, true),
        activity("d", "Swimming", false, false, false),
        // Checked in, window since closed: still signed.
        activity("e", "Hiking", false, true, true),
        activity("f", "Evening Run", true, false, false),
    ])
}

#[test]
fn test_catalog_is_classified() {
    let mock = platform();
    mock.always(ACTIVITIES, catalog_reply());
    let mut engine = login(&mock);

    let catalog = engine.list_activities().unwrap();
    let state_of = |id: &str| {
        catalog
            .activities()
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.state)
            .unwrap()
    };
    assert_eq!(state_of("a"), ActivityState::Available);
    assert_eq!(state_of("b"), ActivityState::Registered);
    assert_eq!(state_of("c"), ActivityState::Signed);
    assert_eq!(state_of("d"), ActivityState::Blocked);
    assert_eq!(state_of("e"), ActivityState::Signed);
}

#[test]
fn test_filter_partitions_without_overlap() {
    let mock = platform();
    mock.always(ACTIVITIES, catalog_reply());
    let mut engine = login(&mock);
    let total = engine.list_activities().unwrap().len();

    let mut ids: Vec<String> = ActivityState::ALL
        .into_iter()
        .flat_map(|state| engine.filter_by_state(state).map(|a| a.id.clone()).collect::<Vec<_>>())
        .collect();
    assert_eq!(ids.len(), total);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(engine.filter_by_state(ActivityState::Available).count(), 2);
}

#[test]
fn test_filter_never_refetches() {
    let mock = platform();
    mock.always(ACTIVITIES, catalog_reply());
    let mut engine = login(&mock);

    assert!(engine.catalog().is_none());
    assert_eq!(engine.filter_by_state(ActivityState::Available).count(), 0);
    assert_eq!(mock.count(ACTIVITIES), 0);

    engine.list_activities().unwrap();
    for _ in 0..3 {
        let _ = engine.filter_by_state(ActivityState::Signed).count();
    }
    assert_eq!(mock.count(ACTIVITIES), 1);
}

#[test]
fn test_transient_list_failure_is_retried() {
    let mock = platform();
    mock.script(
        ACTIVITIES,
        vec![Err(EngineError::Transport("timed out".into())), catalog_reply()],
    );
    let mut engine = login(&mock);

    assert_eq!(engine.list_activities().unwrap().len(), 6);
    assert_eq!(mock.count(ACTIVITIES), 2);
}

#[test]
fn test_persistent_list_failure_surfaces() {
    let mock = platform();
    mock.always(ACTIVITIES, Err(EngineError::Transport("HTTP 502".into())));
    let mut engine = login(&mock);

    assert!(matches!(engine.list_activities(), Err(EngineError::Transport(_))));
    assert_eq!(mock.count(ACTIVITIES), 3);
    // The session is still usable afterwards.
    mock.always(ACTIVITIES, catalog_reply());
    assert!(engine.list_activities().is_ok());
}
