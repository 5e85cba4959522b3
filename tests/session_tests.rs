mod common;

use common::*;
use legym_cli::api::Method;
use legym_cli::error::EngineError;
use legym_cli::running::RunningLimits;
use legym_cli::Legym;
use serde_json::json;

#[test]
fn test_login_returns_identity() {
    let mock = platform();
    let engine = login(&mock);

    assert_eq!(engine.identity(), ("Li Hua", "Test University"));
    assert_eq!(engine.session().user_id(), "u-1");

    let calls = mock.calls_to(LOGIN);
    let login_call = &calls[0];
    assert_eq!(login_call.method, Method::Post);
    assert_eq!(login_call.token, None);
    let payload = login_call.payload.as_ref().unwrap();
    assert_eq!(payload["userName"], "student");
    assert_eq!(payload["password"], "secret");
}

#[test]
fn test_calls_after_login_carry_token() {
    let mock = platform();
    mock.always(ACTIVITIES, activity_list(vec![]));
    let mut engine = login(&mock);
    engine.list_activities().unwrap();

    for call in mock.calls().iter().filter(|c| c.path != LOGIN) {
        assert_eq!(call.token.as_deref(), Some(TOKEN), "{}", call.path);
    }
}

#[test]
fn test_bad_credentials_are_authentication_errors() {
    let mock = platform();
    mock.always(LOGIN, Err(EngineError::Rejected("wrong password".into())));

    let err = Legym::login(mock.clone(), test_config(), "student", "nope").unwrap_err();
    assert_eq!(err, EngineError::Authentication("wrong password".into()));
    // Not retried, nothing else attempted.
    assert_eq!(mock.calls().len(), 1);
}

#[test]
fn test_network_failure_is_not_a_credential_failure() {
    let mock = platform();
    mock.always(LOGIN, Err(EngineError::Unreachable("connection refused".into())));

    let err = Legym::login(mock.clone(), test_config(), "student", "secret").unwrap_err();
    assert!(matches!(err, EngineError::Unreachable(_)));
    assert!(!err.is_auth_failure());
}

#[test]
fn test_missing_token_fails_login() {
    let mock = platform();
    mock.always(
        LOGIN,
        ok(json!({"id": "u-1", "realName": "Li Hua", "schoolName": "T", "accessToken": ""})),
    );
    let err = Legym::login(mock.clone(), test_config(), "student", "secret").unwrap_err();
    assert!(matches!(err, EngineError::Authentication(_)));
}

#[test]
fn test_expired_session_surfaces_distinctly() {
    let mock = platform();
    mock.always(ACTIVITIES, Err(EngineError::SessionExpired));
    let mut engine = login(&mock);

    let err = engine.list_activities().unwrap_err();
    assert_eq!(err, EngineError::SessionExpired);
    // Auth loss is not retried.
    assert_eq!(mock.count(ACTIVITIES), 1);
}

#[test]
fn test_platform_limits_are_used() {
    let mock = platform();
    mock.always(
        LIMITS,
        ok(json!({"dailyMileage": 3.0, "effectiveMileageStart": 1.0, "effectiveMileageEnd": 6.0})),
    );
    let engine = login(&mock);
    assert_eq!(
        engine.running_limits(),
        &RunningLimits { daily_km: 3.0, min_km: 1.0, max_km: 6.0 }
    );
    assert_eq!(
        mock.calls_to(LIMITS)[0].payload.as_ref().unwrap()["semesterId"],
        "sem-2026"
    );
}

#[test]
fn test_refused_limits_fall_back_to_defaults() {
    let mock = platform();
    mock.always(LIMITS, Err(EngineError::Rejected("no running plan".into())));
    let engine = login(&mock);
    assert_eq!(engine.running_limits(), &RunningLimits::default());
}

#[test]
fn test_unreachable_limits_fail_login() {
    let mock = platform();
    mock.always(LIMITS, Err(EngineError::Unreachable("refused".into())));
    let err = Legym::login(mock.clone(), test_config(), "student", "secret").unwrap_err();
    assert!(matches!(err, EngineError::Unreachable(_)));
    assert_eq!(mock.count(LIMITS), 3);
}
