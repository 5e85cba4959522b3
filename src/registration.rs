// Registration (sign-up) and check-in (sign-in) against catalog entries.

use crate::activity::{Activity, ActivityCatalog, ActivityState};
use crate::api::{Method, Transport};
use crate::error::{EngineError, Result};
use crate::session::Session;
use serde_json::json;
use std::collections::BTreeMap;

const SIGN_UP_PATH: &str = "/education/app/activity/signUp";
const SIGN_IN_PATH: &str = "/education/activity/app/attainability/sign";

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub activity_name: String,
    pub activity_id: String,
    /// The platform's own wording, success or refusal alike
    pub message: String,
}

/// Register for the activity named by `selector`, or for the single open
/// registrable activity when no selector is given.
///
/// Refusals from the platform ("already registered", "full") are outcomes,
/// not errors, so the message comes back verbatim. Sent once: a retry after
/// a lost reply would only ever see "already registered".
pub fn sign_up<T: Transport>(
    session: &Session<T>,
    catalog: &ActivityCatalog,
    selector: Option<&str>,
) -> Result<SignUpOutcome> {
    let target = select_target(catalog, selector)?;
    let payload = json!({ "activityId": target.id });

    let sent = session.authenticated_request(Method::Post, SIGN_UP_PATH, Some(&payload));
    let message = match sent {
        Ok(reply) if reply.message.is_empty() => "Registered".to_string(),
        Ok(reply) => reply.message,
        Err(EngineError::Rejected(msg)) => {
            tracing::warn!(activity = %target.name, reason = %msg, "Sign-up refused");
            msg
        }
        Err(err) => return Err(err),
    };

    tracing::info!(activity = %target.name, "Sign-up submitted");
    Ok(SignUpOutcome {
        activity_name: target.name.clone(),
        activity_id: target.id.clone(),
        message,
    })
}

/// Check in to every registered activity.
///
/// Attempts are independent: a failed one is reported under its activity
/// name and the rest still run. Only an expired session stops the loop.
pub fn sign_in<T: Transport>(
    session: &Session<T>,
    catalog: &ActivityCatalog,
) -> Result<BTreeMap<String, String>> {
    let mut results = BTreeMap::new();
    for activity in catalog.filter_by_state(ActivityState::Registered) {
        let payload = json!({
            "userId": session.user_id(),
            "activityId": activity.id,
            "times": 2,
            "activityType": 0,
            "attainabilityType": 2,
            "pageType": "activity",
        });

        let message = match session.authenticated_request(Method::Put, SIGN_IN_PATH, Some(&payload)) {
            Ok(reply) if reply.message.is_empty() => "Signed in".to_string(),
            Ok(reply) => reply.message,
            Err(EngineError::SessionExpired) => return Err(EngineError::SessionExpired),
            Err(err) => {
                tracing::warn!(activity = %activity.name, error = %err, "Check-in failed");
                err.to_string()
            }
        };

        let key = if results.contains_key(&activity.name) {
            format!("{} ({})", activity.name, activity.id)
        } else {
            activity.name.clone()
        };
        results.insert(key, message);
    }
    Ok(results)
}

/// Pick the activity a sign-up should target.
fn select_target<'a>(catalog: &'a ActivityCatalog, selector: Option<&str>) -> Result<&'a Activity> {
    let Some(selector) = selector else {
        let mut open = catalog.filter_by_state(ActivityState::Available);
        return match (open.next(), open.next()) {
            (Some(only), None) => Ok(only),
            (None, _) => Err(EngineError::AmbiguousActivity { count: 0 }),
            (Some(_), Some(_)) => Err(EngineError::AmbiguousActivity {
                count: 2 + open.count(),
            }),
        };
    };

    let available: Vec<&Activity> = catalog.filter_by_state(ActivityState::Available).collect();
    if let Some(found) = match_selector(&available, selector)? {
        return Ok(found);
    }

    // Already registered or signed: still forwarded so the platform's
    // own "already registered" answer reaches the user.
    let taken: Vec<&Activity> = catalog
        .activities()
        .iter()
        .filter(|a| matches!(a.state, ActivityState::Registered | ActivityState::Signed))
        .collect();
    match_selector(&taken, selector)?
        .ok_or_else(|| EngineError::NotFound(selector.to_string()))
}

/// Exact id or name first, then a unique case-insensitive name substring.
fn match_selector<'a>(candidates: &[&'a Activity], selector: &str) -> Result<Option<&'a Activity>> {
    let selector = selector.trim();
    if let Some(exact) = candidates
        .iter()
        .find(|a| a.id == selector || a.name == selector)
    {
        return Ok(Some(*exact));
    }

    let needle = selector.to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }
    let hits: Vec<&Activity> = candidates
        .iter()
        .copied()
        .filter(|a| a.name.to_lowercase().contains(&needle))
        .collect();
    match hits.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(EngineError::AmbiguousActivity { count: many.len() }),
    }
}
