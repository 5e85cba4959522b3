// Campus activity catalog and lifecycle classification.

use crate::api::{Method, Transport};
use crate::error::{EngineError, Result};
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

const ACTIVITY_LIST_PATH: &str = "/education/app/activity/getActivityList";

/// Lifecycle state of an activity from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityState {
    /// Checked in; attendance already credited
    Signed,
    /// Registered, not yet checked in
    Registered,
    /// Open for registration
    Available,
    /// Window not open yet
    Blocked,
}

/// Category names accepted from user input, matched by prefix.
const STATE_NAMES: &[(&str, ActivityState)] = &[
    ("signed", ActivityState::Signed),
    ("registered", ActivityState::Registered),
    ("available", ActivityState::Available),
    ("blocked", ActivityState::Blocked),
];

impl ActivityState {
    /// Display order, most progressed first.
    pub const ALL: [ActivityState; 4] = [
        ActivityState::Signed,
        ActivityState::Registered,
        ActivityState::Available,
        ActivityState::Blocked,
    ];

    /// Derive the state from the three signals the platform reports.
    /// Precedence is SIGNED > REGISTERED > AVAILABLE > BLOCKED.
    pub fn classify(window_open: bool, registered: bool, signed: bool) -> Self {
        if signed {
            ActivityState::Signed
        } else if registered {
            ActivityState::Registered
        } else if window_open {
            ActivityState::Available
        } else {
            ActivityState::Blocked
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityState::Signed => "Signed",
            ActivityState::Registered => "Registered",
            ActivityState::Available => "Available",
            ActivityState::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActivityState {
    type Err = EngineError;

    /// Case-insensitive prefix lookup, e.g. `reg` or `S`.
    fn from_str(input: &str) -> Result<Self> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Err(EngineError::UnknownCategory(input.to_string()));
        }
        STATE_NAMES
            .iter()
            .find(|(name, _)| name.starts_with(&needle))
            .map(|(_, state)| *state)
            .ok_or_else(|| EngineError::UnknownCategory(input.to_string()))
    }
}

/// Raw activity record as the platform reports it.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    id: String,
    name: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    is_open: bool,
    #[serde(default)]
    is_register: bool,
    #[serde(default)]
    is_sign: bool,
}

#[derive(Deserialize, Debug)]
struct ActivityPage {
    #[serde(default)]
    items: Vec<RawActivity>,
}

/// A classified campus activity.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: String,
    pub name: String,
    /// Window opening time as reported by the platform
    pub opens_at: Option<String>,
    /// Window closing time as reported by the platform
    pub closes_at: Option<String>,
    pub registered: bool,
    pub signed: bool,
    pub state: ActivityState,
}

impl From<RawActivity> for Activity {
    fn from(raw: RawActivity) -> Self {
        let state = ActivityState::classify(raw.is_open, raw.is_register, raw.is_sign);
        Self {
            id: raw.id,
            name: raw.name,
            opens_at: raw.start_date,
            closes_at: raw.end_date,
            registered: raw.is_register,
            signed: raw.is_sign,
            state,
        }
    }
}

/// Snapshot of the activity list at the time it was fetched.
///
/// Views never re-fetch; the caller decides when the snapshot is stale.
#[derive(Debug, Clone)]
pub struct ActivityCatalog {
    activities: Vec<Activity>,
    fetched_at: DateTime<Utc>,
}

impl ActivityCatalog {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            fetched_at: Utc::now(),
        }
    }

    /// Fetch and classify every activity visible to the session's user.
    pub fn fetch<T: Transport>(session: &Session<T>) -> Result<Self> {
        let payload = json!({
            "name": "",
            "campus": "",
            "page": 1,
            "size": 999,
            "state": "",
            "topicId": "",
            "week": "",
        });
        let reply = session.authenticated_request(Method::Post, ACTIVITY_LIST_PATH, Some(&payload))?;
        let page: ActivityPage = reply.parse("activity list")?;
        let catalog = Self::new(page.items.into_iter().map(Activity::from).collect());
        tracing::debug!(count = catalog.len(), "Activity catalog fetched");
        Ok(catalog)
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Lazy view over the activities currently in `state`.
    pub fn filter_by_state(&self, state: ActivityState) -> impl Iterator<Item = &Activity> + '_ {
        self.activities.iter().filter(move |a| a.state == state)
    }

    /// Activities grouped in display order, empty groups included.
    pub fn grouped(&self) -> impl Iterator<Item = (ActivityState, Vec<&Activity>)> + '_ {
        ActivityState::ALL
            .into_iter()
            .map(move |state| (state, self.filter_by_state(state).collect()))
    }
}
