//! Scripted platform double shared by the integration tests.

use legym_cli::api::{Method, Reply, Transport};
use legym_cli::config::Config;
use legym_cli::error::{EngineError, Result};
use legym_cli::retry::RetryPolicy;
use legym_cli::Legym;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const LOGIN: &str = "/authorization/user/manage/login";
pub const SEMESTER: &str = "/education/semester/getCurrent";
pub const LIMITS: &str = "/running/app/getRunningLimit";
pub const ACTIVITIES: &str = "/education/app/activity/getActivityList";
pub const SIGN_UP: &str = "/education/app/activity/signUp";
pub const SIGN_IN: &str = "/education/activity/app/attainability/sign";
pub const RUN_START: &str = "/running/app/start";
pub const RUN_UPDATE: &str = "/running/app/update";
pub const RUN_FINISH: &str = "/running/app/finish";

pub const TOKEN: &str = "token-abc";

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub token: Option<String>,
    pub payload: Option<Value>,
}

type Handler = Box<dyn Fn(&Call, usize) -> Result<Reply> + Send + Sync>;

enum Route {
    /// Replies served in order; the last one repeats.
    Queue(VecDeque<Result<Reply>>),
    /// Computed from the call and how many times the path was hit before.
    Handler(Handler),
}

/// Transport spy: records every call and answers from scripted routes.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<Call>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the route for `path` with a sequence of replies.
    pub fn script(&self, path: &str, replies: Vec<Result<Reply>>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Queue(replies.into()));
    }

    /// Answer `path` with the same reply forever.
    pub fn always(&self, path: &str, reply: Result<Reply>) {
        self.script(path, vec![reply]);
    }

    /// Answer `path` with a closure.
    pub fn respond(
        &self,
        path: &str,
        handler: impl Fn(&Call, usize) -> Result<Reply> + Send + Sync + 'static,
    ) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Handler(Box::new(handler)));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls_to(path).len()
    }
}

impl Transport for MockTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        payload: Option<&Value>,
    ) -> Result<Reply> {
        let call = Call {
            method,
            path: path.to_string(),
            token: token.map(str::to_string),
            payload: payload.cloned(),
        };
        self.calls.lock().unwrap().push(call.clone());

        let nth = {
            let mut hits = self.hits.lock().unwrap();
            let n = hits.entry(path.to_string()).or_insert(0);
            *n += 1;
            *n - 1
        };

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(path) {
            Some(Route::Queue(queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(Route::Queue(queue)) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(EngineError::Transport("empty script".into()))),
            Some(Route::Handler(handler)) => handler(&call, nth),
            None => Err(EngineError::Transport(format!("no route for {path}"))),
        }
    }
}

#[allow(dead_code)]
pub fn ok(data: Value) -> Result<Reply> {
    Ok(Reply::new("", data))
}

#[allow(dead_code)]
pub fn ok_msg(message: &str) -> Result<Reply> {
    Ok(Reply::new(message, Value::Null))
}

#[allow(dead_code)]
pub fn activity(id: &str, name: &str, open: bool, registered: bool, signed: bool) -> Value {
    json!({
        "id": id,
        "name": name,
        "startDate": "2026-10-18 07:00:00",
        "endDate": "2026-10-18 21:00:00",
        "isOpen": open,
        "isRegister": registered,
        "isSign": signed,
    })
}

#[allow(dead_code)]
pub fn activity_list(items: Vec<Value>) -> Result<Reply> {
    ok(json!({ "items": items }))
}

/// Retries without sleeping and a fixed seed.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        retry: RetryPolicy::immediate(3),
        seed: Some(7),
        batch_size: 50,
        ..Config::default()
    }
}

/// A platform that accepts the login and reports default running limits.
#[allow(dead_code)]
pub fn platform() -> Arc<MockTransport> {
    let mock = MockTransport::new();
    mock.always(
        LOGIN,
        ok(json!({
            "id": "u-1",
            "realName": "Li Hua",
            "schoolName": "Test University",
            "accessToken": TOKEN,
        })),
    );
    mock.always(SEMESTER, ok(json!({ "id": "sem-2026" })));
    mock.always(
        LIMITS,
        ok(json!({
            "dailyMileage": 2.0,
            "effectiveMileageStart": 0.5,
            "effectiveMileageEnd": 5.0,
        })),
    );
    mock
}

#[allow(dead_code)]
pub fn login(mock: &Arc<MockTransport>) -> Legym<Arc<MockTransport>> {
    Legym::login(mock.clone(), test_config(), "student", "secret").expect("login")
}
