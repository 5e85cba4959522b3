// Error taxonomy shared by every engine component.
// Components return these to their caller; presentation is the front
// end's job.

/// Errors surfaced by the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session expired, please login again")]
    SessionExpired,

    #[error("Transport error: {0}")]
    Transport(String),

    /// The request never reached the platform (connection refused, DNS...).
    #[error("Platform unreachable: {0}")]
    Unreachable(String),

    /// An HTTP-level refusal (wrong URL, forbidden, bad request...), as
    /// opposed to a platform envelope rejection.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// The platform answered but refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("Activity not found: {0}")]
    NotFound(String),

    #[error("Ambiguous activity selection: {count} candidates")]
    AmbiguousActivity { count: usize },

    #[error("Invalid distance {requested} km (accepted range {min}..={max} km)")]
    InvalidDistance { requested: f64, min: f64, max: f64 },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Outcome of run {run_id} is unknown: {detail}")]
    UnknownSubmissionOutcome { run_id: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether a bounded retry may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transport(_) | EngineError::Unreachable(_))
    }

    /// Whether the session can no longer be used.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Authentication(_) | EngineError::SessionExpired
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
