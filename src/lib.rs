// Library root
// -----------
// Automation engine for the Legym campus fitness platform. The binary
// (`main.rs`) is a thin command loop over `engine::Legym`.
//
// Module responsibilities:
// - `api`: the `Transport` seam and its blocking HTTP implementation.
// - `session`: login and the authenticated request capability.
// - `activity`: activity catalog and lifecycle classification.
// - `registration`: sign-up and check-in actions.
// - `trace` / `running`: run synthesis and the start/update/finish upload.
// - `engine`: the facade the front end talks to.
// - `ui`: the interactive command loop.
pub mod activity;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod registration;
pub mod retry;
pub mod running;
pub mod session;
pub mod trace;
pub mod ui;

pub use engine::Legym;
pub use error::{EngineError, Result};
