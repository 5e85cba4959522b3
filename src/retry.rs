// Bounded retry with exponential backoff for transient transport errors.

use crate::error::Result;
use std::thread;
use std::time::Duration;

/// How many times a retryable call is attempted and how long to wait
/// between attempts. Backoff doubles after each failure up to `max_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(4000),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent. The same closure is replayed each time.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        call = what,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    if !backoff.is_zero() {
                        thread::sleep(backoff);
                    }
                    backoff = (backoff * 2).min(self.max_backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = RetryPolicy::immediate(3).run("probe", || {
            calls += 1;
            if calls < 3 {
                Err(EngineError::Transport("timeout".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::immediate(2).run("probe", || {
            calls += 1;
            Err(EngineError::Unreachable("refused".into()))
        });
        assert!(matches!(result, Err(EngineError::Unreachable(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn does_not_retry_permanent_errors() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::immediate(5).run("probe", || {
            calls += 1;
            Err(EngineError::SessionExpired)
        });
        assert_eq!(result, Err(EngineError::SessionExpired));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let _ = RetryPolicy::immediate(0).run("probe", || {
            calls += 1;
            Err::<(), _>(EngineError::Transport("x".into()))
        });
        assert_eq!(calls, 1);
    }
}
