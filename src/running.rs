// Run submission: distance resolution and the start/update/finish upload.
//
// The upload is strictly ordered. `start` yields a run id that every
// update and the final `finish` carry. Updates are retried one at a time
// with the identical payload; once any update has gone through, `start`
// is never issued again for this run. `finish` is sent at most once and
// only after every update succeeded.

use crate::api::{Method, Transport};
use crate::error::{EngineError, Result};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::trace::{Trace, TraceGenerator, TraceSample};
use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use serde_json::{json, Value};

const SEMESTER_PATH: &str = "/education/semester/getCurrent";
const LIMITS_PATH: &str = "/running/app/getRunningLimit";
const START_PATH: &str = "/running/app/start";
const UPDATE_PATH: &str = "/running/app/update";
const FINISH_PATH: &str = "/running/app/finish";

/// Distance rules the platform applies to the user, in kilometres.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningLimits {
    /// Distance credited by a default run
    pub daily_km: f64,
    pub min_km: f64,
    pub max_km: f64,
}

impl Default for RunningLimits {
    fn default() -> Self {
        Self {
            daily_km: 2.0,
            min_km: 0.5,
            max_km: 5.0,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LimitsData {
    daily_mileage: f64,
    effective_mileage_start: f64,
    effective_mileage_end: f64,
}

#[derive(Deserialize, Debug)]
struct SemesterData {
    id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StartData {
    run_id: String,
}

impl RunningLimits {
    /// Query the user's limits for `semester_id`.
    ///
    /// A platform refusal, or limits that cannot be honoured, yield
    /// `fallback`; transport failures propagate.
    pub fn fetch<T: Transport>(
        session: &Session<T>,
        semester_id: &str,
        retry: &RetryPolicy,
        fallback: &RunningLimits,
    ) -> Result<Self> {
        let payload = json!({ "semesterId": semester_id });
        let reply = retry.run("running limits", || {
            session.authenticated_request(Method::Post, LIMITS_PATH, Some(&payload))
        });
        match reply {
            Ok(reply) => {
                let data: LimitsData = reply.parse("running limits")?;
                let limits = Self {
                    daily_km: data.daily_mileage,
                    min_km: data.effective_mileage_start,
                    max_km: data.effective_mileage_end,
                };
                if limits.is_consistent() {
                    Ok(limits)
                } else {
                    tracing::warn!(?limits, "Inconsistent running limits, using defaults");
                    Ok(fallback.clone())
                }
            }
            Err(err @ (EngineError::Rejected(_) | EngineError::Http { .. })) => {
                tracing::warn!(reason = %err, "Running limits unavailable, using defaults");
                Ok(fallback.clone())
            }
            Err(err) => Err(err),
        }
    }

    /// `0 < min <= daily <= max`, all finite.
    pub fn is_consistent(&self) -> bool {
        [self.daily_km, self.min_km, self.max_km]
            .iter()
            .all(|km| km.is_finite())
            && self.min_km > 0.0
            && self.min_km <= self.daily_km
            && self.daily_km <= self.max_km
    }

    /// Pick the distance to submit. Out-of-range requests are refused, not
    /// clamped; the daily default goes through the same check.
    pub fn resolve(&self, requested_km: Option<f64>) -> Result<f64> {
        let km = requested_km.unwrap_or(self.daily_km);
        // A run needs at least one segment, whatever the platform minimum says.
        if km.is_finite() && km > 0.0 && km >= self.min_km && km <= self.max_km {
            Ok(km)
        } else {
            Err(EngineError::InvalidDistance {
                requested: km,
                min: self.min_km,
                max: self.max_km,
            })
        }
    }
}

/// Identifier of the current semester, needed by the running endpoints.
pub fn fetch_semester_id<T: Transport>(session: &Session<T>, retry: &RetryPolicy) -> Result<String> {
    let reply = retry.run("current semester", || {
        session.authenticated_request(Method::Get, SEMESTER_PATH, None)
    })?;
    let data: SemesterData = reply.parse("semester")?;
    Ok(data.id)
}

/// What happened to one run submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Platform run id, once `start` succeeded
    pub run_id: Option<String>,
    /// Credited distance; zero unless `success`
    pub distance_km: f64,
    pub success: bool,
    /// Samples in the synthesized trace
    pub samples: usize,
    /// Platform message on success, abort reason otherwise
    pub message: String,
}

impl RunReport {
    fn aborted(run_id: Option<String>, samples: usize, reason: impl Into<String>) -> Self {
        Self {
            run_id,
            distance_km: 0.0,
            success: false,
            samples,
            message: reason.into(),
        }
    }

    /// `(distance, success)` pair.
    pub fn as_tuple(&self) -> (f64, bool) {
        (self.distance_km, self.success)
    }
}

/// Synthesizes traces and drives the upload sequence.
pub struct RunSimulator {
    generator: TraceGenerator,
    retry: RetryPolicy,
    batch_size: usize,
    limits: RunningLimits,
    semester_id: String,
    rng: ChaCha8Rng,
}

impl RunSimulator {
    pub fn new(
        generator: TraceGenerator,
        retry: RetryPolicy,
        batch_size: usize,
        limits: RunningLimits,
        semester_id: String,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            generator,
            retry,
            batch_size: batch_size.max(1),
            limits,
            semester_id,
            rng,
        }
    }

    pub fn limits(&self) -> &RunningLimits {
        &self.limits
    }

    /// Synthesize and upload one run.
    ///
    /// Distance validation happens before any network call. Aborts come
    /// back as a failed report; an expired session or an indeterminate
    /// `finish` come back as errors.
    pub fn submit<T: Transport>(
        &mut self,
        session: &Session<T>,
        target_km: Option<f64>,
    ) -> Result<RunReport> {
        let distance_km = self.limits.resolve(target_km)?;
        let trace = self
            .generator
            .synthesize(distance_km * 1000.0, Utc::now(), &mut self.rng);
        tracing::info!(
            distance_km,
            samples = trace.len(),
            duration_s = trace.duration_ms() / 1000,
            "Run trace synthesized"
        );

        let run_id = match self.start(session, distance_km, &trace) {
            Ok(run_id) => run_id,
            Err(EngineError::SessionExpired) => return Err(EngineError::SessionExpired),
            Err(err) => {
                tracing::warn!(error = %err, "Run start failed");
                return Ok(RunReport::aborted(None, trace.len(), err.to_string()));
            }
        };

        for (batch, chunk) in trace.samples().chunks(self.batch_size).enumerate() {
            let payload = json!({
                "runId": run_id,
                "batch": batch,
                "points": chunk.iter().map(sample_json).collect::<Vec<_>>(),
            });
            let sent = self.retry.run("run update", || {
                session.authenticated_request(Method::Post, UPDATE_PATH, Some(&payload))
            });
            match sent {
                Ok(_) => tracing::debug!(run_id = %run_id, batch, "Run update accepted"),
                Err(EngineError::SessionExpired) => return Err(EngineError::SessionExpired),
                Err(err) => {
                    tracing::warn!(run_id = %run_id, batch, error = %err, "Run aborted, finish withheld");
                    return Ok(RunReport::aborted(Some(run_id), trace.len(), err.to_string()));
                }
            }
        }

        self.finish(session, run_id, distance_km, &trace)
    }

    fn start<T: Transport>(&self, session: &Session<T>, distance_km: f64, trace: &Trace) -> Result<String> {
        let started_at = trace.started_at().unwrap_or_else(Utc::now);
        let payload = json!({
            "semesterId": self.semester_id,
            "targetDistance": distance_km,
            "startTime": started_at.timestamp_millis(),
            "pointCount": trace.len(),
        });
        let run_id = self.retry.run("run start", || {
            session
                .authenticated_request(Method::Post, START_PATH, Some(&payload))?
                .parse::<StartData>("run start")
                .map(|data| data.run_id)
        })?;
        tracing::info!(run_id = %run_id, "Run started");
        Ok(run_id)
    }

    /// Single attempt: a blind retry could credit the run twice.
    fn finish<T: Transport>(
        &self,
        session: &Session<T>,
        run_id: String,
        distance_km: f64,
        trace: &Trace,
    ) -> Result<RunReport> {
        let finished_at = trace.finished_at().unwrap_or_else(Utc::now);
        let payload = json!({
            "runId": run_id,
            "semesterId": self.semester_id,
            "distance": distance_km,
            "endTime": finished_at.timestamp_millis(),
            "duration": trace.duration_ms() / 1000,
            "averagePace": trace.pace_secs_per_km().round(),
            "pointCount": trace.len(),
        });

        match session.authenticated_request(Method::Post, FINISH_PATH, Some(&payload)) {
            Ok(reply) => {
                tracing::info!(run_id = %run_id, distance_km, "Run credited");
                Ok(RunReport {
                    run_id: Some(run_id),
                    distance_km,
                    success: true,
                    samples: trace.len(),
                    message: reply.message,
                })
            }
            Err(EngineError::SessionExpired) => Err(EngineError::SessionExpired),
            // Never delivered, or explicitly refused: nothing was credited.
            Err(err @ (EngineError::Unreachable(_) | EngineError::Rejected(_))) => {
                tracing::warn!(run_id = %run_id, error = %err, "Run finish refused");
                Ok(RunReport::aborted(Some(run_id), trace.len(), err.to_string()))
            }
            Err(EngineError::Transport(detail)) => {
                tracing::error!(run_id = %run_id, detail = %detail, "Run finish outcome unknown");
                Err(EngineError::UnknownSubmissionOutcome { run_id, detail })
            }
            Err(err) => Ok(RunReport::aborted(Some(run_id), trace.len(), err.to_string())),
        }
    }
}

fn sample_json(sample: &TraceSample) -> Value {
    json!({
        "t": sample.at.timestamp_millis(),
        "lat": sample.latitude,
        "lng": sample.longitude,
        "distance": sample.distance_m,
        "speed": sample.speed_mps,
    })
}
