// Synthesis of a time-ordered running trace.
//
// A run's mean speed is drawn once from a bounded normal distribution;
// per-sample speed then wanders around it as a mean-reverting walk, so the
// pace curve is neither flat nor erratic. Samples land every few seconds
// like GPS fixes, laid out along a circular track.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};
use geo::{Destination, Haversine, Point};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Speed band and distribution for synthesized runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PaceModel {
    /// Slowest plausible speed (inclusive)
    pub min_speed_mps: f64,
    /// Fastest plausible speed (inclusive)
    pub max_speed_mps: f64,
    /// Centre of the per-run mean speed distribution
    pub mean_speed_mps: f64,
    /// Spread of the per-run mean speed
    pub speed_stddev_mps: f64,
    /// How strongly each sample's speed follows the previous one (0..1)
    pub persistence: f64,
    /// Sample-to-sample speed noise
    pub jitter_mps: f64,
    /// Shortest gap between samples
    pub min_interval_ms: u64,
    /// Longest gap between samples
    pub max_interval_ms: u64,
}

impl Default for PaceModel {
    fn default() -> Self {
        Self {
            min_speed_mps: 2.2,
            max_speed_mps: 4.2,
            mean_speed_mps: 3.0,
            speed_stddev_mps: 0.3,
            persistence: 0.8,
            jitter_mps: 0.15,
            min_interval_ms: 3_000,
            max_interval_ms: 5_000,
        }
    }
}

impl PaceModel {
    pub fn validate(&self) -> Result<()> {
        let bad = |what: &str| Err(EngineError::Config(format!("Invalid pace model: {what}")));
        if !(self.min_speed_mps > 0.0 && self.min_speed_mps < self.max_speed_mps) {
            return bad("speed band must satisfy 0 < min < max");
        }
        if !(self.min_speed_mps..=self.max_speed_mps).contains(&self.mean_speed_mps) {
            return bad("mean speed outside the band");
        }
        if !(self.speed_stddev_mps >= 0.0 && self.jitter_mps >= 0.0) {
            return bad("spreads must be non-negative");
        }
        if !(0.0..1.0).contains(&self.persistence) {
            return bad("persistence must be in 0..1");
        }
        if self.min_interval_ms == 0 || self.min_interval_ms > self.max_interval_ms {
            return bad("sample interval must satisfy 0 < min <= max");
        }
        Ok(())
    }

    /// Whether `speed` lies inside the plausible band.
    pub fn admits(&self, speed_mps: f64) -> bool {
        (self.min_speed_mps..=self.max_speed_mps).contains(&speed_mps)
    }

    fn band_centre(&self) -> f64 {
        (self.min_speed_mps + self.max_speed_mps) / 2.0
    }

    fn bounded(&self, rng: &mut impl Rng, mean: f64, stddev: f64) -> f64 {
        bounded_normal(rng, mean, stddev, self.min_speed_mps, self.max_speed_mps)
    }
}

/// Circular track the trace is laid out on.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_m: f64,
}

impl Default for Track {
    /// A 400 m lap.
    fn default() -> Self {
        Self {
            center_latitude: 30.630_0,
            center_longitude: 104.083_0,
            radius_m: 400.0 / (2.0 * PI),
        }
    }
}

impl Track {
    pub fn center(&self) -> Point<f64> {
        Point::new(self.center_longitude, self.center_latitude)
    }

    /// Position after running `distance_m` from the lap start, which is due
    /// north of the centre; laps run clockwise.
    pub fn position_at(&self, distance_m: f64) -> Point<f64> {
        let bearing = (distance_m / self.radius_m).to_degrees().rem_euclid(360.0);
        Haversine.destination(self.center(), bearing, self.radius_m)
    }
}

/// One GPS-like fix of the synthesized run.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSample {
    pub at: DateTime<Utc>,
    /// Milliseconds since the first sample
    pub elapsed_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Cumulative distance at this fix
    pub distance_m: f64,
    /// Speed over the segment ending at this fix (first fix: starting speed)
    pub speed_mps: f64,
}

impl TraceSample {
    pub fn position(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Ordered samples of one synthesized run.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    samples: Vec<TraceSample>,
}

impl Trace {
    pub fn samples(&self) -> &[TraceSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.distance_m)
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.last().map_or(0, |s| s.elapsed_ms)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.at)
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.at)
    }

    /// Speed implied by each consecutive pair of samples.
    pub fn segment_speeds(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.windows(2).map(|pair| {
            let metres = pair[1].distance_m - pair[0].distance_m;
            let secs = (pair[1].elapsed_ms - pair[0].elapsed_ms) as f64 / 1000.0;
            metres / secs
        })
    }

    pub fn average_speed_mps(&self) -> f64 {
        match self.duration_ms() {
            0 => 0.0,
            ms => self.total_distance_m() / (ms as f64 / 1000.0),
        }
    }

    /// Average pace in seconds per kilometre.
    pub fn pace_secs_per_km(&self) -> f64 {
        match self.average_speed_mps() {
            v if v > 0.0 => 1000.0 / v,
            _ => 0.0,
        }
    }
}

/// Builds traces from a pace model and a track.
#[derive(Debug, Clone, Default)]
pub struct TraceGenerator {
    pub pace: PaceModel,
    pub track: Track,
}

impl TraceGenerator {
    pub fn new(pace: PaceModel, track: Track) -> Self {
        Self { pace, track }
    }

    /// Synthesize a run covering exactly `distance_m` that finishes at
    /// `ends_at`. `distance_m` must be positive.
    pub fn synthesize(&self, distance_m: f64, ends_at: DateTime<Utc>, rng: &mut impl Rng) -> Trace {
        debug_assert!(distance_m > 0.0, "trace distance must be positive, got {distance_m}");
        let pace = &self.pace;
        let run_mean = pace.bounded(rng, pace.mean_speed_mps, pace.speed_stddev_mps);
        let innovation = pace.jitter_mps * (1.0 - pace.persistence * pace.persistence).sqrt();

        let mut speed = run_mean;
        let mut points: Vec<(u64, f64, f64)> = vec![(0, 0.0, speed)];
        let mut elapsed_ms = 0u64;
        let mut covered = 0.0f64;

        while covered < distance_m {
            speed = pace.bounded(rng, run_mean + pace.persistence * (speed - run_mean), innovation);
            let interval_ms = rng.gen_range(pace.min_interval_ms..=pace.max_interval_ms);
            let step = speed * interval_ms as f64 / 1000.0;
            let remaining = distance_m - covered;

            // A leftover shorter than one minimal fix is folded into this
            // segment, so the last gap never collapses to a few milliseconds.
            let min_step = speed * pace.min_interval_ms as f64 / 1000.0;
            if remaining - step < min_step {
                let exact_ms = remaining / speed * 1000.0;
                // Rounding toward the band centre keeps the implied speed in band.
                let tail_ms = if speed > pace.band_centre() {
                    exact_ms.ceil()
                } else {
                    exact_ms.floor()
                };
                elapsed_ms += (tail_ms as u64).max(1);
                covered = distance_m;
            } else {
                elapsed_ms += interval_ms;
                covered += step;
            }
            points.push((elapsed_ms, covered, speed));
        }

        let started_at = ends_at - Duration::milliseconds(elapsed_ms as i64);
        let samples = points
            .into_iter()
            .map(|(elapsed_ms, distance_m, speed_mps)| {
                let position = self.track.position_at(distance_m);
                TraceSample {
                    at: started_at + Duration::milliseconds(elapsed_ms as i64),
                    elapsed_ms,
                    latitude: position.y(),
                    longitude: position.x(),
                    distance_m,
                    speed_mps,
                }
            })
            .collect();
        Trace { samples }
    }
}

/// Normal draw restricted to `lo..=hi` by rejection, clamped as a last resort.
fn bounded_normal(rng: &mut impl Rng, mean: f64, stddev: f64, lo: f64, hi: f64) -> f64 {
    let Ok(normal) = Normal::new(mean, stddev) else {
        return mean.clamp(lo, hi);
    };
    for _ in 0..16 {
        let v = normal.sample(rng);
        if (lo..=hi).contains(&v) {
            return v;
        }
    }
    mean.clamp(lo, hi)
}
