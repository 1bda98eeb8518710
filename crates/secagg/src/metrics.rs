//! Timings of the pipeline stages.
//!
//! Each measured stage emits an `info` event under the `secagg::metrics`
//! target, and is recorded in a [`StageTimings`] returned to the caller.

use std::fmt::{self, Display};
use std::time::{Duration, Instant};
use tracing::info;

/// A measured stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Generation of the key set.
    KeyGeneration,
    /// Encryption of a reading by a client.
    Encryption,
    /// Reading and deserialization of all contributions.
    Deserialization,
    /// Homomorphic fold of the contributions.
    Computation,
    /// Decryption and decoding of the aggregate.
    Decryption,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::KeyGeneration => f.write_str("key generation"),
            Stage::Encryption => f.write_str("encryption"),
            Stage::Deserialization => f.write_str("deserialization"),
            Stage::Computation => f.write_str("computation"),
            Stage::Decryption => f.write_str("decryption"),
        }
    }
}

/// Durations of the stages run so far, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimings {
    entries: Vec<(Stage, Duration)>,
}

impl StageTimings {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the duration of a stage. A stage recorded twice accumulates.
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        match self.entries.iter_mut().find(|(s, _)| *s == stage) {
            Some((_, d)) => *d += elapsed,
            None => self.entries.push((stage, elapsed)),
        }
    }

    /// Returns the duration of a stage, if it ran.
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.entries
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
    }

    /// Returns the total duration of all stages.
    pub fn total(&self) -> Duration {
        self.entries.iter().map(|(_, d)| *d).sum()
    }

    /// Iterate over the recorded stages.
    pub fn iter(&self) -> impl Iterator<Item = &(Stage, Duration)> {
        self.entries.iter()
    }

    /// Append the stages of another record.
    pub fn extend(&mut self, other: &StageTimings) {
        other.iter().for_each(|(s, d)| self.record(*s, *d))
    }
}

/// Run `f` as `stage`, log its duration and record it in `timings`.
pub fn timed<T, F: FnOnce() -> T>(timings: &mut StageTimings, stage: Stage, f: F) -> T {
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    info!(
        target: "secagg::metrics",
        %stage,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "stage completed"
    );
    timings.record(stage, elapsed);
    out
}
