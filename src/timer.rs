//! Per-phase wall-clock timing of the engine lifecycle.

use core::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Benchmarked lifecycle phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Allocate,
    PlanForward,
    Upload,
    ExecuteForward,
    PlanBackward,
    ExecuteBackward,
    Download,
    Destroy,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Allocate,
        Phase::PlanForward,
        Phase::Upload,
        Phase::ExecuteForward,
        Phase::PlanBackward,
        Phase::ExecuteBackward,
        Phase::Download,
        Phase::Destroy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Allocate => "allocate",
            Phase::PlanForward => "plan_forward",
            Phase::Upload => "upload",
            Phase::ExecuteForward => "execute_forward",
            Phase::PlanBackward => "plan_backward",
            Phase::ExecuteBackward => "execute_backward",
            Phase::Download => "download",
            Phase::Destroy => "destroy",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Durations recorded for one lifecycle run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    durations: [Option<Duration>; 8],
}

impl PhaseTimings {
    pub fn get(&self, phase: Phase) -> Option<Duration> {
        self.durations[phase.index()]
    }

    /// Accumulates when the same phase is timed more than once.
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let slot = &mut self.durations[phase.index()];
        *slot = Some(slot.unwrap_or_default() + elapsed);
    }

    pub fn total(&self) -> Duration {
        self.durations.iter().flatten().sum()
    }

    /// Recorded phases in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = (Phase, Duration)> + '_ {
        Phase::ALL
            .into_iter()
            .filter_map(|p| self.get(p).map(|d| (p, d)))
    }
}

/// Brackets closures with [`Instant`] reads.
#[derive(Debug, Default)]
pub struct Timer {
    timings: PhaseTimings,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` and record its wall time under `phase`, whether or not it fails.
    pub fn time<T, E>(&mut self, phase: Phase, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Instant::now();
        let out = f();
        self.timings.record(phase, start.elapsed());
        out
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    pub fn finish(self) -> PhaseTimings {
        self.timings
    }
}
