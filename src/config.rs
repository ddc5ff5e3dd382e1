//! Run configuration: defaults, environment overrides, validation.

use crate::error::BenchError;
use crate::extent::Extent;
use crate::precision::PrecisionKind;
use crate::variant::Variant;

/// Default number of recorded runs per combination.
pub const DEFAULT_RUNS: usize = 10;

/// Default number of unrecorded runs before the recorded ones.
pub const DEFAULT_WARMUPS: usize = 1;

pub const ENV_DEVICE: &str = "GEARBENCH_DEVICE";
pub const ENV_RUNS: &str = "GEARBENCH_RUNS";
pub const ENV_WARMUPS: &str = "GEARBENCH_WARMUPS";
/// Comma separated extents, e.g. `1024,64x64`.
pub const ENV_EXTENTS: &str = "GEARBENCH_EXTENTS";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub device: usize,
    pub runs: usize,
    pub warmups: usize,
    pub extents: Vec<Extent>,
    pub variants: Vec<Variant>,
    pub precisions: Vec<PrecisionKind>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let extents = ["1024", "64x64", "16x16x16"]
            .iter()
            .filter_map(|s| s.parse::<Extent>().ok())
            .collect();
        Self {
            device: 0,
            runs: DEFAULT_RUNS,
            warmups: DEFAULT_WARMUPS,
            extents,
            variants: Variant::ALL.to_vec(),
            precisions: PrecisionKind::ALL.to_vec(),
        }
    }
}

impl BenchConfig {
    /// Apply `GEARBENCH_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self, BenchError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Unset variables keep
    /// the current value; unparsable ones are errors.
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BenchError> {
        if let Some(v) = lookup(ENV_DEVICE) {
            self.device = parse_count(ENV_DEVICE, &v)?;
        }
        if let Some(v) = lookup(ENV_RUNS) {
            self.runs = parse_count(ENV_RUNS, &v)?;
        }
        if let Some(v) = lookup(ENV_WARMUPS) {
            self.warmups = parse_count(ENV_WARMUPS, &v)?;
        }
        if let Some(v) = lookup(ENV_EXTENTS) {
            self.extents = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse::<Extent>)
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.runs == 0 {
            return Err(BenchError::Config("runs must be at least 1".into()));
        }
        if self.extents.is_empty() {
            return Err(BenchError::Config("no extents selected".into()));
        }
        if self.variants.is_empty() {
            return Err(BenchError::Config("no variants selected".into()));
        }
        if self.precisions.is_empty() {
            return Err(BenchError::Config("no precisions selected".into()));
        }
        Ok(())
    }

    /// Number of lifecycle runs per combination, warmups included.
    pub fn total_runs(&self) -> usize {
        self.warmups + self.runs
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, BenchError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| BenchError::Config(format!("{key}={value} is not a non-negative integer")))
}
