//! Result reporting: records per lifecycle run and sinks that collect them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::timer::{Phase, PhaseTimings};

/// Measurements of one lifecycle run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BenchRecord {
    pub library: String,
    pub variant: String,
    pub precision: String,
    pub ndim: usize,
    pub extent: String,
    pub run: usize,
    /// Device bytes held by the variant's buffers.
    pub alloc_size: usize,
    /// Worst-case plan work area in bytes.
    pub plan_size: usize,
    /// Phase name → milliseconds.
    pub phases_ms: BTreeMap<String, f64>,
}

impl BenchRecord {
    pub fn set_timings(&mut self, timings: &PhaseTimings) {
        self.phases_ms = timings
            .iter()
            .map(|(phase, d)| (phase.name().to_string(), d.as_secs_f64() * 1e3))
            .collect();
    }

    pub fn phase_ms(&self, phase: Phase) -> Option<f64> {
        self.phases_ms.get(phase.name()).copied()
    }
}

/// Receives records as the benchmark produces them.
pub trait ResultSink {
    fn record(&mut self, record: BenchRecord);
}

impl ResultSink for Vec<BenchRecord> {
    fn record(&mut self, record: BenchRecord) {
        self.push(record);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EnvInfo {
    pub library: String,
    pub device: String,
    pub os: String,
    pub date: String,
}

impl EnvInfo {
    pub fn new(library: &str, device: &str) -> Self {
        Self {
            library: library.to_string(),
            device: device.to_string(),
            os: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            date: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// In-memory sink that dumps to JSON or CSV.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResultTable {
    pub env: EnvInfo,
    pub results: Vec<BenchRecord>,
}

impl ResultSink for ResultTable {
    fn record(&mut self, record: BenchRecord) {
        self.results.push(record);
    }
}

impl ResultTable {
    pub fn new(env: EnvInfo) -> Self {
        Self {
            env,
            results: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// One header line, then one line per record with phases in lifecycle order.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("; library: {}\n", self.env.library));
        out.push_str(&format!("; device: {}\n", self.env.device));
        out.push_str(&format!("; date: {}\n", self.env.date));
        out.push_str("library,variant,precision,ndim,extent,run,alloc_size,plan_size");
        for phase in Phase::ALL {
            out.push_str(&format!(",{}_ms", phase.name()));
        }
        out.push('\n');
        for r in &self.results {
            out.push_str(&format!(
                "{},{},{},{},\"{}\",{},{},{}",
                r.library, r.variant, r.precision, r.ndim, r.extent, r.run, r.alloc_size, r.plan_size
            ));
            for phase in Phase::ALL {
                match r.phase_ms(phase) {
                    Some(ms) => out.push_str(&format!(",{ms:.6}")),
                    None => out.push(','),
                }
            }
            out.push('\n');
        }
        out
    }

    /// Write CSV for `.csv` paths, pretty JSON otherwise.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let body = if is_csv {
            self.to_csv()
        } else {
            self.to_json()?
        };
        fs::write(path, body)
    }
}
