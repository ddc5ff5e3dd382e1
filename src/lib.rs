//! # gearbench - uniform FFT benchmark harness
//!
//! Times the full lifecycle of FFT transforms on a device back-end:
//! buffer allocation, plan creation, host→device upload, forward and
//! backward execution, device→host download and teardown.
//!
//! Every combination of
//!
//! - **variant**: in-place / out-of-place × real / complex,
//! - **precision**: `float` / `double`,
//! - **rank**: 1D, 2D, 3D
//!
//! goes through one [`TransformEngine`], parameterised by a runtime
//! [`Variant`] tag and a [`Precision`] type.
//!
//! ## Back-ends
//!
//! A back-end implements [`Backend`]: device runtime (init, reset, memory,
//! flat and pitched copies) plus the FFT library entry points. The `host`
//! feature (default) provides [`HostBackend`], an emulated device that
//! executes plans with `rustfft`/`realfft`.
//!
//! ## Example
//!
//! ```
//! use gearbench::{BenchConfig, Benchmark, HostBackend};
//!
//! let config = BenchConfig {
//!     runs: 1,
//!     warmups: 0,
//!     extents: vec!["16".parse().unwrap()],
//!     ..BenchConfig::default()
//! };
//! let mut bench = Benchmark::new(HostBackend::new(), config);
//! let mut records = Vec::new();
//! let n = bench.run(&mut records).unwrap();
//! assert_eq!(n, 8); // 4 variants × 2 precisions
//! ```
//!
//! ## Configuration
//!
//! [`BenchConfig::with_env`] reads `GEARBENCH_DEVICE`, `GEARBENCH_RUNS`,
//! `GEARBENCH_WARMUPS` and `GEARBENCH_EXTENTS`.
//!
//! ## Logging
//!
//! Progress goes through the [`log`] facade; install any logger (the CLI
//! uses `env_logger`) and set `RUST_LOG=gearbench=debug` for plan and
//! buffer details.

pub mod backend;
pub mod benchmark;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod extent;
#[cfg(feature = "host")]
pub mod host;
pub mod num;
pub mod precision;
pub mod report;
pub mod timer;
pub mod variant;

pub use backend::{Backend, DeviceInfo, DevicePtr, PlanHandle, Status};
pub use benchmark::{run_lifecycle, Benchmark, Measurement};
pub use config::BenchConfig;
pub use context::Context;
pub use engine::TransformEngine;
pub use error::{check, BenchError};
pub use extent::Extent;
#[cfg(feature = "host")]
pub use host::HostBackend;
pub use num::{Complex, Complex32, Complex64, Float};
pub use precision::{Direction, Precision, PrecisionKind, TransformType};
pub use report::{BenchRecord, EnvInfo, ResultSink, ResultTable};
pub use timer::{Phase, PhaseTimings, Timer};
pub use variant::Variant;
