//! Benchmark driver: runs the engine lifecycle for every configured
//! extent × precision × variant combination and reports each timed run.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::backend::Backend;
use crate::config::BenchConfig;
use crate::context::Context;
use crate::engine::buffer_sizes;
use crate::error::BenchError;
use crate::extent::Extent;
use crate::num::Float;
use crate::precision::{Precision, PrecisionKind};
use crate::report::{BenchRecord, ResultSink};
use crate::timer::{Phase, PhaseTimings, Timer};
use crate::variant::Variant;

/// Outcome of one lifecycle run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub alloc_size: usize,
    pub plan_size: usize,
    pub timings: PhaseTimings,
}

/// Deterministic test signal of `len` real scalars.
pub fn host_signal<T: Float>(len: usize) -> Vec<T> {
    (0..len)
        .map(|i| {
            let x = i as f64;
            T::from_f64((0.05 * x).sin() + 0.25 * (0.31 * x).cos())
        })
        .collect()
}

/// Host input and output for one variant: `n` reals, or `n` interleaved
/// complex values stored as `2n` reals.
fn host_buffers<P: Precision>(variant: Variant, n: usize) -> (Vec<P::Real>, Vec<P::Real>) {
    let len = if variant.is_complex() { 2 * n } else { n };
    (host_signal(len), vec![<P::Real as Float>::zero(); len])
}

/// One timed pass through the full lifecycle.
///
/// Allocation and plan sizes are measured untimed first. Each phase is
/// followed by a device synchronisation inside its timing bracket. On error
/// the engine's drop releases whatever was acquired.
pub fn run_lifecycle<B: Backend, P: Precision>(
    context: &mut Context<B>,
    variant: Variant,
    extent: &Extent,
    input: &[P::Real],
    output: &mut [P::Real],
) -> Result<Measurement, BenchError> {
    let mut engine = context.engine::<P>(variant, extent.clone())?;
    let alloc_size = engine.alloc_size();
    let plan_size = engine.plan_size()?;
    let complex = variant.is_complex();

    let mut timer = Timer::new();
    timer.time(Phase::Allocate, || {
        engine.allocate()?;
        engine.synchronize()
    })?;
    timer.time(Phase::PlanForward, || {
        engine.init_forward_plan()?;
        engine.synchronize()
    })?;
    timer.time(Phase::Upload, || {
        if complex {
            engine.upload::<P::Complex>(bytemuck::cast_slice(input))?;
        } else {
            engine.upload(input)?;
        }
        engine.synchronize()
    })?;
    timer.time(Phase::ExecuteForward, || {
        engine.execute_forward()?;
        engine.synchronize()
    })?;
    timer.time(Phase::PlanBackward, || {
        engine.init_backward_plan()?;
        engine.synchronize()
    })?;
    timer.time(Phase::ExecuteBackward, || {
        engine.execute_backward()?;
        engine.synchronize()
    })?;
    timer.time(Phase::Download, || {
        if complex {
            engine.download::<P::Complex>(bytemuck::cast_slice_mut(output))?;
        } else {
            engine.download(output)?;
        }
        engine.synchronize()
    })?;
    timer.time(Phase::Destroy, || engine.destroy())?;

    Ok(Measurement {
        alloc_size,
        plan_size,
        timings: timer.finish(),
    })
}

/// Runs a [`BenchConfig`] against one backend.
pub struct Benchmark<B: Backend> {
    context: Context<B>,
    config: BenchConfig,
}

impl<B: Backend> Benchmark<B> {
    pub fn new(backend: B, config: BenchConfig) -> Self {
        Self {
            context: Context::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn context(&self) -> &Context<B> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context<B> {
        &mut self.context
    }

    /// Run every combination and return the number of records emitted.
    ///
    /// The context is created on the configured device up front and destroyed
    /// at the end, also when a combination fails.
    pub fn run<S: ResultSink>(&mut self, sink: &mut S) -> Result<usize, BenchError> {
        self.config.validate()?;
        self.context.create(self.config.device)?;
        let result = self.run_all(sink);
        let destroyed = self.context.destroy();
        let recorded = result?;
        destroyed?;
        Ok(recorded)
    }

    fn run_all<S: ResultSink>(&mut self, sink: &mut S) -> Result<usize, BenchError> {
        let extents = self.config.extents.clone();
        let precisions = self.config.precisions.clone();
        let variants = self.config.variants.clone();
        let mut recorded = 0;
        for extent in &extents {
            for &precision in &precisions {
                for &variant in &variants {
                    recorded += match precision {
                        PrecisionKind::Single => self.run_combination::<f32, S>(variant, extent, sink)?,
                        PrecisionKind::Double => self.run_combination::<f64, S>(variant, extent, sink)?,
                    };
                }
            }
        }
        Ok(recorded)
    }

    fn run_combination<P: Precision, S: ResultSink>(
        &mut self,
        variant: Variant,
        extent: &Extent,
        sink: &mut S,
    ) -> Result<usize, BenchError> {
        info!(
            "{}: {} {} {} ({} warmup + {} runs)",
            self.context.title(),
            variant,
            P::KIND,
            extent,
            self.config.warmups,
            self.config.runs
        );
        // reject extents whose buffers cannot be addressed before sizing host memory
        buffer_sizes::<P>(variant, extent)?;
        let (input, mut output) = host_buffers::<P>(variant, extent.len());
        let mut recorded = 0;
        for run in 0..self.config.total_runs() {
            let m = run_lifecycle::<B, P>(&mut self.context, variant, extent, &input, &mut output)?;
            if run < self.config.warmups {
                debug!("warmup {run} done in {:?}", m.timings.total());
                continue;
            }
            let mut record = BenchRecord {
                library: self.context.title().to_string(),
                variant: variant.name().to_string(),
                precision: P::KIND.name().to_string(),
                ndim: extent.ndim(),
                extent: extent.to_string(),
                run: run - self.config.warmups,
                alloc_size: m.alloc_size,
                plan_size: m.plan_size,
                phases_ms: BTreeMap::new(),
            };
            record.set_timings(&m.timings);
            sink.record(record);
            recorded += 1;
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_deterministic_and_bounded() {
        let a: Vec<f64> = host_signal(64);
        let b: Vec<f64> = host_signal(64);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() <= 1.25));
    }

    #[test]
    fn complex_host_buffers_hold_interleaved_pairs() {
        let (input, output) = host_buffers::<f32>(Variant::OutplaceComplex, 10);
        assert_eq!(input.len(), 20);
        assert_eq!(output.len(), 20);
        let (input, _) = host_buffers::<f32>(Variant::InplaceReal, 10);
        assert_eq!(input.len(), 10);
    }
}
