use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gearbench::benchmark::host_signal;
use gearbench::{
    run_lifecycle, BenchConfig, BenchRecord, Context, EnvInfo, Extent, Float, HostBackend,
    Precision, PrecisionKind, ResultTable,
};
use once_cell::sync::Lazy;

/// First `runs` lifecycles of every benchmark, with per-phase timings.
static RESULTS: Lazy<Mutex<Vec<BenchRecord>>> = Lazy::new(|| Mutex::new(Vec::new()));

const RESULTS_DIR: &str = "../benchmarks";

fn bench_precision<P: Precision>(
    c: &mut Criterion,
    ctx: &mut Context<HostBackend>,
    config: &BenchConfig,
    extent: &Extent,
) {
    let mut group = c.benchmark_group(format!("{}_{}", P::KIND, extent));
    for &variant in &config.variants {
        let len = if variant.is_complex() {
            2 * extent.len()
        } else {
            extent.len()
        };
        let input: Vec<P::Real> = host_signal(len);
        let mut output = vec![<P::Real as Float>::zero(); len];
        let mut run = 0;
        group.bench_function(BenchmarkId::new(variant.name(), extent), |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let m = run_lifecycle::<_, P>(ctx, variant, extent, &input, &mut output).unwrap();
                    total += m.timings.total();
                    if run >= config.runs {
                        continue;
                    }
                    let mut record = BenchRecord {
                        library: ctx.title().into(),
                        variant: variant.name().into(),
                        precision: P::KIND.name().into(),
                        ndim: extent.ndim(),
                        extent: extent.to_string(),
                        run,
                        alloc_size: m.alloc_size,
                        plan_size: m.plan_size,
                        phases_ms: BTreeMap::new(),
                    };
                    record.set_timings(&m.timings);
                    RESULTS.lock().unwrap().push(record);
                    run += 1;
                }
                total
            });
        });
    }
    group.finish();
}

fn save_results(device: &str) {
    let table = ResultTable {
        env: EnvInfo::new("host", device),
        results: RESULTS.lock().unwrap().clone(),
    };
    let dir = Path::new(RESULTS_DIR);
    let latest = dir.join("latest.json");
    if latest.exists() {
        let _ = fs::rename(&latest, dir.join("previous.json"));
    }
    table.write(&latest).unwrap();
}

fn main_bench(c: &mut Criterion) {
    let config = BenchConfig::default().with_env().unwrap();
    let mut ctx = Context::new(HostBackend::new());
    ctx.create(config.device).unwrap();
    for extent in &config.extents {
        for precision in &config.precisions {
            match precision {
                PrecisionKind::Single => {
                    bench_precision::<f32>(c, &mut ctx, &config, extent)
                }
                PrecisionKind::Double => {
                    bench_precision::<f64>(c, &mut ctx, &config, extent)
                }
            }
        }
    }
    let device = ctx.device_infos();
    ctx.destroy().unwrap();
    save_results(&device);
}

criterion_group!(benches, main_bench);
criterion_main!(benches);
