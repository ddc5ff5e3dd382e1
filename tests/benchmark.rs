mod common;

use common::{Event, MockBackend};
use gearbench::{
    BenchConfig, BenchError, BenchRecord, Benchmark, EnvInfo, Extent, Phase, PrecisionKind,
    ResultTable, Variant,
};

fn config(extents: &[&str]) -> BenchConfig {
    BenchConfig {
        runs: 2,
        warmups: 1,
        extents: extents.iter().map(|e| e.parse().unwrap()).collect(),
        ..BenchConfig::default()
    }
}

#[test]
fn records_every_timed_run() {
    let mut bench = Benchmark::new(MockBackend::new(), config(&["16", "4x6"]));
    let mut records: Vec<BenchRecord> = Vec::new();
    let n = bench.run(&mut records).unwrap();
    // 2 extents × 2 precisions × 4 variants × 2 runs
    assert_eq!(n, 32);
    assert_eq!(records.len(), 32);
    for r in &records {
        assert_eq!(r.library, "mock");
        assert!(r.run < 2);
        assert_eq!(r.phases_ms.len(), Phase::ALL.len());
    }
    let padded = records
        .iter()
        .find(|r| r.variant == "Inplace_Real" && r.precision == "float" && r.extent == "4x6")
        .unwrap();
    assert_eq!(padded.ndim, 2);
    assert_eq!(padded.alloc_size, 2 * 16 * 4);
}

#[test]
fn warmups_execute_but_are_not_recorded() {
    let cfg = BenchConfig {
        variants: vec![Variant::OutplaceComplex],
        precisions: vec![PrecisionKind::Double],
        ..config(&["8"])
    };
    let mut bench = Benchmark::new(MockBackend::new(), cfg);
    let mut records: Vec<BenchRecord> = Vec::new();
    bench.run(&mut records).unwrap();
    assert_eq!(records.len(), 2);
    let execs = bench.context().backend().exec_calls();
    // three lifecycles, forward and backward each
    assert_eq!(execs.len(), 6);
    assert!(execs.iter().all(|c| c.starts_with("exec_z2z")));
}

#[test]
fn context_is_torn_down_after_the_run() {
    let mut bench = Benchmark::new(MockBackend::new(), config(&["8"]));
    bench.run(&mut Vec::<BenchRecord>::new()).unwrap();
    let backend = bench.context().backend();
    assert!(!bench.context().is_created());
    assert_eq!(backend.events.first(), Some(&Event::Init(0)));
    assert_eq!(backend.events.last(), Some(&Event::Reset));
    assert_eq!(backend.live_allocations(), 0);
    assert!(backend.live_plans.is_empty());
}

#[test]
fn unknown_device_aborts_before_any_work() {
    let cfg = BenchConfig {
        device: 5,
        ..config(&["8"])
    };
    let mut bench = Benchmark::new(MockBackend::new(), cfg);
    let err = bench.run(&mut Vec::<BenchRecord>::new()).unwrap_err();
    assert!(matches!(err, BenchError::UnknownDevice { requested: 5, .. }));
    assert!(bench.context().backend().events.is_empty());
}

#[test]
fn failing_combination_still_resets_context() {
    let mut backend = MockBackend::new();
    backend.exec_status = Some(gearbench::Status::ExecFailed);
    let mut bench = Benchmark::new(backend, config(&["8"]));
    let err = bench.run(&mut Vec::<BenchRecord>::new()).unwrap_err();
    assert!(matches!(err, BenchError::Backend { .. }));
    let backend = bench.context().backend();
    assert_eq!(backend.events.last(), Some(&Event::Reset));
    assert_eq!(backend.live_allocations(), 0);
}

#[test]
fn results_write_as_csv_and_json() {
    let mut bench = Benchmark::new(MockBackend::new(), config(&["8"]));
    let mut table = ResultTable::new(EnvInfo::new("mock", &bench.context().device_infos()));
    bench.run(&mut table).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("out/results.csv");
    table.write(&csv).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().filter(|l| !l.starts_with(';')).count(), 1 + 16);

    let json = dir.path().join("results.json");
    table.write(&json).unwrap();
    let back = ResultTable::from_json(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(back.results.len(), 16);
    assert_eq!(back.results[0].extent, Extent::new(&[8]).unwrap().to_string());
}

#[test]
fn empty_selection_is_a_config_error() {
    let cfg = BenchConfig {
        variants: Vec::new(),
        ..config(&["8"])
    };
    let mut bench = Benchmark::new(MockBackend::new(), cfg);
    assert!(matches!(bench.run(&mut Vec::<BenchRecord>::new()), Err(BenchError::Config(_))));
}
