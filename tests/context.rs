mod common;

use common::{device, Event, MockBackend};
use gearbench::{BenchError, Context, Extent, Variant};

#[test]
fn unknown_device_is_rejected() {
    let mut ctx = Context::new(MockBackend::new());
    let err = ctx.create(3).unwrap_err();
    assert_eq!(err, BenchError::UnknownDevice { requested: 3, available: 1 });
    assert!(!ctx.is_created());
    assert!(ctx.backend().events.is_empty());
}

#[test]
fn create_and_destroy_drive_the_runtime() {
    let mut ctx = Context::new(MockBackend::with_devices(vec![device("a"), device("b")]));
    ctx.create(1).unwrap();
    assert_eq!(ctx.device(), 1);
    ctx.destroy().unwrap();
    ctx.destroy().unwrap();
    assert_eq!(ctx.backend().events, vec![Event::Init(1), Event::Reset]);
}

#[test]
fn device_line_describes_selected_device() {
    let mut ctx = Context::new(MockBackend::with_devices(vec![device("first"), device("second")]));
    ctx.create(1).unwrap();
    assert_eq!(
        ctx.device_infos(),
        "\"second\", \"Version\", 1, \"Memory [MiB]\", 1024"
    );
    let list = ctx.device_list();
    let lines: Vec<&str> = list.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("0: \"first\""));
    assert!(lines[1].starts_with("1: \"second\""));
}

#[test]
fn empty_device_list_gives_empty_line() {
    let ctx = Context::new(MockBackend::with_devices(Vec::new()));
    assert_eq!(ctx.device_infos(), "");
    assert_eq!(ctx.device_list(), "");
}

#[test]
fn engine_requires_a_created_context() {
    let mut ctx = Context::new(MockBackend::new());
    let extent = Extent::new(&[16]).unwrap();
    assert!(matches!(
        ctx.engine::<f32>(Variant::OutplaceReal, extent.clone()),
        Err(BenchError::ContextNotCreated)
    ));
    ctx.create(0).unwrap();
    let engine = ctx.engine::<f32>(Variant::OutplaceReal, extent).unwrap();
    assert_eq!(engine.device(), 0);
    drop(engine);
    let huge = Extent::new(&[1 << 61, 4]).unwrap();
    assert!(matches!(
        ctx.engine::<f64>(Variant::InplaceComplex, huge),
        Err(BenchError::InvalidExtent(_))
    ));
}

#[test]
fn destroy_before_create_does_nothing() {
    let mut ctx = Context::new(MockBackend::new());
    ctx.destroy().unwrap();
    assert!(ctx.backend().events.is_empty());
}
