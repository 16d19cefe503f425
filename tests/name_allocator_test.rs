use hashbrown::HashSet;
use std::sync::Arc;
use std::thread;
use textmodel::core::NameAllocator;
use textmodel::loader::Namespace;
use textmodel::{constant, BackendId, EngineConfig, LoaderKind, TextModel, TextModelEngine};

#[test]
fn test_concurrent_names_are_unique() {
    let _ = env_logger::builder().is_test(true).try_init();

    let names = Arc::new(NameAllocator::new("N$", Arc::new(Namespace::new())));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let names = Arc::clone(&names);
            thread::spawn(move || (0..500).map(|_| names.next()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for name in handle.join().unwrap() {
            assert!(name.starts_with("N$"));
            assert!(seen.insert(name), "duplicate name");
        }
    }
    assert_eq!(seen.len(), 8 * 500);
}

#[cfg(feature = "assembly")]
#[test]
fn test_live_names_are_skipped() {
    use textmodel::backend::assembly::AssemblyCompiler;
    use textmodel::core::UnitPlan;
    use textmodel::{DynamicLoader, UnitCompiler};

    let loader = DynamicLoader::new(vec![LoaderKind::Threaded]);
    let mut plan = UnitPlan::new();
    plan.push_text("held");
    let unit = AssemblyCompiler.compile_unit("N$1", &plan).unwrap();
    let held = loader.load(Some("N$1".to_string()), &unit).unwrap();

    let names = NameAllocator::new("N$", Arc::clone(loader.namespace()));
    assert_eq!(names.next(), "N$0");
    assert_eq!(names.next(), "N$2");

    drop(held);
    let names = NameAllocator::new("N$", Arc::clone(loader.namespace()));
    assert_eq!(names.next(), "N$0");
    assert_eq!(names.next(), "N$1");
}

#[test]
fn test_engine_uses_configured_prefix() {
    let config = EngineConfig::default()
        .backend(BackendId::Assembly)
        .loaders([LoaderKind::Threaded])
        .name_prefix("Custom$");
    let engine = TextModelEngine::new(config).unwrap();
    assert_eq!(engine.names().prefix(), "Custom$");

    let mut builder = engine.builder::<()>();
    builder.append_text("x").append_model(constant("y"));
    assert_eq!(builder.build().unwrap().evaluate(&()), "xy");
}
