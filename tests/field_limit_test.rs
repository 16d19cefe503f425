use std::sync::Arc;
use textmodel::{
    constant, BackendId, EngineConfig, FatalCause, LoaderKind, TextModel, TextModelEngine,
    TextModelError, TextModelResult,
};

/// Largest field count whose constructor locals still fit a `u16` index.
const MAX_FIELDS: usize = u16::MAX as usize - 1;

fn engine(backend: BackendId) -> Arc<TextModelEngine> {
    let config = EngineConfig::default()
        .backend(backend)
        .loaders([LoaderKind::Threaded]);
    TextModelEngine::new(config).unwrap()
}

fn build(engine: &Arc<TextModelEngine>, fields: usize) -> TextModelResult<String> {
    let mut builder = engine.builder::<()>();
    builder.append_text("x");
    for _ in 0..fields {
        builder.append_model(constant("y"));
    }
    Ok(builder.build_and_release()?.evaluate(&()))
}

fn assert_too_many_fields(err: &TextModelError, fields: usize) {
    assert!(err.is_fatal(), "{err}");
    assert!(
        matches!(err.cause(), Some(FatalCause::TooManyFields(n)) if *n as usize == fields),
        "{fields} fields: {:?}",
        err.cause()
    );
}

#[test]
fn test_field_limit_on_compiling_backends() {
    let _ = env_logger::builder().is_test(true).try_init();

    for backend in [BackendId::Source, BackendId::Assembly] {
        let engine = engine(backend);
        assert_eq!(engine.backend(), backend);

        let out = build(&engine, MAX_FIELDS).unwrap();
        assert_eq!(out.len(), MAX_FIELDS + 1, "{backend}");
        assert!(out.starts_with("xy"));

        for fields in [MAX_FIELDS + 1, MAX_FIELDS + 2] {
            let err = build(&engine, fields).unwrap_err();
            assert_too_many_fields(&err, fields);
        }
        assert_eq!(engine.stats().snapshot().compiled, 1, "{backend}");
    }
}

#[test]
fn test_naive_backend_has_no_field_limit() {
    let engine = engine(BackendId::Naive);
    let out = build(&engine, MAX_FIELDS + 2).unwrap();
    assert_eq!(out.len(), MAX_FIELDS + 3);
}
