use std::error::Error as _;
use std::sync::Arc;
use textmodel::core::{Segment, UnitPlan};
use textmodel::unit::{CodeEmitter, UnitWriter, VerifyError};
use textmodel::{
    constant, BackendId, CompiledUnit, EngineConfig, FatalCause, LoadError, LoaderKind,
    TextModelEngine, TextModelError, UnitCompiler,
};

/// Emits correct code but declares a render stack one slot deep.
struct UndersizedStack;

impl UnitCompiler for UndersizedStack {
    fn id(&self) -> BackendId {
        BackendId::Assembly
    }

    fn compile_unit(&self, name: &str, plan: &UnitPlan) -> Result<CompiledUnit, FatalCause> {
        let fields = plan.field_count();
        let mut writer = UnitWriter::new(name, fields);

        let mut init = CodeEmitter::new();
        for field in 0..fields {
            init.load_local(0).load_local(field as u16 + 1).put_field(field);
        }
        init.ret_void();
        writer.set_init(init.finish(2, fields as u16 + 1));

        let mut render = CodeEmitter::new();
        render.new_buffer(0);
        for segment in plan.segments() {
            match segment {
                Segment::Text(text) => {
                    let index = writer.constant(text);
                    render.load_const(index).append();
                }
                Segment::Field(field) => {
                    render
                        .load_local(0)
                        .get_field(*field)
                        .load_local(1)
                        .invoke_eval()
                        .append();
                }
            }
        }
        render.ret();
        writer.set_render(render.finish(1, 2));

        Ok(writer.finish()?.encode())
    }
}

fn template(engine: &Arc<TextModelEngine>) -> Result<textmodel::ModelRef<()>, TextModelError> {
    let mut builder = engine.builder::<()>();
    builder.append_text("a").append_model(constant("b"));
    builder.build()
}

#[test]
fn test_unverifiable_unit_is_fatal() {
    let _ = env_logger::builder().is_test(true).try_init();

    for kind in LoaderKind::ALL {
        let config = EngineConfig::default().loaders([kind]);
        let engine = TextModelEngine::with_compiler(config, Arc::new(UndersizedStack)).unwrap();

        let err = template(&engine).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err.cause(),
            Some(FatalCause::Load(LoadError::Verify(VerifyError::StackOverflow { .. })))
        ));
        assert!(err.source().is_some());
        assert_eq!(engine.stats().snapshot().compiled, 0);
    }
}

#[test]
fn test_failed_unit_name_is_reported() {
    let engine =
        TextModelEngine::with_compiler(EngineConfig::default(), Arc::new(UndersizedStack)).unwrap();
    match template(&engine).unwrap_err() {
        TextModelError::Compilation { backend, unit, .. } => {
            assert_eq!(backend, BackendId::Assembly);
            assert!(unit.starts_with("TextModel$"), "{unit}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_fast_paths_bypass_broken_compiler() {
    let engine =
        TextModelEngine::with_compiler(EngineConfig::default(), Arc::new(UndersizedStack)).unwrap();
    let mut builder = engine.builder::<()>();
    builder.append_text("static only");
    assert!(builder.build().is_ok());
    builder.clear().append_model(constant("single"));
    assert!(builder.build().is_ok());
}

#[cfg(feature = "source")]
#[test]
fn test_source_error_is_fatal() {
    struct BrokenSource;

    impl UnitCompiler for BrokenSource {
        fn id(&self) -> BackendId {
            BackendId::Source
        }

        fn compile_unit(&self, _name: &str, _plan: &UnitPlan) -> Result<CompiledUnit, FatalCause> {
            Ok(textmodel::source::compile("model {")?)
        }
    }

    let engine =
        TextModelEngine::with_compiler(EngineConfig::default(), Arc::new(BrokenSource)).unwrap();
    let err = template(&engine).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err.cause(), Some(FatalCause::Source(_))));
}

#[test]
fn test_invalid_config_is_not_fatal() {
    let err = TextModelEngine::new(EngineConfig::default().backends(Vec::new())).unwrap_err();
    assert!(!err.is_fatal());
    assert!(err.cause().is_none());
}
