#![cfg(all(feature = "assembly", target_arch = "x86_64", unix))]

use object::{Object, ObjectSection, ObjectSymbol};
use textmodel::backend::assembly::AssemblyCompiler;
use textmodel::core::UnitPlan;
use textmodel::x64::{disassemble, render_object};
use textmodel::{model_fn, DynamicLoader, LoaderKind, ModelRef, TextModel, UnitCompiler};

struct Row {
    id: u32,
    name: String,
}

fn native_loader() -> Option<DynamicLoader> {
    let loader = DynamicLoader::new(vec![LoaderKind::Native]);
    if loader.kind() == LoaderKind::Native {
        Some(loader)
    } else {
        eprintln!("native loader unavailable, skipping");
        None
    }
}

fn plan() -> UnitPlan {
    let mut plan = UnitPlan::new();
    plan.push_text("id=");
    plan.push_field();
    plan.push_text(", name=");
    plan.push_field();
    plan
}

#[test]
fn test_native_render() {
    let _ = env_logger::builder().is_test(true).try_init();
    let Some(loader) = native_loader() else {
        return;
    };

    let unit = AssemblyCompiler.compile_unit("Native$1", &plan()).unwrap();
    let loaded = loader.load(None, &unit).unwrap();
    assert_eq!(loaded.kind(), LoaderKind::Native);
    let code = loaded.native_code().expect("native code");
    assert!(!code.is_empty());
    assert!(disassemble(code, 0).contains("call"));

    let id: ModelRef<Row> = model_fn(|row: &Row| row.id.to_string());
    let name: ModelRef<Row> = model_fn(|row: &Row| row.name.clone());
    let model = loaded.instantiate(vec![id, name]).unwrap();
    let row = |id, name: &str| Row {
        id,
        name: name.to_string(),
    };
    assert_eq!(model.evaluate(&row(7, "seven")), "id=7, name=seven");
    assert_eq!(model.evaluate(&row(8, "")), "id=8, name=");
}

#[test]
fn test_native_code_exports_as_elf() {
    let Some(loader) = native_loader() else {
        return;
    };

    let unit = AssemblyCompiler.compile_unit("Export$1", &plan()).unwrap();
    let loaded = loader.load(None, &unit).unwrap();
    let code = loaded.native_code().expect("native code");

    let bytes = render_object("Export$1.render", code).unwrap();
    let file = object::File::parse(&*bytes).unwrap();
    let text = file.section_by_name(".text").unwrap();
    assert_eq!(text.data().unwrap(), code);
    assert!(file
        .symbols()
        .any(|symbol| symbol.name().ok() == Some("Export$1.render")));
}
