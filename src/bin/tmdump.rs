//! Template inspection tool.
//!
//! Builds a template from its positional segments and shows what the engine
//! makes of it. A segment starting with `@` is a dynamic fragment reading the
//! named `--set` variable; `@@` escapes a literal `@`.
//!
//! ```text
//! tmdump "Hello, " @name "!" --set name=World --source --listing --disasm
//! ```

use clap::Parser;
use hashbrown::HashMap;
use std::error::Error;
use std::path::PathBuf;
use textmodel::backend::compiler_for;
use textmodel::core::UnitPlan;
use textmodel::x64::{disassemble, render_object};
use textmodel::{
    model_fn, BackendId, DynamicLoader, EngineConfig, Fragment, LoaderKind, TextModel,
    TextModelEngine,
};

type Vars = HashMap<String, String>;

#[derive(Debug, clap::Parser)]
#[clap(name = "tmdump", about = "Compile a text template and dump the result")]
struct Args {
    /// Template segments; `@name` is a dynamic fragment.
    segments: Vec<String>,

    #[clap(long, default_value = "assembly")]
    backend: BackendId,

    #[clap(long, default_value = "native")]
    loader: LoaderKind,

    /// Context variable, `key=value`.
    #[clap(long = "set", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Print the synthesized model source.
    #[clap(long)]
    source: bool,

    /// Print the compiled unit listing.
    #[clap(long)]
    listing: bool,

    /// Print the native render code.
    #[clap(long)]
    disasm: bool,

    /// Write the native render code as an ELF object.
    #[clap(long)]
    object: Option<PathBuf>,

    /// Print engine statistics after rendering.
    #[clap(long)]
    stats: bool,
}

fn parse_var(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{text}`"))
}

fn fragment(segment: &str) -> Fragment<Vars> {
    if let Some(literal) = segment.strip_prefix("@@") {
        return Fragment::Static(format!("@{literal}"));
    }
    match segment.strip_prefix('@') {
        Some(name) => {
            let name = name.to_string();
            Fragment::Dynamic(model_fn(move |vars: &Vars| {
                vars.get(&name).cloned().unwrap_or_default()
            }))
        }
        None => Fragment::Static(segment.to_string()),
    }
}

fn plan(segments: &[String]) -> UnitPlan {
    let mut plan = UnitPlan::new();
    for segment in segments {
        match fragment(segment) {
            Fragment::Static(text) => plan.push_text(&text),
            Fragment::Dynamic(_) => {
                plan.push_field();
            }
        }
    }
    plan
}

fn dump_unit(args: &Args, plan: &UnitPlan) -> Result<(), Box<dyn Error>> {
    let name = "TextModel$dump";

    #[cfg(feature = "source")]
    if args.source {
        println!("{}", textmodel::backend::source::synthesize(name, plan));
    }

    let wants_native = args.disasm || args.object.is_some();
    if !(args.listing || wants_native) {
        return Ok(());
    }
    let Some(compiler) = compiler_for(args.backend) else {
        println!("{} backend produces no unit", args.backend);
        return Ok(());
    };
    let unit = compiler.compile_unit(name, plan)?;

    if args.listing {
        print!("{}", unit.decode()?);
    }

    if wants_native {
        let loader = DynamicLoader::new(vec![args.loader]);
        let loaded = loader.load(None, &unit)?;
        let Some(code) = loaded.native_code() else {
            println!("no native code: {} loader selected", loaded.kind());
            return Ok(());
        };
        if args.disasm {
            print!("{}", disassemble(code, 0));
        }
        if let Some(path) = &args.object {
            let bytes = render_object(&format!("{name}.render"), code)?;
            std::fs::write(path, bytes)?;
            println!("wrote {} ({} code bytes)", path.display(), code.len());
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    dump_unit(&args, &plan(&args.segments))?;

    let config = EngineConfig::default()
        .backend(args.backend)
        .loaders([args.loader, LoaderKind::Interpreted]);
    let engine = TextModelEngine::new(config)?;
    let mut builder = engine.builder::<Vars>();
    for segment in &args.segments {
        builder.append(fragment(segment));
    }
    let model = builder.build_and_release()?;

    let vars: Vars = args.vars.iter().cloned().collect();
    println!("{}", model.evaluate(&vars));

    if args.stats {
        print!("{}", engine.stats().snapshot());
    }
    Ok(())
}
