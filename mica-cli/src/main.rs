use anyhow::Context;
use clap::Parser;
use mica_diagnostics::Category;
use mica_runtime::{stdlib, Engine};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mica")]
#[command(version)]
#[command(about = "Mica Programming Language", long_about = None)]
struct Cli {
    /// Source file to compile and execute
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    std::process::exit(run(&cli.input));
}

fn run(path: &Path) -> i32 {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err:#}");
            return Category::File.exit_code();
        }
    };
    let file = path.display().to_string();

    log::info!("compiling {file}");
    let mut package = match mica_compiler::compile(&source) {
        Ok(package) => package,
        Err(err) => {
            let diagnostics = err.diagnostics();
            for diagnostic in diagnostics {
                eprint!("{}", diagnostic.render(&file, &source));
            }
            // the first diagnostic decides between parse/type/scope codes
            return diagnostics
                .first()
                .map(|d| d.category.exit_code())
                .unwrap_or_else(|| Category::Parse.exit_code());
        }
    };

    stdlib::register_stdlib(&mut package);

    let mut engine = Engine::new(&package);
    match engine.execute(&package) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("runtime error: {err}");
            Category::Runtime.exit_code()
        }
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))
}
