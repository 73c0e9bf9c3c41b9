//! Mica compiler: semantic validation and bytecode emission.
//!
//! `compile` runs the full front half of the pipeline — parse, validate,
//! emit — and returns a package ready for the runtime engine.

use mica_diagnostics::Diagnostic;
use mica_parser::Parser;
use mica_runtime::Package;
use thiserror::Error;

pub mod emitter;
pub mod prelude;
pub mod scope;
pub mod validator;

pub use emitter::emit;
pub use validator::validate;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<Diagnostic>),
    #[error("{} analysis error(s)", .0.len())]
    Analyze(Vec<Diagnostic>),
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Parse(d) | CompileError::Analyze(d) => d,
        }
    }
}

/// Compile a source buffer into an executable package.
pub fn compile(source: &str) -> Result<Package, CompileError> {
    let mut ast = Parser::new(source)
        .parse()
        .map_err(CompileError::Parse)?;

    prelude::inject_prelude(&mut ast);
    validator::validate(&mut ast).map_err(CompileError::Analyze)?;

    let mut package = Package::new();
    emitter::emit(&ast, &mut package);
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_smoke() {
        let source = r#"
            fn main() -> Int {
                print(1 + 2 * 3);
                return 0;
            }
        "#;
        let package = compile(source).unwrap();
        assert!(package.main().is_some());
        // prelude natives (print, clock) occupy the first slots
        assert_eq!(package.globals().len(), 3);
    }

    #[test]
    fn test_parse_errors_carry_category() {
        let err = compile("fn main( { }").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
        assert!(!err.diagnostics().is_empty());
    }

    #[test]
    fn test_type_errors_surface() {
        let source = r#"
            fn main() -> Int {
                x := 1 + "one";
                return 0;
            }
        "#;
        let err = compile(source).unwrap_err();
        assert!(matches!(err, CompileError::Analyze(_)));
    }
}
