// Statement grammar, panic-mode recovery, and printer determinism

use mica_ast::{display, Stmt};
use mica_parser::Parser;

fn parse_ok(source: &str) -> mica_ast::Ast {
    match Parser::new(source).parse() {
        Ok(ast) => ast,
        Err(diagnostics) => panic!("unexpected parse errors: {diagnostics:?}"),
    }
}

#[test]
fn test_top_level_declarations() {
    let ast = parse_ok(
        r#"
        fn print(Any value);
        struct Point { Int x; Int y; }
        type Number := Int | Float;
        fn main() -> Int { return 0; }
        "#,
    );
    assert!(matches!(ast.root.statements[0], Stmt::NativeFunction(_)));
    assert!(matches!(ast.root.statements[1], Stmt::Struct(_)));
    assert!(matches!(ast.root.statements[2], Stmt::Union(_)));
    assert!(matches!(ast.root.statements[3], Stmt::Function(_)));
}

#[test]
fn test_statement_forms_inside_functions() {
    let ast = parse_ok(
        r#"
        fn main() -> Int {
            Int x := 1;
            y := 2;
            if(x < y) { x := 3; } else { y := 4; }
            while(x < 10) x := x + 1;
            { Int shadow := 0; }
            fn inner() -> Int { return x; }
            main();
            return 0;
        }
        "#,
    );
    let Stmt::Function(f) = &ast.root.statements[0] else {
        panic!("expected function");
    };
    let body = f.body.as_ref().expect("body");
    assert!(matches!(body.statements[0], Stmt::Variable(_)));
    assert!(matches!(body.statements[1], Stmt::Assignment(_)));
    assert!(matches!(body.statements[2], Stmt::If(_)));
    assert!(matches!(body.statements[3], Stmt::While(_)));
    assert!(matches!(body.statements[4], Stmt::Block(_)));
    assert!(matches!(body.statements[5], Stmt::Closure(_)));
    assert!(matches!(body.statements[6], Stmt::Expression(_)));
    assert!(matches!(body.statements[7], Stmt::Return(_)));
}

#[test]
fn test_single_statement_bodies_get_a_block() {
    let ast = parse_ok("fn main() -> Int { while(true) main(); return 0; }");
    let Stmt::Function(f) = &ast.root.statements[0] else {
        panic!("expected function");
    };
    let Stmt::While(w) = &f.body.as_ref().expect("body").statements[0] else {
        panic!("expected while");
    };
    assert!(matches!(&*w.body, Stmt::Block(_)));
}

#[test]
fn test_printer_reaches_a_fixed_point() {
    let source = r#"
        struct Point { Int x; Int y; }
        type Number := Int | Float;
        fn scale(Point p, Int k) -> Int { return p.x * k; }
        fn main() -> Int {
            xs := [10, 20, 30];
            m := type {"a": 1};
            i := 0;
            s := 0.5;
            while(i < 3) { s := s + 1.0; i := i + 1; }
            if((i + 1) * 2 > 4) print(s); else print(xs[0]);
            return 0;
        }
        fn print(Any value);
    "#;
    let first = {
        let ast = parse_ok(source);
        display::program_to_source(&ast.root, &ast.types)
    };
    let second = {
        let ast = parse_ok(&first);
        display::program_to_source(&ast.root, &ast.types)
    };
    assert_eq!(first, second);
}

#[test]
fn test_parsing_is_deterministic() {
    let source = "fn main() -> Int { x := 1 + 2 * (3 - 4); return x; }";
    let a = parse_ok(source);
    let b = parse_ok(source);
    assert_eq!(
        display::program_to_source(&a.root, &a.types),
        display::program_to_source(&b.root, &b.types)
    );
}

#[test]
fn test_panic_mode_reports_each_mistake_once() {
    // two broken statements, two reports; the parser resynchronizes at
    // the second statement boundary
    let source = r#"
        fn main() -> Int {
            x := ;
            Int y 5;
            return 0;
        }
    "#;
    let Err(diagnostics) = Parser::new(source).parse() else {
        panic!("expected parse errors");
    };
    assert_eq!(diagnostics.len(), 2);
}

#[test]
fn test_invalid_tokens_are_reported() {
    let Err(diagnostics) = Parser::new("fn main() -> Int { @ return 0; }").parse() else {
        panic!("expected parse errors");
    };
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("Invalid token")));
}

#[test]
fn test_255_parameters_accepted_256_rejected() {
    let accepted = {
        let params: Vec<String> = (0..255).map(|i| format!("Int p{i}")).collect();
        format!("fn big({}) -> Int {{ return 0; }}", params.join(", "))
    };
    assert!(Parser::new(&accepted).parse().is_ok());

    let rejected = {
        let params: Vec<String> = (0..256).map(|i| format!("Int p{i}")).collect();
        format!("fn big({}) -> Int {{ return 0; }}", params.join(", "))
    };
    let Err(diagnostics) = Parser::new(&rejected).parse() else {
        panic!("expected parse errors");
    };
    assert!(diagnostics.iter().any(|d| d.message.contains("255")));
}

#[test]
fn test_missing_semicolon_is_reported() {
    let Err(diagnostics) =
        Parser::new("fn main() -> Int { x := 1 return 0; }").parse()
    else {
        panic!("expected parse errors");
    };
    assert!(!diagnostics.is_empty());
}

#[test]
fn test_bare_expression_statement_is_rejected() {
    let Err(diagnostics) = Parser::new("fn main() -> Int { 1 + 2; return 0; }").parse()
    else {
        panic!("expected parse errors");
    };
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("call expressions")));
}
