// Expression parsing: precedence, associativity, postfix chains

use mica_ast::{display, Expr, Stmt};
use mica_parser::Parser;

// Parse `src` as the initializer of the first statement of main
fn parse_expr(src: &str) -> Expr {
    let source = format!("fn main() -> Int {{ probe := {src}; return 0; }}");
    let ast = Parser::new(&source).parse().expect("parse failed");
    let Stmt::Function(f) = &ast.root.statements[0] else {
        panic!("expected function");
    };
    let body = f.body.as_ref().expect("body");
    match &body.statements[0] {
        Stmt::Assignment(a) => a.value.clone(),
        other => panic!("expected assignment, got {other:?}"),
    }
}

fn prefix_of(src: &str) -> String {
    display::prefix(&parse_expr(src))
}

#[test]
fn test_factor_binds_tighter_than_term() {
    assert_eq!(prefix_of("1 + 2 * 3"), "(+ 1 (* 2 3))");
    assert_eq!(prefix_of("1 * 2 + 3"), "(+ (* 1 2) 3)");
    assert_eq!(prefix_of("1 + 6 // 2 % 4"), "(+ 1 (% (// 6 2) 4))");
}

#[test]
fn test_term_is_left_associative() {
    assert_eq!(prefix_of("1 - 2 - 3"), "(- (- 1 2) 3)");
    assert_eq!(prefix_of("8 / 4 / 2"), "(/ (/ 8 4) 2)");
}

#[test]
fn test_comparison_over_term() {
    assert_eq!(prefix_of("1 + 2 < 3 * 4"), "(< (+ 1 2) (* 3 4))");
    assert_eq!(prefix_of("a <= b"), "(<= a b)");
}

#[test]
fn test_equality_over_comparison() {
    assert_eq!(prefix_of("a < b = c < d"), "(= (< a b) (< c d))");
    assert_eq!(prefix_of("a != b"), "(!= a b)");
    // `==` surfaces as the same operator as `=`
    assert_eq!(prefix_of("a == b"), "(= a b)");
}

#[test]
fn test_logic_is_lowest() {
    assert_eq!(prefix_of("a = b && c = d"), "(&& (= a b) (= c d))");
    assert_eq!(prefix_of("a || b && c"), "(&& (|| a b) c)");
}

#[test]
fn test_unary_binds_over_factor() {
    assert_eq!(prefix_of("-a * b"), "(* (- a) b)");
    assert_eq!(prefix_of("!a && b"), "(&& (! a) b)");
    assert_eq!(prefix_of("--a"), "(- (- a))");
}

#[test]
fn test_grouping_overrides_precedence() {
    assert_eq!(prefix_of("(1 + 2) * 3"), "(* (+ 1 2) 3)");
}

#[test]
fn test_call_subscript_access_chain() {
    assert_eq!(prefix_of("f(1, 2)"), "(call f 1 2)");
    assert_eq!(prefix_of("xs[0]"), "(index xs 0)");
    assert_eq!(prefix_of("p.x"), "(. p x)");
    assert_eq!(prefix_of("a.b[0](1)"), "(call (index (. a b) 0) 1)");
    assert_eq!(prefix_of("-p.x"), "(- (. p x))");
}

#[test]
fn test_array_and_map_literals() {
    assert_eq!(prefix_of("[1, 2, 3]"), "(array 1 2 3)");
    assert_eq!(
        prefix_of("type {\"a\": 1, \"b\": 2}"),
        "(map \"a\":1 \"b\":2)"
    );
}

#[test]
fn test_literal_forms() {
    assert_eq!(prefix_of("42"), "42");
    assert_eq!(prefix_of("2.5"), "2.5");
    assert_eq!(prefix_of("true"), "true");
    assert_eq!(prefix_of("\"hi\""), "\"hi\"");
}
