// Whole-pipeline execution: compile a source, bind the stdlib, run it.
//
// Programs assert on their own results through `check`: a false argument
// runs an integer division by zero, which surfaces as a runtime error.

use mica_runtime::{stdlib, Engine, RuntimeError};

const CHECK: &str = r#"
    fn check(Bool ok) -> Int {
        if(ok) { return 0; }
        return 1 // 0;
    }
"#;

fn run(source: &str) -> Result<(), RuntimeError> {
    let source = format!("{CHECK}\n{source}");
    let mut package = mica_compiler::compile(&source).expect("compilation failed");
    stdlib::register_stdlib(&mut package);
    let mut engine = Engine::new(&package);
    engine.execute(&package)
}

fn assert_runs(source: &str) {
    if let Err(err) = run(source) {
        panic!("program failed: {err}");
    }
}

#[test]
fn test_arithmetic_and_precedence() {
    assert_runs("fn main() -> Int { check(1 + 2 * 3 = 7); return 0; }");
    assert_runs("fn main() -> Int { check(10 - 2 - 3 = 5); return 0; }");
    assert_runs("fn main() -> Int { check(7 % 3 = 1); return 0; }");
    assert_runs("fn main() -> Int { check(7 // 2 = 3); return 0; }");
    assert_runs("fn main() -> Int { check(-(3) + 5 = 2); return 0; }");
}

#[test]
fn test_float_promotion() {
    assert_runs("fn main() -> Int { check(1 + 2.5 = 3.5); return 0; }");
    assert_runs("fn main() -> Int { check(1 < 1.5); return 0; }");
}

#[test]
fn test_while_loop_over_array() {
    assert_runs(
        r#"
        fn main() -> Int {
            xs := [10, 20, 30];
            i := 0;
            s := 0;
            while(i < 3) { s := s + xs[i]; i := i + 1; }
            check(s = 60);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_array_element_assignment() {
    assert_runs(
        r#"
        fn main() -> Int {
            xs := [1, 2, 3];
            xs[1] := 20;
            check(xs[0] = 1);
            check(xs[1] = 20);
            check(xs[2] = 3);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_map_round_trip() {
    assert_runs(
        r#"
        fn main() -> Int {
            m := type {"a": 1, "b": 2};
            check(m["b"] = 2);
            check(m["a"] = 1);
            m["c"] := 3;
            check(m["c"] = 3);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_map_misses_read_as_nil() {
    assert_runs(
        r#"
        fn main() -> Int {
            m := type {"a": 1};
            check(m["missing"] = 0);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_function_calls_and_overloads() {
    assert_runs(
        r#"
        fn f(Int x) -> Int { return x + 1; }
        fn f(Float x) -> Float { return x + 1.0; }
        fn main() -> Int {
            check(f(1) = 2);
            check(f(1.0) = 2.0);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_recursion() {
    assert_runs(
        r#"
        fn fact(Int n) -> Int {
            if(n < 2) { return 1; }
            return n * fact(n - 1);
        }
        fn main() -> Int { check(fact(6) = 720); return 0; }
        "#,
    );
}

#[test]
fn test_structs() {
    assert_runs(
        r#"
        struct Point { Int x; Int y; }
        fn main() -> Int {
            p := Point(1, 2);
            check(p.x + p.y = 3);
            p.x := 5;
            check(p.x = 5);
            Point q;
            check(q.y = 0);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_shadowing_restores_outer_binding() {
    assert_runs(
        r#"
        fn main() -> Int {
            Int x := 1;
            { Int x := 2; check(x = 2); }
            check(x = 1);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_closure_captures_value() {
    assert_runs(
        r#"
        fn main() -> Int {
            base := 10;
            fn add(Int n) -> Int { return n + base; }
            check(add(32) = 42);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_logic_short_circuits() {
    assert_runs(
        r#"
        fn trap() -> Bool { Int x := 1 // 0; return true; }
        fn main() -> Int {
            check((false && trap()) = false);
            check(true || trap());
            return 0;
        }
        "#,
    );
}

#[test]
fn test_union_holds_either_variant() {
    assert_runs(
        r#"
        type Number := Int | Float;
        fn pass(Number n) -> Int { return 0; }
        fn main() -> Int {
            pass(1);
            pass(2.5);
            return 0;
        }
        "#,
    );
}

#[test]
fn test_out_of_bounds_is_fatal() {
    let err = run(
        r#"
        fn main() -> Int {
            xs := [1];
            check(xs[3] = 0);
            return 0;
        }
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::IndexOutOfBounds { .. }));
}

#[test]
fn test_string_indexing_is_a_runtime_error() {
    let err = run(
        r#"
        fn main() -> Int {
            s := "hello";
            first := s[0];
            return 0;
        }
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::StringIndexing));
}

#[test]
fn test_deep_recursion_overflows_the_stack() {
    let err = run(
        r#"
        fn dive(Int n) -> Int { return dive(n + 1); }
        fn main() -> Int { return dive(0); }
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::StackOverflow));
}
