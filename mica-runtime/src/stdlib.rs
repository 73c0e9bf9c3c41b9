// Standard-library surface registered against a package before execution

use crate::map::RtMap;
use crate::object::Object;
use crate::package::Package;
use crate::value::Value;
use std::fmt::Write;

/// Install the host functions the language ships with. Each binds to a
/// slot the program declared as a native function; undeclared names are
/// skipped with a warning.
pub fn register_stdlib(package: &mut Package) {
    package.insert_native("print", native_print);
    package.insert_native("clock", native_clock);
}

fn native_print(args: &[Value]) -> Value {
    let mut out = String::new();
    if let Some(value) = args.first() {
        format_value(&mut out, value);
    }
    println!("{out}");
    Value::NIL
}

fn native_clock(_args: &[Value]) -> Value {
    let seconds = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Float(seconds)
}

/// Canonical display form: ints bare, floats with six decimals, strings
/// quoted, arrays bracketed, maps braced, functions as `<fn name>`,
/// native functions as `<native fn>`, structs as their member values.
pub fn format_value(out: &mut String, value: &Value) {
    match value {
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f:.6}");
        }
        Value::Obj(object) => match &**object {
            Object::Str(s) => {
                let _ = write!(out, "'{s}'");
            }
            Object::Array(elements) => {
                out.push('[');
                for (i, elem) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    format_value(out, elem);
                }
                out.push(']');
            }
            Object::Map(map) => format_map(out, &map.borrow()),
            Object::Struct(members) => {
                out.push_str("{ ");
                for (i, member) in members.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    format_value(out, member);
                }
                out.push_str(" }");
            }
            Object::Function(f) => {
                let _ = write!(out, "<fn {}>", f.name);
            }
            Object::Closure(c) => {
                let _ = write!(out, "<fn {}>", c.proto.name);
            }
            Object::NativeFn(_) => {
                out.push_str("<native fn>");
            }
        },
    }
}

fn format_map(out: &mut String, map: &RtMap) {
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        format_value(out, key);
        out.push_str(": ");
        format_value(out, value);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(value: &Value) -> String {
        let mut out = String::new();
        format_value(&mut out, value);
        out
    }

    #[test]
    fn test_numeric_formats() {
        assert_eq!(fmt(&Value::Int(7)), "7");
        assert_eq!(fmt(&Value::Float(3.5)), "3.500000");
        assert_eq!(fmt(&Value::Float(2.0)), "2.000000");
    }

    #[test]
    fn test_string_and_array_formats() {
        let s = Value::Obj(Object::new_string("hi"));
        assert_eq!(fmt(&s), "'hi'");

        let arr = Value::Obj(Object::new_array(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(fmt(&arr), "[1, 2]");
    }

    #[test]
    fn test_struct_format() {
        let st = Value::Obj(Object::new_struct(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(fmt(&st), "{ 1, 2 }");
    }

    #[test]
    fn test_function_formats() {
        let f = Value::Obj(Object::new_function("main", crate::bytecode::Chunk::new()));
        assert_eq!(fmt(&f), "<fn main>");

        fn nop(_: &[Value]) -> Value {
            Value::NIL
        }
        let n = Value::Obj(Object::new_native("print", nop));
        assert_eq!(fmt(&n), "<native fn>");
    }
}
