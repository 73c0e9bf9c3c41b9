// Bytecode shape: encodings, jump targets, and stack discipline

use mica_runtime::{Object, OpCode, Package};

fn compile(source: &str) -> Package {
    mica_compiler::compile(source).expect("compilation failed")
}

fn main_chunk(package: &Package) -> &mica_runtime::Chunk {
    let main = package.main().expect("main");
    match &**main {
        Object::Function(f) => &f.chunk,
        other => panic!("main is a {}", other.type_name()),
    }
}

/// Step through a chunk opcode by opcode, checking operand widths and
/// collecting every branch target.
fn scan(chunk: &mica_runtime::Chunk) -> Vec<usize> {
    let code = &chunk.code;
    let mut targets = Vec::new();
    let mut ip = 0usize;
    while ip < code.len() {
        let op = OpCode::from_byte(code[ip]).expect("unknown opcode byte");
        ip += 1;
        match op {
            OpCode::Int => ip += 8,
            OpCode::Float => ip += 8,
            OpCode::StringLit => {
                let index = u16::from_le_bytes([code[ip], code[ip + 1]]) as usize;
                assert!(index < chunk.strings.len(), "string index out of pool");
                ip += 2;
            }
            OpCode::ArrayLit | OpCode::MapLit | OpCode::Constructor | OpCode::Call => ip += 1,
            OpCode::Closure => {
                let index = u16::from_le_bytes([code[ip], code[ip + 1]]) as usize;
                assert!(index < chunk.protos.len(), "proto index out of pool");
                ip += 2;
                ip += chunk.protos[index].upvalue_count as usize * 3;
            }
            OpCode::Get
            | OpCode::Set
            | OpCode::GlobalGet
            | OpCode::UpvalueGet
            | OpCode::UpvalueSet
            | OpCode::StructGet
            | OpCode::StructSet
            | OpCode::PopV => ip += 2,
            OpCode::Jmp | OpCode::JmpZ | OpCode::And | OpCode::Or => {
                let offset = i16::from_le_bytes([code[ip], code[ip + 1]]);
                ip += 2;
                targets.push((ip as i64 + i64::from(offset)) as usize);
            }
            _ => {}
        }
    }
    assert_eq!(ip, code.len(), "decoding ran past the chunk");
    targets
}

#[test]
fn test_arithmetic_program_encoding() {
    let package = compile("fn main() -> Int { return 1 + 2 * 3; }");
    let chunk = main_chunk(&package);

    // 1, 2, 3 pushed; multiply binds tighter; add; return
    let expected = {
        use OpCode::*;
        let mut bytes = Vec::new();
        for (op, operand) in [(Int, 1i64), (Int, 2), (Int, 3)] {
            bytes.push(op as u8);
            bytes.extend_from_slice(&operand.to_le_bytes());
        }
        bytes.push(MulI as u8);
        bytes.push(AddI as u8);
        bytes.push(Return as u8);
        bytes
    };
    assert_eq!(chunk.code, expected);
}

#[test]
fn test_every_branch_lands_inside_the_chunk() {
    let source = r#"
        fn main() -> Int {
            i := 0;
            s := 0;
            while(i < 100) {
                if(i % 2 = 0 && s < 1000) { s := s + i; }
                else { s := s - 1; }
                i := i + 1;
            }
            if(s > 0 || i > 0) { s := 0; }
            return s;
        }
    "#;
    let package = compile(source);
    let chunk = main_chunk(&package);
    for target in scan(chunk) {
        assert!(target <= chunk.len(), "branch target {target} out of range");
    }
}

#[test]
fn test_promoted_operand_uses_float_opcodes() {
    let package = compile("fn main() -> Float { return 1 + 2.5; }");
    let chunk = main_chunk(&package);
    assert!(chunk.code.contains(&(OpCode::FloatCast as u8)));
    assert!(chunk.code.contains(&(OpCode::AddF as u8)));
    assert!(!chunk.code.contains(&(OpCode::AddI as u8)));
}

#[test]
fn test_void_function_synthesizes_return() {
    let package = compile("fn noop() { } fn main() -> Int { return 0; }");
    let noop = package.get_by_name("noop").expect("noop");
    let Object::Function(f) = &*noop else {
        panic!()
    };
    let tail = &f.chunk.code[f.chunk.len() - 2..];
    assert_eq!(tail, &[OpCode::Nil as u8, OpCode::Return as u8]);
}

#[test]
fn test_blocks_pop_their_locals() {
    let source = r#"
        fn main() -> Int {
            { a := 1; b := 2; c := a + b; }
            return 0;
        }
    "#;
    let package = compile(source);
    let chunk = main_chunk(&package);
    let pop_v = chunk
        .code
        .iter()
        .position(|&b| b == OpCode::PopV as u8)
        .expect("PopV emitted for the inner block");
    let count = u16::from_le_bytes([chunk.code[pop_v + 1], chunk.code[pop_v + 2]]);
    assert_eq!(count, 3);
}

#[test]
fn test_overloads_land_in_an_array_slot() {
    let source = r#"
        fn f(Int x) -> Int { return x; }
        fn f(Float x) -> Float { return x; }
        fn main() -> Int { return f(1); }
    "#;
    let package = compile(source);
    let slot = package.get_by_name("f").expect("f slot");
    match &*slot {
        Object::Array(overloads) => assert_eq!(overloads.borrow().len(), 2),
        other => panic!("expected overload array, got {}", other.type_name()),
    }
    // and the call site indexes into it
    let chunk = main_chunk(&package);
    assert!(chunk.code.contains(&(OpCode::IndexGet as u8)));
}

#[test]
fn test_closure_capture_table_is_encoded() {
    let source = r#"
        fn main() -> Int {
            base := 10;
            fn add(Int n) -> Int { return n + base; }
            return add(32);
        }
    "#;
    let package = compile(source);
    let chunk = main_chunk(&package);
    assert_eq!(chunk.protos.len(), 1);
    assert_eq!(chunk.protos[0].upvalue_count, 1);

    let at = chunk
        .code
        .iter()
        .position(|&b| b == OpCode::Closure as u8)
        .expect("closure op");
    // operands: u16 proto index, then (u16 slot, u8 nonlocal) per capture
    let proto = u16::from_le_bytes([chunk.code[at + 1], chunk.code[at + 2]]);
    let slot = u16::from_le_bytes([chunk.code[at + 3], chunk.code[at + 4]]);
    let nonlocal = chunk.code[at + 5];
    assert_eq!(proto, 0);
    assert_eq!(slot, 0);
    assert_eq!(nonlocal, 0);
}

#[test]
fn test_struct_and_union_slots_stay_empty() {
    let source = r#"
        struct Point { Int x; Int y; }
        type Number := Int | Float;
        fn main() -> Int { p := Point(1, 2); return p.x; }
    "#;
    let package = compile(source);
    assert!(package.get_by_name("Point").is_none());
    assert!(package.get_by_name("Number").is_none());
    // constructors allocate inline instead of loading the slot
    let chunk = main_chunk(&package);
    assert!(chunk.code.contains(&(OpCode::Constructor as u8)));
}

#[test]
fn test_prelude_natives_take_the_first_slots() {
    let package = compile("fn main() -> Int { return 0; }");
    let symbols = package.symbols();
    assert_eq!(symbols.get("print").map(|s| s.index), Some(0));
    assert_eq!(symbols.get("clock").map(|s| s.index), Some(1));
    assert_eq!(symbols.get("main").map(|s| s.index), Some(2));
}
