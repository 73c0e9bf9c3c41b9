// The bytecode interpreter
// One value stack, frames realized by recursive calls, and an allocation
// list that registers every heap object created while running.

use crate::bytecode::{Chunk, OpCode};
use crate::map::RtMap;
use crate::object::{Closure, Object};
use crate::package::Package;
use crate::value::Value;
use crate::RuntimeError;
use std::rc::Rc;

pub const MAX_STACK: usize = 1024;

pub struct Engine<'pkg> {
    stack: Vec<Value>,
    globals: &'pkg [Option<Rc<Object>>],
    /// Every object allocated during execution; dropped on teardown.
    /// A collector, if one is ever added, may only run between
    /// instructions and treats the stack, globals and closure upvalue
    /// arrays as roots.
    objects: Vec<Rc<Object>>,
}

impl<'pkg> Engine<'pkg> {
    pub fn new(package: &'pkg Package) -> Self {
        Self {
            stack: Vec::with_capacity(MAX_STACK),
            globals: package.globals(),
            objects: Vec::new(),
        }
    }

    /// Run the package's `main` function to completion.
    pub fn execute(&mut self, package: &Package) -> Result<(), RuntimeError> {
        let main = package.main().ok_or(RuntimeError::MissingMain)?;
        let Object::Function(f) = &**main else {
            return Err(RuntimeError::NotCallable {
                type_name: main.type_name(),
            });
        };
        log::debug!("executing main ({} bytes of bytecode)", f.chunk.len());
        self.call_chunk(&f.chunk, 0, None)?;
        Ok(())
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == MAX_STACK {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::CorruptStack)
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack.last().ok_or(RuntimeError::CorruptStack)
    }

    fn link(&mut self, object: &Rc<Object>) {
        self.objects.push(object.clone());
    }

    fn call_value(&mut self, callee: Value, argc: usize) -> Result<(), RuntimeError> {
        let object = callee.obj()?;
        match &**object {
            Object::Function(f) => self.call_chunk(&f.chunk, argc, None),
            Object::Closure(c) => {
                let chunk = &c.proto.chunk;
                self.call_chunk(chunk, argc, Some(c))
            }
            Object::NativeFn(n) => {
                let base = self.stack.len() - argc;
                let result = (n.function)(&self.stack[base..]);
                self.stack.truncate(base);
                self.push(result)
            }
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    fn call_chunk(
        &mut self,
        chunk: &Chunk,
        argc: usize,
        closed: Option<&Closure>,
    ) -> Result<(), RuntimeError> {
        let base = self.stack.len() - argc;
        let code = &chunk.code;
        let mut ip = 0usize;

        macro_rules! read {
            ($ty:ty) => {{
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let mut bytes = [0u8; WIDTH];
                bytes.copy_from_slice(&code[ip..ip + WIDTH]);
                ip += WIDTH;
                <$ty>::from_le_bytes(bytes)
            }};
        }

        macro_rules! binary_int {
            ($op:tt) => {{
                let r = self.pop()?.int()?;
                let l = self.pop()?.int()?;
                self.push(Value::Int(l $op r))?;
            }};
        }

        macro_rules! binary_float {
            ($op:tt) => {{
                let r = self.pop()?.float()?;
                let l = self.pop()?.float()?;
                self.push(Value::Float(l $op r))?;
            }};
        }

        macro_rules! compare_int {
            ($op:tt) => {{
                let r = self.pop()?.int()?;
                let l = self.pop()?.int()?;
                self.push(Value::from_bool(l $op r))?;
            }};
        }

        macro_rules! compare_float {
            ($op:tt) => {{
                let r = self.pop()?.float()?;
                let l = self.pop()?.float()?;
                self.push(Value::from_bool(l $op r))?;
            }};
        }

        while ip < code.len() {
            let byte = code[ip];
            ip += 1;
            let op = OpCode::from_byte(byte).ok_or(RuntimeError::CorruptBytecode { byte })?;

            match op {
                OpCode::Int => {
                    let value = read!(i64);
                    self.push(Value::Int(value))?;
                }
                OpCode::Float => {
                    let value = read!(f64);
                    self.push(Value::Float(value))?;
                }
                OpCode::True => self.push(Value::TRUE)?,
                OpCode::False => self.push(Value::FALSE)?,
                OpCode::Nil => self.push(Value::NIL)?,

                OpCode::StringLit => {
                    let index = read!(u16) as usize;
                    let object = Object::new_string(chunk.strings[index].clone());
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }
                OpCode::ArrayLit => {
                    let count = read!(u8) as usize;
                    let mut elements = vec![Value::NIL; count];
                    for slot in elements.iter_mut() {
                        *slot = self.pop()?;
                    }
                    let object = Object::new_array(elements);
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }
                OpCode::MapLit => {
                    let count = read!(u8) as usize;
                    let mut map = RtMap::new();
                    for _ in 0..count {
                        let value = self.pop()?;
                        let key = self.pop()?;
                        map.insert(key, value)?;
                    }
                    let object = Object::new_map(map);
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }
                OpCode::EmptyArray => {
                    let object = Object::new_array(Vec::new());
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }
                OpCode::EmptyMap => {
                    let object = Object::new_map(RtMap::new());
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }
                OpCode::Constructor => {
                    let count = read!(u8) as usize;
                    let mut members = vec![Value::NIL; count];
                    for i in 0..count {
                        members[count - i - 1] = self.pop()?;
                    }
                    let object = Object::new_struct(members);
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }
                OpCode::Closure => {
                    let proto_index = read!(u16) as usize;
                    let proto = chunk.protos[proto_index].clone();
                    let mut upvalues = Vec::with_capacity(proto.upvalue_count as usize);
                    for _ in 0..proto.upvalue_count {
                        let index = read!(u16) as usize;
                        let nonlocal = read!(u8) != 0;
                        let value = if nonlocal {
                            let closure = closed.ok_or(RuntimeError::CorruptStack)?;
                            closure.upvalues.borrow()[index].clone()
                        } else {
                            // a closure that names itself captures nil;
                            // its own slot does not exist until the push
                            self.stack.get(base + index).cloned().unwrap_or(Value::NIL)
                        };
                        upvalues.push(value);
                    }
                    let object = Object::new_closure(proto, upvalues);
                    self.link(&object);
                    self.push(Value::Obj(object))?;
                }

                OpCode::Not => {
                    let value = self.pop()?;
                    self.push(Value::from_bool(!value.is_truthy()))?;
                }
                OpCode::NegateI => {
                    let value = self.pop()?.int()?;
                    self.push(Value::Int(value.wrapping_neg()))?;
                }
                OpCode::NegateF => {
                    let value = self.pop()?.float()?;
                    self.push(Value::Float(-value))?;
                }

                OpCode::AddI => binary_int!(+),
                OpCode::SubI => binary_int!(-),
                OpCode::MulI => binary_int!(*),
                OpCode::DivI => {
                    let r = self.pop()?.int()?;
                    let l = self.pop()?.int()?;
                    if r == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    self.push(Value::Int(l.wrapping_div(r)))?;
                }
                OpCode::ModI => {
                    let r = self.pop()?.int()?;
                    let l = self.pop()?.int()?;
                    if r == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    self.push(Value::Int(l.wrapping_rem(r)))?;
                }
                OpCode::AddF => binary_float!(+),
                OpCode::SubF => binary_float!(-),
                OpCode::MulF => binary_float!(*),
                OpCode::DivF => binary_float!(/),
                OpCode::ModF => binary_float!(%),

                OpCode::LessI => compare_int!(<),
                OpCode::GreaterI => compare_int!(>),
                OpCode::EqualI => compare_int!(==),
                OpCode::LessF => compare_float!(<),
                OpCode::GreaterF => compare_float!(>),
                OpCode::EqualF => compare_float!(==),

                OpCode::Or => {
                    let offset = read!(i16);
                    if self.peek()?.is_truthy() {
                        ip = offset_ip(ip, offset);
                    } else {
                        self.pop()?;
                    }
                }
                OpCode::And => {
                    let offset = read!(i16);
                    if !self.peek()?.is_truthy() {
                        ip = offset_ip(ip, offset);
                    } else {
                        self.pop()?;
                    }
                }

                OpCode::Get => {
                    let index = read!(u16) as usize;
                    let value = self.stack[base + index].clone();
                    self.push(value)?;
                }
                OpCode::Set => {
                    let index = read!(u16) as usize;
                    let value = self.pop()?;
                    self.stack[base + index] = value;
                }
                OpCode::GlobalGet => {
                    let index = read!(u16);
                    let object = self.globals[index as usize]
                        .clone()
                        .ok_or(RuntimeError::UndefinedGlobal { slot: index })?;
                    self.push(Value::Obj(object))?;
                }
                OpCode::UpvalueGet => {
                    let index = read!(u16) as usize;
                    let closure = closed.ok_or(RuntimeError::CorruptStack)?;
                    let value = closure.upvalues.borrow()[index].clone();
                    self.push(value)?;
                }
                OpCode::UpvalueSet => {
                    let index = read!(u16) as usize;
                    let closure = closed.ok_or(RuntimeError::CorruptStack)?;
                    let value = self.pop()?;
                    closure.upvalues.borrow_mut()[index] = value;
                }

                OpCode::IndexGet => {
                    let key = self.pop()?;
                    let object = self.pop()?;
                    let object = object.obj()?;
                    match &**object {
                        Object::Array(elements) => {
                            let elements = elements.borrow();
                            let index = key.int()?;
                            let value = usize::try_from(index)
                                .ok()
                                .and_then(|i| elements.get(i))
                                .ok_or(RuntimeError::IndexOutOfBounds {
                                    index,
                                    len: elements.len(),
                                })?;
                            let value = value.clone();
                            drop(elements);
                            self.push(value)?;
                        }
                        Object::Map(map) => {
                            let value = map.borrow().get(&key)?.unwrap_or(Value::NIL);
                            self.push(value)?;
                        }
                        Object::Str(_) => return Err(RuntimeError::StringIndexing),
                        other => {
                            return Err(RuntimeError::NotSubscriptable {
                                type_name: other.type_name(),
                            })
                        }
                    }
                }
                OpCode::IndexSet => {
                    let key = self.pop()?;
                    let object = self.pop()?;
                    let value = self.pop()?;
                    match &**object.obj()? {
                        Object::Array(elements) => {
                            let mut elements = elements.borrow_mut();
                            let index = key.int()?;
                            let len = elements.len();
                            let slot = usize::try_from(index)
                                .ok()
                                .and_then(|i| elements.get_mut(i))
                                .ok_or(RuntimeError::IndexOutOfBounds { index, len })?;
                            *slot = value;
                        }
                        Object::Map(map) => {
                            map.borrow_mut().insert(key, value)?;
                        }
                        Object::Str(_) => return Err(RuntimeError::StringIndexing),
                        other => {
                            return Err(RuntimeError::NotSubscriptable {
                                type_name: other.type_name(),
                            })
                        }
                    }
                }
                OpCode::StructGet => {
                    let value = self.pop()?;
                    let index = read!(u16) as usize;
                    let Object::Struct(members) = &**value.obj()? else {
                        return Err(RuntimeError::InvalidOperand);
                    };
                    let member = members.borrow()[index].clone();
                    self.push(member)?;
                }
                OpCode::StructSet => {
                    let target = self.pop()?;
                    let value = self.pop()?;
                    let index = read!(u16) as usize;
                    let Object::Struct(members) = &**target.obj()? else {
                        return Err(RuntimeError::InvalidOperand);
                    };
                    members.borrow_mut()[index] = value;
                }

                OpCode::Jmp => {
                    let offset = read!(i16);
                    ip = offset_ip(ip, offset);
                }
                OpCode::JmpZ => {
                    let condition = self.pop()?.is_truthy();
                    let offset = read!(i16);
                    if !condition {
                        ip = offset_ip(ip, offset);
                    }
                }
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::PopV => {
                    let count = read!(u16) as usize;
                    self.stack.truncate(self.stack.len() - count);
                }

                OpCode::Call => {
                    let argc = read!(u8) as usize;
                    let callee = self.pop()?;
                    self.call_value(callee, argc)?;
                }
                OpCode::Return => {
                    let result = self.pop()?;
                    self.stack.truncate(base);
                    self.push(result)?;
                    return Ok(());
                }

                OpCode::IntCast => {
                    let from = self.pop()?;
                    let to = match from {
                        Value::Float(f) => Value::Int(f as i64),
                        other => other,
                    };
                    self.push(to)?;
                }
                OpCode::FloatCast => {
                    let from = self.pop()?;
                    let to = match from {
                        Value::Int(i) => Value::Float(i as f64),
                        other => other,
                    };
                    self.push(to)?;
                }
            }
        }
        Ok(())
    }
}

fn offset_ip(ip: usize, offset: i16) -> usize {
    (ip as i64 + i64::from(offset)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Chunk;

    fn run(chunk: Chunk) -> Result<Vec<Value>, RuntimeError> {
        let package = Package::new();
        let mut engine = Engine::new(&package);
        engine.call_chunk(&chunk, 0, None)?;
        Ok(engine.stack)
    }

    #[test]
    fn test_int_arithmetic() {
        // 1 + 2 * 3
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Int);
        chunk.write_i64(1);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(2);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(3);
        chunk.write_op(OpCode::MulI);
        chunk.write_op(OpCode::AddI);

        let stack = run(chunk).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].int().unwrap(), 7);
    }

    #[test]
    fn test_float_promotion_chain() {
        // 1 -> float, + 2.5
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Int);
        chunk.write_i64(1);
        chunk.write_op(OpCode::FloatCast);
        chunk.write_op(OpCode::Float);
        chunk.write_f64(2.5);
        chunk.write_op(OpCode::AddF);

        let stack = run(chunk).unwrap();
        assert_eq!(stack[0].float().unwrap(), 3.5);
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Int);
        chunk.write_i64(1);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(0);
        chunk.write_op(OpCode::DivI);
        assert!(matches!(run(chunk), Err(RuntimeError::DivisionByZero)));
    }

    #[test]
    fn test_jmp_z_skips_on_false() {
        // false JMP_Z(+9) [Int 1] Int 2  -- the Int 1 block is skipped
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::False);
        chunk.write_op(OpCode::JmpZ);
        chunk.write_i16(9);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(1);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(2);

        let stack = run(chunk).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].int().unwrap(), 2);
    }

    #[test]
    fn test_and_short_circuit_keeps_false() {
        // false && <rhs never runs>
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::False);
        chunk.write_op(OpCode::And);
        chunk.write_i16(1);
        chunk.write_op(OpCode::True);

        let stack = run(chunk).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].int().unwrap(), 0);
    }

    #[test]
    fn test_array_literal_preserves_push_order_reversal() {
        // the emitter pushes elements in reverse; the engine pops them
        // back into declaration order
        let mut chunk = Chunk::new();
        for v in [30, 20, 10] {
            chunk.write_op(OpCode::Int);
            chunk.write_i64(v);
        }
        chunk.write_op(OpCode::ArrayLit);
        chunk.write_u8(3);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(0);
        chunk.write_op(OpCode::IndexGet);

        let stack = run(chunk).unwrap();
        assert_eq!(stack[0].int().unwrap(), 10);
    }

    #[test]
    fn test_array_out_of_bounds() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::EmptyArray);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(4);
        chunk.write_op(OpCode::IndexGet);
        assert!(matches!(
            run(chunk),
            Err(RuntimeError::IndexOutOfBounds { index: 4, len: 0 })
        ));
    }

    #[test]
    fn test_string_indexing_is_unresolved() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_string("hello".to_string());
        chunk.write_op(OpCode::StringLit);
        chunk.write_u16(idx);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(0);
        chunk.write_op(OpCode::IndexGet);
        assert!(matches!(run(chunk), Err(RuntimeError::StringIndexing)));
    }

    #[test]
    fn test_stack_overflow_is_detected() {
        // a loop that pushes forever: Int 1, JMP back
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Int);
        chunk.write_i64(1);
        chunk.write_op(OpCode::Jmp);
        chunk.write_i16(-12);
        assert!(matches!(run(chunk), Err(RuntimeError::StackOverflow)));
    }

    #[test]
    fn test_constructor_orders_members() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Int);
        chunk.write_i64(1);
        chunk.write_op(OpCode::Int);
        chunk.write_i64(2);
        chunk.write_op(OpCode::Constructor);
        chunk.write_u8(2);
        chunk.write_op(OpCode::StructGet);
        chunk.write_u16(0);

        let stack = run(chunk).unwrap();
        assert_eq!(stack[0].int().unwrap(), 1);
    }
}
