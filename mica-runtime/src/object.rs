// Heap objects
// Every object is allocated behind an Rc handle and registered on the
// engine's allocation list at creation; the engine's teardown drops the
// list. Mutable payloads sit behind RefCell so shared handles stay cheap.

use crate::bytecode::{Chunk, FunctionProto};
use crate::map::RtMap;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Host function: receives the top `argc` stack slots, returns the value
/// pushed in their place.
pub type NativeFunction = fn(&[Value]) -> Value;

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub chunk: Chunk,
}

#[derive(Debug)]
pub struct NativeFn {
    pub name: String,
    pub function: NativeFunction,
}

#[derive(Debug)]
pub struct Closure {
    pub proto: Rc<FunctionProto>,
    pub upvalues: RefCell<Vec<Value>>,
}

#[derive(Debug)]
pub enum Object {
    /// Fixed-size member array, ordered like the struct declaration.
    Struct(RefCell<Vec<Value>>),
    /// Immutable after construction.
    Str(String),
    Array(RefCell<Vec<Value>>),
    Map(RefCell<RtMap>),
    Function(Function),
    NativeFn(NativeFn),
    Closure(Closure),
}

impl Object {
    pub fn new_struct(members: Vec<Value>) -> Rc<Object> {
        Rc::new(Object::Struct(RefCell::new(members)))
    }

    pub fn new_string(s: impl Into<String>) -> Rc<Object> {
        Rc::new(Object::Str(s.into()))
    }

    pub fn new_array(elements: Vec<Value>) -> Rc<Object> {
        Rc::new(Object::Array(RefCell::new(elements)))
    }

    pub fn new_map(map: RtMap) -> Rc<Object> {
        Rc::new(Object::Map(RefCell::new(map)))
    }

    pub fn new_function(name: impl Into<String>, chunk: Chunk) -> Rc<Object> {
        Rc::new(Object::Function(Function {
            name: name.into(),
            chunk,
        }))
    }

    pub fn new_native(name: impl Into<String>, function: NativeFunction) -> Rc<Object> {
        Rc::new(Object::NativeFn(NativeFn {
            name: name.into(),
            function,
        }))
    }

    pub fn new_closure(proto: Rc<FunctionProto>, upvalues: Vec<Value>) -> Rc<Object> {
        Rc::new(Object::Closure(Closure {
            proto,
            upvalues: RefCell::new(upvalues),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Struct(_) => "struct",
            Object::Str(_) => "string",
            Object::Array(_) => "array",
            Object::Map(_) => "map",
            Object::Function(_) => "function",
            Object::NativeFn(_) => "native function",
            Object::Closure(_) => "closure",
        }
    }
}
