// Loaded program
// One globals slot per declared top-level name, indexed by symbol index.
// The symbol table holds metadata; the globals array holds heap objects.

use crate::object::{NativeFunction, Object};
use mica_ast::{Symbol, SymbolTable};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Package {
    symbols: SymbolTable,
    globals: Vec<Option<Rc<Object>>>,
    main: Option<Rc<Object>>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level name. Repeated declarations (function
    /// overloads) keep their first slot. Slots are handed out in
    /// declaration order, so a global's symbol index equals its slot in
    /// the globals array.
    pub fn declare(&mut self, mut symbol: Symbol) {
        if self.symbols.get(&symbol.name).is_some() {
            return;
        }
        symbol.index = self.globals.len();
        self.globals.push(None);
        let name = symbol.name.clone();
        self.symbols.insert(&name, symbol);
    }

    /// Install a compiled function object. A second function under the
    /// same name converts the slot into an array of overloads in
    /// declaration order.
    pub fn insert_function(&mut self, name: &str, object: Rc<Object>) {
        let Some(symbol) = self.symbols.get(name) else {
            log::warn!("name '{name}' not found in package");
            return;
        };
        let slot = symbol.index;

        if name == "main" {
            self.main = Some(object.clone());
        }

        match self.globals[slot].take() {
            None => self.globals[slot] = Some(object),
            Some(existing) => match &*existing {
                Object::Array(overloads) => {
                    overloads.borrow_mut().push(crate::value::Value::Obj(object));
                    self.globals[slot] = Some(existing);
                }
                _ => {
                    let overloads = vec![
                        crate::value::Value::Obj(existing),
                        crate::value::Value::Obj(object),
                    ];
                    self.globals[slot] = Some(Rc::new(Object::Array(RefCell::new(overloads))));
                }
            },
        }
    }

    /// Bind a host function to a declared native slot.
    pub fn insert_native(&mut self, name: &str, function: NativeFunction) {
        let Some(symbol) = self.symbols.get(name) else {
            log::warn!("native function '{name}' was never declared");
            return;
        };
        let slot = symbol.index;
        self.globals[slot] = Some(Object::new_native(name, function));
    }

    pub fn get_by_name(&self, name: &str) -> Option<Rc<Object>> {
        let symbol = self.symbols.get(name)?;
        self.globals.get(symbol.index)?.clone()
    }

    pub fn globals(&self) -> &[Option<Rc<Object>>] {
        &self.globals
    }

    pub fn main(&self) -> Option<&Rc<Object>> {
        self.main.as_ref()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Chunk;
    use mica_ast::TypeId;

    fn global(name: &str, index: usize) -> Symbol {
        let mut s = Symbol::new(name, 0..0, TypeId::INVALID);
        s.index = index;
        s.is_global = true;
        s
    }

    #[test]
    fn test_declare_assigns_slots_in_order() {
        let mut package = Package::new();
        package.declare(global("print", 0));
        package.declare(global("main", 1));
        assert_eq!(package.globals().len(), 2);
        assert!(package.get_by_name("print").is_none());
    }

    #[test]
    fn test_insert_function_finds_main() {
        let mut package = Package::new();
        package.declare(global("main", 0));
        package.insert_function("main", Object::new_function("main", Chunk::new()));
        assert!(package.main().is_some());
    }

    #[test]
    fn test_overloads_collapse_into_one_slot() {
        let mut package = Package::new();
        package.declare(global("f", 0));
        package.declare(global("f", 0)); // second declaration keeps the slot
        assert_eq!(package.globals().len(), 1);

        package.insert_function("f", Object::new_function("f", Chunk::new()));
        package.insert_function("f", Object::new_function("f", Chunk::new()));
        let slot = package.get_by_name("f").unwrap();
        match &*slot {
            Object::Array(overloads) => assert_eq!(overloads.borrow().len(), 2),
            other => panic!("expected overload array, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_native_registration_requires_declaration() {
        fn nop(_: &[crate::value::Value]) -> crate::value::Value {
            crate::value::Value::NIL
        }
        let mut package = Package::new();
        package.insert_native("print", nop); // warns, does not panic
        assert!(package.get_by_name("print").is_none());

        package.declare(global("print", 0));
        package.insert_native("print", nop);
        assert!(package.get_by_name("print").is_some());
    }
}
