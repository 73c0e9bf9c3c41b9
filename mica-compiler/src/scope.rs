// Lexical scope chain
//
// Each frame wraps one symbol table and a slot counter. Function frames
// restart the counter at zero; block frames inherit it, so local slot
// indices stay unique within a function and sibling blocks reuse slots
// their predecessors released.

use mica_ast::{Symbol, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Global,
    Function,
    Block,
}

#[derive(Debug)]
pub struct Frame {
    pub table: SymbolTable,
    pub counter: usize,
    pub kind: FrameKind,
}

#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

/// Where a lookup found its symbol.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub symbol: Symbol,
    /// Index of the frame holding the symbol.
    pub frame: usize,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                table: SymbolTable::new(),
                counter: 0,
                kind: FrameKind::Global,
            }],
        }
    }

    pub fn push_function(&mut self) {
        self.frames.push(Frame {
            table: SymbolTable::new(),
            counter: 0,
            kind: FrameKind::Function,
        });
    }

    pub fn push_block(&mut self) {
        let counter = self.current_counter();
        self.frames.push(Frame {
            table: SymbolTable::new(),
            counter,
            kind: FrameKind::Block,
        });
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1);
        self.frames.pop();
    }

    pub fn current_counter(&self) -> usize {
        self.frames.last().map_or(0, |f| f.counter)
    }

    pub fn frame_kind(&self, index: usize) -> FrameKind {
        self.frames[index].kind
    }

    /// Declare a name in the innermost frame. Shadowing an outer name is
    /// fine; a collision inside the same frame hands back the earlier
    /// symbol for the caller to report.
    pub fn declare(&mut self, mut symbol: Symbol) -> Result<Symbol, Symbol> {
        let frame = self
            .frames
            .last_mut()
            .unwrap_or_else(|| unreachable!("scope stack always has a global frame"));
        if let Some(prior) = frame.table.get(&symbol.name) {
            return Err(prior.clone());
        }
        symbol.index = frame.counter;
        frame.counter += 1;
        symbol.is_global = frame.kind == FrameKind::Global;
        let name = symbol.name.clone();
        frame.table.insert(&name, symbol.clone());
        Ok(symbol)
    }

    /// Look a name up through the chain, innermost first.
    pub fn find(&self, name: &str) -> Option<Resolution> {
        for (frame_idx, frame) in self.frames.iter().enumerate().rev() {
            if let Some(symbol) = frame.table.get(name) {
                return Some(Resolution {
                    symbol: symbol.clone(),
                    frame: frame_idx,
                });
            }
        }
        None
    }

    /// Lookup restricted to the innermost frame; drives the
    /// declaration-versus-assignment decision for `name := expr`.
    pub fn find_in_current(&self, name: &str) -> Option<Symbol> {
        self.frames.last().and_then(|f| f.table.get(name).cloned())
    }

    pub fn update_global(&mut self, name: &str, symbol: Symbol) {
        if let Some(frame) = self.frames.first_mut() {
            frame.table.insert(name, symbol);
        }
    }

    /// Every name currently visible, for "did you mean" suggestions.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for frame in &self.frames {
            for (name, _) in frame.table.iter() {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Function frames strictly above `frame_idx`, outermost first. These
    /// are the closure boundaries a captured reference crosses.
    pub fn function_frames_above(&self, frame_idx: usize) -> Vec<usize> {
        (frame_idx + 1..self.frames.len())
            .filter(|&i| self.frames[i].kind == FrameKind::Function)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_ast::TypeId;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name, 0..0, TypeId::INT)
    }

    #[test]
    fn test_global_frame_marks_globals() {
        let mut scopes = ScopeStack::new();
        let declared = scopes.declare(sym("f")).unwrap();
        assert!(declared.is_global);
        assert_eq!(declared.index, 0);
    }

    #[test]
    fn test_function_frames_restart_counter() {
        let mut scopes = ScopeStack::new();
        scopes.declare(sym("g")).unwrap();
        scopes.push_function();
        let a = scopes.declare(sym("a")).unwrap();
        assert_eq!(a.index, 0);
        assert!(!a.is_global);
    }

    #[test]
    fn test_block_frames_inherit_counter() {
        let mut scopes = ScopeStack::new();
        scopes.push_function();
        scopes.declare(sym("a")).unwrap();
        scopes.push_block();
        let b = scopes.declare(sym("b")).unwrap();
        assert_eq!(b.index, 1);
        scopes.pop();
        // a sibling block reuses the slot the first block released
        scopes.push_block();
        let c = scopes.declare(sym("c")).unwrap();
        assert_eq!(c.index, 1);
    }

    #[test]
    fn test_shadowing_in_inner_block() {
        let mut scopes = ScopeStack::new();
        scopes.push_function();
        scopes.declare(sym("x")).unwrap();
        scopes.push_block();
        assert!(scopes.declare(sym("x")).is_ok());
        let found = scopes.find("x").unwrap();
        assert_eq!(found.symbol.index, 1);
        scopes.pop();
        // the outer binding is visible again
        assert_eq!(scopes.find("x").unwrap().symbol.index, 0);
    }

    #[test]
    fn test_same_frame_collision_returns_prior() {
        let mut scopes = ScopeStack::new();
        scopes.push_function();
        scopes.declare(sym("x")).unwrap();
        assert!(scopes.declare(sym("x")).is_err());
    }
}
