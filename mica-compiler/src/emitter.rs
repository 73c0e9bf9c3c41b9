// Bytecode emission
//
// Lowers each validated function body into a chunk, patches forward
// branches once their targets are known, and fills the package with
// function objects. Statements are stack-neutral: variable declarations
// leave their value behind as the local's slot, and blocks pop whatever
// they declared on exit. Given a fully validated tree, emission cannot
// fail.

use mica_ast::{
    Ast, BinOp, Block, ClosureDecl, Expr, FunctionDecl, If, LiteralValue, Stmt, Symbol, Type,
    TypeId, TypeRegistry, UnOp, UpvalueKind, While,
};
use mica_runtime::bytecode::{Chunk, FunctionProto, OpCode};
use mica_runtime::{Object, Package};

/// Lower a validated program into a package of compiled globals.
pub fn emit(ast: &Ast, package: &mut Package) {
    // one globals slot per distinct top-level name, in declaration order
    for stmt in &ast.root.statements {
        if let Some(symbol) = global_symbol(stmt) {
            package.declare(symbol.clone());
        }
    }

    let emitter = Emitter { types: &ast.types };
    for stmt in &ast.root.statements {
        if let Stmt::Function(f) = stmt {
            let chunk = emitter.compile_function(f);
            log::debug!(
                "compiled fn {} ({} bytes)",
                f.symbol.name,
                chunk.len()
            );
            package.insert_function(
                &f.symbol.name,
                Object::new_function(f.symbol.name.clone(), chunk),
            );
        }
    }
}

fn global_symbol(stmt: &Stmt) -> Option<&Symbol> {
    match stmt {
        Stmt::Function(f) | Stmt::NativeFunction(f) => Some(&f.symbol),
        Stmt::Struct(s) => Some(&s.symbol),
        Stmt::Union(u) => Some(&u.symbol),
        _ => None,
    }
}

struct Emitter<'a> {
    types: &'a TypeRegistry,
}

impl<'a> Emitter<'a> {
    fn compile_function(&self, f: &FunctionDecl) -> Chunk {
        let mut chunk = Chunk::new();
        if let Some(body) = &f.body {
            self.emit_block(&mut chunk, body);
        }
        // a void function falls off its end; synthesize the return
        if f.return_ty == TypeId::VOID {
            chunk.write_op(OpCode::Nil);
            chunk.write_op(OpCode::Return);
        }
        chunk
    }

    fn emit_block(&self, chunk: &mut Chunk, block: &Block) {
        for stmt in &block.statements {
            self.emit_stmt(chunk, stmt);
        }
        match block.var_count {
            0 => {}
            1 => chunk.write_op(OpCode::Pop),
            n => {
                chunk.write_op(OpCode::PopV);
                chunk.write_u16(n);
            }
        }
    }

    fn emit_stmt(&self, chunk: &mut Chunk, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.emit_block(chunk, block),
            Stmt::If(s) => self.emit_if(chunk, s),
            Stmt::While(s) => self.emit_while(chunk, s),
            Stmt::Variable(v) => self.emit_variable(chunk, v),
            Stmt::Return(r) => {
                match &r.value {
                    Some(value) => self.emit_expr(chunk, value),
                    None => chunk.write_op(OpCode::Nil),
                }
                chunk.write_op(OpCode::Return);
            }
            Stmt::Assignment(a) => self.emit_assignment(chunk, &a.target, &a.value),
            Stmt::Expression(expr) => {
                self.emit_expr(chunk, expr);
                chunk.write_op(OpCode::Pop);
            }
            Stmt::Closure(decl) => self.emit_closure(chunk, decl),
            // no code behind these; functions are compiled separately and
            // struct/union/native declarations are metadata only
            Stmt::Function(_)
            | Stmt::NativeFunction(_)
            | Stmt::Struct(_)
            | Stmt::Union(_) => {}
        }
    }

    fn emit_if(&self, chunk: &mut Chunk, s: &If) {
        self.emit_expr(chunk, &s.condition);
        let skip_then = emit_jump(chunk, OpCode::JmpZ);
        self.emit_stmt(chunk, &s.then);
        match &s.otherwise {
            Some(otherwise) => {
                let skip_else = emit_jump(chunk, OpCode::Jmp);
                patch_jump(chunk, skip_then);
                self.emit_stmt(chunk, otherwise);
                patch_jump(chunk, skip_else);
            }
            None => patch_jump(chunk, skip_then),
        }
    }

    fn emit_while(&self, chunk: &mut Chunk, s: &While) {
        let loop_start = chunk.len();
        self.emit_expr(chunk, &s.condition);
        let exit = emit_jump(chunk, OpCode::JmpZ);
        self.emit_stmt(chunk, &s.body);
        emit_loop(chunk, loop_start);
        patch_jump(chunk, exit);
    }

    // The initializer's value stays on the stack: that slot is the local.
    fn emit_variable(&self, chunk: &mut Chunk, v: &mica_ast::Variable) {
        match &v.value {
            Some(value) => self.emit_expr(chunk, value),
            None => match self.types.get(v.symbol.ty) {
                Type::Array(_) => chunk.write_op(OpCode::EmptyArray),
                Type::Map(_, _) => chunk.write_op(OpCode::EmptyMap),
                _ => chunk.write_op(OpCode::Nil),
            },
        }
    }

    fn emit_assignment(&self, chunk: &mut Chunk, target: &Expr, value: &Expr) {
        match target {
            Expr::Primary(p) => {
                self.emit_expr(chunk, value);
                if p.symbol.upvalue != UpvalueKind::None {
                    chunk.write_op(OpCode::UpvalueSet);
                    chunk.write_u16(p.symbol.index as u16);
                } else {
                    chunk.write_op(OpCode::Set);
                    chunk.write_u16(p.symbol.index as u16);
                }
            }
            Expr::Subscript(s) => {
                self.emit_expr(chunk, value);
                self.emit_expr(chunk, &s.object);
                self.emit_expr(chunk, &s.index);
                chunk.write_op(OpCode::IndexSet);
            }
            Expr::Access(a) => {
                self.emit_expr(chunk, value);
                self.emit_expr(chunk, &a.object);
                let Expr::Primary(member) = &*a.element else {
                    return;
                };
                chunk.write_op(OpCode::StructSet);
                chunk.write_u16(member.symbol.index as u16);
            }
            _ => {}
        }
    }

    fn emit_closure(&self, chunk: &mut Chunk, decl: &ClosureDecl) {
        let inner = self.compile_function(&decl.function);
        let proto = FunctionProto {
            name: decl.function.symbol.name.clone(),
            chunk: inner,
            upvalue_count: decl.upvalues.len() as u16,
        };
        let proto_index = chunk.add_proto(proto);
        chunk.write_op(OpCode::Closure);
        chunk.write_u16(proto_index);
        for upvalue in &decl.upvalues {
            chunk.write_u16(upvalue.index as u16);
            chunk.write_u8(u8::from(upvalue.nonlocal));
        }
        // the pushed closure object is the declaration's local slot
    }

    // ==================== Expressions ====================

    fn emit_expr(&self, chunk: &mut Chunk, expr: &Expr) {
        match expr {
            Expr::Literal(l) => match &l.value {
                LiteralValue::Int(v) => {
                    chunk.write_op(OpCode::Int);
                    chunk.write_i64(*v);
                }
                LiteralValue::Float(v) => {
                    chunk.write_op(OpCode::Float);
                    chunk.write_f64(*v);
                }
                LiteralValue::Bool(true) => chunk.write_op(OpCode::True),
                LiteralValue::Bool(false) => chunk.write_op(OpCode::False),
                LiteralValue::Str(s) => {
                    let index = chunk.add_string(s.clone());
                    chunk.write_op(OpCode::StringLit);
                    chunk.write_u16(index);
                }
            },
            Expr::Grouping(inner) => self.emit_expr(chunk, inner),
            Expr::Primary(p) => {
                if p.symbol.is_global {
                    chunk.write_op(OpCode::GlobalGet);
                } else if p.symbol.upvalue != UpvalueKind::None {
                    chunk.write_op(OpCode::UpvalueGet);
                } else {
                    chunk.write_op(OpCode::Get);
                }
                chunk.write_u16(p.symbol.index as u16);
            }
            Expr::Unary(u) => {
                self.emit_expr(chunk, &u.right);
                match u.op {
                    UnOp::Not => chunk.write_op(OpCode::Not),
                    UnOp::Neg => {
                        if u.ty == TypeId::FLOAT {
                            chunk.write_op(OpCode::NegateF);
                        } else {
                            chunk.write_op(OpCode::NegateI);
                        }
                    }
                }
            }
            Expr::Binary(b) => self.emit_binary(chunk, b),
            Expr::Cast(c) => {
                self.emit_expr(chunk, &c.right);
                match (c.from, c.to) {
                    (TypeId::FLOAT, TypeId::INT) => chunk.write_op(OpCode::IntCast),
                    (_, TypeId::FLOAT) => chunk.write_op(OpCode::FloatCast),
                    // Bool widens to Int without representation change
                    _ => {}
                }
            }
            Expr::ArrayLiteral(array) => {
                for element in array.elements.iter().rev() {
                    self.emit_expr(chunk, element);
                }
                chunk.write_op(OpCode::ArrayLit);
                chunk.write_u8(array.elements.len() as u8);
            }
            Expr::MapLiteral(map) => {
                for entry in &map.entries {
                    self.emit_expr(chunk, &entry.key);
                    self.emit_expr(chunk, &entry.value);
                }
                chunk.write_op(OpCode::MapLit);
                chunk.write_u8(map.entries.len() as u8);
            }
            Expr::Subscript(s) => {
                self.emit_expr(chunk, &s.object);
                self.emit_expr(chunk, &s.index);
                chunk.write_op(OpCode::IndexGet);
            }
            Expr::Access(a) => self.emit_access(chunk, a),
            Expr::Call(call) => self.emit_call(chunk, call),
        }
    }

    fn emit_binary(&self, chunk: &mut Chunk, b: &mica_ast::Binary) {
        if b.op.is_logic() {
            self.emit_expr(chunk, &b.left);
            let op = if b.op == BinOp::And {
                OpCode::And
            } else {
                OpCode::Or
            };
            let short = emit_jump(chunk, op);
            self.emit_expr(chunk, &b.right);
            patch_jump(chunk, short);
            return;
        }

        self.emit_expr(chunk, &b.left);
        self.emit_expr(chunk, &b.right);

        let float = b.operand_ty == TypeId::FLOAT;
        match b.op {
            BinOp::Add => chunk.write_op(pick(float, OpCode::AddF, OpCode::AddI)),
            BinOp::Sub => chunk.write_op(pick(float, OpCode::SubF, OpCode::SubI)),
            BinOp::Mul => chunk.write_op(pick(float, OpCode::MulF, OpCode::MulI)),
            BinOp::Div | BinOp::FloorDiv => {
                chunk.write_op(pick(float, OpCode::DivF, OpCode::DivI))
            }
            BinOp::Rem => chunk.write_op(pick(float, OpCode::ModF, OpCode::ModI)),
            BinOp::Less => chunk.write_op(pick(float, OpCode::LessF, OpCode::LessI)),
            BinOp::Greater => chunk.write_op(pick(float, OpCode::GreaterF, OpCode::GreaterI)),
            BinOp::Equal => chunk.write_op(pick(float, OpCode::EqualF, OpCode::EqualI)),
            BinOp::LessEq => {
                chunk.write_op(pick(float, OpCode::GreaterF, OpCode::GreaterI));
                chunk.write_op(OpCode::Not);
            }
            BinOp::GreaterEq => {
                chunk.write_op(pick(float, OpCode::LessF, OpCode::LessI));
                chunk.write_op(OpCode::Not);
            }
            BinOp::NotEqual => {
                chunk.write_op(pick(float, OpCode::EqualF, OpCode::EqualI));
                chunk.write_op(OpCode::Not);
            }
            BinOp::And | BinOp::Or => {}
        }
    }

    // Member access, or a validated overload pick: the latter loads the
    // overload array and indexes into it.
    fn emit_access(&self, chunk: &mut Chunk, a: &mica_ast::Access) {
        let Expr::Primary(element) = &*a.element else {
            return;
        };
        if let Expr::Primary(object) = &*a.object {
            if matches!(self.types.get(object.symbol.ty), Type::OverloadSet(sigs) if sigs.len() > 1)
            {
                self.emit_expr(chunk, &a.object);
                chunk.write_op(OpCode::Int);
                chunk.write_i64(element.symbol.index as i64);
                chunk.write_op(OpCode::IndexGet);
                return;
            }
        }
        self.emit_expr(chunk, &a.object);
        chunk.write_op(OpCode::StructGet);
        chunk.write_u16(element.symbol.index as u16);
    }

    fn emit_call(&self, chunk: &mut Chunk, call: &mica_ast::Call) {
        // constructor calls allocate inline; there is no callable object
        let mut callee = &*call.callable;
        while let Expr::Grouping(inner) = callee {
            callee = inner;
        }
        if let Expr::Primary(p) = callee {
            if let Type::Struct { members, .. } = self.types.get(p.symbol.ty) {
                for arg in &call.args {
                    self.emit_expr(chunk, arg);
                }
                for _ in call.args.len()..members.len() {
                    chunk.write_op(OpCode::Nil);
                }
                chunk.write_op(OpCode::Constructor);
                chunk.write_u8(members.len() as u8);
                return;
            }
        }

        for arg in &call.args {
            self.emit_expr(chunk, arg);
        }
        self.emit_expr(chunk, &call.callable);
        chunk.write_op(OpCode::Call);
        chunk.write_u8(call.args.len() as u8);
    }
}

fn pick(float: bool, f: OpCode, i: OpCode) -> OpCode {
    if float {
        f
    } else {
        i
    }
}

/// Emit a branch with a placeholder offset; returns the operand position.
fn emit_jump(chunk: &mut Chunk, op: OpCode) -> usize {
    chunk.write_op(op);
    let at = chunk.len();
    chunk.write_i16(0);
    at
}

/// Point a previously emitted branch at the current end of the chunk.
fn patch_jump(chunk: &mut Chunk, at: usize) {
    let offset = chunk.len() - (at + 2);
    chunk.patch_i16(at, offset as i16);
}

/// Backward branch to `target`, offset relative to the byte after the
/// operand.
fn emit_loop(chunk: &mut Chunk, target: usize) {
    chunk.write_op(OpCode::Jmp);
    let after_operand = chunk.len() + 2;
    chunk.write_i16((target as i64 - after_operand as i64) as i16);
}
