// Semantic validation
//
// Two passes over the top level: `load_globals` registers every top-level
// name (coalescing function overloads into overload sets), then `analyze`
// walks each declaration in detail — resolving names against the scope
// chain, checking types, assigning stack and upvalue indices, and
// rewriting the tree with coercion casts, member ordinals, and overload
// picks. Failing expressions yield the Invalid handle so downstream
// checks short-circuit without cascaded reports.

use crate::scope::{FrameKind, ScopeStack};
use mica_ast::{
    Assignment, Ast, BinOp, Block, Call, Cast, Expr, FunctionDecl, If, Literal, LiteralValue,
    Primary, Return, Span, Stmt, StructDecl, Symbol, Type, TypeId, TypeRegistry, UnOp,
    UpvalueKind, UpvalueSym, Variable, While,
};
use mica_diagnostics::{closest_match, Category, Diagnostic};

struct FuncCtx {
    return_ty: TypeId,
    upvalues: Vec<UpvalueSym>,
}

pub struct Validator<'a> {
    types: &'a mut TypeRegistry,
    scopes: ScopeStack,
    functions: Vec<FuncCtx>,
    diagnostics: Vec<Diagnostic>,
}

/// Validate a parsed program in place. On failure every offending
/// statement has been reported once.
pub fn validate(ast: &mut Ast) -> Result<(), Vec<Diagnostic>> {
    let Ast { root, types } = ast;
    let mut validator = Validator {
        types,
        scopes: ScopeStack::new(),
        functions: Vec::new(),
        diagnostics: Vec::new(),
    };

    validator.load_globals(root);
    validator.analyze_globals(root);

    if validator.diagnostics.is_empty() {
        Ok(())
    } else {
        Err(validator.diagnostics)
    }
}

impl<'a> Validator<'a> {
    // ==================== Global loading pass ====================

    fn load_globals(&mut self, root: &mut Block) {
        for stmt in &mut root.statements {
            match stmt {
                Stmt::Function(f) => self.load_fn(f),
                Stmt::NativeFunction(f) => {
                    let symbol = f.symbol.clone();
                    if let Err(prior) = self.scopes.declare(symbol) {
                        self.error_scope_at(
                            "Redefinition of name. (Native functions are not overloadable.)",
                            f.symbol.span.clone(),
                            &prior,
                        );
                    }
                }
                Stmt::Struct(s) => {
                    if let Err(prior) = self.scopes.declare(s.symbol.clone()) {
                        self.error_scope_at(
                            "Redefinition of name.",
                            s.symbol.span.clone(),
                            &prior,
                        );
                    }
                }
                Stmt::Union(u) => {
                    if let Err(prior) = self.scopes.declare(u.symbol.clone()) {
                        self.error_scope_at(
                            "Redefinition of name.",
                            u.symbol.span.clone(),
                            &prior,
                        );
                    }
                }
                _ => {}
            }
        }
    }

    // Same-named functions accrue an overload set on the shared global
    // symbol; the declaration's own symbol keeps its position in the set.
    fn load_fn(&mut self, f: &mut FunctionDecl) {
        let signature = f.symbol.ty;
        match self.scopes.find(&f.symbol.name) {
            None => {
                let set = self.types.register_overload_set(vec![signature]);
                f.symbol.index = 0;
                let mut symbol = f.symbol.clone();
                symbol.ty = set;
                // cannot collide: find() just missed
                let _ = self.scopes.declare(symbol);
            }
            Some(resolution) => match self.types.get(resolution.symbol.ty) {
                Type::OverloadSet(signatures) => {
                    if signatures.contains(&signature) {
                        self.error_scope_at(
                            "Redefinition of name.",
                            f.symbol.span.clone(),
                            &resolution.symbol,
                        );
                        return;
                    }
                    if signatures.len() >= 255 {
                        self.error_type("Too many overloads.", f.symbol.span.clone());
                        return;
                    }
                    let mut signatures = signatures.clone();
                    f.symbol.index = signatures.len();
                    signatures.push(signature);
                    let set = self.types.register_overload_set(signatures);
                    let mut symbol = resolution.symbol.clone();
                    symbol.ty = set;
                    self.scopes.update_global(&f.symbol.name, symbol);
                }
                _ => {
                    self.error_scope_at(
                        "Redefinition of name.",
                        f.symbol.span.clone(),
                        &resolution.symbol,
                    );
                }
            },
        }
    }

    // ==================== Analysis pass ====================

    fn analyze_globals(&mut self, root: &mut Block) {
        for stmt in &mut root.statements {
            match stmt {
                Stmt::Function(f) => {
                    self.analyze_function(f);
                }
                Stmt::Struct(s) => self.analyze_struct(s),
                Stmt::Union(_) | Stmt::NativeFunction(_) => {}
                _ => {}
            }
        }
    }

    fn analyze_function(&mut self, f: &mut FunctionDecl) -> Vec<UpvalueSym> {
        self.scopes.push_function();
        self.functions.push(FuncCtx {
            return_ty: f.return_ty,
            upvalues: Vec::new(),
        });

        for param in &mut f.params {
            self.analyze_variable(param);
        }
        if let Some(body) = &mut f.body {
            self.analyze_block(body);

            if f.return_ty != TypeId::VOID {
                let ends_with_return =
                    matches!(body.statements.last(), Some(Stmt::Return(_)));
                if !ends_with_return {
                    self.error_type(
                        "Non-void function doesn't return anything.",
                        f.symbol.span.clone(),
                    );
                }
            }
        }

        self.scopes.pop();
        self.functions
            .pop()
            .map(|ctx| ctx.upvalues)
            .unwrap_or_default()
    }

    fn analyze_struct(&mut self, s: &mut StructDecl) {
        self.scopes.push_block();
        for member in &mut s.members {
            self.analyze_variable(member);
        }
        self.scopes.pop();
    }

    fn analyze_block(&mut self, block: &mut Block) {
        self.scopes.push_block();
        let start = self.scopes.current_counter();
        for stmt in &mut block.statements {
            self.analyze_stmt(stmt);
        }
        block.var_count = (self.scopes.current_counter() - start) as u16;
        self.scopes.pop();
    }

    fn analyze_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Block(block) => self.analyze_block(block),
            Stmt::If(s) => self.analyze_if(s),
            Stmt::While(s) => self.analyze_while(s),
            Stmt::Variable(v) => self.analyze_variable(v),
            Stmt::Return(r) => self.analyze_return(r),
            Stmt::Closure(_) => self.analyze_closure(stmt),
            Stmt::Assignment(_) => self.analyze_assignment(stmt),
            Stmt::Expression(expr) => {
                self.analyze_expr(expr);
            }
            // the parser only produces these at the top level
            Stmt::Function(_)
            | Stmt::NativeFunction(_)
            | Stmt::Struct(_)
            | Stmt::Union(_) => {}
        }
    }

    fn analyze_if(&mut self, s: &mut If) {
        let cond_ty = self.analyze_expr(&mut s.condition);
        self.check_condition(cond_ty, s.condition.span());
        self.analyze_stmt(&mut s.then);
        if let Some(otherwise) = &mut s.otherwise {
            self.analyze_stmt(otherwise);
        }
    }

    fn analyze_while(&mut self, s: &mut While) {
        let cond_ty = self.analyze_expr(&mut s.condition);
        self.check_condition(cond_ty, s.condition.span());
        self.analyze_stmt(&mut s.body);
    }

    fn check_condition(&mut self, ty: TypeId, span: Span) {
        if ty != TypeId::INVALID && !ty.is_numeric() {
            self.error_type("Expression doesn't return Bool.", span);
        }
    }

    fn analyze_variable(&mut self, v: &mut Variable) {
        // analyze the initializer before the name becomes visible
        let value_ty = match &mut v.value {
            Some(expr) => Some(self.analyze_expr(expr)),
            None => None,
        };

        // implicit declarations take the initializer's type
        if v.symbol.ty == TypeId::INVALID {
            v.symbol.ty = value_ty.unwrap_or(TypeId::INVALID);
        }

        // a user-type annotation resolves to the declared struct or union
        if let Type::User(name) = self.types.get(v.symbol.ty) {
            let name = name.clone();
            match self.scopes.find(&name) {
                Some(resolution)
                    if matches!(
                        self.types.get(resolution.symbol.ty),
                        Type::Struct { .. } | Type::Union { .. }
                    ) =>
                {
                    v.symbol.ty = resolution.symbol.ty;
                }
                _ => {
                    self.error_scope("Unknown type.", v.symbol.span.clone());
                    return;
                }
            }
        }

        if v.symbol.ty == TypeId::ANY {
            self.error_type(
                "'Any' is only allowed as a parameter of a native function.",
                v.symbol.span.clone(),
            );
        }

        // a struct variable without an initializer gets the zero-argument
        // constructor so the engine allocates it on entry
        if v.value.is_none() {
            if let Type::Struct { name, .. } = self.types.get(v.symbol.ty) {
                let name = name.clone();
                if let Some(resolution) = self.scopes.find(&name) {
                    let mut callee = Symbol::new(
                        name,
                        v.symbol.span.clone(),
                        resolution.symbol.ty,
                    );
                    callee.index = resolution.symbol.index;
                    callee.is_global = true;
                    v.value = Some(Expr::Call(Call {
                        callable: Box::new(Expr::Primary(Primary { symbol: callee })),
                        args: Vec::new(),
                        span: v.symbol.span.clone(),
                    }));
                }
            }
        }

        if let (Some(value), Some(from)) = (&mut v.value, value_ty) {
            if from != TypeId::INVALID {
                let to = v.symbol.ty;
                let span = value.span();
                self.check_assignment_with_cast(
                    to,
                    from,
                    value,
                    span,
                    "Invalid assignment to variable of different type.",
                );
            }
        }

        v.symbol.assignable = true;
        match self.scopes.declare(v.symbol.clone()) {
            Ok(declared) => v.symbol = declared,
            Err(prior) => {
                self.error_scope_at("Redefinition of name.", v.symbol.span.clone(), &prior)
            }
        }
    }

    fn analyze_return(&mut self, r: &mut Return) {
        let Some(return_ty) = self.functions.last().map(|f| f.return_ty) else {
            self.error_type("Return outside of a function.", r.span.clone());
            return;
        };

        if return_ty == TypeId::VOID {
            if let Some(value) = &r.value {
                self.error_type("Void function returns a value.", value.span());
            }
            return;
        }

        match &mut r.value {
            None => self.error_type("Non-void function must return a value.", r.span.clone()),
            Some(value) => {
                let from = self.analyze_expr(value);
                if from != TypeId::INVALID {
                    let span = value.span();
                    self.check_assignment_with_cast(
                        return_ty,
                        from,
                        value,
                        span,
                        "Incompatible return type.",
                    );
                }
            }
        }
    }

    fn analyze_closure(&mut self, stmt: &mut Stmt) {
        let Stmt::Closure(decl) = stmt else {
            return;
        };
        let mut symbol = decl.function.symbol.clone();
        symbol.assignable = false;
        match self.scopes.declare(symbol) {
            Ok(declared) => decl.function.symbol = declared,
            Err(prior) => {
                let span = decl.function.symbol.span.clone();
                self.error_scope_at("Redefinition of name.", span, &prior);
                return;
            }
        }

        decl.upvalues = self.analyze_function(&mut decl.function);
        if decl.upvalues.len() > 255 {
            self.error_type(
                "Too many captured variables.",
                decl.function.symbol.span.clone(),
            );
        }
    }

    // `name := expr`: redefinition if `name` lives in the current scope,
    // assignment if it lives in an enclosing one, implicit declaration if
    // it is unknown.
    fn analyze_assignment(&mut self, stmt: &mut Stmt) {
        let Stmt::Assignment(assign) = stmt else {
            return;
        };

        if let Expr::Primary(p) = &assign.target {
            let name = p.symbol.name.clone();
            let span = p.symbol.span.clone();
            if let Some(prior) = self.scopes.find_in_current(&name) {
                self.error_scope_at("Redefinition of name.", span, &prior);
                return;
            }
            if self.scopes.find(&name).is_none() {
                // implicit declaration, typed by the initializer
                let placeholder = Stmt::Block(Block::new(Vec::new()));
                let Stmt::Assignment(Assignment { target, value }) =
                    std::mem::replace(stmt, placeholder)
                else {
                    return;
                };
                let Expr::Primary(p) = target else {
                    return;
                };
                let symbol = Symbol::new(p.symbol.name, p.symbol.span, TypeId::INVALID);
                let mut variable = Variable {
                    symbol,
                    value: Some(value),
                };
                self.analyze_variable(&mut variable);
                *stmt = Stmt::Variable(variable);
                return;
            }
        }

        let target_ty = self.analyze_expr(&mut assign.target);
        if target_ty == TypeId::INVALID {
            return;
        }

        if let Expr::Primary(p) = &assign.target {
            if !p.symbol.assignable {
                self.error_type("Expression is not assignable.", p.symbol.span.clone());
                return;
            }
        }

        let value_ty = self.analyze_expr(&mut assign.value);
        if value_ty == TypeId::INVALID {
            return;
        }
        let span = assign.value.span();
        self.check_assignment_with_cast(
            target_ty,
            value_ty,
            &mut assign.value,
            span,
            "Invalid assignment to variable of different type.",
        );
    }

    // ==================== Expressions ====================

    fn analyze_expr(&mut self, expr: &mut Expr) -> TypeId {
        match expr {
            Expr::Literal(l) => literal_type(l),
            Expr::Grouping(inner) => self.analyze_expr(inner),
            Expr::Primary(_) => self.analyze_primary(expr),
            Expr::Unary(_) => self.analyze_unary(expr),
            Expr::Binary(_) => self.analyze_binary(expr),
            Expr::ArrayLiteral(_) => self.analyze_array_literal(expr),
            Expr::MapLiteral(_) => self.analyze_map_literal(expr),
            Expr::Call(_) => self.analyze_call(expr),
            Expr::Subscript(_) => self.analyze_subscript(expr),
            Expr::Access(_) => self.analyze_access(expr),
            Expr::Cast(c) => c.to,
        }
    }

    fn analyze_primary(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::Primary(p) = expr else {
            return TypeId::INVALID;
        };
        let name = p.symbol.name.clone();

        let Some(resolution) = self.scopes.find(&name) else {
            let names = self.scopes.visible_names();
            let suggestion =
                closest_match(&name, names.iter().map(|n| n.as_str())).map(str::to_string);
            let mut diagnostic = Diagnostic::error(
                Category::Scope,
                "Undeclared variable.",
                p.symbol.span.clone(),
            );
            if let Some(suggestion) = suggestion {
                diagnostic = diagnostic.with_suggestion(suggestion);
            }
            self.diagnostics.push(diagnostic);
            return TypeId::INVALID;
        };

        p.symbol.ty = resolution.symbol.ty;
        p.symbol.assignable = resolution.symbol.assignable;

        if self.scopes.frame_kind(resolution.frame) == FrameKind::Global {
            p.symbol.is_global = true;
            p.symbol.index = resolution.symbol.index;
            p.symbol.upvalue = UpvalueKind::None;
            return p.symbol.ty;
        }

        // locals: either in the current function's frame subtree, or
        // captured across one or more closure boundaries
        let crossings = self.scopes.function_frames_above(resolution.frame);
        if crossings.is_empty() {
            p.symbol.is_global = false;
            p.symbol.index = resolution.symbol.index;
            p.symbol.upvalue = UpvalueKind::None;
            return p.symbol.ty;
        }

        let total_functions = self.functions.len();
        let first_crossed_ctx = total_functions - crossings.len();

        let mut index = resolution.symbol.index;
        let mut nonlocal = false;
        for ctx in first_crossed_ctx..total_functions {
            index = self.add_upvalue(
                ctx,
                UpvalueSym {
                    name: name.clone(),
                    index,
                    nonlocal,
                    assignable: resolution.symbol.assignable,
                },
            );
            nonlocal = true;
        }

        p.symbol.index = index;
        p.symbol.is_global = false;
        p.symbol.upvalue = if crossings.len() == 1 {
            UpvalueKind::Local
        } else {
            UpvalueKind::NonLocal
        };
        p.symbol.ty
    }

    fn add_upvalue(&mut self, ctx: usize, upvalue: UpvalueSym) -> usize {
        let upvalues = &mut self.functions[ctx].upvalues;
        if let Some(found) = upvalues.iter().position(|u| u.name == upvalue.name) {
            return found;
        }
        upvalues.push(upvalue);
        upvalues.len() - 1
    }

    fn analyze_unary(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::Unary(u) = expr else {
            return TypeId::INVALID;
        };
        let right_ty = self.analyze_expr(&mut u.right);
        if right_ty == TypeId::INVALID {
            return TypeId::INVALID;
        }
        if !right_ty.is_numeric() {
            self.error_type(
                "Invalid operand to unary expression.",
                u.op_span.clone(),
            );
            return TypeId::INVALID;
        }
        u.ty = match u.op {
            UnOp::Neg => right_ty,
            UnOp::Not => TypeId::BOOL,
        };
        u.ty
    }

    fn analyze_binary(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::Binary(b) = expr else {
            return TypeId::INVALID;
        };
        let left_ty = self.analyze_expr(&mut b.left);
        let right_ty = self.analyze_expr(&mut b.right);
        if left_ty == TypeId::INVALID || right_ty == TypeId::INVALID {
            return TypeId::INVALID;
        }

        if !left_ty.is_numeric() || !right_ty.is_numeric() {
            self.error_type(
                "Invalid operation between objects of different types.",
                b.op_span.clone(),
            );
            return TypeId::INVALID;
        }

        // promote the lower-ranked operand
        let common = if left_ty.numeric_rank() >= right_ty.numeric_rank() {
            left_ty
        } else {
            right_ty
        };
        if left_ty != common {
            wrap_cast(&mut b.left, left_ty, common);
        }
        if right_ty != common {
            wrap_cast(&mut b.right, right_ty, common);
        }

        if b.op == BinOp::FloorDiv {
            // floor division is integer division; float operands are
            // truncated first
            if common == TypeId::FLOAT {
                wrap_cast(&mut b.left, TypeId::FLOAT, TypeId::INT);
                wrap_cast(&mut b.right, TypeId::FLOAT, TypeId::INT);
            }
            b.operand_ty = TypeId::INT;
            b.ty = TypeId::INT;
        } else if b.op.is_arithmetic() {
            b.operand_ty = common;
            b.ty = common;
        } else {
            // comparisons and logic yield Bool
            b.operand_ty = common;
            b.ty = TypeId::BOOL;
        }
        b.ty
    }

    fn analyze_array_literal(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::ArrayLiteral(array) = expr else {
            return TypeId::INVALID;
        };
        let Some((first, rest)) = array.elements.split_first_mut() else {
            self.error_type("Array literal cannot be empty.", array.span.clone());
            return TypeId::INVALID;
        };
        let elem_ty = self.analyze_expr(first);
        if elem_ty == TypeId::INVALID {
            return TypeId::INVALID;
        }
        let mut all_ok = true;
        for element in rest {
            let ty = self.analyze_expr(element);
            if ty == TypeId::INVALID {
                return TypeId::INVALID;
            }
            if !self.types.matches(elem_ty, ty) {
                self.error_type(
                    "Array literal must contain expressions of the same type.",
                    element.span(),
                );
                all_ok = false;
            }
        }
        if !all_ok {
            return TypeId::INVALID;
        }
        self.types.register_array(elem_ty)
    }

    fn analyze_map_literal(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::MapLiteral(map) = expr else {
            return TypeId::INVALID;
        };
        if map.entries.is_empty() {
            self.error_type("Map literal cannot be empty.", map.span.clone());
            return TypeId::INVALID;
        }

        let mut key_ty = TypeId::INVALID;
        let mut value_ty = TypeId::INVALID;
        for (i, entry) in map.entries.iter_mut().enumerate() {
            let k = self.analyze_expr(&mut entry.key);
            let v = self.analyze_expr(&mut entry.value);
            if k == TypeId::INVALID || v == TypeId::INVALID {
                return TypeId::INVALID;
            }
            if i == 0 {
                if !is_hashable(k) {
                    self.error_type("Map key type is not hashable.", entry.key.span());
                    return TypeId::INVALID;
                }
                key_ty = k;
                value_ty = v;
            } else if !self.types.matches(key_ty, k) || !self.types.matches(value_ty, v) {
                self.error_type(
                    "Map literal must contain expressions of the same type.",
                    entry.key.span(),
                );
                return TypeId::INVALID;
            }
        }
        self.types.register_map(key_ty, value_ty)
    }

    fn analyze_call(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::Call(call) = expr else {
            return TypeId::INVALID;
        };

        let callee_ty = self.analyze_expr(&mut call.callable);
        if callee_ty == TypeId::INVALID {
            return TypeId::INVALID;
        }

        let mut arg_tys = Vec::with_capacity(call.args.len());
        for arg in &mut call.args {
            let ty = self.analyze_expr(arg);
            if ty == TypeId::INVALID {
                return TypeId::INVALID;
            }
            arg_tys.push(ty);
        }

        match self.types.get(self.resolve_user(callee_ty)).clone() {
            Type::Fn(sig) => {
                if sig.params.len() != call.args.len() {
                    self.error_type("Wrong number of arguments.", call.callable.span());
                    return TypeId::INVALID;
                }
                if !self.coerce_arguments(&sig.params, &arg_tys, &mut call.args) {
                    return TypeId::INVALID;
                }
                sig.ret
            }
            Type::OverloadSet(signatures) => {
                for (pick, sig_id) in signatures.iter().enumerate() {
                    let Type::Fn(sig) = self.types.get(*sig_id).clone() else {
                        continue;
                    };
                    if sig.params.len() != call.args.len() {
                        continue;
                    }
                    let applicable = sig
                        .params
                        .iter()
                        .zip(arg_tys.iter())
                        .all(|(param, arg)| self.is_assignable(*param, *arg));
                    if !applicable {
                        continue;
                    }

                    self.coerce_arguments(&sig.params, &arg_tys, &mut call.args);
                    if signatures.len() > 1 {
                        rewrite_overload_pick(&mut call.callable, pick, *sig_id);
                    }
                    return sig.ret;
                }
                self.error_type(
                    "There is no overload with these parameters.",
                    call.callable.span(),
                );
                TypeId::INVALID
            }
            Type::Struct { name: _, members } => {
                if call.args.is_empty() {
                    return self.resolve_user(callee_ty);
                }
                if call.args.len() != members.len() {
                    self.error_type(
                        "Wrong number of constructor arguments.",
                        call.callable.span(),
                    );
                    return TypeId::INVALID;
                }
                let member_tys: Vec<TypeId> = members.iter().map(|m| m.ty).collect();
                if !self.coerce_arguments(&member_tys, &arg_tys, &mut call.args) {
                    return TypeId::INVALID;
                }
                self.resolve_user(callee_ty)
            }
            _ => {
                self.error_type("Expression is not callable.", call.callable.span());
                TypeId::INVALID
            }
        }
    }

    // Check each argument against its parameter, inserting promotion
    // casts where needed. Reports on failure.
    fn coerce_arguments(
        &mut self,
        params: &[TypeId],
        arg_tys: &[TypeId],
        args: &mut [Expr],
    ) -> bool {
        let mut all_ok = true;
        for ((param, arg_ty), arg) in params.iter().zip(arg_tys.iter()).zip(args.iter_mut()) {
            let span = arg.span();
            if !self.check_assignment_with_cast(
                *param,
                *arg_ty,
                arg,
                span,
                "Wrong type of argument.",
            ) {
                all_ok = false;
            }
        }
        all_ok
    }

    fn is_assignable(&self, to: TypeId, from: TypeId) -> bool {
        if self.types.matches(to, from) {
            return true;
        }
        if let Type::Union { variants, .. } = self.types.get(self.resolve_user(to)) {
            if variants.iter().any(|v| self.types.matches(*v, from)) {
                return true;
            }
        }
        from.numeric_rank() > 0 && to.numeric_rank() > from.numeric_rank()
    }

    fn analyze_subscript(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::Subscript(sub) = expr else {
            return TypeId::INVALID;
        };
        let object_ty = self.analyze_expr(&mut sub.object);
        let index_ty = self.analyze_expr(&mut sub.index);
        if object_ty == TypeId::INVALID || index_ty == TypeId::INVALID {
            return TypeId::INVALID;
        }

        match self.types.get(self.resolve_user(object_ty)).clone() {
            Type::Array(element) => {
                if index_ty != TypeId::INT {
                    self.error_type(
                        "Index has to be an integral expression.",
                        sub.index.span(),
                    );
                    return TypeId::INVALID;
                }
                element
            }
            Type::Map(key, value) => {
                if !self.types.matches(key, index_ty) {
                    self.error_type("Index doesn't match key type.", sub.index.span());
                    return TypeId::INVALID;
                }
                value
            }
            // string subscripting passes validation; its meaning is still
            // an open question the engine answers with a runtime error
            Type::String => {
                if index_ty != TypeId::INT {
                    self.error_type(
                        "Index has to be an integral expression.",
                        sub.index.span(),
                    );
                    return TypeId::INVALID;
                }
                TypeId::STRING
            }
            _ => {
                self.error_type("Expression is not subscriptable.", sub.object.span());
                TypeId::INVALID
            }
        }
    }

    fn analyze_access(&mut self, expr: &mut Expr) -> TypeId {
        let Expr::Access(access) = expr else {
            return TypeId::INVALID;
        };
        let object_ty = self.analyze_expr(&mut access.object);
        if object_ty == TypeId::INVALID {
            return TypeId::INVALID;
        }

        let Type::Struct { members, .. } = self.types.get(self.resolve_user(object_ty)).clone()
        else {
            self.error_type("Expression is not accessible.", access.object.span());
            return TypeId::INVALID;
        };

        let Expr::Primary(element) = &mut *access.element else {
            self.error_type(
                "Expression cannot be used as an access expression.",
                access.span.clone(),
            );
            return TypeId::INVALID;
        };

        match members
            .iter()
            .position(|m| m.name == element.symbol.name)
        {
            Some(index) => {
                element.symbol.index = index;
                element.symbol.ty = members[index].ty;
                element.symbol.assignable = true;
                members[index].ty
            }
            None => {
                self.error_type("No member with this name.", element.symbol.span.clone());
                TypeId::INVALID
            }
        }
    }

    // ==================== Shared checks ====================

    fn resolve_user(&self, ty: TypeId) -> TypeId {
        if let Type::User(name) = self.types.get(ty) {
            if let Some(resolution) = self.scopes.find(name) {
                if matches!(
                    self.types.get(resolution.symbol.ty),
                    Type::Struct { .. } | Type::Union { .. }
                ) {
                    return resolution.symbol.ty;
                }
            }
        }
        ty
    }

    /// Accepts when the types match, when the target is a union with a
    /// matching variant, or when a numeric promotion closes the gap (in
    /// which case the expression is wrapped in a cast). Reports `message`
    /// otherwise.
    fn check_assignment_with_cast(
        &mut self,
        to: TypeId,
        from: TypeId,
        expr: &mut Expr,
        span: Span,
        message: &str,
    ) -> bool {
        let to_resolved = self.resolve_user(to);
        if self.types.matches(to_resolved, from) {
            return true;
        }
        if let Type::Union { variants, .. } = self.types.get(to_resolved) {
            if variants.iter().any(|v| self.types.matches(*v, from)) {
                // union values are stored untagged
                return true;
            }
        }
        if from.numeric_rank() > 0 && to_resolved.numeric_rank() > from.numeric_rank() {
            wrap_cast(expr, from, to_resolved);
            return true;
        }
        self.error_type(message, span);
        false
    }

    // ==================== Reporting ====================

    fn error_type(&mut self, message: &str, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(Category::Type, message, span));
    }

    fn error_scope(&mut self, message: &str, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(Category::Scope, message, span));
    }

    fn error_scope_at(&mut self, message: &str, span: Span, prior: &Symbol) {
        self.diagnostics.push(
            Diagnostic::error(Category::Scope, message, span)
                .with_note("Previously defined here.", Some(prior.span.clone())),
        );
    }
}

fn literal_type(literal: &Literal) -> TypeId {
    match literal.value {
        LiteralValue::Int(_) => TypeId::INT,
        LiteralValue::Float(_) => TypeId::FLOAT,
        LiteralValue::Bool(_) => TypeId::BOOL,
        LiteralValue::Str(_) => TypeId::STRING,
    }
}

fn is_hashable(ty: TypeId) -> bool {
    matches!(
        ty,
        TypeId::INT | TypeId::FLOAT | TypeId::BOOL | TypeId::STRING
    )
}

fn wrap_cast(expr: &mut Expr, from: TypeId, to: TypeId) {
    let placeholder = Expr::Literal(Literal {
        value: LiteralValue::Int(0),
        span: 0..0,
    });
    let inner = std::mem::replace(expr, placeholder);
    *expr = Expr::Cast(Cast {
        right: Box::new(inner),
        from,
        to,
    });
}

// Rewrite a picked overload call target into an access on the overload
// array: `f` becomes `f.<pick>`, which the emitter lowers to an indexed
// load from the package slot.
fn rewrite_overload_pick(callable: &mut Box<Expr>, pick: usize, signature: TypeId) {
    let placeholder = Expr::Literal(Literal {
        value: LiteralValue::Int(0),
        span: 0..0,
    });
    let object = std::mem::replace(&mut **callable, placeholder);
    let span = object.span();
    let mut element = Symbol::new(format!("<overload {pick}>"), span.clone(), signature);
    element.index = pick;
    **callable = Expr::Access(mica_ast::Access {
        object: Box::new(object),
        element: Box::new(Expr::Primary(Primary { symbol: element })),
        span,
    });
}
