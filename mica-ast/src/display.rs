// AST printers
//
// `prefix` renders expressions in canonical prefix form for shape
// assertions; `to_source` renders statements back into parseable source,
// which the determinism tests run to a fixed point.

use crate::{
    registry::TypeRegistry, Block, Expr, LiteralValue, Stmt, TypeId,
};
use std::fmt::Write;

/// Canonical prefix form of an expression, e.g. `(+ 1 (* 2 3))`.
pub fn prefix(expr: &Expr) -> String {
    let mut out = String::new();
    write_prefix(&mut out, expr);
    out
}

fn write_prefix(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Binary(b) => {
            let _ = write!(out, "({} ", b.op.symbol());
            write_prefix(out, &b.left);
            out.push(' ');
            write_prefix(out, &b.right);
            out.push(')');
        }
        Expr::Unary(u) => {
            let _ = write!(out, "({} ", u.op.symbol());
            write_prefix(out, &u.right);
            out.push(')');
        }
        Expr::Grouping(inner) => write_prefix(out, inner),
        Expr::Literal(l) => {
            let _ = match &l.value {
                LiteralValue::Int(v) => write!(out, "{v}"),
                LiteralValue::Float(v) => write!(out, "{v:?}"),
                LiteralValue::Bool(v) => write!(out, "{v}"),
                LiteralValue::Str(s) => write!(out, "\"{s}\""),
            };
        }
        Expr::Primary(p) => out.push_str(&p.symbol.name),
        Expr::ArrayLiteral(a) => {
            out.push_str("(array");
            for e in &a.elements {
                out.push(' ');
                write_prefix(out, e);
            }
            out.push(')');
        }
        Expr::MapLiteral(m) => {
            out.push_str("(map");
            for entry in &m.entries {
                out.push(' ');
                write_prefix(out, &entry.key);
                out.push(':');
                write_prefix(out, &entry.value);
            }
            out.push(')');
        }
        Expr::Call(c) => {
            out.push_str("(call ");
            write_prefix(out, &c.callable);
            for a in &c.args {
                out.push(' ');
                write_prefix(out, a);
            }
            out.push(')');
        }
        Expr::Subscript(s) => {
            out.push_str("(index ");
            write_prefix(out, &s.object);
            out.push(' ');
            write_prefix(out, &s.index);
            out.push(')');
        }
        Expr::Access(a) => {
            out.push_str("(. ");
            write_prefix(out, &a.object);
            out.push(' ');
            write_prefix(out, &a.element);
            out.push(')');
        }
        Expr::Cast(c) => {
            out.push_str("(cast ");
            write_prefix(out, &c.right);
            out.push(')');
        }
    }
}

/// Render a whole program back into parseable source.
pub fn program_to_source(root: &Block, types: &TypeRegistry) -> String {
    let mut out = String::new();
    for stmt in &root.statements {
        write_stmt(&mut out, stmt, types, 0);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, types: &TypeRegistry, depth: usize) {
    match stmt {
        Stmt::Block(block) => {
            indent(out, depth);
            out.push_str("{\n");
            for s in &block.statements {
                write_stmt(out, s, types, depth + 1);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::If(s) => {
            indent(out, depth);
            let _ = write!(out, "if({}) ", expr_to_source(&s.condition));
            write_body(out, &s.then, types, depth);
            if let Some(otherwise) = &s.otherwise {
                indent(out, depth);
                out.push_str("else ");
                write_body(out, otherwise, types, depth);
            }
        }
        Stmt::While(s) => {
            indent(out, depth);
            let _ = write!(out, "while({}) ", expr_to_source(&s.condition));
            write_body(out, &s.body, types, depth);
        }
        Stmt::Variable(v) => {
            indent(out, depth);
            let _ = write!(out, "{} {}", types.name_of(v.symbol.ty), v.symbol.name);
            if let Some(value) = &v.value {
                let _ = write!(out, " := {}", expr_to_source(value));
            }
            out.push_str(";\n");
        }
        Stmt::Function(f) | Stmt::Closure(crate::ClosureDecl { function: f, .. }) => {
            indent(out, depth);
            let _ = write!(out, "fn {}(", f.symbol.name);
            write_params(out, f, types);
            out.push(')');
            if f.return_ty != TypeId::VOID {
                let _ = write!(out, " -> {}", types.name_of(f.return_ty));
            }
            out.push_str(" {\n");
            if let Some(body) = &f.body {
                for s in &body.statements {
                    write_stmt(out, s, types, depth + 1);
                }
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::NativeFunction(f) => {
            indent(out, depth);
            let _ = write!(out, "fn {}(", f.symbol.name);
            write_params(out, f, types);
            out.push(')');
            if f.return_ty != TypeId::VOID {
                let _ = write!(out, " -> {}", types.name_of(f.return_ty));
            }
            out.push_str(";\n");
        }
        Stmt::Struct(s) => {
            indent(out, depth);
            let _ = write!(out, "struct {} {{\n", s.symbol.name);
            for member in &s.members {
                indent(out, depth + 1);
                let _ = write!(
                    out,
                    "{} {};\n",
                    types.name_of(member.symbol.ty),
                    member.symbol.name
                );
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::Union(u) => {
            indent(out, depth);
            let variants = match types.get(u.symbol.ty) {
                crate::Type::Union { variants, .. } => variants
                    .iter()
                    .map(|v| types.name_of(*v))
                    .collect::<Vec<_>>()
                    .join(" | "),
                _ => String::new(),
            };
            let _ = write!(out, "type {} := {};\n", u.symbol.name, variants);
        }
        Stmt::Return(r) => {
            indent(out, depth);
            match &r.value {
                Some(value) => {
                    let _ = write!(out, "return {};\n", expr_to_source(value));
                }
                None => out.push_str("return;\n"),
            }
        }
        Stmt::Assignment(a) => {
            indent(out, depth);
            let _ = write!(
                out,
                "{} := {};\n",
                expr_to_source(&a.target),
                expr_to_source(&a.value)
            );
        }
        Stmt::Expression(e) => {
            indent(out, depth);
            let _ = write!(out, "{};\n", expr_to_source(e));
        }
    }
}

// if/while bodies print inline when they are blocks, indented otherwise
fn write_body(out: &mut String, stmt: &Stmt, types: &TypeRegistry, depth: usize) {
    if let Stmt::Block(block) = stmt {
        out.push_str("{\n");
        for s in &block.statements {
            write_stmt(out, s, types, depth + 1);
        }
        indent(out, depth);
        out.push_str("}\n");
    } else {
        out.push('\n');
        write_stmt(out, stmt, types, depth + 1);
    }
}

fn write_params(out: &mut String, f: &crate::FunctionDecl, types: &TypeRegistry) {
    let params: Vec<String> = f
        .params
        .iter()
        .map(|p| format!("{} {}", types.name_of(p.symbol.ty), p.symbol.name))
        .collect();
    out.push_str(&params.join(", "));
}

/// Render an expression back into source form. Groupings keep their
/// parentheses, so printing a freshly parsed tree is a fixed point.
pub fn expr_to_source(expr: &Expr) -> String {
    match expr {
        Expr::Binary(b) => format!(
            "{} {} {}",
            expr_to_source(&b.left),
            b.op.symbol(),
            expr_to_source(&b.right)
        ),
        Expr::Unary(u) => format!("{}{}", u.op.symbol(), expr_to_source(&u.right)),
        Expr::Grouping(inner) => format!("({})", expr_to_source(inner)),
        Expr::Literal(l) => match &l.value {
            LiteralValue::Int(v) => format!("{v}"),
            LiteralValue::Float(v) => format!("{v:?}"),
            LiteralValue::Bool(v) => format!("{v}"),
            LiteralValue::Str(s) => format!("\"{s}\""),
        },
        Expr::Primary(p) => p.symbol.name.clone(),
        Expr::ArrayLiteral(a) => {
            let elems: Vec<String> = a.elements.iter().map(expr_to_source).collect();
            format!("[{}]", elems.join(", "))
        }
        Expr::MapLiteral(m) => {
            let entries: Vec<String> = m
                .entries
                .iter()
                .map(|e| format!("{}: {}", expr_to_source(&e.key), expr_to_source(&e.value)))
                .collect();
            format!("type {{{}}}", entries.join(", "))
        }
        Expr::Call(c) => {
            let args: Vec<String> = c.args.iter().map(expr_to_source).collect();
            format!("{}({})", expr_to_source(&c.callable), args.join(", "))
        }
        Expr::Subscript(s) => format!(
            "{}[{}]",
            expr_to_source(&s.object),
            expr_to_source(&s.index)
        ),
        Expr::Access(a) => format!(
            "{}.{}",
            expr_to_source(&a.object),
            expr_to_source(&a.element)
        ),
        Expr::Cast(c) => expr_to_source(&c.right),
    }
}
