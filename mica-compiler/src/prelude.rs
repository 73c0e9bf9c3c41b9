// Embedded prelude
// The standard library's native functions are declared implicitly, as if
// the program opened with their signatures. The runtime binds the actual
// host functions after emission.

use mica_ast::{Ast, FunctionDecl, Stmt, Symbol, TypeId, Variable};

/// Prepend the stdlib native declarations to a freshly parsed program.
/// They take the first global slots, in a fixed order.
pub fn inject_prelude(ast: &mut Ast) {
    let print_ty = ast.types.register_function(TypeId::VOID, vec![TypeId::ANY]);
    let clock_ty = ast.types.register_function(TypeId::FLOAT, Vec::new());

    let declarations = [
        native_decl("print", print_ty, TypeId::VOID, &[("value", TypeId::ANY)]),
        native_decl("clock", clock_ty, TypeId::FLOAT, &[]),
    ];
    for (position, decl) in declarations.into_iter().enumerate() {
        ast.root
            .statements
            .insert(position, Stmt::NativeFunction(decl));
    }
}

fn native_decl(
    name: &str,
    fn_ty: TypeId,
    return_ty: TypeId,
    params: &[(&str, TypeId)],
) -> FunctionDecl {
    let params = params
        .iter()
        .map(|(param, ty)| {
            let mut symbol = Symbol::new(*param, 0..0, *ty);
            symbol.assignable = true;
            Variable {
                symbol,
                value: None,
            }
        })
        .collect();
    FunctionDecl {
        symbol: Symbol::new(name, 0..0, fn_ty),
        params,
        body: None,
        return_ty,
    }
}
