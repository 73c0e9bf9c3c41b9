// Type descriptors and matching rules
// Every type referenced from the AST is an interned handle into the TypeRegistry.

use serde::{Deserialize, Serialize};

/// Opaque handle to an interned type. Handles never move or expire while the
/// registry is alive; two structurally equal types share one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const INVALID: TypeId = TypeId(0);
    pub const ANY: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const INT: TypeId = TypeId(4);
    pub const FLOAT: TypeId = TypeId(5);
    pub const STRING: TypeId = TypeId(6);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Numeric promotion rank: Bool < Int < Float. Non-numeric types rank 0.
    pub fn numeric_rank(self) -> u8 {
        match self {
            TypeId::BOOL => 1,
            TypeId::INT => 2,
            TypeId::FLOAT => 3,
            _ => 0,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.numeric_rank() > 0
    }
}

/// One member of a struct type, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnType {
    pub ret: TypeId,
    pub params: Vec<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Invalid,
    Any,
    Void,
    Bool,
    Int,
    Float,
    String,
    Array(TypeId),
    Map(TypeId, TypeId),
    Fn(FnType),
    /// Forward reference to a not-yet-resolved struct or union name.
    User(String),
    Union {
        name: String,
        variants: Vec<TypeId>,
    },
    Struct {
        name: String,
        members: Vec<StructMember>,
    },
    /// Same-named function declarations coalesced in declaration order.
    /// Lives on symbols rather than in source types; native functions never
    /// participate.
    OverloadSet(Vec<TypeId>),
}

impl Type {
    /// Discriminant used by the structural hash.
    pub fn tag(&self) -> u64 {
        match self {
            Type::Invalid => 0,
            Type::Any => 1,
            Type::Void => 2,
            Type::Bool => 3,
            Type::Int => 4,
            Type::Float => 5,
            Type::String => 6,
            Type::Array(_) => 7,
            Type::Map(_, _) => 8,
            Type::Fn(_) => 9,
            Type::User(_) => 10,
            Type::Union { .. } => 11,
            Type::Struct { .. } => 12,
            Type::OverloadSet(_) => 13,
        }
    }

    pub fn is_compound(&self) -> bool {
        self.tag() > 6
    }

    /// Name of a user-declared type, if this is one.
    pub fn user_name(&self) -> Option<&str> {
        match self {
            Type::User(name) => Some(name),
            Type::Union { name, .. } => Some(name),
            Type::Struct { name, .. } => Some(name),
            _ => None,
        }
    }
}
