// Hash-consed type registry
// Open-addressed probe table over an append-only arena of descriptors.
// Primitive types occupy handles 0..=6 and never relocate on resize.

use crate::types::{FnType, StructMember, Type, TypeId};

const LOAD_FACTOR: f64 = 0.75;
const PRIMITIVE_COUNT: usize = 7;

#[derive(Debug, Clone, Copy)]
struct Slot {
    hash: u64,
    id: TypeId,
}

#[derive(Debug)]
pub struct TypeRegistry {
    arena: Vec<(Type, u64)>,
    table: Vec<Option<Slot>>,
    count: usize,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let arena = vec![
            (Type::Invalid, 0),
            (Type::Any, 1),
            (Type::Void, 2),
            (Type::Bool, 3),
            (Type::Int, 4),
            (Type::Float, 5),
            (Type::String, 6),
        ];
        Self {
            arena,
            table: vec![None; 16],
            count: PRIMITIVE_COUNT,
        }
    }

    /// Number of distinct types registered, primitives included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.arena[id.index()].0
    }

    pub fn void_id(&self) -> TypeId {
        TypeId::VOID
    }

    pub fn register_array(&mut self, element: TypeId) -> TypeId {
        self.intern(Type::Array(element))
    }

    pub fn register_map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(Type::Map(key, value))
    }

    pub fn register_function(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.intern(Type::Fn(FnType { ret, params }))
    }

    pub fn register_user(&mut self, name: impl Into<String>) -> TypeId {
        self.intern(Type::User(name.into()))
    }

    pub fn register_struct(&mut self, name: impl Into<String>, members: Vec<StructMember>) -> TypeId {
        self.intern(Type::Struct {
            name: name.into(),
            members,
        })
    }

    pub fn register_union(&mut self, name: impl Into<String>, variants: Vec<TypeId>) -> TypeId {
        self.intern(Type::Union {
            name: name.into(),
            variants,
        })
    }

    pub fn register_overload_set(&mut self, signatures: Vec<TypeId>) -> TypeId {
        self.intern(Type::OverloadSet(signatures))
    }

    /// Membership probe without insertion.
    pub fn exists(&self, ty: &Type) -> Option<TypeId> {
        if !ty.is_compound() {
            return Some(TypeId(ty.tag() as u32));
        }
        let hash = self.hash_type(ty);
        let mask = self.table.len() - 1;
        let mut idx = (hash as usize) & mask;
        while let Some(slot) = &self.table[idx] {
            if slot.hash == hash && self.same_shape(slot.id, ty) {
                return Some(slot.id);
            }
            idx = (idx + 1) & mask;
        }
        None
    }

    /// Find a user-declared type (struct, union, or forward reference) by
    /// name. Returns the first entry in probe order.
    pub fn lookup_user(&self, name: &str) -> Option<TypeId> {
        let hash = fnv1a(name.as_bytes());
        let mask = self.table.len() - 1;
        let mut idx = (hash as usize) & mask;
        while let Some(slot) = &self.table[idx] {
            if slot.hash == hash && self.get(slot.id).user_name() == Some(name) {
                return Some(slot.id);
            }
            idx = (idx + 1) & mask;
        }
        None
    }

    fn intern(&mut self, ty: Type) -> TypeId {
        if !ty.is_compound() {
            return TypeId(ty.tag() as u32);
        }
        if let Some(id) = self.exists(&ty) {
            return id;
        }

        let hash = self.hash_type(&ty);
        let id = TypeId(self.arena.len() as u32);
        self.arena.push((ty, hash));

        let mask = self.table.len() - 1;
        let mut idx = (hash as usize) & mask;
        while self.table[idx].is_some() {
            idx = (idx + 1) & mask;
        }
        self.table[idx] = Some(Slot { hash, id });
        self.count += 1;

        if self.count as f64 >= self.table.len() as f64 * LOAD_FACTOR {
            self.grow();
        }
        id
    }

    // Rehash from scratch into a doubled table. Only the probe table
    // relocates; arena indices (and therefore handles) are stable.
    fn grow(&mut self) {
        let new_cap = self.table.len() * 2;
        let old = std::mem::replace(&mut self.table, vec![None; new_cap]);
        let mask = new_cap - 1;
        for slot in old.into_iter().flatten() {
            let mut idx = (slot.hash as usize) & mask;
            while self.table[idx].is_some() {
                idx = (idx + 1) & mask;
            }
            self.table[idx] = Some(slot);
        }
    }

    fn hash_of(&self, id: TypeId) -> u64 {
        self.arena[id.index()].1
    }

    fn hash_type(&self, ty: &Type) -> u64 {
        let tag = ty.tag();
        match ty {
            Type::Array(elem) => tag ^ self.hash_of(*elem).wrapping_shl(1).wrapping_mul(21),
            Type::Map(k, v) => ((tag ^ self.hash_of(*k).wrapping_shl(5)) >> 8)
                ^ self.hash_of(*v).wrapping_shl(13).wrapping_mul(21),
            Type::Fn(f) => {
                let mut h = tag ^ self.hash_of(f.ret).wrapping_shl(7);
                for (i, param) in f.params.iter().enumerate() {
                    h ^= self.hash_of(*param).wrapping_shl(i as u32 * 17);
                    h = h.wrapping_mul(21);
                }
                h.wrapping_add(h.wrapping_shl(11))
            }
            Type::OverloadSet(sigs) => {
                let mut h = tag;
                for (i, sig) in sigs.iter().enumerate() {
                    h ^= self.hash_of(*sig).wrapping_shl(i as u32 * 17);
                    h = h.wrapping_mul(21);
                }
                h
            }
            Type::User(name) => fnv1a(name.as_bytes()),
            Type::Union { name, .. } => fnv1a(name.as_bytes()),
            Type::Struct { name, .. } => fnv1a(name.as_bytes()),
            _ => tag,
        }
    }

    // Interning equality: kind-sensitive and structural over already-interned
    // handles. Named kinds compare by name only, so a struct keeps one handle
    // however its members are spelled at the use site.
    fn same_shape(&self, id: TypeId, ty: &Type) -> bool {
        match (self.get(id), ty) {
            (Type::Array(a), Type::Array(b)) => a == b,
            (Type::Map(ak, av), Type::Map(bk, bv)) => ak == bk && av == bv,
            (Type::Fn(a), Type::Fn(b)) => a.ret == b.ret && a.params == b.params,
            (Type::OverloadSet(a), Type::OverloadSet(b)) => a == b,
            (Type::User(a), Type::User(b)) => a == b,
            (Type::Union { name: a, .. }, Type::Union { name: b, .. }) => a == b,
            (Type::Struct { name: a, .. }, Type::Struct { name: b, .. }) => a == b,
            _ => false,
        }
    }

    /// The matching relation of the language: handle equality, Any matches
    /// anything non-Invalid, a forward reference matches the struct or union
    /// carrying its name, and compounds match structurally.
    pub fn matches(&self, lhs: TypeId, rhs: TypeId) -> bool {
        if lhs == TypeId::INVALID || rhs == TypeId::INVALID {
            return false;
        }
        if lhs == TypeId::ANY || rhs == TypeId::ANY {
            return true;
        }
        if lhs == rhs {
            return true;
        }
        match (self.get(lhs), self.get(rhs)) {
            (Type::Array(a), Type::Array(b)) => self.matches(*a, *b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => {
                self.matches(*ak, *bk) && self.matches(*av, *bv)
            }
            (Type::Fn(a), Type::Fn(b)) => {
                a.params.len() == b.params.len()
                    && self.matches(a.ret, b.ret)
                    && a.params
                        .iter()
                        .zip(b.params.iter())
                        .all(|(x, y)| self.matches(*x, *y))
            }
            (l, r) => match (l.user_name(), r.user_name()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Element type of an array, value type of a map, return type of a
    /// function.
    pub fn underlying(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Array(elem) => Some(*elem),
            Type::Map(_, value) => Some(*value),
            Type::Fn(f) => Some(f.ret),
            _ => None,
        }
    }

    /// Human-readable spelling for diagnostics.
    pub fn name_of(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Invalid => "<invalid>".to_string(),
            Type::Any => "Any".to_string(),
            Type::Void => "Void".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::Int => "Int".to_string(),
            Type::Float => "Float".to_string(),
            Type::String => "String".to_string(),
            Type::Array(elem) => format!("[{}]", self.name_of(*elem)),
            Type::Map(k, v) => format!("{{{}: {}}}", self.name_of(*k), self.name_of(*v)),
            Type::Fn(f) => {
                let params: Vec<String> = f.params.iter().map(|p| self.name_of(*p)).collect();
                format!("fn({}) -> {}", params.join(", "), self.name_of(f.ret))
            }
            Type::User(name) => name.clone(),
            Type::Union { name, .. } => name.clone(),
            Type::Struct { name, .. } => name.clone(),
            Type::OverloadSet(sigs) => format!("overload set ({} signatures)", sigs.len()),
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_have_fixed_handles() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.get(TypeId::INT), &Type::Int);
        assert_eq!(reg.get(TypeId::FLOAT), &Type::Float);
        assert_eq!(reg.get(TypeId::INVALID), &Type::Invalid);
        assert_eq!(reg.len(), 7);
    }

    #[test]
    fn test_interning_is_idempotent() {
        let mut reg = TypeRegistry::new();
        let a = reg.register_array(TypeId::INT);
        let len = reg.len();
        let b = reg.register_array(TypeId::INT);
        assert_eq!(a, b);
        assert_eq!(reg.len(), len);
    }

    #[test]
    fn test_structurally_different_types_get_different_handles() {
        let mut reg = TypeRegistry::new();
        let ints = reg.register_array(TypeId::INT);
        let floats = reg.register_array(TypeId::FLOAT);
        assert_ne!(ints, floats);

        let f1 = reg.register_function(TypeId::INT, vec![TypeId::INT]);
        let f2 = reg.register_function(TypeId::INT, vec![TypeId::INT, TypeId::INT]);
        let f3 = reg.register_function(TypeId::INT, vec![TypeId::INT]);
        assert_ne!(f1, f2);
        assert_eq!(f1, f3);
    }

    #[test]
    fn test_nested_compounds_intern() {
        let mut reg = TypeRegistry::new();
        let inner = reg.register_array(TypeId::INT);
        let outer1 = reg.register_array(inner);
        let inner2 = reg.register_array(TypeId::INT);
        let outer2 = reg.register_array(inner2);
        assert_eq!(outer1, outer2);
    }

    #[test]
    fn test_primitive_handles_survive_resize() {
        let mut reg = TypeRegistry::new();
        let mut prev = TypeId::INT;
        for _ in 0..64 {
            prev = reg.register_array(prev);
        }
        assert_eq!(reg.get(TypeId::BOOL), &Type::Bool);
        assert_eq!(reg.get(TypeId::STRING), &Type::String);
        // The first compound registered is still reachable and still an array
        assert!(matches!(reg.get(TypeId(7)), Type::Array(t) if *t == TypeId::INT));
    }

    #[test]
    fn test_exists_does_not_insert() {
        let mut reg = TypeRegistry::new();
        assert_eq!(reg.exists(&Type::Array(TypeId::INT)), None);
        let len = reg.len();
        assert_eq!(reg.len(), len);
        let id = reg.register_array(TypeId::INT);
        assert_eq!(reg.exists(&Type::Array(TypeId::INT)), Some(id));
    }

    #[test]
    fn test_any_matches_everything_but_invalid() {
        let mut reg = TypeRegistry::new();
        let arr = reg.register_array(TypeId::INT);
        assert!(reg.matches(TypeId::ANY, arr));
        assert!(reg.matches(TypeId::INT, TypeId::ANY));
        assert!(!reg.matches(TypeId::ANY, TypeId::INVALID));
        assert!(!reg.matches(TypeId::INVALID, TypeId::INVALID));
    }

    #[test]
    fn test_user_forward_reference_matches_struct() {
        let mut reg = TypeRegistry::new();
        let fwd = reg.register_user("Point");
        let st = reg.register_struct(
            "Point",
            vec![
                StructMember {
                    name: "x".to_string(),
                    ty: TypeId::INT,
                },
                StructMember {
                    name: "y".to_string(),
                    ty: TypeId::INT,
                },
            ],
        );
        assert_ne!(fwd, st);
        assert!(reg.matches(fwd, st));
        assert!(reg.matches(st, fwd));
        assert!(!reg.matches(st, TypeId::INT));
    }

    #[test]
    fn test_lookup_user_by_name() {
        let mut reg = TypeRegistry::new();
        reg.register_struct("Point", Vec::new());
        assert!(reg.lookup_user("Point").is_some());
        assert!(reg.lookup_user("Missing").is_none());
    }
}
