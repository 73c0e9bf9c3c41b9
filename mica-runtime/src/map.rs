// Runtime map object
// Open addressing with linear probing over a power-of-two table; deleted
// slots carry a tombstone flag; the table doubles at load factor 0.75 and
// rehashes from scratch.

use crate::object::Object;
use crate::value::Value;
use crate::RuntimeError;
use std::rc::Rc;

const LOAD_FACTOR: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
struct MapSlot {
    key: Value,
    value: Value,
    used: bool,
    tombstone: bool,
}

impl MapSlot {
    fn empty() -> Self {
        Self {
            key: Value::NIL,
            value: Value::NIL,
            used: false,
            tombstone: false,
        }
    }
}

#[derive(Debug)]
pub struct RtMap {
    slots: Vec<MapSlot>,
    size: usize,
}

impl Default for RtMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RtMap {
    pub fn new() -> Self {
        Self {
            slots: vec![MapSlot::empty(); INITIAL_CAPACITY],
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        let idx = self.find(&key, true)?;
        let slot = &mut self.slots[idx];
        slot.value = value;

        if slot.used && !slot.tombstone {
            return Ok(());
        }

        let was_tombstone = slot.tombstone;
        slot.key = key;
        slot.used = true;
        slot.tombstone = false;

        if was_tombstone {
            return Ok(());
        }

        self.size += 1;
        if self.size as f64 >= self.slots.len() as f64 * LOAD_FACTOR {
            self.grow()?;
        }
        Ok(())
    }

    /// A missing key reads as `None`; the engine surfaces it as nil.
    pub fn get(&self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let idx = self.find(key, false)?;
        let slot = &self.slots[idx];
        if !slot.used || slot.tombstone {
            return Ok(None);
        }
        Ok(Some(slot.value.clone()))
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let idx = self.find(key, false)?;
        let slot = &mut self.slots[idx];
        if !slot.used || slot.tombstone {
            return Ok(None);
        }
        slot.tombstone = true;
        Ok(Some(slot.value.clone()))
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.slots
            .iter()
            .filter(|s| s.used && !s.tombstone)
            .map(|s| (&s.key, &s.value))
    }

    // Probe for a key's slot. With `for_insert`, the first tombstone on the
    // chain is claimed when the key is absent.
    fn find(&self, key: &Value, for_insert: bool) -> Result<usize, RuntimeError> {
        let hash = hash_key(key)?;
        let mask = self.slots.len() - 1;
        let mut idx = (hash as usize) & mask;
        let mut reusable = None;

        loop {
            let slot = &self.slots[idx];
            if !slot.used {
                return Ok(if for_insert {
                    reusable.unwrap_or(idx)
                } else {
                    idx
                });
            }
            if slot.tombstone {
                if for_insert && reusable.is_none() {
                    reusable = Some(idx);
                }
            } else if keys_equal(&slot.key, key) {
                return Ok(idx);
            }
            idx = (idx + 1) & mask;
        }
    }

    fn grow(&mut self) -> Result<(), RuntimeError> {
        let new_cap = self.slots.len() * 2;
        let old = std::mem::replace(&mut self.slots, vec![MapSlot::empty(); new_cap]);
        self.size = 0;
        for slot in old {
            if slot.used && !slot.tombstone {
                self.insert_rehash(slot.key, slot.value)?;
            }
        }
        Ok(())
    }

    // Rehash path: the table was just cleared, no tombstones exist and no
    // further growth can trigger.
    fn insert_rehash(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        let hash = hash_key(&key)?;
        let mask = self.slots.len() - 1;
        let mut idx = (hash as usize) & mask;
        while self.slots[idx].used {
            idx = (idx + 1) & mask;
        }
        self.slots[idx] = MapSlot {
            key,
            value,
            used: true,
            tombstone: false,
        };
        self.size += 1;
        Ok(())
    }
}

/// Strings hash by content; Int, Float and Bool hash their raw 64-bit
/// payload. Any other object is unhashable.
pub fn hash_key(key: &Value) -> Result<u64, RuntimeError> {
    match key {
        Value::Obj(obj) => match &**obj {
            Object::Str(s) => Ok(fnv1a(s.as_bytes())),
            other => Err(RuntimeError::UnhashableKey {
                type_name: other.type_name(),
            }),
        },
        _ => {
            // raw_bits is Some for every non-object value
            let bits = key.raw_bits().unwrap_or(0);
            Ok(fnv1a(&bits.to_le_bytes()))
        }
    }
}

fn keys_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Obj(a), Value::Obj(b)) => match (&**a, &**b) {
            (Object::Str(x), Object::Str(y)) => x.len() == y.len() && x == y,
            _ => Rc::ptr_eq(a, b),
        },
        _ => a.raw_bits() == b.raw_bits() && a.raw_bits().is_some(),
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

    fn s(text: &str) -> Value {
        Value::Obj(Object::new_string(text))
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = RtMap::new();
        map.insert(s("a"), Value::Int(1)).unwrap();
        map.insert(s("b"), Value::Int(2)).unwrap();
        assert_eq!(map.get(&s("a")).unwrap().unwrap().int().unwrap(), 1);
        assert_eq!(map.get(&s("b")).unwrap().unwrap().int().unwrap(), 2);
        assert!(map.get(&s("c")).unwrap().is_none());
    }

    #[test]
    fn test_int_keys() {
        let mut map = RtMap::new();
        map.insert(Value::Int(42), Value::Int(1)).unwrap();
        assert!(map.get(&Value::Int(42)).unwrap().is_some());
        // Int and Float keys with the same numeral are distinct payloads
        assert!(map.get(&Value::Float(42.0)).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_keeps_size() {
        let mut map = RtMap::new();
        map.insert(s("k"), Value::Int(1)).unwrap();
        map.insert(s("k"), Value::Int(2)).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&s("k")).unwrap().unwrap().int().unwrap(), 2);
    }

    #[test]
    fn test_remove_and_reinsert_through_tombstone() {
        let mut map = RtMap::new();
        map.insert(s("k"), Value::Int(1)).unwrap();
        assert!(map.remove(&s("k")).unwrap().is_some());
        assert!(map.get(&s("k")).unwrap().is_none());
        map.insert(s("k"), Value::Int(3)).unwrap();
        assert_eq!(map.get(&s("k")).unwrap().unwrap().int().unwrap(), 3);
    }

    #[test]
    fn test_growth_retains_entries() {
        let mut map = RtMap::new();
        for i in 0..100 {
            map.insert(Value::Int(i), Value::Int(i * 10)).unwrap();
        }
        assert_eq!(map.len(), 100);
        assert!(map.capacity() >= 128);
        for i in 0..100 {
            assert_eq!(
                map.get(&Value::Int(i)).unwrap().unwrap().int().unwrap(),
                i * 10
            );
        }
    }

    #[test]
    fn test_tombstone_churn_never_loses_entries() {
        let mut map = RtMap::new();
        // churn the same small key set so tombstones accumulate
        for round in 0..50 {
            for i in 0..4 {
                map.insert(Value::Int(i), Value::Int(round)).unwrap();
            }
            for i in 0..4 {
                map.remove(&Value::Int(i)).unwrap();
            }
        }
        for i in 0..4 {
            map.insert(Value::Int(i), Value::Int(999)).unwrap();
        }
        assert_eq!(map.len(), 4);
        for i in 0..4 {
            assert_eq!(map.get(&Value::Int(i)).unwrap().unwrap().int().unwrap(), 999);
        }
    }

    #[test]
    fn test_unhashable_key() {
        let mut map = RtMap::new();
        let arr = Value::Obj(Object::new_array(vec![]));
        assert!(map.insert(arr, Value::Int(1)).is_err());
    }
}
