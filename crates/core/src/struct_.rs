//! `QStruct`: an open-addressed hash table from `String` key to `Value`,
//! per spec.md §3/§9. Capacity is always a power of two; probing is
//! linear; deleted entries are tombstoned rather than removed outright so
//! that later probes don't terminate early past a deleted slot.

use crate::qstring::QString;
use crate::value::{Obj, Value};
use std::cell::RefCell;

const INITIAL_CAPACITY: usize = 8;

#[derive(Clone, Copy)]
enum Entry {
    Empty,
    Occupied(Obj<QString>, Value),
    Tombstone,
}

struct Table {
    entries: Vec<Entry>,
    /// Count of non-empty (occupied + tombstone) entries. Spec.md §9:
    /// this conservative accounting is why the 11/16 growth threshold is
    /// safe even under heavy deletion.
    load: usize,
}

pub struct QStruct {
    inner: RefCell<Table>,
}

enum Probe {
    Found(usize),
    /// Slot to insert into: the first tombstone seen, or the empty slot
    /// that ended the probe if none was seen.
    Insert(usize),
}

impl Table {
    fn new(capacity: usize) -> Self {
        Table {
            entries: vec![Entry::Empty; capacity],
            load: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn probe(&self, key: &QString) -> Probe {
        let mask = self.capacity() - 1;
        let mut idx = (key.hash() as usize) & mask;
        let mut tombstone = None;
        loop {
            match self.entries[idx] {
                Entry::Empty => return Probe::Insert(tombstone.unwrap_or(idx)),
                Entry::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(idx);
                    }
                }
                Entry::Occupied(k, _) => {
                    if unsafe { k.get() }.eq_bytes(key) {
                        return Probe::Found(idx);
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
    }

    fn maybe_grow(&mut self) {
        if self.load * 16 <= self.capacity() * 11 {
            return;
        }
        let old = std::mem::replace(&mut self.entries, Vec::new());
        self.entries = vec![Entry::Empty; old.len() * 2];
        self.load = 0;
        for entry in old {
            if let Entry::Occupied(k, v) = entry {
                let idx = match self.probe(unsafe { k.get() }) {
                    Probe::Insert(i) => i,
                    Probe::Found(_) => unreachable!("rehash target table starts empty"),
                };
                self.entries[idx] = Entry::Occupied(k, v);
                self.load += 1;
            }
        }
    }
}

impl Default for QStruct {
    fn default() -> Self {
        Self::new()
    }
}

impl QStruct {
    pub fn new() -> Self {
        QStruct {
            inner: RefCell::new(Table::new(INITIAL_CAPACITY)),
        }
    }

    /// Reads of absent keys yield `Nil` (spec.md §3).
    pub fn get(&self, key: &QString) -> Value {
        let table = self.inner.borrow();
        match table.probe(key) {
            Probe::Found(i) => match table.entries[i] {
                Entry::Occupied(_, v) => v,
                _ => unreachable!(),
            },
            Probe::Insert(_) => Value::Nil,
        }
    }

    /// Assigning `Nil` deletes the key (marks tombstone); assigning any
    /// other value inserts or overwrites. Spec.md §3.
    pub fn set(&self, key: Obj<QString>, value: Value) {
        let mut table = self.inner.borrow_mut();
        let key_ref = unsafe { key.get() };
        match table.probe(key_ref) {
            Probe::Found(i) => {
                if matches!(value, Value::Nil) {
                    table.entries[i] = Entry::Tombstone;
                } else {
                    table.entries[i] = Entry::Occupied(key, value);
                }
            }
            Probe::Insert(i) => {
                if matches!(value, Value::Nil) {
                    return; // deleting an absent key is a no-op
                }
                table.entries[i] = Entry::Occupied(key, value);
                table.load += 1;
                table.maybe_grow();
            }
        }
    }

    /// Count of non-empty (occupied + tombstone) entries.
    pub fn load(&self) -> usize {
        self.inner.borrow().load
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn key(bump: &Bump, s: &str) -> Obj<QString> {
        let bytes = bump.alloc_slice_copy(s.as_bytes());
        let qs = bump.alloc(unsafe { QString::from_raw(bytes.as_ptr(), bytes.len()) });
        Obj(qs as *const QString)
    }

    #[test]
    fn set_then_get_round_trips() {
        let bump = Bump::new();
        let s = QStruct::new();
        let k = key(&bump, "x");
        s.set(k, Value::Number(10.0));
        assert!(matches!(s.get(unsafe { k.get() }), Value::Number(n) if n == 10.0));
    }

    #[test]
    fn absent_key_is_nil() {
        let bump = Bump::new();
        let s = QStruct::new();
        let k = key(&bump, "missing");
        assert!(matches!(s.get(unsafe { k.get() }), Value::Nil));
    }

    #[test]
    fn assigning_nil_deletes() {
        let bump = Bump::new();
        let s = QStruct::new();
        let k = key(&bump, "x");
        s.set(k, Value::Number(1.0));
        s.set(k, Value::Nil);
        assert!(matches!(s.get(unsafe { k.get() }), Value::Nil));
    }

    #[test]
    fn other_keys_survive_insertion_and_deletion() {
        let bump = Bump::new();
        let s = QStruct::new();
        let a = key(&bump, "a");
        let b = key(&bump, "b");
        s.set(a, Value::Number(1.0));
        s.set(b, Value::Number(2.0));
        s.set(a, Value::Nil);
        assert!(matches!(s.get(unsafe { a.get() }), Value::Nil));
        assert!(matches!(s.get(unsafe { b.get() }), Value::Number(n) if n == 2.0));
    }

    #[test]
    fn grows_under_heavy_insertion_and_keeps_lookups_correct() {
        let bump = Bump::new();
        let s = QStruct::new();
        let mut keys = Vec::new();
        for i in 0..100 {
            let k = key(&bump, &format!("k{i}"));
            s.set(k, Value::Number(i as f64));
            keys.push(k);
        }
        assert!(s.capacity() > INITIAL_CAPACITY);
        for (i, k) in keys.iter().enumerate() {
            assert!(matches!(s.get(unsafe { k.get() }), Value::Number(n) if n == i as f64));
        }
    }
}
