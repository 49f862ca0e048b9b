//! Core data model for the Quill scripting language: the tagged `Value`
//! union, the bump-arena `Heap` that owns every heap object, and the
//! heap object types themselves (`QString`, `QArray`, `QStruct`, `Func`).
//!
//! See spec.md §3 "Data Model" for the authoritative description; this
//! crate is a direct implementation of that section plus the `Op`
//! bytecode instruction format from §3/§9.

pub mod array;
pub mod func;
pub mod heap;
pub mod op;
pub mod qstring;
pub mod struct_;
pub mod thread_obj;
pub mod value;

pub use array::QArray;
pub use func::Func;
pub use heap::Heap;
pub use op::{Op, Opcode};
pub use qstring::QString;
pub use struct_::QStruct;
pub use thread_obj::QThread;
pub use value::{Obj, Value};
