//! Stack VM for the Quill scripting language: the `Thread` that owns the
//! value stack and call stack, and the `toString` stringification
//! routine every `Print` and string coercion funnels through. See
//! spec.md §4.3/§4.4.

pub mod stringify;
pub mod thread;

pub use stringify::stringify;
pub use thread::Thread;
