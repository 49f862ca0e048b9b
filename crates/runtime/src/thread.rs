//! `Thread`: the stack VM. Owns the value stack and call stack for one
//! execution; the dispatch loop advances an instruction pointer within
//! the top frame until a `Ret` unwinds to a caller frame or to the host.
//! See spec.md §4.3.

use crate::stringify::stringify;
use quill_core::{Func, Heap, Obj, Opcode, QString, Value};
use std::io::{self, Write};

struct Frame {
    func: Obj<Func>,
    /// The receiver bound for `GetInst`: the instance-call receiver, or
    /// the enclosing frame's `inst` for a plain call, or `global` for the
    /// host-initiated outer call.
    inst: Value,
    op_it: usize,
    /// Stack cells below `base_stack_idx` to discard on return: the
    /// callee (+ receiver/key for instance calls) plus the normalized
    /// argument count.
    n_inps: usize,
    base_stack_idx: usize,
}

/// `print`'s sink defaults to the process's stdout (`W = io::Stdout`),
/// the same default-type-parameter shape as `std::collections::HashMap`'s
/// `S = RandomState`. A host that wants to capture a script's output —
/// notably this crate's own integration tests — swaps in any other
/// `io::Write`, e.g. `Thread::with_writer(&heap, &mut Vec::new())`.
pub struct Thread<'heap, W: Write = io::Stdout> {
    heap: &'heap Heap,
    global: Value,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    out: W,
}

impl<'heap> Thread<'heap> {
    pub fn new(heap: &'heap Heap) -> Self {
        Thread::with_writer(heap, io::stdout())
    }
}

impl<'heap, W: Write> Thread<'heap, W> {
    pub fn with_writer(heap: &'heap Heap, out: W) -> Self {
        Thread {
            heap,
            global: Value::Nil,
            stack: Vec::new(),
            frames: Vec::new(),
            out,
        }
    }

    /// Host entry point: spec.md §6 `thread.call(func, global, args…) ->
    /// Value`. Invokes `func` with `global` bound both as the frame's
    /// `inst` and as the target of `GetGlobal`.
    pub fn call(&mut self, func: Obj<Func>, global: Value, args: &[Value]) -> Value {
        self.global = global;
        debug_assert!(self.stack.is_empty() && self.frames.is_empty());
        self.stack.extend_from_slice(args);
        self.invoke(func, global, args.len(), 0);
        let result = self.run();
        debug_assert!(self.stack.is_empty() && self.frames.is_empty());
        result
    }

    /// Arity-normalize the top `n_args_provided` stack cells to `func`'s
    /// declared parameter count, then push a new call frame and its
    /// local slots. Spec.md §4.3 "Invocation protocol".
    fn invoke(&mut self, func: Obj<Func>, inst: Value, n_args_provided: usize, cells_below_args: usize) {
        let func_ref = unsafe { func.get() };
        let n_params = func_ref.n_params as usize;
        if n_args_provided > n_params {
            let drop = n_args_provided - n_params;
            self.stack.truncate(self.stack.len() - drop);
        } else {
            for _ in 0..(n_params - n_args_provided) {
                self.stack.push(Value::Nil);
            }
        }
        let base_stack_idx = self.stack.len();
        for _ in 0..func_ref.n_locals {
            self.stack.push(Value::Nil);
        }
        self.frames.push(Frame {
            func,
            inst,
            op_it: 0,
            n_inps: cells_below_args + n_params,
            base_stack_idx,
        });
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow is an implementation invariant violation")
    }

    fn get_elem(&self, base: Value, key: Value) -> Value {
        match base {
            Value::Array(a) => unsafe { a.get() }.get(&key),
            Value::Struct(s) => {
                let key_bytes = stringify(key).into_bytes();
                let probe = unsafe { QString::from_raw(key_bytes.as_ptr(), key_bytes.len()) };
                unsafe { s.get() }.get(&probe)
            }
            _ => Value::Nil,
        }
    }

    fn set_elem(&self, base: Value, key: Value, value: Value) {
        match base {
            Value::Array(a) => unsafe { a.get() }.set(&key, value),
            Value::Struct(s) => {
                let key_bytes = stringify(key).into_bytes();
                let key_obj = self.heap.alloc_string(&key_bytes);
                unsafe { s.get() }.set(key_obj, value);
            }
            _ => {}
        }
    }

    fn add(&self, a: Value, b: Value) -> Value {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
            _ if a.is_string() || b.is_string() => {
                let mut bytes = stringify(a).into_bytes();
                bytes.extend_from_slice(stringify(b).as_bytes());
                self.heap.value_string(&bytes)
            }
            _ => Value::Nil,
        }
    }

    /// The dispatch loop: `op = *opIt++; switch(op.opcode) { … }` per
    /// spec.md §4.3, running until the outermost frame returns.
    fn run(&mut self) -> Value {
        loop {
            let frame_idx = self.frames.len() - 1;
            let op = {
                let frame = &self.frames[frame_idx];
                let ops = unsafe { frame.func.get() }.ops();
                ops[frame.op_it]
            };
            self.frames[frame_idx].op_it += 1;
            let arg = op.arg();

            match op.opcode() {
                Opcode::GetInst => {
                    let inst = self.frames[frame_idx].inst;
                    self.stack.push(inst);
                }
                Opcode::GetGlobal => self.stack.push(self.global),
                Opcode::GetConst => {
                    let consts = unsafe { self.frames[frame_idx].func.get() }.consts();
                    self.stack.push(consts[arg as usize]);
                }
                Opcode::GetVar => {
                    let idx = (self.frames[frame_idx].base_stack_idx as i64 + arg as i64) as usize;
                    self.stack.push(self.stack[idx]);
                }
                Opcode::SetVar => {
                    let v = self.pop();
                    let idx = (self.frames[frame_idx].base_stack_idx as i64 + arg as i64) as usize;
                    self.stack[idx] = v;
                }
                Opcode::GetElem => {
                    let key = self.pop();
                    let base = self.pop();
                    self.stack.push(self.get_elem(base, key));
                }
                Opcode::SetElem => {
                    let value = self.pop();
                    let key = self.pop();
                    let base = self.pop();
                    self.set_elem(base, key, value);
                }
                Opcode::Eat => {
                    self.pop();
                }
                Opcode::Neg => {
                    let a = self.pop();
                    self.stack.push(match a {
                        Value::Number(n) => Value::Number(-n),
                        _ => Value::Nil,
                    });
                }
                Opcode::Add => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(self.add(a, b));
                }
                Opcode::Sub => self.numeric_binop(|a, b| a - b),
                Opcode::Mul => self.numeric_binop(|a, b| a * b),
                Opcode::Div => self.numeric_binop(|a, b| a / b),
                Opcode::Mod => self.numeric_binop(|a, b| a % b),
                Opcode::CmpEq => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(bool_value(a.equals(&b)));
                }
                Opcode::CmpNEq => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(bool_value(!a.equals(&b)));
                }
                Opcode::CmpLt => self.numeric_compare(|a, b| a < b),
                Opcode::CmpGt => self.numeric_compare(|a, b| a > b),
                Opcode::CmpLtEq => self.numeric_compare(|a, b| a <= b),
                Opcode::CmpGtEq => self.numeric_compare(|a, b| a >= b),
                Opcode::NotL => {
                    let a = self.pop();
                    self.stack.push(bool_value(!a.as_bool()));
                }
                Opcode::AndL => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(bool_value(a.as_bool() && b.as_bool()));
                }
                Opcode::OrL => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(bool_value(a.as_bool() || b.as_bool()));
                }
                Opcode::MakeArray => {
                    let n = arg as usize;
                    let elems = self.stack.split_off(self.stack.len() - n);
                    let array = self.heap.alloc_array(&elems);
                    self.stack.push(Value::Array(array));
                }
                Opcode::MakeStruct => {
                    let n = arg as usize;
                    let items = self.stack.split_off(self.stack.len() - 2 * n);
                    let s = self.heap.alloc_struct();
                    for pair in items.chunks(2) {
                        let key_bytes = stringify(pair[0]).into_bytes();
                        let key_obj = self.heap.alloc_string(&key_bytes);
                        unsafe { s.get() }.set(key_obj, pair[1]);
                    }
                    self.stack.push(Value::Struct(s));
                }
                Opcode::Print => {
                    let v = self.pop();
                    writeln!(self.out, "{}", stringify(v)).expect("print sink write failed");
                }
                Opcode::GetSelf => {
                    let func = self.frames[frame_idx].func;
                    self.stack.push(Value::Func(func));
                }
                Opcode::Jmp => {
                    self.frames[frame_idx].op_it = arg as usize;
                }
                Opcode::JmpN => {
                    let cond = self.pop();
                    if !cond.as_bool() {
                        self.frames[frame_idx].op_it = arg as usize;
                    }
                }
                Opcode::Call => {
                    let n = arg as usize;
                    let callee = self.stack[self.stack.len() - n - 1];
                    match callee {
                        Value::Func(f) => {
                            let inst = self.frames[frame_idx].inst;
                            self.invoke(f, inst, n, 1);
                        }
                        _ => {
                            self.stack.truncate(self.stack.len() - n - 1);
                            self.stack.push(Value::Nil);
                        }
                    }
                }
                Opcode::InstCall => {
                    let n = arg as usize;
                    let base = self.stack[self.stack.len() - n - 2];
                    let key = self.stack[self.stack.len() - n - 1];
                    let callee = self.get_elem(base, key);
                    match callee {
                        Value::Func(f) => self.invoke(f, base, n, 2),
                        _ => {
                            self.stack.truncate(self.stack.len() - n - 2);
                            self.stack.push(Value::Nil);
                        }
                    }
                }
                Opcode::Ret => {
                    debug_assert_eq!(
                        self.stack.len(),
                        self.frames[frame_idx].base_stack_idx
                            + unsafe { self.frames[frame_idx].func.get() }.n_locals as usize
                            + 1,
                        "Ret must see exactly the return value above the callee's locals"
                    );
                    let v = self.pop();
                    let frame = self.frames.pop().expect("Ret always has a frame to pop");
                    self.stack.truncate(frame.base_stack_idx - frame.n_inps);
                    if self.frames.is_empty() {
                        return v;
                    }
                    self.stack.push(v);
                }
            }
        }
    }

    fn numeric_binop(&mut self, f: impl Fn(f64, f64) -> f64) {
        let b = self.pop();
        let a = self.pop();
        self.stack.push(match (a, b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(f(x, y)),
            _ => Value::Nil,
        });
    }

    fn numeric_compare(&mut self, f: impl Fn(f64, f64) -> bool) {
        let b = self.pop();
        let a = self.pop();
        self.stack.push(match (a, b) {
            (Value::Number(x), Value::Number(y)) => bool_value(f(x, y)),
            _ => bool_value(false),
        });
    }
}

fn bool_value(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_compiler::compile;

    /// Every expression statement is compiled with `Eat` and every function
    /// body is force-closed with `GetConst(nil); Ret` (spec.md §4.2), so
    /// `call`'s return value is never what a program computed — `print` and
    /// stdout are the only observable channel (spec.md §8). Tests capture
    /// that channel into a buffer rather than asserting on `call`'s result.
    fn run_capture(src: &str) -> String {
        let heap = Heap::new();
        let mut buf = src.as_bytes().to_vec();
        buf.push(0);
        let func = compile(&heap, "test", &buf).expect("compile should succeed");
        let global = Value::Struct(heap.alloc_struct());
        let mut output = Vec::new();
        let mut thread = Thread::with_writer(&heap, &mut output);
        thread.call(func, global, &[]);
        String::from_utf8(output).expect("program output is valid utf-8")
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(run_capture("print 1+2*3"), "7\n");
    }

    #[test]
    fn factorial_recursion() {
        let out = run_capture("var f = func(n) { if n <= 1 { return 1 } return n * f(n-1) }\nprint f(10)");
        assert_eq!(out, "3628800\n");
    }

    #[test]
    fn while_break_stops_the_loop() {
        let out = run_capture("var i = 0\nwhile true { if i >= 3 { break } i = i+1 }\nprint i");
        assert_eq!(out, "3\n");
    }

    #[test]
    fn struct_method_dispatch_binds_this() {
        let out = run_capture("var o = { x = 10, add = func(y) { return this.x + y } }\nprint o.add(5)");
        assert_eq!(out, "15\n");
    }

    #[test]
    fn string_concat_stringifies_numbers() {
        assert_eq!(run_capture("print \"a\" + 1 + \"b\""), "a1b\n");
    }

    #[test]
    fn array_out_of_bounds_read_is_nil() {
        assert_eq!(run_capture("var a = [10,20,30]\nprint a[5]"), "nil\n");
    }

    #[test]
    fn stack_is_empty_after_call_returns() {
        let heap = Heap::new();
        let mut buf = b"1+1".to_vec();
        buf.push(0);
        let func = compile(&heap, "test", &buf).unwrap();
        let mut thread = Thread::new(&heap);
        thread.call(func, Value::Nil, &[]);
        assert!(thread.stack.is_empty());
        assert!(thread.frames.is_empty());
    }
}
