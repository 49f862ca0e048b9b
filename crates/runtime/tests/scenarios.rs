//! End-to-end scenarios from spec.md §8, run through the full
//! compile-then-execute pipeline. Every scenario prints its result and
//! the expectation is asserted against captured stdout: `call`'s return
//! value is always `Value::Nil` (spec.md §4.2's `GetConst(nil); Ret`
//! closing every function body), so `print` is the only observable
//! output for a program run this way.

use quill_core::{Heap, Value};
use quill_runtime::Thread;

fn run_capture(src: &str) -> String {
    let heap = Heap::new();
    let mut buf = src.as_bytes().to_vec();
    buf.push(0);
    let func = quill_compiler::compile(&heap, "scenario", &buf).expect("compile should succeed");
    let global = Value::Struct(heap.alloc_struct());
    let mut output = Vec::new();
    let mut thread = Thread::with_writer(&heap, &mut output);
    thread.call(func, global, &[]);
    String::from_utf8(output).expect("program output is valid utf-8")
}

fn print_number(expr: &str) -> f64 {
    let out = run_capture(&format!("print {expr}"));
    out.trim_end_matches('\n').parse().expect("printed value should parse as a number")
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(print_number("1+2*3"), 7.0);
}

#[test]
fn factorial_via_recursion() {
    let out = run_capture("var f = func(n) { if n <= 1 { return 1 } return n * f(n-1) }\nprint f(10)");
    assert_eq!(out, "3628800\n");
}

#[test]
fn while_with_break_counts_to_three() {
    let out = run_capture("var i = 0\nwhile true { if i >= 3 { break } print i; i = i+1 }");
    assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn struct_and_method_dispatch() {
    let out = run_capture("var o = { x = 10, add = func(y) { return this.x + y } }\nprint o.add(5)");
    assert_eq!(out, "15\n");
}

#[test]
fn string_concat_coerces_numbers() {
    assert_eq!(run_capture("print \"a\" + 1 + \"b\""), "a1b\n");
}

#[test]
fn array_out_of_bounds_reads_nil() {
    assert_eq!(run_capture("var a = [10,20,30]\nprint a[5]"), "nil\n");
}

#[test]
fn gt_and_gte_are_not_confused() {
    // Regression for the transcription bug spec.md §9 calls out: a
    // faithful reading of `>` and `>=` must not both compile to `CmpGtEq`.
    assert_eq!(print_number("5 > 3"), 1.0);
    assert_eq!(print_number("3 > 5"), 0.0);
    assert_eq!(print_number("5 >= 5"), 1.0);
    assert_eq!(print_number("4 >= 5"), 0.0);
}

#[test]
fn empty_loop_with_false_condition_runs_zero_times() {
    assert_eq!(run_capture("var i = 0\nwhile false { i = i+1 }\nprint i"), "0\n");
}

#[test]
fn parenthesization_does_not_change_semantics() {
    assert_eq!(print_number("(2+3)"), print_number("2+3"));
    assert_eq!(print_number("(1+2)*3"), 9.0);
}

#[test]
fn struct_assignment_and_deletion_round_trip() {
    let out = run_capture(
        "var s = {}\ns.k = 42\nvar a = s.k\ns.k = nil\nvar b = s.k\nif b == nil { print a } else { print -1 }",
    );
    assert_eq!(out, "42\n");
}
