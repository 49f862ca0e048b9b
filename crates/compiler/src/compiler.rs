//! One-pass recursive-descent compiler: walks the token stream exactly
//! once, emitting bytecode directly into a growing [`Op`] array with
//! constant-pool de-duplication, forward-jump patching, and scope-stack
//! local management. See spec.md §4.2.

use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use quill_core::{Heap, Obj, Op, Opcode, Value};

struct Scope {
    first_active_var: usize,
    is_loop: bool,
    /// Meaningful only when `is_loop`: the op index `continue` jumps to.
    loop_start: usize,
    break_ops: Vec<usize>,
}

/// What a resolved name refers to: a real stack slot, or the function's
/// own self-reference (see [`VarSlot::SelfRef`]).
#[derive(Clone, Copy)]
enum VarSlot {
    /// A parameter (negative) or local (non-negative) stack offset.
    Local(i32),
    /// The name a `var name = func(...) {...}` statement binds inside the
    /// function's own body, so it can call itself without closures.
    /// Compiles to `GetSelf` rather than `GetVar`.
    SelfRef,
}

/// Per-function compilation state. A nested `func` expression gets a
/// fresh one; the enclosing state is saved and restored around it
/// (spec.md §4.2 "Nested func").
struct FuncBuilder {
    consts: Vec<Value>,
    ops: Vec<Op>,
    n_locals: u32,
    n_params: u32,
    active_vars: Vec<(String, VarSlot)>,
    scopes: Vec<Scope>,
}

impl FuncBuilder {
    fn new() -> Self {
        FuncBuilder {
            consts: Vec::new(),
            ops: Vec::new(),
            n_locals: 0,
            n_params: 0,
            active_vars: Vec::new(),
            scopes: Vec::new(),
        }
    }
}

struct Compiler<'heap, 'src> {
    heap: &'heap Heap,
    file: &'src str,
    lexer: Lexer<'src>,
    cur: Token<'src>,
    builder: FuncBuilder,
    saved: Vec<FuncBuilder>,
}

pub fn compile(heap: &Heap, file: &str, source: &[u8]) -> CompileResult<Obj<quill_core::Func>> {
    compile_with_config(heap, file, source, &CompilerConfig::default())
}

pub fn compile_with_config(
    heap: &Heap,
    file: &str,
    source: &[u8],
    config: &CompilerConfig,
) -> CompileResult<Obj<quill_core::Func>> {
    let span = tracing::info_span!("compile", file, trace = config.trace());
    let _enter = span.enter();
    tracing::debug!(bytes = source.len(), "compiling source unit");

    let mut lexer = Lexer::new(file, source);
    let cur = lexer.next_token()?;
    let mut compiler = Compiler {
        heap,
        file,
        lexer,
        cur,
        builder: FuncBuilder::new(),
        saved: Vec::new(),
    };
    compiler.compile_stmt_list()?;
    compiler.expect_kind(TokenKind::Eof)?;
    compiler.finish_func_body();

    let func = heap.alloc_func(
        &compiler.builder.consts,
        &compiler.builder.ops,
        compiler.builder.n_params,
        compiler.builder.n_locals,
    );
    tracing::debug!(n_ops = func_ops_len(func), "compiled unit");
    Ok(func)
}

fn func_ops_len(func: Obj<quill_core::Func>) -> usize {
    unsafe { func.get() }.ops().len()
}

impl<'heap, 'src> Compiler<'heap, 'src> {
    fn advance(&mut self) -> CompileResult<Token<'src>> {
        let old = self.cur;
        self.cur = self.lexer.next_token()?;
        Ok(old)
    }

    fn err_expected(&self, what: &str) -> CompileError {
        CompileError::new(
            self.file,
            self.cur.line,
            format!("expected {what} before {}", self.cur.kind.describe()),
        )
    }

    fn expect_char(&mut self, c: u8) -> CompileResult<()> {
        if self.cur.kind == TokenKind::Char(c) {
            self.advance()?;
            Ok(())
        } else {
            Err(self.err_expected(&format!("'{}'", c as char)))
        }
    }

    fn eat_char(&mut self, c: u8) -> CompileResult<bool> {
        if self.cur.kind == TokenKind::Char(c) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_kind(&mut self, kind: TokenKind) -> CompileResult<Token<'src>> {
        if self.cur.kind == kind {
            self.advance()
        } else {
            Err(self.err_expected(&kind.describe()))
        }
    }

    fn eat_kind(&mut self, kind: TokenKind) -> CompileResult<bool> {
        if self.cur.kind == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_sep(&mut self) -> CompileResult<bool> {
        if self.eat_kind(TokenKind::Eol)? {
            Ok(true)
        } else {
            self.eat_char(b',')
        }
    }

    fn expect_expr(&mut self) -> CompileResult<()> {
        if !self.expr(1)? {
            return Err(self.err_expected("an expression"));
        }
        Ok(())
    }

    fn emit(&mut self, op: Op) -> usize {
        self.builder.ops.push(op);
        self.builder.ops.len() - 1
    }

    fn emit_placeholder(&mut self, opcode: Opcode) -> usize {
        self.emit(Op::new(opcode, 0))
    }

    fn patch_here(&mut self, idx: usize) {
        let target = self.builder.ops.len() as i32;
        let existing = self.builder.ops[idx];
        self.builder.ops[idx] = Op::new(existing.opcode(), target);
    }

    fn get_const(&mut self, v: Value) -> i32 {
        if let Some(idx) = self.builder.consts.iter().position(|c| c.equals(&v)) {
            return idx as i32;
        }
        self.builder.consts.push(v);
        (self.builder.consts.len() - 1) as i32
    }

    fn pool_string_const(&mut self, bytes: &[u8]) -> i32 {
        let v = self.heap.value_string(bytes);
        self.get_const(v)
    }

    fn alloc_local(&mut self, name: String) -> i32 {
        let slot = self.builder.n_locals as i32;
        self.builder.n_locals += 1;
        self.builder.active_vars.push((name, VarSlot::Local(slot)));
        slot
    }

    fn resolve_var(&self, name: &str, line: usize) -> CompileResult<VarSlot> {
        self.builder
            .active_vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| *slot)
            .ok_or_else(|| CompileError::new(self.file, line, format!("unresolved name '{name}'")))
    }

    fn enter_scope(&mut self, is_loop: bool, loop_start: usize) {
        self.builder.scopes.push(Scope {
            first_active_var: self.builder.active_vars.len(),
            is_loop,
            loop_start,
            break_ops: Vec::new(),
        });
    }

    fn exit_scope(&mut self) {
        let scope = self.builder.scopes.pop().expect("scope stack underflow");
        self.builder.active_vars.truncate(scope.first_active_var);
        if scope.is_loop {
            let target = self.builder.ops.len() as i32;
            for idx in scope.break_ops {
                let existing = self.builder.ops[idx];
                self.builder.ops[idx] = Op::new(existing.opcode(), target);
            }
        }
    }

    fn nearest_loop_start(&self) -> Option<usize> {
        self.builder.scopes.iter().rev().find(|s| s.is_loop).map(|s| s.loop_start)
    }

    fn push_break(&mut self, idx: usize) -> bool {
        match self.builder.scopes.iter_mut().rev().find(|s| s.is_loop) {
            Some(scope) => {
                scope.break_ops.push(idx);
                true
            }
            None => false,
        }
    }

    fn finish_func_body(&mut self) {
        let ends_in_ret = matches!(self.builder.ops.last(), Some(op) if op.opcode() == Opcode::Ret);
        if !ends_in_ret {
            let idx = self.get_const(Value::Nil);
            self.emit(Op::new(Opcode::GetConst, idx));
            self.emit(Op::bare(Opcode::Ret));
        }
    }

    fn unescape(&self, raw: &str, line: usize) -> CompileResult<Vec<u8>> {
        let bytes = raw.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\\' {
                i += 1;
                let decoded = match bytes.get(i) {
                    Some(b'"') => b'"',
                    Some(b'\\') => b'\\',
                    Some(b'n') => b'\n',
                    Some(b't') => b'\t',
                    Some(b'f') => 0x0C,
                    Some(b'r') => b'\r',
                    Some(b'b') => 0x08,
                    _ => return Err(CompileError::new(self.file, line, "invalid escape sequence")),
                };
                out.push(decoded);
            } else {
                out.push(b);
            }
            i += 1;
        }
        Ok(out)
    }

    // ---- statements ----

    fn compile_stmt_list(&mut self) -> CompileResult<()> {
        loop {
            while self.eat_sep()? {}
            if !self.compile_stmt()? {
                break;
            }
        }
        Ok(())
    }

    fn compile_required_stmt(&mut self) -> CompileResult<()> {
        if !self.compile_stmt()? {
            return Err(self.err_expected("a statement"));
        }
        Ok(())
    }

    fn compile_block(&mut self) -> CompileResult<()> {
        self.expect_char(b'{')?;
        self.enter_scope(false, 0);
        self.compile_stmt_list()?;
        self.expect_char(b'}')?;
        self.exit_scope();
        Ok(())
    }

    fn compile_stmt(&mut self) -> CompileResult<bool> {
        match self.cur.kind {
            TokenKind::Char(b'{') => {
                self.compile_block()?;
                Ok(true)
            }
            TokenKind::KwVar => {
                self.compile_var_stmt()?;
                Ok(true)
            }
            TokenKind::KwIf => {
                self.compile_if_stmt()?;
                Ok(true)
            }
            TokenKind::KwWhile => {
                self.compile_while_stmt()?;
                Ok(true)
            }
            TokenKind::KwPrint => {
                self.advance()?;
                self.expect_expr()?;
                self.emit(Op::bare(Opcode::Print));
                Ok(true)
            }
            TokenKind::KwReturn => {
                self.advance()?;
                if !self.expr(1)? {
                    let idx = self.get_const(Value::Nil);
                    self.emit(Op::new(Opcode::GetConst, idx));
                }
                self.emit(Op::bare(Opcode::Ret));
                Ok(true)
            }
            TokenKind::KwBreak => {
                let line = self.cur.line;
                self.advance()?;
                let idx = self.emit_placeholder(Opcode::Jmp);
                if !self.push_break(idx) {
                    return Err(CompileError::new(self.file, line, "'break' outside loop"));
                }
                Ok(true)
            }
            TokenKind::KwContinue => {
                let line = self.cur.line;
                self.advance()?;
                match self.nearest_loop_start() {
                    Some(start) => {
                        self.emit(Op::new(Opcode::Jmp, start as i32));
                        Ok(true)
                    }
                    None => Err(CompileError::new(self.file, line, "'continue' outside loop")),
                }
            }
            _ => {
                if self.expr(1)? {
                    self.compile_assignment_or_eat()?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn compile_var_stmt(&mut self) -> CompileResult<()> {
        self.advance()?; // 'var'
        let name_tok = self.expect_kind(TokenKind::Name)?;
        let name = name_tok.text.to_string();
        let slot = self.alloc_local(name.clone());
        if self.eat_char(b'=')? {
            // `var name = func(...) {...}` binds `name` inside the
            // function's own body too, so it can call itself — the one
            // form of recursion this no-closures language supports.
            if self.cur.kind == TokenKind::KwFunc {
                self.compile_func_expr(Some(&name))?;
            } else {
                self.expect_expr()?;
            }
            self.emit(Op::new(Opcode::SetVar, slot));
        }
        Ok(())
    }

    fn compile_if_stmt(&mut self) -> CompileResult<()> {
        self.advance()?; // 'if'
        self.expect_expr()?;
        let jmp_else = self.emit_placeholder(Opcode::JmpN);
        self.compile_required_stmt()?;
        if self.eat_kind(TokenKind::KwElse)? {
            let jmp_end = self.emit_placeholder(Opcode::Jmp);
            self.patch_here(jmp_else);
            self.compile_required_stmt()?;
            self.patch_here(jmp_end);
        } else {
            self.patch_here(jmp_else);
        }
        Ok(())
    }

    fn compile_while_stmt(&mut self) -> CompileResult<()> {
        self.advance()?; // 'while'
        let loop_start = self.builder.ops.len();
        self.enter_scope(true, loop_start);
        self.expect_expr()?;
        let jmp_end = self.emit_placeholder(Opcode::JmpN);
        self.compile_required_stmt()?;
        self.emit(Op::new(Opcode::Jmp, loop_start as i32));
        self.patch_here(jmp_end);
        self.exit_scope();
        Ok(())
    }

    /// Expression statement tail: `e = rhs` rewrites the last emitted op
    /// (`GetVar`/`GetElem`) into its `Set*` counterpart; otherwise the
    /// value is dropped with `Eat`. Spec.md §4.2 "Assignment".
    fn compile_assignment_or_eat(&mut self) -> CompileResult<()> {
        if self.eat_char(b'=')? {
            let last = *self
                .builder
                .ops
                .last()
                .expect("an expression statement emits at least one op");
            match last.opcode() {
                Opcode::GetVar => {
                    let slot = last.arg();
                    self.builder.ops.pop();
                    self.expect_expr()?;
                    self.emit(Op::new(Opcode::SetVar, slot));
                }
                Opcode::GetElem => {
                    self.builder.ops.pop();
                    self.expect_expr()?;
                    self.emit(Op::bare(Opcode::SetElem));
                }
                _ => {
                    return Err(CompileError::new(
                        self.file,
                        self.cur.line,
                        "assignment to unassignable expression",
                    ));
                }
            }
        } else {
            self.emit(Op::bare(Opcode::Eat));
        }
        Ok(())
    }

    // ---- expressions ----

    fn binop_prec(kind: TokenKind) -> Option<u8> {
        match kind {
            TokenKind::OrL => Some(1),
            TokenKind::AndL => Some(2),
            TokenKind::Eq
            | TokenKind::NEq
            | TokenKind::Char(b'<')
            | TokenKind::Char(b'>')
            | TokenKind::LtEq
            | TokenKind::GtEq => Some(3),
            TokenKind::Char(b'+') | TokenKind::Char(b'-') => Some(4),
            TokenKind::Char(b'*') | TokenKind::Char(b'/') | TokenKind::Char(b'%') => Some(5),
            _ => None,
        }
    }

    fn emit_binop(&mut self, kind: TokenKind) {
        let opcode = match kind {
            TokenKind::OrL => Opcode::OrL,
            TokenKind::AndL => Opcode::AndL,
            TokenKind::Eq => Opcode::CmpEq,
            TokenKind::NEq => Opcode::CmpNEq,
            TokenKind::Char(b'<') => Opcode::CmpLt,
            TokenKind::Char(b'>') => Opcode::CmpGt,
            TokenKind::LtEq => Opcode::CmpLtEq,
            TokenKind::GtEq => Opcode::CmpGtEq,
            TokenKind::Char(b'+') => Opcode::Add,
            TokenKind::Char(b'-') => Opcode::Sub,
            TokenKind::Char(b'*') => Opcode::Mul,
            TokenKind::Char(b'/') => Opcode::Div,
            TokenKind::Char(b'%') => Opcode::Mod,
            _ => unreachable!("binop_prec only returns Some for these kinds"),
        };
        self.emit(Op::bare(opcode));
    }

    /// Precedence-climbing entry point; `min_prec` is the lowest binary
    /// operator precedence this call is allowed to consume. Returns
    /// `false` without consuming input if the current token can't start
    /// an expression. Spec.md §4.2 precedence table.
    fn expr(&mut self, min_prec: u8) -> CompileResult<bool> {
        if !self.parse_unary()? {
            return Ok(false);
        }
        loop {
            let Some(prec) = Self::binop_prec(self.cur.kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let op_kind = self.cur.kind;
            self.advance()?;
            if !self.expr(prec + 1)? {
                return Err(self.err_expected("an expression"));
            }
            self.emit_binop(op_kind);
        }
        Ok(true)
    }

    fn parse_unary(&mut self) -> CompileResult<bool> {
        match self.cur.kind {
            TokenKind::Char(b'-') => {
                self.advance()?;
                if !self.parse_unary()? {
                    return Err(self.err_expected("an expression"));
                }
                self.emit(Op::bare(Opcode::Neg));
                Ok(true)
            }
            TokenKind::Char(b'!') => {
                self.advance()?;
                if !self.parse_unary()? {
                    return Err(self.err_expected("an expression"));
                }
                self.emit(Op::bare(Opcode::NotL));
                Ok(true)
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> CompileResult<bool> {
        if !self.parse_primary()? {
            return Ok(false);
        }
        loop {
            match self.cur.kind {
                TokenKind::Char(b'(') => {
                    self.advance()?;
                    let n = self.parse_arg_list()?;
                    self.expect_char(b')')?;
                    self.emit(Op::new(Opcode::Call, n as i32));
                }
                TokenKind::Char(b'[') => {
                    self.advance()?;
                    self.expect_expr()?;
                    self.expect_char(b']')?;
                    if self.cur.kind == TokenKind::Char(b'(') {
                        self.advance()?;
                        let n = self.parse_arg_list()?;
                        self.expect_char(b')')?;
                        self.emit(Op::new(Opcode::InstCall, n as i32));
                    } else {
                        self.emit(Op::bare(Opcode::GetElem));
                    }
                }
                TokenKind::Char(b'.') => {
                    self.advance()?;
                    let name_tok = self.expect_kind(TokenKind::Name)?;
                    let idx = self.pool_string_const(name_tok.text.as_bytes());
                    self.emit(Op::new(Opcode::GetConst, idx));
                    if self.cur.kind == TokenKind::Char(b'(') {
                        self.advance()?;
                        let n = self.parse_arg_list()?;
                        self.expect_char(b')')?;
                        self.emit(Op::new(Opcode::InstCall, n as i32));
                    } else {
                        self.emit(Op::bare(Opcode::GetElem));
                    }
                }
                _ => break,
            }
        }
        Ok(true)
    }

    fn parse_arg_list(&mut self) -> CompileResult<usize> {
        if self.cur.kind == TokenKind::Char(b')') {
            return Ok(0);
        }
        let mut n = 0;
        loop {
            self.expect_expr()?;
            n += 1;
            if !self.eat_char(b',')? {
                break;
            }
        }
        Ok(n)
    }

    fn parse_primary(&mut self) -> CompileResult<bool> {
        match self.cur.kind {
            TokenKind::Char(b'(') => {
                self.advance()?;
                self.expect_expr()?;
                self.expect_char(b')')?;
                Ok(true)
            }
            TokenKind::KwNil => {
                self.advance()?;
                let idx = self.get_const(Value::Nil);
                self.emit(Op::new(Opcode::GetConst, idx));
                Ok(true)
            }
            TokenKind::KwTrue => {
                self.advance()?;
                let idx = self.get_const(Value::Number(1.0));
                self.emit(Op::new(Opcode::GetConst, idx));
                Ok(true)
            }
            TokenKind::KwFalse => {
                self.advance()?;
                let idx = self.get_const(Value::Number(0.0));
                self.emit(Op::new(Opcode::GetConst, idx));
                Ok(true)
            }
            TokenKind::KwThis => {
                self.advance()?;
                self.emit(Op::bare(Opcode::GetInst));
                Ok(true)
            }
            TokenKind::Number => {
                let tok = self.advance()?;
                let idx = self.get_const(Value::Number(tok.number));
                self.emit(Op::new(Opcode::GetConst, idx));
                Ok(true)
            }
            TokenKind::String => {
                let tok = self.advance()?;
                let bytes = self.unescape(tok.text, tok.line)?;
                let idx = self.pool_string_const(&bytes);
                self.emit(Op::new(Opcode::GetConst, idx));
                Ok(true)
            }
            TokenKind::Char(b'[') => {
                self.advance()?;
                let mut n = 0;
                if self.cur.kind != TokenKind::Char(b']') {
                    loop {
                        self.expect_expr()?;
                        n += 1;
                        if !self.eat_char(b',')? {
                            break;
                        }
                    }
                }
                self.expect_char(b']')?;
                self.emit(Op::new(Opcode::MakeArray, n));
                Ok(true)
            }
            TokenKind::Char(b'{') => {
                self.advance()?;
                let mut n = 0;
                if self.cur.kind != TokenKind::Char(b'}') {
                    loop {
                        let key_idx = match self.cur.kind {
                            TokenKind::Name => {
                                let t = self.advance()?;
                                self.pool_string_const(t.text.as_bytes())
                            }
                            TokenKind::String => {
                                let t = self.advance()?;
                                let bytes = self.unescape(t.text, t.line)?;
                                self.pool_string_const(&bytes)
                            }
                            _ => return Err(self.err_expected("a struct key")),
                        };
                        self.expect_char(b'=')?;
                        self.emit(Op::new(Opcode::GetConst, key_idx));
                        self.expect_expr()?;
                        n += 1;
                        if !self.eat_char(b',')? {
                            break;
                        }
                    }
                }
                self.expect_char(b'}')?;
                self.emit(Op::new(Opcode::MakeStruct, n));
                Ok(true)
            }
            TokenKind::KwFunc => {
                self.compile_func_expr(None)?;
                Ok(true)
            }
            TokenKind::Name => {
                let tok = self.advance()?;
                match self.resolve_var(tok.text, tok.line)? {
                    VarSlot::Local(slot) => self.emit(Op::new(Opcode::GetVar, slot)),
                    VarSlot::SelfRef => self.emit(Op::bare(Opcode::GetSelf)),
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// `self_name` is `Some(name)` when this literal is the direct
    /// initializer of `var name = func(...) {...}`: `name` is then bound
    /// inside the function's own body to [`VarSlot::SelfRef`], resolving
    /// to `GetSelf` so the function can call itself (spec.md §8 scenario
    /// 2's factorial). Functions never capture an enclosing scope
    /// (spec.md §1), so this is the only channel by which a function can
    /// reach "itself" — no other outer name is visible from inside.
    fn compile_func_expr(&mut self, self_name: Option<&str>) -> CompileResult<()> {
        self.advance()?; // 'func'
        self.expect_char(b'(')?;
        let mut params = Vec::new();
        if !self.eat_char(b')')? {
            loop {
                let tok = self.expect_kind(TokenKind::Name)?;
                params.push(tok.text.to_string());
                if !self.eat_char(b',')? {
                    break;
                }
            }
            self.expect_char(b')')?;
        }

        let outer = std::mem::replace(&mut self.builder, FuncBuilder::new());
        self.saved.push(outer);
        if let Some(name) = self_name {
            self.builder.active_vars.push((name.to_string(), VarSlot::SelfRef));
        }
        let n_params = params.len() as u32;
        self.builder.n_params = n_params;
        for (i, name) in params.into_iter().enumerate() {
            let slot = i as i32 - n_params as i32;
            self.builder.active_vars.push((name, VarSlot::Local(slot)));
        }

        self.compile_block()?;
        self.finish_func_body();

        let inner_outer = self.saved.pop().expect("pushed before compiling inner func");
        let inner = std::mem::replace(&mut self.builder, inner_outer);
        let func_obj = self
            .heap
            .alloc_func(&inner.consts, &inner.ops, inner.n_params, inner.n_locals);
        let idx = self.get_const(Value::Func(func_obj));
        self.emit(Op::new(Opcode::GetConst, idx));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(src: &str) -> (Heap, Obj<quill_core::Func>) {
        let heap = Heap::new();
        let mut buf = src.as_bytes().to_vec();
        buf.push(0);
        let func = compile(&heap, "test", &buf).expect("compile should succeed");
        (heap, func)
    }

    fn ops_of(func: Obj<quill_core::Func>) -> Vec<Opcode> {
        unsafe { func.get() }.ops().iter().map(|op| op.opcode()).collect()
    }

    #[test]
    fn every_compiled_func_ends_in_ret() {
        let (_heap, func) = compile_ok("1+2");
        assert_eq!(ops_of(func).last(), Some(&Opcode::Ret));
    }

    #[test]
    fn arithmetic_precedence() {
        let (_heap, func) = compile_ok("print 1+2*3");
        let ops = ops_of(func);
        // three GetConst pushes, Mul before Add, then Print, then the
        // implicit GetConst(nil)+Ret tail.
        assert_eq!(
            ops,
            vec![
                Opcode::GetConst,
                Opcode::GetConst,
                Opcode::GetConst,
                Opcode::Mul,
                Opcode::Add,
                Opcode::Print,
                Opcode::GetConst,
                Opcode::Ret,
            ]
        );
    }

    #[test]
    fn jump_targets_are_in_range() {
        let (_heap, func) = compile_ok("var i = 0\nwhile i < 3 { i = i+1 }");
        let func_ref = unsafe { func.get() };
        let n_ops = func_ref.ops().len() as i32;
        for op in func_ref.ops() {
            if matches!(op.opcode(), Opcode::Jmp | Opcode::JmpN) {
                assert!(op.arg() >= 0 && op.arg() < n_ops);
            }
        }
    }

    #[test]
    fn unresolved_name_is_an_error() {
        let heap = Heap::new();
        let mut buf = b"print nope".to_vec();
        buf.push(0);
        let err = compile(&heap, "test", &buf).unwrap_err();
        assert!(err.message.contains("unresolved name"));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let heap = Heap::new();
        let mut buf = b"break".to_vec();
        buf.push(0);
        let err = compile(&heap, "test", &buf).unwrap_err();
        assert!(err.message.contains("'break' outside loop"));
    }

    #[test]
    fn assignment_to_literal_is_an_error() {
        let heap = Heap::new();
        let mut buf = b"1 = 2".to_vec();
        buf.push(0);
        let err = compile(&heap, "test", &buf).unwrap_err();
        assert!(err.message.contains("unassignable"));
    }

    #[test]
    fn named_func_expr_resolves_self_reference() {
        let (_heap, func) = compile_ok("var f = func(n) { return f(n-1) }");
        let consts = unsafe { func.get() }.consts();
        let inner = consts.iter().find(|v| v.is_func()).expect("f is pooled as a constant");
        let Value::Func(inner) = inner else { unreachable!() };
        let ops = ops_of(*inner);
        assert!(ops.contains(&Opcode::GetSelf));
        assert!(!ops.contains(&Opcode::GetVar));
    }

    #[test]
    fn plain_func_expr_has_no_self_reference() {
        // `f` used inside a function expression that is not the direct
        // initializer of `var f = func...` is a free name, not a self-ref —
        // this language has no closures (spec.md §1), so it is unresolved.
        let heap = Heap::new();
        let mut buf = b"var f = func(n) { return n }\nvar g = func(n) { return f(n) }".to_vec();
        buf.push(0);
        let err = compile(&heap, "test", &buf).unwrap_err();
        assert!(err.message.contains("unresolved name"));
    }

    #[test]
    fn nested_func_is_pooled_as_a_constant() {
        let (_heap, func) = compile_ok("var f = func(n) { return n }");
        let consts = unsafe { func.get() }.consts();
        assert!(consts.iter().any(|v| v.is_func()));
    }

    #[test]
    fn duplicate_string_constants_are_deduplicated() {
        let (_heap, func) = compile_ok("print \"a\"\nprint \"a\"");
        let consts = unsafe { func.get() }.consts();
        let string_consts = consts.iter().filter(|v| v.is_string()).count();
        assert_eq!(string_consts, 1);
    }

    #[test]
    fn member_access_is_elem_sugar() {
        let (_heap, func) = compile_ok("var o = {}\nprint o.x");
        let ops = ops_of(func);
        assert!(ops.contains(&Opcode::GetElem));
    }

    #[test]
    fn method_call_emits_inst_call() {
        let (_heap, func) = compile_ok("var o = { f = func() { return 1 } }\nprint o.f()");
        let ops = ops_of(func);
        assert!(ops.contains(&Opcode::InstCall));
        assert!(!ops.contains(&Opcode::Call));
    }
}
