//! Single-pass Pratt compiler: parses and emits bytecode in the same walk,
//! with no intermediate AST. Diagnostics accumulate into a
//! `Vec<CompileError>` rather than aborting on the first error.

use crate::chunk::{Chunk, OpCode};
use crate::error::{CompileError, ErrorSite};
use crate::token::{Token, TokenType};
use crate::tokenizer::Scanner;
use crate::value::{Heap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

type ParseResult = Result<(), ()>;

struct Local {
    name: Token,
    depth: i32,
}

const MAX_LOCALS: usize = 256;

pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    heap: &'a mut Heap,
    previous: Token,
    current: Token,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<CompileError>,
    chunk: Chunk,
    locals: Vec<Local>,
    scope_depth: i32,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a str, heap: &'a mut Heap) -> Self {
        Compiler {
            scanner: Scanner::new(source),
            heap,
            previous: Token::default(),
            current: Token::default(),
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
            chunk: Chunk::new(),
            locals: Vec::new(),
            scope_depth: 0,
        }
    }

    pub fn compile(mut self) -> Result<Chunk, Vec<CompileError>> {
        self.advance();
        while !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.emit(OpCode::Return);
        if self.had_error {
            Err(self.errors)
        } else {
            Ok(self.chunk)
        }
    }

    // --- token stream -----------------------------------------------

    fn advance(&mut self) {
        std::mem::swap(&mut self.previous, &mut self.current);
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenType::Error {
                break;
            }
            let message = self.current.lexeme.clone();
            self.error_at_current(&message, ErrorSite::Suppressed);
        }
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenType, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current_token(message);
    }

    // --- diagnostics ---------------------------------------------------

    fn error_at_current_token(&mut self, message: &str) {
        let site = Self::site_for(&self.current);
        self.error_at_current(message, site);
    }

    fn site_for(token: &Token) -> ErrorSite {
        match token.kind {
            TokenType::Eof => ErrorSite::End,
            _ => ErrorSite::Lexeme(token.lexeme.clone()),
        }
    }

    fn error_at_current(&mut self, message: &str, site: ErrorSite) {
        let (line, column) = (self.current.line, self.current.column);
        self.report(line, column, site, message);
    }

    fn error(&mut self, message: &str) {
        let site = Self::site_for(&self.previous);
        let (line, column) = (self.previous.line, self.previous.column);
        self.report(line, column, site, message);
    }

    fn report(&mut self, line: u32, column: u32, site: ErrorSite, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        self.errors.push(CompileError {
            line,
            column,
            site,
            message: message.to_string(),
        });
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenType::Eof {
            if self.previous.kind == TokenType::Semicolon {
                return;
            }
            match self.current.kind {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- emission -------------------------------------------------------

    fn emit(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.chunk.write_op(op, line);
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_constant(&mut self, value: Value) {
        match self.chunk.add_constant(value) {
            Some(idx) => {
                self.emit(OpCode::Constant);
                self.emit_byte(idx);
            }
            None => self.error("Too many constants in one chunk."),
        }
    }

    fn identifier_constant(&mut self, name: &str) -> Option<u8> {
        let reference = self.heap.intern(name);
        self.chunk.add_constant(Value::Obj(reference))
    }

    // --- statements -----------------------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenType::Identifier, "Expect variable name.");
        let name = self.previous.clone();

        let global_idx = if self.scope_depth > 0 {
            self.declare_local(name);
            None
        } else {
            match self.identifier_constant(&name.lexeme) {
                Some(idx) => Some(idx),
                None => {
                    self.error("Too many constants in one chunk.");
                    None
                }
            }
        };

        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            self.emit(OpCode::Nil);
        }
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.");

        if self.scope_depth > 0 {
            self.mark_initialized();
        } else if let Some(idx) = global_idx {
            self.emit(OpCode::DefineGlobal);
            self.emit_byte(idx);
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::OBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit(OpCode::Pop);
    }

    fn block(&mut self) {
        while !self.check(TokenType::CBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::CBrace, "Expect '}' after block.");
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while let Some(local) = self.locals.last() {
            if local.depth <= self.scope_depth {
                break;
            }
            self.emit(OpCode::Pop);
            self.locals.pop();
        }
    }

    // --- locals -----------------------------------------------------------

    fn declare_local(&mut self, name: Token) {
        if self.scope_depth == 0 {
            return;
        }
        let mut collides = false;
        for local in self.locals.iter().rev() {
            if local.depth != -1 && local.depth < self.scope_depth {
                break;
            }
            if local.name.lexeme == name.lexeme {
                collides = true;
                break;
            }
        }
        if collides {
            self.error("Already variable with this name in this scope.");
            return;
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: Token) {
        if self.locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.locals.push(Local { name, depth: -1 });
    }

    fn mark_initialized(&mut self) {
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    /// Returns `Some(Ok(slot))` on a resolved, initialized local, `Some(Err(()))`
    /// if the name refers to its own not-yet-initialized slot (already
    /// reported), or `None` if no local matches (the caller should fall
    /// back to a global).
    fn resolve_local(&mut self, name: &str) -> Option<Result<u8, ()>> {
        let mut found = None;
        for (slot, local) in self.locals.iter().enumerate().rev() {
            if local.name.lexeme == name {
                found = Some((slot as u8, local.depth));
                break;
            }
        }
        match found {
            Some((_, -1)) => {
                self.error("Can't read local variable in its own initializer.");
                Some(Err(()))
            }
            Some((slot, _)) => Some(Ok(slot)),
            None => None,
        }
    }

    // --- expressions ------------------------------------------------------

    fn expression(&mut self) {
        let _ = self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) -> ParseResult {
        self.advance();
        let can_assign = precedence <= Precedence::Assignment;
        self.prefix(self.previous.kind, can_assign)?;

        while precedence <= infix_precedence(self.current.kind) {
            self.advance();
            self.infix(self.previous.kind, can_assign)?;
        }

        if can_assign && self.match_token(TokenType::Equal) {
            self.error("Invalid assignment target.");
            return Err(());
        }
        Ok(())
    }

    /// Dispatches to the prefix parser for `kind`, the token just consumed.
    fn prefix(&mut self, kind: TokenType, can_assign: bool) -> ParseResult {
        use TokenType::*;
        match kind {
            OParen => self.grouping(can_assign),
            Minus | Bang => self.unary(can_assign),
            Identifier => self.variable(can_assign),
            String => self.string(can_assign),
            Number => self.number(can_assign),
            False | True | Nil => self.literal(can_assign),
            _ => {
                self.error("Expect expression.");
                Err(())
            }
        }
    }

    /// Dispatches to the infix parser for `kind`, the operator just
    /// consumed. Only reached when `infix_precedence(kind)` let the
    /// `parse_precedence` loop advance onto it, so every other token kind
    /// has no infix parser.
    fn infix(&mut self, kind: TokenType, can_assign: bool) -> ParseResult {
        use TokenType::*;
        match kind {
            Minus | Plus | Slash | Star | BangEqual | EqualEqual | Greater | GreaterEqual
            | Less | LessEqual => self.binary(can_assign),
            _ => unreachable!("infix() invoked for a token with no infix rule"),
        }
    }

    fn number(&mut self, _can_assign: bool) -> ParseResult {
        match self.previous.lexeme.parse::<f64>() {
            Ok(n) => {
                self.emit_constant(Value::Number(n));
                Ok(())
            }
            Err(_) => {
                self.error("Invalid number literal.");
                Err(())
            }
        }
    }

    fn string(&mut self, _can_assign: bool) -> ParseResult {
        let lexeme = self.previous.lexeme.clone();
        let text = &lexeme[1..lexeme.len() - 1];
        let reference = self.heap.intern(text);
        self.emit_constant(Value::Obj(reference));
        Ok(())
    }

    fn literal(&mut self, _can_assign: bool) -> ParseResult {
        match self.previous.kind {
            TokenType::Nil => self.emit(OpCode::Nil),
            TokenType::True => self.emit(OpCode::True),
            TokenType::False => self.emit(OpCode::False),
            _ => unreachable!("literal() invoked for a non-literal token"),
        }
        Ok(())
    }

    fn grouping(&mut self, _can_assign: bool) -> ParseResult {
        self.expression();
        self.consume(TokenType::CParen, "Expect ')' after expression.");
        Ok(())
    }

    fn unary(&mut self, _can_assign: bool) -> ParseResult {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary)?;
        match operator {
            TokenType::Minus => self.emit(OpCode::Negate),
            TokenType::Bang => self.emit(OpCode::Not),
            _ => unreachable!("unary() invoked for a non-unary operator"),
        }
        Ok(())
    }

    fn binary(&mut self, _can_assign: bool) -> ParseResult {
        let operator = self.previous.kind;
        self.parse_precedence(infix_precedence(operator).next())?;
        match operator {
            TokenType::Plus => self.emit(OpCode::Add),
            TokenType::Minus => self.emit(OpCode::Subtract),
            TokenType::Star => self.emit(OpCode::Multiply),
            TokenType::Slash => self.emit(OpCode::Divide),
            TokenType::BangEqual => {
                self.emit(OpCode::Equal);
                self.emit(OpCode::Not);
            }
            TokenType::EqualEqual => self.emit(OpCode::Equal),
            TokenType::Greater => self.emit(OpCode::Greater),
            TokenType::GreaterEqual => {
                self.emit(OpCode::Less);
                self.emit(OpCode::Not);
            }
            TokenType::Less => self.emit(OpCode::Less),
            TokenType::LessEqual => {
                self.emit(OpCode::Greater);
                self.emit(OpCode::Not);
            }
            _ => unreachable!("binary() invoked for a non-binary operator"),
        }
        Ok(())
    }

    fn variable(&mut self, can_assign: bool) -> ParseResult {
        let name = self.previous.clone();
        self.named_variable(&name, can_assign)
    }

    fn named_variable(&mut self, name: &Token, can_assign: bool) -> ParseResult {
        let local_slot = self.resolve_local(&name.lexeme);
        let (get_op, set_op, operand) = match local_slot {
            Some(Ok(slot)) => (OpCode::GetLocal, OpCode::SetLocal, slot),
            Some(Err(())) => return Err(()),
            None => match self.identifier_constant(&name.lexeme) {
                Some(idx) => (OpCode::GetGlobal, OpCode::SetGlobal, idx),
                None => {
                    self.error("Too many constants in one chunk.");
                    return Err(());
                }
            },
        };

        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit(set_op);
            self.emit_byte(operand);
        } else {
            self.emit(get_op);
            self.emit_byte(operand);
        }
        Ok(())
    }
}

/// The precedence of `kind` as an infix operator, or `Precedence::None` if
/// it has no infix rule. Drives the `parse_precedence` loop's "does the next
/// token bind tighter than what we're parsing" check.
fn infix_precedence(kind: TokenType) -> Precedence {
    use TokenType::*;
    match kind {
        Minus | Plus => Precedence::Term,
        Slash | Star => Precedence::Factor,
        BangEqual | EqualEqual => Precedence::Equality,
        Greater | GreaterEqual | Less | LessEqual => Precedence::Comparison,
        _ => Precedence::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::OpCode;

    fn compile_ok(source: &str) -> Chunk {
        let mut heap = Heap::new();
        let compiler = Compiler::new(source, &mut heap);
        compiler.compile().expect("expected compile success")
    }

    fn compile_err(source: &str) -> Vec<CompileError> {
        let mut heap = Heap::new();
        let compiler = Compiler::new(source, &mut heap);
        compiler.compile().expect_err("expected compile failure")
    }

    #[test]
    fn arithmetic_precedence_emits_factor_before_term() {
        let chunk = compile_ok("print 1 + 2 * 3;");
        let ops: Vec<u8> = chunk.code().to_vec();
        assert_eq!(
            ops.first().copied().and_then(|b| OpCode::try_from(b).ok()),
            Some(OpCode::Constant)
        );
        assert!(ops.contains(&(OpCode::Multiply as u8)));
        assert!(ops.contains(&(OpCode::Add as u8)));
        assert!(ops.contains(&(OpCode::Print as u8)));
    }

    #[test]
    fn global_declaration_emits_define_global() {
        let chunk = compile_ok("var a = 1;");
        assert!(chunk.code().contains(&(OpCode::DefineGlobal as u8)));
    }

    #[test]
    fn block_local_uses_get_local_not_get_global() {
        let chunk = compile_ok("{ var a = 1; print a; }");
        assert!(chunk.code().contains(&(OpCode::GetLocal as u8)));
        assert!(!chunk.code().contains(&(OpCode::GetGlobal as u8)));
    }

    #[test]
    fn reading_own_initializer_in_block_is_a_compile_error() {
        let errors = compile_err("{ var a = a; }");
        assert!(errors
            .iter()
            .any(|e| e.message == "Can't read local variable in its own initializer."));
    }

    #[test]
    fn shadowing_in_same_scope_is_a_compile_error() {
        let errors = compile_err("{ var a = 1; var a = 2; }");
        assert!(errors
            .iter()
            .any(|e| e.message == "Already variable with this name in this scope."));
    }

    #[test]
    fn missing_expression_reports_expect_expression() {
        let errors = compile_err("print ;");
        assert!(errors.iter().any(|e| e.message == "Expect expression."));
    }

    #[test]
    fn end_of_scope_emits_one_pop_per_local() {
        let chunk = compile_ok("{ var a = 1; var b = 2; }");
        let pops = chunk.code().iter().filter(|&&b| b == OpCode::Pop as u8).count();
        assert_eq!(pops, 2);
    }
}
