//! Dispatch loop: reads one opcode at a time and executes it against the
//! operand stack, globals map, and object heap.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::chunk::{Chunk, OpCode};
use crate::compiler::Compiler;
use crate::error::RuntimeError;
use crate::value::{render, Heap, Value};

#[cfg(feature = "debug-execution")]
use crate::debug;

pub enum InterpretOutcome {
    Ok,
    CompileError(Vec<crate::error::CompileError>),
    RuntimeError(RuntimeError),
}

pub struct Vm {
    stack: Vec<Value>,
    globals: HashMap<Rc<str>, Value>,
    heap: Heap,
    out: Box<dyn Write>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            stack: Vec::with_capacity(256),
            globals: HashMap::new(),
            heap: Heap::new(),
            out: Box::new(io::stdout()),
        }
    }

    /// Same as `new`, but with `print` output routed through `writer`
    /// instead of stdout — the testability seam used by integration tests.
    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        Vm {
            out: writer,
            ..Vm::new()
        }
    }

    pub fn interpret(&mut self, source: &str) -> InterpretOutcome {
        tracing::debug!(bytes = source.len(), "compiling source");
        let compiler = Compiler::new(source, &mut self.heap);
        let chunk = match compiler.compile() {
            Ok(chunk) => chunk,
            Err(errors) => return InterpretOutcome::CompileError(errors),
        };

        #[cfg(feature = "debug-bytecode")]
        crate::debug::disassemble(&chunk, &self.heap);

        tracing::debug!("running chunk");
        match self.run(&chunk) {
            Ok(()) => InterpretOutcome::Ok,
            Err(err) => {
                self.stack.clear();
                InterpretOutcome::RuntimeError(err)
            }
        }
    }

    fn run(&mut self, chunk: &Chunk) -> Result<(), RuntimeError> {
        let mut ip = 0usize;
        loop {
            #[cfg(feature = "debug-execution")]
            {
                print!("          ");
                for value in &self.stack {
                    print!("[ {} ]", render(value, &self.heap));
                }
                println!();
                debug::disassemble_instruction(chunk, &self.heap, ip);
            }

            let byte = chunk.code()[ip];
            ip += 1;
            let op = match OpCode::try_from(byte) {
                Ok(op) => op,
                Err(()) => return Err(self.runtime_error(chunk, ip, "Unknown opcode.")),
            };

            match op {
                OpCode::Constant => {
                    let idx = self.read_u8(chunk, &mut ip);
                    self.stack.push(chunk.constant(idx));
                }
                OpCode::Nil => self.stack.push(Value::Nil),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.stack.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_u8(chunk, &mut ip);
                    self.stack.push(self.stack[slot as usize]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_u8(chunk, &mut ip);
                    let value = *self.stack.last().expect("stack non-empty for assignment");
                    self.stack[slot as usize] = value;
                }
                OpCode::GetGlobal => {
                    let idx = self.read_u8(chunk, &mut ip);
                    let name = self.global_name(chunk, idx);
                    match self.globals.get(name.as_ref()) {
                        Some(&value) => self.stack.push(value),
                        None => {
                            let message = format!("Undefined variable '{name}'.");
                            return Err(self.runtime_error(chunk, ip, &message));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let idx = self.read_u8(chunk, &mut ip);
                    let name = self.global_name(chunk, idx);
                    let value = self.stack.pop().expect("stack non-empty for define");
                    self.globals.insert(name, value);
                }
                OpCode::SetGlobal => {
                    let idx = self.read_u8(chunk, &mut ip);
                    let name = self.global_name(chunk, idx);
                    if !self.globals.contains_key(name.as_ref()) {
                        let message = format!("Undefined variable '{name}'.");
                        return Err(self.runtime_error(chunk, ip, &message));
                    }
                    let value = *self.stack.last().expect("stack non-empty for assignment");
                    self.globals.insert(name, value);
                }
                OpCode::Equal => {
                    let b = self.stack.pop().expect("stack non-empty for ==");
                    let a = self.stack.pop().expect("stack non-empty for ==");
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.numeric_binary(chunk, ip, |a, b| Value::Bool(a > b))?,
                OpCode::Less => self.numeric_binary(chunk, ip, |a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add(chunk, ip)?,
                OpCode::Subtract => self.numeric_binary(chunk, ip, |a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.numeric_binary(chunk, ip, |a, b| Value::Number(a * b))?,
                OpCode::Divide => self.numeric_binary(chunk, ip, |a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.stack.pop().expect("stack non-empty for !");
                    self.stack.push(Value::Bool(!value.is_truthy()));
                }
                OpCode::Negate => {
                    let value = *self.stack.last().expect("stack non-empty for unary -");
                    match value.as_number() {
                        Some(n) => {
                            self.stack.pop();
                            self.stack.push(Value::Number(-n));
                        }
                        None => {
                            return Err(self.runtime_error(chunk, ip, "Operand(s) must be number(s)."))
                        }
                    }
                }
                OpCode::Print => {
                    let value = self.stack.pop().expect("stack non-empty for print");
                    let rendered = render(&value, &self.heap);
                    let _ = writeln!(self.out, "{rendered}");
                }
                OpCode::Return => return Ok(()),
            }
        }
    }

    fn read_u8(&self, chunk: &Chunk, ip: &mut usize) -> u8 {
        let byte = chunk.code()[*ip];
        *ip += 1;
        byte
    }

    fn global_name(&self, chunk: &Chunk, idx: u8) -> Rc<str> {
        match chunk.constant(idx) {
            Value::Obj(r) => self.heap.rc_str(r),
            _ => unreachable!("global name constant must be a string"),
        }
    }

    fn numeric_binary(
        &mut self,
        chunk: &Chunk,
        ip: usize,
        op: impl Fn(f64, f64) -> Value,
    ) -> Result<(), RuntimeError> {
        let b = self.stack.pop().expect("stack non-empty for binary op");
        let a = self.stack.pop().expect("stack non-empty for binary op");
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                self.stack.push(op(a, b));
                Ok(())
            }
            _ => Err(self.runtime_error(chunk, ip, "Operand(s) must be number(s).")),
        }
    }

    fn add(&mut self, chunk: &Chunk, ip: usize) -> Result<(), RuntimeError> {
        let b = self.stack.pop().expect("stack non-empty for +");
        let a = self.stack.pop().expect("stack non-empty for +");
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.push(Value::Number(a + b));
                Ok(())
            }
            (Value::Obj(a_ref), Value::Obj(b_ref)) => {
                let concatenated = format!("{}{}", self.heap.as_str(a_ref), self.heap.as_str(b_ref));
                let result = self.heap.intern(&concatenated);
                self.stack.push(Value::Obj(result));
                Ok(())
            }
            _ => Err(self.runtime_error(chunk, ip, "Operands must be two numbers or two strings.")),
        }
    }

    fn runtime_error(&self, chunk: &Chunk, ip: usize, message: &str) -> RuntimeError {
        let line = chunk.line_at(ip.saturating_sub(1));
        RuntimeError {
            message: message.to_string(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// `Write` sink backed by a shared, reachable buffer so tests can read
    /// the output back after `interpret` returns ownership of the `Vm`.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_and_capture(source: &str) -> String {
        let buffer = SharedBuffer::default();
        let mut vm = Vm::with_writer(Box::new(buffer.clone()));
        match vm.interpret(source) {
            InterpretOutcome::Ok => {}
            InterpretOutcome::CompileError(errors) => panic!("compile error: {errors:?}"),
            InterpretOutcome::RuntimeError(err) => panic!("runtime error: {err}"),
        }
        String::from_utf8(buffer.0.borrow().clone()).expect("utf8 output")
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(run_and_capture("print 1 + 2 * 3;"), "7\n");
    }

    #[test]
    fn grouping_overrides_precedence() {
        assert_eq!(run_and_capture("print (1 + 2) * 3;"), "9\n");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            run_and_capture("var a = \"foo\"; var b = \"bar\"; print a + b;"),
            "foobar\n"
        );
    }

    #[test]
    fn block_scope_shadows_outer_local() {
        assert_eq!(
            run_and_capture("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn string_equality_via_interning() {
        assert_eq!(run_and_capture("print \"hi\" == \"hi\";"), "true\n");
    }

    #[test]
    fn undefined_global_read_is_a_runtime_error() {
        let mut vm = Vm::with_writer(Box::new(SharedBuffer::default()));
        match vm.interpret("print x;") {
            InterpretOutcome::RuntimeError(err) => {
                assert_eq!(err.message, "Undefined variable 'x'.");
            }
            _ => panic!("expected a runtime error"),
        }
    }

    #[test]
    fn adding_number_and_string_is_a_runtime_error() {
        let mut vm = Vm::with_writer(Box::new(SharedBuffer::default()));
        match vm.interpret("1 + \"a\";") {
            InterpretOutcome::RuntimeError(err) => {
                assert_eq!(err.message, "Operands must be two numbers or two strings.");
            }
            _ => panic!("expected a runtime error"),
        }
    }

    #[test]
    fn global_self_reference_is_not_a_compile_error() {
        let mut vm = Vm::with_writer(Box::new(SharedBuffer::default()));
        match vm.interpret("var a = a;") {
            InterpretOutcome::RuntimeError(_) => {}
            InterpretOutcome::CompileError(errors) => {
                panic!("expected a runtime error, got compile errors: {errors:?}")
            }
            InterpretOutcome::Ok => panic!("expected 'a' to be undefined at global scope"),
        }
    }
}
