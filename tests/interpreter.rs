//! Black-box coverage of the eight end-to-end scenarios against
//! `Vm::interpret`, driven through the library crate rather than internal
//! module paths.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use loxvm::vm::{InterpretOutcome, Vm};

use pretty_assertions::assert_eq;

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

fn run(source: &str) -> (InterpretOutcome, String) {
    let buffer = SharedBuffer::default();
    let mut vm = Vm::with_writer(Box::new(buffer.clone()));
    let outcome = vm.interpret(source);
    let output = String::from_utf8(buffer.0.borrow().clone()).expect("utf8 output");
    (outcome, output)
}

fn expect_ok_stdout(source: &str) -> String {
    let (outcome, output) = run(source);
    match outcome {
        InterpretOutcome::Ok => output,
        InterpretOutcome::CompileError(errors) => panic!("compile error: {errors:?}"),
        InterpretOutcome::RuntimeError(err) => panic!("runtime error: {err}"),
    }
}

#[test]
fn scenario_1_operator_precedence() {
    assert_eq!(expect_ok_stdout("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn scenario_2_grouping_overrides_precedence() {
    assert_eq!(expect_ok_stdout("print (1 + 2) * 3;"), "9\n");
}

#[test]
fn scenario_3_string_concatenation() {
    assert_eq!(
        expect_ok_stdout("var a = \"foo\"; var b = \"bar\"; print a + b;"),
        "foobar\n"
    );
}

#[test]
fn scenario_4_block_scope_shadowing() {
    assert_eq!(
        expect_ok_stdout("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn scenario_5_string_equality_via_interning() {
    assert_eq!(expect_ok_stdout("print \"hi\" == \"hi\";"), "true\n");
}

#[test]
fn scenario_6_undefined_global_is_runtime_error_70() {
    let (outcome, _) = run("print x;");
    match outcome {
        InterpretOutcome::RuntimeError(err) => {
            assert_eq!(err.message, "Undefined variable 'x'.");
        }
        other => panic!("expected RuntimeError, got a different outcome: {}", describe(&other)),
    }
}

#[test]
fn scenario_7_mixed_add_is_runtime_error_70() {
    let (outcome, _) = run("1 + \"a\";");
    match outcome {
        InterpretOutcome::RuntimeError(err) => {
            assert_eq!(err.message, "Operands must be two numbers or two strings.");
        }
        other => panic!("expected RuntimeError, got a different outcome: {}", describe(&other)),
    }
}

#[test]
fn scenario_8a_own_initializer_inside_block_is_compile_error() {
    let (outcome, _) = run("{ var a = a; }");
    match outcome {
        InterpretOutcome::CompileError(errors) => {
            assert!(errors
                .iter()
                .any(|e| e.message == "Can't read local variable in its own initializer."));
        }
        other => panic!("expected CompileError, got a different outcome: {}", describe(&other)),
    }
}

#[test]
fn scenario_8b_own_initializer_at_global_scope_is_runtime_error() {
    // At global scope `a` on the right-hand side resolves as an (as yet
    // undefined) global read, not a local-initializer cycle.
    let (outcome, _) = run("var a = a;");
    match outcome {
        InterpretOutcome::RuntimeError(err) => {
            assert_eq!(err.message, "Undefined variable 'a'.");
        }
        other => panic!("expected RuntimeError, got a different outcome: {}", describe(&other)),
    }
}

fn describe(outcome: &InterpretOutcome) -> &'static str {
    match outcome {
        InterpretOutcome::Ok => "Ok",
        InterpretOutcome::CompileError(_) => "CompileError",
        InterpretOutcome::RuntimeError(_) => "RuntimeError",
    }
}
