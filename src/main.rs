//! REPL and file-execution shell. Maps `Vm::interpret` outcomes onto the
//! exit codes the driver contract specifies; argument parsing is a small
//! hand-rolled lexer over argv rather than a full CLI-parsing crate, since
//! the surface is three cases: no args, one path, or anything else.

use std::fs;
use std::io::Write;
use std::process;

use loxvm::error;
use loxvm::vm::{InterpretOutcome, Vm};

enum Args {
    Repl,
    File(String),
    Usage,
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    match (args.next(), args.next()) {
        (None, _) => Args::Repl,
        (Some(path), None) => Args::File(path),
        _ => Args::Usage,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match parse_args() {
        Args::Repl => run_repl(),
        Args::File(path) => run_file(&path),
        Args::Usage => {
            eprintln!("Usage: loxvm [path]");
            process::exit(exitcode::USAGE);
        }
    }
}

fn run_repl() {
    let mut vm = Vm::new();
    let mut editor = rustyline::DefaultEditor::new().expect("failed to start line editor");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim() == "exit" {
                    break;
                }
                let _ = editor.add_history_entry(line.as_str());
                report_outcome(vm.interpret(&line));
            }
            Err(_) => break, // EOF (Ctrl-D) or interrupt
        }
    }
}

fn run_file(path: &str) {
    let source = fs::read_to_string(path).unwrap_or_else(|source| {
        let err = error::DriverError::Io {
            path: path.to_string(),
            source,
        };
        eprintln!("{err}");
        process::exit(exitcode::IOERR);
    });

    let mut vm = Vm::new();
    let outcome = vm.interpret(&source);
    let code = exit_code(&outcome);
    report_outcome(outcome);
    if code != exitcode::OK {
        process::exit(code);
    }
}

fn exit_code(outcome: &InterpretOutcome) -> i32 {
    match outcome {
        InterpretOutcome::Ok => exitcode::OK,
        InterpretOutcome::CompileError(_) => exitcode::DATAERR,
        InterpretOutcome::RuntimeError(_) => exitcode::SOFTWARE,
    }
}

fn report_outcome(outcome: InterpretOutcome) {
    match outcome {
        InterpretOutcome::Ok => {}
        InterpretOutcome::CompileError(errors) => {
            for err in errors {
                eprintln!("{err}");
            }
        }
        InterpretOutcome::RuntimeError(err) => eprintln!("{err}"),
    }
    let _ = std::io::stdout().flush();
}
