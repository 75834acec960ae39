//! Single-pass bytecode compiler and stack VM for a small Lox-family
//! scripting language. The library crate exposes the pieces the `main`
//! binary and integration tests drive; `main.rs` is a thin CLI shell
//! around [`vm::Vm`].

pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod error;
pub mod token;
pub mod tokenizer;
pub mod value;
pub mod vm;
