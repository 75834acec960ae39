//! Chunk disassembler, gated behind the `debug-bytecode` feature.

use crate::chunk::{Chunk, OpCode};
use crate::value::{DebugValue, Heap};

pub fn disassemble(chunk: &Chunk, heap: &Heap) {
    println!("== script ==");
    let mut offset = 0;
    while offset < chunk.code().len() {
        offset = disassemble_instruction(chunk, heap, offset);
    }
}

pub fn disassemble_instruction(chunk: &Chunk, heap: &Heap, offset: usize) -> usize {
    print!("{offset:04} ");
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        print!("   | ");
    } else {
        print!("{:4} ", chunk.line_at(offset));
    }

    let byte = chunk.code()[offset];
    let op = match OpCode::try_from(byte) {
        Ok(op) => op,
        Err(()) => {
            println!("unknown opcode {byte}");
            return offset + 1;
        }
    };

    match op {
        OpCode::Constant | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            constant_instruction(mnemonic(op), chunk, heap, offset)
        }
        OpCode::GetLocal | OpCode::SetLocal => byte_instruction(mnemonic(op), chunk, offset),
        _ => simple_instruction(mnemonic(op), offset),
    }
}

fn mnemonic(op: OpCode) -> &'static str {
    match op {
        OpCode::Constant => "OP_CONSTANT",
        OpCode::Nil => "OP_NIL",
        OpCode::True => "OP_TRUE",
        OpCode::False => "OP_FALSE",
        OpCode::Pop => "OP_POP",
        OpCode::GetLocal => "OP_GET_LOCAL",
        OpCode::SetLocal => "OP_SET_LOCAL",
        OpCode::GetGlobal => "OP_GET_GLOBAL",
        OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
        OpCode::SetGlobal => "OP_SET_GLOBAL",
        OpCode::Equal => "OP_EQUAL",
        OpCode::Greater => "OP_GREATER",
        OpCode::Less => "OP_LESS",
        OpCode::Add => "OP_ADD",
        OpCode::Subtract => "OP_SUBTRACT",
        OpCode::Multiply => "OP_MULTIPLY",
        OpCode::Divide => "OP_DIVIDE",
        OpCode::Not => "OP_NOT",
        OpCode::Negate => "OP_NEGATE",
        OpCode::Print => "OP_PRINT",
        OpCode::Return => "OP_RETURN",
    }
}

fn simple_instruction(name: &str, offset: usize) -> usize {
    println!("{name}");
    offset + 1
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code()[offset + 1];
    println!("{name:<16} {slot:4}");
    offset + 2
}

fn constant_instruction(name: &str, chunk: &Chunk, heap: &Heap, offset: usize) -> usize {
    let index = chunk.code()[offset + 1];
    let value = chunk.constant(index);
    println!(
        "{name:<16} {index:4} '{}'",
        DebugValue { value: &value, heap }
    );
    offset + 2
}
