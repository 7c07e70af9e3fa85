//! Bytecode containers and disassembly.

use std::fmt;

use crate::ast::Loc;
use crate::data::Address;
use crate::errors::*;
use crate::vm::op::{Instruction, Op};

/// Holds `Chunk`s of bytecode. See `Bytecode::addr` for its primary use.
///
/// Chunk 0 is the entry chunk; every other chunk is a function body. The
/// compiler guarantees that the entry chunk ends in [`Op::Halt`] and every
/// function chunk ends in [`Op::Proceed`], and that every jump target is a
/// valid index within its own chunk.
#[derive(Clone, PartialEq)]
pub struct Bytecode {
    /// Vec of chunks.
    pub chunks: Vec<Chunk>,
}

/// A `Vec` of instructions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chunk {
    /// Vec of instructions.
    pub instructions: Vec<Instruction>,
}

impl Chunk {
    /// Append an instruction to the chunk.
    pub fn push(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    /// Number of instructions currently in the chunk.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Is the chunk empty?
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Pretty prints the instructions in the chunk to standard out.
    ///
    /// Separates the fields with tabs, prints address, operation, and the
    /// source span the instruction was compiled from.
    pub fn disassemble(&self, chunk_idx: usize) {
        for (instr_idx, instr) in self.instructions.iter().enumerate() {
            let a = (chunk_idx, instr_idx);

            println!("\t{:?}\t{:?}\t{:}", a, instr.op, instr.location);
        }
    }
}

impl fmt::Debug for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Bytecode {{{} chunks}}", self.chunks.len())
    }
}

impl Bytecode {
    /// Create a new bytecode from a double vector of operation/location pairs.
    ///
    /// The 2nd level vectors are converted to chunks. Mostly useful for
    /// hand-assembling code in tests.
    pub fn new(v: Vec<Vec<(Op, Loc)>>) -> Bytecode {
        Bytecode {
            chunks: v
                .into_iter()
                .map(|instrs| Chunk {
                    instructions: instrs
                        .into_iter()
                        .map(|(op, location)| Instruction::new(op, location))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Indexes into the chunks to find the indicated instruction.
    pub fn addr(&self, a: Address) -> Result<Instruction> {
        let chunk = self
            .chunks
            .get(a.0)
            .ok_or_else(|| format_err!("Invalid chunk address: {:?}", a))?;
        let instr = chunk
            .instructions
            .get(a.1)
            .ok_or_else(|| format_err!("Invalid instruction address: {:?}", a))?;
        Ok(instr.clone())
    }

    /// Prints a plain text disassembly of all the chunks to STDOUT.
    pub fn disassemble(&self) {
        for (chunk_idx, chunk) in self.chunks.iter().enumerate() {
            println!("################ CHUNK #{:?} ################", chunk_idx);
            chunk.disassemble(chunk_idx);
        }
    }

    /// Count all instructions in the bytecode.
    pub fn count_ops(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}
