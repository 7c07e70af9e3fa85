//! Compile [`File`](crate::ast::File)s to [`Bytecode`](crate::vm::bytecode::Bytecode).
//!
//! One pass over the AST, driven by an explicit work stack rather than host
//! recursion: the stack holds "compile this term", "emit this instruction",
//! and "patch that jump" items, so a pathologically deep tree costs heap, not
//! host call frames.
//!
//! Each `Function` term gets its own chunk; chunk 0 is the entry chunk and
//! ends with `Halt`, function chunks end with `Proceed`. Jumps are emitted
//! with a placeholder target and patched once the instructions they skip
//! over have been laid down.

use crate::ast::{File, Loc, Term};
use crate::data::{Address, Value};
use crate::errors::*;
use crate::vm::bytecode::{Bytecode, Chunk};
use crate::vm::op::{Instruction, Op};

/// Placeholder jump target, always overwritten before compilation finishes.
const UNPATCHED: usize = ::std::usize::MAX;

/// A unit of pending compilation work.
enum Work<'a> {
    /// Compile a term into a chunk.
    Term { chunk: usize, term: &'a Term },
    /// Emit a finished instruction into a chunk.
    Emit {
        chunk: usize,
        op: Op,
        location: &'a Loc,
    },
    /// Emit a `JumpIfFalse` with a placeholder target, remembering where it
    /// went so a later [`Work::Patch`] can fill the target in.
    Branch {
        chunk: usize,
        hole: usize,
        location: &'a Loc,
    },
    /// Emit a `Jump` with a placeholder target.
    Goto {
        chunk: usize,
        hole: usize,
        location: &'a Loc,
    },
    /// Point the remembered jump at the current end of its chunk.
    Patch { hole: usize },
}

/// Compile a whole program. Infallible on well-formed trees; an `Err` here
/// means a compiler invariant was violated.
pub fn compile(file: &File) -> Result<Bytecode> {
    let mut c = Compiler::default();

    let entry = c.new_chunk();
    c.compile_term(entry, &file.expression)?;
    c.emit(entry, Op::Halt, &file.location);

    Ok(Bytecode { chunks: c.chunks })
}

/// Accumulates chunks and jump holes during a [`compile`] run.
#[derive(Default)]
struct Compiler {
    chunks: Vec<Chunk>,
    /// Address of each emitted-but-unpatched jump, indexed by hole id.
    holes: Vec<Address>,
}

impl Compiler {
    /// Allocate an empty chunk and return its index.
    fn new_chunk(&mut self) -> usize {
        let idx = self.chunks.len();
        self.chunks.push(Chunk::default());
        idx
    }

    /// Reserve a hole id for a jump that will be emitted later.
    fn new_hole(&mut self) -> usize {
        let idx = self.holes.len();
        self.holes.push((UNPATCHED, UNPATCHED));
        idx
    }

    fn emit(&mut self, chunk: usize, op: Op, location: &Loc) {
        self.chunks[chunk].push(Instruction::new(op, location.clone()));
    }

    /// Compile one term (and its whole subtree) into a chunk.
    fn compile_term<'a>(&mut self, chunk: usize, term: &'a Term) -> Result<()> {
        let mut work = vec![Work::Term { chunk, term }];

        while let Some(item) = work.pop() {
            match item {
                Work::Term { chunk, term } => self.expand(chunk, term, &mut work),

                Work::Emit {
                    chunk,
                    op,
                    location,
                } => self.emit(chunk, op, location),

                Work::Branch {
                    chunk,
                    hole,
                    location,
                } => {
                    self.holes[hole] = (chunk, self.chunks[chunk].len());
                    self.emit(chunk, Op::JumpIfFalse(UNPATCHED), location);
                }

                Work::Goto {
                    chunk,
                    hole,
                    location,
                } => {
                    self.holes[hole] = (chunk, self.chunks[chunk].len());
                    self.emit(chunk, Op::Jump(UNPATCHED), location);
                }

                Work::Patch { hole } => self.patch(hole)?,
            }
        }

        Ok(())
    }

    /// Push the work items for a single term, in reverse execution order.
    fn expand<'a>(&mut self, chunk: usize, term: &'a Term, work: &mut Vec<Work<'a>>) {
        match term {
            Term::Int { value, location } => {
                self.emit(chunk, Op::Put(Value::Int(*value)), location)
            }
            Term::Str { value, location } => {
                self.emit(chunk, Op::Put(Value::Str(value.clone())), location)
            }
            Term::Bool { value, location } => {
                self.emit(chunk, Op::Put(Value::Bool(*value)), location)
            }
            Term::Var { text, location } => self.emit(chunk, Op::Get(text.clone()), location),

            Term::Print { value, location } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::Write,
                    location,
                });
                work.push(Work::Term { chunk, term: value });
            }

            Term::Tuple {
                first,
                second,
                location,
            } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::Pair,
                    location,
                });
                work.push(Work::Term {
                    chunk,
                    term: second,
                });
                work.push(Work::Term { chunk, term: first });
            }

            Term::First { value, location } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::First,
                    location,
                });
                work.push(Work::Term { chunk, term: value });
            }

            Term::Second { value, location } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::Second,
                    location,
                });
                work.push(Work::Term { chunk, term: value });
            }

            Term::Binary {
                lhs,
                op,
                rhs,
                location,
            } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::Operation(*op),
                    location,
                });
                work.push(Work::Term { chunk, term: rhs });
                work.push(Work::Term { chunk, term: lhs });
            }

            Term::If {
                condition,
                then,
                otherwise,
                location,
            } => {
                // cond; JumpIfFalse(otherwise); then; Jump(end); otherwise
                let to_otherwise = self.new_hole();
                let to_end = self.new_hole();

                work.push(Work::Patch { hole: to_end });
                work.push(Work::Term {
                    chunk,
                    term: otherwise,
                });
                work.push(Work::Patch { hole: to_otherwise });
                work.push(Work::Goto {
                    chunk,
                    hole: to_end,
                    location,
                });
                work.push(Work::Term { chunk, term: then });
                work.push(Work::Branch {
                    chunk,
                    hole: to_otherwise,
                    location,
                });
                work.push(Work::Term {
                    chunk,
                    term: condition,
                });
            }

            Term::Let {
                name,
                value,
                next,
                location,
            } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::Deallocate,
                    location,
                });
                work.push(Work::Term { chunk, term: next });
                work.push(Work::Emit {
                    chunk,
                    op: Op::LetAllocate(name.text.clone()),
                    location,
                });
                work.push(Work::Term { chunk, term: value });
            }

            Term::Function {
                parameters,
                value,
                location,
            } => {
                let fn_chunk = self.new_chunk();
                let params = parameters.iter().map(|p| p.text.clone()).collect();

                work.push(Work::Emit {
                    chunk: fn_chunk,
                    op: Op::Proceed,
                    location,
                });
                work.push(Work::Emit {
                    chunk: fn_chunk,
                    op: Op::Deallocate,
                    location,
                });
                work.push(Work::Term {
                    chunk: fn_chunk,
                    term: value,
                });
                work.push(Work::Emit {
                    chunk: fn_chunk,
                    op: Op::Allocate(params),
                    location,
                });

                self.emit(chunk, Op::CloseOver(fn_chunk), location);
            }

            Term::Call {
                callee,
                arguments,
                location,
            } => {
                work.push(Work::Emit {
                    chunk,
                    op: Op::Invoke(arguments.len()),
                    location,
                });
                work.push(Work::Term {
                    chunk,
                    term: callee,
                });
                for arg in arguments.iter().rev() {
                    work.push(Work::Term { chunk, term: arg });
                }
            }
        }
    }

    /// Resolve a hole: point the jump recorded there at the instruction that
    /// will be emitted next in its chunk.
    fn patch(&mut self, hole: usize) -> Result<()> {
        let (chunk, at) = self.holes[hole];
        let target = self.chunks[chunk].len();

        let instr = self.chunks[chunk]
            .instructions
            .get_mut(at)
            .ok_or_else(|| {
                ExecutionError::new(
                    ErrorKind::InternalError,
                    Loc::default(),
                    format!("jump patch out of range: ({}, {})", chunk, at),
                )
            })?;

        match &mut instr.op {
            Op::Jump(t) | Op::JumpIfFalse(t) => {
                *t = target;
                Ok(())
            }
            other => Err(ExecutionError::new(
                ErrorKind::InternalError,
                instr.location.clone(),
                format!("jump patch hit a {:?}", other),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Parameter};
    use std::rc::Rc;

    fn int(n: i64) -> Term {
        Term::Int {
            value: n,
            location: Loc::default(),
        }
    }

    fn var(name: &str) -> Term {
        Term::Var {
            text: name.to_string(),
            location: Loc::default(),
        }
    }

    fn file(expression: Term) -> File {
        File {
            name: "test.rinha".to_string(),
            expression,
            location: Loc::default(),
        }
    }

    fn ops(chunk: &Chunk) -> Vec<Op> {
        chunk.instructions.iter().map(|i| i.op.clone()).collect()
    }

    #[test]
    fn test_compile_literal() {
        let code = compile(&file(int(7))).unwrap();

        assert_eq!(code.chunks.len(), 1);
        assert_eq!(
            ops(&code.chunks[0]),
            vec![Op::Put(Value::Int(7)), Op::Halt]
        );
    }

    #[test]
    fn test_compile_binary() {
        let term = Term::Binary {
            lhs: Rc::new(int(1)),
            op: BinaryOp::Add,
            rhs: Rc::new(int(2)),
            location: Loc::default(),
        };

        let code = compile(&file(term)).unwrap();

        assert_eq!(
            ops(&code.chunks[0]),
            vec![
                Op::Put(Value::Int(1)),
                Op::Put(Value::Int(2)),
                Op::Operation(BinaryOp::Add),
                Op::Halt,
            ]
        );
    }

    #[test]
    fn test_compile_if_patches_jumps() {
        let term = Term::If {
            condition: Term::Bool {
                value: true,
                location: Loc::default(),
            }
            .into(),
            then: Rc::new(int(1)),
            otherwise: Rc::new(int(2)),
            location: Loc::default(),
        };

        let code = compile(&file(term)).unwrap();

        // cond, jmpf(4), then, jmp(5), otherwise, halt
        assert_eq!(
            ops(&code.chunks[0]),
            vec![
                Op::Put(Value::Bool(true)),
                Op::JumpIfFalse(4),
                Op::Put(Value::Int(1)),
                Op::Jump(5),
                Op::Put(Value::Int(2)),
                Op::Halt,
            ]
        );
    }

    #[test]
    fn test_compile_let() {
        let term = Term::Let {
            name: Parameter {
                text: "x".to_string(),
                location: Loc::default(),
            },
            value: Rc::new(int(10)),
            next: Rc::new(var("x")),
            location: Loc::default(),
        };

        let code = compile(&file(term)).unwrap();

        assert_eq!(
            ops(&code.chunks[0]),
            vec![
                Op::Put(Value::Int(10)),
                Op::LetAllocate("x".to_string()),
                Op::Get("x".to_string()),
                Op::Deallocate,
                Op::Halt,
            ]
        );
    }

    #[test]
    fn test_compile_function_and_call() {
        // (fn (a) => a)(5)
        let function = Term::Function {
            parameters: vec![Parameter {
                text: "a".to_string(),
                location: Loc::default(),
            }],
            value: Rc::new(var("a")),
            location: Loc::default(),
        };
        let term = Term::Call {
            callee: Rc::new(function),
            arguments: vec![int(5)],
            location: Loc::default(),
        };

        let code = compile(&file(term)).unwrap();

        assert_eq!(code.chunks.len(), 2);
        assert_eq!(
            ops(&code.chunks[0]),
            vec![
                Op::Put(Value::Int(5)),
                Op::CloseOver(1),
                Op::Invoke(1),
                Op::Halt,
            ]
        );
        assert_eq!(
            ops(&code.chunks[1]),
            vec![
                Op::Allocate(vec!["a".to_string()]),
                Op::Get("a".to_string()),
                Op::Deallocate,
                Op::Proceed,
            ]
        );
    }

    #[test]
    fn test_chunk_terminators() {
        let function = Term::Function {
            parameters: vec![],
            value: Rc::new(int(0)),
            location: Loc::default(),
        };
        let term = Term::Call {
            callee: Rc::new(function),
            arguments: vec![],
            location: Loc::default(),
        };

        let code = compile(&file(term)).unwrap();

        assert_eq!(code.chunks[0].instructions.last().unwrap().op, Op::Halt);
        for chunk in &code.chunks[1..] {
            assert_eq!(chunk.instructions.last().unwrap().op, Op::Proceed);
        }
    }

    #[test]
    fn test_compile_deep_tree() {
        // 1 + 1 + 1 + ... nested 10,000 levels deep.
        let mut term = int(1);
        for _ in 0..10_000 {
            term = Term::Binary {
                lhs: Rc::new(term),
                op: BinaryOp::Add,
                rhs: Rc::new(int(1)),
                location: Loc::default(),
            };
        }

        let code = compile(&file(term)).unwrap();

        // 10,001 Puts, 10,000 Operations, 1 Halt.
        assert_eq!(code.count_ops(), 20_002);
    }

    #[test]
    fn test_no_unpatched_jumps() {
        let mut term = int(0);
        for i in 0..50 {
            term = Term::If {
                condition: Term::Bool {
                    value: i % 2 == 0,
                    location: Loc::default(),
                }
                .into(),
                then: Rc::new(term),
                otherwise: Rc::new(int(i)),
                location: Loc::default(),
            };
        }

        let code = compile(&file(term)).unwrap();

        for chunk in &code.chunks {
            for instr in &chunk.instructions {
                match instr.op {
                    Op::Jump(t) | Op::JumpIfFalse(t) => {
                        assert!(t < chunk.len(), "unpatched or out of range jump")
                    }
                    _ => {}
                }
            }
        }
    }
}
