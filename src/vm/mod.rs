//! Bytecode definition and VM for bytecode execution.

pub mod bytecode;
pub mod op;

#[cfg(test)]
mod tests;

use std::fmt;
use std::io;
use std::io::Write;

use crate::ast::{BinaryOp, Loc};
use crate::data::{address_inc, Address, Symbol, Value};
use crate::env::EnvStack;
use crate::errors::*;
use crate::ops::apply_op;
use crate::vm::bytecode::Bytecode;
use crate::vm::op::{Instruction, Op};

/// What the dispatch loop should do after executing an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Advance to the next instruction in the current chunk.
    Advance,
    /// Transfer control to an explicit address.
    Goto(Address),
    /// Stop executing; the program is done.
    Halted,
}

/// A pending return on the call stack.
///
/// `arity` records how many arguments the call site pushed, so the callee's
/// leading [`Op::Allocate`] can detect a mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    /// Where to resume when the callee proceeds.
    pub ret: Address,
    /// Number of arguments supplied at the call site.
    pub arity: usize,
}

/// A non-reusable bytecode VM.
///
/// Keeps track of the operand stack, the environment stack, the call stack,
/// and the code. Program output goes to an injectable sink so callers (and
/// tests) can capture what the guest prints.
pub struct VM {
    /// The live code repo.
    pub code: Bytecode,
    /// The operand stack.
    pub stack: Vec<Value>,
    /// The current local environment bindings, innermost on top.
    pub environment: EnvStack,
    /// Pending returns, one per active call.
    pub call_stack: Vec<CallFrame>,
    /// Print every executed instruction to stderr.
    pub trace: bool,
    output: Box<dyn Write>,
}

impl fmt::Debug for VM {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VM")
            .field("code", &self.code)
            .field("stack", &self.stack)
            .field("environment", &self.environment)
            .field("call_stack", &self.call_stack)
            .finish()
    }
}

impl VM {
    /// Create a VM loaded with the provided code, printing to standard out.
    pub fn new(code: Bytecode) -> VM {
        VM::with_output(code, Box::new(io::stdout()))
    }

    /// Create a VM that writes guest output to an arbitrary sink.
    pub fn with_output(code: Bytecode, output: Box<dyn Write>) -> VM {
        VM {
            code,
            stack: vec![],
            environment: EnvStack::new(),
            call_stack: vec![],
            trace: false,
            output,
        }
    }

    /// Run the loaded code from the entry chunk until `Halt`, returning the
    /// value of the top level expression.
    ///
    /// Execution state is reset first, so a `VM` can run its program again.
    /// Every guest construct is handled iteratively here; the host stack
    /// stays flat no matter how deep the guest program or its recursion is.
    pub fn run(&mut self) -> Result<Value> {
        self.stack.clear();
        self.environment = EnvStack::new();
        self.call_stack.clear();

        let mut ip: Address = (0, 0);

        loop {
            let instr = self.code.addr(ip)?;

            if self.trace {
                eprintln!("{:?}\t{:?}\tstack {:}", ip, instr.op, self.stack.len());
            }

            let step = self
                .execute(ip, &instr)
                .with_context(|_| format_err!("While executing at {:?}", ip))?;

            match step {
                Step::Advance => address_inc(&mut ip),
                Step::Goto(a) => ip = a,
                Step::Halted => break,
            }
        }

        self.stack
            .pop()
            .ok_or_else(|| err_msg("Halted with an empty operand stack"))
    }

    /// Execute a single instruction. Returns what the dispatch loop should
    /// do next, or an `Err` if execution must stop. See `fn op_*` for the
    /// raw implementations and [`Op`] for high level descriptions.
    pub fn execute(&mut self, ip: Address, instr: &Instruction) -> Result<Step> {
        let loc = &instr.location;

        match &instr.op {
            Op::Put(v) => self.op_put(v),
            Op::Get(name) => self.op_get(name, loc),
            Op::Write => self.op_write(),
            Op::Operation(binop) => self.op_operation(*binop, loc),
            Op::JumpIfFalse(target) => self.op_jump_if_false(*target, ip, loc),
            Op::Jump(target) => Ok(Step::Goto((ip.0, *target))),
            Op::Allocate(names) => self.op_allocate(names, loc),
            Op::LetAllocate(name) => self.op_let_allocate(name),
            Op::Deallocate => self.op_deallocate(),
            Op::CloseOver(chunk) => self.op_close_over(*chunk),
            Op::Invoke(arity) => self.op_invoke(*arity, ip, loc),
            Op::Proceed => self.op_proceed(),
            Op::Halt => Ok(Step::Halted),
            Op::Pair => self.op_pair(),
            Op::First => self.op_first(loc),
            Op::Second => self.op_second(loc),
        }
    }

    fn pop(&mut self, what: &str) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| format_err!("Attempted to pop empty stack for {:}", what))
    }

    fn op_put(&mut self, v: &Value) -> Result<Step> {
        self.stack.push(v.clone());
        Ok(Step::Advance)
    }

    fn op_get(&mut self, name: &str, loc: &Loc) -> Result<Step> {
        let value = self.environment.peek()?.get(name).cloned();

        match value {
            Some(v) => {
                self.stack.push(v);
                Ok(Step::Advance)
            }
            None => Err(ExecutionError::new(
                ErrorKind::UnknownVariable,
                loc.clone(),
                format!("unknown variable '{}'", name),
            )
            .into()),
        }
    }

    fn op_write(&mut self) -> Result<Step> {
        let v = self
            .stack
            .last()
            .ok_or_else(|| err_msg("Attempted to write from an empty stack"))?;

        writeln!(self.output, "{}", v)?;

        Ok(Step::Advance)
    }

    fn op_operation(&mut self, binop: BinaryOp, loc: &Loc) -> Result<Step> {
        let rhs = self.pop("operation rhs")?;
        let lhs = self.pop("operation lhs")?;

        self.stack.push(apply_op(lhs, binop, rhs, loc)?);

        Ok(Step::Advance)
    }

    fn op_jump_if_false(&mut self, target: usize, ip: Address, loc: &Loc) -> Result<Step> {
        let cond = self.pop("conditional jump")?;

        match cond {
            Value::Bool(true) => Ok(Step::Advance),
            Value::Bool(false) => Ok(Step::Goto((ip.0, target))),
            v => Err(ExecutionError::new(
                ErrorKind::TypeError,
                loc.clone(),
                format!("'if' condition is {}, not bool", v.kind_name()),
            )
            .into()),
        }
    }

    fn op_allocate(&mut self, names: &[Symbol], loc: &Loc) -> Result<Step> {
        let expected = names.len();

        if let Some(frame) = self.call_stack.last() {
            if frame.arity != expected {
                return Err(ExecutionError::new(
                    ErrorKind::ArityError,
                    loc.clone(),
                    format!(
                        "called with {} arguments (expecting {})",
                        frame.arity, expected
                    ),
                )
                .into());
            }
        }

        if self.stack.len() < expected {
            return Err(err_msg("Operand stack underflow allocating parameters"));
        }

        let values = self.stack.split_off(self.stack.len() - expected);
        let bindings = names.iter().cloned().zip(values);

        let env = self.environment.peek()?.with_values(bindings);
        self.environment.push(env);

        Ok(Step::Advance)
    }

    fn op_let_allocate(&mut self, name: &str) -> Result<Step> {
        let value = self.pop("let binding")?;

        let env = self
            .environment
            .peek()?
            .with_values(Some((name.to_string(), value.clone())));

        // A closure bound by `let` closes over the environment that contains
        // its own binding, enabling direct recursion. The closure was built
        // on the previous instruction and has no other holder yet, so the
        // replacement is unobservable.
        if let Value::Closure(closure) = &value {
            closure.borrow_mut().env = env.clone();
        }

        self.environment.push(env);

        Ok(Step::Advance)
    }

    fn op_deallocate(&mut self) -> Result<Step> {
        self.environment.pop()?;
        Ok(Step::Advance)
    }

    fn op_close_over(&mut self, chunk: usize) -> Result<Step> {
        let env = self.environment.peek()?.clone();
        self.stack.push(Value::close_over(chunk, env));
        Ok(Step::Advance)
    }

    fn op_invoke(&mut self, arity: usize, ip: Address, loc: &Loc) -> Result<Step> {
        let callee = self.pop("callee")?;

        let closure = match callee {
            Value::Closure(c) => c,
            v => {
                return Err(ExecutionError::new(
                    ErrorKind::TypeError,
                    loc.clone(),
                    format!("callee is not callable: {}", v.kind_name()),
                )
                .into());
            }
        };

        self.call_stack.push(CallFrame {
            ret: (ip.0, ip.1 + 1),
            arity,
        });

        let (chunk, env) = {
            let c = closure.borrow();
            (c.chunk, c.env.clone())
        };
        self.environment.push(env);

        Ok(Step::Goto((chunk, 0)))
    }

    fn op_proceed(&mut self) -> Result<Step> {
        self.environment.pop()?;

        let frame = self
            .call_stack
            .pop()
            .ok_or_else(|| err_msg("Attempted to proceed with an empty call stack"))?;

        Ok(Step::Goto(frame.ret))
    }

    fn op_pair(&mut self) -> Result<Step> {
        let second = self.pop("pair second")?;
        let first = self.pop("pair first")?;

        self.stack.push(Value::pair(first, second));

        Ok(Step::Advance)
    }

    fn op_first(&mut self, loc: &Loc) -> Result<Step> {
        let v = self.pop("first")?;

        match v {
            Value::Pair(p) => {
                self.stack.push(p.0.clone());
                Ok(Step::Advance)
            }
            v => Err(ExecutionError::new(
                ErrorKind::TypeError,
                loc.clone(),
                format!("argument to 'first' is {}, not a tuple", v.kind_name()),
            )
            .into()),
        }
    }

    fn op_second(&mut self, loc: &Loc) -> Result<Step> {
        let v = self.pop("second")?;

        match v {
            Value::Pair(p) => {
                self.stack.push(p.1.clone());
                Ok(Step::Advance)
            }
            v => Err(ExecutionError::new(
                ErrorKind::TypeError,
                loc.clone(),
                format!("argument to 'second' is {}, not a tuple", v.kind_name()),
            )
            .into()),
        }
    }
}
