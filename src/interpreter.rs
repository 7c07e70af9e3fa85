//! Tree-walking reference evaluator.
//!
//! Evaluates the AST directly, without compiling it. This is the semantics
//! the bytecode engine is measured against in tests; it is deliberately the
//! simplest possible rendition and recurses on the host stack, so it is only
//! suitable for shallow programs. The VM is the production engine.
//!
//! Closures reuse [`Value::Closure`], whose code reference is an index; here
//! the index points into the evaluator's own registry of function terms
//! instead of a bytecode chunk table.

use std::io::Write;
use std::rc::Rc;

use crate::ast::{File, Parameter, Term};
use crate::data::Value;
use crate::env::Env;
use crate::errors::*;
use crate::ops::apply_op;

/// Evaluate a whole program in an empty environment, writing `print` output
/// to the given sink. Returns the value of the top level expression.
pub fn run_file(file: &File, output: &mut dyn Write) -> Result<Value> {
    let mut terp = Interpreter::new(output);
    terp.evaluate(&Env::new(), &file.expression)
}

/// Direct AST evaluator with a registry of the function terms its closures
/// point at.
struct Interpreter<'w> {
    functions: Vec<(Vec<Parameter>, Rc<Term>)>,
    output: &'w mut dyn Write,
}

impl<'w> Interpreter<'w> {
    fn new(output: &'w mut dyn Write) -> Interpreter<'w> {
        Interpreter {
            functions: vec![],
            output,
        }
    }

    /// Obtain the value of a term in an environment.
    fn evaluate(&mut self, env: &Env, term: &Term) -> Result<Value> {
        match term {
            Term::Int { value, .. } => Ok(Value::Int(*value)),
            Term::Str { value, .. } => Ok(Value::Str(value.clone())),
            Term::Bool { value, .. } => Ok(Value::Bool(*value)),

            Term::Var { text, location } => match env.get(text) {
                Some(v) => Ok(v.clone()),
                None => Err(ExecutionError::new(
                    ErrorKind::UnknownVariable,
                    location.clone(),
                    format!("unknown variable '{}'", text),
                )
                .into()),
            },

            Term::Tuple { first, second, .. } => {
                let first = self.evaluate(env, first)?;
                let second = self.evaluate(env, second)?;
                Ok(Value::pair(first, second))
            }

            Term::First { value, location } => match self.evaluate(env, value)? {
                Value::Pair(p) => Ok(p.0.clone()),
                v => Err(ExecutionError::new(
                    ErrorKind::TypeError,
                    location.clone(),
                    format!("argument to 'first' is {}, not a tuple", v.kind_name()),
                )
                .into()),
            },

            Term::Second { value, location } => match self.evaluate(env, value)? {
                Value::Pair(p) => Ok(p.1.clone()),
                v => Err(ExecutionError::new(
                    ErrorKind::TypeError,
                    location.clone(),
                    format!("argument to 'second' is {}, not a tuple", v.kind_name()),
                )
                .into()),
            },

            Term::Print { value, .. } => {
                let v = self.evaluate(env, value)?;
                writeln!(self.output, "{}", v)?;
                Ok(v)
            }

            Term::If {
                condition,
                then,
                otherwise,
                location,
            } => match self.evaluate(env, condition)? {
                Value::Bool(true) => self.evaluate(env, then),
                Value::Bool(false) => self.evaluate(env, otherwise),
                v => Err(ExecutionError::new(
                    ErrorKind::TypeError,
                    location.clone(),
                    format!("'if' condition is {}, not bool", v.kind_name()),
                )
                .into()),
            },

            Term::Binary {
                lhs,
                op,
                rhs,
                location,
            } => {
                let lhs = self.evaluate(env, lhs)?;
                let rhs = self.evaluate(env, rhs)?;
                apply_op(lhs, *op, rhs, location)
            }

            Term::Function {
                parameters, value, ..
            } => {
                let idx = self.functions.len();
                self.functions.push((parameters.clone(), value.clone()));
                Ok(Value::close_over(idx, env.clone()))
            }

            Term::Let {
                name, value, next, ..
            } => {
                let v = self.evaluate(env, value)?;
                let next_env = env.with_values(Some((name.text.clone(), v.clone())));

                // Same back-patch as the VM's LetAllocate: a closure bound
                // by `let` sees its own binding.
                if let Value::Closure(closure) = &v {
                    closure.borrow_mut().env = next_env.clone();
                }

                self.evaluate(&next_env, next)
            }

            Term::Call {
                callee,
                arguments,
                location,
            } => {
                let f = self.evaluate(env, callee)?;

                let closure = match &f {
                    Value::Closure(c) => c.clone(),
                    v => {
                        return Err(ExecutionError::new(
                            ErrorKind::TypeError,
                            location.clone(),
                            format!("callee is not callable: {}", v.kind_name()),
                        )
                        .into());
                    }
                };

                let (idx, captured) = {
                    let c = closure.borrow();
                    (c.chunk, c.env.clone())
                };
                let (parameters, body) = self
                    .functions
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| format_err!("No function registered at index {:}", idx))?;

                if arguments.len() != parameters.len() {
                    return Err(ExecutionError::new(
                        ErrorKind::ArityError,
                        location.clone(),
                        format!(
                            "called with {} arguments (expecting {})",
                            arguments.len(),
                            parameters.len()
                        ),
                    )
                    .into());
                }

                let mut bindings = Vec::with_capacity(arguments.len());
                for (param, arg) in parameters.iter().zip(arguments) {
                    bindings.push((param.text.clone(), self.evaluate(env, arg)?));
                }

                let call_env = captured.with_values(bindings);
                self.evaluate(&call_env, &body)
            }
        }
    }
}
