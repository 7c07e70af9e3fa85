//! Deserialize a JSON-encoded AST into a [`File`](crate::ast::File).
//!
//! ASTs arrive as arbitrarily deep trees, so both halves of loading avoid
//! host recursion proportional to input depth: the JSON text is parsed with
//! [`serde_json`]'s recursion limit disabled (growing a side stack through
//! [`serde_stacker`] instead), and the resulting [`serde_json::Value`] is
//! converted to typed terms by an explicit build/assemble work stack.
//!
//! Node objects carry a `kind` field naming the term variant; both `kind`
//! and binary operator names are matched case-insensitively.

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use std::fs;
use std::path::Path;

use crate::ast::{BinaryOp, File, Loc, Parameter, Term};
use crate::errors::*;

/// Load and parse an AST file from disk.
pub fn load_path(path: &Path) -> Result<File> {
    let text = fs::read_to_string(path)
        .with_context(|_| format_err!("While reading {:?}", path))?;
    parse_ast(&text)
}

/// Parse a serialized AST document.
pub fn parse_ast(text: &str) -> Result<File> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let de = serde_stacker::Deserializer::new(&mut de);
    let json = Json::deserialize(de).context("While parsing AST JSON")?;

    file_from_json(&json)
}

/// Convert the document root.
pub fn file_from_json(json: &Json) -> Result<File> {
    let obj = expect_object(json, &Loc::default())?;
    let location = loc_field(obj, &Loc::default())?;

    let name = obj
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed(&location, "file has no 'name'"))?
        .to_string();

    let expression = term_from_json(
        obj.get("expression")
            .ok_or_else(|| malformed(&location, "file has no 'expression'"))?,
    )?;

    Ok(File {
        name,
        expression,
        location,
    })
}

fn malformed(location: &Loc, message: &str) -> failure::Error {
    ExecutionError::new(ErrorKind::MalformedAst, location.clone(), message).into()
}

fn expect_object<'a>(json: &'a Json, location: &Loc) -> Result<&'a Map<String, Json>> {
    json.as_object()
        .ok_or_else(|| malformed(location, "AST node is not an object"))
}

/// Read and validate a node's `location` field.
fn loc_field(obj: &Map<String, Json>, fallback: &Loc) -> Result<Loc> {
    let raw = obj
        .get("location")
        .ok_or_else(|| malformed(fallback, "node has no 'location'"))?;

    let loc: Loc = serde_json::from_value(raw.clone())
        .map_err(|e| malformed(fallback, &format!("bad location: {}", e)))?;

    if loc.end < loc.start {
        return Err(malformed(&loc, "location ends before it starts"));
    }

    Ok(loc)
}

fn str_field<'a>(obj: &'a Map<String, Json>, name: &str, location: &Loc) -> Result<&'a str> {
    obj.get(name)
        .and_then(Json::as_str)
        .ok_or_else(|| malformed(location, &format!("missing string field '{}'", name)))
}

fn child<'a>(obj: &'a Map<String, Json>, name: &str, location: &Loc) -> Result<&'a Json> {
    obj.get(name)
        .ok_or_else(|| malformed(location, &format!("missing field '{}'", name)))
}

fn parameter(json: &Json, location: &Loc) -> Result<Parameter> {
    serde_json::from_value(json.clone())
        .map_err(|e| malformed(location, &format!("bad parameter: {}", e)))
}

/// The term variants, as named by `kind`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Int,
    Str,
    Bool,
    Var,
    Tuple,
    First,
    Second,
    Print,
    If,
    Binary,
    Let,
    Function,
    Call,
}

impl Kind {
    fn from_name(name: &str) -> Option<Kind> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "int" => Kind::Int,
            "str" => Kind::Str,
            "bool" => Kind::Bool,
            "var" => Kind::Var,
            "tuple" => Kind::Tuple,
            "first" => Kind::First,
            "second" => Kind::Second,
            "print" => Kind::Print,
            "if" => Kind::If,
            "binary" => Kind::Binary,
            "let" => Kind::Let,
            "function" => Kind::Function,
            "call" => Kind::Call,
            _ => return None,
        };
        Some(kind)
    }

    /// Names of the term-valued children, in build order. `Call` appends its
    /// arguments after these.
    fn children(self) -> &'static [&'static str] {
        match self {
            Kind::Int | Kind::Str | Kind::Bool | Kind::Var => &[],
            Kind::Tuple => &["first", "second"],
            Kind::First | Kind::Second | Kind::Print => &["value"],
            Kind::If => &["condition", "then", "otherwise"],
            Kind::Binary => &["lhs", "rhs"],
            Kind::Let => &["value", "next"],
            Kind::Function => &["value"],
            Kind::Call => &["callee"],
        }
    }
}

/// One item of pending conversion work.
enum Task<'a> {
    /// Examine a JSON node; either push its term directly (leaves) or queue
    /// an `Assemble` plus `Build`s for its children.
    Build(&'a Json),
    /// Pop this node's finished children from the output stack and push the
    /// assembled term.
    Assemble {
        obj: &'a Map<String, Json>,
        kind: Kind,
        location: Loc,
    },
}

/// Convert one JSON term (and its whole subtree).
pub fn term_from_json(json: &Json) -> Result<Term> {
    let mut tasks = vec![Task::Build(json)];
    let mut out: Vec<Term> = vec![];

    while let Some(task) = tasks.pop() {
        match task {
            Task::Build(json) => {
                let obj = expect_object(json, &Loc::default())?;
                let location = loc_field(obj, &Loc::default())?;

                let kind_name = str_field(obj, "kind", &location)?;
                let kind = Kind::from_name(kind_name)
                    .ok_or_else(|| malformed(&location, &format!("unknown kind '{}'", kind_name)))?;

                if let Some(leaf) = build_leaf(obj, kind, &location)? {
                    out.push(leaf);
                    continue;
                }

                // Queue children so the first one is built first; Assemble
                // then finds them on top of the output stack in order.
                let mut children: Vec<&Json> = vec![];
                for name in kind.children() {
                    children.push(child(obj, name, &location)?);
                }
                if kind == Kind::Call {
                    let args = child(obj, "arguments", &location)?
                        .as_array()
                        .ok_or_else(|| malformed(&location, "'arguments' is not a list"))?;
                    children.extend(args.iter());
                }

                tasks.push(Task::Assemble {
                    obj,
                    kind,
                    location,
                });
                for json in children.into_iter().rev() {
                    tasks.push(Task::Build(json));
                }
            }

            Task::Assemble {
                obj,
                kind,
                location,
            } => {
                let term = assemble(obj, kind, location, &mut out)?;
                out.push(term);
            }
        }
    }

    out.pop()
        .ok_or_else(|| err_msg("Term conversion finished with an empty output stack"))
}

/// Build a childless term directly, or return `None` for composite kinds.
fn build_leaf(obj: &Map<String, Json>, kind: Kind, location: &Loc) -> Result<Option<Term>> {
    let term = match kind {
        Kind::Int => {
            let value = child(obj, "value", location)?
                .as_i64()
                .ok_or_else(|| malformed(location, "int 'value' is not an integer"))?;
            Term::Int {
                value,
                location: location.clone(),
            }
        }
        Kind::Str => {
            let value = str_field(obj, "value", location)?.to_string();
            Term::Str {
                value,
                location: location.clone(),
            }
        }
        Kind::Bool => {
            let value = child(obj, "value", location)?
                .as_bool()
                .ok_or_else(|| malformed(location, "bool 'value' is not a boolean"))?;
            Term::Bool {
                value,
                location: location.clone(),
            }
        }
        Kind::Var => {
            let text = str_field(obj, "text", location)?.to_string();
            Term::Var {
                text,
                location: location.clone(),
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(term))
}

/// Pop the finished children for `kind` off the output stack (they sit there
/// in build order, last child on top) and construct the term.
fn assemble(
    obj: &Map<String, Json>,
    kind: Kind,
    location: Loc,
    out: &mut Vec<Term>,
) -> Result<Term> {
    let mut pop = |what: &str| {
        out.pop()
            .ok_or_else(|| format_err!("Output stack underflow assembling {:}", what))
    };

    let term = match kind {
        Kind::Tuple => {
            let second = pop("tuple second")?;
            let first = pop("tuple first")?;
            Term::Tuple {
                first: first.into(),
                second: second.into(),
                location,
            }
        }

        Kind::First => Term::First {
            value: pop("first")?.into(),
            location,
        },
        Kind::Second => Term::Second {
            value: pop("second")?.into(),
            location,
        },
        Kind::Print => Term::Print {
            value: pop("print")?.into(),
            location,
        },

        Kind::If => {
            let otherwise = pop("if otherwise")?;
            let then = pop("if then")?;
            let condition = pop("if condition")?;
            Term::If {
                condition: condition.into(),
                then: then.into(),
                otherwise: otherwise.into(),
                location,
            }
        }

        Kind::Binary => {
            let rhs = pop("binary rhs")?;
            let lhs = pop("binary lhs")?;
            let op_name = str_field(obj, "op", &location)?;
            let op = BinaryOp::from_name(op_name)
                .ok_or_else(|| malformed(&location, &format!("unknown operator '{}'", op_name)))?;
            Term::Binary {
                lhs: lhs.into(),
                op,
                rhs: rhs.into(),
                location,
            }
        }

        Kind::Let => {
            let next = pop("let next")?;
            let value = pop("let value")?;
            let name = parameter(child(obj, "name", &location)?, &location)?;
            Term::Let {
                name,
                value: value.into(),
                next: next.into(),
                location,
            }
        }

        Kind::Function => {
            let value = pop("function body")?;
            let raw_params = child(obj, "parameters", &location)?
                .as_array()
                .ok_or_else(|| malformed(&location, "'parameters' is not a list"))?;
            let parameters = raw_params
                .iter()
                .map(|p| parameter(p, &location))
                .collect::<Result<Vec<Parameter>>>()?;
            Term::Function {
                parameters,
                value: value.into(),
                location,
            }
        }

        Kind::Call => {
            let argc = child(obj, "arguments", &location)?
                .as_array()
                .map(Vec::len)
                .unwrap_or(0);
            let mut arguments = Vec::with_capacity(argc);
            for _ in 0..argc {
                arguments.push(pop("call argument")?);
            }
            arguments.reverse();
            let callee = pop("call callee")?;
            Term::Call {
                callee: callee.into(),
                arguments,
                location,
            }
        }

        Kind::Int | Kind::Str | Kind::Bool | Kind::Var => {
            return Err(malformed(&location, "leaf kind reached assembly"));
        }
    };

    Ok(term)
}
