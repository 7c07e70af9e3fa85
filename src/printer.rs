//! Render an AST back to source text.
//!
//! A debugging aid, exposed on the CLI as `--ast`. The walk uses an explicit
//! token stack (closing tokens pushed before opening ones) so rendering a
//! deep tree costs heap instead of host call frames.

use crate::ast::{BinaryOp, File, Term};

/// One pending piece of output.
enum Tok<'a> {
    /// A term to render at an indentation level.
    Term(&'a Term, usize),
    /// A fixed fragment of syntax.
    Text(&'static str),
    /// A computed fragment (identifiers, literals, indentation).
    Owned(String),
}

/// Render a whole program.
pub fn render(file: &File) -> String {
    render_term(&file.expression)
}

/// Render a single term.
pub fn render_term(term: &Term) -> String {
    let mut buf = String::new();
    let mut stack = vec![Tok::Term(term, 0)];

    // Newline plus two spaces per level.
    fn indent(level: usize) -> String {
        let mut s = String::with_capacity(1 + level * 2);
        s.push('\n');
        for _ in 0..level {
            s.push_str("  ");
        }
        s
    }

    while let Some(tok) = stack.pop() {
        match tok {
            Tok::Text(s) => buf.push_str(s),
            Tok::Owned(s) => buf.push_str(&s),

            Tok::Term(term, level) => match term {
                Term::Int { value, .. } => buf.push_str(&value.to_string()),
                Term::Str { value, .. } => buf.push_str(&format!("{:?}", value)),
                Term::Bool { value: true, .. } => buf.push_str("true"),
                Term::Bool { value: false, .. } => buf.push_str("false"),
                Term::Var { text, .. } => buf.push_str(text),

                Term::Print { value, .. } => {
                    stack.push(Tok::Text(")"));
                    stack.push(Tok::Term(value, level));
                    stack.push(Tok::Text("print ("));
                }

                Term::First { value, .. } => {
                    stack.push(Tok::Text(")"));
                    stack.push(Tok::Term(value, level));
                    stack.push(Tok::Text("first("));
                }

                Term::Second { value, .. } => {
                    stack.push(Tok::Text(")"));
                    stack.push(Tok::Term(value, level));
                    stack.push(Tok::Text("second("));
                }

                Term::Tuple { first, second, .. } => {
                    stack.push(Tok::Text(")"));
                    stack.push(Tok::Term(second, level));
                    stack.push(Tok::Text(", "));
                    stack.push(Tok::Term(first, level));
                    stack.push(Tok::Text("("));
                }

                Term::Binary { lhs, op, rhs, .. } => {
                    // A child operation binding less tightly than this one
                    // needs parentheses to round-trip.
                    push_operand(&mut stack, rhs, *op, level);
                    stack.push(Tok::Owned(format!(" {} ", op.token())));
                    push_operand(&mut stack, lhs, *op, level);
                }

                Term::Let {
                    name, value, next, ..
                } => {
                    stack.push(Tok::Term(next, level));
                    stack.push(Tok::Owned(indent(level)));
                    stack.push(Tok::Text(";"));
                    stack.push(Tok::Term(value, level));
                    stack.push(Tok::Text(" = "));
                    stack.push(Tok::Owned(name.text.clone()));
                    stack.push(Tok::Text("let "));
                }

                Term::If {
                    condition,
                    then,
                    otherwise,
                    ..
                } => {
                    let l0 = indent(level);
                    let l1 = indent(level + 1);

                    stack.push(Tok::Owned(format!("{}}}", l0)));
                    stack.push(Tok::Term(otherwise, level + 1));
                    stack.push(Tok::Owned(format!("{}}} else {{{}", l0, l1)));
                    stack.push(Tok::Term(then, level + 1));
                    stack.push(Tok::Owned(format!(" {{{}", l1)));
                    stack.push(Tok::Term(condition, level));
                    stack.push(Tok::Text("if "));
                }

                Term::Function {
                    parameters, value, ..
                } => {
                    let l0 = indent(level);
                    let l1 = indent(level + 1);

                    stack.push(Tok::Owned(format!("{}}}", l0)));
                    stack.push(Tok::Term(value, level + 1));
                    stack.push(Tok::Owned(format!(") {{{}", l1)));

                    let names: Vec<&str> =
                        parameters.iter().map(|p| p.text.as_str()).collect();
                    stack.push(Tok::Owned(names.join(", ")));
                    stack.push(Tok::Text("fn ("));
                }

                Term::Call {
                    callee, arguments, ..
                } => {
                    stack.push(Tok::Text(")"));
                    for (idx, arg) in arguments.iter().enumerate().rev() {
                        stack.push(Tok::Term(arg, level));
                        if idx > 0 {
                            stack.push(Tok::Text(", "));
                        }
                    }
                    stack.push(Tok::Text("("));
                    stack.push(Tok::Term(callee, level));
                }
            },
        }
    }

    buf
}

/// Push a binary operand, parenthesized when its precedence is lower than
/// the surrounding operator's.
fn push_operand<'a>(stack: &mut Vec<Tok<'a>>, arg: &'a Term, op: BinaryOp, level: usize) {
    let needs_parens = match arg {
        Term::Binary { op: child, .. } => child.precedence() < op.precedence(),
        _ => false,
    };

    if needs_parens {
        stack.push(Tok::Text(")"));
        stack.push(Tok::Term(arg, level));
        stack.push(Tok::Text("("));
    } else {
        stack.push(Tok::Term(arg, level));
    }
}
