//! Error handling code
//!
//! Reexports some [`failure`] types, and a `Result<T>` alias like `error_chain` used.
//! Runtime failures are represented by [`ExecutionError`], which pairs an
//! [`ErrorKind`] with the source [`Loc`](crate::ast::Loc) of the offending
//! instruction or node.
use failure::Error;

pub use failure::err_msg;
pub use failure::ResultExt;

use crate::ast::Loc;
use std::fmt;

/// Result for user facing errors.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Classifies an [`ExecutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A `Get` on a name with no binding in the current environment.
    UnknownVariable,
    /// An operator, projection, condition, or callable check failed.
    TypeError,
    /// A function was called with the wrong number of arguments.
    ArityError,
    /// Integer division or remainder by zero.
    DivByZero,
    /// The serialized AST was missing fields or used an unknown `kind`.
    MalformedAst,
    /// An invariant violation inside the compiler or the VM.
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::UnknownVariable => "UnknownVariable",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ArityError => "ArityError",
            ErrorKind::DivByZero => "DivByZero",
            ErrorKind::MalformedAst => "MalformedAst",
            ErrorKind::InternalError => "InternalError",
        };
        write!(f, "{}", name)
    }
}

/// A runtime (or load-time) failure, citing a source location.
///
/// The VM stops at the first `ExecutionError`; there is no recovery. The CLI
/// surfaces the `Display` form on standard error.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "{}: {}: {}", location, kind, message)]
pub struct ExecutionError {
    /// Source span of the offending instruction or node.
    pub location: Loc,
    /// What went wrong, coarsely.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ExecutionError {
    /// Build an error from a kind, a location, and anything stringish.
    pub fn new<S: Into<String>>(kind: ErrorKind, location: Loc, message: S) -> ExecutionError {
        ExecutionError {
            location,
            kind,
            message: message.into(),
        }
    }
}

/// Dig the [`ExecutionError`] out of a (possibly context-wrapped) failure.
pub fn execution_error(e: &Error) -> Option<&ExecutionError> {
    e.find_root_cause().downcast_ref::<ExecutionError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = ExecutionError::new(
            ErrorKind::DivByZero,
            Loc::new(4, 9, "math.rinha"),
            "division by zero",
        );
        assert_eq!(
            format!("{}", e),
            "math.rinha:4-9: DivByZero: division by zero"
        );
    }

    #[test]
    fn test_execution_error_through_context() {
        let e: Error = ExecutionError::new(ErrorKind::TypeError, Loc::default(), "nope").into();
        let wrapped: Error = e.context("While testing").into();

        let found = execution_error(&wrapped).unwrap();
        assert_eq!(found.kind, ErrorKind::TypeError);
    }
}
