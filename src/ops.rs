//! Binary operator semantics.
//!
//! A single pure function, [`apply_op`], implements every operator of the
//! language. It is long and repetitive on purpose: each (operator, operand
//! kinds) combination is its own match arm, which is slower to write and much
//! faster to read than a table of function pointers.

use failure::Error;

use crate::ast::{BinaryOp, Loc};
use crate::data::Value;
use crate::errors::*;

/// Floor division: the quotient is rounded toward negative infinity.
///
/// Rust's `/` truncates toward zero, so the quotient needs a correction when
/// the remainder is nonzero and the operands disagree in sign. Arithmetic
/// wraps on overflow.
fn floor_div(lhs: i64, rhs: i64) -> i64 {
    let q = lhs.wrapping_div(rhs);
    let r = lhs.wrapping_rem(rhs);
    if r != 0 && (r < 0) != (rhs < 0) {
        q.wrapping_sub(1)
    } else {
        q
    }
}

/// The remainder matching [`floor_div`]: same sign as the divisor, and
/// `floor_div(a, b) * b + floor_rem(a, b) == a`.
fn floor_rem(lhs: i64, rhs: i64) -> i64 {
    let r = lhs.wrapping_rem(rhs);
    if r != 0 && (r < 0) != (rhs < 0) {
        r.wrapping_add(rhs)
    } else {
        r
    }
}

/// Apply a binary operator to two evaluated operands.
///
/// Both operands must be literals. `Add` concatenates as soon as either side
/// is a string (integers are rendered base-10); the other arithmetic and
/// comparison operators are integer-only; `Eq`/`Neq` require both operands
/// to carry the same kind of data and compare structurally; `And`/`Or` are
/// boolean-only. Short-circuiting is not observable because the operands
/// were evaluated before this call.
pub fn apply_op(lhs: Value, op: BinaryOp, rhs: Value, location: &Loc) -> Result<Value> {
    use crate::ast::BinaryOp::*;
    use crate::data::Value::*;

    let fail = |lhs: &Value, rhs: &Value| -> Error {
        ExecutionError::new(
            ErrorKind::TypeError,
            location.clone(),
            format!("Invalid operands for '{}': {}, {}", op.token(), lhs, rhs),
        )
        .into()
    };

    if lhs.is_closure() || rhs.is_closure() {
        return Err(fail(&lhs, &rhs));
    }

    let value = match (op, lhs, rhs) {
        (Add, Int(a), Int(b)) => Int(a.wrapping_add(b)),
        (Add, Str(a), Int(b)) => Str(format!("{}{}", a, b)),
        (Add, Int(a), Str(b)) => Str(format!("{}{}", a, b)),
        (Add, Str(a), Str(b)) => Str(a + &b),

        (Sub, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
        (Mul, Int(a), Int(b)) => Int(a.wrapping_mul(b)),

        (Div, Int(_), Int(0)) | (Rem, Int(_), Int(0)) => {
            return Err(ExecutionError::new(
                ErrorKind::DivByZero,
                location.clone(),
                format!("division by zero in '{}'", op.token()),
            )
            .into());
        }
        (Div, Int(a), Int(b)) => Int(floor_div(a, b)),
        (Rem, Int(a), Int(b)) => Int(floor_rem(a, b)),

        (Eq, a, b) => {
            if !a.same_kind(&b) {
                return Err(fail(&a, &b));
            }
            Bool(a == b)
        }
        (Neq, a, b) => {
            if !a.same_kind(&b) {
                return Err(fail(&a, &b));
            }
            Bool(a != b)
        }

        (Lt, Int(a), Int(b)) => Bool(a < b),
        (Gt, Int(a), Int(b)) => Bool(a > b),
        (Lte, Int(a), Int(b)) => Bool(a <= b),
        (Gte, Int(a), Int(b)) => Bool(a >= b),

        (And, Bool(a), Bool(b)) => Bool(a && b),
        (Or, Bool(a), Bool(b)) => Bool(a || b),

        (_, a, b) => return Err(fail(&a, &b)),
    };

    Ok(value)
}
