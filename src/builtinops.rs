//! Built-in operators, functions and named constants.
//!
//! Both tables are immutable and process-wide: they are built once, on first use, behind
//! a `LazyLock`, and every engine instance shares them.
//!
//! ## Kinds of operations
//!
//! - **Operators**: binary infix operators (`+ - * / ^`)
//! - **Postfix**: unary operators written after their operand (`50%`, `90deg`)
//! - **Functions**: unary prefix functions (`sqrt 16`, `sin(x)`, and `neg`, the
//!   prefix form a leading `-` is turned into)
//!
//! ## Precedence
//!
//! Precedences are small integers where more negative binds looser: `+ -` are `-4`,
//! `* /` are `-3` and `^` is `-2`. Prefix functions carry `0`, so they bind tighter than
//! any binary operator. Operators of equal precedence pop each other off the operator
//! stack, which makes every binary operator left-associative (`2^3^2` is `(2^3)^2`).
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** as a plain `fn(f64) -> f64` or `fn(f64, f64) -> f64`
//! 2. **Add it to BUILTIN_OPS** with its id, kind and precedence; arity follows from
//!    the Rust signature
//! 3. **Add tests** for the new entry below and, if it parses differently, in the
//!    tokenizer and postfix tests

use crate::Error;
use crate::intooperation::{IntoOperation, OperationFn};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Syntactic role of a built-in operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Binary infix operator
    Operator,
    /// Unary operator written after its operand
    Postfix,
    /// Unary prefix function
    Function,
}

/// Definition of a built-in operation
#[derive(Clone)]
pub struct BuiltinOp {
    /// The identifier the operation is written as
    pub id: &'static str,
    /// How the operation is written
    pub kind: OpKind,
    /// Binding strength; more negative binds looser
    pub precedence: i32,
    /// Number of operands consumed
    pub arity: usize,
    rule: Arc<OperationFn>,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("precedence", &self.precedence)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Ids are unique within the table
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Apply the operation to exactly `arity` operands, given in source order
    pub fn apply(&self, args: &[f64]) -> Result<f64, Error> {
        if args.len() != self.arity {
            return Err(Error::arity_error(self.arity, args.len(), self.id));
        }
        (self.rule)(args)
    }

    /// Whether the operation goes on the operator stack (binary operators and
    /// prefix functions) rather than straight to the output
    pub(crate) fn is_stacked(&self) -> bool {
        matches!(self.kind, OpKind::Operator | OpKind::Function)
    }
}

//
// Builtin Function Implementations
//

/// Degrees to radians factor, at the precision the calculator has always used
const DEGREES_TO_RADIANS: f64 = 0.0174533;

fn builtin_add(a: f64, b: f64) -> f64 {
    a + b
}

fn builtin_sub(a: f64, b: f64) -> f64 {
    a - b
}

fn builtin_mul(a: f64, b: f64) -> f64 {
    a * b
}

// IEEE semantics: division by zero yields an infinity or NaN, not an error
fn builtin_div(a: f64, b: f64) -> f64 {
    a / b
}

fn builtin_pow(a: f64, b: f64) -> f64 {
    a.powf(b)
}

fn builtin_percent(a: f64) -> f64 {
    a / 100.0
}

fn builtin_deg(a: f64) -> f64 {
    a * DEGREES_TO_RADIANS
}

fn builtin_neg(a: f64) -> f64 {
    -a
}

fn operation<Args, F>(id: &'static str, kind: OpKind, precedence: i32, func: F) -> BuiltinOp
where
    F: IntoOperation<Args>,
{
    BuiltinOp {
        id,
        kind,
        precedence,
        arity: <F as IntoOperation<Args>>::ARITY,
        rule: func.into_operation(id),
    }
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    vec![
        // Postfix operators
        operation::<(f64,), _>("%", OpKind::Postfix, 1, builtin_percent),
        operation::<(f64,), _>("deg", OpKind::Postfix, 1, builtin_deg),
        // Prefix functions
        operation::<(f64,), _>("sqrt", OpKind::Function, 0, f64::sqrt),
        operation::<(f64,), _>("sin", OpKind::Function, 0, f64::sin),
        operation::<(f64,), _>("neg", OpKind::Function, 0, builtin_neg),
        // Binary operators
        operation::<(f64, f64), _>("+", OpKind::Operator, -4, builtin_add),
        operation::<(f64, f64), _>("-", OpKind::Operator, -4, builtin_sub),
        operation::<(f64, f64), _>("*", OpKind::Operator, -3, builtin_mul),
        operation::<(f64, f64), _>("/", OpKind::Operator, -3, builtin_div),
        operation::<(f64, f64), _>("^", OpKind::Operator, -2, builtin_pow),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.id, op)).collect()
    });

/// Named constants
const BUILTIN_CONSTANTS: &[(&str, f64)] = &[("pi", std::f64::consts::PI)];

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Find a named constant's value
pub fn find_constant(name: &str) -> Option<f64> {
    BUILTIN_CONSTANTS
        .iter()
        .find(|(id, _)| *id == name)
        .map(|(_, value)| *value)
}

/// Names of all builtin constants
pub fn constant_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_CONSTANTS.iter().map(|(id, _)| *id)
}

/// Whether a name is taken by a builtin operation or constant
pub fn is_builtin_name(name: &str) -> bool {
    find_op(name).is_some() || find_constant(name).is_some()
}

/// The multiplication operator, used for implicit multiplication - guaranteed to exist
pub(crate) fn get_mul_op() -> &'static BuiltinOp {
    find_op("*").expect("* builtin operation must be available")
}

/// The negation function a prefix `-` becomes - guaranteed to exist
pub(crate) fn get_neg_op() -> &'static BuiltinOp {
    find_op("neg").expect("neg builtin operation must be available")
}
