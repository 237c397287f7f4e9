use crate::Error;
use std::sync::Arc;

// NOTE: This module is internal plumbing for the built-in table.
// It turns plain numeric Rust functions into the erased `OperationFn`
// stored on every `BuiltinOp`, and derives the operation's arity from
// the Rust signature so the two can never disagree.

/// Canonical erased evaluation rule used by the evaluator.
///
/// The evaluator pops exactly `arity` operands off its stack and hands
/// them over in source order.
pub(crate) type OperationFn = dyn Fn(&[f64]) -> Result<f64, Error> + Send + Sync;

/// Trait for numeric functions that can become a built-in operation.
///
/// `Args` is a tuple describing the parameter list (`(f64,)` or
/// `(f64, f64)`); it only exists to keep the blanket impls apart.
pub(crate) trait IntoOperation<Args> {
    /// Number of operands the operation consumes
    const ARITY: usize;

    fn into_operation(self, id: &'static str) -> Arc<OperationFn>;
}

impl<F> IntoOperation<(f64,)> for F
where
    F: Fn(f64) -> f64 + Send + Sync + 'static,
{
    const ARITY: usize = 1;

    fn into_operation(self, id: &'static str) -> Arc<OperationFn> {
        Arc::new(move |args: &[f64]| match *args {
            [a] => Ok((self)(a)),
            _ => Err(Error::arity_error(1, args.len(), id)),
        })
    }
}

impl<F> IntoOperation<(f64, f64)> for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
{
    const ARITY: usize = 2;

    fn into_operation(self, id: &'static str) -> Arc<OperationFn> {
        Arc::new(move |args: &[f64]| match *args {
            [a, b] => Ok((self)(a, b)),
            _ => Err(Error::arity_error(2, args.len(), id)),
        })
    }
}
