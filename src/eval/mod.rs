//! Expression evaluator.
//!
//! Pure functions over an `EvalContext` (definition, state, active/actor
//! player, bindings):
//!
//! - `eval_value`: value expressions to scalars
//! - `eval_condition`: condition trees to booleans
//! - `eval_query`: queries to ordered item lists
//!
//! Nothing here mutates state. Failures are `KernelError`s carrying the
//! offending expression.

pub mod condition;
pub mod context;
pub mod expr;
pub mod query;

pub use condition::{eval_condition, eval_optional, CompareOp, Condition};
pub use context::{Bindings, EvalContext};
pub use expr::{eval_int, eval_value, AggregateOp, ArithOp, Reference, ValueExpr};
pub use query::{eval_query, Query, TokenFilter};
