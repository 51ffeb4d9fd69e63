//! Boolean conditions.
//!
//! Conditions are pure reads. `and`/`or` short-circuit left to right, so a
//! failing operand after the deciding one is never evaluated.
//!
//! Comparison semantics:
//! - `==`/`!=` work on any scalars; values of different types are unequal.
//! - `<`, `<=`, `>`, `>=` require both sides to be integers.

use serde::{Deserialize, Serialize};

use super::context::EvalContext;
use super::expr::{eval_value, ValueExpr};
use super::query::{eval_query, Query};
use crate::core::{ScalarValue, ValueType};
use crate::error::KernelError;
use crate::selectors::{resolve_single_zone_sel, ZoneSel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A boolean condition tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Const(bool),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Compare {
        op: CompareOp,
        left: ValueExpr,
        right: ValueExpr,
    },
    /// Item is a member of the query result.
    In { item: ValueExpr, query: Query },
    /// `from` has an adjacency edge to `to`.
    Adjacent { from: ZoneSel, to: ZoneSel },
}

impl Condition {
    pub fn compare(op: CompareOp, left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> Self {
        Condition::Compare {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn eq(left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    pub fn ge(left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> Self {
        Self::compare(CompareOp::Ge, left, right)
    }

    pub fn gt(left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> Self {
        Self::compare(CompareOp::Gt, left, right)
    }

    pub fn lt(left: impl Into<ValueExpr>, right: impl Into<ValueExpr>) -> Self {
        Self::compare(CompareOp::Lt, left, right)
    }

    pub fn not(inner: Condition) -> Self {
        Condition::Not(Box::new(inner))
    }
}

/// Evaluate a condition.
pub fn eval_condition(condition: &Condition, ctx: &EvalContext<'_>) -> Result<bool, KernelError> {
    match condition {
        Condition::Const(value) => Ok(*value),
        Condition::And(parts) => {
            for part in parts {
                if !eval_condition(part, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(parts) => {
            for part in parts {
                if eval_condition(part, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!eval_condition(inner, ctx)?),
        Condition::Compare { op, left, right } => {
            let l = eval_value(left, ctx)?;
            let r = eval_value(right, ctx)?;
            compare(*op, &l, &r, left, right)
        }
        Condition::In { item, query } => {
            let needle = eval_value(item, ctx)?;
            let items = eval_query(query, ctx)?;
            Ok(items.iter().any(|v| v.to_scalar().as_ref() == Some(&needle)))
        }
        Condition::Adjacent { from, to } => {
            let from = resolve_single_zone_sel(from, ctx)?;
            let to = resolve_single_zone_sel(to, ctx)?;
            Ok(ctx.def.are_adjacent(&from, &to))
        }
    }
}

/// Evaluate an optional condition; absent is true.
pub fn eval_optional(condition: Option<&Condition>, ctx: &EvalContext<'_>) -> Result<bool, KernelError> {
    condition.map_or(Ok(true), |c| eval_condition(c, ctx))
}

fn compare(
    op: CompareOp,
    l: &ScalarValue,
    r: &ScalarValue,
    left: &ValueExpr,
    right: &ValueExpr,
) -> Result<bool, KernelError> {
    let (a, b) = match (op, l, r) {
        (CompareOp::Eq, _, _) => return Ok(l == r),
        (CompareOp::Ne, _, _) => return Ok(l != r),
        (_, ScalarValue::Int(a), ScalarValue::Int(b)) => (a, b),
        (_, ScalarValue::Int(_), other) => {
            return Err(KernelError::type_mismatch(ValueType::Int, other.value_type(), right.to_string()))
        }
        (_, other, _) => {
            return Err(KernelError::type_mismatch(ValueType::Int, other.value_type(), left.to_string()))
        }
    };

    Ok(match op {
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        _ => a >= b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GameDef, GameState, PlayerId, VarDef, ZoneAdjacency, ZoneDef};
    use crate::eval::{Bindings, Reference};

    fn def() -> GameDef {
        GameDef::new("cond", 2, 2)
            .with_global_var(VarDef::int("aid", 15, 0, 75))
            .with_zone(ZoneDef::new("a:none").adjacent(ZoneAdjacency::to("b:none")))
            .with_zone(ZoneDef::new("b:none"))
            .with_zone(ZoneDef::new("c:none"))
    }

    fn check(condition: &Condition) -> Result<bool, KernelError> {
        let def = def();
        let state = GameState::new(&def, 1, 2).unwrap();
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &state, &bindings).with_active(PlayerId::new(1));
        eval_condition(condition, &ctx)
    }

    #[test]
    fn test_comparisons() {
        assert!(check(&Condition::ge(ValueExpr::global("aid"), 15)).unwrap());
        assert!(!check(&Condition::gt(ValueExpr::global("aid"), 15)).unwrap());
        assert!(check(&Condition::eq(ValueExpr::Ref(Reference::ActivePlayer), 1)).unwrap());
    }

    #[test]
    fn test_equality_across_types_is_false() {
        assert!(!check(&Condition::eq(1, "1")).unwrap());
        assert!(check(&Condition::compare(CompareOp::Ne, 1, "1")).unwrap());
    }

    #[test]
    fn test_ordering_requires_ints() {
        assert!(matches!(
            check(&Condition::lt("a", 1)),
            Err(KernelError::TypeMismatch { expected: ValueType::Int, actual: ValueType::Str, .. })
        ));
    }

    #[test]
    fn test_short_circuit() {
        let failing = Condition::eq(ValueExpr::global("missing"), 1);

        let and = Condition::And(vec![Condition::Const(false), failing.clone()]);
        assert!(!check(&and).unwrap());

        let or = Condition::Or(vec![Condition::Const(true), failing.clone()]);
        assert!(check(&or).unwrap());

        assert!(check(&Condition::And(vec![Condition::Const(true), failing])).is_err());
    }

    #[test]
    fn test_membership() {
        let cond = Condition::In {
            item: "b".into(),
            query: Query::Enums(vec!["a".into(), "b".into()]),
        };
        assert!(check(&cond).unwrap());

        let cond = Condition::In {
            item: 3.into(),
            query: Query::IntRange { min: 1.into(), max: 2.into() },
        };
        assert!(!check(&cond).unwrap());
    }

    #[test]
    fn test_adjacency() {
        let adjacent = |from: &str, to: &str| Condition::Adjacent {
            from: ZoneSel::id(from),
            to: ZoneSel::id(to),
        };
        assert!(check(&adjacent("a:none", "b:none")).unwrap());
        assert!(check(&adjacent("b:none", "a:none")).unwrap());
        assert!(!check(&adjacent("a:none", "c:none")).unwrap());
    }

    #[test]
    fn test_negation() {
        assert!(check(&Condition::not(Condition::Const(false))).unwrap());
    }
}
