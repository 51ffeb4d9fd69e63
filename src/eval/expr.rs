//! Value expressions.
//!
//! ## Evaluation Rules
//!
//! - Literals pass through unchanged.
//! - References read the current state; unknown names fail with the list of
//!   valid alternatives and a fuzzy suggestion.
//! - Arithmetic needs integers, truncates division toward zero, and fails on
//!   division by zero or any result outside the safe-integer range.
//! - Aggregates over an empty match set are 0.
//! - `concat` is the only place values are coerced (to strings).
//! - `if` never evaluates the untaken branch.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::condition::{eval_condition, Condition};
use super::context::EvalContext;
use super::query::{eval_query, Query};
use crate::core::{is_safe_integer, ScalarValue, Value, ValueType, ZoneOwner};
use crate::error::{KernelError, ReferenceKind};
use crate::selectors::{
    resolve_single_player_sel, resolve_single_zone_sel, resolve_token, resolve_zone_sel, PlayerSel,
    TokenSel, ZoneSel,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
}

/// A read from state or scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reference {
    GlobalVar(String),
    PlayerVar { player: PlayerSel, var: String },
    /// Tokens across every zone the selector resolves to.
    ZoneCount(ZoneSel),
    TokenProp { token: TokenSel, prop: String },
    Binding(String),
    MarkerState { zone: ZoneSel, marker: String },
    GlobalMarker(String),
    ZoneAttribute { zone: ZoneSel, attribute: String },
    /// Zone owner's seat, or -1 for shared zones.
    ZoneOwner(ZoneSel),
    ActivePlayer,
    ActorPlayer,
    TurnCount,
    CurrentPhase,
}

/// A value expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueExpr {
    Literal(ScalarValue),
    Ref(Reference),
    Arith {
        op: ArithOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
    Aggregate {
        op: AggregateOp,
        query: Box<Query>,
        /// Integer token property to fold; items themselves when absent.
        prop: Option<String>,
    },
    Concat(Vec<ValueExpr>),
    If {
        when: Box<Condition>,
        then: Box<ValueExpr>,
        otherwise: Box<ValueExpr>,
    },
}

impl ValueExpr {
    pub fn lit(value: impl Into<ScalarValue>) -> Self {
        ValueExpr::Literal(value.into())
    }

    pub fn global(name: impl Into<String>) -> Self {
        ValueExpr::Ref(Reference::GlobalVar(name.into()))
    }

    pub fn player_var(player: PlayerSel, var: impl Into<String>) -> Self {
        ValueExpr::Ref(Reference::PlayerVar {
            player,
            var: var.into(),
        })
    }

    pub fn binding(name: impl Into<String>) -> Self {
        ValueExpr::Ref(Reference::Binding(name.into()))
    }

    pub fn zone_count(zone: ZoneSel) -> Self {
        ValueExpr::Ref(Reference::ZoneCount(zone))
    }

    pub fn token_prop(token: TokenSel, prop: impl Into<String>) -> Self {
        ValueExpr::Ref(Reference::TokenProp {
            token,
            prop: prop.into(),
        })
    }

    pub fn arith(op: ArithOp, left: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn aggregate(op: AggregateOp, query: Query, prop: Option<&str>) -> Self {
        ValueExpr::Aggregate {
            op,
            query: Box::new(query),
            prop: prop.map(str::to_string),
        }
    }

    pub fn if_else(when: Condition, then: ValueExpr, otherwise: ValueExpr) -> Self {
        ValueExpr::If {
            when: Box::new(when),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

impl From<i64> for ValueExpr {
    fn from(v: i64) -> Self {
        ValueExpr::Literal(ScalarValue::Int(v))
    }
}

impl From<i32> for ValueExpr {
    fn from(v: i32) -> Self {
        ValueExpr::Literal(ScalarValue::Int(i64::from(v)))
    }
}

impl From<bool> for ValueExpr {
    fn from(v: bool) -> Self {
        ValueExpr::Literal(ScalarValue::Bool(v))
    }
}

impl From<&str> for ValueExpr {
    fn from(v: &str) -> Self {
        ValueExpr::Literal(ScalarValue::Str(v.to_string()))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::GlobalVar(name) => f.write_str(name),
            Reference::PlayerVar { player, var } => write!(f, "{player}.{var}"),
            Reference::ZoneCount(zone) => write!(f, "count({zone})"),
            Reference::TokenProp { token, prop } => write!(f, "{token}.{prop}"),
            Reference::Binding(name) => f.write_str(name),
            Reference::MarkerState { zone, marker } => write!(f, "{zone}#{marker}"),
            Reference::GlobalMarker(marker) => write!(f, "#{marker}"),
            Reference::ZoneAttribute { zone, attribute } => write!(f, "{zone}@{attribute}"),
            Reference::ZoneOwner(zone) => write!(f, "owner({zone})"),
            Reference::ActivePlayer => f.write_str("activePlayer"),
            Reference::ActorPlayer => f.write_str("actorPlayer"),
            Reference::TurnCount => f.write_str("turnCount"),
            Reference::CurrentPhase => f.write_str("currentPhase"),
        }
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Literal(ScalarValue::Str(s)) => write!(f, "{s:?}"),
            ValueExpr::Literal(v) => write!(f, "{v}"),
            ValueExpr::Ref(r) => write!(f, "{r}"),
            ValueExpr::Arith { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            ValueExpr::Aggregate { op, prop, .. } => match prop {
                Some(prop) => write!(f, "{op:?}(..).{prop}"),
                None => write!(f, "{op:?}(..)"),
            },
            ValueExpr::Concat(parts) => write!(f, "concat[{}]", parts.len()),
            ValueExpr::If { then, otherwise, .. } => write!(f, "if(.., {then}, {otherwise})"),
        }
    }
}

/// Evaluate a value expression to a scalar.
pub fn eval_value(expr: &ValueExpr, ctx: &EvalContext<'_>) -> Result<ScalarValue, KernelError> {
    match expr {
        ValueExpr::Literal(v) => Ok(v.clone()),
        ValueExpr::Ref(reference) => eval_reference(reference, ctx),
        ValueExpr::Arith { op, left, right } => {
            let l = expect_int(eval_value(left, ctx)?, expr)?;
            let r = expect_int(eval_value(right, ctx)?, expr)?;
            arith(*op, l, r, expr).map(ScalarValue::Int)
        }
        ValueExpr::Aggregate { op, query, prop } => {
            let items = eval_query(query, ctx)?;
            aggregate(*op, &items, prop.as_deref(), expr).map(ScalarValue::Int)
        }
        ValueExpr::Concat(parts) => {
            let mut out = String::new();
            for part in parts {
                out.push_str(&eval_value(part, ctx)?.to_string());
            }
            Ok(ScalarValue::Str(out))
        }
        ValueExpr::If {
            when,
            then,
            otherwise,
        } => {
            if eval_condition(when, ctx)? {
                eval_value(then, ctx)
            } else {
                eval_value(otherwise, ctx)
            }
        }
    }
}

/// Evaluate an expression that must produce an integer.
pub fn eval_int(expr: &ValueExpr, ctx: &EvalContext<'_>) -> Result<i64, KernelError> {
    expect_int(eval_value(expr, ctx)?, expr)
}

fn expect_int(value: ScalarValue, expr: &ValueExpr) -> Result<i64, KernelError> {
    match value {
        ScalarValue::Int(v) => Ok(v),
        other => Err(KernelError::type_mismatch(ValueType::Int, other.value_type(), expr.to_string())),
    }
}

fn arith(op: ArithOp, l: i64, r: i64, expr: &ValueExpr) -> Result<i64, KernelError> {
    let result = match op {
        ArithOp::Add => l.checked_add(r),
        ArithOp::Sub => l.checked_sub(r),
        ArithOp::Mul => l.checked_mul(r),
        ArithOp::Div => {
            if r == 0 {
                return Err(KernelError::DivisionByZero {
                    expr: expr.to_string(),
                });
            }
            l.checked_div(r)
        }
    };
    checked(result, expr)
}

fn checked(result: Option<i64>, expr: &ValueExpr) -> Result<i64, KernelError> {
    match result {
        Some(v) if is_safe_integer(v) => Ok(v),
        _ => Err(KernelError::IntegerOverflow {
            expr: expr.to_string(),
        }),
    }
}

fn aggregate(op: AggregateOp, items: &[Value], prop: Option<&str>, expr: &ValueExpr) -> Result<i64, KernelError> {
    if op == AggregateOp::Count {
        return Ok(items.len() as i64);
    }

    let mut operands = Vec::with_capacity(items.len());
    for item in items {
        operands.push(aggregate_operand(item, prop, expr)?);
    }

    match op {
        AggregateOp::Count => Ok(operands.len() as i64),
        AggregateOp::Sum => operands
            .iter()
            .try_fold(0i64, |acc, v| checked(acc.checked_add(*v), expr)),
        AggregateOp::Min => Ok(operands.iter().copied().min().unwrap_or(0)),
        AggregateOp::Max => Ok(operands.iter().copied().max().unwrap_or(0)),
    }
}

fn aggregate_operand(item: &Value, prop: Option<&str>, expr: &ValueExpr) -> Result<i64, KernelError> {
    let scalar = match (prop, item) {
        (Some(prop), Value::Token(token)) => token
            .prop(prop)
            .ok_or_else(|| KernelError::unknown(ReferenceKind::TokenProp, prop, token.prop_names()))?,
        (Some(_), other) => {
            return Err(KernelError::type_mismatch(ValueType::Token, other.value_type(), expr.to_string()))
        }
        (None, other) => other.to_scalar().ok_or_else(|| {
            KernelError::type_mismatch(ValueType::Int, other.value_type(), expr.to_string())
        })?,
    };
    expect_int(scalar, expr)
}

fn eval_reference(reference: &Reference, ctx: &EvalContext<'_>) -> Result<ScalarValue, KernelError> {
    match reference {
        Reference::GlobalVar(name) => ctx
            .state
            .global_var(name)
            .map(ScalarValue::from)
            .ok_or_else(|| {
                KernelError::unknown(
                    ReferenceKind::GlobalVar,
                    name.as_str(),
                    ctx.def.global_vars.iter().map(|v| v.name.clone()),
                )
            }),
        Reference::PlayerVar { player, var } => {
            let player = resolve_single_player_sel(player, ctx)?;
            ctx.state
                .player_var(player, var)
                .map(ScalarValue::from)
                .ok_or_else(|| {
                    KernelError::unknown(
                        ReferenceKind::PlayerVar,
                        var.as_str(),
                        ctx.def.per_player_vars.iter().map(|v| v.name.clone()),
                    )
                })
        }
        Reference::ZoneCount(zone) => {
            let total: usize = resolve_zone_sel(zone, ctx)?
                .iter()
                .map(|z| ctx.state.zone_size(z))
                .sum();
            Ok(ScalarValue::Int(total as i64))
        }
        Reference::TokenProp { token, prop } => {
            let token = resolve_token(token, ctx)?;
            token
                .prop(prop)
                .ok_or_else(|| KernelError::unknown(ReferenceKind::TokenProp, prop.as_str(), token.prop_names()))
        }
        Reference::Binding(name) => {
            let value = ctx.binding(name)?;
            value.to_scalar().ok_or_else(|| {
                KernelError::type_mismatch(ValueType::Int, value.value_type(), format!("binding `{name}`"))
            })
        }
        Reference::MarkerState { zone, marker } => {
            let zone = resolve_single_zone_sel(zone, ctx)?;
            let lattice = ctx.def.marker_lattice(marker).ok_or_else(|| {
                KernelError::unknown(
                    ReferenceKind::MarkerLattice,
                    marker.as_str(),
                    ctx.def.marker_lattices.iter().map(|m| m.id.clone()),
                )
            })?;
            let state = ctx
                .state
                .zone_marker(&zone, marker)
                .unwrap_or(lattice.default_state.as_str());
            Ok(ScalarValue::Str(state.to_string()))
        }
        Reference::GlobalMarker(marker) => {
            let lattice = ctx.def.global_marker_lattice(marker).ok_or_else(|| {
                KernelError::unknown(
                    ReferenceKind::MarkerLattice,
                    marker.as_str(),
                    ctx.def.global_marker_lattices.iter().map(|m| m.id.clone()),
                )
            })?;
            let state = ctx
                .state
                .global_marker(marker)
                .unwrap_or(lattice.default_state.as_str());
            Ok(ScalarValue::Str(state.to_string()))
        }
        Reference::ZoneAttribute { zone, attribute } => {
            let zone = resolve_single_zone_sel(zone, ctx)?;
            let zone_def = ctx.def.zone_def(&zone).ok_or_else(|| {
                KernelError::unknown(ReferenceKind::Zone, zone.as_str(), ctx.def.zone_ids())
            })?;
            let value = zone_def.attributes.get(attribute).ok_or_else(|| {
                KernelError::unknown(
                    ReferenceKind::ZoneAttribute,
                    attribute.as_str(),
                    zone_def.attributes.keys().cloned(),
                )
            })?;
            value.as_scalar().ok_or_else(|| {
                KernelError::type_mismatch(ValueType::Str, value.value_type(), format!("{zone}@{attribute}"))
            })
        }
        Reference::ZoneOwner(zone) => {
            let zone = resolve_single_zone_sel(zone, ctx)?;
            Ok(ScalarValue::Int(match zone.owner() {
                ZoneOwner::Player(p) => p.index() as i64,
                ZoneOwner::None => -1,
            }))
        }
        Reference::ActivePlayer => Ok(ScalarValue::Int(ctx.active_player.index() as i64)),
        Reference::ActorPlayer => Ok(ScalarValue::Int(ctx.actor_player.index() as i64)),
        Reference::TurnCount => Ok(ScalarValue::Int(i64::from(ctx.state.turn_count))),
        Reference::CurrentPhase => Ok(ScalarValue::Str(ctx.state.current_phase.0.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        GameDef, GameState, MarkerLatticeDef, PlayerId, Token, VarDef, ZoneDef, ZoneId, MAX_SAFE_INTEGER,
    };
    use crate::eval::{Bindings, TokenFilter};

    fn def() -> GameDef {
        GameDef::new("eval", 2, 2)
            .with_global_var(VarDef::int("aid", 15, 0, 75))
            .with_global_var(VarDef::bool("monsoon", false))
            .with_per_player_var(VarDef::int("resources", 5, 0, 40))
            .with_zone(ZoneDef::new("hue:none").with_attribute("terrain", "highland"))
            .with_zone(ZoneDef::new("hand:0"))
            .with_zone(ZoneDef::new("hand:1"))
            .with_marker_lattice(MarkerLatticeDef::new("support", ["opposition", "neutral", "support"]).with_default("neutral"))
    }

    fn state(def: &GameDef) -> GameState {
        let mut state = GameState::new(def, 1, 2).unwrap();
        state.zones.insert(
            ZoneId::new("hue:none"),
            vec![
                Token::new("t1", "troops").with_prop("strength", 3),
                Token::new("t2", "troops").with_prop("strength", 5),
                Token::new("b1", "base").with_prop("strength", 1),
            ]
            .into(),
        );
        state.player_vars[1].insert("resources".into(), crate::core::VarValue::Int(12));
        state
    }

    fn eval(expr: &ValueExpr) -> Result<ScalarValue, KernelError> {
        let def = def();
        let state = state(&def);
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &state, &bindings);
        eval_value(expr, &ctx)
    }

    fn tokens_in_hue() -> Query {
        Query::TokensInZone {
            zone: ZoneSel::id("hue:none"),
            filter: vec![],
        }
    }

    #[test]
    fn test_references() {
        assert_eq!(eval(&ValueExpr::global("aid")).unwrap(), ScalarValue::Int(15));
        assert_eq!(eval(&ValueExpr::global("monsoon")).unwrap(), ScalarValue::Bool(false));
        assert_eq!(
            eval(&ValueExpr::player_var(PlayerSel::Id(PlayerId::new(1)), "resources")).unwrap(),
            ScalarValue::Int(12)
        );
        assert_eq!(eval(&ValueExpr::zone_count(ZoneSel::id("hue:none"))).unwrap(), ScalarValue::Int(3));
        assert_eq!(
            eval(&ValueExpr::token_prop(TokenSel::id("t2"), "strength")).unwrap(),
            ScalarValue::Int(5)
        );
        assert_eq!(
            eval(&ValueExpr::token_prop(TokenSel::id("b1"), "type")).unwrap(),
            ScalarValue::from("base")
        );
        assert_eq!(
            eval(&ValueExpr::Ref(Reference::MarkerState {
                zone: ZoneSel::id("hue:none"),
                marker: "support".into()
            }))
            .unwrap(),
            ScalarValue::from("neutral")
        );
        assert_eq!(
            eval(&ValueExpr::Ref(Reference::ZoneAttribute {
                zone: ZoneSel::id("hue:none"),
                attribute: "terrain".into()
            }))
            .unwrap(),
            ScalarValue::from("highland")
        );
        assert_eq!(eval(&ValueExpr::Ref(Reference::TurnCount)).unwrap(), ScalarValue::Int(1));
    }

    #[test]
    fn test_unknown_global_suggests() {
        match eval(&ValueExpr::global("aide")) {
            Err(KernelError::UnknownReference { kind, alternatives, suggestion, .. }) => {
                assert_eq!(kind, ReferenceKind::GlobalVar);
                assert_eq!(alternatives, vec!["aid".to_string(), "monsoon".to_string()]);
                assert_eq!(suggestion.as_deref(), Some("aid"));
            }
            other => panic!("Expected UnknownReference, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_token_prop_fails() {
        assert!(matches!(
            eval(&ValueExpr::token_prop(TokenSel::id("t1"), "morale")),
            Err(KernelError::UnknownReference { kind: ReferenceKind::TokenProp, .. })
        ));
    }

    #[test]
    fn test_arithmetic() {
        let sum = ValueExpr::arith(ArithOp::Add, ValueExpr::global("aid"), 4.into());
        assert_eq!(eval(&sum).unwrap(), ScalarValue::Int(19));

        let div = ValueExpr::arith(ArithOp::Div, (-7).into(), 2.into());
        assert_eq!(eval(&div).unwrap(), ScalarValue::Int(-3));
    }

    #[test]
    fn test_division_by_zero() {
        let div = ValueExpr::arith(ArithOp::Div, 7.into(), 0.into());
        assert!(matches!(eval(&div), Err(KernelError::DivisionByZero { .. })));
    }

    #[test]
    fn test_overflow_past_safe_range() {
        let add = ValueExpr::arith(ArithOp::Add, MAX_SAFE_INTEGER.into(), 1.into());
        assert!(matches!(eval(&add), Err(KernelError::IntegerOverflow { .. })));

        let mul = ValueExpr::arith(ArithOp::Mul, i64::MAX.into(), 2.into());
        assert!(matches!(eval(&mul), Err(KernelError::IntegerOverflow { .. })));
    }

    #[test]
    fn test_arithmetic_requires_ints() {
        let bad = ValueExpr::arith(ArithOp::Add, "us".into(), 1.into());
        assert!(matches!(
            eval(&bad),
            Err(KernelError::TypeMismatch { expected: ValueType::Int, actual: ValueType::Str, .. })
        ));
    }

    #[test]
    fn test_aggregates() {
        let count = ValueExpr::aggregate(AggregateOp::Count, tokens_in_hue(), None);
        assert_eq!(eval(&count).unwrap(), ScalarValue::Int(3));

        let sum = ValueExpr::aggregate(AggregateOp::Sum, tokens_in_hue(), Some("strength"));
        assert_eq!(eval(&sum).unwrap(), ScalarValue::Int(9));

        let min = ValueExpr::aggregate(AggregateOp::Min, tokens_in_hue(), Some("strength"));
        assert_eq!(eval(&min).unwrap(), ScalarValue::Int(1));

        let troops = Query::TokensInZone {
            zone: ZoneSel::id("hue:none"),
            filter: vec![TokenFilter::Type("troops".into())],
        };
        let max = ValueExpr::aggregate(AggregateOp::Max, troops, Some("strength"));
        assert_eq!(eval(&max).unwrap(), ScalarValue::Int(5));
    }

    #[test]
    fn test_aggregates_over_empty_set_are_zero() {
        let empty = Query::TokensInZone {
            zone: ZoneSel::id("hand:0"),
            filter: vec![],
        };
        for op in [AggregateOp::Count, AggregateOp::Sum, AggregateOp::Min, AggregateOp::Max] {
            let expr = ValueExpr::aggregate(op, empty.clone(), Some("strength"));
            assert_eq!(eval(&expr).unwrap(), ScalarValue::Int(0));
        }
    }

    #[test]
    fn test_aggregate_requires_prop_on_every_token() {
        let def = def();
        let mut state = state(&def);
        state
            .zones
            .get_mut(&ZoneId::new("hue:none"))
            .unwrap()
            .push_back(Token::new("c1", "cadre"));
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &state, &bindings);

        let sum = ValueExpr::aggregate(AggregateOp::Sum, tokens_in_hue(), Some("strength"));
        assert!(matches!(
            eval_value(&sum, &ctx),
            Err(KernelError::UnknownReference { kind: ReferenceKind::TokenProp, .. })
        ));
    }

    #[test]
    fn test_concat_coerces() {
        let expr = ValueExpr::Concat(vec!["aid=".into(), ValueExpr::global("aid"), ValueExpr::lit(true)]);
        assert_eq!(eval(&expr).unwrap(), ScalarValue::from("aid=15true"));
    }

    #[test]
    fn test_if_short_circuits() {
        // The untaken branch would divide by zero.
        let expr = ValueExpr::if_else(
            Condition::Const(true),
            1.into(),
            ValueExpr::arith(ArithOp::Div, 1.into(), 0.into()),
        );
        assert_eq!(eval(&expr).unwrap(), ScalarValue::Int(1));
    }

    #[test]
    fn test_binding_reference() {
        let def = def();
        let state = state(&def);
        let bindings: Bindings = [("$p".to_string(), Value::Player(PlayerId::new(1)))].into_iter().collect();
        let ctx = EvalContext::new(&def, &state, &bindings);

        assert_eq!(eval_value(&ValueExpr::binding("$p"), &ctx).unwrap(), ScalarValue::Int(1));
        assert!(matches!(
            eval_value(&ValueExpr::binding("$q"), &ctx),
            Err(KernelError::MissingBinding { .. })
        ));
    }

    #[test]
    fn test_misspelled_binding_is_fatal() {
        let def = def();
        let state = state(&def);
        let bindings: Bindings = [("$target".to_string(), Value::Int(3))].into_iter().collect();
        let ctx = EvalContext::new(&def, &state, &bindings);

        let err = eval_value(&ValueExpr::binding("$typo"), &ctx).unwrap_err();
        assert!(matches!(&err, KernelError::MissingBinding { available, .. } if available == &vec!["$target".to_string()]));
        assert!(!err.is_deferrable());
    }
}
