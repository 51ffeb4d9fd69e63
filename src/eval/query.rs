//! Queries: ordered collections for `forEach`, `reduce`, choices and aggregates.
//!
//! Every query produces its items in a deterministic order. Token queries
//! walk zones in sorted id order and each zone top to bottom. Results larger
//! than `EngineLimits::max_query_items` fail instead of being truncated.

use serde::{Deserialize, Serialize};

use super::condition::CompareOp;
use super::context::EvalContext;
use super::expr::{eval_int, eval_value, ValueExpr};
use crate::core::{ScalarValue, Token, Value, ValueType, ZoneId, ZoneOwner};
use crate::error::KernelError;
use crate::selectors::{resolve_player_sel, resolve_zone_sel, PlayerSel, ZoneSel};

/// Token filter. All filters of a query must match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenFilter {
    Type(String),
    /// Tokens without the property never match.
    Prop {
        prop: String,
        op: CompareOp,
        value: ValueExpr,
    },
    PropIn {
        prop: String,
        values: Vec<ScalarValue>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Query {
    TokensInZone {
        zone: ZoneSel,
        #[serde(default)]
        filter: Vec<TokenFilter>,
    },
    /// Tokens in every zone adjacent to the selected zone(s).
    TokensInAdjacentZones {
        zone: ZoneSel,
        #[serde(default)]
        filter: Vec<TokenFilter>,
    },
    /// Inclusive; empty when `min > max`.
    IntRange { min: ValueExpr, max: ValueExpr },
    Enums(Vec<String>),
    Players(PlayerSel),
    Zones {
        category: Option<String>,
        owner: Option<PlayerSel>,
    },
    AdjacentZones(ZoneSel),
    /// A bound list (or a single bound value).
    Binding(String),
    Concat(Vec<Query>),
}

impl Query {
    pub fn tokens_in(zone: ZoneSel) -> Self {
        Query::TokensInZone {
            zone,
            filter: Vec::new(),
        }
    }

    pub fn tokens_of_type(zone: ZoneSel, token_type: impl Into<String>) -> Self {
        Query::TokensInZone {
            zone,
            filter: vec![TokenFilter::Type(token_type.into())],
        }
    }
}

/// Filter with its comparison value already evaluated.
enum ResolvedFilter<'f> {
    Type(&'f str),
    Prop(&'f str, CompareOp, ScalarValue),
    PropIn(&'f str, &'f [ScalarValue]),
}

/// Evaluate a query to its ordered items.
pub fn eval_query(query: &Query, ctx: &EvalContext<'_>) -> Result<Vec<Value>, KernelError> {
    let max = ctx.def.limits.max_query_items;
    let items = match query {
        Query::TokensInZone { zone, filter } => {
            let zones = resolve_zone_sel(zone, ctx)?;
            tokens_in_zones(&zones, filter, ctx)?
        }
        Query::TokensInAdjacentZones { zone, filter } => {
            let zones = adjacent_to_all(zone, ctx)?;
            tokens_in_zones(&zones, filter, ctx)?
        }
        Query::IntRange { min, max: upper } => {
            let lo = eval_int(min, ctx)?;
            let hi = eval_int(upper, ctx)?;
            if hi < lo {
                Vec::new()
            } else {
                // Width check before materializing.
                let width = (hi as i128) - (lo as i128) + 1;
                if width > max as i128 {
                    return Err(KernelError::QueryTooLarge { max });
                }
                (lo..=hi).map(Value::Int).collect()
            }
        }
        Query::Enums(values) => values.iter().map(|v| Value::Str(v.clone())).collect(),
        Query::Players(sel) => resolve_player_sel(sel, ctx)?.into_iter().map(Value::Player).collect(),
        Query::Zones { category, owner } => {
            let owners = match owner {
                Some(sel) => Some(resolve_player_sel(sel, ctx)?),
                None => None,
            };
            let mut zones: Vec<ZoneId> = ctx
                .def
                .zones
                .iter()
                .filter(|z| category.is_none() || z.category == *category)
                .filter(|z| match (&owners, z.id.owner()) {
                    (None, _) => true,
                    (Some(set), ZoneOwner::Player(p)) => set.contains(&p),
                    (Some(_), ZoneOwner::None) => false,
                })
                .map(|z| z.id.clone())
                .collect();
            zones.sort();
            zones.into_iter().map(Value::Zone).collect()
        }
        Query::AdjacentZones(zone) => adjacent_to_all(zone, ctx)?.into_iter().map(Value::Zone).collect(),
        Query::Binding(name) => match ctx.binding(name)? {
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        },
        Query::Concat(parts) => {
            let mut out = Vec::new();
            for part in parts {
                out.extend(eval_query(part, ctx)?);
                if out.len() > max {
                    return Err(KernelError::QueryTooLarge { max });
                }
            }
            out
        }
    };

    if items.len() > max {
        return Err(KernelError::QueryTooLarge { max });
    }
    Ok(items)
}

/// Zones adjacent to any selected zone, sorted and de-duplicated.
fn adjacent_to_all(zone: &ZoneSel, ctx: &EvalContext<'_>) -> Result<Vec<ZoneId>, KernelError> {
    let mut zones: Vec<ZoneId> = resolve_zone_sel(zone, ctx)?
        .iter()
        .flat_map(|z| ctx.def.adjacent_zones(z))
        .collect();
    zones.sort();
    zones.dedup();
    Ok(zones)
}

fn tokens_in_zones(
    zones: &[ZoneId],
    filter: &[TokenFilter],
    ctx: &EvalContext<'_>,
) -> Result<Vec<Value>, KernelError> {
    let resolved = resolve_filters(filter, ctx)?;
    let mut out = Vec::new();
    for zone in zones {
        let Some(tokens) = ctx.state.zone(zone) else {
            continue;
        };
        for token in tokens {
            if matches_all(token, &resolved)? {
                out.push(Value::Token(token.clone()));
            }
        }
    }
    Ok(out)
}

fn resolve_filters<'f>(
    filter: &'f [TokenFilter],
    ctx: &EvalContext<'_>,
) -> Result<Vec<ResolvedFilter<'f>>, KernelError> {
    filter
        .iter()
        .map(|f| {
            Ok(match f {
                TokenFilter::Type(t) => ResolvedFilter::Type(t),
                TokenFilter::Prop { prop, op, value } => {
                    ResolvedFilter::Prop(prop, *op, eval_value(value, ctx)?)
                }
                TokenFilter::PropIn { prop, values } => ResolvedFilter::PropIn(prop, values),
            })
        })
        .collect()
}

/// Whether a token passes every filter.
fn matches_all(token: &Token, filters: &[ResolvedFilter<'_>]) -> Result<bool, KernelError> {
    for filter in filters {
        let matched = match filter {
            ResolvedFilter::Type(t) => token.token_type == *t,
            ResolvedFilter::Prop(prop, op, expected) => match token.prop(prop) {
                Some(actual) => compare_prop(*op, &actual, expected, prop)?,
                None => false,
            },
            ResolvedFilter::PropIn(prop, values) => token.prop(prop).is_some_and(|v| values.contains(&v)),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare_prop(op: CompareOp, actual: &ScalarValue, expected: &ScalarValue, prop: &str) -> Result<bool, KernelError> {
    match op {
        CompareOp::Eq => Ok(actual == expected),
        CompareOp::Ne => Ok(actual != expected),
        _ => {
            let (ScalarValue::Int(a), ScalarValue::Int(b)) = (actual, expected) else {
                let offending = if actual.as_int().is_none() { actual } else { expected };
                return Err(KernelError::type_mismatch(
                    ValueType::Int,
                    offending.value_type(),
                    format!("token filter on `{prop}`"),
                ));
            };
            Ok(match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                _ => a >= b,
            })
        }
    }
}
