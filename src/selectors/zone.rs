//! Zone selector resolution.

use super::{bound_selector_value, cardinality_error, resolve_player_sel, ZoneSel};
use crate::core::{PlayerId, Value, ValueType, ZoneId};
use crate::error::{KernelError, ReferenceKind};
use crate::eval::EvalContext;

/// Resolve a zone selector to a sorted, de-duplicated list of declared zones.
pub fn resolve_zone_sel(sel: &ZoneSel, ctx: &EvalContext<'_>) -> Result<Vec<ZoneId>, KernelError> {
    let mut zones = match sel {
        ZoneSel::Literal(zone) => vec![checked_zone(zone.clone(), ctx)?],
        ZoneSel::AllOwners(base) => {
            let zones: Vec<ZoneId> = PlayerId::all(ctx.player_count())
                .map(|p| ZoneId::owned(base, p))
                .filter(|z| ctx.def.zone_def(z).is_some())
                .collect();
            if zones.is_empty() {
                return Err(KernelError::unknown(ReferenceKind::ZoneBase, base.as_str(), ctx.def.zone_bases()));
            }
            zones
        }
        ZoneSel::Owned { base, owner } => resolve_player_sel(owner, ctx)?
            .into_iter()
            .map(|p| checked_zone(ZoneId::owned(base, p), ctx))
            .collect::<Result<Vec<_>, _>>()?,
        ZoneSel::Bound(name) => {
            let mut out = Vec::new();
            collect_bound_zones(name, bound_selector_value(name, ctx)?, ctx, &mut out)?;
            out
        }
    };

    zones.sort();
    zones.dedup();
    Ok(zones)
}

/// Resolve a zone selector that must name exactly one zone.
pub fn resolve_single_zone_sel(sel: &ZoneSel, ctx: &EvalContext<'_>) -> Result<ZoneId, KernelError> {
    let mut zones = resolve_zone_sel(sel, ctx)?;
    if zones.len() == 1 {
        return Ok(zones.remove(0));
    }
    Err(cardinality_error(
        sel.to_string(),
        sel.is_bound(),
        zones.into_iter().map(|z| z.0).collect(),
    ))
}

fn collect_bound_zones(
    name: &str,
    value: &Value,
    ctx: &EvalContext<'_>,
    out: &mut Vec<ZoneId>,
) -> Result<(), KernelError> {
    match value {
        Value::Zone(zone) => out.push(checked_zone(zone.clone(), ctx)?),
        Value::Str(id) => out.push(checked_zone(ZoneId::new(id.as_str()), ctx)?),
        Value::List(items) => {
            for item in items {
                collect_bound_zones(name, item, ctx, out)?;
            }
        }
        other => {
            return Err(KernelError::type_mismatch(
                ValueType::Zone,
                other.value_type(),
                format!("zone binding `{name}`"),
            ))
        }
    }
    Ok(())
}

fn checked_zone(zone: ZoneId, ctx: &EvalContext<'_>) -> Result<ZoneId, KernelError> {
    if ctx.def.zone_def(&zone).is_some() {
        Ok(zone)
    } else {
        Err(KernelError::unknown(ReferenceKind::Zone, zone.0, ctx.def.zone_ids()))
    }
}
