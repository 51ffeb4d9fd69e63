//! Player selector resolution.

use smallvec::SmallVec;

use super::{bound_selector_value, cardinality_error, PlayerSel};
use crate::core::{PlayerId, Value, ValueType};
use crate::error::{KernelError, ReferenceKind};
use crate::eval::EvalContext;

/// Resolved players, sorted by seat, no duplicates.
pub type PlayerSet = SmallVec<[PlayerId; 8]>;

/// Resolve a player selector to a sorted, de-duplicated set of seats.
pub fn resolve_player_sel(sel: &PlayerSel, ctx: &EvalContext<'_>) -> Result<PlayerSet, KernelError> {
    let count = ctx.player_count();
    let actor = ctx.actor_player;

    let mut players: PlayerSet = match sel {
        PlayerSel::Actor => smallvec::smallvec![actor],
        PlayerSel::Active => smallvec::smallvec![ctx.active_player],
        PlayerSel::All => PlayerId::all(count).collect(),
        PlayerSel::AllOther => PlayerId::all(count).filter(|p| *p != actor).collect(),
        PlayerSel::Left => smallvec::smallvec![actor.left(count)],
        PlayerSel::Right => smallvec::smallvec![actor.right(count)],
        PlayerSel::Id(p) => smallvec::smallvec![checked_seat(p.index() as i64, count)?],
        PlayerSel::Bound(name) => {
            let mut out = PlayerSet::new();
            collect_bound_players(name, bound_selector_value(name, ctx)?, count, &mut out)?;
            out
        }
    };

    players.sort_unstable();
    players.dedup();
    Ok(players)
}

/// Resolve a player selector that must name exactly one seat.
pub fn resolve_single_player_sel(sel: &PlayerSel, ctx: &EvalContext<'_>) -> Result<PlayerId, KernelError> {
    let players = resolve_player_sel(sel, ctx)?;
    if players.len() == 1 {
        return Ok(players[0]);
    }
    Err(cardinality_error(
        sel.to_string(),
        sel.is_bound(),
        players.iter().map(ToString::to_string).collect(),
    ))
}

fn collect_bound_players(
    name: &str,
    value: &Value,
    count: usize,
    out: &mut PlayerSet,
) -> Result<(), KernelError> {
    match value {
        Value::Player(p) => out.push(checked_seat(p.index() as i64, count)?),
        Value::Int(i) => out.push(checked_seat(*i, count)?),
        Value::List(items) => {
            for item in items {
                collect_bound_players(name, item, count, out)?;
            }
        }
        other => {
            return Err(KernelError::type_mismatch(
                ValueType::Player,
                other.value_type(),
                format!("player binding `{name}`"),
            ))
        }
    }
    Ok(())
}

fn checked_seat(index: i64, count: usize) -> Result<PlayerId, KernelError> {
    PlayerId::from_index(index, count).ok_or_else(|| {
        KernelError::unknown(
            ReferenceKind::Player,
            index.to_string(),
            PlayerId::all(count).map(|p| p.to_string()),
        )
    })
}
