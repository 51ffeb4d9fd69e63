//! Shared fixture: a small counterinsurgency-style map.
//!
//! Two adjacent cities and a province, a force pool, casualties, a deck and
//! per-player hands. Cities hold at most two bases.

#![allow(dead_code)]

use tabletop_kernel::core::{
    MarkerLatticeDef, PhaseDef, Token, TokenTypeDef, VarDef, ZoneAdjacency, ZoneDef,
};
use tabletop_kernel::stacking::{PieceFilter, SpaceFilter, StackingConstraint, StackingRule};
use tabletop_kernel::{
    apply_effects, Bindings, Effect, EffectContext, EffectOutcome, GameDef, GameState, KernelError, ZoneId,
};

pub const SEED: u64 = 42;

pub fn coin_def() -> GameDef {
    GameDef::new("coin-fixture", 2, 4)
        .with_global_var(VarDef::int("aid", 0, 0, 10))
        .with_global_var(VarDef::bool("monsoon", false))
        .with_per_player_var(VarDef::int("resources", 5, 0, 40))
        .with_zone(
            ZoneDef::new("saigon:none")
                .with_category("city")
                .with_attribute("population", 6i64)
                .adjacent(ZoneAdjacency::to("hue:none"))
                .adjacent(ZoneAdjacency::to("quang-tri:none")),
        )
        .with_zone(ZoneDef::new("hue:none").with_category("city").with_attribute("population", 2i64))
        .with_zone(ZoneDef::new("quang-tri:none").with_category("province"))
        .with_zone(ZoneDef::new("available:none"))
        .with_zone(ZoneDef::new("casualties:none"))
        .with_zone(ZoneDef::new("deck:none").hidden())
        .with_zone(ZoneDef::new("discard:none"))
        .with_zone(ZoneDef::new("hand:0").owner_only())
        .with_zone(ZoneDef::new("hand:1").owner_only())
        .with_token_type(TokenTypeDef::new("base").with_faction("us"))
        .with_token_type(TokenTypeDef::new("troop").with_faction("us").with_prop("strength", 2i64))
        .with_token_type(TokenTypeDef::new("guerrilla").with_faction("vc").with_prop("active", false))
        .with_token_type(TokenTypeDef::new("card"))
        .with_marker_lattice(
            MarkerLatticeDef::new("support", ["activeOpposition", "neutral", "activeSupport"])
                .with_default("neutral"),
        )
        .with_phase(PhaseDef::new("main"))
        .with_phase(PhaseDef::new("cleanup"))
        .with_stacking_constraint(
            StackingConstraint::new(
                "max-2-bases",
                SpaceFilter::category("city"),
                PieceFilter::types(["base"]),
                StackingRule::MaxCount(2),
            )
            .with_description("At most two bases per city"),
        )
}

pub fn zone(id: &str) -> ZoneId {
    ZoneId::new(id)
}

/// Fresh two-player state with the given tokens placed, top first.
pub fn state_with(def: &GameDef, placements: &[(&str, Vec<Token>)]) -> GameState {
    let mut state = GameState::new(def, SEED, 2).expect("fixture state");
    for (id, tokens) in placements {
        state.zones.insert(zone(id), tokens.iter().cloned().collect());
    }
    state
}

pub fn tokens(prefix: &str, token_type: &str, count: usize) -> Vec<Token> {
    (0..count)
        .map(|i| Token::new(format!("{prefix}{i}"), token_type))
        .collect()
}

pub fn run(def: &GameDef, state: &GameState, effects: &[Effect]) -> Result<EffectOutcome, KernelError> {
    apply_effects(effects, state, &Bindings::new(), &EffectContext::new(def, state))
}

pub fn ids(state: &GameState, id: &str) -> Vec<String> {
    state
        .zone(&zone(id))
        .map(|tokens| tokens.iter().map(|t| t.id.as_str().to_string()).collect())
        .unwrap_or_default()
}
