//! Definitions and states survive a JSON round trip, and the canonical byte
//! encoding is stable.

mod common;

use common::{coin_def, SEED};
use tabletop_kernel::core::ActionPipelineDef;
use tabletop_kernel::{
    initial_state, ActionDef, Condition, Effect, EventMatcher, GameDef, GameState, Move, PipelineStage, Query,
    TokenSel, TriggerDef, ValueExpr, ZonePosition,
};

fn rich_def() -> GameDef {
    coin_def()
        .with_setup(vec![
            Effect::create_token("troop", "available:none".parse().unwrap()),
            Effect::create_token("troop", "available:none".parse().unwrap()),
        ])
        .with_action(
            ActionDef::new("deploy").in_phase("main").with_effects(vec![
                Effect::choose_one(
                    "space",
                    "$space",
                    Query::Zones {
                        category: Some("city".into()),
                        owner: None,
                    },
                ),
                Effect::for_each(
                    "$t",
                    Query::TokensInZone {
                        zone: "available:none".parse().unwrap(),
                        filter: Vec::new(),
                    },
                    vec![Effect::move_token(
                        TokenSel::Bound("$t".into()),
                        "$space".parse().unwrap(),
                        ZonePosition::Bottom,
                    )],
                ),
            ]),
        )
        .with_action(ActionDef::new("rally"))
        .with_pipeline(
            ActionPipelineDef::new("rally-main", "rally")
                .applicable_when(Condition::Const(true))
                .with_cost(
                    Some(Condition::ge(ValueExpr::global("aid"), 1)),
                    vec![Effect::add_global("aid", -1)],
                )
                .with_stage(PipelineStage::new("place", vec![Effect::add_global("aid", 3)]))
                .partial(),
        )
        .with_trigger(
            TriggerDef::new("monsoon-aid", EventMatcher::PhaseEnter { phase: None })
                .when(Condition::eq(ValueExpr::global("monsoon"), true))
                .with_effects(vec![Effect::add_global("aid", 1)]),
        )
}

#[test]
fn test_game_def_json_roundtrip() {
    let def = rich_def();
    let json = serde_json::to_string(&def).unwrap();
    let back: GameDef = serde_json::from_str(&json).unwrap();
    assert_eq!(back, def);
}

#[test]
fn test_effect_json_is_tagged_by_kind() {
    let def = rich_def();
    let json = serde_json::to_value(&def).unwrap();
    let deploy = &json["actions"][0]["effects"];
    assert_eq!(deploy[0]["kind"], "chooseOne");
    assert_eq!(deploy[1]["kind"], "forEach");
}

#[test]
fn test_state_json_roundtrip_after_setup() {
    let def = rich_def();
    let state = initial_state(&def, SEED, 2).unwrap();
    assert_eq!(state.total_tokens(), 2);

    let json = serde_json::to_string(&state).unwrap();
    let back: GameState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
    assert_eq!(back.to_bytes().unwrap(), state.to_bytes().unwrap());
}

#[test]
fn test_same_seed_same_bytes() {
    let def = rich_def();
    let a = initial_state(&def, SEED, 2).unwrap();
    let b = initial_state(&def, SEED, 2).unwrap();
    assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());

    let c = initial_state(&def, SEED + 1, 2).unwrap();
    assert_ne!(a.to_bytes().unwrap(), c.to_bytes().unwrap());
}

#[test]
fn test_move_json_roundtrip() {
    let mv = Move::new("deploy").with_param("space", "hue:none");
    let json = serde_json::to_string(&mv).unwrap();
    let back: Move = serde_json::from_str(&json).unwrap();
    assert_eq!(back, mv);
}
