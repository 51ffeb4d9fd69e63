//! Property tests: determinism, bounds, token conservation and budget.

mod common;

use common::{coin_def, run, state_with, tokens};
use proptest::prelude::*;
use tabletop_kernel::{
    apply_effects, Bindings, Effect, EffectContext, KernelError, TokenSel, VarValue, ZonePosition, ZoneSel,
};

const ZONES: [&str; 4] = ["saigon:none", "quang-tri:none", "available:none", "casualties:none"];

fn position() -> impl Strategy<Value = ZonePosition> {
    prop_oneof![
        Just(ZonePosition::Top),
        Just(ZonePosition::Bottom),
        Just(ZonePosition::Random),
    ]
}

/// Relocations only: moves of existing troops plus shuffles.
fn relocation() -> impl Strategy<Value = Effect> {
    prop_oneof![
        (0usize..6, 0usize..ZONES.len(), position()).prop_map(|(token, to, position)| {
            Effect::move_token(TokenSel::id(format!("t{token}")), ZoneSel::id(ZONES[to]), position)
        }),
        (0usize..ZONES.len()).prop_map(|zone| Effect::Shuffle {
            zone: ZoneSel::id(ZONES[zone]),
        }),
        (0usize..ZONES.len(), 0usize..ZONES.len(), 0i64..3).prop_map(|(from, to, count)| {
            Effect::draw(ZoneSel::id(ZONES[from]), ZoneSel::id(ZONES[to]), count)
        }),
    ]
}

proptest! {
    #[test]
    fn prop_same_inputs_same_bytes(seed in any::<u64>(), program in prop::collection::vec(relocation(), 0..12)) {
        let def = coin_def();
        let mut state = state_with(&def, &[("available:none", tokens("t", "troop", 6))]);
        state.rng = tabletop_kernel::RngState::new(seed);

        let first = run(&def, &state, &program).map(|o| o.state().to_bytes().unwrap());
        let second = run(&def, &state, &program).map(|o| o.state().to_bytes().unwrap());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_relocations_conserve_tokens(program in prop::collection::vec(relocation(), 0..12)) {
        let def = coin_def();
        let state = state_with(&def, &[("available:none", tokens("t", "troop", 6))]);

        if let Ok(outcome) = run(&def, &state, &program) {
            prop_assert_eq!(outcome.state().total_tokens(), 6);
            prop_assert!(tabletop_kernel::zones::duplicate_token_ids(outcome.state()).is_empty());
        }
    }

    #[test]
    fn prop_int_vars_stay_in_bounds(deltas in prop::collection::vec(-30i64..30, 1..20)) {
        let def = coin_def();
        let state = state_with(&def, &[]);
        let program: Vec<Effect> = deltas.iter().map(|d| Effect::add_global("aid", *d)).collect();

        let outcome = run(&def, &state, &program).unwrap();
        let Some(VarValue::Int(aid)) = outcome.state().global_var("aid") else {
            panic!("aid is an int variable");
        };
        prop_assert!((0..=10).contains(&aid));
    }

    #[test]
    fn prop_create_and_destroy_shift_count_by_one(creates in 0usize..5) {
        let def = coin_def();
        let state = state_with(&def, &[("available:none", tokens("t", "troop", 2))]);

        let program: Vec<Effect> = (0..creates)
            .map(|_| Effect::create_token("troop", ZoneSel::id("available:none")))
            .collect();
        let created = run(&def, &state, &program).unwrap();
        prop_assert_eq!(created.state().total_tokens(), 2 + creates);

        let destroyed = run(&def, created.state(), &[Effect::DestroyToken { token: TokenSel::id("t0") }]).unwrap();
        prop_assert_eq!(destroyed.state().total_tokens(), 1 + creates);
    }

    #[test]
    fn prop_budget_is_monotone(len in 1usize..10, max in 0usize..12) {
        let def = coin_def();
        let state = state_with(&def, &[]);
        let program: Vec<Effect> = (0..len).map(|_| Effect::add_global("aid", 1)).collect();

        let with = |max: usize| {
            let ctx = EffectContext::new(&def, &state).with_max_effect_ops(max);
            apply_effects(&program, &state, &Bindings::new(), &ctx)
        };

        match with(max) {
            Ok(_) => {
                prop_assert!(max >= len);
                prop_assert!(with(max + 1).is_ok());
            }
            Err(err) => {
                prop_assert!(max < len);
                let is_budget = matches!(err, KernelError::BudgetExceeded { .. });
                prop_assert!(is_budget);
            }
        }
    }
}

#[test]
fn test_zero_budget_rejects_any_program() {
    let def = coin_def();
    let state = state_with(&def, &[]);
    let ctx = EffectContext::new(&def, &state).with_max_effect_ops(0);

    for effect in [
        Effect::add_global("aid", 0),
        Effect::Shuffle {
            zone: ZoneSel::id("deck:none"),
        },
        Effect::for_each("$x", tabletop_kernel::Query::Enums(Vec::new()), Vec::new()),
    ] {
        assert!(matches!(
            apply_effects(&[effect], &state, &Bindings::new(), &ctx),
            Err(KernelError::BudgetExceeded { max_effect_ops: 0, .. })
        ));
    }
}

#[test]
fn test_shuffle_is_seeded() {
    let def = coin_def();
    let state = state_with(&def, &[("deck:none", tokens("c", "card", 20))]);
    let shuffle = [Effect::Shuffle {
        zone: ZoneSel::id("deck:none"),
    }];

    let a = run(&def, &state, &shuffle).unwrap();
    let b = run(&def, &state, &shuffle).unwrap();
    assert_eq!(a.state().zone(&common::zone("deck:none")), b.state().zone(&common::zone("deck:none")));
    assert_ne!(a.state().rng, state.rng);

    let mut reseeded = state.clone();
    reseeded.rng = tabletop_kernel::RngState::new(common::SEED + 1);
    let c = run(&def, &reseeded, &shuffle).unwrap();
    assert_ne!(a.state().zone(&common::zone("deck:none")), c.state().zone(&common::zone("deck:none")));
}
