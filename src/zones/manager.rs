//! Token placement primitives over a state's zone map.
//!
//! These are the building blocks the interpreter uses to change zone
//! membership. They work on a state the caller already owns (a working
//! copy) and never touch the stacking gate; callers run the gate on the
//! proposed sequence before committing it.
//!
//! - Ordered insertion at the top, bottom or a random slot
//! - Token lookup by id, with the exactly-one-zone contract
//! - Removal and whole-state uniqueness checks

use im::Vector;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::{GameState, RngState, Token, TokenId, ZoneId};
use crate::error::{KernelError, ReferenceKind};

/// Where a token lands in its destination zone.
///
/// Index 0 of a zone is its top.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePosition {
    #[default]
    Top,
    Bottom,
    /// Uniform over the `len + 1` slots. An empty destination has one slot
    /// and consumes no draw.
    Random,
}

/// Where a token currently sits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenLocation {
    pub zone: ZoneId,
    pub index: usize,
}

/// Tokens of a zone, failing for zones the state does not hold.
pub fn zone_tokens<'a>(state: &'a GameState, zone: &ZoneId) -> Result<&'a Vector<Token>, KernelError> {
    state.zones.get(zone).ok_or_else(|| {
        KernelError::unknown(
            ReferenceKind::Zone,
            zone.as_str(),
            state.zones.keys().map(|z| z.as_str().to_string()),
        )
    })
}

/// Find the single zone holding a token.
///
/// Fails if the token is in no zone or in more than one.
pub fn locate_token(state: &GameState, id: &TokenId) -> Result<TokenLocation, KernelError> {
    let mut found = state.find_token(id);
    if found.len() != 1 {
        return Err(KernelError::TokenLocation {
            token: id.clone(),
            zones: found.into_iter().map(|(zone, _)| zone).collect(),
        });
    }
    let (zone, index) = found.remove(0);
    Ok(TokenLocation { zone, index })
}

/// Remove a token from whichever single zone holds it.
pub fn take_token(state: &mut GameState, id: &TokenId) -> Result<(ZoneId, Token), KernelError> {
    let location = locate_token(state, id)?;
    let tokens = state
        .zones
        .get_mut(&location.zone)
        .ok_or_else(|| KernelError::TokenLocation {
            token: id.clone(),
            zones: Vec::new(),
        })?;
    let token = tokens.remove(location.index);
    Ok((location.zone, token))
}

/// Insert a token into a zone sequence.
///
/// Returns the RNG state after any draw the position needed.
pub fn insert_token(
    tokens: &mut Vector<Token>,
    token: Token,
    position: ZonePosition,
    rng: &RngState,
) -> Result<RngState, KernelError> {
    match position {
        ZonePosition::Top => {
            tokens.push_front(token);
            Ok(rng.clone())
        }
        ZonePosition::Bottom => {
            tokens.push_back(token);
            Ok(rng.clone())
        }
        ZonePosition::Random => {
            if tokens.is_empty() {
                tokens.push_back(token);
                return Ok(rng.clone());
            }
            let (slot, next) = rng.next_int(0, tokens.len() as i64)?;
            tokens.insert(slot as usize, token);
            Ok(next)
        }
    }
}

/// Ids that appear more than once anywhere in the state.
#[must_use]
pub fn duplicate_token_ids(state: &GameState) -> Vec<TokenId> {
    let mut seen: FxHashSet<&TokenId> = FxHashSet::default();
    let mut duplicates: Vec<TokenId> = Vec::new();
    for tokens in state.zones.values() {
        for token in tokens {
            if !seen.insert(&token.id) {
                duplicates.push(token.id.clone());
            }
        }
    }
    duplicates.sort();
    duplicates.dedup();
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GameDef, ZoneDef};

    fn state_with_deck(ids: &[&str]) -> GameState {
        let def = GameDef::new("zones", 1, 2)
            .with_zone(ZoneDef::new("deck:none"))
            .with_zone(ZoneDef::new("discard:none"));
        let mut state = GameState::new(&def, 42, 2).unwrap();
        let deck: Vector<Token> = ids.iter().map(|id| Token::new(*id, "card")).collect();
        state.zones.insert(ZoneId::new("deck:none"), deck);
        state
    }

    fn ids(tokens: &Vector<Token>) -> Vec<&str> {
        tokens.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_top_and_bottom_insertion() {
        let rng = RngState::new(1);
        let mut tokens = Vector::new();

        insert_token(&mut tokens, Token::new("a", "card"), ZonePosition::Top, &rng).unwrap();
        insert_token(&mut tokens, Token::new("b", "card"), ZonePosition::Top, &rng).unwrap();
        insert_token(&mut tokens, Token::new("c", "card"), ZonePosition::Bottom, &rng).unwrap();

        assert_eq!(ids(&tokens), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_random_into_empty_zone_skips_draw() {
        let rng = RngState::new(1);
        let mut tokens = Vector::new();

        let after = insert_token(&mut tokens, Token::new("a", "card"), ZonePosition::Random, &rng).unwrap();

        assert_eq!(after, rng);
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_random_into_occupied_zone_draws_once() {
        let rng = RngState::new(1);
        let mut tokens: Vector<Token> = vec![Token::new("a", "card"), Token::new("b", "card")].into();

        let after = insert_token(&mut tokens, Token::new("c", "card"), ZonePosition::Random, &rng).unwrap();

        let (_, expected) = rng.next_int(0, 2).unwrap();
        assert_eq!(after, expected);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_locate_and_take() {
        let mut state = state_with_deck(&["a", "b", "c"]);

        let location = locate_token(&state, &TokenId::new("b")).unwrap();
        assert_eq!(location, TokenLocation { zone: ZoneId::new("deck:none"), index: 1 });

        let (zone, token) = take_token(&mut state, &TokenId::new("b")).unwrap();
        assert_eq!(zone, ZoneId::new("deck:none"));
        assert_eq!(token.id, TokenId::new("b"));
        assert_eq!(state.zone_size(&zone), 2);
    }

    #[test]
    fn test_locate_missing_token() {
        let state = state_with_deck(&["a"]);
        assert!(matches!(
            locate_token(&state, &TokenId::new("zzz")),
            Err(KernelError::TokenLocation { zones, .. }) if zones.is_empty()
        ));
    }

    #[test]
    fn test_locate_duplicated_token() {
        let mut state = state_with_deck(&["a"]);
        state
            .zones
            .insert(ZoneId::new("discard:none"), vec![Token::new("a", "card")].into());

        assert!(matches!(
            locate_token(&state, &TokenId::new("a")),
            Err(KernelError::TokenLocation { zones, .. }) if zones.len() == 2
        ));
        assert_eq!(duplicate_token_ids(&state), vec![TokenId::new("a")]);
    }

    #[test]
    fn test_unknown_zone() {
        let state = state_with_deck(&[]);
        let err = zone_tokens(&state, &ZoneId::new("dek:none")).unwrap_err();
        match err {
            KernelError::UnknownReference { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("deck:none"));
            }
            other => panic!("Expected UnknownReference, got {other:?}"),
        }
    }
}
