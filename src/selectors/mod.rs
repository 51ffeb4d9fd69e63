//! Player and zone selectors.
//!
//! A selector is a value naming one or more players or zones relative to
//! the current evaluation context. Selectors are written as strings in game
//! definitions and parsed into the closed forms below:
//!
//! | Player form | Meaning |
//! |-------------|---------|
//! | `actor` / `active` | executing player / player whose turn it is |
//! | `all` / `allOther` | every seat / every seat but the actor |
//! | `left` / `right` | actor's neighbour, one seat down / up (wrapping) |
//! | `2` | literal seat |
//! | `$name` | player (or list of players) held by a binding |
//!
//! Zone forms are `base:none`, `base:<seat>`, `base:all`, `base:<player form>`
//! and `$name` (a zone id or a list of zone ids held by a binding).
//!
//! Resolution always produces a sorted, de-duplicated set: players
//! numerically, zones lexicographically.

pub mod player;
pub mod token;
pub mod zone;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, Value, ZoneId};
use crate::error::{KernelError, ReferenceKind};
use crate::eval::EvalContext;

pub use player::{resolve_player_sel, resolve_single_player_sel, PlayerSet};
pub use token::{resolve_token, resolve_token_id, TokenSel};
pub use zone::{resolve_single_zone_sel, resolve_zone_sel};

const PLAYER_KEYWORDS: [&str; 6] = ["actor", "active", "all", "allOther", "left", "right"];

/// Player selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlayerSel {
    Actor,
    Active,
    All,
    AllOther,
    Left,
    Right,
    Id(PlayerId),
    /// Binding name, including the leading `$`.
    Bound(String),
}

impl PlayerSel {
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self, PlayerSel::Bound(_))
    }
}

impl FromStr for PlayerSel {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actor" => Ok(PlayerSel::Actor),
            "active" => Ok(PlayerSel::Active),
            "all" => Ok(PlayerSel::All),
            "allOther" => Ok(PlayerSel::AllOther),
            "left" => Ok(PlayerSel::Left),
            "right" => Ok(PlayerSel::Right),
            _ if s.starts_with('$') && s.len() > 1 => Ok(PlayerSel::Bound(s.to_string())),
            _ => s
                .parse::<u8>()
                .map(|seat| PlayerSel::Id(PlayerId::new(seat)))
                .map_err(|_| KernelError::unknown(ReferenceKind::Player, s, PLAYER_KEYWORDS)),
        }
    }
}

impl fmt::Display for PlayerSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSel::Actor => f.write_str("actor"),
            PlayerSel::Active => f.write_str("active"),
            PlayerSel::All => f.write_str("all"),
            PlayerSel::AllOther => f.write_str("allOther"),
            PlayerSel::Left => f.write_str("left"),
            PlayerSel::Right => f.write_str("right"),
            PlayerSel::Id(p) => write!(f, "{p}"),
            PlayerSel::Bound(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for PlayerSel {
    type Error = KernelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PlayerSel> for String {
    fn from(sel: PlayerSel) -> Self {
        sel.to_string()
    }
}

impl From<PlayerId> for PlayerSel {
    fn from(p: PlayerId) -> Self {
        PlayerSel::Id(p)
    }
}

/// Zone selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ZoneSel {
    /// A concrete id: `base:none` or `base:<seat>`.
    Literal(ZoneId),
    /// `base:all`: every seated player's zone of that base.
    AllOwners(String),
    /// `base:<player form>`: owner resolved through the player selector.
    Owned { base: String, owner: PlayerSel },
    /// Binding name, including the leading `$`.
    Bound(String),
}

impl ZoneSel {
    /// Selector for one concrete zone.
    pub fn id(zone: impl Into<ZoneId>) -> Self {
        ZoneSel::Literal(zone.into())
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self, ZoneSel::Bound(_))
    }
}

impl FromStr for ZoneSel {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('$') && s.len() > 1 {
            return Ok(ZoneSel::Bound(s.to_string()));
        }
        let Some((base, owner)) = s.rsplit_once(':') else {
            return Err(KernelError::unknown(
                ReferenceKind::Zone,
                s,
                [format!("{s}:none"), format!("{s}:all")],
            ));
        };
        if owner == "none" || owner.parse::<u8>().is_ok() {
            return Ok(ZoneSel::Literal(ZoneId::new(s)));
        }
        if owner == "all" {
            return Ok(ZoneSel::AllOwners(base.to_string()));
        }
        Ok(ZoneSel::Owned {
            base: base.to_string(),
            owner: owner.parse()?,
        })
    }
}

impl fmt::Display for ZoneSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneSel::Literal(zone) => write!(f, "{zone}"),
            ZoneSel::AllOwners(base) => write!(f, "{base}:all"),
            ZoneSel::Owned { base, owner } => write!(f, "{base}:{owner}"),
            ZoneSel::Bound(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for ZoneSel {
    type Error = KernelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ZoneSel> for String {
    fn from(sel: ZoneSel) -> Self {
        sel.to_string()
    }
}

impl From<ZoneId> for ZoneSel {
    fn from(zone: ZoneId) -> Self {
        ZoneSel::Literal(zone)
    }
}

/// Value of a `$name` selector's binding.
///
/// An unbound name resolves to nothing, which is the deferrable cardinality
/// failure rather than a missing binding.
pub(crate) fn bound_selector_value<'a>(name: &str, ctx: &EvalContext<'a>) -> Result<&'a Value, KernelError> {
    ctx.binding(name)
        .map_err(|_| cardinality_error(name.to_string(), true, Vec::new()))
}

/// Cardinality failure for a `resolve_single_*` call.
///
/// Only `$name` selectors that resolved to nothing are deferrable: an
/// upstream choice may still bind them.
pub(crate) fn cardinality_error(selector: String, bound: bool, resolved: Vec<String>) -> KernelError {
    KernelError::SelectorCardinality {
        selector,
        resolved_count: resolved.len(),
        deferrable: bound && resolved.is_empty(),
        resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_player_forms() {
        assert_eq!("actor".parse::<PlayerSel>().unwrap(), PlayerSel::Actor);
        assert_eq!("allOther".parse::<PlayerSel>().unwrap(), PlayerSel::AllOther);
        assert_eq!("3".parse::<PlayerSel>().unwrap(), PlayerSel::Id(PlayerId::new(3)));
        assert_eq!("$p".parse::<PlayerSel>().unwrap(), PlayerSel::Bound("$p".to_string()));
    }

    #[test]
    fn test_parse_unknown_player_form_suggests() {
        match "actr".parse::<PlayerSel>() {
            Err(KernelError::UnknownReference { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("actor"));
            }
            other => panic!("Expected UnknownReference, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_zone_forms() {
        assert_eq!("deck:none".parse::<ZoneSel>().unwrap(), ZoneSel::id("deck:none"));
        assert_eq!("hand:1".parse::<ZoneSel>().unwrap(), ZoneSel::id("hand:1"));
        assert_eq!("hand:all".parse::<ZoneSel>().unwrap(), ZoneSel::AllOwners("hand".to_string()));
        assert_eq!(
            "hand:$p".parse::<ZoneSel>().unwrap(),
            ZoneSel::Owned {
                base: "hand".to_string(),
                owner: PlayerSel::Bound("$p".to_string())
            }
        );
        assert_eq!("$space".parse::<ZoneSel>().unwrap(), ZoneSel::Bound("$space".to_string()));
        assert!("deck".parse::<ZoneSel>().is_err());
        assert!("hand:nobody".parse::<ZoneSel>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["deck:none", "hand:all", "hand:left", "tableau:$p", "$zones"] {
            let sel: ZoneSel = text.parse().unwrap();
            assert_eq!(sel.to_string(), text);
        }
    }

    #[test]
    fn test_selector_serde_as_string() {
        let sel: ZoneSel = "hand:actor".parse().unwrap();
        let json = serde_json::to_string(&sel).unwrap();
        assert_eq!(json, "\"hand:actor\"");
        let back: ZoneSel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sel);
    }
}
