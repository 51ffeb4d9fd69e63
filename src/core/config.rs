//! Static definition building blocks.
//!
//! Games configure the engine by declaring:
//! - `ZoneDef`: zones, their ownership, ordering, adjacency and attributes
//! - `VarDef`: global and per-player variables with bounds
//! - `TokenTypeDef`: token types with default properties and faction
//! - `MarkerLatticeDef`: ordered marker states for zones and globals
//! - `TurnOrderConfig`: how the active player advances
//! - `EngineLimits`: admission control for effect programs
//!
//! These are assembled into a `GameDef` (see `core::game_def`). The engine
//! trusts a definition's internal consistency; it never re-validates it.

use im::OrdMap;
use serde::{Deserialize, Serialize};

use super::player::PlayerId;
use super::value::{AttributeValue, ScalarValue, VarValue};

/// Zone identifier of the form `"<base>:<owner>"`.
///
/// The owner part is `none` for shared zones or a seat index for
/// player-owned ones. Ordering is lexicographic on the full id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id of a shared zone (`base:none`).
    #[must_use]
    pub fn shared(base: &str) -> Self {
        Self(format!("{base}:none"))
    }

    /// Build the id of a player-owned zone (`base:<seat>`).
    #[must_use]
    pub fn owned(base: &str, player: PlayerId) -> Self {
        Self(format!("{base}:{}", player.index()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the last `:`; the whole id if there is no owner part.
    #[must_use]
    pub fn base(&self) -> &str {
        match self.0.rsplit_once(':') {
            Some((base, _)) => base,
            None => &self.0,
        }
    }

    /// Parse the owner part. Ids without a recognizable owner are shared.
    #[must_use]
    pub fn owner(&self) -> ZoneOwner {
        match self.0.rsplit_once(':') {
            Some((_, owner)) => owner
                .parse::<u8>()
                .map(|seat| ZoneOwner::Player(PlayerId::new(seat)))
                .unwrap_or(ZoneOwner::None),
            None => ZoneOwner::None,
        }
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resolved owner of a concrete zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneOwner {
    None,
    Player(PlayerId),
}

/// Opaque phase identifier. Games define their own phases.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhaseId(pub String);

impl PhaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Zone visibility rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneVisibility {
    /// All tokens visible to all players.
    #[default]
    Public,
    /// Tokens visible only to the zone owner.
    OwnerOnly,
    /// Tokens not visible to anyone.
    Hidden,
}

/// Default insertion discipline of a zone.
///
/// Effects always name an explicit insertion position, so this is
/// descriptive rather than enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneOrdering {
    #[default]
    Stack,
    Queue,
    Set,
}

/// Whether an adjacency edge can be walked both ways.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjacencyDirection {
    #[default]
    Bidirectional,
    Directed,
}

/// One adjacency edge out of a zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneAdjacency {
    pub to: ZoneId,
    pub direction: AdjacencyDirection,
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: OrdMap<String, AttributeValue>,
}

impl ZoneAdjacency {
    pub fn to(zone: impl Into<ZoneId>) -> Self {
        Self {
            to: zone.into(),
            direction: AdjacencyDirection::Bidirectional,
            category: None,
            attributes: OrdMap::new(),
        }
    }

    /// Make this edge one-way (builder pattern).
    #[must_use]
    pub fn directed(mut self) -> Self {
        self.direction = AdjacencyDirection::Directed;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Whether a zone is shared or belongs to a seat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneOwnerKind {
    #[default]
    None,
    Player,
}

/// Configuration for a single concrete zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDef {
    pub id: ZoneId,
    pub owner: ZoneOwnerKind,
    pub visibility: ZoneVisibility,
    pub ordering: ZoneOrdering,
    #[serde(default)]
    pub adjacent_to: Vec<ZoneAdjacency>,
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: OrdMap<String, AttributeValue>,
}

impl ZoneDef {
    /// Create a zone definition; the owner kind follows the id's owner part.
    pub fn new(id: impl Into<ZoneId>) -> Self {
        let id = id.into();
        let owner = match id.owner() {
            ZoneOwner::None => ZoneOwnerKind::None,
            ZoneOwner::Player(_) => ZoneOwnerKind::Player,
        };
        Self {
            id,
            owner,
            visibility: ZoneVisibility::Public,
            ordering: ZoneOrdering::Stack,
            adjacent_to: Vec::new(),
            category: None,
            attributes: OrdMap::new(),
        }
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visibility = ZoneVisibility::Hidden;
        self
    }

    #[must_use]
    pub fn owner_only(mut self) -> Self {
        self.visibility = ZoneVisibility::OwnerOnly;
        self
    }

    #[must_use]
    pub fn with_ordering(mut self, ordering: ZoneOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn adjacent(mut self, edge: ZoneAdjacency) -> Self {
        self.adjacent_to.push(edge);
        self
    }
}

/// Shape and bounds of a declared variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Int { init: i64, min: i64, max: i64 },
    Bool { init: bool },
}

/// A declared global or per-player variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
}

impl VarDef {
    /// Integer variable with inclusive bounds. `init` is clamped into them,
    /// and inverted bounds are swapped.
    pub fn int(name: impl Into<String>, init: i64, min: i64, max: i64) -> Self {
        let (min, max) = (min.min(max), min.max(max));
        Self {
            name: name.into(),
            kind: VarKind::Int { init: init.clamp(min, max), min, max },
        }
    }

    pub fn bool(name: impl Into<String>, init: bool) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Bool { init },
        }
    }

    #[must_use]
    pub fn initial_value(&self) -> VarValue {
        match self.kind {
            VarKind::Int { init, .. } => VarValue::Int(self.clamp(init)),
            VarKind::Bool { init } => VarValue::Bool(init),
        }
    }

    /// Clamp an integer into this variable's bounds. Bools have none.
    ///
    /// Bounds are read in ascending order, so a deserialized definition with
    /// `min > max` still clamps.
    #[must_use]
    pub fn clamp(&self, value: i64) -> i64 {
        match self.kind {
            VarKind::Int { min, max, .. } => value.clamp(min.min(max), min.max(max)),
            VarKind::Bool { .. } => value,
        }
    }
}

/// A declared token type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTypeDef {
    pub id: String,

    /// Canonical faction, consulted by stacking piece filters.
    pub faction: Option<String>,

    /// Default property values copied onto created tokens.
    #[serde(default)]
    pub props: OrdMap<String, ScalarValue>,
}

impl TokenTypeDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            faction: None,
            props: OrdMap::new(),
        }
    }

    #[must_use]
    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }

    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

/// An ordered set of marker states (e.g. `activeOpposition` .. `activeSupport`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLatticeDef {
    pub id: String,
    pub states: Vec<String>,
    pub default_state: String,
}

impl MarkerLatticeDef {
    /// The first state is the default.
    pub fn new(id: impl Into<String>, states: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let states: Vec<String> = states.into_iter().map(Into::into).collect();
        let default_state = states.first().cloned().unwrap_or_default();
        Self {
            id: id.into(),
            states,
            default_state,
        }
    }

    #[must_use]
    pub fn with_default(mut self, state: impl Into<String>) -> Self {
        self.default_state = state.into();
        self
    }

    #[must_use]
    pub fn position(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| s == state)
    }
}

/// How the active player advances at turn end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOrderConfig {
    #[default]
    RoundRobin,
    FixedOrder { order: Vec<PlayerId> },
    Simultaneous,
    CardDriven,
}

/// Admission control for effect programs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Effect nodes one top-level call (or one move) may dispatch.
    pub max_effect_ops: usize,
    /// How deep trigger cascades may go before being truncated.
    pub max_trigger_depth: usize,
    /// Largest result a single query may produce.
    pub max_query_items: usize,
    /// Largest number of subsets `evaluateSubset` may enumerate.
    pub max_subset_combinations: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_effect_ops: 10_000,
            max_trigger_depth: 8,
            max_query_items: 10_000,
            max_subset_combinations: 10_000,
        }
    }
}
