//! Game state: one immutable snapshot per step.
//!
//! ## GameState
//!
//! Complete game state:
//! - Global and per-player variables
//! - Zones (ordered token sequences) and markers
//! - RNG state and the token ordinal counter
//! - Phase, active player, turn counter
//! - Per-action usage counters
//! - Interrupt-phase stack and turn-order runtime
//!
//! Uses `im` persistent data structures, so cloning a state is O(1) and a
//! changed copy shares everything it did not touch. The engine never
//! mutates a state it has handed to a caller; it clones and edits the copy.

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use super::config::{PhaseId, TurnOrderConfig, ZoneId};
use super::game_def::GameDef;
use super::player::PlayerId;
use super::rng::RngState;
use super::token::{Token, TokenId};
use super::value::VarValue;
use crate::error::KernelError;

/// Variable name -> value.
pub type VarMap = OrdMap<String, VarValue>;

/// Scope an action usage limit counts over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageScope {
    Turn,
    Phase,
    Game,
}

/// How often an action has resolved, per scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionUsage {
    pub turn: u32,
    pub phase: u32,
    pub game: u32,
}

impl ActionUsage {
    #[must_use]
    pub fn count(&self, scope: UsageScope) -> u32 {
        match scope {
            UsageScope::Turn => self.turn,
            UsageScope::Phase => self.phase,
            UsageScope::Game => self.game,
        }
    }
}

/// A suspended phase waiting for an interrupt to pop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptFrame {
    pub phase: PhaseId,
    pub resume_phase: PhaseId,
}

/// A pending right to run an action without paying its cost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeOperationGrant {
    pub player: PlayerId,
    /// Actions the grant covers. Empty covers any action.
    pub action_ids: Vec<String>,
}

impl FreeOperationGrant {
    #[must_use]
    pub fn covers(&self, player: PlayerId, action_id: &str) -> bool {
        self.player == player
            && (self.action_ids.is_empty() || self.action_ids.iter().any(|a| a == action_id))
    }
}

/// Eligibility to apply at the next turn boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityOverride {
    pub player: PlayerId,
    pub eligible: bool,
}

/// How long a lasting effect stays active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastingDuration {
    Turn,
    Game,
}

/// A named effect that stays in force across moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastingEffect {
    pub id: String,
    pub duration: LastingDuration,
}

/// Card-driven turn-order bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDrivenRuntime {
    pub eligibility: OrdMap<PlayerId, bool>,
    pub pending_free_operation_grants: Vector<FreeOperationGrant>,
    pub pending_eligibility_overrides: Vector<EligibilityOverride>,
    pub active_lasting_effects: Vector<LastingEffect>,
}

/// Turn-order runtime, shaped by the configured turn-order kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOrderState {
    RoundRobin,
    FixedOrder { current_index: usize },
    Simultaneous { submitted: OrdMap<PlayerId, bool> },
    CardDriven(CardDrivenRuntime),
}

impl TurnOrderState {
    /// Fresh runtime for a configuration.
    #[must_use]
    pub fn initial(config: &TurnOrderConfig, player_count: usize) -> Self {
        match config {
            TurnOrderConfig::RoundRobin => TurnOrderState::RoundRobin,
            TurnOrderConfig::FixedOrder { .. } => TurnOrderState::FixedOrder { current_index: 0 },
            TurnOrderConfig::Simultaneous => TurnOrderState::Simultaneous {
                submitted: PlayerId::all(player_count).map(|p| (p, false)).collect(),
            },
            TurnOrderConfig::CardDriven => TurnOrderState::CardDriven(CardDrivenRuntime {
                eligibility: PlayerId::all(player_count).map(|p| (p, true)).collect(),
                ..CardDrivenRuntime::default()
            }),
        }
    }
}

/// Full game state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    player_count: usize,

    pub global_vars: VarMap,

    /// One variable map per seated player, indexed by seat.
    pub player_vars: Vector<VarMap>,

    /// Zone id -> tokens, index 0 is the top.
    pub zones: OrdMap<ZoneId, Vector<Token>>,

    /// Zone id -> marker -> state label. Absent entries read as the lattice default.
    pub zone_markers: OrdMap<ZoneId, OrdMap<String, String>>,

    pub global_markers: OrdMap<String, String>,

    pub rng: RngState,

    /// Source of fresh token ids.
    pub next_token_ordinal: u64,

    pub current_phase: PhaseId,

    pub active_player: PlayerId,

    /// Turn number (starts at 1).
    pub turn_count: u32,

    pub action_usage: OrdMap<String, ActionUsage>,

    pub interrupt_stack: Vector<InterruptFrame>,

    pub turn_order: TurnOrderState,
}

impl GameState {
    /// Build the bare starting state for a definition.
    ///
    /// Variables take their declared initial values, every declared zone
    /// starts empty, the phase is the first declared phase. No effects run;
    /// see `rules::initial_state` for the full setup lifecycle.
    pub fn new(def: &GameDef, seed: u64, player_count: usize) -> Result<Self, KernelError> {
        let (min, max) = def.player_range();
        if player_count < min || player_count > max || player_count == 0 || player_count > 255 {
            return Err(KernelError::PlayerCount {
                requested: player_count,
                min,
                max,
            });
        }

        let global_vars: VarMap = def
            .global_vars
            .iter()
            .map(|v| (v.name.clone(), v.initial_value()))
            .collect();

        let player_template: VarMap = def
            .per_player_vars
            .iter()
            .map(|v| (v.name.clone(), v.initial_value()))
            .collect();

        let zones = def
            .zones
            .iter()
            .map(|z| (z.id.clone(), Vector::new()))
            .collect();

        let first_phase = def.phases.first().map(|p| p.id.clone()).unwrap_or_default();

        Ok(Self {
            player_count,
            global_vars,
            player_vars: (0..player_count).map(|_| player_template.clone()).collect(),
            zones,
            zone_markers: OrdMap::new(),
            global_markers: OrdMap::new(),
            rng: RngState::new(seed),
            next_token_ordinal: 0,
            current_phase: first_phase,
            active_player: PlayerId::new(0),
            turn_count: 1,
            action_usage: OrdMap::new(),
            interrupt_stack: Vector::new(),
            turn_order: TurnOrderState::initial(&def.turn_order, player_count),
        })
    }

    /// Get player count.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// Iterate over all seated player IDs.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> {
        PlayerId::all(self.player_count)
    }

    // === Variables ===

    #[must_use]
    pub fn global_var(&self, name: &str) -> Option<VarValue> {
        self.global_vars.get(name).copied()
    }

    #[must_use]
    pub fn player_var(&self, player: PlayerId, name: &str) -> Option<VarValue> {
        self.player_vars.get(player.index())?.get(name).copied()
    }

    // === Zones ===

    /// Tokens in a zone, top first.
    #[must_use]
    pub fn zone(&self, zone: &ZoneId) -> Option<&Vector<Token>> {
        self.zones.get(zone)
    }

    #[must_use]
    pub fn zone_size(&self, zone: &ZoneId) -> usize {
        self.zones.get(zone).map_or(0, Vector::len)
    }

    /// Total number of tokens across all zones.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.zones.values().map(Vector::len).sum()
    }

    /// Every zone holding a token with this id, with its index.
    #[must_use]
    pub fn find_token(&self, id: &TokenId) -> Vec<(ZoneId, usize)> {
        self.zones
            .iter()
            .filter_map(|(zone, tokens)| {
                tokens
                    .iter()
                    .position(|t| &t.id == id)
                    .map(|index| (zone.clone(), index))
            })
            .collect()
    }

    /// Next free minted id for `token_type` and the ordinal it used.
    ///
    /// Ordinals already taken by tokens placed in the state are skipped.
    #[must_use]
    pub fn mint_token_id(&self, token_type: &str) -> (TokenId, u64) {
        let mut ordinal = self.next_token_ordinal;
        loop {
            let id = TokenId::minted(token_type, ordinal);
            if self.find_token(&id).is_empty() {
                return (id, ordinal);
            }
            ordinal += 1;
        }
    }

    // === Markers ===

    #[must_use]
    pub fn zone_marker(&self, zone: &ZoneId, marker: &str) -> Option<&str> {
        self.zone_markers.get(zone)?.get(marker).map(String::as_str)
    }

    #[must_use]
    pub fn global_marker(&self, marker: &str) -> Option<&str> {
        self.global_markers.get(marker).map(String::as_str)
    }

    // === Usage ===

    #[must_use]
    pub fn action_usage(&self, action_id: &str) -> ActionUsage {
        self.action_usage.get(action_id).copied().unwrap_or_default()
    }

    // === Encoding ===

    /// Canonical byte encoding, used for replay fingerprints and
    /// byte-for-byte determinism checks.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}
