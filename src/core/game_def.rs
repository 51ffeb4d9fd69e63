//! The closed, validated game definition the engine executes against.
//!
//! A `GameDef` is assembled with consuming builder methods and then treated
//! as read-only. The engine assumes it is internally consistent (every zone
//! an effect names exists, every phase an action lists is declared, ...)
//! and reports violations as evaluation failures rather than re-validating.
//!
//! ## Usage
//!
//! ```
//! use tabletop_kernel::core::{GameDef, PhaseDef, VarDef, ZoneDef};
//!
//! let def = GameDef::new("skirmish", 2, 4)
//!     .with_global_var(VarDef::int("round", 1, 1, 10))
//!     .with_per_player_var(VarDef::int("resources", 5, 0, 40))
//!     .with_zone(ZoneDef::new("deck:none").hidden())
//!     .with_phase(PhaseDef::new("main"));
//!
//! assert!(def.zone_def(&"deck:none".into()).is_some());
//! assert_eq!(def.phase_index(&"main".into()), Some(0));
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::action::{ActionDef, ActionPipelineDef};
use super::config::{
    AdjacencyDirection, EngineLimits, MarkerLatticeDef, PhaseId, TokenTypeDef, TurnOrderConfig,
    VarDef, ZoneDef, ZoneId,
};
use crate::effects::Effect;
use crate::stacking::StackingConstraint;
use crate::triggers::TriggerDef;

/// A phase and its boundary effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseDef {
    pub id: PhaseId,
    #[serde(default)]
    pub on_enter: Vec<Effect>,
    #[serde(default)]
    pub on_exit: Vec<Effect>,
}

impl PhaseDef {
    pub fn new(id: impl Into<PhaseId>) -> Self {
        Self {
            id: id.into(),
            on_enter: Vec::new(),
            on_exit: Vec::new(),
        }
    }

    #[must_use]
    pub fn on_enter(mut self, effects: Vec<Effect>) -> Self {
        self.on_enter = effects;
        self
    }

    #[must_use]
    pub fn on_exit(mut self, effects: Vec<Effect>) -> Self {
        self.on_exit = effects;
        self
    }
}

/// Complete static game definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameDef {
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,

    pub global_vars: Vec<VarDef>,
    pub per_player_vars: Vec<VarDef>,

    pub zones: Vec<ZoneDef>,
    pub token_types: Vec<TokenTypeDef>,

    /// Lattices for per-zone markers.
    pub marker_lattices: Vec<MarkerLatticeDef>,
    /// Lattices for global markers.
    pub global_marker_lattices: Vec<MarkerLatticeDef>,

    /// Turn phases, in order.
    pub phases: Vec<PhaseDef>,
    /// Phases only reachable through `pushInterruptPhase`.
    pub interrupt_phases: Vec<PhaseDef>,

    pub actions: Vec<ActionDef>,
    pub action_pipelines: Vec<ActionPipelineDef>,
    pub triggers: Vec<TriggerDef>,
    pub stacking_constraints: Vec<StackingConstraint>,

    pub turn_order: TurnOrderConfig,

    /// Effects run once by `initial_state`.
    pub setup: Vec<Effect>,

    pub limits: EngineLimits,
}

impl GameDef {
    /// Create an empty definition seating `min_players..=max_players`.
    pub fn new(name: impl Into<String>, min_players: usize, max_players: usize) -> Self {
        Self {
            name: name.into(),
            min_players,
            max_players,
            global_vars: Vec::new(),
            per_player_vars: Vec::new(),
            zones: Vec::new(),
            token_types: Vec::new(),
            marker_lattices: Vec::new(),
            global_marker_lattices: Vec::new(),
            phases: Vec::new(),
            interrupt_phases: Vec::new(),
            actions: Vec::new(),
            action_pipelines: Vec::new(),
            triggers: Vec::new(),
            stacking_constraints: Vec::new(),
            turn_order: TurnOrderConfig::RoundRobin,
            setup: Vec::new(),
            limits: EngineLimits::default(),
        }
    }

    // === Builder methods ===

    #[must_use]
    pub fn with_global_var(mut self, var: VarDef) -> Self {
        self.global_vars.push(var);
        self
    }

    #[must_use]
    pub fn with_per_player_var(mut self, var: VarDef) -> Self {
        self.per_player_vars.push(var);
        self
    }

    #[must_use]
    pub fn with_zone(mut self, zone: ZoneDef) -> Self {
        self.zones.push(zone);
        self
    }

    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenTypeDef) -> Self {
        self.token_types.push(token_type);
        self
    }

    #[must_use]
    pub fn with_marker_lattice(mut self, lattice: MarkerLatticeDef) -> Self {
        self.marker_lattices.push(lattice);
        self
    }

    #[must_use]
    pub fn with_global_marker_lattice(mut self, lattice: MarkerLatticeDef) -> Self {
        self.global_marker_lattices.push(lattice);
        self
    }

    #[must_use]
    pub fn with_phase(mut self, phase: PhaseDef) -> Self {
        self.phases.push(phase);
        self
    }

    #[must_use]
    pub fn with_interrupt_phase(mut self, phase: PhaseDef) -> Self {
        self.interrupt_phases.push(phase);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: ActionDef) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: ActionPipelineDef) -> Self {
        self.action_pipelines.push(pipeline);
        self
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerDef) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn with_stacking_constraint(mut self, constraint: StackingConstraint) -> Self {
        self.stacking_constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn with_turn_order(mut self, turn_order: TurnOrderConfig) -> Self {
        self.turn_order = turn_order;
        self
    }

    #[must_use]
    pub fn with_setup(mut self, effects: Vec<Effect>) -> Self {
        self.setup = effects;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    // === Lookups ===

    #[must_use]
    pub fn player_range(&self) -> (usize, usize) {
        (self.min_players, self.max_players)
    }

    #[must_use]
    pub fn global_var(&self, name: &str) -> Option<&VarDef> {
        self.global_vars.iter().find(|v| v.name == name)
    }

    #[must_use]
    pub fn per_player_var(&self, name: &str) -> Option<&VarDef> {
        self.per_player_vars.iter().find(|v| v.name == name)
    }

    #[must_use]
    pub fn zone_def(&self, zone: &ZoneId) -> Option<&ZoneDef> {
        self.zones.iter().find(|z| &z.id == zone)
    }

    #[must_use]
    pub fn zone_ids(&self) -> Vec<String> {
        self.zones.iter().map(|z| z.id.0.clone()).collect()
    }

    /// Distinct zone bases, sorted.
    #[must_use]
    pub fn zone_bases(&self) -> Vec<String> {
        let mut bases: Vec<String> = self.zones.iter().map(|z| z.id.base().to_string()).collect();
        bases.sort();
        bases.dedup();
        bases
    }

    #[must_use]
    pub fn token_type(&self, id: &str) -> Option<&TokenTypeDef> {
        self.token_types.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn marker_lattice(&self, id: &str) -> Option<&MarkerLatticeDef> {
        self.marker_lattices.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn global_marker_lattice(&self, id: &str) -> Option<&MarkerLatticeDef> {
        self.global_marker_lattices.iter().find(|m| m.id == id)
    }

    /// Look up a turn phase or an interrupt phase.
    #[must_use]
    pub fn phase_def(&self, phase: &PhaseId) -> Option<&PhaseDef> {
        self.phases
            .iter()
            .chain(self.interrupt_phases.iter())
            .find(|p| &p.id == phase)
    }

    /// Position of a phase in the turn order. Interrupt phases have none.
    #[must_use]
    pub fn phase_index(&self, phase: &PhaseId) -> Option<usize> {
        self.phases.iter().position(|p| &p.id == phase)
    }

    #[must_use]
    pub fn phase_names(&self) -> Vec<String> {
        self.phases
            .iter()
            .chain(self.interrupt_phases.iter())
            .map(|p| p.id.0.clone())
            .collect()
    }

    #[must_use]
    pub fn action(&self, id: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Pipelines declared for an action, in definition order.
    pub fn pipelines_for<'a>(&'a self, action_id: &'a str) -> impl Iterator<Item = &'a ActionPipelineDef> {
        self.action_pipelines.iter().filter(move |p| p.action_id == action_id)
    }

    /// Canonical token type -> faction map for the stacking gate.
    #[must_use]
    pub fn type_faction_map(&self) -> FxHashMap<String, String> {
        self.token_types
            .iter()
            .filter_map(|t| t.faction.as_ref().map(|f| (t.id.clone(), f.clone())))
            .collect()
    }

    /// Zones reachable in one step from `zone`, sorted and de-duplicated.
    ///
    /// Bidirectional edges count from either end; directed edges only from
    /// the zone that declares them.
    #[must_use]
    pub fn adjacent_zones(&self, zone: &ZoneId) -> Vec<ZoneId> {
        let mut adjacent: Vec<ZoneId> = Vec::new();
        for def in &self.zones {
            for edge in &def.adjacent_to {
                if &def.id == zone {
                    adjacent.push(edge.to.clone());
                } else if &edge.to == zone && edge.direction == AdjacencyDirection::Bidirectional {
                    adjacent.push(def.id.clone());
                }
            }
        }
        adjacent.sort();
        adjacent.dedup();
        adjacent
    }

    #[must_use]
    pub fn are_adjacent(&self, from: &ZoneId, to: &ZoneId) -> bool {
        self.adjacent_zones(from).contains(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ZoneAdjacency;

    fn map_def() -> GameDef {
        GameDef::new("map", 2, 2)
            .with_zone(ZoneDef::new("a:none").adjacent(ZoneAdjacency::to("b:none")))
            .with_zone(ZoneDef::new("b:none").adjacent(ZoneAdjacency::to("c:none").directed()))
            .with_zone(ZoneDef::new("c:none"))
            .with_zone(ZoneDef::new("hand:0"))
            .with_zone(ZoneDef::new("hand:1"))
            .with_token_type(TokenTypeDef::new("troops").with_faction("us"))
            .with_token_type(TokenTypeDef::new("marker"))
            .with_phase(PhaseDef::new("main"))
            .with_phase(PhaseDef::new("cleanup"))
            .with_interrupt_phase(PhaseDef::new("reaction"))
    }

    #[test]
    fn test_adjacency() {
        let def = map_def();

        assert_eq!(def.adjacent_zones(&"a:none".into()), vec![ZoneId::new("b:none")]);
        assert_eq!(
            def.adjacent_zones(&"b:none".into()),
            vec![ZoneId::new("a:none"), ZoneId::new("c:none")]
        );
        // Directed edge only walks forward.
        assert!(def.adjacent_zones(&"c:none".into()).is_empty());
        assert!(def.are_adjacent(&"b:none".into(), &"a:none".into()));
        assert!(!def.are_adjacent(&"c:none".into(), &"b:none".into()));
    }

    #[test]
    fn test_phase_lookup() {
        let def = map_def();

        assert_eq!(def.phase_index(&"cleanup".into()), Some(1));
        assert_eq!(def.phase_index(&"reaction".into()), None);
        assert!(def.phase_def(&"reaction".into()).is_some());
        assert_eq!(def.phase_names(), vec!["main", "cleanup", "reaction"]);
    }

    #[test]
    fn test_type_faction_map() {
        let map = map_def().type_faction_map();
        assert_eq!(map.get("troops").map(String::as_str), Some("us"));
        assert!(!map.contains_key("marker"));
    }

    #[test]
    fn test_zone_bases() {
        assert_eq!(map_def().zone_bases(), vec!["a", "b", "c", "hand"]);
    }
}
