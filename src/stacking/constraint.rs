//! Stacking constraints and the placement gate.

use std::collections::BTreeMap;

use im::OrdMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::{AttributeValue, ScalarValue, Token, ZoneDef, ZoneId};

/// Which zones a constraint applies to. Every specified part must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceFilter {
    #[serde(default)]
    pub zone_ids: Vec<ZoneId>,
    pub category: Option<String>,
    /// List attributes compare element by element, in order.
    #[serde(default)]
    pub attribute_equals: OrdMap<String, AttributeValue>,
}

impl SpaceFilter {
    pub fn zones(ids: impl IntoIterator<Item = impl Into<ZoneId>>) -> Self {
        Self {
            zone_ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attribute_equals.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, zone: &ZoneDef) -> bool {
        if !self.zone_ids.is_empty() && !self.zone_ids.contains(&zone.id) {
            return false;
        }
        if let Some(category) = &self.category {
            if zone.category.as_ref() != Some(category) {
                return false;
            }
        }
        self.attribute_equals
            .iter()
            .all(|(key, expected)| zone.attributes.get(key) == Some(expected))
    }
}

/// Which pieces a constraint counts. An empty list places no restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceFilter {
    #[serde(default)]
    pub piece_type_ids: Vec<String>,
    #[serde(default)]
    pub factions: Vec<String>,
}

impl PieceFilter {
    pub fn types(types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            piece_type_ids: types.into_iter().map(Into::into).collect(),
            factions: Vec::new(),
        }
    }

    pub fn factions(factions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            piece_type_ids: Vec::new(),
            factions: factions.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, token_type: &str, faction: Option<&str>) -> bool {
        if !self.piece_type_ids.is_empty() && !self.piece_type_ids.iter().any(|t| t == token_type) {
            return false;
        }
        if !self.factions.is_empty() {
            return faction.is_some_and(|f| self.factions.iter().any(|x| x == f));
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackingRule {
    /// No matching piece may be placed.
    Prohibit,
    /// At most this many matching pieces.
    MaxCount(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackingConstraint {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub space_filter: SpaceFilter,
    pub piece_filter: PieceFilter,
    pub rule: StackingRule,
}

impl StackingConstraint {
    pub fn new(id: impl Into<String>, space_filter: SpaceFilter, piece_filter: PieceFilter, rule: StackingRule) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            space_filter,
            piece_filter,
            rule,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Evaluate against the pieces a zone would hold.
    fn check(&self, zone_id: &ZoneId, pieces: &[(&str, Option<&str>)]) -> Option<StackingViolation> {
        let matching_count = pieces
            .iter()
            .filter(|(token_type, faction)| self.piece_filter.matches(token_type, *faction))
            .count();
        if matching_count == 0 {
            return None;
        }
        let violated = match self.rule {
            StackingRule::Prohibit => true,
            StackingRule::MaxCount(max) => matching_count > max,
        };
        violated.then(|| StackingViolation {
            constraint_id: self.id.clone(),
            zone_id: zone_id.clone(),
            matching_count,
            max_count: match self.rule {
                StackingRule::Prohibit => 0,
                StackingRule::MaxCount(max) => max,
            },
            rule: self.rule,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackingViolation {
    pub constraint_id: String,
    pub zone_id: ZoneId,
    pub matching_count: usize,
    pub max_count: usize,
    pub rule: StackingRule,
}

/// A scenario's initial placement of a piece, before any state exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub zone: ZoneId,
    pub token_type: String,
    pub faction: Option<String>,
}

impl Placement {
    pub fn new(zone: impl Into<ZoneId>, token_type: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            token_type: token_type.into(),
            faction: None,
        }
    }

    #[must_use]
    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }
}

/// Faction of a token: the canonical type mapping first, then its own
/// `faction` property.
fn token_faction<'a>(token: &'a Token, type_faction_map: &'a FxHashMap<String, String>) -> Option<&'a str> {
    if let Some(faction) = type_faction_map.get(&token.token_type) {
        return Some(faction);
    }
    match token.props.get("faction") {
        Some(ScalarValue::Str(faction)) => Some(faction),
        _ => None,
    }
}

/// Check the token set a zone would hold after a mutation.
///
/// `proposed` is the complete post-mutation contents of `target_zone`.
/// Returns every violated constraint, in declaration order. Zones missing
/// from `zones` match no space filter.
pub fn check_stacking_constraints(
    constraints: &[StackingConstraint],
    zones: &[ZoneDef],
    target_zone: &ZoneId,
    proposed: &[Token],
    type_faction_map: &FxHashMap<String, String>,
) -> Vec<StackingViolation> {
    let Some(zone) = zones.iter().find(|z| z.id == *target_zone) else {
        return Vec::new();
    };
    let pieces: Vec<(&str, Option<&str>)> = proposed
        .iter()
        .map(|t| (t.token_type.as_str(), token_faction(t, type_faction_map)))
        .collect();

    constraints
        .iter()
        .filter(|c| c.space_filter.matches(zone))
        .filter_map(|c| c.check(target_zone, &pieces))
        .collect()
}

/// Check a scenario's initial placements zone by zone.
///
/// Placements naming an undeclared zone are skipped.
pub fn validate_initial_placements(
    constraints: &[StackingConstraint],
    zones: &[ZoneDef],
    placements: &[Placement],
    type_faction_map: &FxHashMap<String, String>,
) -> Vec<StackingViolation> {
    let mut by_zone: BTreeMap<&ZoneId, Vec<(&str, Option<&str>)>> = BTreeMap::new();
    for placement in placements {
        let faction = type_faction_map
            .get(&placement.token_type)
            .or(placement.faction.as_ref())
            .map(String::as_str);
        by_zone
            .entry(&placement.zone)
            .or_default()
            .push((placement.token_type.as_str(), faction));
    }

    let mut violations = Vec::new();
    for (zone_id, pieces) in &by_zone {
        let Some(zone) = zones.iter().find(|z| z.id == **zone_id) else {
            continue;
        };
        violations.extend(
            constraints
                .iter()
                .filter(|c| c.space_filter.matches(zone))
                .filter_map(|c| c.check(zone_id, pieces)),
        );
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> Vec<ZoneDef> {
        vec![
            ZoneDef::new("saigon:none")
                .with_category("city")
                .with_attribute("terrain", vec!["urban".to_string(), "coastal".to_string()]),
            ZoneDef::new("phu-bon:none").with_category("province"),
            ZoneDef::new("loc-1:none").with_category("loc"),
        ]
    }

    fn factions() -> FxHashMap<String, String> {
        let mut map = FxHashMap::default();
        map.insert("us-base".to_string(), "us".to_string());
        map.insert("nva-base".to_string(), "nva".to_string());
        map
    }

    fn bases(n: usize) -> Vec<Token> {
        (0..n).map(|i| Token::new(format!("b{i}"), "us-base")).collect()
    }

    #[test]
    fn test_max_count() {
        let constraint = StackingConstraint::new(
            "max-2-bases",
            SpaceFilter::default(),
            PieceFilter::types(["us-base", "nva-base"]),
            StackingRule::MaxCount(2),
        );
        let zone = ZoneId::new("phu-bon:none");
        let constraints = [constraint];

        assert!(check_stacking_constraints(&constraints, &zones(), &zone, &bases(2), &factions()).is_empty());

        let violations = check_stacking_constraints(&constraints, &zones(), &zone, &bases(3), &factions());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint_id, "max-2-bases");
        assert_eq!(violations[0].matching_count, 3);
        assert_eq!(violations[0].max_count, 2);
    }

    #[test]
    fn test_prohibit_by_category() {
        let constraints = [StackingConstraint::new(
            "no-bases-on-locs",
            SpaceFilter::category("loc"),
            PieceFilter::types(["us-base"]),
            StackingRule::Prohibit,
        )];
        let loc = ZoneId::new("loc-1:none");
        let province = ZoneId::new("phu-bon:none");

        assert_eq!(check_stacking_constraints(&constraints, &zones(), &loc, &bases(1), &factions()).len(), 1);
        assert!(check_stacking_constraints(&constraints, &zones(), &province, &bases(1), &factions()).is_empty());
        // Non-matching pieces never trigger a prohibit.
        let troops = vec![Token::new("t1", "us-troops")];
        assert!(check_stacking_constraints(&constraints, &zones(), &loc, &troops, &factions()).is_empty());
    }

    #[test]
    fn test_list_attribute_compares_in_order() {
        let ordered = SpaceFilter::default().with_attribute("terrain", vec!["urban".to_string(), "coastal".to_string()]);
        let reversed = SpaceFilter::default().with_attribute("terrain", vec!["coastal".to_string(), "urban".to_string()]);
        let saigon = &zones()[0];

        assert!(ordered.matches(saigon));
        assert!(!reversed.matches(saigon));
    }

    #[test]
    fn test_all_space_parts_must_match() {
        let filter = SpaceFilter {
            zone_ids: vec![ZoneId::new("saigon:none")],
            category: Some("province".to_string()),
            attribute_equals: OrdMap::new(),
        };
        assert!(!filter.matches(&zones()[0]));
    }

    #[test]
    fn test_faction_map_wins_over_prop() {
        let constraints = [StackingConstraint::new(
            "no-nva",
            SpaceFilter::category("city"),
            PieceFilter::factions(["nva"]),
            StackingRule::Prohibit,
        )];
        let saigon = ZoneId::new("saigon:none");

        // Mapped to `us` even though the prop claims `nva`.
        let disguised = vec![Token::new("b1", "us-base").with_prop("faction", "nva")];
        assert!(check_stacking_constraints(&constraints, &zones(), &saigon, &disguised, &factions()).is_empty());

        // Unmapped type falls back to the prop.
        let cadre = vec![Token::new("c1", "cadre").with_prop("faction", "nva")];
        assert_eq!(check_stacking_constraints(&constraints, &zones(), &saigon, &cadre, &factions()).len(), 1);
    }

    #[test]
    fn test_initial_placements() {
        let constraints = [StackingConstraint::new(
            "max-2-bases",
            SpaceFilter::default(),
            PieceFilter::factions(["us", "nva"]),
            StackingRule::MaxCount(2),
        )];
        let placements = vec![
            Placement::new("phu-bon:none", "us-base"),
            Placement::new("phu-bon:none", "nva-base"),
            Placement::new("saigon:none", "us-base"),
            Placement::new("phu-bon:none", "cadre").with_faction("nva"),
            Placement::new("nowhere:none", "us-base"),
        ];

        let violations = validate_initial_placements(&constraints, &zones(), &placements, &factions());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].zone_id, ZoneId::new("phu-bon:none"));
        assert_eq!(violations[0].matching_count, 3);
    }
}
