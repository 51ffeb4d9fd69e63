//! Structured failures raised by the kernel.
//!
//! Every failure unwinds to the nearest top-level `apply_effect`,
//! `apply_effects` or `apply_move` call with its context attached. Nothing is
//! retried or swallowed inside the engine. Ordinary illegal moves are not
//! `KernelError`s; see `rules::MoveError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{PhaseId, RngAlgorithm, TokenId, ValueType, ZoneId};
use crate::effects::EffectKind;
use crate::stacking::StackingViolation;

/// What kind of name an unknown reference was looking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    GlobalVar,
    PlayerVar,
    Zone,
    ZoneBase,
    ZoneAttribute,
    TokenType,
    TokenProp,
    Token,
    MarkerLattice,
    MarkerState,
    Phase,
    Player,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReferenceKind::GlobalVar => "global variable",
            ReferenceKind::PlayerVar => "per-player variable",
            ReferenceKind::Zone => "zone",
            ReferenceKind::ZoneBase => "zone base",
            ReferenceKind::ZoneAttribute => "zone attribute",
            ReferenceKind::TokenType => "token type",
            ReferenceKind::TokenProp => "token property",
            ReferenceKind::Token => "token",
            ReferenceKind::MarkerLattice => "marker",
            ReferenceKind::MarkerState => "marker state",
            ReferenceKind::Phase => "phase",
            ReferenceKind::Player => "player",
        };
        f.write_str(name)
    }
}

/// A failure of the evaluator, resolver, gate or interpreter.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("effect budget exhausted dispatching `{effect_kind}` (max {max_effect_ops} ops)")]
    BudgetExceeded {
        effect_kind: EffectKind,
        max_effect_ops: usize,
    },

    #[error("type mismatch in {context}: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
        context: String,
    },

    #[error("unknown {kind} `{name}`{}", suggestion_suffix(.suggestion))]
    UnknownReference {
        kind: ReferenceKind,
        name: String,
        alternatives: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("binding `{name}` is not in scope")]
    MissingBinding { name: String, available: Vec<String> },

    #[error("selector `{selector}` resolved to {resolved_count} results, expected exactly one")]
    SelectorCardinality {
        selector: String,
        resolved_count: usize,
        resolved: Vec<String>,
        deferrable: bool,
    },

    #[error("stacking constraint `{}` violated in zone `{}`", .0.constraint_id, .0.zone_id)]
    StackingViolation(StackingViolation),

    #[error("division by zero in {expr}")]
    DivisionByZero { expr: String },

    #[error("integer overflow in {expr}")]
    IntegerOverflow { expr: String },

    #[error("invalid `{effect_kind}` effect: {reason}")]
    InvalidEffect {
        effect_kind: EffectKind,
        reason: String,
    },

    #[error("invalid parameter for decision `{decision}`: {reason}")]
    InvalidChoice { decision: String, reason: String },

    #[error("token `{token}` found in {} zones, expected exactly one", .zones.len())]
    TokenLocation { token: TokenId, zones: Vec<ZoneId> },

    #[error("action `{action_id}` has {} applicable pipelines: {}", .pipelines.len(), .pipelines.join(", "))]
    AmbiguousPipeline {
        action_id: String,
        pipelines: Vec<String>,
    },

    #[error("cannot move from phase `{from}` to `{to}`: {reason}")]
    PhaseTransition {
        from: PhaseId,
        to: PhaseId,
        reason: String,
    },

    #[error("invalid random range [{min}, {max}]")]
    RngRange { min: i64, max: i64 },

    #[error("unsupported rng state {algorithm:?} version {version}")]
    UnsupportedRng { algorithm: RngAlgorithm, version: u32 },

    #[error("query produced more than {max} items")]
    QueryTooLarge { max: usize },

    #[error("trigger `{trigger}` cannot await decision `{decision}`")]
    TriggerAwaitingChoice { trigger: String, decision: String },

    #[error("{requested} players requested, definition seats {min}..={max}")]
    PlayerCount { requested: usize, min: usize, max: usize },
}

impl KernelError {
    /// Build an unknown-reference error with a fuzzy suggestion.
    pub fn unknown(
        kind: ReferenceKind,
        name: impl Into<String>,
        alternatives: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let name = name.into();
        let mut alternatives: Vec<String> = alternatives.into_iter().map(Into::into).collect();
        alternatives.sort();
        alternatives.dedup();
        let suggestion = suggest(&name, &alternatives);
        KernelError::UnknownReference {
            kind,
            name,
            alternatives,
            suggestion,
        }
    }

    pub fn type_mismatch(expected: ValueType, actual: ValueType, context: impl Into<String>) -> Self {
        KernelError::TypeMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    pub fn invalid_effect(effect_kind: EffectKind, reason: impl Into<String>) -> Self {
        KernelError::InvalidEffect {
            effect_kind,
            reason: reason.into(),
        }
    }

    /// Whether a caller may retry once a pending choice has been supplied.
    ///
    /// True only for bound selectors that resolved to nothing, which an
    /// upstream decision may still bind.
    #[must_use]
    pub fn is_deferrable(&self) -> bool {
        match self {
            KernelError::SelectorCardinality { deferrable, .. } => *deferrable,
            _ => false,
        }
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    }
}

/// Closest alternative within a bounded edit distance.
///
/// The bound grows with the name (one edit per three characters, at most
/// three). Ties go to the lexicographically first candidate.
#[must_use]
pub fn suggest(name: &str, alternatives: &[String]) -> Option<String> {
    let bound = (name.chars().count() / 3).clamp(1, 3);
    alternatives
        .iter()
        .filter(|alt| alt.as_str() != name)
        .map(|alt| (edit_distance(name, alt), alt))
        .filter(|(distance, _)| *distance <= bound)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, alt)| alt.clone())
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn test_suggestion_within_bound() {
        let alternatives = vec!["resources".to_string(), "patronage".to_string()];
        assert_eq!(suggest("resorces", &alternatives), Some("resources".to_string()));
        assert_eq!(suggest("zzz", &alternatives), None);
    }

    #[test]
    fn test_unknown_reference_message() {
        let err = KernelError::unknown(ReferenceKind::GlobalVar, "aidd", ["aid", "trail"]);
        assert_eq!(err.to_string(), "unknown global variable `aidd` (did you mean `aid`?)");

        match err {
            KernelError::UnknownReference { alternatives, .. } => {
                assert_eq!(alternatives, vec!["aid".to_string(), "trail".to_string()]);
            }
            other => panic!("Expected UnknownReference, got {other:?}"),
        }
    }

    #[test]
    fn test_deferrable_classification() {
        let deferrable = KernelError::SelectorCardinality {
            selector: "$space".to_string(),
            resolved_count: 0,
            resolved: vec![],
            deferrable: true,
        };
        assert!(deferrable.is_deferrable());

        let fatal = KernelError::SelectorCardinality {
            selector: "hand:all".to_string(),
            resolved_count: 2,
            resolved: vec!["hand:0".to_string(), "hand:1".to_string()],
            deferrable: false,
        };
        assert!(!fatal.is_deferrable());

        let missing = KernelError::MissingBinding {
            name: "$target".to_string(),
            available: vec![],
        };
        assert!(!missing.is_deferrable());

        assert!(!KernelError::DivisionByZero { expr: "x / 0".into() }.is_deferrable());
    }
}
