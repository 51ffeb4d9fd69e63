//! Stacking gate.
//!
//! Constraints are stateless: each mutation that changes a zone's
//! membership re-checks the zone's complete proposed contents before the
//! mutation is committed.

pub mod constraint;

pub use constraint::{
    check_stacking_constraints, validate_initial_placements, PieceFilter, Placement, SpaceFilter,
    StackingConstraint, StackingRule, StackingViolation,
};
