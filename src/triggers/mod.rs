//! Event-driven triggers.
//!
//! The interpreter records a `TriggerEvent` for every phase boundary, turn
//! boundary, resolved action, token arrival and variable change. Triggers
//! declared on the `GameDef` match those events with an `EventMatcher`, an
//! optional condition over the event payload, and run their effects when
//! both hold. See `registry` for how cascades are bounded.

mod event;
mod registry;

pub use event::{EventMatcher, TriggerEvent};
pub use registry::TriggerDef;

pub(crate) use registry::fire_triggers;
