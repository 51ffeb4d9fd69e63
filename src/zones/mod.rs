//! Zone placement primitives.
//!
//! Zones are **definition-configured**: the set of zones comes from the
//! `GameDef`, and the state holds one ordered token sequence per zone.
//!
//! ## Key Types
//!
//! - `ZoneId`: `base:owner` identifier (from `core::config`)
//! - `ZoneDef`: zone properties (visibility, ordering, adjacency, attributes)
//! - `ZonePosition`: insertion point for a token
//! - `TokenLocation`: where a token sits

pub mod manager;

pub use manager::{
    duplicate_token_ids, insert_token, locate_token, take_token, zone_tokens, TokenLocation,
    ZonePosition,
};

// Re-export zone types from core for convenience
pub use crate::core::config::{ZoneDef, ZoneId, ZoneVisibility};
