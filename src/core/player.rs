//! Player identification and seat arithmetic.
//!
//! ## PlayerId
//!
//! Type-safe seat index supporting 1-255 players. Seats are numbered from 0
//! and wrap modulo the seat count for relative (`left`/`right`) lookups.

use serde::{Deserialize, Serialize};

/// Player identifier supporting 1-255 players.
///
/// Player indices are 0-based: the first seat is `PlayerId(0)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Create a new player ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw player index (0-based).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Build a player ID from an evaluated integer, if it names a seat.
    #[must_use]
    pub fn from_index(value: i64, player_count: usize) -> Option<Self> {
        if value >= 0 && (value as usize) < player_count {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Seat to the left: one index lower, wrapping.
    #[must_use]
    pub fn left(self, player_count: usize) -> Self {
        let n = player_count.max(1);
        Self(((self.index() + n - 1) % n) as u8)
    }

    /// Seat to the right: one index higher, wrapping.
    #[must_use]
    pub fn right(self, player_count: usize) -> Self {
        let n = player_count.max(1);
        Self(((self.index() + 1) % n) as u8)
    }

    /// Iterate over all player IDs for a game with `player_count` players.
    ///
    /// ```
    /// use tabletop_kernel::core::PlayerId;
    ///
    /// let players: Vec<_> = PlayerId::all(4).collect();
    /// assert_eq!(players.len(), 4);
    /// assert_eq!(players[0], PlayerId::new(0));
    /// assert_eq!(players[3], PlayerId::new(3));
    /// ```
    pub fn all(player_count: usize) -> impl Iterator<Item = PlayerId> {
        (0..player_count as u8).map(PlayerId)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_seats_wrap() {
        let p0 = PlayerId::new(0);
        let p3 = PlayerId::new(3);

        assert_eq!(p0.left(4), PlayerId::new(3));
        assert_eq!(p0.right(4), PlayerId::new(1));
        assert_eq!(p3.right(4), PlayerId::new(0));
        assert_eq!(p3.left(4), PlayerId::new(2));
    }

    #[test]
    fn test_single_seat_is_its_own_neighbour() {
        let p0 = PlayerId::new(0);
        assert_eq!(p0.left(1), p0);
        assert_eq!(p0.right(1), p0);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(PlayerId::from_index(2, 3), Some(PlayerId::new(2)));
        assert_eq!(PlayerId::from_index(3, 3), None);
        assert_eq!(PlayerId::from_index(-1, 3), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PlayerId::new(7)), "7");
    }
}
