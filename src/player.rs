//! Participant identity and per-session roster management
//!
//! This module defines participant ids, the player record kept for each
//! roster member, and the `Roster` owned by every session. The roster is
//! the session's single source of truth for who receives broadcasts and
//! who counts towards the all-voted quorum.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use itertools::Itertools;
use serde::Serialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{Event, channel::Tunnel};

/// A unique identifier for participants
///
/// The transport layer assigns one id per connection; the same id keys the
/// player inside a session and routes participant-scoped events that carry
/// no session id.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A player in a session's roster
///
/// Created on join, removed on disconnect. The score only ever increases;
/// points are awarded at vote-submission time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Participant id assigned by the transport layer
    pub id: Id,
    /// Display name chosen at join time
    pub display_name: String,
    /// Whether this player created the session
    pub is_host: bool,
    /// Total points accumulated so far
    pub score: u64,
}

impl Player {
    /// Creates a new player with a zero score
    pub fn new(id: Id, display_name: impl Into<String>, is_host: bool) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_host,
            score: 0,
        }
    }

    /// Adds points to this player's total
    ///
    /// Scores are monotonically non-decreasing; there is no way to
    /// subtract points.
    pub fn award(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }
}

/// Errors that can occur when mutating a roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of allowed players
    #[error("maximum number of players reached")]
    MaximumPlayers,
    /// The participant id is already present in this session
    #[error("participant already joined")]
    AlreadyJoined,
}

/// The set of players in one session
///
/// Provides membership management plus the send/broadcast helpers sessions
/// use to reach their participants through the tunnel finder.
#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<Id, Player>,
}

impl Roster {
    /// Creates a roster containing only the host player
    pub fn with_host(host_id: Id, host_name: impl Into<String>) -> Self {
        Self {
            players: HashMap::from([(host_id, Player::new(host_id, host_name, true))]),
        }
    }

    /// Adds a player to the roster
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumPlayers`] when the session is full and
    /// [`Error::AlreadyJoined`] when the id is already a member.
    pub fn add(&mut self, player: Player) -> Result<(), Error> {
        if self.players.len() >= crate::constants::session::MAX_PLAYER_COUNT {
            return Err(Error::MaximumPlayers);
        }
        if self.players.contains_key(&player.id) {
            return Err(Error::AlreadyJoined);
        }
        self.players.insert(player.id, player);
        Ok(())
    }

    /// Removes a player, returning their record if they were a member
    pub fn remove(&mut self, id: Id) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Whether the given participant is a member
    pub fn contains(&self, id: Id) -> bool {
        self.players.contains_key(&id)
    }

    /// Gets a mutable reference to a member
    pub fn get_mut(&mut self, id: Id) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Number of players currently present
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster has no players left
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Ids of all present players
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.players.keys().copied()
    }

    /// All present players
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Roster in display order: host first, then by name
    pub fn display_list(&self) -> Vec<Player> {
        self.players
            .values()
            .sorted_by_key(|p| (!p.is_host, p.display_name.clone()))
            .cloned()
            .collect_vec()
    }

    /// Sends an event to a single participant if their tunnel is alive
    pub fn send<T: Tunnel, F: Fn(Id) -> Option<T>>(id: Id, event: &Event, tunnel_finder: F) {
        if let Some(tunnel) = tunnel_finder(id) {
            tunnel.send(event);
        }
    }

    /// Broadcasts an event to every present player
    pub fn broadcast<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, event: &Event, tunnel_finder: F) {
        for id in self.players.keys() {
            if let Some(tunnel) = tunnel_finder(*id) {
                tunnel.send(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_with_host_contains_only_host() {
        let host = Id::new();
        let roster = Roster::with_host(host, "Alice");

        assert_eq!(roster.len(), 1);
        assert!(roster.contains(host));
        assert!(roster.display_list()[0].is_host);
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let host = Id::new();
        let mut roster = Roster::with_host(host, "Alice");

        let result = roster.add(Player::new(host, "Impostor", false));
        assert_eq!(result, Err(Error::AlreadyJoined));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn display_list_puts_host_first_then_names() {
        let host = Id::new();
        let mut roster = Roster::with_host(host, "Zed");
        roster.add(Player::new(Id::new(), "Bob", false)).unwrap();
        roster.add(Player::new(Id::new(), "Amy", false)).unwrap();

        let names: Vec<_> = roster
            .display_list()
            .into_iter()
            .map(|p| p.display_name)
            .collect();
        assert_eq!(names, ["Zed", "Amy", "Bob"]);
    }

    #[test]
    fn award_only_increases_score() {
        let id = Id::new();
        let mut player = Player::new(id, "Amy", false);
        player.award(500);
        player.award(0);

        assert_eq!(player.score, 500);
    }

    #[test]
    fn roster_full_rejects_new_players() {
        let mut roster = Roster::default();
        for i in 0..crate::constants::session::MAX_PLAYER_COUNT {
            roster
                .add(Player::new(Id::new(), format!("p{i}"), false))
                .unwrap();
        }

        let result = roster.add(Player::new(Id::new(), "late", false));
        assert_eq!(result, Err(Error::MaximumPlayers));
    }
}
