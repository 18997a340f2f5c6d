//! Vote scoring and final ranking
//!
//! Points are awarded at vote-submission time with a linear time decay:
//! an instant correct answer earns 1000 points, a correct answer at the
//! last moment earns 0. The client-reported remaining time is clamped
//! server-side and never trusted beyond that. Final standings use dense
//! competition ranking: tied scores share a rank, and the rank increments
//! only when the score changes.

use itertools::Itertools;
use serde::Serialize;

use crate::player::{Id, Player};

/// Maximum points for an instant correct answer
const FULL_POINTS: f64 = 1000.0;

/// Points awarded for a vote
///
/// Incorrect answers always earn zero. For correct answers the award
/// decays linearly from [`FULL_POINTS`] at `time_remaining == limit` down
/// to zero at `time_remaining == 0`. `time_remaining` is clamped to
/// `[0, limit]` first.
pub fn vote_points(correct: bool, time_remaining: f64, limit_seconds: u32) -> u64 {
    if !correct || limit_seconds == 0 {
        return 0;
    }
    let limit = f64::from(limit_seconds);
    let remaining = time_remaining.clamp(0.0, limit);
    (FULL_POINTS * remaining / limit).round() as u64
}

/// One row of a round results table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRow {
    /// The player's id
    pub id: Id,
    /// The player's display name
    pub name: String,
    /// The player's running total
    pub score: u64,
}

/// A player's final standing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    /// The player's id
    pub player_id: Id,
    /// The player's display name
    pub display_name: String,
    /// The player's final score
    pub score: u64,
    /// Dense competition rank, 1-based
    pub rank: usize,
}

/// Builds the descending score table broadcast with round results
pub fn score_table<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<ScoreRow> {
    players
        .into_iter()
        .map(|p| ScoreRow {
            id: p.id,
            name: p.display_name.clone(),
            score: p.score,
        })
        .sorted_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)))
        .collect_vec()
}

/// Assigns final dense competition ranks
///
/// Players are sorted descending by score; the rank increments once per
/// score change, so `[900, 900, 700]` ranks as `[1, 1, 2]`.
pub fn final_ranking<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<RankedResult> {
    let sorted = players
        .into_iter()
        .sorted_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.display_name.cmp(&b.display_name))
        })
        .collect_vec();

    let mut results = Vec::with_capacity(sorted.len());
    let mut rank = 0;
    let mut previous_score = None;
    for player in sorted {
        if previous_score != Some(player.score) {
            rank += 1;
            previous_score = Some(player.score);
        }
        results.push(RankedResult {
            player_id: player.id,
            display_name: player.display_name.clone(),
            score: player.score,
            rank,
        });
    }
    results
}
