//! # Quizcast Session Engine
//!
//! This library provides the real-time session orchestration engine behind
//! a multiplayer trivia party game. Many independent sessions run
//! concurrently, each coordinating a small group of participants through
//! timed rounds: category reveal, question broadcast, vote collection,
//! scoring, and advancement.
//!
//! The crate is transport-agnostic: outbound events travel through the
//! [`channel::Tunnel`] trait, and countdowns are scheduled alarm messages
//! that the embedding host delivers back into the owning session's
//! serialized event stream.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub mod categories;
pub mod channel;
pub mod constants;
pub mod game;
pub mod game_id;
pub mod player;
pub mod question;
pub mod registry;
pub mod scheduler;
pub mod scoring;

use categories::PlanEntry;
use game_id::GameId;
use player::Player;
use question::{Answer, QuestionKind};
use scoring::{RankedResult, ScoreRow};

/// Events emitted by sessions and delivered to participants
///
/// A single enum covers direct replies (`gameCreated`, `gameJoined`) and
/// session-wide broadcasts. The wire form is a tagged JSON object with
/// camelCase names matching the client protocol.
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    /// Direct reply to the creator carrying the new session id
    GameCreated {
        /// Identifier the creator shares with other participants
        session_id: GameId,
    },
    /// Direct reply to a joiner with the current roster and category plan
    GameJoined {
        /// All players currently in the session, host first
        players: Vec<Player>,
        /// The category plan built so far (empty before auto-sampling)
        category_plan: Vec<PlanEntry>,
    },
    /// Broadcast whenever the roster changes
    UpdatePlayers {
        /// All players currently in the session, host first
        players: Vec<Player>,
    },
    /// Broadcast once when the session leaves the lobby
    GameStarted,
    /// Broadcast when a category reveal begins
    NewCategory {
        /// Label of the category about to be played
        category: String,
    },
    /// One tick of the category reveal countdown
    CategoryCountdown {
        /// Seconds remaining in the reveal
        n: u32,
    },
    /// Broadcast when a round's question goes live
    NewRound {
        /// The question text
        question: String,
        /// Discriminates multiple-choice from true/false rounds
        question_kind: QuestionKind,
        /// Answer options, present only for multiple-choice questions
        answers: Option<Vec<String>>,
        /// Zero-based index of the round within the current category
        round_index: usize,
    },
    /// One tick of the active round countdown
    Countdown {
        /// Seconds remaining to vote
        n: u32,
    },
    /// Broadcast when a round is finalized
    RoundResults {
        /// The answer that was correct
        correct_answer: Answer,
        /// Player scores in descending order
        results: Vec<ScoreRow>,
    },
    /// One tick of the pause between rounds
    NextRoundCountdown {
        /// Seconds until the next round or game over
        n: u32,
    },
    /// Broadcast once when the last round of the last category is done
    GameOver {
        /// Final standings with dense competition ranks
        ranked_results: Vec<RankedResult>,
    },
    /// Broadcast when question generation failed and the session cannot
    /// continue; the session enters a terminal degraded state
    RoundAborted {
        /// Human-readable cause
        reason: String,
    },
}

impl Event {
    /// Converts the event to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Inbound events as the transport layer decodes them
///
/// `SubmitVote` carries no session id on purpose: it is routed through the
/// sender's participant identity by
/// [`registry::SessionRegistry::find_session_by_participant`].
#[derive(Debug, Deserialize, Clone)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum IncomingEvent {
    /// Create a new session with the sender as host
    CreateGame {
        /// Display name of the host player
        player_name: String,
        /// Rounds played per category
        num_rounds: usize,
    },
    /// Join an existing session
    JoinGame {
        /// Session to join
        session_id: GameId,
        /// Display name of the joining player
        player_name: String,
    },
    /// Leave the lobby and begin play
    StartGame {
        /// Session to start
        session_id: GameId,
    },
    /// Propose a category for the plan (player-driven variant)
    SelectCategory {
        /// Session whose plan is extended
        session_id: GameId,
        /// Proposed category label
        category: String,
    },
    /// Vote on the active round
    SubmitVote {
        /// The submitted answer
        vote: Answer,
        /// Client-reported seconds left on its countdown; clamped
        /// server-side before scoring
        time_remaining: f64,
    },
}
