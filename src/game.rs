//! Per-session game state machine
//!
//! A [`GameSession`] owns one game's roster, category plan, and round
//! history, and moves through its phases driven by participant actions and
//! countdown ticks. Both kinds of input arrive through the same serialized
//! stream; the registry guarantees one event is processed to completion
//! before the next is admitted, so the handlers here never race each
//! other.
//!
//! Round finalization is the delicate part. A round ends when its timer
//! hits zero or when every currently-present player has voted, whichever
//! comes first, and must be finalized exactly once. The early path cancels
//! the live countdown, and the completion path is guarded by a phase
//! transition check, so a tick already in flight when the quorum fires
//! cannot finalize the round a second time.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Event,
    categories::{self, PlanEntry, PlanPolicy},
    channel::Tunnel,
    constants,
    game_id::GameId,
    player::{self, Id, Player, Roster},
    question::{Answer, KindPolicy, Question, QuestionSource},
    scheduler::{AlarmMessage, CountdownKind, RoundScheduler},
    scoring,
};

/// The phases a session moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for players; the only phase that accepts joins for play
    /// setup and plan proposals
    Lobby,
    /// The fixed category reveal countdown before a category's first round
    SelectingCategory,
    /// A question is live and votes are accepted
    RoundActive,
    /// The pause between a finalized round and whatever comes next
    RoundEnd,
    /// Terminal phase after the last round of the last category
    Ended,
    /// Degraded terminal phase entered when question generation failed
    Failed,
}

/// Validated session options
///
/// Supplied at creation time and fixed for the session's lifetime. The
/// registry validates them before building the session.
#[derive(Debug, Clone, Serialize, Deserialize, garde::Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// How many rounds each category is played for
    #[garde(range(
        min = constants::session::MIN_ROUNDS_PER_CATEGORY,
        max = constants::session::MAX_ROUNDS_PER_CATEGORY
    ))]
    pub rounds_per_category: usize,
    /// Voting time limit per round, in seconds
    #[garde(range(
        min = constants::session::MIN_ROUND_SECONDS,
        max = constants::session::MAX_ROUND_SECONDS
    ))]
    pub round_seconds: u32,
    /// How the category plan gets populated
    #[garde(skip)]
    pub plan_policy: PlanPolicy,
    /// How the question kind is chosen each round
    #[garde(skip)]
    pub kind_policy: KindPolicy,
    /// Whether a round finalized with an empty roster ends the session
    /// immediately instead of playing on to nobody
    #[garde(skip)]
    pub end_when_abandoned: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rounds_per_category: constants::session::DEFAULT_ROUNDS_PER_CATEGORY,
            round_seconds: constants::session::DEFAULT_ROUND_SECONDS,
            plan_policy: PlanPolicy::default(),
            kind_policy: KindPolicy::default(),
            end_when_abandoned: false,
        }
    }
}

/// Errors surfaced to the caller by session operations
///
/// Most misuse is silently dropped rather than reported; only conditions
/// the transport layer should relay back are errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The session has reached a terminal phase
    #[error("session already concluded")]
    SessionOver,
    /// The roster refused the new player
    #[error(transparent)]
    Roster(#[from] player::Error),
}

/// The live round of a session
#[derive(Debug)]
struct Round {
    question: Question,
    votes: HashMap<Id, Answer>,
    deadline: web_time::SystemTime,
}

/// One game session's complete state
#[derive(Debug)]
pub struct GameSession {
    id: GameId,
    options: Options,
    phase: Phase,
    roster: Roster,
    plan: Vec<PlanEntry>,
    current_category: usize,
    current_round: usize,
    active_round: Option<Round>,
    // Question texts already asked, passed to the generator to avoid
    // repeats.
    history: Vec<String>,
    scheduler: RoundScheduler,
}

impl GameSession {
    /// Creates a session in the lobby with the host as its only player
    pub fn new(id: GameId, host: Id, host_name: impl Into<String>, options: Options) -> Self {
        Self {
            id,
            options,
            phase: Phase::Lobby,
            roster: Roster::with_host(host, host_name),
            plan: Vec::new(),
            current_category: 0,
            current_round: 0,
            active_round: None,
            history: Vec::new(),
            scheduler: RoundScheduler::new(),
        }
    }

    /// The session's id
    pub fn id(&self) -> GameId {
        self.id
    }

    /// The session's current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the given participant is a member of this session
    pub fn contains(&self, id: Id) -> bool {
        self.roster.contains(id)
    }

    /// Adds a player and announces the roster change
    ///
    /// The joiner gets a direct reply carrying the current roster and
    /// category plan; everyone gets the roster broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionOver`] for terminal sessions and roster
    /// errors when the session is full or the id already joined.
    pub fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        display_name: impl Into<String>,
        tunnel_finder: &F,
    ) -> Result<(), Error> {
        if matches!(self.phase, Phase::Ended | Phase::Failed) {
            return Err(Error::SessionOver);
        }
        self.roster.add(Player::new(id, display_name, false))?;
        Roster::send(
            id,
            &Event::GameJoined {
                players: self.roster.display_list(),
                category_plan: self.plan.clone(),
            },
            tunnel_finder,
        );
        self.roster.broadcast(
            &Event::UpdatePlayers {
                players: self.roster.display_list(),
            },
            tunnel_finder,
        );
        Ok(())
    }

    /// Leaves the lobby and begins the first category reveal
    ///
    /// A no-op outside the lobby or with fewer than the minimum player
    /// count. An empty category plan is populated by sampling; a plan
    /// players built beforehand is used verbatim.
    pub fn start<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        if self.phase != Phase::Lobby
            || self.roster.len() < constants::session::MIN_PLAYERS_TO_START
        {
            return;
        }
        if self.plan.is_empty() {
            let count = match self.options.plan_policy {
                PlanPolicy::AutoSample { count } => count,
                PlanPolicy::PlayerProposed => constants::plan::AUTO_SAMPLE_COUNT,
            };
            self.plan = categories::sample_plan(count);
        }
        tracing::info!(
            game_id = %self.id,
            players = self.roster.len(),
            categories = self.plan.len(),
            "game started"
        );
        self.roster.broadcast(&Event::GameStarted, tunnel_finder);
        self.begin_reveal(schedule_message, tunnel_finder);
    }

    /// Appends a player-proposed category to the plan
    ///
    /// Only meaningful in the lobby under the player-proposed plan
    /// policy; dropped silently otherwise.
    pub fn select_category(&mut self, id: Id, category: impl Into<String>) {
        if self.phase != Phase::Lobby
            || !matches!(self.options.plan_policy, PlanPolicy::PlayerProposed)
            || !self.roster.contains(id)
        {
            return;
        }
        self.plan.push(PlanEntry {
            category: category.into(),
            chosen_by: Some(id),
        });
    }

    /// Records a vote on the active round and applies its score
    ///
    /// Dropped silently when no round is active, the sender is not a
    /// member, or the sender already voted. Scoring happens here, at
    /// submission time; when the vote completes the all-voted quorum the
    /// round is finalized early and its timer cancelled.
    pub fn submit_vote<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        id: Id,
        vote: Answer,
        time_remaining: f64,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        if self.phase != Phase::RoundActive || !self.roster.contains(id) {
            return;
        }
        let Some(round) = &mut self.active_round else {
            return;
        };
        if round.votes.contains_key(&id) {
            return;
        }
        round.votes.insert(id, vote);

        let correct = round.question.is_correct(&vote);
        let points = scoring::vote_points(correct, time_remaining, self.options.round_seconds);
        if let Some(player) = self.roster.get_mut(id) {
            player.award(points);
        }

        let all_voted = self.roster.ids().all(|member| round.votes.contains_key(&member));
        if all_voted {
            self.scheduler.cancel();
            self.finish_round(schedule_message, tunnel_finder);
        }
    }

    /// Removes a participant and announces the roster change
    ///
    /// Their vote on the active round (if any) is dropped with them, but
    /// points already awarded to others stay and the round is never
    /// concluded by a departure alone. Returns whether the participant
    /// was a member.
    pub fn remove_player<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        tunnel_finder: &F,
    ) -> bool {
        if self.roster.remove(id).is_none() {
            return false;
        }
        if let Some(round) = &mut self.active_round {
            round.votes.remove(&id);
        }
        tracing::debug!(game_id = %self.id, participant = %id, "participant left");
        self.roster.broadcast(
            &Event::UpdatePlayers {
                players: self.roster.display_list(),
            },
            tunnel_finder,
        );
        true
    }

    /// Handles a scheduled countdown tick delivered back to the session
    ///
    /// Stale ticks from cancelled or superseded countdowns are discarded.
    /// Live ticks broadcast the remaining value; the final tick triggers
    /// the phase's terminal action.
    pub fn receive_alarm<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        alarm: AlarmMessage,
        question_source: &mut Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        let AlarmMessage::Tick(tick) = alarm;
        if !self.scheduler.accepts(tick) {
            tracing::debug!(game_id = %self.id, ?tick, "dropping stale countdown tick");
            return;
        }

        let event = match tick.kind {
            CountdownKind::Reveal => Event::CategoryCountdown { n: tick.remaining },
            CountdownKind::Round => Event::Countdown { n: tick.remaining },
            CountdownKind::InterRound => Event::NextRoundCountdown { n: tick.remaining },
        };
        self.roster.broadcast(&event, tunnel_finder);

        if self.scheduler.advance(tick, schedule_message) {
            match tick.kind {
                CountdownKind::Reveal => {
                    self.begin_round(question_source, schedule_message, tunnel_finder);
                }
                CountdownKind::Round => self.finish_round(schedule_message, tunnel_finder),
                CountdownKind::InterRound => {
                    self.advance_after_pause(question_source, schedule_message, tunnel_finder);
                }
            }
        }
    }

    /// Moves `before` to `after` if the session is in `before`
    ///
    /// Completion handlers run behind this guard so a duplicated trigger
    /// finds the transition already taken and becomes a no-op.
    fn change_phase(&mut self, before: Phase, after: Phase) -> bool {
        if self.phase == before {
            self.phase = after;
            true
        } else {
            false
        }
    }

    /// Enters the category reveal for the current plan entry
    fn begin_reveal<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        let Some(entry) = self.plan.get(self.current_category) else {
            return;
        };
        self.phase = Phase::SelectingCategory;
        self.roster.broadcast(
            &Event::NewCategory {
                category: entry.category.clone(),
            },
            tunnel_finder,
        );
        self.roster.broadcast(
            &Event::CategoryCountdown {
                n: constants::countdown::REVEAL_SECONDS,
            },
            tunnel_finder,
        );
        self.scheduler.start(
            CountdownKind::Reveal,
            constants::countdown::REVEAL_SECONDS,
            schedule_message,
        );
    }

    /// Requests a question and opens the round for votes
    ///
    /// Generation failure is fatal to the session: it enters the degraded
    /// terminal phase and broadcasts the abort instead of hanging on a
    /// timer that will never be started.
    fn begin_round<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        question_source: &mut Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        if !matches!(self.phase, Phase::SelectingCategory | Phase::RoundEnd) {
            return;
        }
        let Some(entry) = self.plan.get(self.current_category) else {
            return;
        };
        let kind = self.options.kind_policy.next_kind();
        match question_source.generate(&entry.category, kind, &self.history) {
            Ok(question) => {
                self.roster.broadcast(
                    &Event::NewRound {
                        question: question.text().to_owned(),
                        question_kind: question.kind(),
                        answers: question.options().map(<[String]>::to_vec),
                        round_index: self.current_round,
                    },
                    tunnel_finder,
                );
                self.active_round = Some(Round {
                    question,
                    votes: HashMap::new(),
                    deadline: web_time::SystemTime::now()
                        + Duration::from_secs(u64::from(self.options.round_seconds)),
                });
                self.phase = Phase::RoundActive;
                self.roster.broadcast(
                    &Event::Countdown {
                        n: self.options.round_seconds,
                    },
                    tunnel_finder,
                );
                self.scheduler.start(
                    CountdownKind::Round,
                    self.options.round_seconds,
                    schedule_message,
                );
            }
            Err(error) => {
                tracing::warn!(game_id = %self.id, %error, "question generation failed, aborting round");
                self.phase = Phase::Failed;
                self.scheduler.cancel();
                self.roster.broadcast(
                    &Event::RoundAborted {
                        reason: error.to_string(),
                    },
                    tunnel_finder,
                );
            }
        }
    }

    /// Finalizes the active round exactly once
    ///
    /// Reached from the round timer hitting zero or from the all-voted
    /// quorum; the phase guard makes the second arrival a no-op.
    fn finish_round<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        if !self.change_phase(Phase::RoundActive, Phase::RoundEnd) {
            return;
        }
        let Some(round) = self.active_round.take() else {
            return;
        };
        tracing::debug!(
            game_id = %self.id,
            votes = round.votes.len(),
            deadline = ?round.deadline,
            "round finalized"
        );
        self.history.push(round.question.text().to_owned());
        self.roster.broadcast(
            &Event::RoundResults {
                correct_answer: round.question.correct_answer(),
                results: scoring::score_table(self.roster.players()),
            },
            tunnel_finder,
        );

        if self.roster.is_empty() && self.options.end_when_abandoned {
            self.phase = Phase::Ended;
            tracing::info!(game_id = %self.id, "session abandoned, ending early");
            return;
        }
        self.roster.broadcast(
            &Event::NextRoundCountdown {
                n: constants::countdown::INTER_ROUND_SECONDS,
            },
            tunnel_finder,
        );
        self.scheduler.start(
            CountdownKind::InterRound,
            constants::countdown::INTER_ROUND_SECONDS,
            schedule_message,
        );
    }

    /// Advances to the next round, next category, or game over
    fn advance_after_pause<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        question_source: &mut Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        if self.phase != Phase::RoundEnd {
            return;
        }
        let category_done = self.current_round + 1 >= self.options.rounds_per_category;
        let plan_done = self.current_category + 1 >= self.plan.len();
        if category_done && plan_done {
            self.conclude(tunnel_finder);
        } else if category_done {
            self.current_category += 1;
            self.current_round = 0;
            self.begin_reveal(schedule_message, tunnel_finder);
        } else {
            self.current_round += 1;
            self.begin_round(question_source, schedule_message, tunnel_finder);
        }
    }

    /// Ends the session and broadcasts the final standings
    fn conclude<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: &F) {
        self.phase = Phase::Ended;
        self.scheduler.cancel();
        self.roster.broadcast(
            &Event::GameOver {
                ranked_results: scoring::final_ranking(self.roster.players()),
            },
            tunnel_finder,
        );
        tracing::info!(game_id = %self.id, "game over");
    }
}
