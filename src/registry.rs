//! Concurrent registry of live sessions
//!
//! The registry is the only state shared across sessions: a concurrent
//! id-to-session map supporting interleaved create, lookup, and remove
//! traffic. Each session sits behind its own mutex, which is what
//! serializes that session's event stream; joins, votes, and countdown
//! ticks all pass through here and are processed one at a time per
//! session. A panic or degraded state inside one session never touches
//! another's entry.
//!
//! The registry is constructed once by the embedding host and passed
//! around explicitly; nothing here is ambient global state.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use garde::Validate;
use thiserror::Error;

use crate::{
    Event, IncomingEvent,
    channel::Tunnel,
    game::{self, GameSession, Options},
    game_id::GameId,
    player::{Id, Roster},
    question::QuestionSource,
    scheduler::AlarmMessage,
};

/// Errors surfaced by registry operations
#[derive(Error, Debug)]
pub enum Error {
    /// No session with the given id, or the actor is in no session
    ///
    /// An expected condition on most inbound events, since clients keep
    /// sending after a session has ended and been removed.
    #[error("session not found")]
    NotFound,
    /// The requested session options failed validation
    #[error("invalid session options: {0}")]
    InvalidOptions(garde::Report),
    /// A session operation failed
    #[error(transparent)]
    Game(#[from] game::Error),
}

/// All live sessions, keyed by session id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GameId, Mutex<GameSession>>,
}

impl SessionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Creates a session in the lobby with a collision-checked fresh id
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] when the options fail
    /// validation.
    pub fn create_session(
        &self,
        host: Id,
        host_name: impl Into<String>,
        options: Options,
    ) -> Result<GameId, Error> {
        options.validate().map_err(Error::InvalidOptions)?;
        let host_name = host_name.into();
        loop {
            let id = GameId::new();
            if let Entry::Vacant(slot) = self.sessions.entry(id) {
                slot.insert(Mutex::new(GameSession::new(
                    id,
                    host,
                    host_name.clone(),
                    options.clone(),
                )));
                tracing::info!(game_id = %id, host = %host, "session created");
                return Ok(id);
            }
        }
    }

    /// Runs a closure against a session under its lock
    ///
    /// Returns `None` when no session has the given id.
    pub fn with_session<R>(
        &self,
        id: GameId,
        f: impl FnOnce(&mut GameSession) -> R,
    ) -> Option<R> {
        let entry = self.sessions.get(&id)?;
        let mut session = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut session))
    }

    /// Finds the session containing the given participant
    ///
    /// Needed for participant-scoped events (votes, disconnects) that
    /// carry no session id.
    pub fn find_session_by_participant(&self, id: Id) -> Option<GameId> {
        self.sessions.iter().find_map(|entry| {
            let session = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
            session.contains(id).then_some(*entry.key())
        })
    }

    /// Removes a participant from every session containing them
    ///
    /// Each affected session broadcasts its new roster. An in-flight
    /// round is never aborted by this; it runs to its natural
    /// conclusion.
    pub fn remove_participant<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        id: Id,
        tunnel_finder: &F,
    ) {
        for entry in self.sessions.iter() {
            let mut session = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
            session.remove_player(id, tunnel_finder);
        }
    }

    /// Drops a session, returning whether it existed
    pub fn remove_session(&self, id: GameId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            tracing::info!(game_id = %id, "session removed");
        }
        removed
    }

    /// Routes one inbound event to the session it concerns
    ///
    /// `actor` is the participant id the transport layer assigned to the
    /// sender. Session creation replies directly with the new id; votes
    /// are routed through the sender's identity since they carry no
    /// session id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the addressed session (or, for
    /// votes, any session containing the actor) does not exist, and
    /// passes through creation and join errors.
    pub fn dispatch<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(GameId, AlarmMessage, Duration),
    >(
        &self,
        actor: Id,
        event: IncomingEvent,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), Error> {
        match event {
            IncomingEvent::CreateGame {
                player_name,
                num_rounds,
            } => {
                let options = Options {
                    rounds_per_category: num_rounds,
                    ..Options::default()
                };
                let id = self.create_session(actor, player_name, options)?;
                Roster::send(actor, &Event::GameCreated { session_id: id }, tunnel_finder);
                Ok(())
            }
            IncomingEvent::JoinGame {
                session_id,
                player_name,
            } => self
                .with_session(session_id, |session| {
                    session.join(actor, player_name, tunnel_finder)
                })
                .ok_or(Error::NotFound)?
                .map_err(Error::from),
            IncomingEvent::StartGame { session_id } => self
                .with_session(session_id, |session| {
                    let mut schedule = |message: AlarmMessage, delay: Duration| {
                        schedule_message(session_id, message, delay);
                    };
                    session.start(&mut schedule, tunnel_finder);
                })
                .ok_or(Error::NotFound),
            IncomingEvent::SelectCategory {
                session_id,
                category,
            } => self
                .with_session(session_id, |session| {
                    session.select_category(actor, category);
                })
                .ok_or(Error::NotFound),
            IncomingEvent::SubmitVote {
                vote,
                time_remaining,
            } => {
                let session_id = self
                    .find_session_by_participant(actor)
                    .ok_or(Error::NotFound)?;
                self.with_session(session_id, |session| {
                    let mut schedule = |message: AlarmMessage, delay: Duration| {
                        schedule_message(session_id, message, delay);
                    };
                    session.submit_vote(
                        actor,
                        vote,
                        time_remaining,
                        &mut schedule,
                        tunnel_finder,
                    );
                })
                .ok_or(Error::NotFound)
            }
        }
    }

    /// Delivers a scheduled alarm to the session that scheduled it
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the session is gone; the alarm
    /// is simply dropped in that case.
    pub fn receive_alarm<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(GameId, AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &self,
        session_id: GameId,
        alarm: AlarmMessage,
        question_source: &mut Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), Error> {
        self.with_session(session_id, |session| {
            let mut schedule = |message: AlarmMessage, delay: Duration| {
                schedule_message(session_id, message, delay);
            };
            session.receive_alarm(alarm, question_source, &mut schedule, tunnel_finder);
        })
        .ok_or(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::{HashMap, VecDeque},
        rc::Rc,
        str::FromStr,
    };

    use super::*;
    use crate::{
        game::Phase,
        question::{Answer, GenerationError, Question, QuestionKind},
    };

    #[derive(Clone, Default)]
    struct MockTunnel {
        sent: Rc<RefCell<Vec<Event>>>,
    }

    impl Tunnel for MockTunnel {
        fn send(&self, event: &Event) {
            self.sent.borrow_mut().push(event.clone());
        }

        fn close(self) {}
    }

    struct Fixed(Question);

    impl QuestionSource for Fixed {
        fn generate(
            &mut self,
            _category: &str,
            _kind: QuestionKind,
            _previous: &[String],
        ) -> Result<Question, GenerationError> {
            Ok(self.0.clone())
        }
    }

    fn claim() -> Question {
        Question::TrueFalse {
            text: "The Pacific is the largest ocean.".to_owned(),
            correct: true,
        }
    }

    fn created_id(tunnel: &MockTunnel) -> GameId {
        let events = tunnel.sent.borrow();
        let Some(Event::GameCreated { session_id }) = events
            .iter()
            .find(|e| matches!(e, Event::GameCreated { .. }))
        else {
            panic!("no gameCreated reply");
        };
        *session_id
    }

    #[test]
    fn create_replies_directly_with_the_session_id() {
        let registry = SessionRegistry::new();
        let host = Id::new();
        let tunnels = HashMap::from([(host, MockTunnel::default())]);
        let finder = |id: Id| tunnels.get(&id).cloned();
        let mut schedule = |_: GameId, _: AlarmMessage, _: Duration| {};

        registry
            .dispatch(
                host,
                IncomingEvent::CreateGame {
                    player_name: "Alice".to_owned(),
                    num_rounds: 3,
                },
                &mut schedule,
                &finder,
            )
            .unwrap();

        let id = created_id(&tunnels[&host]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.with_session(id, |s| s.phase()),
            Some(Phase::Lobby)
        );
        assert_eq!(registry.find_session_by_participant(host), Some(id));
    }

    #[test]
    fn invalid_options_create_nothing() {
        let registry = SessionRegistry::new();
        let host = Id::new();
        let tunnels = HashMap::from([(host, MockTunnel::default())]);
        let finder = |id: Id| tunnels.get(&id).cloned();
        let mut schedule = |_: GameId, _: AlarmMessage, _: Duration| {};

        let result = registry.dispatch(
            host,
            IncomingEvent::CreateGame {
                player_name: "Alice".to_owned(),
                num_rounds: 0,
            },
            &mut schedule,
            &finder,
        );
        assert!(matches!(result, Err(Error::InvalidOptions(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn join_on_unknown_session_is_not_found() {
        let registry = SessionRegistry::new();
        let guest = Id::new();
        let tunnels = HashMap::from([(guest, MockTunnel::default())]);
        let finder = |id: Id| tunnels.get(&id).cloned();
        let mut schedule = |_: GameId, _: AlarmMessage, _: Duration| {};

        let result = registry.dispatch(
            guest,
            IncomingEvent::JoinGame {
                session_id: GameId::from_str("12345").unwrap(),
                player_name: "Bob".to_owned(),
            },
            &mut schedule,
            &finder,
        );
        assert!(matches!(result, Err(Error::NotFound)));
        assert!(tunnels[&guest].sent.borrow().is_empty());
    }

    #[test]
    fn votes_route_through_participant_identity() {
        let registry = SessionRegistry::new();
        let host = Id::new();
        let guest = Id::new();
        let tunnels = HashMap::from([
            (host, MockTunnel::default()),
            (guest, MockTunnel::default()),
        ]);
        let finder = |id: Id| tunnels.get(&id).cloned();
        let queue: RefCell<VecDeque<(GameId, AlarmMessage)>> = RefCell::new(VecDeque::new());
        let mut schedule = |id: GameId, message: AlarmMessage, _: Duration| {
            queue.borrow_mut().push_back((id, message));
        };
        let mut source = Fixed(claim());

        registry
            .dispatch(
                host,
                IncomingEvent::CreateGame {
                    player_name: "Alice".to_owned(),
                    num_rounds: 1,
                },
                &mut schedule,
                &finder,
            )
            .unwrap();
        let session_id = created_id(&tunnels[&host]);
        registry
            .dispatch(
                guest,
                IncomingEvent::JoinGame {
                    session_id,
                    player_name: "Bob".to_owned(),
                },
                &mut schedule,
                &finder,
            )
            .unwrap();
        registry
            .dispatch(
                host,
                IncomingEvent::StartGame { session_id },
                &mut schedule,
                &finder,
            )
            .unwrap();

        // Deliver reveal ticks until the round opens for votes.
        while registry.with_session(session_id, |s| s.phase()) != Some(Phase::RoundActive) {
            let next = queue.borrow_mut().pop_front();
            let (id, alarm) = next.expect("queue drained before round start");
            registry
                .receive_alarm(id, alarm, &mut source, &mut schedule, &finder)
                .unwrap();
        }

        // The vote carries no session id; routing goes through the
        // sender's identity.
        registry
            .dispatch(
                guest,
                IncomingEvent::SubmitVote {
                    vote: Answer::Boolean(true),
                    time_remaining: 30.0,
                },
                &mut schedule,
                &finder,
            )
            .unwrap();
        registry
            .dispatch(
                host,
                IncomingEvent::SubmitVote {
                    vote: Answer::Boolean(true),
                    time_remaining: 30.0,
                },
                &mut schedule,
                &finder,
            )
            .unwrap();

        assert_eq!(
            registry.with_session(session_id, |s| s.phase()),
            Some(Phase::RoundEnd)
        );
        assert!(
            tunnels[&guest]
                .sent
                .borrow()
                .iter()
                .any(|e| matches!(e, Event::RoundResults { .. }))
        );
    }

    #[test]
    fn removed_participant_leaves_every_session() {
        let registry = SessionRegistry::new();
        let host = Id::new();
        let guest = Id::new();
        let tunnels = HashMap::from([
            (host, MockTunnel::default()),
            (guest, MockTunnel::default()),
        ]);
        let finder = |id: Id| tunnels.get(&id).cloned();
        let mut schedule = |_: GameId, _: AlarmMessage, _: Duration| {};

        registry
            .dispatch(
                host,
                IncomingEvent::CreateGame {
                    player_name: "Alice".to_owned(),
                    num_rounds: 3,
                },
                &mut schedule,
                &finder,
            )
            .unwrap();
        let session_id = created_id(&tunnels[&host]);
        registry
            .dispatch(
                guest,
                IncomingEvent::JoinGame {
                    session_id,
                    player_name: "Bob".to_owned(),
                },
                &mut schedule,
                &finder,
            )
            .unwrap();

        registry.remove_participant(guest, &finder);
        assert_eq!(registry.find_session_by_participant(guest), None);
        assert!(
            tunnels[&host]
                .sent
                .borrow()
                .iter()
                .any(|e| matches!(e, Event::UpdatePlayers { players } if players.len() == 1))
        );

        // The session itself stays alive until explicitly removed.
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_session(session_id));
        assert!(registry.is_empty());
    }
}
