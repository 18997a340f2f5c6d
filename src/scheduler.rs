//! Cancellable per-second countdowns delivered as scheduled messages
//!
//! Every timed phase (category reveal, active round, inter-round pause)
//! runs one countdown that ticks once per second. Ticks are not
//! free-running callbacks: each one is an [`AlarmMessage`] handed to the
//! embedding host through the session's `schedule_message` callback and
//! delivered back into the same serialized event stream as votes and
//! joins.
//!
//! Cancellation is an epoch bump. A tick already in flight when its
//! countdown is cancelled arrives with a stale epoch and is discarded, so
//! a round that ends early because everyone voted cannot be finalized a
//! second time by its old timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interval between countdown ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The three countdown kinds
///
/// All three share the identical tick/cancel/idempotent-completion shape
/// and differ only in duration and in what happens when they hit zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountdownKind {
    /// Fixed category reveal before the first round of a category
    Reveal,
    /// The voting window of an active round
    Round,
    /// Fixed pause between rounds
    InterRound,
}

/// One scheduled countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Which countdown this tick belongs to
    pub kind: CountdownKind,
    /// Scheduler epoch at scheduling time; stale epochs are discarded
    pub epoch: u64,
    /// Seconds remaining when this tick fires
    pub remaining: u32,
}

/// Messages scheduled by a session for future delivery to itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
pub enum AlarmMessage {
    /// A countdown tick
    Tick(Tick),
}

/// Tracks the single live countdown of a session
///
/// At most one countdown is live at a time; starting a new one implicitly
/// invalidates whatever came before it.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct RoundScheduler {
    epoch: u64,
    live: Option<CountdownKind>,
}

impl RoundScheduler {
    /// Creates a scheduler with no live countdown
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently live countdown, if any
    pub fn live(&self) -> Option<CountdownKind> {
        self.live
    }

    /// Starts a countdown of `seconds` and schedules its first tick
    ///
    /// The caller broadcasts the initial full value itself; the first
    /// scheduled tick fires one second later carrying `seconds - 1`.
    pub fn start<S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        kind: CountdownKind,
        seconds: u32,
        schedule_message: &mut S,
    ) {
        self.epoch += 1;
        self.live = Some(kind);
        schedule_message(
            Tick {
                kind,
                epoch: self.epoch,
                remaining: seconds.saturating_sub(1),
            }
            .into(),
            TICK_INTERVAL,
        );
    }

    /// Whether a delivered tick belongs to the live countdown
    pub fn accepts(&self, tick: Tick) -> bool {
        self.live == Some(tick.kind) && self.epoch == tick.epoch
    }

    /// Advances a live countdown by one accepted tick
    ///
    /// Returns `true` when the countdown completed; otherwise the next
    /// tick is scheduled and the countdown stays live. Callers must have
    /// checked [`Self::accepts`] first.
    pub fn advance<S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        tick: Tick,
        schedule_message: &mut S,
    ) -> bool {
        if tick.remaining == 0 {
            self.live = None;
            true
        } else {
            schedule_message(
                Tick {
                    kind: tick.kind,
                    epoch: tick.epoch,
                    remaining: tick.remaining - 1,
                }
                .into(),
                TICK_INTERVAL,
            );
            false
        }
    }

    /// Cancels the live countdown
    ///
    /// Safe to call when nothing is live; a cancelled countdown's ticks
    /// still in flight fail the epoch check and are dropped.
    pub fn cancel(&mut self) {
        if self.live.take().is_some() {
            self.epoch += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_schedule(sink: &mut Vec<(AlarmMessage, Duration)>) -> impl FnMut(AlarmMessage, Duration) + '_ {
        |message, delay| sink.push((message, delay))
    }

    #[test]
    fn start_schedules_first_decremented_tick() {
        let mut scheduled = Vec::new();
        let mut scheduler = RoundScheduler::new();
        scheduler.start(CountdownKind::Reveal, 5, &mut collect_schedule(&mut scheduled));

        let (AlarmMessage::Tick(tick), delay) = scheduled[0];
        assert_eq!(tick.kind, CountdownKind::Reveal);
        assert_eq!(tick.remaining, 4);
        assert_eq!(delay, TICK_INTERVAL);
        assert!(scheduler.accepts(tick));
    }

    #[test]
    fn cancelled_countdown_rejects_in_flight_ticks() {
        let mut scheduled = Vec::new();
        let mut scheduler = RoundScheduler::new();
        scheduler.start(CountdownKind::Round, 30, &mut collect_schedule(&mut scheduled));
        let (AlarmMessage::Tick(tick), _) = scheduled[0];

        scheduler.cancel();
        assert!(!scheduler.accepts(tick));
        assert_eq!(scheduler.live(), None);
    }

    #[test]
    fn cancel_on_inert_scheduler_is_a_no_op() {
        let mut scheduler = RoundScheduler::new();
        scheduler.cancel();
        scheduler.cancel();
        assert_eq!(scheduler.live(), None);
    }

    #[test]
    fn advance_reschedules_until_zero_then_completes() {
        let mut scheduled = Vec::new();
        let mut scheduler = RoundScheduler::new();
        scheduler.start(CountdownKind::InterRound, 2, &mut collect_schedule(&mut scheduled));

        let (AlarmMessage::Tick(first), _) = scheduled[0];
        assert_eq!(first.remaining, 1);
        assert!(!scheduler.advance(first, &mut collect_schedule(&mut scheduled)));

        let (AlarmMessage::Tick(second), _) = scheduled[1];
        assert_eq!(second.remaining, 0);
        assert!(scheduler.advance(second, &mut collect_schedule(&mut scheduled)));
        assert_eq!(scheduler.live(), None);
    }

    #[test]
    fn restarting_invalidates_the_previous_countdown() {
        let mut scheduled = Vec::new();
        let mut scheduler = RoundScheduler::new();
        scheduler.start(CountdownKind::Reveal, 5, &mut collect_schedule(&mut scheduled));
        let (AlarmMessage::Tick(old), _) = scheduled[0];

        scheduler.start(CountdownKind::Round, 30, &mut collect_schedule(&mut scheduled));
        assert!(!scheduler.accepts(old));

        let (AlarmMessage::Tick(new), _) = scheduled[1];
        assert!(scheduler.accepts(new));
    }
}
