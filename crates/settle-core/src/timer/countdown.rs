//! Single-shot cancellable countdown.
//!
//! Wall-clock based and caller-polled: the host calls [`Countdown::tick`]
//! with the current time and the countdown flushes however many whole
//! seconds elapsed since the last flush. There are no internal threads and
//! no timer handles to leak; one instance drives exactly one countdown, and
//! cancelling it suppresses the completion signal no matter when it lands.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Running,
    Finished,
    Cancelled,
}

/// Outcome of a [`Countdown::tick`] that consumed at least one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownSignal {
    /// Whole seconds elapsed; the countdown is still running.
    Elapsed { remaining_secs: u32 },
    /// The countdown hit zero on this tick. Delivered exactly once.
    Finished,
}

/// A one-shot countdown over whole seconds.
///
/// Sub-second drift carries over between ticks: the flush anchor only moves
/// by the whole seconds consumed, so polling at an uneven cadence never
/// loses time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    total_secs: u32,
    remaining_secs: u32,
    state: CountdownState,
    last_flush: Option<DateTime<Utc>>,
}

impl Countdown {
    /// Start a countdown of `secs`, clamped to at least one second.
    pub fn start(secs: u32, now: DateTime<Utc>) -> Self {
        let secs = secs.max(1);
        Self {
            total_secs: secs,
            remaining_secs: secs,
            state: CountdownState::Running,
            last_flush: Some(now),
        }
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state == CountdownState::Finished
    }

    /// Flush elapsed wall-clock time. Returns `None` when nothing changed:
    /// less than a second elapsed, the clock went backwards, or the
    /// countdown is no longer running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<CountdownSignal> {
        if self.state != CountdownState::Running {
            return None;
        }
        let anchor = self.last_flush?;
        let elapsed = (now - anchor).num_seconds();
        if elapsed <= 0 {
            return None;
        }
        self.last_flush = Some(anchor + Duration::seconds(elapsed));
        let consumed = elapsed.min(i64::from(self.remaining_secs)) as u32;
        self.remaining_secs -= consumed;
        if self.remaining_secs == 0 {
            self.state = CountdownState::Finished;
            Some(CountdownSignal::Finished)
        } else {
            Some(CountdownSignal::Elapsed {
                remaining_secs: self.remaining_secs,
            })
        }
    }

    /// Stop the countdown and suppress its completion signal. Safe to call
    /// in any state; after completion it is a no-op.
    pub fn cancel(&mut self) {
        if self.state == CountdownState::Running {
            self.state = CountdownState::Cancelled;
            self.last_flush = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn start_clamps_to_one_second() {
        let countdown = Countdown::start(0, t0());
        assert_eq!(countdown.total_secs(), 1);
        assert_eq!(countdown.remaining_secs(), 1);
    }

    #[test]
    fn ticks_flush_whole_seconds() {
        let mut countdown = Countdown::start(10, t0());
        let signal = countdown.tick(t0() + Duration::seconds(3)).unwrap();
        assert_eq!(signal, CountdownSignal::Elapsed { remaining_secs: 7 });
        assert_eq!(countdown.remaining_secs(), 7);
    }

    #[test]
    fn sub_second_drift_carries_over() {
        let mut countdown = Countdown::start(10, t0());
        // 900ms: nothing flushed yet
        assert!(countdown.tick(t0() + Duration::milliseconds(900)).is_none());
        // 1.8s total: one whole second consumed, 800ms carried
        let signal = countdown.tick(t0() + Duration::milliseconds(1800)).unwrap();
        assert_eq!(signal, CountdownSignal::Elapsed { remaining_secs: 9 });
        // 2.1s total: the carried 800ms plus 300ms crosses the next boundary
        let signal = countdown.tick(t0() + Duration::milliseconds(2100)).unwrap();
        assert_eq!(signal, CountdownSignal::Elapsed { remaining_secs: 8 });
    }

    #[test]
    fn finishes_exactly_once_with_zero_remaining() {
        let mut countdown = Countdown::start(2, t0());
        let signal = countdown.tick(t0() + Duration::seconds(5)).unwrap();
        assert_eq!(signal, CountdownSignal::Finished);
        assert_eq!(countdown.remaining_secs(), 0);
        assert!(countdown.is_finished());
        assert!(countdown.tick(t0() + Duration::seconds(10)).is_none());
    }

    #[test]
    fn cancel_suppresses_completion() {
        let mut countdown = Countdown::start(5, t0());
        countdown.cancel();
        assert!(!countdown.is_running());
        assert!(countdown.tick(t0() + Duration::seconds(60)).is_none());
    }

    #[test]
    fn cancel_after_finish_is_a_noop() {
        let mut countdown = Countdown::start(1, t0());
        assert_eq!(
            countdown.tick(t0() + Duration::seconds(2)),
            Some(CountdownSignal::Finished)
        );
        countdown.cancel();
        assert!(countdown.is_finished());
    }

    #[test]
    fn clock_going_backwards_changes_nothing() {
        let mut countdown = Countdown::start(10, t0());
        assert!(countdown.tick(t0() - Duration::seconds(30)).is_none());
        assert_eq!(countdown.remaining_secs(), 10);
    }

    proptest! {
        #[test]
        fn arbitrary_tick_schedules_finish_exactly_once(
            total in 1u32..120,
            offsets_ms in proptest::collection::vec(1u64..5_000, 1..40),
        ) {
            let mut countdown = Countdown::start(total, t0());
            let mut now = t0();
            let mut finishes = 0;
            let mut last_remaining = countdown.remaining_secs();
            for off in offsets_ms {
                now += Duration::milliseconds(off as i64);
                match countdown.tick(now) {
                    Some(CountdownSignal::Finished) => finishes += 1,
                    Some(CountdownSignal::Elapsed { remaining_secs }) => {
                        prop_assert!(remaining_secs < last_remaining);
                        last_remaining = remaining_secs;
                    }
                    None => {}
                }
            }
            prop_assert!(finishes <= 1);
            if countdown.is_finished() {
                prop_assert_eq!(countdown.remaining_secs(), 0);
                prop_assert_eq!(finishes, 1);
            }
        }
    }
}
