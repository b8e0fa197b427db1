//! Progress countdown
//!
//! The countdown is purely presentational: it gives the player a sense of
//! time pressure between server messages but never closes a buzz window on
//! its own. Ticks are scheduled through the host's event loop with a
//! `schedule(alarm, delay)` callback. Every start or cancel bumps the timer's
//! epoch, and a tick carrying an old epoch is discarded, so at most one
//! countdown is ever live.

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::constants::protocol::TICK_MS;

/// Resolution of the countdown
pub const TICK: Duration = Duration::from_millis(TICK_MS);

/// Scheduled tick of a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// Epoch of the countdown that scheduled this tick
    epoch: u64,
}

/// What the countdown currently shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Time remaining
    pub time_left: Duration,
    /// Full length of the countdown
    pub time_total: Duration,
    /// Whether the countdown is shown as urgent
    pub urgent: bool,
}

impl Progress {
    /// Remaining share of the countdown in percent, clamped to `[0, 100]`
    pub fn percentage(&self) -> f64 {
        if self.time_total.is_zero() {
            return 0.;
        }
        (self.time_left.as_secs_f64() / self.time_total.as_secs_f64() * 100.).clamp(0., 100.)
    }

    /// Whole seconds remaining, as shown on the bar
    pub fn label(&self) -> u64 {
        self.time_left.as_secs()
    }
}

/// Single-owner countdown handle
#[derive(Debug, Default)]
pub struct ProgressTimer {
    epoch: u64,
    running: Option<Progress>,
}

impl ProgressTimer {
    /// Starts a countdown, cancelling any countdown already running
    ///
    /// # Arguments
    ///
    /// * `time_left` - Time remaining at the start
    /// * `time_total` - Full length, the denominator of the percentage
    /// * `urgent` - Whether to flag the countdown as urgent
    /// * `schedule` - Callback that delivers an [`Alarm`] back after a delay
    ///
    /// # Returns
    ///
    /// The progress to display immediately
    pub fn start<S: FnMut(Alarm, Duration)>(
        &mut self,
        time_left: Duration,
        time_total: Duration,
        urgent: bool,
        schedule: &mut S,
    ) -> Progress {
        self.cancel();
        let progress = Progress {
            time_left,
            time_total,
            urgent,
        };
        if !time_left.is_zero() {
            self.running = Some(progress);
            schedule(Alarm { epoch: self.epoch }, TICK);
        }
        progress
    }

    /// Stops the running countdown
    ///
    /// Returns `true` if a countdown was running.
    pub fn cancel(&mut self) -> bool {
        self.epoch += 1;
        self.running.take().is_some()
    }

    /// Advances the countdown by one tick
    ///
    /// Stale ticks, from a countdown that was since cancelled or restarted,
    /// return `None`. The countdown stops scheduling once it reaches zero.
    pub fn receive_alarm<S: FnMut(Alarm, Duration)>(
        &mut self,
        alarm: Alarm,
        schedule: &mut S,
    ) -> Option<Progress> {
        if alarm.epoch != self.epoch {
            return None;
        }
        let progress = self.running.as_mut()?;
        progress.time_left = progress.time_left.saturating_sub(TICK);
        let progress = *progress;

        if progress.time_left.is_zero() {
            self.running = None;
        } else {
            schedule(alarm, TICK);
        }
        Some(progress)
    }

    /// Whether a countdown is running
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Progress of the running countdown
    pub fn progress(&self) -> Option<Progress> {
        self.running
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<Alarm>>>, impl FnMut(Alarm, Duration)) {
        let alarms = Arc::new(Mutex::new(Vec::new()));
        let sink = alarms.clone();
        (alarms, move |alarm, delay| {
            assert_eq!(delay, TICK);
            sink.lock().unwrap().push(alarm);
        })
    }

    #[test]
    fn test_full_countdown() {
        let (alarms, mut schedule) = recorder();
        let mut timer = ProgressTimer::default();
        let shown = timer.start(
            Duration::from_secs(60),
            Duration::from_secs(60),
            false,
            &mut schedule,
        );
        assert!((shown.percentage() - 100.).abs() < f64::EPSILON);

        let mut last = None;
        for _ in 0..60 {
            let alarm = *alarms.lock().unwrap().last().unwrap();
            last = timer.receive_alarm(alarm, &mut schedule);
            assert!(last.is_some());
        }

        let last = last.unwrap();
        assert_eq!(last.time_left, Duration::ZERO);
        assert!(last.percentage().abs() < f64::EPSILON);
        assert_eq!(alarms.lock().unwrap().len(), 60);
        assert!(!timer.is_running());

        let alarm = *alarms.lock().unwrap().last().unwrap();
        assert!(timer.receive_alarm(alarm, &mut schedule).is_none());
        assert_eq!(alarms.lock().unwrap().len(), 60);
    }

    #[test]
    fn test_restart_discards_old_ticks() {
        let (alarms, mut schedule) = recorder();
        let mut timer = ProgressTimer::default();
        timer.start(Duration::from_secs(10), Duration::from_secs(10), false, &mut schedule);
        let stale = alarms.lock().unwrap()[0];

        timer.start(Duration::from_secs(7), Duration::from_secs(7), true, &mut schedule);
        let live = alarms.lock().unwrap()[1];

        assert!(timer.receive_alarm(stale, &mut schedule).is_none());
        let progress = timer.receive_alarm(live, &mut schedule).unwrap();
        assert_eq!(progress.time_left, Duration::from_secs(6));
        assert!(progress.urgent);
    }

    #[test]
    fn test_cancel_stops_ticks() {
        let (alarms, mut schedule) = recorder();
        let mut timer = ProgressTimer::default();
        timer.start(Duration::from_secs(5), Duration::from_secs(5), false, &mut schedule);

        assert!(timer.cancel());
        assert!(!timer.cancel());
        let alarm = alarms.lock().unwrap()[0];
        assert!(timer.receive_alarm(alarm, &mut schedule).is_none());
        assert_eq!(alarms.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fractional_countdown_stops_at_zero() {
        let (alarms, mut schedule) = recorder();
        let mut timer = ProgressTimer::default();
        timer.start(
            Duration::from_millis(1500),
            Duration::from_secs(3),
            false,
            &mut schedule,
        );

        let alarm = alarms.lock().unwrap()[0];
        let first = timer.receive_alarm(alarm, &mut schedule).unwrap();
        assert_eq!(first.time_left, Duration::from_millis(500));
        let alarm = alarms.lock().unwrap()[1];
        let second = timer.receive_alarm(alarm, &mut schedule).unwrap();
        assert_eq!(second.time_left, Duration::ZERO);
        assert_eq!(alarms.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_zero_length_countdown_never_ticks() {
        let (alarms, mut schedule) = recorder();
        let mut timer = ProgressTimer::default();
        let shown = timer.start(Duration::ZERO, Duration::from_secs(3), false, &mut schedule);

        assert!(shown.percentage().abs() < f64::EPSILON);
        assert!(!timer.is_running());
        assert!(alarms.lock().unwrap().is_empty());
    }

    #[test]
    fn test_percentage_clamped() {
        let over = Progress {
            time_left: Duration::from_secs(20),
            time_total: Duration::from_secs(10),
            urgent: false,
        };
        assert!((over.percentage() - 100.).abs() < f64::EPSILON);

        let empty = Progress {
            time_left: Duration::from_secs(1),
            time_total: Duration::ZERO,
            urgent: true,
        };
        assert!(empty.percentage().abs() < f64::EPSILON);
        assert_eq!(over.label(), 20);
    }
}
