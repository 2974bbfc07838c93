//! Round and parlay timers.
//!
//! A timer is a record, not a task: the owning actor polls it from its tick
//! loop, so expiry handling always runs on the game's executor and a
//! stopped timer can never fire. `remaining` is derived on read while
//! running and frozen while paused or stopped.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Running,
    Paused,
    Stopped,
}

#[derive(Clone, Debug)]
pub struct GameTimer {
    duration: Duration,
    remaining: Duration,
    started_at: Option<Instant>,
    state: TimerState,
}

impl GameTimer {
    /// A timer holding its full duration, not yet ticking.
    pub fn prepared(duration: Duration) -> Self {
        Self {
            duration,
            remaining: duration,
            started_at: None,
            state: TimerState::Paused,
        }
    }

    /// A timer already running.
    pub fn running(duration: Duration) -> Self {
        let mut timer = Self::prepared(duration);
        timer.start();
        timer
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        match (self.state, self.started_at) {
            (TimerState::Running, Some(started_at)) => {
                self.remaining.saturating_sub(started_at.elapsed())
            }
            _ => self.remaining,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_expired(&self) -> bool {
        self.state == TimerState::Running && self.remaining().is_zero()
    }

    /// Start or resume ticking from the current `remaining`.
    pub fn start(&mut self) {
        if self.state == TimerState::Running {
            return;
        }
        self.started_at = Some(Instant::now());
        self.state = TimerState::Running;
    }

    /// Freeze `remaining` in place. No-op unless running.
    pub fn pause(&mut self) {
        if self.state != TimerState::Running {
            return;
        }
        self.remaining = self.remaining();
        self.started_at = None;
        self.state = TimerState::Paused;
    }

    /// Stop for good; a stopped timer never restarts or fires.
    pub fn stop(&mut self) {
        self.remaining = self.remaining();
        self.started_at = None;
        self.state = TimerState::Stopped;
    }

    pub fn view(&self) -> TimerView {
        TimerView {
            duration_secs: self.duration.as_secs(),
            remaining_secs: self.remaining().as_secs(),
            state: self.state,
        }
    }
}

/// Public projection of a timer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TimerView {
    pub duration_secs: u64,
    pub remaining_secs: u64,
    pub state: TimerState,
}

impl TimerView {
    /// Placeholder for phases with no live timer.
    pub fn idle() -> Self {
        Self {
            duration_secs: 0,
            remaining_secs: 0,
            state: TimerState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn running_timer_counts_down() {
        let timer = GameTimer::running(Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(timer.remaining(), Duration::from_secs(50));
        assert!(!timer.is_expired());
        tokio::time::advance(Duration::from_secs(51)).await;
        assert_eq!(timer.remaining(), Duration::ZERO);
        assert!(timer.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn prepared_timer_holds_full_duration() {
        let timer = GameTimer::prepared(Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(timer.remaining(), Duration::from_secs(60));
        assert_eq!(timer.state(), TimerState::Paused);
        assert!(!timer.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_and_resume_continues() {
        let mut timer = GameTimer::running(Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(20)).await;
        timer.pause();
        let frozen = timer.remaining();
        assert_eq!(frozen, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(timer.remaining(), frozen);

        timer.start();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(timer.remaining(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_expires() {
        let mut timer = GameTimer::running(Duration::from_secs(5));
        timer.stop();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!timer.is_expired());
        assert_eq!(timer.state(), TimerState::Stopped);
    }
}
