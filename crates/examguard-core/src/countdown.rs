//! The attempt countdown.

/// Emitted once when the countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeExpired;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownState {
    Idle,
    Running,
    Expired,
    Stopped,
}

/// A seconds counter that only moves while running.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u64,
    state: CountdownState,
}

impl Countdown {
    pub fn new(duration_seconds: u64) -> Self {
        Self {
            remaining: duration_seconds,
            state: CountdownState::Idle,
        }
    }

    /// Start counting. Has no effect once expired or stopped.
    pub fn start(&mut self) {
        if self.state == CountdownState::Idle {
            self.state = CountdownState::Running;
        }
    }

    /// Advance by one second. Returns `TimeExpired` on the tick that reaches
    /// zero and never again.
    pub fn tick(&mut self) -> Option<TimeExpired> {
        if self.state != CountdownState::Running {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = CountdownState::Expired;
            return Some(TimeExpired);
        }
        None
    }

    /// Stop for good. Later ticks are ignored.
    pub fn stop(&mut self) {
        if self.state != CountdownState::Expired {
            self.state = CountdownState::Stopped;
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    pub fn has_expired(&self) -> bool {
        self.state == CountdownState::Expired
    }
}

/// Render seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_time_left(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_exactly_once() {
        let mut countdown = Countdown::new(3);
        countdown.start();
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.tick(), Some(TimeExpired));
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.remaining(), 0);
        assert!(countdown.has_expired());
    }

    #[test]
    fn does_not_tick_before_start() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.remaining(), 2);
    }

    #[test]
    fn stopped_countdown_ignores_ticks() {
        let mut countdown = Countdown::new(2);
        countdown.start();
        countdown.stop();
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.remaining(), 2);
        countdown.start();
        assert!(!countdown.is_running());
    }

    #[test]
    fn zero_duration_expires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        countdown.start();
        assert_eq!(countdown.tick(), Some(TimeExpired));
    }

    #[test]
    fn time_format() {
        assert_eq!(format_time_left(3600), "60:00");
        assert_eq!(format_time_left(61), "01:01");
        assert_eq!(format_time_left(0), "00:00");
    }
}
