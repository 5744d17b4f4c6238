use crate::clock::Millis;
use crate::util::format_clock;

/// Whole-second countdown over the session's time budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    remaining_secs: u64,
    last_step: Millis,
    running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStatus {
    Running(u64),
    Expired,
    Stopped,
}

impl Countdown {
    pub fn start(budget_secs: u64, now: Millis) -> Self {
        Self {
            remaining_secs: budget_secs,
            last_step: now,
            running: true,
        }
    }

    /// Consume every whole second elapsed since the last step; the fraction
    /// carries over to the next call.
    pub fn advance(&mut self, now: Millis) -> CountdownStatus {
        if !self.running {
            return CountdownStatus::Stopped;
        }
        let elapsed = now - self.last_step;
        if elapsed >= 1000 {
            let whole = (elapsed / 1000) as u64;
            self.last_step += whole as Millis * 1000;
            self.remaining_secs = self.remaining_secs.saturating_sub(whole);
        }
        if self.remaining_secs == 0 {
            self.running = false;
            return CountdownStatus::Expired;
        }
        CountdownStatus::Running(self.remaining_secs)
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn display(&self) -> String {
        format_clock(self.remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_whole_seconds_only() {
        let mut c = Countdown::start(180, 0);
        assert_eq!(c.advance(999), CountdownStatus::Running(180));
        assert_eq!(c.advance(1000), CountdownStatus::Running(179));
        assert_eq!(c.advance(2500), CountdownStatus::Running(178));
        // the half second carried from 2500 completes at 3000
        assert_eq!(c.advance(3000), CountdownStatus::Running(177));
        assert_eq!(c.display(), "02:57");
    }

    #[test]
    fn expires_exactly_at_zero() {
        let mut c = Countdown::start(3, 0);
        assert_eq!(c.advance(2999), CountdownStatus::Running(1));
        assert_eq!(c.advance(3000), CountdownStatus::Expired);
        assert_eq!(c.display(), "00:00");
        assert!(!c.is_running());
        assert_eq!(c.advance(9000), CountdownStatus::Stopped);
    }

    #[test]
    fn large_jump_saturates() {
        let mut c = Countdown::start(5, 0);
        assert_eq!(c.advance(60_000), CountdownStatus::Expired);
        assert_eq!(c.remaining_secs(), 0);
    }

    #[test]
    fn stopped_countdown_holds_value() {
        let mut c = Countdown::start(10, 0);
        c.stop();
        assert_eq!(c.advance(5000), CountdownStatus::Stopped);
        assert_eq!(c.remaining_secs(), 10);
    }
}
