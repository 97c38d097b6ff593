//! Round timer driver
//!
//! Host-side one-second countdown owned by the active input or reveal phase,
//! plus the replica-side display clock that follows the host's resyncs.

/// What one host tick produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// No countdown running
    Idle,
    /// Time decremented, no broadcast due
    Tick { remaining: u32 },
    /// Time decremented and a resync broadcast is due
    Resync { remaining: u32 },
    /// Countdown reached zero for the phase identified by `epoch`
    Expired { epoch: u64 },
}

/// Host countdown for the current phase.
///
/// Every restart or cancel bumps the epoch; an expiry carrying an old epoch
/// belongs to a phase that has already ended and must be ignored.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    epoch: u64,
    remaining: u32,
    running: bool,
    resync_every: u32,
    since_resync: u32,
}

impl PhaseTimer {
    pub fn new(resync_every: u32) -> Self {
        Self {
            epoch: 0,
            remaining: 0,
            running: false,
            resync_every: resync_every.max(1),
            since_resync: 0,
        }
    }

    /// Cancels whatever was running and starts a fresh countdown
    pub fn restart(&mut self, seconds: u32) -> u64 {
        self.epoch += 1;
        self.remaining = seconds;
        self.running = true;
        self.since_resync = 0;
        self.epoch
    }

    pub fn cancel(&mut self) {
        self.epoch += 1;
        self.running = false;
        self.remaining = 0;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances the countdown by one second
    pub fn tick(&mut self) -> TimerEvent {
        if !self.running {
            return TimerEvent::Idle;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            return TimerEvent::Expired { epoch: self.epoch };
        }

        self.since_resync += 1;
        if self.since_resync >= self.resync_every {
            self.since_resync = 0;
            TimerEvent::Resync {
                remaining: self.remaining,
            }
        } else {
            TimerEvent::Tick {
                remaining: self.remaining,
            }
        }
    }
}

/// Replica countdown display.
///
/// Counts down locally between host resyncs but never drifts more than one
/// resync interval below the last value the host reported.
#[derive(Debug, Clone)]
pub struct DisplayClock {
    shown: u32,
    last_host: u32,
    resync_every: u32,
}

impl DisplayClock {
    pub fn new(resync_every: u32) -> Self {
        Self {
            shown: 0,
            last_host: 0,
            resync_every: resync_every.max(1),
        }
    }

    /// Snaps to an authoritative value
    pub fn sync(&mut self, remaining: u32) {
        self.shown = remaining;
        self.last_host = remaining;
    }

    pub fn tick(&mut self) -> u32 {
        let floor = self.last_host.saturating_sub(self.resync_every);
        self.shown = self.shown.saturating_sub(1).max(floor);
        self.shown
    }

    pub fn shown(&self) -> u32 {
        self.shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_until_started() {
        let mut timer = PhaseTimer::new(2);
        assert_eq!(timer.tick(), TimerEvent::Idle);
    }

    #[test]
    fn test_resync_every_interval() {
        let mut timer = PhaseTimer::new(2);
        timer.restart(5);
        assert_eq!(timer.tick(), TimerEvent::Tick { remaining: 4 });
        assert_eq!(timer.tick(), TimerEvent::Resync { remaining: 3 });
        assert_eq!(timer.tick(), TimerEvent::Tick { remaining: 2 });
        assert_eq!(timer.tick(), TimerEvent::Resync { remaining: 1 });
    }

    #[test]
    fn test_expires_once() {
        let mut timer = PhaseTimer::new(2);
        let epoch = timer.restart(2);
        timer.tick();
        assert_eq!(timer.tick(), TimerEvent::Expired { epoch });
        assert_eq!(timer.tick(), TimerEvent::Idle);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_restart_and_cancel_bump_epoch() {
        let mut timer = PhaseTimer::new(2);
        let first = timer.restart(10);
        let second = timer.restart(10);
        assert!(second > first);
        timer.cancel();
        assert!(timer.epoch() > second);
        assert_eq!(timer.tick(), TimerEvent::Idle);
    }

    #[test]
    fn test_display_clock_drift_is_bounded() {
        let mut clock = DisplayClock::new(2);
        clock.sync(10);
        assert_eq!(clock.tick(), 9);
        assert_eq!(clock.tick(), 8);
        // resync missed: stays at most one interval below the host value
        assert_eq!(clock.tick(), 8);
        assert_eq!(clock.tick(), 8);

        clock.sync(5);
        assert_eq!(clock.shown(), 5);
        assert_eq!(clock.tick(), 4);
    }

    #[test]
    fn test_display_clock_never_negative() {
        let mut clock = DisplayClock::new(2);
        clock.sync(1);
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.tick(), 0);
    }
}
