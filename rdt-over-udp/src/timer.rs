//! Retransmission timer.
//!
//! Reliable delivery requires that unacknowledged packets are re-sent if no
//! acknowledgement arrives within a bounded time. [`RetransmitTimer`] is a
//! plain deadline: the send loop polls it on every scheduling tick instead
//! of owning a sleeping task, so arming and cancelling are just field
//! updates.
//!
//! Go-Back-N uses one timer per window; Selective Repeat keeps a send
//! timestamp per slot and calls [`expired_since`] for each.

use std::time::{Duration, Instant};

/// A single armed-or-not deadline with a fixed timeout.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// (Re)start the timer so that it fires `timeout` after `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` when the timer is armed and its deadline has passed.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// `true` when a packet sent at `sent_at` has been in flight for at least
/// `timeout` as of `now`.
pub fn expired_since(sent_at: Instant, timeout: Duration, now: Instant) -> bool {
    now.saturating_duration_since(sent_at) >= timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_timer_is_disarmed() {
        let t = RetransmitTimer::new(Duration::from_millis(100));
        assert!(!t.is_armed());
        assert!(!t.expired(Instant::now() + Duration::from_secs(10)));
    }

    #[test]
    fn armed_timer_fires_after_timeout() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(Duration::from_millis(100));
        t.arm(now);
        assert!(!t.expired(now + Duration::from_millis(99)));
        assert!(t.expired(now + Duration::from_millis(100)));
    }

    #[test]
    fn rearm_pushes_deadline_forward() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(Duration::from_millis(100));
        t.arm(now);
        t.arm(now + Duration::from_millis(80));
        assert!(!t.expired(now + Duration::from_millis(150)));
        assert!(t.expired(now + Duration::from_millis(180)));
    }

    #[test]
    fn disarm_cancels() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(Duration::from_millis(10));
        t.arm(now);
        t.disarm();
        assert!(!t.expired(now + Duration::from_secs(1)));
    }

    #[test]
    fn expired_since_compares_age() {
        let sent = Instant::now();
        let timeout = Duration::from_millis(50);
        assert!(!expired_since(sent, timeout, sent + Duration::from_millis(49)));
        assert!(expired_since(sent, timeout, sent + Duration::from_millis(50)));
    }
}
