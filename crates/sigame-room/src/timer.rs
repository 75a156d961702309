//! The room's single re-armable timer.
//!
//! Every state transition either arms the timer with the next phase's
//! duration or leaves it alone. The game loop selects between client
//! events and [`RoundTimer::fired`]; while disarmed, `fired` pends
//! forever so the select simply never takes that branch.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(input) = rx.recv() => { /* handle event */ }
//!         _ = timer.fired() => { /* handle timeout */ }
//!     }
//! }
//! ```
//!
//! The deadline is absolute, so the future being dropped and re-created
//! on every select iteration does not drift it.

use std::time::Duration;

use tokio::time::Instant;

/// A cancellable one-shot timer driving a room's phase transitions.
pub struct RoundTimer {
    deadline: Option<Instant>,
}

impl RoundTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arms (or re-arms) the timer to fire after `duration`.
    /// Any previously armed deadline is discarded.
    pub fn arm(&mut self, duration: Duration) {
        self.deadline = Some(Instant::now() + duration);
    }

    /// Cancels the armed deadline, if any.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is currently armed.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes once the armed deadline passes, disarming the timer.
    /// Pends forever while disarmed.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(at) => {
                tokio::time::sleep_until(at).await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_after_duration() {
        let mut timer = RoundTimer::new();
        timer.arm(Duration::from_secs(10));

        let before = Instant::now();
        timer.fired().await;
        assert!(before.elapsed() >= Duration::from_secs(10));
        assert!(!timer.is_armed(), "firing disarms the timer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_timer_pends() {
        let mut timer = RoundTimer::new();
        let result =
            tokio::time::timeout(Duration::from_secs(3600), timer.fired()).await;
        assert!(result.is_err(), "disarmed timer must never fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut timer = RoundTimer::new();
        timer.arm(Duration::from_secs(100));
        timer.arm(Duration::from_secs(5));

        let before = Instant::now();
        timer.fired().await;
        let elapsed = before.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(100), "old deadline discarded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels_pending_deadline() {
        let mut timer = RoundTimer::new();
        timer.arm(Duration::from_secs(5));
        timer.disarm();

        let result =
            tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(result.is_err());
    }
}
