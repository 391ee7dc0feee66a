//! Single outstanding flush timer.

use std::time::Duration;

use tokio::time::Instant;

/// Default delay between the first change of a batch and its flush.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(300);

/// A one-shot deadline owned by the reload batcher.
///
/// Arming an already armed timer keeps the original deadline: changes that
/// arrive while a flush is pending ride along with it.
#[derive(Debug, Clone)]
pub struct FlushTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl FlushTimer {
    /// Create a disarmed timer that fires `delay` after being armed.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arm the timer unless it already is. Returns whether it was armed now.
    pub fn arm_if_idle(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.delay);
        true
    }

    /// Drop the pending deadline, if any.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Delay applied when arming.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FlushTimer {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_DELAY)
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn fired(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rearming_keeps_original_deadline() {
        let mut timer = FlushTimer::default();
        let start = Instant::now();

        assert!(timer.arm_if_idle(start));
        assert!(!timer.arm_if_idle(start + Duration::from_millis(200)));
        assert_eq!(timer.deadline(), Some(start + DEFAULT_FLUSH_DELAY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_waits_for_deadline() {
        let mut timer = FlushTimer::new(Duration::from_millis(300));
        let start = Instant::now();
        timer.arm_if_idle(start);

        fired(timer.deadline()).await;

        assert!(Instant::now() >= start + Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_timer_never_fires() {
        let mut timer = FlushTimer::default();
        timer.arm_if_idle(Instant::now());
        timer.disarm();

        let mut task = tokio_test::task::spawn(fired(timer.deadline()));
        tokio::time::advance(Duration::from_secs(5)).await;

        tokio_test::assert_pending!(task.poll());
    }
}
