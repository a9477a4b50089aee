//! Session duration clock.
//!
//! A 1 Hz counter started when capture begins. The handle's `seconds()` is
//! the only time source used to stamp transcript segments and highlights, so
//! both stay aligned to the recording rather than to wall-clock time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Cloneable read handle onto the session duration counter.
#[derive(Clone, Default)]
pub struct ClockHandle {
    seconds: Arc<AtomicU64>,
}

impl ClockHandle {
    /// Seconds elapsed since the clock was started.
    pub fn seconds(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }
}

pub struct SessionClock {
    seconds: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            seconds: Arc::clone(&self.seconds),
        }
    }

    /// Start ticking. A second start while running is ignored.
    pub fn start(&mut self) {
        if self.task.is_some() {
            debug!("Session clock already running");
            return;
        }

        let seconds = Arc::clone(&self.seconds);
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            // The first tick completes immediately; consume it so the
            // counter reads 0 during the first second.
            interval.tick().await;
            loop {
                interval.tick().await;
                seconds.fetch_add(1, Ordering::SeqCst);
            }
        }));

        debug!("Session clock started");
    }

    /// Stop ticking. Idempotent; the counter keeps its final value.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Session clock stopped at {}s", self.handle().seconds());
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_once_per_second() {
        let mut clock = SessionClock::new();
        let handle = clock.handle();
        assert_eq!(handle.seconds(), 0);

        clock.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(handle.seconds(), 3);

        clock.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_stop_freezes_counter() {
        let mut clock = SessionClock::new();
        let handle = clock.handle();

        clock.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        clock.stop();

        let frozen = handle.seconds();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.seconds(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_stop_is_idempotent() {
        let mut clock = SessionClock::new();
        clock.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        clock.stop();
        clock.stop();
        assert_eq!(clock.handle().seconds(), 1);
    }
}
