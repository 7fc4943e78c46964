//! Per-rental countdown driven by the authoritative end timestamp
//!
//! Remaining time is recomputed from `ends_at - now` on every tick, never
//! by decrementing a counter, so the countdown survives suspension and a
//! restarted timer resumes at the correct point from `ends_at` alone.

use chrono::{DateTime, Utc};
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Seconds left until `ends_at`, clamped at zero
pub fn remaining_seconds(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (ends_at - now).num_seconds().max(0) as u64
}

/// `HH:MM:SS` rendering of a remaining-seconds value
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Expiration signal carrying the rental id, sent exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiration {
    pub rental_id: String,
}

/// Ticking countdown for one active rental
pub struct RentalTimer {
    rental_id: String,
    ends_at: DateTime<Utc>,
    handle: Option<JoinHandle<()>>,
}

impl RentalTimer {
    /// Start ticking; the expiration signal is raised the first time the
    /// remaining seconds reach zero, after which the tick task ends
    pub fn start(
        rental_id: String,
        ends_at: DateTime<Utc>,
        tick: Duration,
        expirations: mpsc::UnboundedSender<Expiration>,
    ) -> Self {
        let task_id = rental_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                ticker.tick().await;
                if remaining_seconds(ends_at, Utc::now()) == 0 {
                    debug!("rental {} expired", task_id);
                    let _ = expirations.send(Expiration {
                        rental_id: task_id.clone(),
                    });
                    break;
                }
            }
        });

        Self {
            rental_id,
            ends_at,
            handle: Some(handle),
        }
    }

    pub fn rental_id(&self) -> &str {
        &self.rental_id
    }

    /// Current remaining seconds, recomputed from the wall clock
    pub fn remaining_seconds(&self) -> u64 {
        remaining_seconds(self.ends_at, Utc::now())
    }

    /// Stop ticking; no expiration will be raised after this returns
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for RentalTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_remaining_recomputed_from_end_time() {
        let now = Utc::now();
        let ends_at = now + ChronoDuration::seconds(3600);
        // a "reload" halfway through resumes at ~1800s, not 3600s
        let halfway = now + ChronoDuration::seconds(1800);
        let remaining = remaining_seconds(ends_at, halfway);
        assert!((1799..=1800).contains(&remaining));
        // past the end it clamps at zero
        let late = now + ChronoDuration::seconds(4000);
        assert_eq!(remaining_seconds(ends_at, late), 0);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(3600), "01:00:00");
        assert_eq!(format_hms(4 * 3600 + 5 * 60 + 6), "04:05:06");
    }

    #[tokio::test]
    async fn test_fires_exactly_once_for_elapsed_rental() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ends_at = Utc::now() - ChronoDuration::seconds(5);
        let _timer = RentalTimer::start(
            "r1".to_string(),
            ends_at,
            Duration::from_millis(5),
            tx,
        );

        let expiration = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("expiration signal")
            .expect("sender alive");
        assert_eq!(expiration.rental_id, "r1");

        // task ended after the single signal; nothing else arrives
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_cancels_before_expiration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ends_at = Utc::now() + ChronoDuration::seconds(3600);
        let mut timer = RentalTimer::start(
            "r2".to_string(),
            ends_at,
            Duration::from_millis(5),
            tx,
        );
        assert!(timer.remaining_seconds() > 0);
        timer.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
