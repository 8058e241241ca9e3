//! Booking expiry sweeper
//!
//! Marketplace postings and unanswered requests have a validity window.
//! The sweeper runs a full pass daily at a configured Europe/Warsaw
//! wall-clock time (03:00 by default, well outside peak hours) and a
//! catch-up pass every hour, moving overdue non-terminal bookings to
//! EXPIRED through the same compare-and-swap path as every other
//! transition.

use crate::state::AppState;
use chrono::{NaiveTime, Timelike, Utc};
use chrono_tz::Europe::Warsaw;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

const HOURLY_TICK: Duration = Duration::from_secs(3600);

/// Expiry sweeper; `start` consumes it and yields the running handle
pub struct ExpirySweeper {
    state: Arc<AppState>,
}

/// Owned handle to a running sweeper; stop it or drop it to end the task
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl ExpirySweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Seconds until the next daily sweep in Warsaw local time
    pub fn duration_until_daily(hour: u32, minute: u32) -> Duration {
        let now = Utc::now().with_timezone(&Warsaw).time();
        let target = NaiveTime::from_hms_opt(hour, minute, 0)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(3, 0, 0).unwrap());

        let secs = if now < target {
            (target - now).num_seconds() as u64
        } else {
            let until_midnight = (24 * 3600) - now.num_seconds_from_midnight() as u64;
            until_midnight + target.num_seconds_from_midnight() as u64
        };
        Duration::from_secs(secs)
    }

    /// Start the sweeper task
    pub fn start(self) -> SweeperHandle {
        let (tx, mut rx) = oneshot::channel();
        let state = self.state;

        tokio::spawn(async move {
            info!("Expiry sweeper started");
            // Catch up on anything that became due while the server was down.
            Self::sweep(&state);

            let mut hourly = tokio::time::interval(HOURLY_TICK);
            hourly.tick().await; // first tick fires immediately

            loop {
                let (hour, minute) = match state.sqlite.get_settings() {
                    Ok(s) => (s.expiry_sweep_hour, s.expiry_sweep_minute),
                    Err(_) => (3, 0),
                };
                let daily = tokio::time::sleep(Self::duration_until_daily(hour, minute));

                tokio::select! {
                    _ = daily => Self::sweep(&state),
                    _ = hourly.tick() => Self::sweep(&state),
                    _ = &mut rx => {
                        info!("Expiry sweeper stopped");
                        break;
                    }
                }
            }
        });

        SweeperHandle { shutdown: Some(tx) }
    }

    /// One expiry pass
    fn sweep(state: &AppState) {
        match state.sqlite.expire_due_bookings() {
            Ok(expired) if expired.is_empty() => {}
            Ok(expired) => {
                info!("Expired {} overdue bookings", expired.len());
                for id in &expired {
                    state.publish_change("bookings", id, "updated");
                }
            }
            Err(e) => warn!("Expiry sweep failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_until_daily_is_within_a_day() {
        let duration = ExpirySweeper::duration_until_daily(3, 0);
        assert!(duration.as_secs() <= 24 * 3600);
    }

    #[test]
    fn test_invalid_wall_clock_falls_back() {
        // Out-of-range hour must not panic.
        let duration = ExpirySweeper::duration_until_daily(99, 99);
        assert!(duration.as_secs() <= 24 * 3600);
    }
}
