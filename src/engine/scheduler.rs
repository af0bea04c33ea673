//! Wall-clock-aligned tick scheduling (§4.3): the scheduler aims at
//! boundaries like :00/:15/:30/:45 rather than counting forward from the
//! previous tick, so collection windows stay aligned with external
//! reporting instead of drifting. Grounded on the teacher's
//! `export::scheduler::CronScheduler` shutdown/select pattern.

use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::mpsc;

use crate::domain::{CoreError, Result};

/// Builds a six-field cron expression (seconds-minutes-hours-dom-month-dow)
/// that fires on every whole multiple of `interval_secs` within the hour,
/// provided it divides evenly into 3600 seconds. Intervals that don't
/// divide evenly fall back to once-per-minute, the finest grain the core
/// needs, and a warning is logged since the configured cadence can't be
/// hit exactly on wall-clock boundaries.
fn cron_expression_for(interval_secs: u64) -> String {
    if interval_secs >= 60 && interval_secs % 60 == 0 && 60 % (interval_secs / 60) == 0 {
        format!("0 0/{} * * * *", interval_secs / 60)
    } else if interval_secs > 0 && interval_secs < 60 && 60 % interval_secs == 0 {
        format!("0/{} * * * * *", interval_secs)
    } else {
        tracing::warn!(
            interval_secs,
            "tick_interval_secs does not divide evenly into wall-clock boundaries; falling back to once a minute"
        );
        "0 * * * * *".to_string()
    }
}

pub struct TickScheduler {
    schedule: Schedule,
    timezone: Tz,
}

impl TickScheduler {
    pub fn new(interval_secs: u64, timezone_name: &str) -> Result<Self> {
        let expression = cron_expression_for(interval_secs);
        let schedule = Schedule::from_str(&expression)
            .map_err(|e| CoreError::config(format!("invalid tick cron expression {expression:?}: {e}")))?;
        let timezone =
            Tz::from_str(timezone_name).map_err(|e| CoreError::config(format!("invalid timezone {timezone_name:?}: {e}")))?;
        Ok(Self { schedule, timezone })
    }

    /// Next scheduled boundary strictly after `after`, in UTC.
    pub fn next_tick_at(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_after = after.with_timezone(&self.timezone);
        self.schedule.after(&local_after).next().map(|dt| dt.with_timezone(&Utc))
    }

    /// Runs `on_tick` at every scheduled boundary until `shutdown` fires.
    /// Each call blocks until its tick body completes before sleeping for
    /// the next boundary — ticks never overlap (§4.3).
    pub async fn run<F, Fut>(&self, mut shutdown: mpsc::Receiver<()>, mut on_tick: F)
    where
        F: FnMut(DateTime<Utc>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            let now = Utc::now();
            let Some(next) = self.next_tick_at(now) else {
                tracing::error!("tick scheduler has no upcoming boundaries; stopping");
                break;
            };
            let sleep_for = (next - now).to_std().unwrap_or(StdDuration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    on_tick(next).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("tick scheduler received shutdown signal");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_minute_interval_builds_a_quarter_hour_expression() {
        assert_eq!(cron_expression_for(900), "0 0/15 * * * *");
    }

    #[test]
    fn non_dividing_interval_falls_back_to_once_a_minute() {
        assert_eq!(cron_expression_for(700), "0 * * * * *");
    }

    #[test]
    fn scheduler_finds_a_boundary_after_now() {
        let scheduler = TickScheduler::new(900, "UTC").unwrap();
        let next = scheduler.next_tick_at(Utc::now());
        assert!(next.is_some());
        assert!(next.unwrap() > Utc::now());
    }
}
