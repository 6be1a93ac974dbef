//! Monthly metering of cloud streaming time.
//!
//! The cloud backend's free tier covers 60 minutes of recognition per
//! calendar month. The meter accumulates session seconds, rolls the counter
//! over on a month change, and logs a warning when the quota is close.

use std::sync::Mutex;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Store, CLOUD_USAGE_KEY};

/// Free tier allowance per month, in seconds.
pub const FREE_TIER_SECONDS: f64 = 3600.0;

/// Log a warning when monthly usage crosses this (55 minutes).
const WARN_THRESHOLD_SECONDS: f64 = 3300.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageRecord {
    /// Calendar month the counter belongs to, as "YYYY-MM".
    pub month: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub used_seconds: f64,
    pub used_minutes: f64,
    pub remaining_minutes: f64,
    pub within_free_tier: bool,
}

/// Tracks and persists monthly streaming usage.
#[derive(Debug)]
pub struct UsageMeter {
    store: Store,
    record: UsageRecord,
}

impl UsageMeter {
    pub fn load(store: Store) -> Self {
        let mut record: UsageRecord = store.load_or_default(CLOUD_USAGE_KEY);
        let month = current_month();
        if record.month != month {
            record = UsageRecord {
                month,
                seconds: 0.0,
            };
        }
        Self { store, record }
    }

    /// Add a finished session's duration to this month's counter.
    pub fn add_session(&mut self, seconds: f64) {
        let month = current_month();
        if self.record.month != month {
            log::info!("usage: new month, resetting cloud usage counter");
            self.record = UsageRecord {
                month,
                seconds: 0.0,
            };
        }

        self.record.seconds += seconds.max(0.0);

        if self.record.seconds > WARN_THRESHOLD_SECONDS {
            log::warn!(
                "usage: approaching the monthly free tier ({:.1} of {:.0} minutes used)",
                self.record.seconds / 60.0,
                FREE_TIER_SECONDS / 60.0
            );
        }

        if let Err(e) = self.store.save(CLOUD_USAGE_KEY, &self.record) {
            log::warn!("usage: failed to persist: {}", e);
        }
    }

    pub fn summary(&self) -> UsageSummary {
        let used = self.record.seconds;
        UsageSummary {
            used_seconds: used,
            used_minutes: used / 60.0,
            remaining_minutes: ((FREE_TIER_SECONDS - used) / 60.0).max(0.0),
            within_free_tier: used < FREE_TIER_SECONDS,
        }
    }

    pub fn record(&self) -> &UsageRecord {
        &self.record
    }
}

/// Convenience for sharing a meter with the cloud source task.
pub fn shared(store: Store) -> std::sync::Arc<Mutex<UsageMeter>> {
    std::sync::Arc::new(Mutex::new(UsageMeter::load(store)))
}

fn current_month() -> String {
    let now = Utc::now();
    format!("{:04}-{:02}", now.year(), now.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_meter() -> (tempfile::TempDir, UsageMeter) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let meter = UsageMeter::load(store);
        (dir, meter)
    }

    #[test]
    fn sessions_accumulate_within_a_month() {
        let (_guard, mut meter) = temp_meter();
        meter.add_session(90.0);
        meter.add_session(30.0);

        let summary = meter.summary();
        assert_eq!(summary.used_seconds, 120.0);
        assert_eq!(summary.used_minutes, 2.0);
        assert!(summary.within_free_tier);
    }

    #[test]
    fn usage_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());

        let mut meter = UsageMeter::load(store.clone());
        meter.add_session(60.0);
        drop(meter);

        let meter = UsageMeter::load(store);
        assert_eq!(meter.summary().used_seconds, 60.0);
    }

    #[test]
    fn a_stale_month_resets_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        store
            .save(
                CLOUD_USAGE_KEY,
                &UsageRecord {
                    month: "2000-01".to_string(),
                    seconds: 3000.0,
                },
            )
            .unwrap();

        let meter = UsageMeter::load(store);
        assert_eq!(meter.summary().used_seconds, 0.0);
    }

    #[test]
    fn remaining_minutes_never_go_negative() {
        let (_guard, mut meter) = temp_meter();
        meter.add_session(4000.0);

        let summary = meter.summary();
        assert!(!summary.within_free_tier);
        assert_eq!(summary.remaining_minutes, 0.0);
    }

    #[test]
    fn negative_durations_are_ignored() {
        let (_guard, mut meter) = temp_meter();
        meter.add_session(-5.0);
        assert_eq!(meter.summary().used_seconds, 0.0);
    }
}
