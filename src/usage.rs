//! Free-tier usage quota, counted per identity per UTC day.
//!
//! A free conversion reserves its use before any work starts, so concurrent
//! requests cannot push a count past the limit. A conversion that fails gives
//! its use back.

use chrono::{DateTime, Days, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_DAILY_LIMIT: u32 = 5;

/// Counter storage keyed by identity and day. Both increments drop counts for
/// days before the one written.
pub trait UsageStore: Send + Sync {
    fn count(&self, identity: &str, day: NaiveDate) -> Result<u32>;

    /// Add one use and return the new count. Must be atomic per key.
    fn increment(&self, identity: &str, day: NaiveDate) -> Result<u32>;

    /// Add one use only while the count is below `limit`. Returns the new
    /// count, or `None` when the limit is already reached. Must be atomic
    /// per key.
    fn try_increment(&self, identity: &str, day: NaiveDate, limit: u32) -> Result<Option<u32>>;

    /// Take back one use. Never goes below zero.
    fn release(&self, identity: &str, day: NaiveDate) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryUsageStore {
    counts: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for MemoryUsageStore {
    fn count(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        let counts = self.counts.lock();
        Ok(counts
            .get(&(identity.to_string(), day))
            .copied()
            .unwrap_or(0))
    }

    fn increment(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        let mut counts = self.counts.lock();
        counts.retain(|(_, d), _| *d >= day);
        let count = counts.entry((identity.to_string(), day)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn try_increment(&self, identity: &str, day: NaiveDate, limit: u32) -> Result<Option<u32>> {
        let mut counts = self.counts.lock();
        counts.retain(|(_, d), _| *d >= day);
        let count = counts.entry((identity.to_string(), day)).or_insert(0);
        if *count >= limit {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }

    fn release(&self, identity: &str, day: NaiveDate) -> Result<()> {
        if let Some(count) = self.counts.lock().get_mut(&(identity.to_string(), day)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Remaining {
    /// Serializes as `null`
    Unlimited,
    Limited(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub used: u32,
    pub limit: u32,
    pub resets_at: DateTime<Utc>,
}

/// One admitted conversion. Free-tier uses are already counted; entitled
/// ones are counted on [`UsageLimiter::commit`].
#[derive(Debug)]
pub struct Reservation {
    key: String,
    day: NaiveDate,
    counted: bool,
    pub remaining: Remaining,
}

#[derive(Clone)]
pub struct UsageLimiter {
    store: Arc<dyn UsageStore>,
    daily_limit: u32,
}

impl UsageLimiter {
    pub fn new(store: Arc<dyn UsageStore>, daily_limit: u32) -> Self {
        UsageLimiter { store, daily_limit }
    }

    pub fn remaining(&self, identity: &str, entitled: bool) -> Result<Remaining> {
        self.remaining_at(identity, entitled, Utc::now())
    }

    pub fn remaining_at(&self, identity: &str, entitled: bool, now: DateTime<Utc>) -> Result<Remaining> {
        if entitled {
            return Ok(Remaining::Unlimited);
        }
        let used = self.store.count(usage_key(identity), now.date_naive())?;
        Ok(Remaining::Limited(self.daily_limit.saturating_sub(used)))
    }

    /// Admit one conversion, or `None` when today's free uses are gone.
    pub fn reserve(&self, identity: &str, entitled: bool) -> Result<Option<Reservation>> {
        self.reserve_at(identity, entitled, Utc::now())
    }

    pub fn reserve_at(
        &self,
        identity: &str,
        entitled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>> {
        let key = usage_key(identity).to_string();
        let day = now.date_naive();

        if entitled {
            return Ok(Some(Reservation {
                key,
                day,
                counted: false,
                remaining: Remaining::Unlimited,
            }));
        }

        let Some(count) = self.store.try_increment(&key, day, self.daily_limit)? else {
            return Ok(None);
        };
        debug!(identity = %key, count, "Usage reserved");
        Ok(Some(Reservation {
            key,
            day,
            counted: true,
            remaining: Remaining::Limited(self.daily_limit.saturating_sub(count)),
        }))
    }

    /// The conversion succeeded. Entitled uses are counted here for stats.
    pub fn commit(&self, reservation: &Reservation) -> Result<()> {
        if !reservation.counted {
            let count = self.store.increment(&reservation.key, reservation.day)?;
            debug!(identity = %reservation.key, count, "Usage recorded");
        }
        Ok(())
    }

    /// The conversion failed; give back the reserved use.
    pub fn release(&self, reservation: Reservation) -> Result<()> {
        if reservation.counted {
            self.store.release(&reservation.key, reservation.day)?;
            debug!(identity = %reservation.key, "Usage released");
        }
        Ok(())
    }

    pub fn stats(&self, identity: &str) -> Result<UsageStats> {
        self.stats_at(identity, Utc::now())
    }

    pub fn stats_at(&self, identity: &str, now: DateTime<Utc>) -> Result<UsageStats> {
        let today = now.date_naive();
        Ok(UsageStats {
            used: self.store.count(usage_key(identity), today)?,
            limit: self.daily_limit,
            resets_at: next_midnight(today),
        })
    }
}

fn usage_key(identity: &str) -> &str {
    if identity.is_empty() {
        "anonymous"
    } else {
        identity
    }
}

fn next_midnight(today: NaiveDate) -> DateTime<Utc> {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
}
