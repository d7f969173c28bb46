use chrono::NaiveDate;
use dashmap::DashMap;
use log::debug;

use crate::config::UsageLimits;
use crate::error::UsageError;

/// Per-client daily generation counters.
pub struct UsageTracker {
    limits: UsageLimits,
    counts: DashMap<String, (NaiveDate, u32)>,
}

impl UsageTracker {
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            limits,
            counts: DashMap::new(),
        }
    }

    /// Counts one generation for `client` on `today` and returns how many are
    /// left. Refuses without counting once the limit is reached.
    pub fn check_and_increment(&self, client: &str, today: NaiveDate) -> Result<u32, UsageError> {
        let limit = self.limits.daily_generations;
        let mut entry = self.counts.entry(client.to_string()).or_insert((today, 0));
        let (day, used) = entry.value_mut();

        if *day != today {
            *day = today;
            *used = 0;
        }
        if *used >= limit {
            debug!("Client {client} hit the daily limit of {limit}");
            return Err(UsageError::LimitReached { limit });
        }

        *used += 1;
        Ok(limit - *used)
    }

    pub fn used_today(&self, client: &str, today: NaiveDate) -> u32 {
        self.counts
            .get(client)
            .filter(|entry| entry.value().0 == today)
            .map_or(0, |entry| entry.value().1)
    }

    /// Drops counters from earlier days.
    pub fn prune(&self, today: NaiveDate) {
        self.counts.retain(|_, (day, _)| *day == today);
    }
}
