use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
}

/// Streak figures shown on the streak widget.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakStats {
    pub total_contributions: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub longest_streak_end: Option<NaiveDate>,
}

impl StreakStats {
    /// Days after `today` are ignored. A day with no contributions yet does
    /// not break the current streak while it is still `today`.
    pub fn from_days(days: &[ContributionDay], today: NaiveDate) -> Self {
        let mut days: Vec<ContributionDay> =
            days.iter().copied().filter(|d| d.date <= today).collect();
        days.sort_by_key(|d| d.date);
        days.dedup_by_key(|d| d.date);

        let mut stats = StreakStats {
            total_contributions: days.iter().map(|d| d.count).sum(),
            ..StreakStats::default()
        };

        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;
        for day in &days {
            let consecutive = previous.is_some_and(|p| p + Duration::days(1) == day.date);
            if day.count == 0 {
                run = 0;
            } else {
                run = if consecutive { run + 1 } else { 1 };
                if run > stats.longest_streak {
                    stats.longest_streak = run;
                    stats.longest_streak_end = Some(day.date);
                }
            }
            previous = Some(day.date);
        }

        let mut expected = today;
        for day in days.iter().rev() {
            if day.date != expected {
                break;
            }
            if day.count == 0 {
                if day.date == today {
                    expected = today - Duration::days(1);
                    continue;
                }
                break;
            }
            stats.current_streak += 1;
            expected = day.date - Duration::days(1);
        }

        stats
    }
}
