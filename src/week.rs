use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

/// A playtime accrual period: one ISO week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekBucket {
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:02}", self.year, self.week)
    }
}

impl FromStr for WeekBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, week) = s.split_once('_').ok_or_else(|| format!("invalid week bucket '{}'", s))?;
        let year = year.parse::<i32>().map_err(|_| format!("invalid year in week bucket '{}'", s))?;
        let week = week.parse::<u32>().map_err(|_| format!("invalid week in week bucket '{}'", s))?;
        if !(1..=53).contains(&week) {
            return Err(format!("week out of range in week bucket '{}'", s));
        }
        Ok(Self { year, week })
    }
}

/// Maps wall-clock time onto week buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekClock;

impl WeekClock {
    pub fn current_bucket(&self, now: DateTime<Utc>) -> WeekBucket {
        let iso = now.iso_week();
        WeekBucket {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn has_changed(&self, stored: WeekBucket, now: DateTime<Utc>) -> bool {
        self.current_bucket(now) != stored
    }

    /// Monday 00:00 UTC of the week containing `now`.
    pub fn week_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_bucket_is_zero_padded() {
        let bucket = WeekClock.current_bucket(at("2024-02-14T12:00:00Z"));
        assert_eq!(bucket, WeekBucket { year: 2024, week: 7 });
        assert_eq!(bucket.to_string(), "2024_07");
    }

    #[test]
    fn test_iso_year_differs_from_calendar_year() {
        // Monday 2024-12-30 belongs to week 1 of 2025.
        assert_eq!(WeekClock.current_bucket(at("2024-12-30T08:00:00Z")).to_string(), "2025_01");
        // Sunday 2021-01-03 still belongs to week 53 of 2020.
        assert_eq!(WeekClock.current_bucket(at("2021-01-03T23:59:59Z")).to_string(), "2020_53");
    }

    #[test]
    fn test_has_changed_across_monday_midnight() {
        let clock = WeekClock;
        let sunday = at("2024-02-18T23:59:59Z");
        let stored = clock.current_bucket(sunday);

        assert!(!clock.has_changed(stored, sunday));
        assert!(clock.has_changed(stored, at("2024-02-19T00:00:00Z")));
    }

    #[test]
    fn test_week_start() {
        assert_eq!(WeekClock.week_start(at("2024-02-14T12:34:56Z")), at("2024-02-12T00:00:00Z"));
        assert_eq!(WeekClock.week_start(at("2024-02-12T00:00:00Z")), at("2024-02-12T00:00:00Z"));
    }

    #[test]
    fn test_parse_bucket() {
        assert_eq!("2024_07".parse::<WeekBucket>(), Ok(WeekBucket { year: 2024, week: 7 }));
        assert!("2024-07".parse::<WeekBucket>().is_err());
        assert!("2024_60".parse::<WeekBucket>().is_err());
    }
}
