use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};

/// Bucket keys are rendered in this format in the heatmap document.
pub const BUCKET_KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of an aggregation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    Hourly,
    Daily,
    Weekly,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::Hourly, Resolution::Daily, Resolution::Weekly];

    pub fn name(self) -> &'static str {
        match self {
            Resolution::Hourly => "hourly",
            Resolution::Daily => "daily",
            Resolution::Weekly => "weekly",
        }
    }

    /// Start of the bucket containing `ts`.
    ///
    /// Hourly rounds to the nearest hour, with an exact half past going to
    /// the even hour. Daily truncates to midnight, weekly to midnight on the
    /// Monday of the ISO week.
    pub fn bucket_start(self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Resolution::Hourly => {
                let floor = ts.date().and_time(NaiveTime::MIN) + Duration::hours(ts.hour() as i64);
                let offset = ts - floor;
                let half = Duration::minutes(30);
                if offset > half || (offset == half && floor.hour() % 2 == 1) {
                    floor + Duration::hours(1)
                } else {
                    floor
                }
            }
            Resolution::Daily => ts.date().and_time(NaiveTime::MIN),
            Resolution::Weekly => {
                let days_from_monday = ts.weekday().num_days_from_monday() as i64;
                (ts.date() - Duration::days(days_from_monday)).and_time(NaiveTime::MIN)
            }
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
