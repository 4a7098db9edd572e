//! Calendar features derived from a row's own timestamp.
//!
//! Day-of-week follows the ISO ordering: 0 = Monday through 6 = Sunday, so the weekend
//! is `{5, 6}`.

use chrono::{DateTime, Datelike, Timelike};

pub const SATURDAY: i32 = 5;
pub const SUNDAY: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    /// Hour of day, 0-23.
    pub hour: i32,
    /// 0 = Monday ... 6 = Sunday.
    pub day_of_week: i32,
    pub is_weekend: bool,
}

impl CalendarFeatures {
    /// Derives calendar features from epoch milliseconds interpreted as UTC-naive.
    /// Returns `None` only for timestamps outside chrono's representable range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        let datetime = DateTime::from_timestamp_millis(millis)?.naive_utc();
        let day_of_week = datetime.weekday().num_days_from_monday() as i32;
        Some(Self {
            hour: datetime.hour() as i32,
            day_of_week,
            is_weekend: day_of_week == SATURDAY || day_of_week == SUNDAY,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn millis(y: i32, m: u32, d: u32, h: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_weekday_convention() {
        // 2024-01-01 was a Monday.
        let monday = CalendarFeatures::from_millis(millis(2024, 1, 1, 7)).unwrap();
        assert_eq!(monday.day_of_week, 0);
        assert_eq!(monday.hour, 7);
        assert!(!monday.is_weekend);

        let saturday = CalendarFeatures::from_millis(millis(2024, 1, 6, 0)).unwrap();
        assert_eq!(saturday.day_of_week, SATURDAY);
        assert!(saturday.is_weekend);

        let sunday = CalendarFeatures::from_millis(millis(2024, 1, 7, 23)).unwrap();
        assert_eq!(sunday.day_of_week, SUNDAY);
        assert_eq!(sunday.hour, 23);
        assert!(sunday.is_weekend);
    }

    #[test]
    fn test_weekend_iff_saturday_or_sunday() {
        for day in 1..=14 {
            let features = CalendarFeatures::from_millis(millis(2024, 3, day, 12)).unwrap();
            assert_eq!(
                features.is_weekend,
                features.day_of_week == SATURDAY || features.day_of_week == SUNDAY
            );
        }
    }
}
