use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Normalize a stored date string to its calendar day. Records carry full
/// timestamps, so matching is always on this key, never on the raw string.
pub fn day_key(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Some(dt.date_naive());
    }
    // yyyy-MM-ddTHH:MM:SS without an offset.
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sunday" => Some(Self::Sunday),
            "monday" => Some(Self::Monday),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
        }
    }

    fn weekday(self) -> Weekday {
        match self {
            Self::Sunday => Weekday::Sun,
            Self::Monday => Weekday::Mon,
        }
    }
}

fn start_of_week(date: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let offset = date
        .weekday()
        .days_since(week_start.weekday()) as i64;
    date - Duration::days(offset)
}

pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first - Duration::days(1)))
}

/// Week rows covering the displayed month: the row containing the 1st through
/// the row containing the last day, padded with adjacent-month days so every
/// row is a full week. Restartable: call again for a fresh iterator.
pub fn month_weeks(
    year: i32,
    month: u32,
    week_start: WeekStart,
) -> Option<impl Iterator<Item = [NaiveDate; 7]>> {
    let (first, last) = month_bounds(year, month)?;
    let grid_start = start_of_week(first, week_start);
    let grid_last = start_of_week(last, week_start) + Duration::days(6);
    let weeks = ((grid_last - grid_start).num_days() + 1) / 7;
    Some((0..weeks).map(move |w| {
        let row_start = grid_start + Duration::days(w * 7);
        std::array::from_fn(|i| row_start + Duration::days(i as i64))
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    High,
    Medium,
    Low,
    Neutral,
}

impl Band {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Neutral => "neutral",
        }
    }
}

/// Day-cell color banding: >=90% present is high, 70-89% medium, below low;
/// a day with no records stays neutral.
pub fn presence_band(present: usize, total: usize) -> Band {
    if total == 0 {
        return Band::Neutral;
    }
    let rate = present as f64 / total as f64;
    if rate >= 0.9 {
        Band::High
    } else if rate >= 0.7 {
        Band::Medium
    } else {
        Band::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_key_accepts_bare_dates_and_timestamps() {
        let d = NaiveDate::from_ymd_opt(2025, 9, 2).expect("date");
        assert_eq!(day_key("2025-09-02"), Some(d));
        assert_eq!(day_key("2025-09-02T14:30:00Z"), Some(d));
        assert_eq!(day_key("2025-09-02T14:30:00-05:00"), Some(d));
        assert_eq!(day_key("2025-09-02T23:59:59"), Some(d));
        assert_eq!(day_key("tomorrow"), None);
    }

    #[test]
    fn month_weeks_covers_whole_month_in_full_weeks() {
        for (year, month) in [(2025, 2), (2025, 9), (2024, 2), (2025, 12)] {
            let cells: Vec<NaiveDate> = month_weeks(year, month, WeekStart::Sunday)
                .expect("grid")
                .flatten()
                .collect();
            assert_eq!(cells.len() % 7, 0, "{}-{} not whole weeks", year, month);
            let (first, last) = month_bounds(year, month).expect("bounds");
            assert!(cells.contains(&first));
            assert!(cells.contains(&last));
            // Consecutive days, no gaps.
            for pair in cells.windows(2) {
                assert_eq!(pair[1] - pair[0], Duration::days(1));
            }
        }
    }

    #[test]
    fn month_weeks_respects_week_start() {
        // September 1, 2025 is a Monday.
        let first_row = month_weeks(2025, 9, WeekStart::Monday)
            .expect("grid")
            .next()
            .expect("row");
        assert_eq!(first_row[0], NaiveDate::from_ymd_opt(2025, 9, 1).expect("date"));

        let first_row = month_weeks(2025, 9, WeekStart::Sunday)
            .expect("grid")
            .next()
            .expect("row");
        assert_eq!(first_row[0], NaiveDate::from_ymd_opt(2025, 8, 31).expect("date"));
    }

    #[test]
    fn month_weeks_restarts_cleanly() {
        let count_a = month_weeks(2026, 1, WeekStart::Sunday).expect("grid").count();
        let count_b = month_weeks(2026, 1, WeekStart::Sunday).expect("grid").count();
        assert_eq!(count_a, count_b);
    }

    #[test]
    fn presence_band_thresholds() {
        assert_eq!(presence_band(0, 0), Band::Neutral);
        assert_eq!(presence_band(9, 10), Band::High);
        assert_eq!(presence_band(8, 10), Band::Medium);
        assert_eq!(presence_band(7, 10), Band::Medium);
        assert_eq!(presence_band(6, 10), Band::Low);
        assert_eq!(presence_band(10, 10), Band::High);
    }
}
