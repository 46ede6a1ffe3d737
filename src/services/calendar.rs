// src/services/calendar.rs
use chrono::{Datelike, NaiveDate};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

const MONTH_ABBREVS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const QUARTER_LABELS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];

/// Calendar slot a date falls into. `month` and `quarter` are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub year: i32,
    pub month: usize,
    pub quarter: usize,
}

/// First and last calendar day of a 1-based month, or `None` for a month outside 1..=12.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

pub fn bucket_of(date: NaiveDate) -> Bucket {
    let month = date.month0() as usize;
    Bucket {
        year: date.year(),
        month,
        quarter: month / 3,
    }
}

/// The trailing three-year window ending with the (possibly incomplete) current year.
pub fn analysis_years(today: NaiveDate) -> [i32; 3] {
    let year = today.year();
    [year - 2, year - 1, year]
}

/// Full English name of a 1-based month.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month.clamp(1, 12) - 1) as usize]
}

/// Three-letter label of a zero-based month.
pub fn month_abbrev(month0: usize) -> &'static str {
    MONTH_ABBREVS[month0.min(11)]
}

pub fn quarter_label(quarter0: usize) -> &'static str {
    QUARTER_LABELS[quarter0.min(3)]
}
