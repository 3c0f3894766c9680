//! Clock utilities

use chrono::{DateTime, Local, NaiveDate};

/// Get current local timestamp
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Today's local calendar date (the "as of" date for tenure and insights)
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}
