//! Membership date parsing and formatting
//!
//! The sheet stores membership start dates in a short display form
//! ("Apr 18, 25"). Editing works on calendar form ("2025-04-18").
//! Conversion failures never propagate: they yield `None` or an empty string.
//!
//! Two-digit years pivot at 50: "49" reads as 2049, "50" as 1950. The
//! display form only carries two digits, so a membership date outside
//! 1950..=2049 does not survive a display round trip.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};

/// Display form written to the sheet: short month, unpadded day, 2-digit year
pub const DISPLAY_FORMAT: &str = "%b %-d, %y";
/// Calendar form used while editing
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// First year a two-digit year maps back into the previous century
const TWO_DIGIT_PIVOT_YEAR: i32 = 2050;

/// Date-only layouts accepted when parsing, most specific first.
///
/// 2-digit year layouts come before 4-digit ones: `%Y` would happily read
/// "25" as year 25.
const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%b %d, %y",
    "%b %d, %Y",
    "%B %d, %y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%m/%d/%y",
    "%m/%d/%Y",
];

/// Timestamp layouts (form submissions carry a time component)
const DATETIME_LAYOUTS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a membership date in any supported layout
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use clubcard_common::dates::parse_date;
///
/// let expected = NaiveDate::from_ymd_opt(2025, 4, 18);
/// assert_eq!(parse_date("Apr 18, 25"), expected);
/// assert_eq!(parse_date("2025-04-18"), expected);
/// assert_eq!(parse_date("4/18/2025 10:22:33"), expected);
/// assert_eq!(parse_date("not a date"), None);
/// ```
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_LAYOUTS
        .iter()
        .find_map(|layout| {
            let date = NaiveDate::parse_from_str(value, layout).ok()?;
            Some(if layout.contains("%y") { pivot_century(date) } else { date })
        })
        .or_else(|| {
            DATETIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
                .map(|dt| dt.date())
        })
}

/// Move a two-digit-year date at or past the pivot back a century
///
/// chrono reads "00".."68" as 20xx; the sheet's dates read "50".."99" as 19xx.
fn pivot_century(date: NaiveDate) -> NaiveDate {
    if date.year() < TWO_DIGIT_PIVOT_YEAR {
        return date;
    }
    date.checked_sub_months(Months::new(1200)).unwrap_or(date)
}

pub fn format_display(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

/// Convert a stored display date to calendar form for editing
///
/// Unparsable or blank input yields an empty editable value.
pub fn display_to_iso(value: &str) -> String {
    parse_date(value).map(format_iso).unwrap_or_default()
}

/// Convert an edited calendar date back to display form
///
/// # Examples
///
/// ```
/// use clubcard_common::dates::iso_to_display;
///
/// assert_eq!(iso_to_display("2025-04-18"), "Apr 18, 25");
/// assert_eq!(iso_to_display("2025-04-08"), "Apr 8, 25");
/// assert_eq!(iso_to_display(""), "");
/// ```
pub fn iso_to_display(value: &str) -> String {
    parse_date(value).map(format_display).unwrap_or_default()
}

/// Whole calendar months from `start` to `as_of`, ignoring day-of-month
///
/// Negative when `start` lies in a later month than `as_of`.
pub fn months_between(start: NaiveDate, as_of: NaiveDate) -> i32 {
    (as_of.year() - start.year()) * 12 + (as_of.month() as i32 - start.month() as i32)
}
