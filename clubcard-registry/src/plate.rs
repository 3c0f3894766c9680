//! Plate matching
//!
//! Lookup is case- and whitespace-insensitive, nothing more.

use crate::record::MemberRecord;
use crate::store::Snapshot;

/// Uppercase and strip all whitespace
///
/// # Examples
/// ```
/// use clubcard_registry::plate::normalize;
///
/// assert_eq!(normalize(" wxy 1234 "), "WXY1234");
/// assert_eq!(normalize(&normalize("w x\ty")), "WXY");
/// ```
pub fn normalize(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// First record in snapshot order whose plate matches `query`
///
/// Records with a blank plate never match, and neither does a blank query.
pub fn find<'a>(snapshot: &'a Snapshot, query: &str) -> Option<&'a MemberRecord> {
    let wanted = normalize(query);
    if wanted.is_empty() {
        return None;
    }
    snapshot
        .records()
        .iter()
        .find(|record| normalize(record.plate()) == wanted)
}
