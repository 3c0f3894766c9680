//! Dashboard statistics
//!
//! Pure functions of a snapshot (and, for date-based scores, an "as of"
//! date). Orderings are deterministic: every sort is stable over load order.

use chrono::{Months, NaiveDate};
use clubcard_common::dates::{months_between, parse_date};
use serde::Serialize;
use std::collections::HashMap;

use crate::card::capitalize_words;
use crate::record::{MemberRecord, COLOR_KEY, LOCATION_KEY, NAME_KEY, TIMESTAMP_KEY};
use crate::store::Snapshot;

/// Bucket for records without a location
pub const UNKNOWN_STATE: &str = "Unknown";
pub const DEFAULT_TOP_LIMIT: usize = 5;
/// Window for counting new members
pub const NEW_MEMBER_MONTHS: u32 = 3;
/// One tenure star per this many months
const MONTHS_PER_STAR: i32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCount {
    pub state: String,
    pub count: usize,
}

/// Members per state, most populous first
///
/// An empty or absent location counts as "Unknown"; a whitespace-only
/// location is dropped. Ties keep first-seen order.
pub fn state_counts(snapshot: &Snapshot) -> Vec<StateCount> {
    let mut counts: Vec<StateCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in snapshot.records() {
        let state = match record.field(LOCATION_KEY) {
            "" => UNKNOWN_STATE,
            other => other,
        };
        if state.trim().is_empty() {
            continue;
        }

        match index.get(state) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(state, counts.len());
                counts.push(StateCount {
                    state: state.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Star rating: a full star per two units, a half star for the remainder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarScore {
    pub full_stars: usize,
    pub half_star: bool,
}

impl StarScore {
    pub fn for_mod_count(mod_count: usize) -> Self {
        Self {
            full_stars: mod_count / 2,
            half_star: mod_count % 2 == 1,
        }
    }
}

/// Ranked entry in the top-modifier table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifierEntry {
    pub plate: String,
    pub name: String,
    pub source_row: usize,
    pub mod_count: usize,
    pub score: StarScore,
}

/// Most-modified members, descending by filled slot count
///
/// Members with no modifications are excluded. Ties keep load order.
pub fn top_modifiers(snapshot: &Snapshot, limit: usize) -> Vec<ModifierEntry> {
    let mut ranked: Vec<(&MemberRecord, usize)> = snapshot
        .records()
        .iter()
        .map(|record| (record, record.mod_count()))
        .filter(|&(_, count)| count > 0)
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(record, mod_count)| ModifierEntry {
            plate: record.plate().to_string(),
            name: record.field(NAME_KEY).to_string(),
            source_row: record.source_row,
            mod_count,
            score: StarScore::for_mod_count(mod_count),
        })
        .collect()
}

/// Membership tenure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenureScore {
    /// Calendar months since joining (day-of-month ignored)
    pub months: i32,
    pub stars: u32,
    pub label: Option<String>,
}

impl TenureScore {
    fn none() -> Self {
        Self {
            months: 0,
            stars: 0,
            label: None,
        }
    }
}

/// Tenure for a membership start value as of a given date
///
/// An unparsable start scores zero with no label.
pub fn tenure_from_value(member_since: &str, as_of: NaiveDate) -> TenureScore {
    let Some(start) = parse_date(member_since) else {
        return TenureScore::none();
    };

    let months = months_between(start, as_of);
    let stars = (months / MONTHS_PER_STAR).max(0) as u32;
    let years = stars / 2;

    let label = if years > 0 {
        Some(format!(
            "{} year{} of membership",
            years,
            if years > 1 { "s" } else { "" }
        ))
    } else if stars > 0 {
        Some(format!("{} months of membership", stars * MONTHS_PER_STAR as u32))
    } else {
        None
    };

    TenureScore {
        months,
        stars,
        label,
    }
}

pub fn tenure_score(record: &MemberRecord, as_of: NaiveDate) -> TenureScore {
    tenure_from_value(record.field(TIMESTAMP_KEY), as_of)
}

/// Metrics behind the local insights sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightMetrics {
    pub total_members: usize,
    pub new_members: usize,
    pub top_state: Option<String>,
    pub top_state_count: usize,
    pub popular_new_color: Option<String>,
    pub modified_members: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightsSummary {
    pub insights: String,
    pub metrics: InsightMetrics,
}

/// Local insights, used when no remote insights source answers
pub fn insights_summary(snapshot: &Snapshot, today: NaiveDate) -> InsightsSummary {
    let cutoff = today
        .checked_sub_months(Months::new(NEW_MEMBER_MONTHS))
        .unwrap_or(NaiveDate::MIN);

    let new_members: Vec<&MemberRecord> = snapshot
        .records()
        .iter()
        .filter(|record| {
            parse_date(record.field(TIMESTAMP_KEY)).is_some_and(|start| start >= cutoff)
        })
        .collect();

    let top = state_counts(snapshot).into_iter().next();
    let popular_new_color = most_common_color(&new_members);
    let modified_members = snapshot
        .records()
        .iter()
        .filter(|record| record.mod_count() > 0)
        .count();

    let metrics = InsightMetrics {
        total_members: snapshot.len(),
        new_members: new_members.len(),
        top_state_count: top.as_ref().map_or(0, |t| t.count),
        top_state: top.map(|t| t.state),
        popular_new_color,
        modified_members,
    };

    InsightsSummary {
        insights: render_insights(&metrics),
        metrics,
    }
}

/// Most frequent colour (case-insensitive), first seen wins ties
fn most_common_color(records: &[&MemberRecord]) -> Option<String> {
    let mut tally: Vec<(String, usize)> = Vec::new();

    for record in records {
        let color = record.field(COLOR_KEY).trim().to_lowercase();
        if color.is_empty() {
            continue;
        }
        match tally.iter_mut().find(|(c, _)| *c == color) {
            Some((_, n)) => *n += 1,
            None => tally.push((color, 1)),
        }
    }

    // max_by_key returns the last maximum; reverse so the first seen wins
    tally
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(color, _)| capitalize_words(&color))
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

fn render_insights(metrics: &InsightMetrics) -> String {
    let mut sentences = vec![format!(
        "{} joined in the last {} months.",
        plural(metrics.new_members, "new member", "new members"),
        NEW_MEMBER_MONTHS
    )];

    match &metrics.top_state {
        Some(state) => sentences.push(format!(
            "{} leads with {}.",
            state,
            plural(metrics.top_state_count, "member", "members")
        )),
        None => sentences.push("No member locations recorded yet.".to_string()),
    }

    if let Some(color) = &metrics.popular_new_color {
        sentences.push(format!(
            "The most popular colour among new members is {}.",
            color
        ));
    }

    sentences.push(format!(
        "{} at least one modification.",
        plural(metrics.modified_members, "member has", "members have")
    ));

    sentences.join(" ")
}
