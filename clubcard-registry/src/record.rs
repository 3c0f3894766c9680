//! Member record model
//!
//! A record is one data row of the member sheet: scalar columns keyed by
//! header name plus ten positional modification slots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plate column, the human-facing lookup key
pub const PLATE_KEY: &str = "License Plate";
/// Membership start date, stored in display form ("Apr 18, 25")
pub const TIMESTAMP_KEY: &str = "Timestamp";
pub const NAME_KEY: &str = "Name";
pub const LOCATION_KEY: &str = "Location";
pub const COLOR_KEY: &str = "Car Color";
pub const MODEL_KEY: &str = "Model";

/// Number of modification slots (columns "Mod1".."Mod10")
pub const MOD_SLOTS: usize = 10;

/// Physical row of the first data row: the header occupies row 1
pub const FIRST_DATA_ROW: usize = 2;

/// Fixed-size, positionally addressed modification slots
pub type Modifications = [String; MOD_SLOTS];

/// Column name for a zero-based modification slot
pub fn mod_key(slot: usize) -> String {
    format!("Mod{}", slot + 1)
}

/// Zero-based slot for a "ModN" column name, if it is one
pub fn mod_slot(key: &str) -> Option<usize> {
    let n: usize = key.strip_prefix("Mod")?.parse().ok()?;
    (1..=MOD_SLOTS).contains(&n).then(|| n - 1)
}

/// One member row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Scalar columns keyed by trimmed header name
    pub fields: BTreeMap<String, String>,
    /// Modification slots 1..10; blank means unset
    pub modifications: Modifications,
    /// Physical row in the backing sheet (write path only)
    pub source_row: usize,
}

impl MemberRecord {
    /// Field value, or "" when the column is absent
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn plate(&self) -> &str {
        self.field(PLATE_KEY)
    }

    /// Number of slots holding non-blank content
    pub fn mod_count(&self) -> usize {
        self.modifications
            .iter()
            .filter(|m| !m.trim().is_empty())
            .count()
    }

    /// Non-blank modifications in slot order
    pub fn filled_modifications(&self) -> impl Iterator<Item = &str> {
        self.modifications
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
    }
}
