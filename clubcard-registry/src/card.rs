//! Member card view model
//!
//! Display strings for the visual card. Rendering and image export happen
//! outside this crate; they only receive these values.

use chrono::NaiveDate;
use serde::Serialize;

use crate::record::{MemberRecord, COLOR_KEY, LOCATION_KEY, MODEL_KEY, NAME_KEY, TIMESTAMP_KEY};
use crate::stats::{tenure_from_value, TenureScore};

/// Placeholder for blank values
pub const NA: &str = "N/A";

/// Colour keywords mapped to car artwork, checked in order
const CAR_IMAGES: &[(&[&str], &str)] = &[
    (&["black"], "black"),
    (&["white"], "white"),
    (&["red"], "red"),
    (&["blue"], "blue"),
    (&["grey", "gray"], "gray"),
    (&["silver", "titanium"], "titanium"),
    (&["chrome"], "chrome"),
    (&["iridium"], "iridium"),
];
const DEFAULT_CAR_IMAGE: &str = "white";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayValue {
    pub text: String,
    pub is_na: bool,
}

impl DisplayValue {
    fn of(value: &str) -> Self {
        if value.trim().is_empty() {
            Self {
                text: NA.to_string(),
                is_na: true,
            }
        } else {
            Self {
                text: value.to_string(),
                is_na: false,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub member_since: DisplayValue,
    pub name: DisplayValue,
    pub plate: String,
    pub color: DisplayValue,
    pub state: DisplayValue,
    pub model: DisplayValue,
    /// Artwork path, `None` when no colour is recorded
    pub car_image: Option<String>,
    pub modifications: Vec<String>,
    pub tenure: TenureScore,
    pub verification: String,
    pub export_file_name: String,
}

/// Build the card for a resolved record as of `today`
pub fn card_for(record: &MemberRecord, today: NaiveDate) -> CardView {
    let plate = match record.plate() {
        "" => NA.to_string(),
        plate => plate.to_string(),
    };

    let mut color = DisplayValue::of(record.field(COLOR_KEY));
    if !color.is_na {
        color.text = capitalize_words(&color.text);
    }

    CardView {
        member_since: DisplayValue::of(record.field(TIMESTAMP_KEY)),
        name: DisplayValue::of(record.field(NAME_KEY)),
        color,
        state: DisplayValue::of(record.field(LOCATION_KEY)),
        model: DisplayValue::of(record.field(MODEL_KEY)),
        car_image: car_image_key(record.field(COLOR_KEY))
            .map(|key| format!("Images/{}.webp", key)),
        modifications: record.filled_modifications().map(str::to_string).collect(),
        tenure: tenure_from_value(record.field(TIMESTAMP_KEY), today),
        verification: verification_line(today),
        export_file_name: export_file_name(&plate),
        plate,
    }
}

/// Artwork key for a free-text colour
pub fn car_image_key(color: &str) -> Option<&'static str> {
    if color.trim().is_empty() {
        return None;
    }
    let color = color.to_lowercase();
    let key = CAR_IMAGES
        .iter()
        .find(|(words, _)| words.iter().any(|w| color.contains(w)))
        .map_or(DEFAULT_CAR_IMAGE, |&(_, key)| key);
    Some(key)
}

/// Uppercase the first letter of each space-separated word, lowercase the rest
pub fn capitalize_words(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn verification_line(today: NaiveDate) -> String {
    format!("Verified: {}", today.format("%-d %b %Y"))
}

/// PNG name for the exported card; whitespace runs become underscores
pub fn export_file_name(plate_text: &str) -> String {
    let mut slug = String::with_capacity(plate_text.len());
    let mut in_space = false;
    for c in plate_text.chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('_');
            }
            in_space = true;
        } else {
            slug.push(c);
            in_space = false;
        }
    }
    format!("Lexus_Club_Member_{}.png", slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PLATE_KEY;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_card_for_full_record() {
        let mut record = MemberRecord::default();
        record.set_field(TIMESTAMP_KEY, "Apr 18, 25");
        record.set_field(NAME_KEY, "Farid");
        record.set_field(PLATE_KEY, "WXY  1234");
        record.set_field(COLOR_KEY, "sonic TITANIUM");
        record.set_field(LOCATION_KEY, "Selangor");
        record.modifications[2] = "Lowered".to_string();

        let card = card_for(&record, today());

        assert_eq!(card.name.text, "Farid");
        assert!(!card.name.is_na);
        assert_eq!(card.color.text, "Sonic Titanium");
        assert_eq!(card.car_image.as_deref(), Some("Images/titanium.webp"));
        assert!(card.model.is_na);
        assert_eq!(card.model.text, NA);
        assert_eq!(card.modifications, vec!["Lowered"]);
        assert_eq!(card.tenure.stars, 3);
        assert_eq!(card.tenure.label.as_deref(), Some("1 year of membership"));
        assert_eq!(card.verification, "Verified: 16 Oct 2026");
        assert_eq!(card.export_file_name, "Lexus_Club_Member_WXY_1234.png");
    }

    #[test]
    fn test_card_for_blank_record() {
        let card = card_for(&MemberRecord::default(), today());

        assert_eq!(card.plate, NA);
        assert!(card.member_since.is_na);
        assert!(card.color.is_na);
        assert_eq!(card.color.text, NA);
        assert_eq!(card.car_image, None);
        assert_eq!(card.tenure.label, None);
        assert_eq!(card.export_file_name, "Lexus_Club_Member_N/A.png");
    }

    #[test]
    fn test_car_image_keys() {
        assert_eq!(car_image_key("Matte Black"), Some("black"));
        assert_eq!(car_image_key("Graphite Grey"), Some("gray"));
        assert_eq!(car_image_key("silver"), Some("titanium"));
        assert_eq!(car_image_key("Deep Blue"), Some("blue"));
        assert_eq!(car_image_key("Sunset Orange"), Some("white"));
        assert_eq!(car_image_key("  "), None);
    }

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize_words("pearl WHITE"), "Pearl White");
        assert_eq!(capitalize_words("red  metallic"), "Red  Metallic");
        assert_eq!(capitalize_words(""), "");
    }
}
