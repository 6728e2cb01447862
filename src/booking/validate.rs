//! Field validation: sentinel detection, city cross-check, missing fields.

use chrono::NaiveDate;
use tracing::warn;

use super::MissingField;
use crate::config::BookingConfig;

/// Values that mean "not provided" even though they are strings.
///
/// Compared after trimming and lowercasing. The last two are what models
/// tend to write into the city fields when the query has no city.
pub const MISSING_SENTINELS: [&str; 5] = [
    "",
    "none",
    "not provided",
    "departure city (not provided)",
    "arrival city (not provided)",
];

/// Whether an extracted value counts as absent.
pub fn is_missing(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let normalized = v.trim().to_lowercase();
            MISSING_SENTINELS.contains(&normalized.as_str())
        }
    }
}

/// Drop an extracted city unless `keyword` occurs in the query.
///
/// Models invent cities that are not in the text; a departure city is only
/// trusted when the query says "from" somewhere, an arrival city when it
/// says "to". Matching is a case-insensitive substring test.
pub fn cross_check_city(city: Option<String>, query: &str, keyword: &str) -> Option<String> {
    let city = city?;
    if query.to_lowercase().contains(&keyword.to_lowercase()) {
        Some(city)
    } else {
        None
    }
}

/// Required fields still missing, always in `from`, `to`, `depdate` order.
///
/// `depdate` is missing when its raw phrase is missing or did not normalise.
pub fn missing_fields(
    from: Option<&str>,
    to: Option<&str>,
    depdate_raw: Option<&str>,
    depdate: Option<NaiveDate>,
) -> Vec<MissingField> {
    MissingField::ALL
        .into_iter()
        .filter(|field| match field {
            MissingField::From => is_missing(from),
            MissingField::To => is_missing(to),
            MissingField::DepDate => is_missing(depdate_raw) || depdate.is_none(),
        })
        .collect()
}

/// Map the model's cabin to a configured class.
///
/// `business_class`, `Premium-Economy` and similar spellings match after
/// lowercasing and treating `_`/`-` as spaces. Sentinels fall back to the
/// default silently, unknown classes with a warning.
pub fn resolve_cabin(raw: &str, booking: &BookingConfig) -> String {
    if is_missing(Some(raw)) {
        return booking.default_cabin.to_lowercase();
    }
    let normalized = raw
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let stripped = normalized
        .strip_suffix(" class")
        .unwrap_or(&normalized)
        .to_owned();

    if let Some(known) = booking
        .cabin_classes
        .iter()
        .find(|c| c.eq_ignore_ascii_case(&stripped))
    {
        return known.to_lowercase();
    }

    warn!(cabin = %raw, fallback = %booking.default_cabin, "unknown cabin class, using default");
    booking.default_cabin.to_lowercase()
}

/// Usable text or `None` when the value is a sentinel.
pub fn provided(value: Option<String>) -> Option<String> {
    if is_missing(value.as_deref()) {
        None
    } else {
        value
    }
}
