//! Free-text flight booking requests to structured payloads.
//!
//! The pipeline renders an extraction prompt ([`prompt`]), sends it to the
//! completer, pulls a JSON object out of whatever the model said
//! ([`extract`]), resolves natural-language dates ([`dates`]), checks the
//! required fields ([`validate`]) and finally assembles either a
//! [`BookingPayload`] or a clarification request ([`pipeline`]).

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod dates;
pub mod extract;
pub mod pipeline;
pub mod prompt;
pub mod validate;

pub use dates::{Clock, FixedClock, SystemClock};
pub use extract::ExtractError;
pub use pipeline::{BookingPipeline, PipelineError, PipelineSettings, PipelineStage};

/// Default adult count when the model gives none.
pub const DEFAULT_ADULTS: u32 = 1;
/// Default child count.
pub const DEFAULT_CHILDREN: u32 = 0;
/// Default infant count.
pub const DEFAULT_INFANTS: u32 = 0;
/// Cabin assumed when the `cabin` key is absent.
pub const DEFAULT_CABIN: &str = "economy";

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Fields the completer extracted from one query.
///
/// Text fields are kept raw (sentinels included); deciding whether a value
/// counts as provided is [`validate::is_missing`]'s job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Departure city.
    pub from: Option<String>,
    /// Arrival city.
    pub to: Option<String>,
    /// Departure date phrase, e.g. "after 5 days".
    pub depdate: Option<String>,
    /// Return date phrase.
    pub retdate: Option<String>,
    /// Adult passengers.
    pub adults: u32,
    /// Child passengers.
    pub children: u32,
    /// Infant passengers.
    pub infants: u32,
    /// Cabin class as the model wrote it.
    pub cabin: String,
    /// Preferred airline.
    pub airline_include: Option<String>,
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            depdate: None,
            retdate: None,
            adults: DEFAULT_ADULTS,
            children: DEFAULT_CHILDREN,
            infants: DEFAULT_INFANTS,
            cabin: DEFAULT_CABIN.to_owned(),
            airline_include: None,
        }
    }
}

impl ExtractionResult {
    /// Read the nine extraction keys from a decoded JSON object.
    ///
    /// Unknown keys are ignored. Counts tolerate numeric strings; anything
    /// unusable falls back to the default.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            from: text_field(map.get("from")),
            to: text_field(map.get("to")),
            depdate: text_field(map.get("depdate")),
            retdate: text_field(map.get("retdate")),
            adults: count_field(map.get("adults"), DEFAULT_ADULTS),
            children: count_field(map.get("children"), DEFAULT_CHILDREN),
            infants: count_field(map.get("infants"), DEFAULT_INFANTS),
            cabin: text_field(map.get("cabin")).unwrap_or_else(|| DEFAULT_CABIN.to_owned()),
            airline_include: text_field(map.get("airline_include")),
        }
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn count_field(value: Option<&Value>, default: u32) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Validation output
// ---------------------------------------------------------------------------

/// A required field the user still has to supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MissingField {
    /// Departure city.
    #[serde(rename = "from")]
    From,
    /// Arrival city.
    #[serde(rename = "to")]
    To,
    /// Departure date.
    #[serde(rename = "depdate")]
    DepDate,
}

impl MissingField {
    /// Every required field, in reporting order.
    pub const ALL: [MissingField; 3] = [Self::From, Self::To, Self::DepDate];

    /// Field name as it appears in responses.
    pub fn name(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
            Self::DepDate => "depdate",
        }
    }

    /// Question to ask the user.
    pub fn follow_up(self) -> &'static str {
        match self {
            Self::From => "✈️ Where are you flying *from*?",
            Self::To => "🛬 Where are you flying *to*?",
            Self::DepDate => "📅 When do you want to *depart*?",
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One directed leg of a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Departure city.
    pub depfrom: String,
    /// Arrival city.
    pub arrto: String,
    /// Departure date, serialised as `YYYY-MM-DD`.
    pub depdate: NaiveDate,
}

impl Segment {
    /// The same leg flown the other way on `date`.
    pub fn reversed(&self, date: NaiveDate) -> Self {
        Self {
            depfrom: self.arrto.clone(),
            arrto: self.depfrom.clone(),
            depdate: date,
        }
    }
}

/// Final structured booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingPayload {
    /// Adult passengers.
    pub adults: u32,
    /// Child passengers.
    pub children: u32,
    /// Infant passengers.
    pub infants: u32,
    /// Cabin class.
    pub cabin: String,
    /// Non-stop filter; always false.
    pub stops: bool,
    /// Preferred airline, empty when none.
    pub airline_include: String,
    /// Child ages; always empty.
    pub ages: Vec<u32>,
    /// Outbound leg, then the return leg if one resolved.
    pub segments: Vec<Segment>,
}

/// What the pipeline managed to read before giving up on a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialBooking {
    /// Departure city, if usable.
    pub from: Option<String>,
    /// Arrival city, if usable.
    pub to: Option<String>,
    /// Raw departure phrase, if any.
    pub depdate: Option<String>,
}

/// Result of a successfully processed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ParseOutcome {
    /// Everything required was found.
    Complete {
        /// The booking request.
        payload: BookingPayload,
    },
    /// Some required fields are missing.
    Incomplete {
        /// Summary such as "Missing fields: from, depdate".
        message: String,
        /// Missing fields in fixed order.
        missing_fields: Vec<MissingField>,
        /// One question per missing field.
        follow_up: Vec<String>,
        /// Fields read so far.
        parsed: PartialBooking,
    },
}

impl ParseOutcome {
    /// Build the incomplete outcome for a non-empty missing set.
    pub fn incomplete(missing: Vec<MissingField>, parsed: PartialBooking) -> Self {
        let names = missing
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(", ");
        Self::Incomplete {
            message: format!("Missing fields: {names}"),
            follow_up: missing.iter().map(|f| f.follow_up().to_owned()).collect(),
            missing_fields: missing,
            parsed,
        }
    }
}
