//! Natural-language date phrases to calendar dates.
//!
//! Rules run in a fixed order and the first one that yields a date wins:
//!
//! 1. "day after tomorrow" (+2)
//! 2. "tomorrow" (+1)
//! 3. "after N day(s)" (+N)
//! 4. calendar: relative offsets ("in 2 weeks", "next month"), then
//!    `chrono-english` seeded with the reference date
//! 5. fuzzy scan for day/month/year tokens, reference fills the gaps
//!
//! A phrase no rule understands normalises to `None`; callers treat that
//! as "ask the user again", never as an error.

use std::sync::LazyLock;

use chrono::{Datelike, Days, Local, Months, NaiveDate, TimeZone, Utc};
use chrono_english::Dialect;
use regex::Regex;
use tracing::debug;

/// Source of "today" for relative phrases.
pub trait Clock: Send + Sync {
    /// Current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the server's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// One resolution layer: phrase and reference date in, maybe a date out.
pub type DateRule = fn(&str, NaiveDate) -> Option<NaiveDate>;

/// Resolution layers in priority order, with names for logging.
pub const DATE_RULES: [(&str, DateRule); 5] = [
    ("day_after_tomorrow", day_after_tomorrow),
    ("tomorrow", tomorrow),
    ("after_n_days", after_n_days),
    ("calendar", calendar),
    ("fuzzy", fuzzy),
];

/// Normalise `phrase` relative to `reference`.
///
/// Returns `None` for empty phrases and phrases no rule resolves.
pub fn normalize_date(phrase: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if phrase.trim().is_empty() {
        return None;
    }
    DATE_RULES.iter().find_map(|(name, rule)| {
        let date = rule(phrase, reference)?;
        debug!(rule = name, %date, "date phrase resolved");
        Some(date)
    })
}

fn add_days(reference: NaiveDate, n: u64) -> Option<NaiveDate> {
    reference.checked_add_days(Days::new(n))
}

/// Rule 1: phrase mentions "day after tomorrow".
pub fn day_after_tomorrow(phrase: &str, reference: NaiveDate) -> Option<NaiveDate> {
    phrase
        .to_lowercase()
        .contains("day after tomorrow")
        .then(|| add_days(reference, 2))
        .flatten()
}

/// Rule 2: phrase mentions "tomorrow".
pub fn tomorrow(phrase: &str, reference: NaiveDate) -> Option<NaiveDate> {
    phrase
        .to_lowercase()
        .contains("tomorrow")
        .then(|| add_days(reference, 1))
        .flatten()
}

static AFTER_N_DAYS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)after (\d+) days?").ok());

/// Rule 3: "after N day(s)", case-insensitive.
pub fn after_n_days(phrase: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let re = AFTER_N_DAYS.as_ref()?;
    let n = re.captures(phrase)?.get(1)?.as_str().parse::<u64>().ok()?;
    add_days(reference, n)
}

/// Largest count accepted in a relative offset such as "in N weeks".
pub const MAX_RELATIVE_COUNT: u64 = 1000;

static RELATIVE_OFFSET: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:in\s+)?(\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+(day|week|fortnight|month|year)s?\b(?:\s+(later|after|hence|from\s+now|ago))?",
    )
    .ok()
});

static NEXT_UNIT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bnext\s+(day|week|fortnight|month|year)\b").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

impl Unit {
    fn parse(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "fortnight" => Some(Self::Fortnight),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// A parsed "N units [later|ago]" offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RelativeOffset {
    count: u64,
    unit: Unit,
    backwards: bool,
}

impl RelativeOffset {
    fn find(phrase: &str) -> Option<Self> {
        if let Some(caps) = RELATIVE_OFFSET.as_ref().and_then(|re| re.captures(phrase)) {
            return Some(Self {
                count: count_word(caps.get(1)?.as_str()),
                unit: Unit::parse(caps.get(2)?.as_str())?,
                backwards: caps
                    .get(3)
                    .is_some_and(|m| m.as_str().eq_ignore_ascii_case("ago")),
            });
        }
        let caps = NEXT_UNIT.as_ref()?.captures(phrase)?;
        Some(Self {
            count: 1,
            unit: Unit::parse(caps.get(1)?.as_str())?,
            backwards: false,
        })
    }

    /// `None` when the count is over [`MAX_RELATIVE_COUNT`] or the result
    /// leaves chrono's range.
    fn apply(self, reference: NaiveDate) -> Option<NaiveDate> {
        if self.count > MAX_RELATIVE_COUNT {
            return None;
        }
        let months = |per: u64| -> Option<Months> {
            Some(Months::new(u32::try_from(self.count.checked_mul(per)?).ok()?))
        };
        let days = |per: u64| self.count.checked_mul(per).map(Days::new);
        match (self.unit, self.backwards) {
            (Unit::Month | Unit::Year, backwards) => {
                let span = months(if self.unit == Unit::Year { 12 } else { 1 })?;
                if backwards {
                    reference.checked_sub_months(span)
                } else {
                    reference.checked_add_months(span)
                }
            }
            (unit, backwards) => {
                let span = days(match unit {
                    Unit::Week => 7,
                    Unit::Fortnight => 14,
                    _ => 1,
                })?;
                if backwards {
                    reference.checked_sub_days(span)
                } else {
                    reference.checked_add_days(span)
                }
            }
        }
    }
}

fn count_word(word: &str) -> u64 {
    const WORDS: [&str; 12] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
        "twelve",
    ];
    let lower = word.to_lowercase();
    if lower == "a" || lower == "an" {
        return 1;
    }
    if let Some(n) = WORDS.iter().zip(1_u64..).find_map(|(w, n)| (*w == lower).then_some(n)) {
        return n;
    }
    // Digit runs too long for u64 count as out of range.
    lower.parse().unwrap_or(u64::MAX)
}

/// Digit runs longer than a year number never reach `chrono-english`.
fn has_oversized_number(phrase: &str) -> bool {
    phrase
        .split(|c: char| !c.is_ascii_digit())
        .any(|run| run.len() > 4)
}

/// Rule 4: general calendar parser.
///
/// Relative offsets ("in 3 days", "2 weeks later", "next month", "a year
/// from now") are resolved here against `reference`; months clamp to the
/// end of shorter months. Anything else ("next friday", "march 5",
/// "2026-12-25") goes to `chrono-english`, relative to midnight on
/// `reference`. An offset that is out of range yields `None` without
/// consulting the parser.
pub fn calendar(phrase: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if let Some(offset) = RelativeOffset::find(phrase) {
        return offset.apply(reference);
    }
    if has_oversized_number(phrase) {
        return None;
    }
    let midnight = reference.and_hms_opt(0, 0, 0)?;
    let now = Utc.from_utc_datetime(&midnight);
    chrono_english::parse_date_string(phrase.trim(), now, Dialect::Us)
        .ok()
        .map(|dt| dt.date_naive())
}

static NUMERIC_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,4})[-/.](\d{1,2})[-/.](\d{1,4})\b").ok());

static ORDINAL_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").ok());

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Rule 5: fuzzy date scan that skips words it does not know.
///
/// A numeric `y-m-d` / `m/d/y` token wins outright. Otherwise the first
/// month name, day number (1-31) and four-digit year are collected; missing
/// components come from `reference`. Relative offsets are not calendar
/// components, so "in 3 days" contributes no day. Text with none of them
/// yields `None`.
pub fn fuzzy(phrase: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let mut lower = phrase.to_lowercase();
    for re in [&*RELATIVE_OFFSET, &*NEXT_UNIT].into_iter().flatten() {
        lower = re.replace_all(&lower, " ").into_owned();
    }

    if let Some(caps) = NUMERIC_DATE.as_ref().and_then(|re| re.captures(&lower)) {
        let a = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let b = caps.get(2)?.as_str().parse::<u32>().ok()?;
        let c = caps.get(3)?.as_str().parse::<u32>().ok()?;
        return numeric_date(a, b, c);
    }

    let cleaned = match ORDINAL_SUFFIX.as_ref() {
        Some(re) => re.replace_all(&lower, "$1").into_owned(),
        None => lower,
    };

    let mut day = None;
    let mut month = None;
    let mut year = None;
    for token in cleaned
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if let Ok(n) = token.parse::<u32>() {
            if token.len() == 4 && year.is_none() {
                year = i32::try_from(n).ok();
            } else if (1..=31).contains(&n) && day.is_none() {
                day = Some(n);
            }
        } else if month.is_none() {
            month = month_number(token);
        }
    }

    if day.is_none() && month.is_none() && year.is_none() {
        return None;
    }

    let year = year.unwrap_or_else(|| reference.year());
    let month = month.unwrap_or_else(|| reference.month());
    // A defaulted day clamps to the end of shorter months.
    let day = match day {
        Some(d) => d,
        None => reference.day().min(days_in_month(year, month)?),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(first.checked_add_months(Months::new(1))?.pred_opt()?.day())
}

fn numeric_date(a: u32, b: u32, c: u32) -> Option<NaiveDate> {
    let (year, month, day) = if a >= 1000 {
        (a, b, c)
    } else if a > 12 && b <= 12 {
        (c, b, a)
    } else {
        (c, a, b)
    };
    let year = if year < 100 {
        year.checked_add(2000)?
    } else {
        year
    };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

fn month_number(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .zip(1_u32..)
        .find(|(name, _)| name.starts_with(token))
        .map(|(_, n)| n)
}
