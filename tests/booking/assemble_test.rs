//! Tests for `booking::pipeline::assemble`: outcome construction.

use chrono::NaiveDate;
use serde_json::json;
use straylight::booking::pipeline::assemble;
use straylight::booking::{
    ExtractionResult, MissingField, ParseOutcome, PartialBooking, Segment,
};
use straylight::config::BookingConfig;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn extraction(from: &str, to: &str, depdate: &str, retdate: Option<&str>) -> ExtractionResult {
    ExtractionResult {
        from: Some(from.to_owned()),
        to: Some(to.to_owned()),
        depdate: Some(depdate.to_owned()),
        retdate: retdate.map(str::to_owned),
        ..ExtractionResult::default()
    }
}

fn expect_complete(outcome: ParseOutcome) -> straylight::booking::BookingPayload {
    match outcome {
        ParseOutcome::Complete { payload } => payload,
        other => panic!("expected complete outcome, got {other:?}"),
    }
}

#[test]
fn round_trip_has_swapped_return_segment() {
    let query = "fly from Delhi to Mumbai after 5 days and come back after 3 days";
    let outcome = assemble(
        extraction("Delhi", "Mumbai", "after 5 days", Some("after 3 days")),
        query,
        today(),
        &BookingConfig::default(),
    );

    let payload = expect_complete(outcome);
    assert_eq!(
        payload.segments,
        vec![
            Segment {
                depfrom: "Delhi".to_owned(),
                arrto: "Mumbai".to_owned(),
                depdate: date(2026, 10, 23),
            },
            Segment {
                depfrom: "Mumbai".to_owned(),
                arrto: "Delhi".to_owned(),
                depdate: date(2026, 10, 26),
            },
        ]
    );
}

#[test]
fn relative_return_phrase_never_precedes_departure() {
    for retdate in ["in 2 weeks", "2 weeks later", "next month", "in 3 days"] {
        let outcome = assemble(
            extraction("Delhi", "Mumbai", "after 20 days", Some(retdate)),
            "fly from Delhi to Mumbai after 20 days and return later",
            today(),
            &BookingConfig::default(),
        );
        let payload = expect_complete(outcome);
        assert_eq!(payload.segments.len(), 2, "retdate {retdate:?}");
        assert_eq!(payload.segments[0].depdate, date(2026, 11, 7));
        assert!(
            payload.segments[1].depdate > payload.segments[0].depdate,
            "retdate {retdate:?} resolved to {}",
            payload.segments[1].depdate
        );
    }
}

#[test]
fn return_in_two_weeks_counts_from_departure() {
    let outcome = assemble(
        extraction("Delhi", "Mumbai", "after 20 days", Some("in 2 weeks")),
        "fly from Delhi to Mumbai after 20 days, return in 2 weeks",
        today(),
        &BookingConfig::default(),
    );
    let payload = expect_complete(outcome);
    assert_eq!(payload.segments[1].depdate, date(2026, 11, 21));
}

#[test]
fn one_way_when_return_does_not_resolve() {
    let query = "from Delhi to Goa tomorrow, return whenever";
    for retdate in [None, Some("Not Provided"), Some("whenever it suits")] {
        let payload = expect_complete(assemble(
            extraction("Delhi", "Goa", "tomorrow", retdate),
            query,
            today(),
            &BookingConfig::default(),
        ));
        assert_eq!(payload.segments.len(), 1, "retdate {retdate:?}");
        assert_eq!(payload.segments[0].depdate, date(2026, 10, 19));
    }
}

#[test]
fn defaults_fill_the_payload() {
    let payload = expect_complete(assemble(
        extraction("Delhi", "Mumbai", "tomorrow", None),
        "from Delhi to Mumbai tomorrow",
        today(),
        &BookingConfig::default(),
    ));
    assert_eq!(payload.adults, 1);
    assert_eq!(payload.children, 0);
    assert_eq!(payload.infants, 0);
    assert_eq!(payload.cabin, "economy");
    assert!(!payload.stops);
    assert_eq!(payload.airline_include, "");
    assert!(payload.ages.is_empty());
}

#[test]
fn passengers_cabin_and_airline_carry_through() {
    let mut ext = extraction("Delhi", "Mumbai", "tomorrow", None);
    ext.adults = 2;
    ext.children = 1;
    ext.cabin = "Business".to_owned();
    ext.airline_include = Some("Indigo".to_owned());

    let payload = expect_complete(assemble(
        ext,
        "from Delhi to Mumbai tomorrow, 2 adults 1 child business by Indigo",
        today(),
        &BookingConfig::default(),
    ));
    assert_eq!(payload.adults, 2);
    assert_eq!(payload.children, 1);
    assert_eq!(payload.cabin, "business");
    assert_eq!(payload.airline_include, "Indigo");
}

#[test]
fn nothing_resolvable_reports_three_missing_fields() {
    let outcome = assemble(
        ExtractionResult {
            from: Some("Departure City (Not Provided)".to_owned()),
            to: Some("Arrival City (Not Provided)".to_owned()),
            depdate: Some("Not Provided".to_owned()),
            ..ExtractionResult::default()
        },
        "I need a flight",
        today(),
        &BookingConfig::default(),
    );

    let ParseOutcome::Incomplete {
        message,
        missing_fields,
        follow_up,
        parsed,
    } = outcome
    else {
        panic!("expected incomplete outcome");
    };
    assert_eq!(
        missing_fields,
        vec![MissingField::From, MissingField::To, MissingField::DepDate]
    );
    assert_eq!(message, "Missing fields: from, to, depdate");
    assert_eq!(follow_up.len(), 3);
    assert_eq!(parsed, PartialBooking::default());
}

#[test]
fn hallucinated_departure_city_is_discarded() {
    let outcome = assemble(
        extraction("Delhi", "Goa", "tomorrow", None),
        "I want to go to Goa tomorrow",
        today(),
        &BookingConfig::default(),
    );
    let ParseOutcome::Incomplete {
        missing_fields,
        parsed,
        ..
    } = outcome
    else {
        panic!("expected incomplete outcome");
    };
    assert_eq!(missing_fields, vec![MissingField::From]);
    assert_eq!(parsed.from, None);
    assert_eq!(parsed.to.as_deref(), Some("Goa"));
    assert_eq!(parsed.depdate.as_deref(), Some("tomorrow"));
}

#[test]
fn unresolvable_departure_echoes_raw_phrase() {
    let outcome = assemble(
        extraction("Delhi", "Goa", "someday", Some("after 3 days")),
        "from Delhi to Goa someday",
        today(),
        &BookingConfig::default(),
    );
    let ParseOutcome::Incomplete {
        missing_fields,
        parsed,
        ..
    } = outcome
    else {
        panic!("expected incomplete outcome");
    };
    assert_eq!(missing_fields, vec![MissingField::DepDate]);
    assert_eq!(parsed.depdate.as_deref(), Some("someday"));
}

#[test]
fn outcomes_serialise_to_wire_shape() {
    let complete = assemble(
        extraction("Delhi", "Mumbai", "after 5 days", None),
        "from Delhi to Mumbai after 5 days",
        today(),
        &BookingConfig::default(),
    );
    assert_eq!(
        serde_json::to_value(&complete).expect("serialise"),
        json!({
            "status": "complete",
            "payload": {
                "adults": 1,
                "children": 0,
                "infants": 0,
                "cabin": "economy",
                "stops": false,
                "airline_include": "",
                "ages": [],
                "segments": [
                    {"depfrom": "Delhi", "arrto": "Mumbai", "depdate": "2026-10-23"}
                ]
            }
        })
    );

    let incomplete = assemble(
        ExtractionResult::default(),
        "hello",
        today(),
        &BookingConfig::default(),
    );
    assert_eq!(
        serde_json::to_value(&incomplete).expect("serialise"),
        json!({
            "status": "incomplete",
            "message": "Missing fields: from, to, depdate",
            "missing_fields": ["from", "to", "depdate"],
            "follow_up": [
                "✈️ Where are you flying *from*?",
                "🛬 Where are you flying *to*?",
                "📅 When do you want to *depart*?"
            ],
            "parsed": {"from": null, "to": null, "depdate": null}
        })
    );
}
