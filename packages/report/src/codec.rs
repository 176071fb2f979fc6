//! Conversion between [`CrimeReport`] and the flat storage columns.
//!
//! The tabular backend stores every field as a text column, except the
//! coordinates (numbers) and the evidence attachments (a list of `{url}`
//! objects). Vehicles and cameras become `"a, b"`, and witnesses become
//! `"Name (contact); Name2"`. Empty lists and empty scalars are written as
//! [`NOT_AVAILABLE`].
//!
//! Reading is defensive: a column with an unexpected shape degrades to its
//! default instead of failing the whole record.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use detective_report_models::{
    Coordinates, CrimeReport, EvidenceAttachment, NOT_AVAILABLE, ReportField, SuspectTrait,
    Witness, is_not_available,
};
use regex::Regex;
use serde_json::{Map, Value};
use strum::IntoEnumIterator as _;

/// A flat storage row: column name to JSON value.
pub type FlatFields = Map<String, Value>;

/// `"Name (contact)"` with the contact in a trailing parenthesized group.
static WITNESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.*?)\s*\((?P<contact>[^()]*)\)\s*$").unwrap_or_else(|_| unreachable!())
});

/// Splits comma-delimited text into trimmed entries, dropping blanks and
/// [`NOT_AVAILABLE`] markers.
#[must_use]
pub fn parse_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !is_not_available(item))
        .map(ToString::to_string)
        .collect()
}

/// Joins list entries with `", "`, or returns [`NOT_AVAILABLE`] when empty.
#[must_use]
pub fn join_list(items: &[String]) -> String {
    if items.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        items.join(", ")
    }
}

/// Parses a single `"Name (contact)"`, `"(contact)"` or `"Name"` entry.
///
/// An empty trailing group (`"Acme (store) ()"`) means "no contact" and
/// protects a name that itself ends in parentheses. Returns `None` for
/// blank entries.
#[must_use]
pub fn parse_witness(entry: &str) -> Option<Witness> {
    let entry = entry.trim();
    if is_not_available(entry) {
        return None;
    }

    let witness = WITNESS_RE.captures(entry).map_or_else(
        || Witness::new(entry, None),
        |caps| {
            Witness::new(
                caps.name("name").map_or("", |m| m.as_str()),
                caps.name("contact").map(|m| m.as_str()),
            )
        },
    );

    (!witness.name.is_empty() || witness.contact.is_some()).then_some(witness)
}

/// Parses the serialized witness column `"Name (contact); Name2"`.
#[must_use]
pub fn parse_witnesses(text: &str) -> Vec<Witness> {
    text.split(';').filter_map(parse_witness).collect()
}

/// Formats one witness as [`parse_witness`] reads it back.
///
/// The parentheses are omitted when there is no contact, unless the name
/// ends with `)`, in which case an empty `()` group is appended.
#[must_use]
pub fn format_witness(witness: &Witness) -> String {
    match witness.contact.as_deref() {
        Some(contact) if !contact.is_empty() && witness.name.is_empty() => format!("({contact})"),
        Some(contact) if !contact.is_empty() => format!("{} ({contact})", witness.name),
        _ if witness.name.ends_with(')') => format!("{} ()", witness.name),
        _ => witness.name.clone(),
    }
}

/// Serializes witnesses as `"Name (contact); Name2"`, or
/// [`NOT_AVAILABLE`] when there are none.
#[must_use]
pub fn format_witnesses(witnesses: &[Witness]) -> String {
    if witnesses.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    witnesses
        .iter()
        .map(format_witness)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Splits a delimited string of URLs into attachments.
#[must_use]
pub fn split_urls(text: &str) -> Vec<EvidenceAttachment> {
    parse_list(text)
        .into_iter()
        .map(EvidenceAttachment::new)
        .collect()
}

/// Reads a stored evidence column.
///
/// Only list-shaped values are understood: entries may be `{url}` objects
/// (extra attachment metadata is ignored) or bare URL strings. Anything
/// else is treated as an empty list.
#[must_use]
pub fn parse_evidence(value: &Value) -> Vec<EvidenceAttachment> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) => Some(url.trim()),
            Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::trim),
            _ => None,
        })
        .filter(|url| !url.is_empty())
        .map(EvidenceAttachment::new)
        .collect()
}

/// Renders a report as a fully populated flat row.
///
/// Read-only columns (the case number) are never written. An unknown
/// incident instant is written as `null` so date-typed columns accept it.
#[must_use]
pub fn to_fields(report: &CrimeReport) -> FlatFields {
    let mut fields = FlatFields::new();

    for field in ReportField::iter().filter(|f| !f.is_read_only()) {
        let value = match field {
            ReportField::CrimeType => text(&report.crime_type),
            ReportField::When => text(&report.when_text),
            ReportField::OccurredAt => report
                .occurred_at
                .map_or(Value::Null, |at| Value::String(at.to_rfc3339())),
            ReportField::Location => text(&report.location_text),
            ReportField::Latitude => Value::from(report.coordinates.lat),
            ReportField::Longitude => Value::from(report.coordinates.lng),
            ReportField::SuspectGender
            | ReportField::SuspectAge
            | ReportField::SuspectHair
            | ReportField::SuspectClothing
            | ReportField::SuspectFeatures
            | ReportField::SuspectHeight
            | ReportField::SuspectWeight
            | ReportField::SuspectTattoos
            | ReportField::SuspectScars
            | ReportField::SuspectAccent => {
                let trait_ = suspect_trait(field).unwrap_or(SuspectTrait::Features);
                text(report.suspect.get(trait_))
            }
            ReportField::Vehicles => Value::String(join_list(&report.vehicles)),
            ReportField::Cameras => Value::String(join_list(&report.cameras)),
            ReportField::Witnesses => Value::String(format_witnesses(&report.witnesses)),
            ReportField::Weapon => text(&report.weapon),
            ReportField::Injuries => text(&report.injuries),
            ReportField::PropertyDamage => text(&report.property_damage),
            ReportField::Weather => text(&report.weather),
            ReportField::EvidenceObservations => text(&report.evidence_observations),
            ReportField::Evidence => Value::Array(
                report
                    .evidence
                    .iter()
                    .map(|a| serde_json::json!({ "url": a.url }))
                    .collect(),
            ),
            ReportField::IncidentDescription => text(&report.incident_description),
            ReportField::ConversationLog => text(&report.conversation_log),
            ReportField::CaseNumber => continue,
        };
        fields.insert(field.to_string(), value);
    }

    fields
}

/// Rebuilds a report from a stored flat row.
///
/// Missing or malformed columns fall back to their defaults.
#[must_use]
pub fn from_fields(record_id: Option<&str>, fields: &FlatFields) -> CrimeReport {
    let get = |field: ReportField| fields.get(field.as_ref()).unwrap_or(&Value::Null);

    let mut report = CrimeReport {
        record_id: record_id.map(ToString::to_string),
        case_number: read_case_number(get(ReportField::CaseNumber)),
        crime_type: read_text(get(ReportField::CrimeType)),
        when_text: read_text(get(ReportField::When)),
        occurred_at: read_instant(get(ReportField::OccurredAt)),
        location_text: read_text(get(ReportField::Location)),
        coordinates: Coordinates::new(
            read_number(get(ReportField::Latitude)),
            read_number(get(ReportField::Longitude)),
        ),
        vehicles: read_list(get(ReportField::Vehicles)),
        cameras: read_list(get(ReportField::Cameras)),
        witnesses: read_witnesses(get(ReportField::Witnesses)),
        weapon: read_text(get(ReportField::Weapon)),
        injuries: read_text(get(ReportField::Injuries)),
        property_damage: read_text(get(ReportField::PropertyDamage)),
        weather: read_text(get(ReportField::Weather)),
        evidence_observations: read_text(get(ReportField::EvidenceObservations)),
        evidence: parse_evidence(get(ReportField::Evidence)),
        incident_description: read_text(get(ReportField::IncidentDescription)),
        conversation_log: read_text(get(ReportField::ConversationLog)),
        ..CrimeReport::default()
    };

    for trait_ in SuspectTrait::iter() {
        *report.suspect.get_mut(trait_) = read_text(get(ReportField::for_suspect(trait_)));
    }

    report
}

fn suspect_trait(field: ReportField) -> Option<SuspectTrait> {
    SuspectTrait::iter().find(|t| ReportField::for_suspect(*t) == field)
}

fn text(value: &str) -> Value {
    if is_not_available(value) {
        Value::String(NOT_AVAILABLE.to_string())
    } else {
        Value::String(value.to_string())
    }
}

fn read_text(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    };
    if is_not_available(&raw) {
        NOT_AVAILABLE.to_string()
    } else {
        raw
    }
}

fn read_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn read_instant(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|at| at.with_timezone(&Utc))
}

fn read_case_number(value: &Value) -> Option<String> {
    let raw = read_text(value);
    if is_not_available(&raw) {
        None
    } else {
        Some(raw)
    }
}

fn read_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => parse_list(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !is_not_available(s))
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn read_witnesses(value: &Value) -> Vec<Witness> {
    value.as_str().map(parse_witnesses).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_comma_list() {
        assert_eq!(
            parse_list(" Red truck ,Blue Honda,, N/A"),
            vec!["Red truck".to_string(), "Blue Honda".to_string()]
        );
        assert!(parse_list("N/A").is_empty());
    }

    #[test]
    fn joins_empty_list_as_marker() {
        assert_eq!(join_list(&[]), NOT_AVAILABLE);
        assert_eq!(
            join_list(&["a".to_string(), "b".to_string()]),
            "a, b".to_string()
        );
    }

    #[test]
    fn parses_witness_with_and_without_contact() {
        let parsed = parse_witnesses("John (555-5555); Jane");
        assert_eq!(
            parsed,
            vec![
                Witness::new("John", Some("555-5555")),
                Witness::new("Jane", None),
            ]
        );
    }

    #[test]
    fn witness_text_round_trips() {
        let witnesses = vec![
            Witness::new("John Smith", Some("555-5555")),
            Witness::new("Jane", None),
            Witness::new("Officer Lee", Some("lee@example.org")),
            Witness::new("", Some("555-1234")),
            Witness::new("Acme (store)", None),
        ];
        let text = format_witnesses(&witnesses);
        assert_eq!(
            text,
            "John Smith (555-5555); Jane; Officer Lee (lee@example.org); (555-1234); Acme (store) ()"
        );
        assert_eq!(parse_witnesses(&text), witnesses);
    }

    #[test]
    fn contact_only_entry_keeps_contact() {
        assert_eq!(
            parse_witness("(555-1234)"),
            Some(Witness::new("", Some("555-1234")))
        );
        assert_eq!(format_witness(&Witness::new("", Some("555-1234"))), "(555-1234)");
        assert_eq!(parse_witness("()"), None);
    }

    #[test]
    fn parenthesized_name_without_contact_round_trips() {
        let witnesses = vec![
            Witness::new("Acme (store)", None),
            Witness::new("Bob", Some("555-0000")),
        ];
        let text = format_witnesses(&witnesses);
        assert_eq!(text, "Acme (store) (); Bob (555-0000)");
        assert_eq!(parse_witnesses(&text), witnesses);
    }

    #[test]
    fn non_list_evidence_is_empty() {
        assert!(parse_evidence(&json!("https://a")).is_empty());
        assert!(parse_evidence(&Value::Null).is_empty());
    }

    #[test]
    fn evidence_accepts_attachment_objects() {
        let value = json!([
            { "id": "att1", "url": "https://a", "filename": "a.png" },
            "https://b",
            { "filename": "no-url" },
            42
        ]);
        assert_eq!(
            parse_evidence(&value),
            vec![
                EvidenceAttachment::new("https://a"),
                EvidenceAttachment::new("https://b"),
            ]
        );
    }

    #[test]
    fn writes_every_writable_column() {
        let fields = to_fields(&CrimeReport::default());
        for field in ReportField::iter() {
            assert_eq!(
                fields.contains_key(field.as_ref()),
                !field.is_read_only(),
                "column {field}"
            );
        }
        assert_eq!(fields["Vehicles"], json!("N/A"));
        assert_eq!(fields["Witnesses"], json!("N/A"));
        assert_eq!(fields["Evidence"], json!([]));
        assert_eq!(fields["Latitude"], json!(0.0));
    }

    #[test]
    fn reads_flat_row_defensively() {
        let mut fields = FlatFields::new();
        fields.insert("Crime Type".into(), json!("theft"));
        fields.insert("Vehicles".into(), json!("Red truck"));
        fields.insert("Witnesses".into(), json!("John (555-5555)"));
        fields.insert("Latitude".into(), json!("29.42"));
        fields.insert("Longitude".into(), json!(-98.49));
        fields.insert("Evidence".into(), json!("not a list"));
        fields.insert("Weapon".into(), json!({ "nested": true }));
        fields.insert("Case Number".into(), json!(1042));
        fields.insert("Suspect Hair".into(), json!("black"));

        let report = from_fields(Some("rec1"), &fields);
        assert_eq!(report.record_id.as_deref(), Some("rec1"));
        assert_eq!(report.case_number.as_deref(), Some("1042"));
        assert_eq!(report.crime_type, "theft");
        assert_eq!(report.vehicles, vec!["Red truck".to_string()]);
        assert_eq!(report.witnesses, vec![Witness::new("John", Some("555-5555"))]);
        assert!((report.coordinates.lat - 29.42).abs() < 1e-9);
        assert!((report.coordinates.lng + 98.49).abs() < 1e-9);
        assert!(report.evidence.is_empty());
        assert_eq!(report.weapon, NOT_AVAILABLE);
        assert_eq!(report.suspect.hair, "black");
        assert_eq!(report.suspect.gender, NOT_AVAILABLE);
    }

    #[test]
    fn flat_row_round_trips() {
        let mut report = CrimeReport {
            crime_type: "burglary".to_string(),
            vehicles: vec!["Blue Honda".to_string(), "Red truck".to_string()],
            witnesses: vec![Witness::new("Jane", Some("222-3333"))],
            evidence: vec![EvidenceAttachment::new("https://a")],
            coordinates: Coordinates::new(29.4, -98.5),
            ..CrimeReport::default()
        };
        report.suspect.age = "30s".to_string();

        let back = from_fields(None, &to_fields(&report));
        assert_eq!(back, report);
    }
}
