//! Field-merge reconciliation of a stored report with a partial update.
//!
//! Every policy here is total: the merge never fails and always yields a
//! fully populated report where each scalar is either a value or
//! [`NOT_AVAILABLE`].
//!
//! | Kind | Policy |
//! |---|---|
//! | scalar text | absent keeps, marker clears, empty existing adopts, contained keeps, else `existing\nnew` |
//! | vehicles, cameras | union, exact-string dedup, existing first |
//! | witnesses | append pairs not yet present, exact `(name, contact)` match |
//! | evidence | append everything |
//! | coordinates | replace only with a complete pair |
//! | conversation log | trimmed `existing\nnew` |

use detective_report_models::{
    Coordinates, CrimeReport, EvidenceAttachment, NOT_AVAILABLE, ReportField, ReportUpdate,
    SuspectTrait, Witness, is_not_available,
};
use strum::IntoEnumIterator as _;

use crate::codec::to_fields;

/// Result of [`merge_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The reconciled report.
    pub report: CrimeReport,
    /// Storage columns whose value differs from the existing report.
    pub changed_fields: Vec<ReportField>,
    /// Human-readable notes about parts of the update that were ignored.
    pub warnings: Vec<String>,
}

/// Merges one scalar text field.
#[must_use]
pub fn merge_text(existing: &str, incoming: Option<&str>) -> String {
    let existing = existing.trim();

    let Some(incoming) = incoming else {
        return if is_not_available(existing) {
            NOT_AVAILABLE.to_string()
        } else {
            existing.to_string()
        };
    };

    let incoming = incoming.trim();
    if is_not_available(incoming) {
        return NOT_AVAILABLE.to_string();
    }
    if is_not_available(existing) {
        return incoming.to_string();
    }
    if existing.contains(incoming) {
        return existing.to_string();
    }

    format!("{existing}\n{incoming}")
}

/// Unions two string lists, keeping existing entries first and skipping
/// incoming entries already present.
#[must_use]
pub fn merge_list(existing: &[String], incoming: Option<&[String]>) -> Vec<String> {
    let mut merged = existing.to_vec();
    for item in incoming.unwrap_or_default() {
        let item = item.trim();
        if is_not_available(item) || merged.iter().any(|x| x == item) {
            continue;
        }
        merged.push(item.to_string());
    }
    merged
}

/// Appends witnesses whose `(name, contact)` pair is not already present.
///
/// Existing witnesses are never removed or reordered.
#[must_use]
pub fn merge_witnesses(existing: &[Witness], incoming: Option<&[Witness]>) -> Vec<Witness> {
    let mut merged = existing.to_vec();
    for witness in incoming.unwrap_or_default() {
        if witness.name.is_empty() && witness.contact.is_none() {
            continue;
        }
        if !merged.contains(witness) {
            merged.push(witness.clone());
        }
    }
    merged
}

/// Appends every incoming attachment.
#[must_use]
pub fn merge_evidence(
    existing: &[EvidenceAttachment],
    incoming: Option<&[EvidenceAttachment]>,
) -> Vec<EvidenceAttachment> {
    existing
        .iter()
        .chain(incoming.unwrap_or_default())
        .cloned()
        .collect()
}

/// Replaces the coordinates only when the update carries a complete pair.
#[must_use]
pub fn merge_coordinates(existing: Coordinates, incoming: Option<Coordinates>) -> Coordinates {
    incoming.unwrap_or(existing)
}

/// Appends transcript text.
#[must_use]
pub fn merge_log(existing: &str, incoming: Option<&str>) -> String {
    let existing = if is_not_available(existing) {
        ""
    } else {
        existing
    };
    let incoming = incoming.filter(|s| !is_not_available(s)).unwrap_or("");

    let joined = format!("{existing}\n{incoming}");
    let joined = joined.trim();
    if joined.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        joined.to_string()
    }
}

/// Storage columns whose flat values differ between two reports.
#[must_use]
pub fn changed_fields(before: &CrimeReport, after: &CrimeReport) -> Vec<ReportField> {
    let before = to_fields(before);
    let after = to_fields(after);
    ReportField::iter()
        .filter(|f| before.get(f.as_ref()) != after.get(f.as_ref()))
        .collect()
}

/// Reconciles `existing` with `update`.
///
/// Identity (record id, case number), the normalized incident instant and
/// the approved incident description are carried over untouched; those
/// are owned by storage and by the approval step.
#[must_use]
pub fn merge_report(existing: &CrimeReport, update: &ReportUpdate) -> MergeOutcome {
    let mut report = CrimeReport {
        record_id: existing.record_id.clone(),
        case_number: existing.case_number.clone(),
        crime_type: merge_text(&existing.crime_type, update.crime_type.as_deref()),
        when_text: merge_text(&existing.when_text, update.when_text.as_deref()),
        occurred_at: existing.occurred_at,
        location_text: merge_text(&existing.location_text, update.location_text.as_deref()),
        coordinates: merge_coordinates(existing.coordinates, update.coordinates),
        suspect: existing.suspect.clone(),
        vehicles: merge_list(&existing.vehicles, update.vehicles.as_deref()),
        cameras: merge_list(&existing.cameras, update.cameras.as_deref()),
        witnesses: merge_witnesses(&existing.witnesses, update.witnesses.as_deref()),
        weapon: merge_text(&existing.weapon, update.weapon.as_deref()),
        injuries: merge_text(&existing.injuries, update.injuries.as_deref()),
        property_damage: merge_text(
            &existing.property_damage,
            update.property_damage.as_deref(),
        ),
        weather: merge_text(&existing.weather, update.weather.as_deref()),
        evidence_observations: merge_text(
            &existing.evidence_observations,
            update.evidence_observations.as_deref(),
        ),
        evidence: merge_evidence(&existing.evidence, update.evidence.as_deref()),
        incident_description: merge_text(&existing.incident_description, None),
        conversation_log: merge_log(&existing.conversation_log, update.conversation_log.as_deref()),
    };

    for field in SuspectTrait::iter() {
        *report.suspect.get_mut(field) =
            merge_text(existing.suspect.get(field), update.suspect.get(field));
    }

    let changed_fields = changed_fields(existing, &report);

    let warnings = update
        .unknown_fields
        .iter()
        .map(|key| format!("Unknown field '{key}' was ignored."))
        .chain(
            update
                .malformed_fields
                .iter()
                .map(|key| format!("Field '{key}' had an unusable value and was ignored.")),
        )
        .collect();

    MergeOutcome {
        report,
        changed_fields,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FlatFields, format_witnesses, from_fields, parse_witnesses};
    use crate::update::parse_update;
    use serde_json::json;

    fn flat(value: serde_json::Value) -> FlatFields {
        value.as_object().cloned().unwrap()
    }

    const SCALAR_KEYS: &[(&str, &str)] = &[
        ("crime_type", "Crime Type"),
        ("datetime", "Datetime"),
        ("location", "Location"),
        ("weapon", "Weapon"),
        ("injuries", "Injuries"),
        ("property_damage", "Property Damage"),
        ("weather", "Weather"),
        ("evidence_observations", "Evidence Observations"),
    ];

    #[test]
    fn text_policy() {
        assert_eq!(merge_text("knife", None), "knife");
        assert_eq!(merge_text("knife", Some("N/A")), NOT_AVAILABLE);
        assert_eq!(merge_text("knife", Some("  ")), NOT_AVAILABLE);
        assert_eq!(merge_text("N/A", Some("knife")), "knife");
        assert_eq!(merge_text("", Some("knife")), "knife");
        assert_eq!(merge_text("large kitchen knife", Some("knife")), "large kitchen knife");
        assert_eq!(merge_text("knife", Some("bat")), "knife\nbat");
        assert_eq!(merge_text("", None), NOT_AVAILABLE);
    }

    #[test]
    fn absent_scalar_keeps_existing_for_every_field() {
        for (_, column) in SCALAR_KEYS {
            let existing = from_fields(None, &flat(json!({ *column: "kept value" })));
            let outcome = merge_report(&existing, &parse_update(&json!({})));
            assert_eq!(to_fields(&outcome.report)[*column], json!("kept value"), "{column}");
            assert!(outcome.changed_fields.is_empty());
        }
    }

    #[test]
    fn contained_scalar_is_not_duplicated_for_every_field() {
        for (key, column) in SCALAR_KEYS {
            let existing = from_fields(None, &flat(json!({ *column: "near the stadium lot" })));
            let outcome = merge_report(&existing, &parse_update(&json!({ *key: "stadium" })));
            assert_eq!(
                to_fields(&outcome.report)[*column],
                json!("near the stadium lot"),
                "{column}"
            );
        }
    }

    #[test]
    fn distinct_scalars_are_appended_for_every_field() {
        for (key, column) in SCALAR_KEYS {
            let existing = from_fields(None, &flat(json!({ *column: "near the Giants game" })));
            let outcome = merge_report(
                &existing,
                &parse_update(&json!({ *key: "at the stadium parking lot" })),
            );
            assert_eq!(
                to_fields(&outcome.report)[*column],
                json!("near the Giants game\nat the stadium parking lot"),
                "{column}"
            );
        }
    }

    #[test]
    fn explicit_marker_clears_scalar() {
        let existing = from_fields(None, &flat(json!({ "Weapon": "knife" })));
        let outcome = merge_report(&existing, &parse_update(&json!({ "weapon": "N/A" })));
        assert_eq!(outcome.report.weapon, NOT_AVAILABLE);
        assert_eq!(outcome.changed_fields, vec![ReportField::Weapon]);
    }

    #[test]
    fn suspect_traits_merge_independently() {
        let mut existing = CrimeReport::default();
        existing.suspect.hair = "black".to_string();
        existing.suspect.age = "30s".to_string();

        let outcome = merge_report(
            &existing,
            &parse_update(&json!({ "suspect": { "hair": "curly", "gender": "male" } })),
        );
        assert_eq!(outcome.report.suspect.hair, "black\ncurly");
        assert_eq!(outcome.report.suspect.age, "30s");
        assert_eq!(outcome.report.suspect.gender, "male");
        assert_eq!(outcome.report.suspect.scars, NOT_AVAILABLE);
    }

    #[test]
    fn crime_type_and_vehicles_scenario() {
        let existing = from_fields(
            Some("rec1"),
            &flat(json!({ "Crime Type": "N/A", "Vehicles": "Red truck" })),
        );
        let update = parse_update(&json!({
            "crime_type": "theft",
            "vehicles": ["Red truck", "Blue Honda"],
        }));

        let fields = to_fields(&merge_report(&existing, &update).report);
        assert_eq!(fields["Crime Type"], json!("theft"));
        assert_eq!(fields["Vehicles"], json!("Red truck, Blue Honda"));
    }

    #[test]
    fn vehicle_membership_is_order_insensitive() {
        let red = "Red truck".to_string();
        let blue = "Blue Honda".to_string();
        let a = merge_list(
            std::slice::from_ref(&red),
            Some([blue.clone(), red.clone()].as_slice()),
        );
        let b = merge_list(std::slice::from_ref(&blue), Some([red, blue.clone()].as_slice()));
        let mut a_sorted = a.clone();
        let mut b_sorted = b.clone();
        a_sorted.sort();
        b_sorted.sort();
        assert_eq!(a_sorted, b_sorted);

        let joined = crate::codec::join_list(&a);
        assert_eq!(crate::codec::parse_list(&joined), a);
    }

    #[test]
    fn witness_scenario() {
        let existing = from_fields(None, &flat(json!({ "Witnesses": "John (555-5555)" })));
        let update = parse_update(&json!({
            "witnesses": [{ "name": "Jane", "contact": "222-3333" }],
        }));

        let fields = to_fields(&merge_report(&existing, &update).report);
        assert_eq!(fields["Witnesses"], json!("John (555-5555); Jane (222-3333)"));
    }

    #[test]
    fn contact_only_witness_survives_storage_without_duplicating() {
        let update = parse_update(&json!({
            "witnesses": [{ "name": "", "contact": "555-1234" }],
        }));

        let first = merge_report(&CrimeReport::default(), &update).report;
        let stored = from_fields(Some("rec1"), &to_fields(&first));
        let second = merge_report(&stored, &update).report;

        assert_eq!(second.witnesses, vec![Witness::new("", Some("555-1234"))]);
        assert_eq!(to_fields(&second)["Witnesses"], json!("(555-1234)"));
    }

    #[test]
    fn witnesses_keep_prior_entries_and_order() {
        let existing = vec![
            Witness::new("John", Some("555-5555")),
            Witness::new("Amy", None),
        ];
        let incoming = vec![
            Witness::new("Amy", None),
            Witness::new("John", Some("555-0000")),
            Witness::new("Jane", None),
        ];

        let merged = merge_witnesses(&existing, Some(incoming.as_slice()));
        assert_eq!(&merged[..2], &existing[..]);
        assert_eq!(
            &merged[2..],
            &[Witness::new("John", Some("555-0000")), Witness::new("Jane", None)]
        );

        let text = format_witnesses(&merged);
        assert_eq!(parse_witnesses(&text), merged);
    }

    #[test]
    fn evidence_scenario() {
        let existing = from_fields(None, &flat(json!({ "Evidence": [{ "url": "a" }] })));
        let update = parse_update(&json!({ "evidence": "b, c" }));

        let fields = to_fields(&merge_report(&existing, &update).report);
        assert_eq!(
            fields["Evidence"],
            json!([{ "url": "a" }, { "url": "b" }, { "url": "c" }])
        );
    }

    #[test]
    fn evidence_grows_by_incoming_count() {
        let existing = vec![EvidenceAttachment::new("a"), EvidenceAttachment::new("a")];
        let incoming = vec![EvidenceAttachment::new("a"), EvidenceAttachment::new("b")];
        let merged = merge_evidence(&existing, Some(incoming.as_slice()));
        assert_eq!(merged.len(), existing.len() + incoming.len());

        let malformed = from_fields(None, &flat(json!({ "Evidence": "a, b" })));
        assert!(merge_evidence(&malformed.evidence, None).is_empty());
    }

    #[test]
    fn coordinates_without_location_update() {
        let placed = CrimeReport {
            coordinates: Coordinates::new(29.42, -98.49),
            ..CrimeReport::default()
        };
        let outcome = merge_report(&placed, &parse_update(&json!({ "weapon": "bat" })));
        assert_eq!(outcome.report.coordinates, Coordinates::new(29.42, -98.49));

        let outcome = merge_report(&CrimeReport::default(), &parse_update(&json!({})));
        assert!(outcome.report.coordinates.is_unset());

        let outcome = merge_report(
            &placed,
            &parse_update(&json!({ "coordinates": { "lat": 1.0 } })),
        );
        assert_eq!(outcome.report.coordinates, Coordinates::new(29.42, -98.49));
    }

    #[test]
    fn log_appends_and_trims() {
        assert_eq!(merge_log("N/A", None), NOT_AVAILABLE);
        assert_eq!(merge_log("", Some("")), NOT_AVAILABLE);
        assert_eq!(merge_log("N/A", Some("[10:00:00] User: hi")), "[10:00:00] User: hi");
        assert_eq!(merge_log("line one", Some("line two\n")), "line one\nline two");
    }

    #[test]
    fn identity_and_description_survive() {
        let existing = CrimeReport {
            record_id: Some("rec9".to_string()),
            case_number: Some("42".to_string()),
            incident_description: "Approved text".to_string(),
            ..CrimeReport::default()
        };
        let outcome = merge_report(&existing, &parse_update(&json!({ "crime_type": "theft" })));
        assert_eq!(outcome.report.record_id.as_deref(), Some("rec9"));
        assert_eq!(outcome.report.case_number.as_deref(), Some("42"));
        assert_eq!(outcome.report.incident_description, "Approved text");
    }

    #[test]
    fn unknown_and_malformed_keys_become_warnings() {
        let outcome = merge_report(
            &CrimeReport::default(),
            &parse_update(&json!({ "mood": "angry", "vehicles": 12 })),
        );
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[0].contains("mood"));
        assert!(outcome.warnings[1].contains("vehicles"));
        assert!(outcome.report.vehicles.is_empty());
    }
}
