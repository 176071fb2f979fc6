//! Human-readable rendering of a report.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};
use detective_report_models::{CrimeReport, SuspectTrait, is_not_available};
use strum::IntoEnumIterator as _;

use crate::codec::{format_witnesses, join_list};

fn label(field: SuspectTrait) -> &'static str {
    match field {
        SuspectTrait::Gender => "Suspect Gender",
        SuspectTrait::Age => "Suspect Age",
        SuspectTrait::Hair => "Hair",
        SuspectTrait::Clothing => "Clothing",
        SuspectTrait::Features => "Features",
        SuspectTrait::Height => "Height",
        SuspectTrait::Weight => "Weight",
        SuspectTrait::Tattoos => "Tattoos",
        SuspectTrait::Scars => "Scars",
        SuspectTrait::Accent => "Accent",
    }
}

/// Populated `(label, value)` lines of a report, case number first.
#[must_use]
pub fn summary_lines(report: &CrimeReport) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();
    let mut push = |label: &'static str, value: &str| {
        if !is_not_available(value) {
            lines.push((label, value.trim().to_string()));
        }
    };

    push("Case Number", report.case_number.as_deref().unwrap_or(""));
    push("Crime Type", &report.crime_type);
    push("When", &report.when_text);
    if let Some(at) = report.occurred_at {
        push("Occurred At", &at.to_rfc3339());
    }
    push("Location", &report.location_text);
    if !report.coordinates.is_unset() {
        push("Latitude", &report.coordinates.lat.to_string());
        push("Longitude", &report.coordinates.lng.to_string());
    }
    push("Vehicles", &join_list(&report.vehicles));
    for field in SuspectTrait::iter() {
        push(label(field), report.suspect.get(field));
    }
    push("Weapon", &report.weapon);
    push("Evidence Observations", &report.evidence_observations);
    push(
        "Evidence",
        &report
            .evidence
            .iter()
            .map(|a| a.url.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    push("Cameras", &join_list(&report.cameras));
    push("Injuries", &report.injuries);
    push("Property Damage", &report.property_damage);
    push("Weather", &report.weather);
    push("Witnesses", &format_witnesses(&report.witnesses));
    push("Incident Description", &report.incident_description);

    lines
}

/// Renders a Markdown summary with a generated-at footer.
#[must_use]
pub fn render_summary(report: &CrimeReport, brand: &str, generated_at: DateTime<FixedOffset>) -> String {
    let mut out = format!("# {brand} Crime Report\n\n");

    for (label, value) in summary_lines(report) {
        let value = value.replace('\n', "\n  ");
        let _ = writeln!(out, "- **{label}:** {value}");
    }

    let _ = write!(
        out,
        "\n_Report generated by {brand} on {}_\n",
        generated_at.format("%Y-%m-%d %H:%M %:z")
    );

    out
}

/// Drafts an incident description from the collected fields and the
/// reporter's own account, for the reporter to review before approval.
#[must_use]
pub fn draft_incident_description(report: &CrimeReport, raw_description: &str) -> String {
    let known = |value: &str| (!is_not_available(value)).then(|| value.replace('\n', "; "));

    let mut sentences = Vec::new();

    let what = known(&report.crime_type).unwrap_or_else(|| "An incident".to_string());
    let mut opening = what;
    if let Some(when) = known(&report.when_text) {
        let _ = write!(opening, " occurred {when}");
    } else {
        opening.push_str(" was reported");
    }
    if let Some(location) = known(&report.location_text) {
        let _ = write!(opening, " at {location}");
    }
    sentences.push(format!("{opening}."));

    let suspect = SuspectTrait::iter()
        .filter_map(|field| known(report.suspect.get(field)).map(|v| format!("{field}: {v}")))
        .collect::<Vec<_>>();
    if !suspect.is_empty() {
        sentences.push(format!("Suspect description: {}.", suspect.join(", ")));
    }
    if let Some(weapon) = known(&report.weapon) {
        sentences.push(format!("Weapon: {weapon}."));
    }
    if !report.vehicles.is_empty() {
        sentences.push(format!("Vehicles involved: {}.", report.vehicles.join(", ")));
    }
    if let Some(injuries) = known(&report.injuries) {
        sentences.push(format!("Injuries: {injuries}."));
    }
    if let Some(damage) = known(&report.property_damage) {
        sentences.push(format!("Property damage: {damage}."));
    }
    if !report.witnesses.is_empty() {
        sentences.push(format!("Witnesses: {}.", format_witnesses(&report.witnesses)));
    }

    let raw = raw_description.trim();
    if !raw.is_empty() {
        sentences.push(format!("Reporter's account: {raw}"));
    }

    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use detective_report_models::{Coordinates, Witness};

    fn report() -> CrimeReport {
        let mut report = CrimeReport {
            case_number: Some("1042".to_string()),
            crime_type: "theft".to_string(),
            when_text: "last night".to_string(),
            location_text: "100 Main St".to_string(),
            coordinates: Coordinates::new(29.42, -98.49),
            vehicles: vec!["Red truck".to_string()],
            witnesses: vec![Witness::new("Jane", Some("222-3333"))],
            ..CrimeReport::default()
        };
        report.suspect.hair = "black".to_string();
        report
    }

    #[test]
    fn lists_case_number_first_and_only_populated_fields() {
        let lines = summary_lines(&report());
        assert_eq!(lines[0], ("Case Number", "1042".to_string()));
        assert!(lines.iter().any(|(l, v)| *l == "Hair" && v == "black"));
        assert!(!lines.iter().any(|(l, _)| *l == "Weapon"));
        assert!(!lines.iter().any(|(l, _)| *l == "Cameras"));
    }

    #[test]
    fn renders_footer() {
        let generated = DateTime::parse_from_rfc3339("2024-03-10T12:30:00-06:00").unwrap();
        let text = render_summary(&report(), "Detective GPT", generated);
        assert!(text.starts_with("# Detective GPT Crime Report\n"));
        assert!(text.contains("- **Witnesses:** Jane (222-3333)\n"));
        assert!(text.ends_with("_Report generated by Detective GPT on 2024-03-10 12:30 -06:00_\n"));
    }

    #[test]
    fn drafts_description_from_fields() {
        let draft = draft_incident_description(&report(), "They took my bike.");
        assert!(draft.starts_with("theft occurred last night at 100 Main St."));
        assert!(draft.contains("Suspect description: hair: black."));
        assert!(draft.ends_with("Reporter's account: They took my bike."));
    }

    #[test]
    fn drafts_description_for_empty_report() {
        let draft = draft_incident_description(&CrimeReport::default(), "");
        assert_eq!(draft, "An incident was reported.");
    }
}
