//! Lenient parsing of `update_crime_report` tool arguments.
//!
//! The LLM is not a reliable JSON producer. Keys arrive in snake or camel
//! case, lists arrive as delimited strings, and singular `vehicle`,
//! `camera` and `witness` keys show up next to their plural forms. Parsing
//! never fails: a value with an unusable shape is dropped and its key is
//! recorded in [`ReportUpdate::malformed_fields`], and keys that name no
//! field are recorded in [`ReportUpdate::unknown_fields`].

use detective_report_models::{
    Coordinates, EvidenceAttachment, ReportUpdate, SuspectTrait, SuspectUpdate, Witness,
};
use serde_json::{Map, Value};
use strum::IntoEnumIterator as _;

use crate::codec::{parse_list, parse_witness, parse_witnesses, split_urls};

/// Parses the raw JSON argument string of a tool call.
///
/// Invalid JSON yields an empty update flagged as malformed.
#[must_use]
pub fn parse_update_str(arguments: &str) -> ReportUpdate {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value) => parse_update(&value),
        Err(e) => {
            log::warn!("update_crime_report arguments are not valid JSON: {e}");
            ReportUpdate {
                malformed_fields: vec!["arguments".to_string()],
                ..ReportUpdate::default()
            }
        }
    }
}

/// Parses decoded tool arguments into a typed update.
#[must_use]
pub fn parse_update(arguments: &Value) -> ReportUpdate {
    let mut update = ReportUpdate::default();

    let Some(object) = arguments.as_object() else {
        update.malformed_fields.push("arguments".to_string());
        return update;
    };

    let mut singular_vehicles = Vec::new();
    let mut singular_cameras = Vec::new();
    let mut singular_witnesses = Vec::new();

    for (key, value) in object {
        if value.is_null() {
            continue;
        }

        let ok = match key.as_str() {
            "crime_type" | "crimeType" => set_scalar(&mut update.crime_type, value),
            "datetime" | "when" | "when_text" | "whenText" => {
                set_scalar(&mut update.when_text, value)
            }
            "location" | "location_text" | "locationText" => {
                set_scalar(&mut update.location_text, value)
            }
            "coordinates" => parse_coordinates(value).map(|c| update.coordinates = c),
            "suspect" => {
                parse_suspect(value, &mut update.unknown_fields).map(|s| update.suspect = s)
            }
            "vehicles" => set_list(&mut update.vehicles, value),
            "cameras" => set_list(&mut update.cameras, value),
            "witnesses" => set_witnesses(&mut update.witnesses, value),
            "vehicle" => string_list(value).map(|items| singular_vehicles.extend(items)),
            "camera" => string_list(value).map(|items| singular_cameras.extend(items)),
            "witness" => witness_list(value).map(|items| singular_witnesses.extend(items)),
            "weapon" => set_scalar(&mut update.weapon, value),
            "injuries" => set_scalar(&mut update.injuries, value),
            "property_damage" | "propertyDamage" => {
                set_scalar(&mut update.property_damage, value)
            }
            "weather" => set_scalar(&mut update.weather, value),
            "evidence_observations" | "evidenceObservations" => {
                set_scalar(&mut update.evidence_observations, value)
            }
            "evidence" => evidence_list(value).map(|e| update.evidence = Some(e)),
            "conversation_log" | "conversationLog" => {
                set_scalar(&mut update.conversation_log, value)
            }
            _ => {
                update.unknown_fields.push(key.clone());
                Some(())
            }
        };

        if ok.is_none() {
            log::debug!("Ignoring malformed update value for '{key}': {value}");
            update.malformed_fields.push(key.clone());
        }
    }

    unify(&mut update.vehicles, singular_vehicles);
    unify(&mut update.cameras, singular_cameras);
    unify(&mut update.witnesses, singular_witnesses);

    update
}

/// Appends singular entries to the plural list, creating it if needed.
fn unify<T>(list: &mut Option<Vec<T>>, singular: Vec<T>) {
    if singular.is_empty() {
        return;
    }
    list.get_or_insert_with(Vec::new).extend(singular);
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn set_scalar(slot: &mut Option<String>, value: &Value) -> Option<()> {
    *slot = Some(scalar_text(value)?);
    Some(())
}

fn set_list(slot: &mut Option<Vec<String>>, value: &Value) -> Option<()> {
    let items = string_list(value)?;
    slot.get_or_insert_with(Vec::new).extend(items);
    Some(())
}

fn set_witnesses(slot: &mut Option<Vec<Witness>>, value: &Value) -> Option<()> {
    let items = witness_list(value)?;
    slot.get_or_insert_with(Vec::new).extend(items);
    Some(())
}

/// Accepts `["a", "b"]` or `"a, b"`. Non-string array items are skipped.
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(parse_list(s)),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .flat_map(|item| parse_list(&item))
                .collect(),
        ),
        _ => None,
    }
}

/// Accepts a witness object, a `"Name (contact)"` string, an array of
/// either, or the serialized `"A (x); B"` form.
fn witness_list(value: &Value) -> Option<Vec<Witness>> {
    match value {
        Value::String(s) => Some(parse_witnesses(s)),
        Value::Object(obj) => Some(witness_object(obj).into_iter().collect()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => parse_witness(s),
                    Value::Object(obj) => witness_object(obj),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn witness_object(obj: &Map<String, Value>) -> Option<Witness> {
    let name = obj.get("name").and_then(scalar_text).unwrap_or_default();
    let contact = obj
        .get("contact")
        .or_else(|| obj.get("phone"))
        .and_then(scalar_text);

    if name.is_empty() && contact.as_deref().is_none_or(str::is_empty) {
        return None;
    }
    Some(Witness::new(name, contact.as_deref()))
}

/// Accepts an array of `{url}` objects or URL strings, or a delimited
/// string of URLs.
fn evidence_list(value: &Value) -> Option<Vec<EvidenceAttachment>> {
    match value {
        Value::String(s) => Some(split_urls(s)),
        Value::Array(items) => Some(
            items
                .iter()
                .flat_map(|item| match item {
                    Value::String(s) => split_urls(s),
                    Value::Object(obj) => obj
                        .get("url")
                        .and_then(Value::as_str)
                        .map(split_urls)
                        .unwrap_or_default(),
                    _ => Vec::new(),
                })
                .collect(),
        ),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Only a complete `{lat, lng}` pair counts. A partial pair is treated as
/// absent, and a non-object is malformed.
fn parse_coordinates(value: &Value) -> Option<Option<Coordinates>> {
    let obj = value.as_object()?;
    let lat = obj.get("lat").or_else(|| obj.get("latitude")).and_then(number);
    let lng = obj
        .get("lng")
        .or_else(|| obj.get("lon"))
        .or_else(|| obj.get("longitude"))
        .and_then(number);
    Some(lat.zip(lng).map(|(lat, lng)| Coordinates::new(lat, lng)))
}

/// Reads the known suspect traits. Other keys are reported as
/// `suspect.<key>` in `unknown`.
fn parse_suspect(value: &Value, unknown: &mut Vec<String>) -> Option<SuspectUpdate> {
    let obj = value.as_object()?;
    let mut suspect = SuspectUpdate::default();
    for field in SuspectTrait::iter() {
        if let Some(text) = obj.get(field.as_ref()).and_then(scalar_text) {
            *suspect.get_mut(field) = Some(text);
        }
    }
    unknown.extend(
        obj.keys()
            .filter(|key| !SuspectTrait::iter().any(|field| field.as_ref() == key.as_str()))
            .map(|key| format!("suspect.{key}")),
    );
    Some(suspect)
}
