#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime report data model shared across the detective workspace.
//!
//! [`CrimeReport`] is the single aggregate persisted per conversation.
//! [`ReportUpdate`] is the typed partial update extracted from an LLM tool
//! call: every member is optional, and `None` always means "no new
//! information" rather than "clear". Clearing is expressed with the
//! [`NOT_AVAILABLE`] marker (or an empty string).
//!
//! [`ReportField`] names the flat storage columns. Lists and witnesses are
//! only turned into delimited text at that boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The literal sentinel meaning "known to be empty/unknown".
pub const NOT_AVAILABLE: &str = "N/A";

/// Returns `true` if the value is empty or the [`NOT_AVAILABLE`] marker.
///
/// Comparison ignores surrounding whitespace and ASCII case, so `" n/a "`
/// counts as the marker.
#[must_use]
pub fn is_not_available(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE)
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// WGS84 coordinates of the incident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `true` for the `{0, 0}` placeholder used when no location
    /// has ever been verified.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// The individual traits of a suspect description.
///
/// Used to walk [`Suspect`] and [`SuspectUpdate`] exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SuspectTrait {
    /// Gender.
    Gender,
    /// Approximate age.
    Age,
    /// Hair colour/style.
    Hair,
    /// Clothing.
    Clothing,
    /// Other distinctive features.
    Features,
    /// Height.
    Height,
    /// Weight or build.
    Weight,
    /// Tattoos.
    Tattoos,
    /// Scars.
    Scars,
    /// Accent or speech.
    Accent,
}

/// Suspect description. Every trait defaults to [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Suspect {
    #[serde(default = "not_available")]
    pub gender: String,
    #[serde(default = "not_available")]
    pub age: String,
    #[serde(default = "not_available")]
    pub hair: String,
    #[serde(default = "not_available")]
    pub clothing: String,
    #[serde(default = "not_available")]
    pub features: String,
    #[serde(default = "not_available")]
    pub height: String,
    #[serde(default = "not_available")]
    pub weight: String,
    #[serde(default = "not_available")]
    pub tattoos: String,
    #[serde(default = "not_available")]
    pub scars: String,
    #[serde(default = "not_available")]
    pub accent: String,
}

impl Default for Suspect {
    fn default() -> Self {
        Self {
            gender: not_available(),
            age: not_available(),
            hair: not_available(),
            clothing: not_available(),
            features: not_available(),
            height: not_available(),
            weight: not_available(),
            tattoos: not_available(),
            scars: not_available(),
            accent: not_available(),
        }
    }
}

impl Suspect {
    /// Returns the value of one trait.
    #[must_use]
    pub fn get(&self, field: SuspectTrait) -> &str {
        match field {
            SuspectTrait::Gender => &self.gender,
            SuspectTrait::Age => &self.age,
            SuspectTrait::Hair => &self.hair,
            SuspectTrait::Clothing => &self.clothing,
            SuspectTrait::Features => &self.features,
            SuspectTrait::Height => &self.height,
            SuspectTrait::Weight => &self.weight,
            SuspectTrait::Tattoos => &self.tattoos,
            SuspectTrait::Scars => &self.scars,
            SuspectTrait::Accent => &self.accent,
        }
    }

    /// Returns a mutable reference to one trait.
    pub const fn get_mut(&mut self, field: SuspectTrait) -> &mut String {
        match field {
            SuspectTrait::Gender => &mut self.gender,
            SuspectTrait::Age => &mut self.age,
            SuspectTrait::Hair => &mut self.hair,
            SuspectTrait::Clothing => &mut self.clothing,
            SuspectTrait::Features => &mut self.features,
            SuspectTrait::Height => &mut self.height,
            SuspectTrait::Weight => &mut self.weight,
            SuspectTrait::Tattoos => &mut self.tattoos,
            SuspectTrait::Scars => &mut self.scars,
            SuspectTrait::Accent => &mut self.accent,
        }
    }
}

/// A witness with an optional contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Witness {
    /// Witness name as given by the reporter.
    pub name: String,
    /// Phone number, email, or other contact detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl Witness {
    /// Creates a witness, trimming both parts and normalizing an empty
    /// contact to `None`.
    #[must_use]
    pub fn new(name: impl AsRef<str>, contact: Option<&str>) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            contact: contact
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(ToString::to_string),
        }
    }

    /// Returns the contact, or an empty string if there is none.
    #[must_use]
    pub fn contact_or_empty(&self) -> &str {
        self.contact.as_deref().unwrap_or("")
    }
}

/// A reference to an uploaded evidence file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAttachment {
    /// Public URL of the file.
    pub url: String,
}

impl EvidenceAttachment {
    /// Creates an attachment reference.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// The single aggregate entity: one reported incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeReport {
    /// Storage-assigned record identifier; `None` while the report is new.
    pub record_id: Option<String>,
    /// Storage-assigned, human-facing case number.
    pub case_number: Option<String>,
    /// Crime type.
    pub crime_type: String,
    /// Free-form "when" as the reporter phrased it.
    pub when_text: String,
    /// `when_text` normalized to an instant, when it could be parsed.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Free-form location text (or the verified formatted address).
    pub location_text: String,
    /// Verified coordinates, `{0, 0}` if never verified.
    pub coordinates: Coordinates,
    /// Suspect description.
    pub suspect: Suspect,
    /// Vehicles involved.
    pub vehicles: Vec<String>,
    /// Cameras that may have recorded the incident.
    pub cameras: Vec<String>,
    /// Witnesses.
    pub witnesses: Vec<Witness>,
    /// Weapon used.
    pub weapon: String,
    /// Injuries.
    pub injuries: String,
    /// Property damage.
    pub property_damage: String,
    /// Weather at the time of the incident.
    pub weather: String,
    /// Textual observations about the evidence.
    pub evidence_observations: String,
    /// Attached evidence files.
    pub evidence: Vec<EvidenceAttachment>,
    /// Approved incident description.
    pub incident_description: String,
    /// Append-only transcript.
    pub conversation_log: String,
}

impl Default for CrimeReport {
    fn default() -> Self {
        Self {
            record_id: None,
            case_number: None,
            crime_type: not_available(),
            when_text: not_available(),
            occurred_at: None,
            location_text: not_available(),
            coordinates: Coordinates::default(),
            suspect: Suspect::default(),
            vehicles: Vec::new(),
            cameras: Vec::new(),
            witnesses: Vec::new(),
            weapon: not_available(),
            injuries: not_available(),
            property_damage: not_available(),
            weather: not_available(),
            evidence_observations: not_available(),
            evidence: Vec::new(),
            incident_description: not_available(),
            conversation_log: not_available(),
        }
    }
}

impl CrimeReport {
    /// Returns `true` if the report has not been persisted yet.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.record_id.is_none()
    }
}

/// Partial update of the suspect description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SuspectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clothing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tattoos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scars: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

impl SuspectUpdate {
    /// Returns the update for one trait.
    #[must_use]
    pub fn get(&self, field: SuspectTrait) -> Option<&str> {
        match field {
            SuspectTrait::Gender => self.gender.as_deref(),
            SuspectTrait::Age => self.age.as_deref(),
            SuspectTrait::Hair => self.hair.as_deref(),
            SuspectTrait::Clothing => self.clothing.as_deref(),
            SuspectTrait::Features => self.features.as_deref(),
            SuspectTrait::Height => self.height.as_deref(),
            SuspectTrait::Weight => self.weight.as_deref(),
            SuspectTrait::Tattoos => self.tattoos.as_deref(),
            SuspectTrait::Scars => self.scars.as_deref(),
            SuspectTrait::Accent => self.accent.as_deref(),
        }
    }

    /// Returns a mutable slot for one trait.
    pub const fn get_mut(&mut self, field: SuspectTrait) -> &mut Option<String> {
        match field {
            SuspectTrait::Gender => &mut self.gender,
            SuspectTrait::Age => &mut self.age,
            SuspectTrait::Hair => &mut self.hair,
            SuspectTrait::Clothing => &mut self.clothing,
            SuspectTrait::Features => &mut self.features,
            SuspectTrait::Height => &mut self.height,
            SuspectTrait::Weight => &mut self.weight,
            SuspectTrait::Tattoos => &mut self.tattoos,
            SuspectTrait::Scars => &mut self.scars,
            SuspectTrait::Accent => &mut self.accent,
        }
    }

    /// Returns `true` if no trait carries new information.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A typed partial update of a [`CrimeReport`].
///
/// `None` members mean "no new information". The incident description and
/// case number are not part of an update: the former is set through the
/// approval step, the latter by storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpdate {
    /// Crime type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crime_type: Option<String>,
    /// Free-form "when".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when_text: Option<String>,
    /// Free-form location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_text: Option<String>,
    /// Verified coordinates; only ever complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Suspect traits.
    #[serde(skip_serializing_if = "SuspectUpdate::is_empty")]
    pub suspect: SuspectUpdate,
    /// Vehicles to add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicles: Option<Vec<String>>,
    /// Cameras to add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cameras: Option<Vec<String>>,
    /// Witnesses to add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witnesses: Option<Vec<Witness>>,
    /// Weapon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    /// Injuries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injuries: Option<String>,
    /// Property damage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_damage: Option<String>,
    /// Weather.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    /// Evidence observations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_observations: Option<String>,
    /// Evidence attachments to append.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<EvidenceAttachment>>,
    /// Transcript text to append.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_log: Option<String>,
    /// Keys present in the raw payload that name no known field.
    #[serde(skip)]
    pub unknown_fields: Vec<String>,
    /// Known keys whose value had an unusable shape and were ignored.
    #[serde(skip)]
    pub malformed_fields: Vec<String>,
}

impl ReportUpdate {
    /// Returns a mutable reference to every free-text value in the update
    /// that a human wrote: scalars, suspect traits, list entries, and
    /// witness names/contacts. URLs and coordinates are excluded.
    pub fn free_text_mut(&mut self) -> Vec<&mut String> {
        let mut out: Vec<&mut String> = Vec::new();

        for scalar in [
            &mut self.crime_type,
            &mut self.when_text,
            &mut self.location_text,
            &mut self.weapon,
            &mut self.injuries,
            &mut self.property_damage,
            &mut self.weather,
            &mut self.evidence_observations,
        ] {
            if let Some(value) = scalar {
                out.push(value);
            }
        }

        let SuspectUpdate {
            gender,
            age,
            hair,
            clothing,
            features,
            height,
            weight,
            tattoos,
            scars,
            accent,
        } = &mut self.suspect;
        for value in [
            gender, age, hair, clothing, features, height, weight, tattoos, scars, accent,
        ]
        .into_iter()
        .flatten()
        {
            out.push(value);
        }

        for list in [&mut self.vehicles, &mut self.cameras]
            .into_iter()
            .flatten()
        {
            out.extend(list);
        }

        if let Some(witnesses) = self.witnesses.as_mut() {
            for witness in witnesses {
                out.push(&mut witness.name);
                if let Some(contact) = witness.contact.as_mut() {
                    out.push(contact);
                }
            }
        }

        out
    }

    /// Returns `true` if the update carries no information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let mut bare = self.clone();
        bare.unknown_fields.clear();
        bare.malformed_fields.clear();
        bare == Self::default()
    }
}

/// Flat storage columns of a persisted report.
///
/// The `Display` form is the column name in the tabular backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter, EnumString,
)]
pub enum ReportField {
    /// Crime type.
    #[strum(serialize = "Crime Type")]
    CrimeType,
    /// Free-form "when".
    #[strum(serialize = "Datetime")]
    When,
    /// Normalized incident instant (RFC 3339).
    #[strum(serialize = "Occurred At")]
    OccurredAt,
    /// Location text.
    #[strum(serialize = "Location")]
    Location,
    /// Latitude.
    #[strum(serialize = "Latitude")]
    Latitude,
    /// Longitude.
    #[strum(serialize = "Longitude")]
    Longitude,
    /// Suspect gender.
    #[strum(serialize = "Suspect Gender")]
    SuspectGender,
    /// Suspect age.
    #[strum(serialize = "Suspect Age")]
    SuspectAge,
    /// Suspect hair.
    #[strum(serialize = "Suspect Hair")]
    SuspectHair,
    /// Suspect clothing.
    #[strum(serialize = "Suspect Clothing")]
    SuspectClothing,
    /// Suspect features.
    #[strum(serialize = "Suspect Features")]
    SuspectFeatures,
    /// Suspect height.
    #[strum(serialize = "Suspect Height")]
    SuspectHeight,
    /// Suspect weight.
    #[strum(serialize = "Suspect Weight")]
    SuspectWeight,
    /// Suspect tattoos.
    #[strum(serialize = "Suspect Tattoos")]
    SuspectTattoos,
    /// Suspect scars.
    #[strum(serialize = "Suspect Scars")]
    SuspectScars,
    /// Suspect accent.
    #[strum(serialize = "Suspect Accent")]
    SuspectAccent,
    /// Comma-joined vehicles.
    #[strum(serialize = "Vehicles")]
    Vehicles,
    /// Comma-joined cameras.
    #[strum(serialize = "Cameras")]
    Cameras,
    /// `"Name (contact); Name2"` witnesses.
    #[strum(serialize = "Witnesses")]
    Witnesses,
    /// Weapon.
    #[strum(serialize = "Weapon")]
    Weapon,
    /// Injuries.
    #[strum(serialize = "Injuries")]
    Injuries,
    /// Property damage.
    #[strum(serialize = "Property Damage")]
    PropertyDamage,
    /// Weather.
    #[strum(serialize = "Weather")]
    Weather,
    /// Evidence observations.
    #[strum(serialize = "Evidence Observations")]
    EvidenceObservations,
    /// Attachment list of `{url}` objects.
    #[strum(serialize = "Evidence")]
    Evidence,
    /// Approved incident description.
    #[strum(serialize = "Incident Description")]
    IncidentDescription,
    /// Append-only transcript.
    #[strum(serialize = "Conversation Log")]
    ConversationLog,
    /// Storage-assigned case number.
    #[strum(serialize = "Case Number")]
    CaseNumber,
}

impl ReportField {
    /// Returns `true` for columns computed by the storage backend that the
    /// application must never write.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::CaseNumber)
    }

    /// Returns the column holding one suspect trait.
    #[must_use]
    pub const fn for_suspect(field: SuspectTrait) -> Self {
        match field {
            SuspectTrait::Gender => Self::SuspectGender,
            SuspectTrait::Age => Self::SuspectAge,
            SuspectTrait::Hair => Self::SuspectHair,
            SuspectTrait::Clothing => Self::SuspectClothing,
            SuspectTrait::Features => Self::SuspectFeatures,
            SuspectTrait::Height => Self::SuspectHeight,
            SuspectTrait::Weight => Self::SuspectWeight,
            SuspectTrait::Tattoos => Self::SuspectTattoos,
            SuspectTrait::Scars => Self::SuspectScars,
            SuspectTrait::Accent => Self::SuspectAccent,
        }
    }
}
