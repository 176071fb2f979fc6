//! System prompt for the intake assistant.

use chrono::{DateTime, Utc};

use crate::AgencyConfig;
use crate::tools::{APPROVE_INCIDENT_DESCRIPTION, SUMMARIZE_INCIDENT_DESCRIPTION, UPDATE_CRIME_REPORT};

/// Builds the system prompt for a conversation.
#[must_use]
pub fn system_prompt(agency: &AgencyConfig, now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&agency.offset());

    format!(
        r#"You are the {brand} crime tip assistant. You help people report crimes anonymously in {city} and {county}.

## Instructions
1. Ask short, calm questions one at a time: what happened, when, where, who was involved, vehicles, weapons, injuries, damage, witnesses, cameras and evidence.
2. Every time the reporter gives a new fact, call {update} with only the new facts. Never resend facts you already recorded.
3. If the reporter corrects a fact, send the corrected value. If they retract one, send "N/A".
4. If {update} returns locationCandidates, ask the reporter which place they meant and send the chosen address as the location.
5. When the story is complete, call {summarize} with the reporter's account, show the draft, and call {approve} once they agree.
6. Reply in the reporter's language. Never promise a police response time and never ask for the reporter's identity.
7. Today is {today} (local time {time}). Interpret relative dates against it."#,
        brand = agency.brand_name,
        city = agency.fallback_city,
        county = agency.fallback_county,
        update = UPDATE_CRIME_REPORT,
        summarize = SUMMARIZE_INCIDENT_DESCRIPTION,
        approve = APPROVE_INCIDENT_DESCRIPTION,
        today = local.format("%A, %B %-d, %Y"),
        time = local.format("%H:%M"),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn names_agency_tools_and_local_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 3, 30, 0).unwrap();
        let prompt = system_prompt(&AgencyConfig::embedded(), now);

        assert!(prompt.starts_with("You are the BCSO TIPS crime tip assistant."));
        assert!(prompt.contains(UPDATE_CRIME_REPORT));
        assert!(prompt.contains(APPROVE_INCIDENT_DESCRIPTION));
        // 03:30 UTC is still the previous evening at UTC-6
        assert!(prompt.contains("Saturday, March 9, 2024"));
        assert!(prompt.contains("21:30"));
    }
}
