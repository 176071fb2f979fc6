//! Keypad menu for recorded statements.
//!
//! The menu webhook is re-entered after each step: first without digits
//! (welcome), then with the pressed key, and finally with the URL of the
//! finished recording.

use crate::twiml::{Record, Response};
use crate::{TelephonyError, VoiceRequest, webhook_url};

/// Path of the menu webhook.
pub const VOICE_PATH: &str = "/api/twilio/voice";

/// Seconds to wait for a keypress.
const GATHER_TIMEOUT_SECS: u32 = 5;

/// What the menu does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Greet the caller and wait for a key.
    Welcome,
    /// Record a statement.
    RecordStatement,
    /// Connect the caller to a person.
    ConnectAgent,
    /// Unknown key; start over.
    Invalid,
    /// A statement was recorded and must be transcribed.
    RecordingFinished {
        /// Recording URL without extension.
        recording_url: String,
        /// Call the recording belongs to.
        call_sid: String,
    },
}

/// Picks the next menu step from the webhook fields.
///
/// # Errors
///
/// Returns [`TelephonyError::MissingCallSid`] if a recording arrives
/// without a call id.
pub fn route(request: &VoiceRequest) -> Result<MenuAction, TelephonyError> {
    if let Some(recording_url) = request.recording_url.as_deref().filter(|u| !u.is_empty()) {
        let call_sid = request
            .call_sid
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(TelephonyError::MissingCallSid)?;
        return Ok(MenuAction::RecordingFinished {
            recording_url: recording_url.to_string(),
            call_sid: call_sid.to_string(),
        });
    }

    Ok(match request.digits.as_deref().map(str::trim) {
        None | Some("") => MenuAction::Welcome,
        Some("1") => MenuAction::RecordStatement,
        Some("2") => MenuAction::ConnectAgent,
        Some(other) => {
            log::debug!("Invalid menu input '{other}'");
            MenuAction::Invalid
        }
    })
}

/// Renders the markup for a menu step.
#[must_use]
pub fn render(action: &MenuAction, brand_name: &str, base_url: &str, agent_number: Option<&str>) -> String {
    let menu = webhook_url(base_url, VOICE_PATH);

    let response = match action {
        MenuAction::Welcome => Response::new()
            .say(format!(
                "Welcome to {brand_name}. Press 1 to record a statement. Press 2 to talk to an agent."
            ))
            .gather(menu, 1, GATHER_TIMEOUT_SECS),
        MenuAction::RecordStatement => Response::new()
            .say("Please leave your statement after the tone. Press pound when done, or wait for the time limit.")
            .record(Record::new(menu)),
        MenuAction::ConnectAgent => match agent_number.filter(|n| !n.is_empty()) {
            Some(number) => Response::new().say("Connecting you to an agent now.").dial(number),
            None => {
                log::warn!("AGENT_PHONE_NUMBER not set; cannot connect caller");
                Response::new()
                    .say("No agent is available right now. Please record a statement instead.")
                    .redirect(menu)
            }
        },
        MenuAction::Invalid => Response::new()
            .say("Invalid input. Please try again.")
            .redirect(menu),
        MenuAction::RecordingFinished { .. } => Response::new()
            .say("Thanks for your recording. We are processing it now. Goodbye.")
            .hangup(),
    };
    response.to_xml()
}

/// Markup returned when a menu step fails.
#[must_use]
pub fn error_response() -> String {
    Response::new()
        .say("Sorry, there was an error. Please try again later.")
        .hangup()
        .to_xml()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(digits: Option<&str>, recording_url: Option<&str>, call_sid: Option<&str>) -> VoiceRequest {
        VoiceRequest {
            call_sid: call_sid.map(ToString::to_string),
            call_status: None,
            digits: digits.map(ToString::to_string),
            recording_url: recording_url.map(ToString::to_string),
        }
    }

    #[test]
    fn routes_keys() {
        assert_eq!(route(&request(None, None, Some("CA1"))).unwrap(), MenuAction::Welcome);
        assert_eq!(route(&request(Some(""), None, None)).unwrap(), MenuAction::Welcome);
        assert_eq!(
            route(&request(Some("1"), None, None)).unwrap(),
            MenuAction::RecordStatement
        );
        assert_eq!(
            route(&request(Some("2"), None, None)).unwrap(),
            MenuAction::ConnectAgent
        );
        assert_eq!(route(&request(Some("9"), None, None)).unwrap(), MenuAction::Invalid);
    }

    #[test]
    fn recording_takes_precedence_over_digits() {
        let action = route(&request(Some("hangup"), Some("https://host/RE1"), Some("CA1"))).unwrap();
        assert_eq!(
            action,
            MenuAction::RecordingFinished {
                recording_url: "https://host/RE1".to_string(),
                call_sid: "CA1".to_string(),
            }
        );
    }

    #[test]
    fn recording_without_call_is_an_error() {
        assert!(matches!(
            route(&request(None, Some("https://host/RE1"), None)),
            Err(TelephonyError::MissingCallSid)
        ));
    }

    #[test]
    fn welcome_gathers_one_digit() {
        let xml = render(&MenuAction::Welcome, "BCSO TIPS", "", None);
        assert!(xml.contains("Welcome to BCSO TIPS."));
        assert!(xml.contains(r#"<Gather action="/api/twilio/voice" method="POST" timeout="5" numDigits="1"/>"#));
    }

    #[test]
    fn record_posts_back_to_menu() {
        let xml = render(&MenuAction::RecordStatement, "BCSO TIPS", "https://tips.example.org", None);
        assert!(xml.contains(r#"<Record action="https://tips.example.org/api/twilio/voice""#));
        assert!(xml.contains(r#"maxLength="60""#));
    }

    #[test]
    fn dials_agent_or_returns_to_menu() {
        let xml = render(&MenuAction::ConnectAgent, "BCSO TIPS", "", Some("+12105550100"));
        assert!(xml.contains("<Dial>+12105550100</Dial>"));

        let xml = render(&MenuAction::ConnectAgent, "BCSO TIPS", "", None);
        assert!(!xml.contains("<Dial>"));
        assert!(xml.contains("<Redirect"));
    }

    #[test]
    fn finished_recording_hangs_up() {
        let action = MenuAction::RecordingFinished {
            recording_url: "u".to_string(),
            call_sid: "c".to_string(),
        };
        assert!(render(&action, "BCSO TIPS", "", None).ends_with("<Hangup/></Response>"));
        assert!(error_response().contains("Sorry, there was an error."));
    }
}
