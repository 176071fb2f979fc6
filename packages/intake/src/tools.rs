//! LLM tool definitions and their executor.
//!
//! The executor is bound to one conversation: it remembers the record id
//! of the conversation's report so the first successful update creates the
//! row and later ones read-merge-write it.

use std::sync::Arc;

use async_trait::async_trait;
use detective_ai::AiError;
use detective_ai::agent::ToolExecutor;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::service::ReportService;

/// Merge new facts into the report.
pub const UPDATE_CRIME_REPORT: &str = "update_crime_report";

/// Draft an incident description for the reporter to review.
pub const SUMMARIZE_INCIDENT_DESCRIPTION: &str = "summarize_incident_description";

/// Store the description the reporter approved.
pub const APPROVE_INCIDENT_DESCRIPTION: &str = "approve_incident_description";

/// The only failure text a reporter ever sees.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while saving the report. Please try again.";

fn text_property(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn list_property(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

/// Returns the tool definitions as `{name, description, parameters}`.
#[must_use]
pub fn tool_definitions() -> Vec<Value> {
    let clear = "Use \"N/A\" to clear a value the reporter retracted. Omit anything not mentioned.";

    vec![
        json!({
            "name": UPDATE_CRIME_REPORT,
            "description": format!(
                "Record new facts about the incident. Send only fields with new information. {clear}"
            ),
            "parameters": {
                "type": "object",
                "properties": {
                    "crime_type": text_property("Kind of crime, e.g. burglary, vehicle theft"),
                    "datetime": text_property("When it happened, in the reporter's words or as a date"),
                    "location": text_property("Where it happened: address, intersection or landmark"),
                    "suspect": {
                        "type": "object",
                        "properties": {
                            "gender": text_property("Gender"),
                            "age": text_property("Approximate age"),
                            "hair": text_property("Hair"),
                            "clothing": text_property("Clothing"),
                            "features": text_property("Distinguishing features"),
                            "height": text_property("Height"),
                            "weight": text_property("Weight or build"),
                            "tattoos": text_property("Tattoos"),
                            "scars": text_property("Scars"),
                            "accent": text_property("Accent or language spoken"),
                        },
                    },
                    "vehicles": list_property("Vehicles involved: make, model, color, plate"),
                    "cameras": list_property("Cameras that may have recorded the incident"),
                    "witnesses": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": text_property("Witness name"),
                                "contact": text_property("Phone or email"),
                            },
                            "required": ["name"],
                        },
                    },
                    "weapon": text_property("Weapon used"),
                    "injuries": text_property("Injuries"),
                    "property_damage": text_property("Property damage or items taken"),
                    "evidence_observations": text_property("What the reporter observed about evidence"),
                    "evidence": list_property("URLs of uploaded evidence files"),
                },
            },
        }),
        json!({
            "name": SUMMARIZE_INCIDENT_DESCRIPTION,
            "description": "Draft an incident description from the report and the reporter's own account. Show the draft to the reporter for approval.",
            "parameters": {
                "type": "object",
                "properties": {
                    "raw_description": text_property("The reporter's account of what happened"),
                },
                "required": ["raw_description"],
            },
        }),
        json!({
            "name": APPROVE_INCIDENT_DESCRIPTION,
            "description": "Save the incident description once the reporter has approved it. Replaces any previous description.",
            "parameters": {
                "type": "object",
                "properties": {
                    "final_summary": text_property("The approved description"),
                },
                "required": ["final_summary"],
            },
        }),
    ]
}

/// Runs report tools for one conversation.
pub struct ReportToolExecutor {
    service: Arc<ReportService>,
    record_id: Mutex<Option<String>>,
}

impl ReportToolExecutor {
    /// Binds the tools to a conversation whose report may already exist.
    #[must_use]
    pub fn new(service: Arc<ReportService>, record_id: Option<String>) -> Self {
        Self {
            service,
            record_id: Mutex::new(record_id),
        }
    }

    /// The conversation's record id after the tools ran.
    pub async fn record_id(&self) -> Option<String> {
        self.record_id.lock().await.clone()
    }

    async fn update(&self, input: &Value) -> Value {
        let mut record_id = self.record_id.lock().await;
        match self.service.update_report(record_id.as_deref(), input).await {
            Ok(response) => {
                *record_id = Some(response.record_id.clone());
                serde_json::to_value(response).unwrap_or_else(|_| failure())
            }
            Err(e) => {
                log::error!("update_crime_report failed: {e}");
                failure()
            }
        }
    }

    async fn summarize_description(&self, input: &Value) -> Value {
        let Some(raw) = string_argument(input, "raw_description") else {
            return missing_argument("raw_description");
        };

        let record_id = self.record_id.lock().await.clone();
        match self.service.draft_description(record_id.as_deref(), &raw).await {
            Ok(draft) => json!({
                "success": true,
                "message": "Draft ready for the reporter to review.",
                "draft": draft,
            }),
            Err(e) => {
                log::error!("summarize_incident_description failed: {e}");
                failure()
            }
        }
    }

    async fn approve_description(&self, input: &Value) -> Value {
        let Some(summary) = string_argument(input, "final_summary") else {
            return missing_argument("final_summary");
        };

        let mut record_id = self.record_id.lock().await;
        match self.service.approve_description(record_id.as_deref(), &summary).await {
            Ok(stored) => {
                *record_id = Some(stored.record_id.clone());
                json!({
                    "success": true,
                    "message": "Incident description approved and saved.",
                    "recordId": stored.record_id,
                    "caseNumber": stored.case_number,
                })
            }
            Err(e) => {
                log::error!("approve_incident_description failed: {e}");
                failure()
            }
        }
    }
}

fn failure() -> Value {
    json!({ "success": false, "message": GENERIC_FAILURE_MESSAGE })
}

fn missing_argument(name: &str) -> Value {
    json!({ "success": false, "message": format!("Missing required argument '{name}'.") })
}

/// Reads a string argument from decoded or still-serialized arguments.
fn string_argument(input: &Value, name: &str) -> Option<String> {
    let decoded;
    let input = match input {
        Value::String(raw) => {
            decoded = serde_json::from_str::<Value>(raw).ok()?;
            &decoded
        }
        other => other,
    };

    input[name]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[async_trait]
impl ToolExecutor for ReportToolExecutor {
    fn definitions(&self) -> Vec<Value> {
        tool_definitions()
    }

    async fn execute(&self, name: &str, input: &Value) -> Result<Value, AiError> {
        match name {
            UPDATE_CRIME_REPORT => Ok(self.update(input).await),
            SUMMARIZE_INCIDENT_DESCRIPTION => Ok(self.summarize_description(input).await),
            APPROVE_INCIDENT_DESCRIPTION => Ok(self.approve_description(input).await),
            other => Err(AiError::ToolExecution {
                message: format!("No matching function found: {other}"),
            }),
        }
    }

    fn summarize(&self, name: &str, result: &Value) -> String {
        let message = result["message"].as_str().unwrap_or("Done");
        match (name, result["updatedFields"].as_array()) {
            (UPDATE_CRIME_REPORT, Some(fields)) => format!("{message} ({} field(s) changed)", fields.len()),
            _ => message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use detective_ai::agent::answer;
    use detective_ai::providers::{ContentBlock, LlmProvider, LlmResponse, Message, StopReason};

    use super::*;
    use crate::fakes::{FakeGeocoder, FakeTranslator, harness};

    #[test]
    fn defines_three_tools() {
        let names: Vec<_> = tool_definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                UPDATE_CRIME_REPORT,
                SUMMARIZE_INCIDENT_DESCRIPTION,
                APPROVE_INCIDENT_DESCRIPTION
            ]
        );
        for tool in tool_definitions() {
            assert_eq!(tool["parameters"]["type"], "object");
        }
    }

    #[tokio::test]
    async fn remembers_record_between_calls() {
        let h = harness(FakeGeocoder::default(), FakeTranslator::default());
        let tools = ReportToolExecutor::new(h.service.clone(), None);

        let first = tools
            .execute(UPDATE_CRIME_REPORT, &json!({ "crime_type": "theft" }))
            .await
            .unwrap();
        let record_id = first["recordId"].as_str().unwrap().to_string();
        assert_eq!(tools.record_id().await.as_deref(), Some(record_id.as_str()));

        let second = tools
            .execute(UPDATE_CRIME_REPORT, &json!({ "weapon": "none" }))
            .await
            .unwrap();
        assert_eq!(second["recordId"], record_id.as_str());
        assert_eq!(h.store.len().await, 1);
        assert_eq!(
            tools.summarize(UPDATE_CRIME_REPORT, &second),
            "Crime report updated and saved. (1 field(s) changed)"
        );
    }

    #[tokio::test]
    async fn approval_creates_report_when_none_exists() {
        let h = harness(FakeGeocoder::default(), FakeTranslator::default());
        let tools = ReportToolExecutor::new(h.service.clone(), None);

        let result = tools
            .execute(
                APPROVE_INCIDENT_DESCRIPTION,
                &json!("{\"final_summary\":\"A bike was stolen.\"}"),
            )
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert!(tools.record_id().await.is_some());
    }

    #[tokio::test]
    async fn rejects_missing_arguments_and_unknown_tools() {
        let h = harness(FakeGeocoder::default(), FakeTranslator::default());
        let tools = ReportToolExecutor::new(h.service.clone(), None);

        let missing = tools
            .execute(SUMMARIZE_INCIDENT_DESCRIPTION, &json!({ "raw_description": "  " }))
            .await
            .unwrap();
        assert_eq!(missing["success"], false);
        assert!(h.store.is_empty().await);

        assert!(matches!(
            tools.execute("draw_sketch", &json!({})).await,
            Err(AiError::ToolExecution { .. })
        ));
    }

    struct OneToolCall {
        replies: StdMutex<Vec<LlmResponse>>,
    }

    #[async_trait]
    impl LlmProvider for OneToolCall {
        async fn chat(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            tools: &[Value],
        ) -> Result<LlmResponse, AiError> {
            assert_eq!(tools.len(), 3);
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn agent_turn_persists_report() {
        let h = harness(FakeGeocoder::default(), FakeTranslator::default());
        let tools = ReportToolExecutor::new(h.service.clone(), None);
        let provider = OneToolCall {
            replies: StdMutex::new(vec![
                LlmResponse {
                    content: vec![ContentBlock::ToolUse {
                        id: "call_1".to_string(),
                        name: UPDATE_CRIME_REPORT.to_string(),
                        input: json!({ "crime_type": "robo" }),
                    }],
                    stop_reason: StopReason::ToolUse,
                },
                LlmResponse {
                    content: vec![ContentBlock::Text {
                        text: "Got it. Where did it happen?".to_string(),
                    }],
                    stop_reason: StopReason::EndTurn,
                },
            ]),
        };

        let (messages, result) =
            answer(&provider, &tools, "prompt", vec![], "Hubo un robo").await;

        assert_eq!(result.unwrap(), "Got it. Where did it happen?");
        assert_eq!(messages.len(), 4);

        let record_id = tools.record_id().await.unwrap();
        let report = h.service.get_report(&record_id).await.unwrap().unwrap();
        assert_eq!(report.crime_type, "robbery");
    }
}
