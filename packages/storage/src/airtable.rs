//! Airtable REST backend.
//!
//! Rows live in one table. Creation posts `{records: [{fields}]}` and
//! updates patch `{fields}` on `/{record_id}`. `typecast` lets Airtable
//! coerce text into select and date columns. The `Case Number` column is
//! an autonumber computed by Airtable and is only ever read.
//!
//! See <https://airtable.com/developers/web/api/introduction>

use async_trait::async_trait;
use detective_report::codec::{FlatFields, from_fields, to_fields};
use detective_report_models::CrimeReport;
use serde_json::{Value, json};

use crate::{ReportStore, StorageError, StoredRecord};

const AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

/// Airtable table client authenticated with a personal access token.
pub struct AirtableStore {
    client: reqwest::Client,
    table_url: String,
    token: String,
}

impl AirtableStore {
    /// Creates a client for `table` in base `base_id`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_id: &str, table: &str, token: String) -> Self {
        Self::with_api_url(client, AIRTABLE_API_URL, base_id, table, token)
    }

    /// Creates a client against a custom API root.
    #[must_use]
    pub fn with_api_url(
        client: reqwest::Client,
        api_url: &str,
        base_id: &str,
        table: &str,
        token: String,
    ) -> Self {
        Self {
            client,
            table_url: format!("{}/{base_id}/{table}", api_url.trim_end_matches('/')),
            token,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, StorageError> {
        let resp = request.bearer_auth(&self.token).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: Value = resp.json().await?;
        if !status.is_success() {
            return Err(StorageError::Backend {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(Some(body))
    }
}

#[async_trait]
impl ReportStore for AirtableStore {
    fn name(&self) -> &'static str {
        "airtable"
    }

    async fn get(&self, record_id: &str) -> Result<Option<CrimeReport>, StorageError> {
        let url = format!("{}/{record_id}", self.table_url);
        let Some(body) = self.send(self.client.get(url)).await? else {
            return Ok(None);
        };

        let (id, fields) = parse_record(&body)?;
        Ok(Some(from_fields(Some(&id), &fields)))
    }

    async fn create(&self, report: &CrimeReport) -> Result<StoredRecord, StorageError> {
        let payload = json!({
            "records": [{ "fields": to_fields(report) }],
            "typecast": true,
        });
        let body = self
            .send(self.client.post(&self.table_url).json(&payload))
            .await?
            .ok_or_else(|| StorageError::Response {
                message: format!("table not found at {}", self.table_url),
            })?;

        let created = body["records"].get(0).ok_or_else(|| StorageError::Response {
            message: "create response has no records".to_string(),
        })?;
        stored_record(created)
    }

    async fn update(&self, record_id: &str, report: &CrimeReport) -> Result<StoredRecord, StorageError> {
        let url = format!("{}/{record_id}", self.table_url);
        let payload = json!({ "fields": to_fields(report), "typecast": true });
        let body = self
            .send(self.client.patch(url).json(&payload))
            .await?
            .ok_or_else(|| StorageError::NotFound {
                record_id: record_id.to_string(),
            })?;

        stored_record(&body)
    }
}

fn error_message(body: &Value) -> String {
    match &body["error"] {
        Value::String(kind) => kind.clone(),
        Value::Object(err) => err
            .get("message")
            .or_else(|| err.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
        _ => body.to_string(),
    }
}

fn parse_record(record: &Value) -> Result<(String, FlatFields), StorageError> {
    let id = record["id"]
        .as_str()
        .ok_or_else(|| StorageError::Response {
            message: "record has no id".to_string(),
        })?
        .to_string();
    let fields = record["fields"].as_object().cloned().unwrap_or_default();
    Ok((id, fields))
}

fn stored_record(record: &Value) -> Result<StoredRecord, StorageError> {
    let (record_id, fields) = parse_record(record)?;
    let case_number = from_fields(None, &fields).case_number;
    log::debug!("Airtable record {record_id} has case number {case_number:?}");
    Ok(StoredRecord {
        record_id,
        case_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_table_url() {
        let store = AirtableStore::with_api_url(
            reqwest::Client::new(),
            "http://localhost:9000/v0/",
            "appXYZ",
            "reports",
            "token".to_string(),
        );
        assert_eq!(store.table_url, "http://localhost:9000/v0/appXYZ/reports");
    }

    #[test]
    fn reads_case_number_from_record() {
        let record = json!({
            "id": "rec123",
            "createdTime": "2024-03-10T00:00:00.000Z",
            "fields": { "Case Number": 57, "Crime Type": "theft" }
        });
        assert_eq!(
            stored_record(&record).unwrap(),
            StoredRecord {
                record_id: "rec123".to_string(),
                case_number: Some("57".to_string()),
            }
        );
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(stored_record(&json!({ "fields": {} })).is_err());
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(
            error_message(&json!({ "error": { "type": "INVALID_VALUE", "message": "Bad column" } })),
            "Bad column"
        );
        assert_eq!(error_message(&json!({ "error": "NOT_AUTHORIZED" })), "NOT_AUTHORIZED");
    }
}
