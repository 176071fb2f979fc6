//! In-process backend for development and tests.
//!
//! Rows are kept in their flat column form so reads go through the same
//! codec as a real tabular backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use detective_report::codec::{FlatFields, from_fields, to_fields};
use detective_report_models::{CrimeReport, ReportField};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{ReportStore, StorageError, StoredRecord};

#[derive(Default)]
struct Table {
    rows: BTreeMap<String, FlatFields>,
    next_case_number: u64,
}

/// Keeps rows in memory and assigns sequential case numbers.
#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    /// Returns the number of stored rows.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn case_number_of(fields: &FlatFields) -> Option<String> {
    fields
        .get(ReportField::CaseNumber.as_ref())
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

#[async_trait]
impl ReportStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, record_id: &str) -> Result<Option<CrimeReport>, StorageError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .get(record_id)
            .map(|fields| from_fields(Some(record_id), fields)))
    }

    async fn create(&self, report: &CrimeReport) -> Result<StoredRecord, StorageError> {
        let mut table = self.table.write().await;
        table.next_case_number += 1;
        let case_number = table.next_case_number.to_string();
        let record_id = format!("rec{:014}", table.next_case_number);

        let mut fields = to_fields(report);
        fields.insert(
            ReportField::CaseNumber.to_string(),
            Value::String(case_number.clone()),
        );
        table.rows.insert(record_id.clone(), fields);

        Ok(StoredRecord {
            record_id,
            case_number: Some(case_number),
        })
    }

    async fn update(&self, record_id: &str, report: &CrimeReport) -> Result<StoredRecord, StorageError> {
        let mut table = self.table.write().await;
        let row = table
            .rows
            .get_mut(record_id)
            .ok_or_else(|| StorageError::NotFound {
                record_id: record_id.to_string(),
            })?;

        let case_number = case_number_of(row);
        *row = to_fields(report);
        if let Some(case_number) = &case_number {
            row.insert(
                ReportField::CaseNumber.to_string(),
                Value::String(case_number.clone()),
            );
        }

        Ok(StoredRecord {
            record_id: record_id.to_string(),
            case_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_identity() {
        let store = MemoryStore::default();
        let first = store.create(&CrimeReport::default()).await.unwrap();
        let second = store.create(&CrimeReport::default()).await.unwrap();

        assert_ne!(first.record_id, second.record_id);
        assert_eq!(first.case_number.as_deref(), Some("1"));
        assert_eq!(second.case_number.as_deref(), Some("2"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn update_keeps_case_number() {
        let store = MemoryStore::default();
        let created = store.create(&CrimeReport::default()).await.unwrap();

        let report = CrimeReport {
            crime_type: "burglary".to_string(),
            case_number: Some("999".to_string()),
            ..CrimeReport::default()
        };
        let updated = store.update(&created.record_id, &report).await.unwrap();
        assert_eq!(updated.case_number, created.case_number);

        let read = store.get(&created.record_id).await.unwrap().unwrap();
        assert_eq!(read.crime_type, "burglary");
        assert_eq!(read.case_number, created.case_number);
        assert_eq!(read.record_id.as_deref(), Some(created.record_id.as_str()));
    }

    #[tokio::test]
    async fn missing_records() {
        let store = MemoryStore::default();
        assert!(store.is_empty().await);
        assert!(store.get("recNope").await.unwrap().is_none());
        assert!(matches!(
            store.update("recNope", &CrimeReport::default()).await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
