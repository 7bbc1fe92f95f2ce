//! Therapy session records
//!
//! A session stores the submitted form verbatim and, alongside it, one flat
//! ABC row per antecedent/behavior/consequence entry. The ABC rows are always
//! rebuilt from the form; updates replace the whole set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::clients;
use crate::db::models::{SessionAbc, SessionStatus, TherapySession};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::store::Store;

/// Qualitative rating of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valuation {
    Good,
    Fair,
    Poor,
}

impl Valuation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Valuation::Good => "good",
            Valuation::Fair => "fair",
            Valuation::Poor => "poor",
        }
    }
}

/// One antecedent with the behaviors it provoked and the responses applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbcEntry {
    #[serde(default)]
    pub antecedent: String,
    #[serde(default)]
    pub behaviors: Vec<String>,
    #[serde(default)]
    pub interventions: Vec<String>,
    #[serde(default)]
    pub replacement_programs: Vec<String>,
}

/// Typed view of the session form payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForm {
    pub session_date: NaiveDate,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub environmental_changes: Option<String>,
    #[serde(default)]
    pub abc_entries: Vec<AbcEntry>,
    #[serde(default)]
    pub reinforcers: Vec<String>,
    #[serde(default)]
    pub valuation: Option<Valuation>,
}

impl SessionForm {
    /// Parse the typed view out of a raw payload
    pub fn from_payload(payload: &Value) -> Result<Self> {
        if !payload.is_object() {
            return Err(AppError::validation("formData", "must be an object"));
        }
        Self::deserialize(payload).map_err(|e| AppError::validation("formData", e.to_string()))
    }
}

/// A derived ABC row before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbcRow {
    pub sequence_order: i32,
    pub antecedent: String,
    pub behavior: String,
    pub consequence: String,
}

impl AbcRow {
    pub fn into_model(self, session_id: Uuid, now: chrono::DateTime<chrono::Utc>) -> SessionAbc {
        SessionAbc {
            id: Uuid::new_v4(),
            session_id,
            antecedent: self.antecedent,
            behavior: self.behavior,
            consequence: self.consequence,
            sequence_order: self.sequence_order,
            created_at: now.into(),
        }
    }
}

const TAG_SEPARATOR: &str = ", ";

/// Flatten form entries into rows, in form order with 1-based positions
pub fn derive_abc_rows(entries: &[AbcEntry]) -> Vec<AbcRow> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| AbcRow {
            sequence_order: index as i32 + 1,
            antecedent: entry.antecedent.clone(),
            behavior: entry.behaviors.join(TAG_SEPARATOR),
            consequence: entry
                .interventions
                .iter()
                .chain(entry.replacement_programs.iter())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(TAG_SEPARATOR),
        })
        .collect()
}

/// Create/update request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default)]
    pub status: SessionStatus,
    pub form_data: Value,
}

/// Everything a store needs to write one session and its ABC rows
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub session_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub status: SessionStatus,
    pub form_data: Value,
    pub abc_rows: Vec<AbcRow>,
}

impl SessionRecord {
    pub fn from_request(client_id: Uuid, user_id: Uuid, request: SessionRequest) -> Result<Self> {
        let form = SessionForm::from_payload(&request.form_data)?;
        let abc_rows = derive_abc_rows(&form.abc_entries);

        Ok(Self {
            client_id,
            user_id,
            session_date: form.session_date,
            start_time: form.start_time,
            end_time: form.end_time,
            location: form.location,
            status: request.status,
            form_data: request.form_data,
            abc_rows,
        })
    }
}

/// A session together with its ABC rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithAbcs {
    #[serde(flatten)]
    pub session: TherapySession,
    pub abcs: Vec<SessionAbc>,
}

/// Load a session and make sure it belongs to the client in the path
async fn session_of_client(
    store: &dyn Store,
    client_id: Uuid,
    session_id: Uuid,
) -> Result<SessionWithAbcs> {
    let found = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Session", session_id))?;

    if found.session.client_id != client_id {
        return Err(AppError::forbidden("Session does not belong to this client"));
    }

    Ok(found)
}

pub async fn create_session(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    request: SessionRequest,
) -> Result<SessionWithAbcs> {
    clients::ensure_access(store, caller, client_id).await?;

    let record = SessionRecord::from_request(client_id, caller.user_id, request)?;
    let abc_count = record.abc_rows.len();
    let created = store.create_session(record).await?;

    metrics::record_session_write("create", abc_count);
    info!(
        session_id = %created.session.id,
        client_id = %client_id,
        abc_rows = abc_count,
        "Session created"
    );

    Ok(created)
}

pub async fn update_session(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    session_id: Uuid,
    request: SessionRequest,
) -> Result<SessionWithAbcs> {
    clients::ensure_access(store, caller, client_id).await?;
    let existing = session_of_client(store, client_id, session_id).await?;

    // The therapist of record does not change on edit
    let record = SessionRecord::from_request(client_id, existing.session.user_id, request)?;
    let abc_count = record.abc_rows.len();

    let updated = store
        .replace_session(session_id, record)
        .await?
        .ok_or_else(|| AppError::not_found("Session", session_id))?;

    metrics::record_session_write("update", abc_count);
    info!(
        session_id = %session_id,
        client_id = %client_id,
        abc_rows = abc_count,
        "Session updated"
    );

    Ok(updated)
}

pub async fn get_session(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    session_id: Uuid,
) -> Result<SessionWithAbcs> {
    clients::ensure_access(store, caller, client_id).await?;
    session_of_client(store, client_id, session_id).await
}

/// Sessions for a client, most recent first
pub async fn list_sessions(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
) -> Result<Vec<SessionWithAbcs>> {
    clients::ensure_access(store, caller, client_id).await?;
    store.list_sessions(client_id).await
}

/// Delete a session; its ABC rows and notes go with it
pub async fn delete_session(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    session_id: Uuid,
) -> Result<()> {
    clients::ensure_access(store, caller, client_id).await?;
    session_of_client(store, client_id, session_id).await?;

    if !store.delete_session(session_id).await? {
        return Err(AppError::not_found("Session", session_id));
    }

    info!(session_id = %session_id, client_id = %client_id, "Session deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(antecedent: &str, behaviors: &[&str], interventions: &[&str], programs: &[&str]) -> AbcEntry {
        AbcEntry {
            antecedent: antecedent.to_string(),
            behaviors: behaviors.iter().map(|s| s.to_string()).collect(),
            interventions: interventions.iter().map(|s| s.to_string()).collect(),
            replacement_programs: programs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_rows_follow_form_order() {
        let rows = derive_abc_rows(&[
            entry("Demand placed", &["Elopement", "Screaming"], &["Blocking"], &["FCT"]),
            entry("Transition", &["Dropping"], &[], &["Visual schedule"]),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sequence_order, 1);
        assert_eq!(rows[0].behavior, "Elopement, Screaming");
        assert_eq!(rows[0].consequence, "Blocking, FCT");
        assert_eq!(rows[1].sequence_order, 2);
        assert_eq!(rows[1].consequence, "Visual schedule");
    }

    #[test]
    fn test_empty_entry_lists_join_to_empty_strings() {
        let rows = derive_abc_rows(&[entry("Alone", &[], &[], &[])]);
        assert_eq!(rows[0].behavior, "");
        assert_eq!(rows[0].consequence, "");
    }

    #[test]
    fn test_record_keeps_payload_verbatim() {
        let payload = json!({
            "sessionDate": "2026-03-02",
            "startTime": "9:00 AM",
            "endTime": "11:00 AM",
            "location": "Home",
            "participants": ["Jane Doe"],
            "abcEntries": [{"antecedent": "Demand", "behaviors": ["Elopement"]}],
            "valuation": "good",
            "customField": {"kept": true}
        });

        let record = SessionRecord::from_request(
            Uuid::new_v4(),
            Uuid::new_v4(),
            SessionRequest {
                status: SessionStatus::Submitted,
                form_data: payload.clone(),
            },
        )
        .unwrap();

        assert_eq!(record.form_data, payload);
        assert_eq!(record.location, "Home");
        assert_eq!(record.start_time, "9:00 AM");
        assert_eq!(record.session_date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(record.abc_rows.len(), 1);
        assert_eq!(record.status, SessionStatus::Submitted);
    }

    #[test]
    fn test_end_before_start_is_accepted() {
        let payload = json!({
            "sessionDate": "2026-03-02",
            "startTime": "11:00 AM",
            "endTime": "9:00 AM"
        });
        assert!(SessionForm::from_payload(&payload).is_ok());
    }

    #[test]
    fn test_missing_date_is_a_validation_error() {
        let err = SessionForm::from_payload(&json!({"location": "Clinic"})).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = SessionForm::from_payload(&json!("not an object")).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_status_defaults_to_draft() {
        let request: SessionRequest =
            serde_json::from_value(json!({"formData": {"sessionDate": "2026-01-01"}})).unwrap();
        assert_eq!(request.status, SessionStatus::Draft);
    }
}
