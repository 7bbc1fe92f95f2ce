//! Narrative session notes
//!
//! Notes are produced by sending a prompt built from the session form to a
//! [`NarrativeGenerator`], and can later be hand-edited.

mod generator;

pub use generator::{
    create_generator, ChatCompletionsGenerator, Narrative, NarrativeGenerator, StaticGenerator,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::Caller;
use crate::db::models::SessionNote;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::sessions::{self, SessionForm};
use crate::store::Store;

/// What a generation call does when the session already has notes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotesMode {
    /// Every call writes a new row; the latest row is the current version
    #[default]
    Append,
    /// Overwrite the latest row if there is one
    Upsert,
}

/// Changes written to an existing notes row
#[derive(Debug, Clone, PartialEq)]
pub struct NotesUpdate {
    pub content: String,
    /// Set when the new content came from the generator
    pub generated: Option<Value>,
}

/// Hand-edit request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotesEdit {
    pub content: Option<String>,
}

/// "Jane Doe" -> "J.D."
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().find(|c| c.is_alphanumeric()))
        .flat_map(|c| c.to_uppercase().chain(std::iter::once('.')))
        .collect()
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Prompt sent to the generator for one session
pub fn build_prompt(form: &SessionForm) -> String {
    let participants: Vec<String> = form.participants.iter().map(|p| initials(p)).collect();
    let changes = form
        .environmental_changes
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("none reported");

    let mut lines = vec![
        "Write session notes for the following therapy session.".to_string(),
        String::new(),
        format!("Date: {}", form.session_date.format("%B %-d, %Y")),
        format!("Time: {} to {}", form.start_time, form.end_time),
        format!("Location: {}", form.location),
        format!("Participants: {}", list_or_none(&participants)),
        format!("Environmental changes: {}", changes),
        String::new(),
        "ABC data:".to_string(),
    ];

    if form.abc_entries.is_empty() {
        lines.push("No ABC entries were recorded.".to_string());
    }
    for (i, entry) in form.abc_entries.iter().enumerate() {
        lines.push(format!("{}. Antecedent: {}", i + 1, entry.antecedent));
        lines.push(format!("   Behaviors: {}", list_or_none(&entry.behaviors)));
        lines.push(format!("   Interventions: {}", list_or_none(&entry.interventions)));
        lines.push(format!(
            "   Replacement programs: {}",
            list_or_none(&entry.replacement_programs)
        ));
    }

    lines.push(String::new());
    lines.push(format!("Reinforcers: {}", list_or_none(&form.reinforcers)));
    if let Some(valuation) = form.valuation {
        lines.push(format!("Overall session valuation: {}", valuation.as_str()));
    }

    lines.extend(
        [
            "",
            "Instructions:",
            "- Write one flowing narrative in the third person.",
            "- Do not use headings, bullet points or lists.",
            "- Refer to every person by initials only.",
            "- Describe each antecedent, the behaviors that followed and how they were addressed.",
            "- End with a short summary of the session environment and plans for the next session.",
        ]
        .map(String::from),
    );

    lines.join("\n")
}

async fn call_generator(generator: &dyn NarrativeGenerator, prompt: &str) -> Result<Narrative> {
    let start = Instant::now();
    let result = generator.generate(prompt).await;
    let elapsed = start.elapsed().as_secs_f64();

    metrics::record_generation(elapsed, generator.model_name(), result.is_ok());

    result.map_err(|e| {
        error!(model = generator.model_name(), error = %e, "Narrative generation failed");
        match e {
            AppError::Generation { .. } => e,
            other => AppError::Generation {
                message: other.to_string(),
            },
        }
    })
}

/// Generate notes for a session and persist them
pub async fn generate_notes(
    store: &dyn Store,
    generator: &dyn NarrativeGenerator,
    mode: NotesMode,
    caller: &Caller,
    client_id: Uuid,
    session_id: Uuid,
) -> Result<SessionNote> {
    let session = sessions::get_session(store, caller, client_id, session_id).await?;
    let form = SessionForm::from_payload(&session.session.form_data)?;
    let prompt = build_prompt(&form);

    let narrative = call_generator(generator, &prompt).await?;

    let existing = match mode {
        NotesMode::Append => None,
        NotesMode::Upsert => store.latest_notes(session_id).await?,
    };

    let notes = match existing {
        Some(latest) => store
            .update_notes(
                latest.id,
                NotesUpdate {
                    content: narrative.text,
                    generated: Some(narrative.metadata),
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found("Session notes", latest.id))?,
        None => {
            let now = Utc::now();
            store
                .insert_notes(SessionNote {
                    id: Uuid::new_v4(),
                    session_id,
                    content: narrative.text,
                    is_generated: true,
                    generation_metadata: narrative.metadata,
                    created_by: caller.user_id,
                    created_at: now.into(),
                    updated_at: now.into(),
                })
                .await?
        }
    };

    info!(
        session_id = %session_id,
        notes_id = %notes.id,
        mode = ?mode,
        "Session notes generated"
    );

    Ok(notes)
}

/// Overwrite the content of the latest notes row
pub async fn edit_notes(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    session_id: Uuid,
    edit: NotesEdit,
) -> Result<SessionNote> {
    let content = edit
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::MissingField {
            field: "content".to_string(),
        })?;

    let latest = latest_notes(store, caller, client_id, session_id).await?;

    let notes = store
        .update_notes(
            latest.id,
            NotesUpdate {
                content,
                generated: None,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Session notes", latest.id))?;

    info!(session_id = %session_id, notes_id = %notes.id, "Session notes edited");
    Ok(notes)
}

pub async fn latest_notes(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    session_id: Uuid,
) -> Result<SessionNote> {
    sessions::get_session(store, caller, client_id, session_id).await?;

    store
        .latest_notes(session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Session notes", session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{AbcEntry, Valuation};
    use chrono::NaiveDate;

    fn form() -> SessionForm {
        SessionForm {
            session_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: "9:00 AM".into(),
            end_time: "11:00 AM".into(),
            location: "Home".into(),
            participants: vec!["Jane Doe".into(), "mark o'neil".into()],
            environmental_changes: None,
            abc_entries: vec![AbcEntry {
                antecedent: "Demand placed".into(),
                behaviors: vec!["Elopement".into()],
                interventions: vec!["Blocking".into()],
                replacement_programs: vec![],
            }],
            reinforcers: vec!["Tablet time".into()],
            valuation: Some(Valuation::Good),
        }
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("Jane Doe"), "J.D.");
        assert_eq!(initials("  mark   o'neil "), "M.O.");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_prompt_uses_initials_only() {
        let prompt = build_prompt(&form());
        assert!(prompt.contains("Participants: J.D., M.O."));
        assert!(!prompt.contains("Jane"));
    }

    #[test]
    fn test_prompt_without_abc_entries() {
        let mut form = form();
        form.abc_entries.clear();

        let prompt = build_prompt(&form);
        assert!(prompt.contains("ABC data:\nNo ABC entries were recorded.\n"));
        assert!(prompt.starts_with("Write session notes"));
        assert!(prompt.ends_with("plans for the next session."));
    }

    #[test]
    fn test_prompt_carries_session_details() {
        let prompt = build_prompt(&form());
        assert!(prompt.contains("Date: March 2, 2026"));
        assert!(prompt.contains("Time: 9:00 AM to 11:00 AM"));
        assert!(prompt.contains("1. Antecedent: Demand placed"));
        assert!(prompt.contains("Replacement programs: none"));
        assert!(prompt.contains("Overall session valuation: good"));
        assert!(prompt.contains("Environmental changes: none reported"));
        assert!(prompt.contains("third person"));
    }
}
