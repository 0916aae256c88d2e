//! Teacher review workflow: confirm or reject a submission, keeping the
//! graded and rejected ledgers and the primary review status in step.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PortalError, PortalResult};
use crate::models::{ReviewStatus, Roster};
use crate::notify::Notifier;
use crate::schema;
use crate::sheet::{sheet_row, TabularStore};
use crate::writer::StatusWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Confirm,
    Reject,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewPayload {
    pub submission_id: String,
    pub class_name: String,
    pub student_name: String,
    pub assignment_name: String,
    pub submission_status: String,
    /// Number or text; stored verbatim.
    pub total_problems: Option<serde_json::Value>,
    pub wrong_problem_count: Option<serde_json::Value>,
    pub wrong_problem_texts: Vec<String>,
    pub memo: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    pub payload: ReviewPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub message: String,
}

fn cell_text(value: &Option<serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn graded_row(payload: &ReviewPayload, processed_at: &str) -> Vec<String> {
    vec![
        payload.class_name.clone(),
        payload.student_name.clone(),
        payload.assignment_name.clone(),
        payload.submission_status.clone(),
        cell_text(&payload.total_problems),
        cell_text(&payload.wrong_problem_count),
        payload.wrong_problem_texts.join(", "),
        payload.memo.clone().unwrap_or_default(),
        processed_at.to_string(),
        payload.submission_id.clone(),
    ]
}

fn rejected_row(payload: &ReviewPayload, processed_at: &str) -> Vec<String> {
    vec![
        payload.class_name.clone(),
        payload.student_name.clone(),
        payload.assignment_name.clone(),
        payload.reason.clone().unwrap_or_default(),
        processed_at.to_string(),
        payload.submission_id.clone(),
    ]
}

/// Applies a review decision.
///
/// The ledger write, the rejection SMS and the primary status patch are
/// separate store calls; a failure part-way leaves the earlier ones applied.
pub fn apply_review(
    store: &dyn TabularStore,
    notifier: &Notifier,
    request: &ReviewRequest,
    now: NaiveDateTime,
) -> PortalResult<ReviewResponse> {
    let payload = &request.payload;
    let submission_id = payload.submission_id.trim();

    let primary = store.read_table(schema::submissions::WORKSHEET)?;
    let primary_id = primary.require(schema::submissions::ID)?;
    let primary_row = primary
        .find_row(primary_id, submission_id)
        .ok_or_else(|| PortalError::SubmissionNotFound(submission_id.to_string()))?;

    let processed_at = now.format(schema::TIMESTAMP_FORMAT).to_string();
    let graded = store.read_table(schema::graded::WORKSHEET)?;
    let graded_id = graded.require(schema::graded::ID)?;
    let graded_row_index = graded.find_row(graded_id, submission_id);

    let (message, review_status) = match request.action {
        ReviewAction::Confirm => {
            let row = graded_row(payload, &processed_at);
            let message = match graded_row_index {
                Some(index) => {
                    store.update_row(graded.worksheet(), sheet_row(index), &row)?;
                    "Grading result updated."
                }
                None => {
                    store.append_rows(graded.worksheet(), &[row])?;
                    "Grading result saved."
                }
            };
            (message, ReviewStatus::Confirmed)
        }
        ReviewAction::Reject => {
            if let Some(index) = graded_row_index {
                store.delete_row(graded.worksheet(), sheet_row(index))?;
            }
            store.append_rows(
                schema::rejected::WORKSHEET,
                &[rejected_row(payload, &processed_at)],
            )?;

            let roster = Roster::from_table(&store.read_table(schema::roster::WORKSHEET)?)?;
            match roster.find(&payload.student_name, &payload.class_name) {
                Some(entry) if !entry.phone.is_empty() => {
                    notifier.submission_rejected(
                        &entry.phone,
                        &payload.assignment_name,
                        payload.reason.as_deref().unwrap_or(""),
                    );
                }
                Some(_) => {}
                None => warn!(
                    student = %payload.student_name,
                    class = %payload.class_name,
                    "rejected student not found in roster, skipping sms"
                ),
            }
            ("Rejection recorded.", ReviewStatus::Rejected)
        }
    };

    StatusWriter::new(store, &primary).patch(
        primary_row,
        schema::submissions::REVIEW_STATUS,
        review_status.label(),
    )?;
    info!(submission_id, action = ?request.action, "review applied");

    Ok(ReviewResponse {
        success: true,
        message: message.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetails {
    pub wrong_problem_texts: String,
    pub memo: String,
}

/// Grading details recorded in the graded ledger for one submission.
pub fn result_details(store: &dyn TabularStore, submission_id: &str) -> PortalResult<ResultDetails> {
    let submission_id = submission_id.trim();
    let graded = store.read_table(schema::graded::WORKSHEET)?;
    let id_column = graded.require(schema::graded::ID)?;
    let row = graded
        .find_row(id_column, submission_id)
        .ok_or_else(|| PortalError::SubmissionNotFound(submission_id.to_string()))?;

    Ok(ResultDetails {
        wrong_problem_texts: graded.value(row, schema::graded::WRONG_TEXTS).to_string(),
        memo: graded.value(row, schema::graded::MEMO).to_string(),
    })
}
