use std::collections::BTreeMap;

use chrono::{Datelike, FixedOffset, NaiveDateTime};
use serde::Serialize;
use tracing::warn;

use crate::classify::{effective_status, parse_submitted_at};
use crate::deadline::DeadlineBook;
use crate::error::{PortalError, PortalResult};
use crate::models::{parse_submissions, Roster, SubmissionStatus};
use crate::schema;
use crate::sheet::{TabularStore, Table};

type Record = BTreeMap<String, String>;

fn local_time_text(raw: &str, local: FixedOffset) -> String {
    parse_submitted_at(raw, local)
        .map(|at| at.format(schema::TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// A side table that may not exist yet reads as empty.
fn optional_table(store: &dyn TabularStore, worksheet: &str) -> PortalResult<Table> {
    match store.read_table(worksheet) {
        Err(PortalError::WorksheetNotFound(_)) => {
            warn!(worksheet, "worksheet missing, treating as empty");
            Ok(Table::from_values(worksheet, Vec::new()))
        }
        other => other,
    }
}

fn student_rows(table: &Table, student_name: &str, class_name: &str) -> Vec<Record> {
    (0..table.len())
        .filter(|&row| {
            table.value(row, schema::SIDE_TABLE_STUDENT) == student_name
                && table.value(row, schema::SIDE_TABLE_CLASS) == class_name
        })
        .map(|row| table.record(row))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    pub past_due: usize,
    pub on_time: usize,
    pub late: usize,
    pub missing: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDetail {
    pub submission_id: String,
    pub assignment_name: String,
    pub submitted_at: String,
    pub status: SubmissionStatus,
    pub review_status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedItem {
    pub submission_id: String,
    pub assignment_name: String,
    pub reason: String,
    pub processed_at: String,
}

/// Everything one student may see about themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    pub student_name: String,
    pub class_name: String,
    /// Roster level; empty when the student is not on the roster.
    pub level: String,
    pub attendance: Vec<Record>,
    pub clinic: Vec<Record>,
    pub assignment_summary: AssignmentSummary,
    pub assignment_details: Vec<AssignmentDetail>,
    pub unsubmitted: Vec<String>,
    pub rejected: Vec<RejectedItem>,
}

pub fn student_overview(
    store: &dyn TabularStore,
    student_name: &str,
    class_name: &str,
    now: NaiveDateTime,
    local: FixedOffset,
) -> PortalResult<StudentOverview> {
    let roster_table = optional_table(store, schema::roster::WORKSHEET)?;
    let roster = if roster_table.columns().is_empty() {
        Roster::default()
    } else {
        Roster::from_table(&roster_table)?
    };
    let level = roster
        .find(student_name, class_name)
        .map(|entry| entry.level.clone())
        .unwrap_or_default();
    let attendance = optional_table(store, schema::attendance::WORKSHEET)?;
    let clinic = optional_table(store, schema::clinic::WORKSHEET)?;
    let deadlines = DeadlineBook::from_table(
        &store.read_table(schema::deadlines::WORKSHEET)?,
        now.year(),
    )?;
    let submissions: Vec<_> = parse_submissions(&store.read_table(schema::submissions::WORKSHEET)?)?
        .into_iter()
        .filter(|s| s.student_name == student_name && s.class_name == class_name)
        .collect();
    let rejected_ledger = optional_table(store, schema::rejected::WORKSHEET)?;

    let assignment_details: Vec<AssignmentDetail> = submissions
        .iter()
        .map(|s| AssignmentDetail {
            submission_id: s.submission_id.clone(),
            assignment_name: s.assignment_name.clone(),
            submitted_at: local_time_text(&s.submitted_at_raw, local),
            status: effective_status(s, &deadlines, local),
            review_status: s.review_status.map(|r| r.label()).unwrap_or("").to_string(),
        })
        .collect();

    let mut summary = AssignmentSummary::default();
    let mut unsubmitted = Vec::new();
    for deadline in deadlines
        .past_due(now)
        .filter(|d| d.class_name == class_name)
    {
        summary.past_due += 1;
        let mut statuses = submissions
            .iter()
            .filter(|s| s.assignment_name == deadline.assignment_name && !s.is_rejected())
            .map(|s| effective_status(s, &deadlines, local))
            .peekable();
        if statuses.peek().is_none() {
            summary.missing += 1;
            unsubmitted.push(deadline.assignment_name.clone());
        } else if statuses.any(|status| status == SubmissionStatus::OnTime) {
            summary.on_time += 1;
        } else {
            summary.late += 1;
        }
    }

    let rejected: Vec<RejectedItem> = (0..rejected_ledger.len())
        .filter(|&row| {
            rejected_ledger.value(row, schema::rejected::STUDENT_NAME) == student_name
                && rejected_ledger.value(row, schema::rejected::CLASS_NAME) == class_name
        })
        .map(|row| RejectedItem {
            submission_id: rejected_ledger.value(row, schema::rejected::ID).to_string(),
            assignment_name: rejected_ledger.value(row, schema::rejected::ASSIGNMENT).to_string(),
            reason: rejected_ledger.value(row, schema::rejected::REASON).to_string(),
            processed_at: rejected_ledger.value(row, schema::rejected::PROCESSED_AT).to_string(),
        })
        .collect();
    summary.rejected = rejected.len();

    Ok(StudentOverview {
        student_name: student_name.to_string(),
        class_name: class_name.to_string(),
        level,
        attendance: student_rows(&attendance, student_name, class_name),
        clinic: student_rows(&clinic, student_name, class_name),
        assignment_summary: summary,
        assignment_details,
        unsubmitted,
        rejected,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionFeed {
    pub submissions: Vec<Record>,
    pub assignments: Vec<Record>,
}

/// All submissions with the raw source timestamp replaced by local time,
/// plus the assignment catalogue.
pub fn submission_feed(store: &dyn TabularStore, local: FixedOffset) -> PortalResult<SubmissionFeed> {
    let submissions = store
        .read_table(schema::submissions::WORKSHEET)?
        .records()
        .into_iter()
        .map(|mut record| {
            let raw = record
                .remove(schema::submissions::SUBMITTED_AT)
                .unwrap_or_default();
            record.insert(
                schema::submissions::LOCAL_TIME.to_string(),
                local_time_text(&raw, local),
            );
            record
        })
        .collect();
    let assignments = optional_table(store, schema::assignments::WORKSHEET)?.records();
    Ok(SubmissionFeed {
        submissions,
        assignments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::memory::MemoryWorkbook;
    use chrono::NaiveDate;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn store() -> MemoryWorkbook {
        MemoryWorkbook::new()
            .with_sheet(
                schema::submissions::WORKSHEET,
                &[
                    &[
                        "Submission ID",
                        "Submitted at",
                        "이름을 입력해주세요. (띄어쓰기 금지)",
                        "클래스를 선택해주세요.",
                        "과제 번호를 선택해주세요. (반드시 확인요망)",
                        "제출상태",
                        "교사확인상태",
                    ],
                    &["S1", "2024-09-14 03:00:00", "민준", "A", "HW1", "정상제출", "확인완료"],
                    &["S2", "2024-09-21 03:00:00", "민준", "A", "HW2", "", ""],
                    &["S3", "garbage", "민준", "A", "HW3", "지각제출", "반려"],
                    &["S4", "2024-09-14 03:00:00", "서연", "A", "HW1", "정상제출", "미확인"],
                ],
            )
            .with_sheet(
                schema::deadlines::WORKSHEET,
                &[
                    &["클래스", "과제명", "제출기한"],
                    &["A", "HW1", "9/15"],
                    &["A", "HW2", "9/20"],
                    &["A", "HW3", "9/25"],
                    &["A", "HW4", "12/1"],
                ],
            )
            .with_sheet(
                schema::rejected::WORKSHEET,
                &[
                    &schema::rejected::HEADERS,
                    &["A", "민준", "HW3", "사진 흐림", "2024-09-26 10:00:00", "S3"],
                ],
            )
            .with_sheet(
                schema::attendance::WORKSHEET,
                &[
                    &["날짜", "클래스", "학생이름", "출결상태"],
                    &["2024-09-02", "A", "민준", "출석"],
                    &["2024-09-02", "A", "서연", "결석"],
                ],
            )
            .with_sheet(
                schema::roster::WORKSHEET,
                &[&["학생이름", "클래스", "레벨"], &["민준", "A", "심화"]],
            )
            .with_sheet(
                schema::assignments::WORKSHEET,
                &[&["클래스", "과제명"], &["A", "HW1"]],
            )
    }

    #[test]
    fn overview_is_scoped_to_one_student() {
        let overview = student_overview(&store(), "민준", "A", now(), kst()).unwrap();

        assert_eq!(overview.level, "심화");
        assert_eq!(overview.attendance.len(), 1);
        assert_eq!(overview.attendance[0]["출결상태"], "출석");
        assert!(overview.clinic.is_empty());
        assert_eq!(overview.assignment_details.len(), 3);
        assert_eq!(overview.assignment_details[1].status, SubmissionStatus::Late);
        assert_eq!(overview.assignment_details[2].submitted_at, "-");
        assert_eq!(
            overview.assignment_summary,
            AssignmentSummary {
                past_due: 3,
                on_time: 1,
                late: 1,
                missing: 1,
                rejected: 1,
            }
        );
        assert_eq!(overview.unsubmitted, vec!["HW3".to_string()]);
        assert_eq!(overview.rejected[0].reason, "사진 흐림");
    }

    #[test]
    fn feed_replaces_source_timestamp_with_local_time() {
        let feed = submission_feed(&store(), kst()).unwrap();
        assert_eq!(feed.submissions.len(), 4);
        let first = &feed.submissions[0];
        assert!(!first.contains_key("Submitted at"));
        assert_eq!(first["제출일시_KST_str"], "2024-09-14 12:00:00");
        assert_eq!(feed.submissions[2]["제출일시_KST_str"], "-");
        assert_eq!(feed.assignments.len(), 1);
    }
}
