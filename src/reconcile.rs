use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::error::PortalResult;
use crate::models::{ReviewStatus, SubmissionStatus};
use crate::schema;
use crate::sheet::{TabularStore, Table};

/// Comparable form of a submission id.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn id_set(table: &Table, column: usize) -> HashSet<String> {
    table
        .rows()
        .map(|row| normalize_id(&row[column]))
        .filter(|id| !id.is_empty())
        .collect()
}

/// A ledger row missing from the primary submission table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backfill {
    pub submission_id: String,
    pub student_name: String,
    pub class_name: String,
    pub assignment_name: String,
    pub status: String,
    pub review_status: ReviewStatus,
}

impl Backfill {
    fn from_ledger(ledger: &Table, row: usize, id_column: usize, review_status: ReviewStatus) -> Self {
        let status = match ledger.value(row, schema::graded::STATUS) {
            "" => SubmissionStatus::Late.label().to_string(),
            label => label.to_string(),
        };
        Backfill {
            submission_id: ledger.cell(row, id_column).to_string(),
            student_name: ledger.value(row, schema::graded::STUDENT_NAME).to_string(),
            class_name: ledger.value(row, schema::graded::CLASS_NAME).to_string(),
            assignment_name: ledger.value(row, schema::graded::ASSIGNMENT).to_string(),
            status,
            review_status,
        }
    }

    /// Minimal primary-table row carrying this backfill.
    pub fn to_row(&self, primary: &Table) -> Vec<String> {
        use schema::submissions as col;

        primary.compose_row(&[
            (col::ID, self.submission_id.clone()),
            (col::STUDENT_NAME, self.student_name.clone()),
            (col::CLASS_NAME, self.class_name.clone()),
            (col::ASSIGNMENT, self.assignment_name.clone()),
            (col::STATUS, self.status.clone()),
            (col::REVIEW_STATUS, self.review_status.label().to_string()),
        ])
    }
}

/// Ledger ids absent from the primary table, in ledger order.
///
/// All three id columns are checked before anything is computed. An id in
/// both ledgers is backfilled once, as rejected. Status falls back to late
/// so the classifier never picks a backfilled row up.
pub fn plan_backfill(primary: &Table, graded: &Table, rejected: &Table) -> PortalResult<Vec<Backfill>> {
    let primary_id = primary.require(schema::submissions::ID)?;
    let graded_id = graded.require(schema::graded::ID)?;
    let rejected_id = rejected.require(schema::rejected::ID)?;

    let mut seen = id_set(primary, primary_id);
    let rejected_ids = id_set(rejected, rejected_id);
    let mut backfills = Vec::new();

    for (ledger, column, review_status) in [
        (rejected, rejected_id, ReviewStatus::Rejected),
        (graded, graded_id, ReviewStatus::Confirmed),
    ] {
        for row in 0..ledger.len() {
            let id = normalize_id(ledger.cell(row, column));
            if id.is_empty() || seen.contains(&id) {
                continue;
            }
            if review_status == ReviewStatus::Confirmed && rejected_ids.contains(&id) {
                continue;
            }
            seen.insert(id);
            backfills.push(Backfill::from_ledger(ledger, row, column, review_status));
        }
    }

    Ok(backfills)
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub from_graded: usize,
    pub from_rejected: usize,
}

impl ReconcileReport {
    pub fn appended(&self) -> usize {
        self.from_graded + self.from_rejected
    }

    pub fn message(&self) -> String {
        match self.appended() {
            0 => "Primary table already matches the ledgers; nothing appended.".to_string(),
            n => format!(
                "Backfilled {n} submissions ({} graded, {} rejected).",
                self.from_graded, self.from_rejected
            ),
        }
    }
}

/// Appends every ledger-only submission to the primary table in one batch.
pub fn reconcile(store: &dyn TabularStore) -> PortalResult<ReconcileReport> {
    let primary = store.read_table(schema::submissions::WORKSHEET)?;
    let graded = store.read_table(schema::graded::WORKSHEET)?;
    let rejected = store.read_table(schema::rejected::WORKSHEET)?;

    let backfills = plan_backfill(&primary, &graded, &rejected)?;
    let mut report = ReconcileReport::default();
    if backfills.is_empty() {
        info!("reconciliation found nothing to backfill");
        return Ok(report);
    }

    let rows: Vec<Vec<String>> = backfills.iter().map(|b| b.to_row(&primary)).collect();
    store.append_rows(primary.worksheet(), &rows)?;

    for backfill in &backfills {
        match backfill.review_status {
            ReviewStatus::Rejected => report.from_rejected += 1,
            _ => report.from_graded += 1,
        }
    }
    info!(
        graded = report.from_graded,
        rejected = report.from_rejected,
        "backfilled primary submission table"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use crate::sheet::memory::MemoryWorkbook;

    fn store(graded_rows: &[&[&str]], rejected_rows: &[&[&str]]) -> MemoryWorkbook {
        let mut graded: Vec<&[&str]> = vec![&schema::graded::HEADERS[..]];
        graded.extend_from_slice(graded_rows);
        let mut rejected: Vec<&[&str]> = vec![&schema::rejected::HEADERS[..]];
        rejected.extend_from_slice(rejected_rows);

        MemoryWorkbook::new()
            .with_sheet(
                schema::submissions::WORKSHEET,
                &[
                    &[
                        "Submission ID",
                        "이름을 입력해주세요. (띄어쓰기 금지)",
                        "클래스를 선택해주세요.",
                        "과제 번호를 선택해주세요. (반드시 확인요망)",
                        "제출상태",
                        "교사확인상태",
                    ],
                    &["A7", "민준", "A", "HW1", "정상제출", "확인완료"],
                ],
            )
            .with_sheet(schema::graded::WORKSHEET, &graded)
            .with_sheet(schema::rejected::WORKSHEET, &rejected)
    }

    #[test]
    fn backfills_graded_only_submission() {
        let store = store(
            &[
                &["A", "서연", "HW2", "정상제출", "10", "1", "3", "", "2024-09-20 10:00:00", "X1"],
                &["A", "민준", "HW1", "정상제출", "10", "0", "", "", "2024-09-20 10:00:00", " a7 "],
            ],
            &[],
        );

        let report = reconcile(&store).unwrap();
        assert_eq!(report.appended(), 1);
        assert_eq!(report.from_graded, 1);

        let rows = store.values(schema::submissions::WORKSHEET);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["X1", "서연", "A", "HW2", "정상제출", "확인완료"]);
    }

    #[test]
    fn second_run_appends_nothing() {
        let store = store(
            &[&["A", "서연", "HW2", "", "10", "1", "3", "", "", "X1"]],
            &[&["A", "지우", "HW2", "흐림", "", "R9"]],
        );
        assert_eq!(reconcile(&store).unwrap().appended(), 2);
        let report = reconcile(&store).unwrap();
        assert_eq!(report.appended(), 0);
        assert_eq!(store.values(schema::submissions::WORKSHEET).len(), 4);
    }

    #[test]
    fn id_in_both_ledgers_is_backfilled_once_as_rejected() {
        let store = store(
            &[&["A", "서연", "HW2", "정상제출", "", "", "", "", "", "Z3"]],
            &[&["A", "서연", "HW2", "중복", "", "z3"]],
        );
        let report = reconcile(&store).unwrap();
        assert_eq!(report.from_rejected, 1);
        assert_eq!(report.from_graded, 0);
        let rows = store.values(schema::submissions::WORKSHEET);
        assert_eq!(rows[2][4], "지각제출");
        assert_eq!(rows[2][5], "반려");
    }

    #[test]
    fn ledger_without_id_column_aborts() {
        let store = MemoryWorkbook::new()
            .with_sheet(schema::submissions::WORKSHEET, &[&["Submission ID"], &["A7"]])
            .with_sheet(schema::graded::WORKSHEET, &[&["클래스"], &["A"]])
            .with_sheet(schema::rejected::WORKSHEET, &[&schema::rejected::HEADERS]);

        let err = reconcile(&store).unwrap_err();
        assert!(matches!(err, PortalError::MissingColumn { .. }));
        assert_eq!(store.values(schema::submissions::WORKSHEET).len(), 2);
    }
}
