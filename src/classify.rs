use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::deadline::DeadlineBook;
use crate::error::PortalResult;
use crate::models::{parse_submissions, ReviewStatus, Roster, SubmissionRecord, SubmissionStatus};
use crate::notify::Notifier;
use crate::schema;
use crate::sheet::TabularStore;
use crate::writer::StatusWriter;

const NAIVE_LAYOUTS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Parses a source timestamp and converts it to local time.
///
/// Offset-less stamps are taken as UTC. Returns `None` when nothing parses.
pub fn parse_submitted_at(raw: &str, local: FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(stamped) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamped.with_timezone(&local).naive_local());
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|utc| Utc.from_utc_datetime(&utc).with_timezone(&local).naive_local())
}

/// On-time only when both times are known and the submission is at or
/// before the cutoff.
pub fn classify(submitted_at: Option<NaiveDateTime>, cutoff: Option<NaiveDateTime>) -> SubmissionStatus {
    match (submitted_at, cutoff) {
        (Some(submitted_at), Some(cutoff)) if submitted_at <= cutoff => SubmissionStatus::OnTime,
        _ => SubmissionStatus::Late,
    }
}

/// Status of a submission, classifying on the fly when the row is unset.
pub fn effective_status(
    record: &SubmissionRecord,
    deadlines: &DeadlineBook,
    local: FixedOffset,
) -> SubmissionStatus {
    match record.status {
        SubmissionStatus::Unset => classify(
            parse_submitted_at(&record.submitted_at_raw, local),
            deadlines.cutoff_for(&record.class_name, &record.assignment_name),
        ),
        status => status,
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub row_index: usize,
    pub submission_id: String,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub assignment_name: String,
    pub status: SubmissionStatus,
}

/// Classifies every submission whose status is still unset.
pub fn plan(
    submissions: &[SubmissionRecord],
    deadlines: &DeadlineBook,
    local: FixedOffset,
) -> Vec<Classification> {
    submissions
        .iter()
        .filter(|record| record.status == SubmissionStatus::Unset)
        .map(|record| {
            let submitted_at = parse_submitted_at(&record.submitted_at_raw, local);
            if submitted_at.is_none() {
                warn!(
                    submission_id = %record.submission_id,
                    raw = %record.submitted_at_raw,
                    "unparseable submission time, classifying as late"
                );
            }
            let cutoff = deadlines.cutoff_for(&record.class_name, &record.assignment_name);
            Classification {
                row_index: record.row_index,
                submission_id: record.submission_id.clone(),
                student_id: record.student_id.clone(),
                student_name: record.student_name.clone(),
                class_name: record.class_name.clone(),
                assignment_name: record.assignment_name.clone(),
                status: classify(submitted_at, cutoff),
            }
        })
        .collect()
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
    pub classified: usize,
    pub on_time: usize,
    pub late: usize,
    pub notified: usize,
    pub roster_misses: usize,
}

/// One classification pass: read, classify unset rows, patch them, notify.
///
/// Two overlapping passes can both see a row as unset; the written values
/// agree but the student receives the SMS twice.
pub fn run(
    store: &dyn TabularStore,
    notifier: &Notifier,
    local: FixedOffset,
    now: NaiveDateTime,
) -> PortalResult<ClassificationReport> {
    use chrono::Datelike;

    let mut report = ClassificationReport::default();
    let submissions_table = store.read_table(schema::submissions::WORKSHEET)?;
    if submissions_table.is_empty() {
        info!("no submissions to process");
        return Ok(report);
    }

    let submissions = parse_submissions(&submissions_table)?;
    let deadlines = DeadlineBook::from_table(
        &store.read_table(schema::deadlines::WORKSHEET)?,
        now.year(),
    )?;
    let roster = Roster::from_table(&store.read_table(schema::roster::WORKSHEET)?)?;

    let pending = plan(&submissions, &deadlines, local);
    if pending.is_empty() {
        info!("no new submissions");
        return Ok(report);
    }
    info!(count = pending.len(), "classifying new submissions");

    let writer = StatusWriter::new(store, &submissions_table);
    for item in pending {
        writer.patch(item.row_index, schema::submissions::STATUS, item.status.label())?;
        writer.patch(
            item.row_index,
            schema::submissions::REVIEW_STATUS,
            ReviewStatus::Unconfirmed.label(),
        )?;
        report.classified += 1;
        match item.status {
            SubmissionStatus::OnTime => report.on_time += 1,
            _ => report.late += 1,
        }
        info!(
            submission_id = %item.submission_id,
            row = item.row_index,
            status = item.status.label(),
            "submission classified"
        );

        match roster.find_submitter(&item.student_id, &item.student_name, &item.class_name) {
            Some(entry) if !entry.phone.is_empty() => {
                if notifier.submission_received(&entry.phone, &item.assignment_name) {
                    report.notified += 1;
                }
            }
            Some(_) => {}
            None => {
                report.roster_misses += 1;
                warn!(
                    student = %item.student_name,
                    class = %item.class_name,
                    "student not found in roster, skipping sms"
                );
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingGateway;
    use crate::sheet::memory::MemoryWorkbook;
    use chrono::NaiveDate;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    const SUBMISSION_HEADERS: &[&str] = &[
        "Submission ID",
        "Submitted at",
        "이름을 입력해주세요. (띄어쓰기 금지)",
        "클래스를 선택해주세요.",
        "과제 번호를 선택해주세요. (반드시 확인요망)",
        "제출상태",
        "교사확인상태",
    ];

    fn workbook() -> MemoryWorkbook {
        MemoryWorkbook::new()
            .with_sheet(
                schema::submissions::WORKSHEET,
                &[
                    SUBMISSION_HEADERS,
                    &["s1", "2024-09-15 14:59:00", "민준", "A", "HW1", "", ""],
                    &["s2", "2024-09-15 15:00:01", "서연", "A", "HW1", "", ""],
                    &["s3", "2024-09-10 01:00:00", "지우", "A", "HW9", "", ""],
                    &["s4", "not a time", "민준", "A", "HW1", "", ""],
                    &["s5", "2024-09-01 00:00:00", "민준", "A", "HW1", "정상제출", "확인완료"],
                ],
            )
            .with_sheet(
                schema::deadlines::WORKSHEET,
                &[&["클래스", "과제명", "제출기한"], &["A", "HW1", "9/15"]],
            )
            .with_sheet(
                schema::roster::WORKSHEET,
                &[
                    &["학생이름", "클래스", "학생전화"],
                    &["민준", "A", "010-1111"],
                    &["서연", "A", "010-2222"],
                ],
            )
    }

    #[test]
    fn local_time_boundaries_around_cutoff() {
        let cutoff = Some(at(2024, 9, 15, 23, 59, 59));
        assert_eq!(classify(Some(at(2024, 9, 15, 23, 59, 0)), cutoff), SubmissionStatus::OnTime);
        assert_eq!(classify(Some(at(2024, 9, 15, 23, 59, 59)), cutoff), SubmissionStatus::OnTime);
        assert_eq!(classify(Some(at(2024, 9, 16, 0, 0, 1)), cutoff), SubmissionStatus::Late);
        assert_eq!(classify(Some(at(2024, 9, 1, 0, 0, 0)), None), SubmissionStatus::Late);
        assert_eq!(classify(None, cutoff), SubmissionStatus::Late);
    }

    #[test]
    fn source_times_shift_to_local() {
        assert_eq!(
            parse_submitted_at("2024-09-15 14:59:00", kst()),
            Some(at(2024, 9, 15, 23, 59, 0))
        );
        assert_eq!(
            parse_submitted_at("2024-09-15T23:59:00+09:00", kst()),
            Some(at(2024, 9, 15, 23, 59, 0))
        );
        assert_eq!(
            parse_submitted_at("2024-09-15 15:00:01", kst()),
            Some(at(2024, 9, 16, 0, 0, 1))
        );
        assert_eq!(parse_submitted_at("yesterday", kst()), None);
        assert_eq!(parse_submitted_at("", kst()), None);
    }

    #[test]
    fn run_classifies_patches_and_notifies() {
        let store = workbook();
        let gateway = RecordingGateway::default();
        let notifier = Notifier::new(Box::new(gateway.clone()), "[수학]");

        let report = run(&store, &notifier, kst(), at(2024, 9, 20, 12, 0, 0)).unwrap();
        assert_eq!(report.classified, 4);
        assert_eq!(report.on_time, 1);
        assert_eq!(report.late, 3);
        assert_eq!(report.roster_misses, 1);
        assert_eq!(report.notified, 3);

        let rows = store.values(schema::submissions::WORKSHEET);
        assert_eq!(rows[1][5], "정상제출");
        assert_eq!(rows[2][5], "지각제출");
        assert_eq!(rows[3][5], "지각제출");
        assert_eq!(rows[4][5], "지각제출");
        assert_eq!(rows[1][6], "미확인");
        assert_eq!(rows[5][6], "확인완료");
        assert_eq!(gateway.messages()[0].0, "010-1111");
    }

    #[test]
    fn second_run_changes_nothing() {
        let store = workbook();
        let gateway = RecordingGateway::default();
        let notifier = Notifier::new(Box::new(gateway.clone()), "[수학]");
        let now = at(2024, 9, 20, 12, 0, 0);

        run(&store, &notifier, kst(), now).unwrap();
        let after_first = store.values(schema::submissions::WORKSHEET);
        let sent_first = gateway.messages().len();

        let report = run(&store, &notifier, kst(), now).unwrap();
        assert_eq!(report.classified, 0);
        assert_eq!(store.values(schema::submissions::WORKSHEET), after_first);
        assert_eq!(gateway.messages().len(), sent_first);
    }

    #[test]
    fn missing_status_column_is_an_error() {
        let store = MemoryWorkbook::new().with_sheet(
            schema::submissions::WORKSHEET,
            &[&["Submission ID"], &["s1"]],
        );
        let notifier = Notifier::new(Box::new(RecordingGateway::default()), "");
        assert!(run(&store, &notifier, kst(), at(2024, 9, 20, 0, 0, 0)).is_err());
    }
}
