use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PortalResult;
use crate::models::Roster;
use crate::notify::Notifier;
use crate::schema;
use crate::sheet::{TabularStore, Table};

/// One enrolled student's outstanding assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub class_name: String,
    pub student_name: String,
    pub phone: Option<String>,
    pub assignments: Vec<String>,
}

/// Groups the missing-submissions view by (class, student), keeping only
/// enrolled roster members.
pub fn plan_digest(missing: &Table, roster: &Roster) -> PortalResult<Vec<DigestEntry>> {
    use schema::missing as col;

    let class = missing.require(col::CLASS_NAME)?;
    let name = missing.require(col::STUDENT_NAME)?;
    let assignment = missing.require(col::ASSIGNMENT)?;

    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for row in 0..missing.len() {
        let key = (missing.cell(row, class).to_string(), missing.cell(row, name).to_string());
        if !roster.is_enrolled_in(&key.1, &key.0) {
            debug!(class = %key.0, student = %key.1, "missing entry without enrolled student");
            continue;
        }
        let assignments = grouped.entry(key).or_default();
        let title = missing.cell(row, assignment).to_string();
        if !assignments.contains(&title) {
            assignments.push(title);
        }
    }

    Ok(grouped
        .into_iter()
        .map(|((class_name, student_name), assignments)| {
            let phone = roster
                .find(&student_name, &class_name)
                .and_then(|entry| entry.contact_phone())
                .map(str::to_string);
            DigestEntry {
                class_name,
                student_name,
                phone,
                assignments,
            }
        })
        .collect())
}

pub fn student_message(brand: &str, entry: &DigestEntry) -> String {
    format!(
        "{brand} {} 학생 미제출 과제 안내: {}",
        entry.student_name,
        entry.assignments.join(", ")
    )
}

pub fn summary_message(brand: &str, date: NaiveDate, entries: &[DigestEntry]) -> String {
    let mut per_class: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *per_class.entry(entry.class_name.as_str()).or_default() += 1;
    }
    let classes: Vec<String> = per_class
        .into_iter()
        .map(|(class, count)| format!("{class} {count}명"))
        .collect();
    format!(
        "{brand} {date} 미제출 안내 {}명 발송 ({})",
        entries.len(),
        classes.join(", ")
    )
}

/// The digest fires once per local day, at or after `trigger_hour`.
pub fn is_due(last_fired: Option<NaiveDate>, now: NaiveDateTime, trigger_hour: u32) -> bool {
    now.hour() >= trigger_hour && last_fired != Some(now.date())
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestReport {
    pub students: usize,
    pub delivered: usize,
    pub summary_sent: bool,
}

/// Reads the roster and the missing-submissions view and plans the digest.
pub fn load_digest(store: &dyn TabularStore) -> PortalResult<Vec<DigestEntry>> {
    let roster = Roster::from_table(&store.read_table(schema::roster::WORKSHEET)?)?;
    let missing = store.read_table(schema::missing::WORKSHEET)?;
    plan_digest(&missing, &roster)
}

/// Sends one reminder per student plus an operator summary. Delivery
/// failures are logged and counted, never raised.
pub fn deliver_digest(
    notifier: &Notifier,
    operator_phone: Option<&str>,
    today: NaiveDate,
    entries: &[DigestEntry],
) -> DigestReport {
    let mut report = DigestReport {
        students: entries.len(),
        ..DigestReport::default()
    };
    for entry in entries {
        match &entry.phone {
            Some(phone) => {
                if notifier.send(phone, &student_message(notifier.brand(), entry)) {
                    report.delivered += 1;
                }
            }
            None => warn!(
                student = %entry.student_name,
                class = %entry.class_name,
                "no phone on file, skipping digest"
            ),
        }
    }

    match operator_phone {
        Some(phone) => {
            report.summary_sent =
                notifier.send(phone, &summary_message(notifier.brand(), today, entries));
        }
        None => warn!("no operator phone configured, skipping digest summary"),
    }
    info!(
        students = report.students,
        delivered = report.delivered,
        "daily digest sent"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingGateway;
    use crate::sheet::memory::MemoryWorkbook;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn store() -> MemoryWorkbook {
        MemoryWorkbook::new()
            .with_sheet(
                schema::roster::WORKSHEET,
                &[
                    &["학생이름", "클래스", "학생전화", "학부모전화", "재원상태"],
                    &["민준", "A", "010-1111", "", "재원"],
                    &["서연", "B", "", "010-9999", "재원"],
                    &["지우", "A", "010-3333", "", "퇴원"],
                ],
            )
            .with_sheet(
                schema::missing::WORKSHEET,
                &[
                    &["클래스", "학생이름", "과제명"],
                    &["A", "민준", "HW1"],
                    &["A", "민준", "HW2"],
                    &["A", "민준", "HW2"],
                    &["B", "서연", "HW1"],
                    &["A", "지우", "HW1"],
                ],
            )
    }

    #[test]
    fn load_fails_without_missing_view() {
        let store = MemoryWorkbook::new().with_sheet(
            schema::roster::WORKSHEET,
            &[&["학생이름", "클래스"], &["민준", "A"]],
        );
        assert!(load_digest(&store).is_err());
    }

    #[test]
    fn gate_fires_once_per_day_after_trigger_hour() {
        assert!(!is_due(None, at(20, 20), 21));
        assert!(is_due(None, at(20, 21), 21));
        assert!(!is_due(Some(at(20, 0).date()), at(20, 23), 21));
        assert!(is_due(Some(at(19, 0).date()), at(20, 21), 21));
    }

    #[test]
    fn plan_groups_by_class_and_student() {
        let store = store();
        let roster = Roster::from_table(&store.read_table(schema::roster::WORKSHEET).unwrap()).unwrap();
        let missing = store.read_table(schema::missing::WORKSHEET).unwrap();
        let entries = plan_digest(&missing, &roster).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].student_name, "민준");
        assert_eq!(entries[0].assignments, vec!["HW1", "HW2"]);
        assert_eq!(entries[1].phone.as_deref(), Some("010-9999"));
    }

    #[test]
    fn sends_one_message_per_student_and_a_summary() {
        let store = store();
        let gateway = RecordingGateway::default();
        let notifier = Notifier::new(Box::new(gateway.clone()), "[수학]");
        let entries = load_digest(&store).unwrap();
        let report = deliver_digest(&notifier, Some("010-0000"), at(20, 0).date(), &entries);

        assert_eq!(report.students, 2);
        assert_eq!(report.delivered, 2);
        assert!(report.summary_sent);
        let messages = gateway.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].1, "[수학] 민준 학생 미제출 과제 안내: HW1, HW2");
        assert_eq!(messages[2], (
            "010-0000".to_string(),
            "[수학] 2024-09-20 미제출 안내 2명 발송 (A 1명, B 1명)".to_string(),
        ));
    }
}
