use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::PortalResult;
use crate::schema;
use crate::sheet::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    Unset,
    OnTime,
    Late,
}

impl SubmissionStatus {
    /// Unrecognized non-empty labels count as late.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "" => SubmissionStatus::Unset,
            schema::ON_TIME => SubmissionStatus::OnTime,
            _ => SubmissionStatus::Late,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Unset => "",
            SubmissionStatus::OnTime => schema::ON_TIME,
            SubmissionStatus::Late => schema::LATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStatus {
    Unconfirmed,
    Confirmed,
    Rejected,
}

impl ReviewStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            schema::UNCONFIRMED => Some(ReviewStatus::Unconfirmed),
            schema::CONFIRMED => Some(ReviewStatus::Confirmed),
            schema::REJECTED => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReviewStatus::Unconfirmed => schema::UNCONFIRMED,
            ReviewStatus::Confirmed => schema::CONFIRMED,
            ReviewStatus::Rejected => schema::REJECTED,
        }
    }
}

/// A row of the primary submission table.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// Data row index in the submission table (0 = worksheet row 2).
    pub row_index: usize,
    pub submission_id: String,
    pub student_name: String,
    pub class_name: String,
    pub assignment_name: String,
    pub submitted_at_raw: String,
    pub status: SubmissionStatus,
    pub review_status: Option<ReviewStatus>,
    pub student_id: String,
}

impl SubmissionRecord {
    pub fn is_rejected(&self) -> bool {
        self.review_status == Some(ReviewStatus::Rejected)
    }
}

#[derive(Debug, Clone)]
pub struct DeadlineRecord {
    pub class_name: String,
    pub assignment_name: String,
    pub raw_text: String,
    pub cutoff: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub phone: String,
    pub parent_phone: String,
    pub enrollment_status: String,
    pub level: String,
}

impl RosterEntry {
    pub fn is_enrolled(&self) -> bool {
        self.enrollment_status == schema::ENROLLED
    }

    /// Student phone, or the parent's when the student has none on file.
    pub fn contact_phone(&self) -> Option<&str> {
        [self.phone.as_str(), self.parent_phone.as_str()]
            .into_iter()
            .find(|phone| !phone.is_empty())
    }
}

pub fn parse_submissions(table: &Table) -> PortalResult<Vec<SubmissionRecord>> {
    use schema::submissions as col;

    let status = table.require(col::STATUS)?;
    let name = table.require(col::STUDENT_NAME)?;
    let class = table.require(col::CLASS_NAME)?;
    let assignment = table.require(col::ASSIGNMENT)?;

    Ok((0..table.len())
        .map(|row| SubmissionRecord {
            row_index: row,
            submission_id: table.value(row, col::ID).to_string(),
            student_name: table.cell(row, name).to_string(),
            class_name: table.cell(row, class).to_string(),
            assignment_name: table.cell(row, assignment).to_string(),
            submitted_at_raw: table.value(row, col::SUBMITTED_AT).to_string(),
            status: SubmissionStatus::from_label(table.cell(row, status)),
            review_status: ReviewStatus::from_label(table.value(row, col::REVIEW_STATUS)),
            student_id: table.value(row, col::STUDENT_ID).to_string(),
        })
        .collect())
}

pub fn parse_roster(table: &Table) -> PortalResult<Vec<RosterEntry>> {
    use schema::roster as col;

    table.require(col::STUDENT_NAME)?;
    table.require(col::CLASS_NAME)?;

    Ok((0..table.len())
        .map(|row| RosterEntry {
            student_id: table.value(row, col::STUDENT_ID).to_string(),
            student_name: table.value(row, col::STUDENT_NAME).to_string(),
            class_name: table.value(row, col::CLASS_NAME).to_string(),
            phone: table.value(row, col::PHONE).to_string(),
            parent_phone: table.value(row, col::PARENT_PHONE).to_string(),
            enrollment_status: table.value(row, col::ENROLLMENT).to_string(),
            level: table.value(row, col::LEVEL).to_string(),
        })
        .collect())
}

/// Roster joined on the (student name, class) natural key.
///
/// Nothing in the workbook enforces that key, so two students sharing a
/// name inside one class resolve to the first roster row.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Roster { entries }
    }

    pub fn from_table(table: &Table) -> PortalResult<Self> {
        Ok(Roster::new(parse_roster(table)?))
    }

    pub fn find(&self, student_name: &str, class_name: &str) -> Option<&RosterEntry> {
        self.entries
            .iter()
            .find(|entry| entry.student_name == student_name && entry.class_name == class_name)
    }

    pub fn enrolled(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter().filter(|entry| entry.is_enrolled())
    }

    /// Looks a submitter up by student id when the submission carries one
    /// that the roster knows, else by (name, class).
    pub fn find_submitter(
        &self,
        student_id: &str,
        student_name: &str,
        class_name: &str,
    ) -> Option<&RosterEntry> {
        let student_id = student_id.trim();
        if !student_id.is_empty() {
            if let Some(entry) = self.entries.iter().find(|entry| entry.student_id == student_id) {
                return Some(entry);
            }
        }
        self.find(student_name, class_name)
    }

    pub fn is_enrolled_in(&self, student_name: &str, class_name: &str) -> bool {
        self.enrolled()
            .any(|entry| entry.student_name == student_name && entry.class_name == class_name)
    }
}
