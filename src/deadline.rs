use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::PortalResult;
use crate::models::DeadlineRecord;
use crate::schema;
use crate::sheet::Table;

fn month_day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{1,2})/(\d{1,2})").expect("valid month/day pattern"))
}

/// Extracts the first `M/D` fragment (one or two digits each) from freeform
/// text such as `"9/15(일) 자정까지"`.
pub fn parse_month_day(text: &str) -> Option<(u32, u32)> {
    let captures = month_day_pattern().captures(text)?;
    let month = captures.get(1)?.as_str().parse().ok()?;
    let day = captures.get(2)?.as_str().parse().ok()?;
    Some((month, day))
}

/// Resolves deadline text to 23:59:59 local time on that day of `year`.
///
/// The text never carries a year, so a deadline written in December and
/// read in January lands in the wrong year.
pub fn resolve_cutoff(text: &str, year: i32) -> Option<NaiveDateTime> {
    let (month, day) = parse_month_day(text)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(23, 59, 59)
}

/// Resolved deadlines keyed by (class, assignment).
#[derive(Debug, Clone, Default)]
pub struct DeadlineBook {
    records: Vec<DeadlineRecord>,
    index: HashMap<(String, String), usize>,
}

impl DeadlineBook {
    /// Keeps resolvable rows only; the first row per key wins.
    pub fn from_records(records: impl IntoIterator<Item = DeadlineRecord>) -> Self {
        let mut book = DeadlineBook::default();
        for record in records {
            if record.cutoff.is_none() {
                continue;
            }
            let key = (record.class_name.clone(), record.assignment_name.clone());
            if book.index.contains_key(&key) {
                continue;
            }
            book.index.insert(key, book.records.len());
            book.records.push(record);
        }
        book
    }

    pub fn from_table(table: &Table, year: i32) -> PortalResult<Self> {
        use schema::deadlines as col;

        let class = table.require(col::CLASS_NAME)?;
        let assignment = table.require(col::ASSIGNMENT)?;
        let text = table.require(col::DEADLINE_TEXT)?;

        let records = (0..table.len()).map(|row| {
            let raw_text = table.cell(row, text).to_string();
            DeadlineRecord {
                class_name: table.cell(row, class).to_string(),
                assignment_name: table.cell(row, assignment).to_string(),
                cutoff: resolve_cutoff(&raw_text, year),
                raw_text,
            }
        });
        Ok(DeadlineBook::from_records(records))
    }

    pub fn cutoff_for(&self, class_name: &str, assignment_name: &str) -> Option<NaiveDateTime> {
        self.index
            .get(&(class_name.to_string(), assignment_name.to_string()))
            .and_then(|&position| self.records[position].cutoff)
    }

    /// Deadlines in worksheet order.
    pub fn records(&self) -> &[DeadlineRecord] {
        &self.records
    }

    /// Deadlines whose cutoff is strictly before `now`.
    pub fn past_due(&self, now: NaiveDateTime) -> impl Iterator<Item = &DeadlineRecord> {
        self.records
            .iter()
            .filter(move |record| record.cutoff.is_some_and(|cutoff| cutoff < now))
    }
}
