use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, FixedOffset, NaiveDateTime};
use serde::Serialize;

use crate::classify::effective_status;
use crate::deadline::DeadlineBook;
use crate::error::PortalResult;
use crate::models::{parse_submissions, ReviewStatus, Roster, SubmissionRecord, SubmissionStatus};
use crate::ranking::{bottom_bands, rank_students, top_bands, StudentStanding, TieBand};
use crate::schema;
use crate::sheet::TabularStore;

const HONOR_BANDS: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub enrolled_students: usize,
    pub past_due_assignments: usize,
    pub total_required: usize,
    pub total_completed: usize,
    pub overall_rate: f64,
    pub on_time: usize,
    pub late: usize,
    pub missing: usize,
    pub awaiting_review: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRate {
    pub assignment_name: String,
    pub deadline: String,
    /// Deadline cell as written in the worksheet.
    pub deadline_text: String,
    pub submitted: usize,
    pub required: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRate {
    pub class_name: String,
    pub required: usize,
    pub completed: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub summary_stats: SummaryStats,
    pub charts_by_assignment: BTreeMap<String, Vec<AssignmentRate>>,
    pub charts_overall_by_class: Vec<ClassRate>,
    #[serde(rename = "honorRankTop10")]
    pub honor_rank_top: Vec<TieBand>,
    #[serde(rename = "honorRankBottom10")]
    pub honor_rank_bottom: Vec<TieBand>,
}

/// Percentage rounded to one decimal; an empty denominator yields 0.
pub fn rate(completed: usize, required: usize) -> f64 {
    if required == 0 {
        return 0.0;
    }
    (completed as f64 * 1000.0 / required as f64).round() / 10.0
}

/// Aggregates completion rates and student standings over every deadline
/// whose cutoff lies strictly before `now`. Rejected submissions never count.
pub fn build_dashboard(
    roster: &Roster,
    deadlines: &DeadlineBook,
    submissions: &[SubmissionRecord],
    now: NaiveDateTime,
    local: FixedOffset,
) -> Dashboard {
    let mut enrolled_by_class: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in roster.enrolled() {
        enrolled_by_class
            .entry(entry.class_name.as_str())
            .or_default()
            .push(entry.student_name.as_str());
    }

    let active: Vec<&SubmissionRecord> = submissions.iter().filter(|s| !s.is_rejected()).collect();
    let mut by_assignment: HashMap<(&str, &str), Vec<&SubmissionRecord>> = HashMap::new();
    for submission in &active {
        by_assignment
            .entry((submission.class_name.as_str(), submission.assignment_name.as_str()))
            .or_default()
            .push(submission);
    }

    let mut stats = SummaryStats {
        enrolled_students: roster.enrolled().count(),
        awaiting_review: active
            .iter()
            .filter(|s| s.review_status == Some(ReviewStatus::Unconfirmed))
            .count(),
        ..SummaryStats::default()
    };
    let mut charts_by_assignment: BTreeMap<String, Vec<AssignmentRate>> = BTreeMap::new();
    let mut class_totals: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    let mut standings: BTreeMap<(&str, &str), StudentStanding> = BTreeMap::new();

    for deadline in deadlines.past_due(now) {
        let class = deadline.class_name.as_str();
        let students = enrolled_by_class.get(class).map(Vec::as_slice).unwrap_or(&[]);
        let entries = by_assignment
            .get(&(class, deadline.assignment_name.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let submitters: BTreeSet<&str> = entries
            .iter()
            .map(|s| s.student_name.as_str())
            .filter(|name| students.contains(name))
            .collect();
        let required = students.len();
        let completed = submitters.len();

        stats.past_due_assignments += 1;
        let totals = class_totals.entry(class).or_default();
        totals.0 += required;
        totals.1 += completed;
        charts_by_assignment
            .entry(class.to_string())
            .or_default()
            .push(AssignmentRate {
                assignment_name: deadline.assignment_name.clone(),
                deadline: deadline
                    .cutoff
                    .map(|cutoff| cutoff.date().to_string())
                    .unwrap_or_default(),
                deadline_text: deadline.raw_text.clone(),
                submitted: completed,
                required,
                rate: rate(completed, required),
            });

        for &student in students {
            let standing = standings
                .entry((class, student))
                .or_insert_with(|| StudentStanding::new(student, class));
            let mut statuses = entries
                .iter()
                .filter(|s| s.student_name == student)
                .map(|s| effective_status(s, deadlines, local))
                .peekable();
            if statuses.peek().is_none() {
                standing.missing += 1;
            } else if statuses.any(|status| status == SubmissionStatus::OnTime) {
                standing.on_time += 1;
            } else {
                standing.late += 1;
            }
        }
    }

    let charts_overall_by_class: Vec<ClassRate> = class_totals
        .into_iter()
        .map(|(class, (required, completed))| ClassRate {
            class_name: class.to_string(),
            required,
            completed,
            rate: rate(completed, required),
        })
        .collect();

    for class_rate in &charts_overall_by_class {
        stats.total_required += class_rate.required;
        stats.total_completed += class_rate.completed;
    }
    stats.overall_rate = rate(stats.total_completed, stats.total_required);

    let standings: Vec<StudentStanding> = standings.into_values().collect();
    for standing in &standings {
        stats.on_time += standing.on_time;
        stats.late += standing.late;
        stats.missing += standing.missing;
    }
    let bands = rank_students(standings);

    Dashboard {
        summary_stats: stats,
        charts_by_assignment,
        charts_overall_by_class,
        honor_rank_top: top_bands(&bands, HONOR_BANDS),
        honor_rank_bottom: bottom_bands(&bands, HONOR_BANDS),
    }
}

/// Reads roster, deadlines and submissions from the store and aggregates.
pub fn load_dashboard(
    store: &dyn TabularStore,
    now: NaiveDateTime,
    local: FixedOffset,
) -> PortalResult<Dashboard> {
    let roster = Roster::from_table(&store.read_table(schema::roster::WORKSHEET)?)?;
    let deadlines = DeadlineBook::from_table(
        &store.read_table(schema::deadlines::WORKSHEET)?,
        now.year(),
    )?;
    let submissions = parse_submissions(&store.read_table(schema::submissions::WORKSHEET)?)?;
    Ok(build_dashboard(&roster, &deadlines, &submissions, now, local))
}
