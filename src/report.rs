use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::dashboard::Dashboard;
use crate::ranking::TieBand;

fn band_line(band: &TieBand) -> String {
    let names: Vec<String> = band
        .students
        .iter()
        .map(|s| format!("{} ({})", s.student_name, s.class_name))
        .collect();
    format!(
        "- #{} missing {} / late {} / on-time {}: {}",
        band.rank,
        band.missing,
        band.late,
        band.on_time,
        names.join(", ")
    )
}

pub fn build_report(dashboard: &Dashboard, generated_at: NaiveDateTime) -> String {
    let mut output = String::new();
    let stats = &dashboard.summary_stats;

    let _ = writeln!(output, "# Homework Submission Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(
        output,
        "- {} enrolled students, {} past-due assignments",
        stats.enrolled_students, stats.past_due_assignments
    );
    let _ = writeln!(
        output,
        "- {} of {} required submissions in ({:.1}%)",
        stats.total_completed, stats.total_required, stats.overall_rate
    );
    let _ = writeln!(
        output,
        "- on-time {}, late {}, missing {}, awaiting review {}",
        stats.on_time, stats.late, stats.missing, stats.awaiting_review
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Completion by Class");
    if dashboard.charts_overall_by_class.is_empty() {
        let _ = writeln!(output, "No assignments are past due yet.");
    } else {
        for class in &dashboard.charts_overall_by_class {
            let _ = writeln!(
                output,
                "- {}: {:.1}% ({} / {})",
                class.class_name, class.rate, class.completed, class.required
            );
            for item in dashboard
                .charts_by_assignment
                .get(&class.class_name)
                .into_iter()
                .flatten()
            {
                let _ = writeln!(
                    output,
                    "  - {} (due {}): {:.1}%",
                    item.assignment_name, item.deadline, item.rate
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Honor Roll");
    if dashboard.honor_rank_top.is_empty() {
        let _ = writeln!(output, "No students ranked yet.");
    } else {
        for band in &dashboard.honor_rank_top {
            let _ = writeln!(output, "{}", band_line(band));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");
    if dashboard.honor_rank_bottom.is_empty() {
        let _ = writeln!(output, "No students ranked yet.");
    } else {
        for band in &dashboard.honor_rank_bottom {
            let _ = writeln!(output, "{}", band_line(band));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{ClassRate, SummaryStats};
    use crate::ranking::RankedStudent;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    #[test]
    fn renders_sections_and_bands() {
        let band = TieBand {
            rank: 1,
            missing: 0,
            late: 1,
            on_time: 3,
            students: vec![
                RankedStudent {
                    student_name: "민준".to_string(),
                    class_name: "A".to_string(),
                },
                RankedStudent {
                    student_name: "서연".to_string(),
                    class_name: "A".to_string(),
                },
            ],
        };
        let dashboard = Dashboard {
            summary_stats: SummaryStats {
                enrolled_students: 2,
                overall_rate: 75.0,
                ..SummaryStats::default()
            },
            charts_by_assignment: BTreeMap::new(),
            charts_overall_by_class: vec![ClassRate {
                class_name: "A".to_string(),
                required: 4,
                completed: 3,
                rate: 75.0,
            }],
            honor_rank_top: vec![band.clone()],
            honor_rank_bottom: vec![band],
        };
        let at = NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        let report = build_report(&dashboard, at);
        assert!(report.starts_with("# Homework Submission Report\nGenerated 2024-10-01 09:30"));
        assert!(report.contains("- A: 75.0% (3 / 4)"));
        assert!(report.contains("- #1 missing 0 / late 1 / on-time 3: 민준 (A), 서연 (A)"));
    }
}
