use std::cmp::Ordering;

use serde::Serialize;

/// Per-student tallies over the past-due assignments of their class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStanding {
    pub student_name: String,
    pub class_name: String,
    pub on_time: usize,
    pub late: usize,
    pub missing: usize,
}

impl StudentStanding {
    pub fn new(student_name: &str, class_name: &str) -> Self {
        StudentStanding {
            student_name: student_name.to_string(),
            class_name: class_name.to_string(),
            on_time: 0,
            late: 0,
            missing: 0,
        }
    }

    fn key(&self) -> (usize, usize, usize) {
        (self.missing, self.late, self.on_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_name: String,
    pub class_name: String,
}

/// Students sharing identical (missing, late, on-time) tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TieBand {
    /// Competition rank: one more than the number of students ahead.
    pub rank: usize,
    pub missing: usize,
    pub late: usize,
    pub on_time: usize,
    pub students: Vec<RankedStudent>,
}

/// Best first: fewer missing, then fewer late, then more on-time.
pub fn compare_standings(a: &StudentStanding, b: &StudentStanding) -> Ordering {
    a.missing
        .cmp(&b.missing)
        .then(a.late.cmp(&b.late))
        .then(b.on_time.cmp(&a.on_time))
}

pub fn rank_students(mut standings: Vec<StudentStanding>) -> Vec<TieBand> {
    standings.sort_by(|a, b| {
        compare_standings(a, b)
            .then_with(|| a.class_name.cmp(&b.class_name))
            .then_with(|| a.student_name.cmp(&b.student_name))
    });

    let mut bands: Vec<TieBand> = Vec::new();
    let mut ahead = 0usize;
    for standing in standings {
        let student = RankedStudent {
            student_name: standing.student_name.clone(),
            class_name: standing.class_name.clone(),
        };
        match bands.last_mut() {
            Some(band) if (band.missing, band.late, band.on_time) == standing.key() => {
                band.students.push(student);
            }
            _ => bands.push(TieBand {
                rank: ahead + 1,
                missing: standing.missing,
                late: standing.late,
                on_time: standing.on_time,
                students: vec![student],
            }),
        }
        ahead += 1;
    }
    bands
}

pub fn top_bands(bands: &[TieBand], limit: usize) -> Vec<TieBand> {
    bands.iter().take(limit).cloned().collect()
}

/// The worst `limit` bands, worst first.
pub fn bottom_bands(bands: &[TieBand], limit: usize) -> Vec<TieBand> {
    bands.iter().rev().take(limit).cloned().collect()
}
