use std::cmp::Ordering;

use strsim::normalized_levenshtein;

use crate::table::{StudentRecord, Table};

/// Scores at the cutoff are kept; the boundary is inclusive.
pub const NAME_MATCH_CUTOFF: f64 = 0.5;
pub const MAX_CANDIDATES: usize = 5;

pub fn find_by_roll(table: &Table, roll_number: i64) -> Option<StudentRecord> {
    table.find_row(roll_number).map(|row| table.student_record(row))
}

/// Ranks every roster name against the query (case-insensitive normalized
/// Levenshtein), keeps scores >= the cutoff, and returns at most
/// `MAX_CANDIDATES` in descending score order. Ties keep roster order so the
/// candidate list is stable across identical requests.
pub fn find_by_name(table: &Table, query: &str) -> Vec<StudentRecord> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, usize)> = table
        .student_names()
        .iter()
        .enumerate()
        .map(|(row, name)| (normalized_levenshtein(&q, &name.to_lowercase()), row))
        .filter(|(score, _)| *score >= NAME_MATCH_CUTOFF)
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    scored.truncate(MAX_CANDIDATES);

    scored
        .into_iter()
        .map(|(_, row)| table.student_record(row))
        .collect()
}
