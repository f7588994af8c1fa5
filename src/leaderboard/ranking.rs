use super::score_record::ScoreRecord;

/// Inserts `incoming` and returns the top `max_scores` records, highest first.
///
/// The sort is stable and `incoming` is appended before sorting, so it lands
/// after any existing record with the same score.
pub fn rank(current: &[ScoreRecord], incoming: ScoreRecord, max_scores: usize) -> Vec<ScoreRecord> {
    let mut records = Vec::with_capacity(current.len() + 1);
    records.extend_from_slice(current);
    records.push(incoming);

    records.sort_by(|a, b| b.score().cmp(&a.score()));
    records.truncate(max_scores);
    records
}
