use crate::diff::DiffSet;
use crate::matcher::strategy_counts;
use crate::model::{Anomaly, MatchOutcome, SyncSummary};
use crate::repository::Repository;

/// Counts reported at the end of a run.
pub fn compute_summary(
    repo: &Repository,
    roster_students: usize,
    matches: &[MatchOutcome],
    anomalies: &[Anomaly],
    diff: &DiffSet,
) -> SyncSummary {
    SyncSummary {
        roster_students,
        crm_donors: repo.loaded_donor_count(),
        crm_students: repo.loaded_student_ids().len(),
        student_updates: diff.student_updates.len(),
        new_students: diff.new_students.len(),
        new_donor_students: diff.new_donors.len(),
        donor_updates: diff.donor_updates.len(),
        new_donors: repo.donors().filter(|d| d.is_new()).count(),
        manual_reviews: diff.notes.len(),
        anomalies: anomalies.len(),
        strategy_counts: strategy_counts(matches),
    }
}
