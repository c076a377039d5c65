use std::collections::{BTreeMap, BTreeSet};

use crate::household::household_addresses;
use crate::model::{ReviewNote, RosterRecord};
use crate::repository::Repository;

fn normalize(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Students linked to several donors whose roster homes no longer line up
/// with the CRM. Address changes for these are left to a person.
///
/// A household is examined once: a student whose donors were all seen with
/// an earlier student (typically a sibling) is skipped, whether or not that
/// student produced a note.
pub fn review_notes(repo: &Repository, roster: &[RosterRecord]) -> Vec<ReviewNote> {
    let mut notes = Vec::new();
    let mut covered: BTreeSet<i64> = BTreeSet::new();

    for record in roster {
        let donor_ids = repo.donor_ids_for_number(&record.system_id);
        if donor_ids.len() < 2 || donor_ids.iter().all(|id| covered.contains(id)) {
            continue;
        }
        covered.extend(donor_ids.iter().copied());

        let donor_addresses: BTreeMap<i64, String> = donor_ids
            .iter()
            .filter_map(|id| repo.donor(*id).map(|d| (*id, d.address_line())))
            .collect();
        let known: BTreeSet<String> = donor_addresses.values().map(|a| normalize(a)).collect();

        let roster_addresses = household_addresses(record);
        if roster_addresses.iter().all(|a| known.contains(&normalize(a))) {
            continue;
        }

        notes.push(ReviewNote {
            stu_number: record.system_id.clone(),
            student_name: record.student_name(),
            donor_addresses,
            roster_addresses,
        });
    }

    if !notes.is_empty() {
        log::info!("{} households need manual address review", notes.len());
    }
    notes
}
