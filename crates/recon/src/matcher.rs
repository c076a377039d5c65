use std::collections::{BTreeMap, HashMap};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::household::{donor_candidate, primary_donor, HouseholdView};
use crate::model::{Anomaly, DonorRecord, MatchOutcome, MatchStrategy, RosterRecord, RunOptions};
use crate::repository::Repository;
use crate::school::student_from_roster;

// ---------------------------------------------------------------------------
// Match key
// ---------------------------------------------------------------------------

/// Field widths of the match key: last name, first name, address, zip.
pub const KEY_WIDTHS: [usize; 4] = [10, 8, 8, 5];

/// Uppercase, drop whitespace and hyphens, then truncate or space-pad to `width`.
pub fn key_part(value: &str, width: usize) -> String {
    let mut part: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .take(width)
        .collect();
    let len = part.chars().count();
    part.extend(std::iter::repeat(' ').take(width - len));
    part
}

/// Fixed-width key used to recognise a household across both extracts.
pub fn match_key(donor: &DonorRecord) -> String {
    let [last, first, address, zip] = KEY_WIDTHS;
    let mut key = key_part(&donor.last_name, last);
    key.push_str(&key_part(&donor.first_name, first));
    key.push_str(&key_part(&donor.address, address));
    key.push_str(&key_part(&donor.zip, zip));
    key
}

/// Match key → donor id.
#[derive(Debug, Default)]
pub struct MatchKeyIndex {
    keys: HashMap<String, i64>,
}

impl MatchKeyIndex {
    /// Index every donor in the repository. When two donors share a key the
    /// lower id is kept and the collision is reported.
    pub fn build(repo: &Repository) -> (Self, Vec<Anomaly>) {
        let mut index = Self::default();
        let mut anomalies = Vec::new();

        // Repository iterates donors in ascending id order.
        for donor in repo.donors() {
            let key = match_key(donor);
            match index.keys.get(&key) {
                Some(&kept) => {
                    log::warn!("duplicate match key '{key}' for donors {kept} and {}", donor.donor_id);
                    anomalies.push(Anomaly::KeyCollision {
                        key,
                        kept,
                        ignored: donor.donor_id,
                    });
                }
                None => {
                    index.keys.insert(key, donor.donor_id);
                }
            }
        }

        (index, anomalies)
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.keys.get(key).copied()
    }

    pub fn insert(&mut self, key: String, donor_id: i64) {
        self.keys.entry(key).or_insert(donor_id);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Fallback chain
// ---------------------------------------------------------------------------

/// Candidate views tried against the key index, in order.
const KEY_STRATEGIES: [(HouseholdView, MatchStrategy); 3] = [
    (HouseholdView::Primary, MatchStrategy::MatchKey),
    (HouseholdView::Alternate, MatchStrategy::AlternateHousehold),
    (HouseholdView::SwappedParents, MatchStrategy::SwappedParents),
];

/// Links roster students to donors: existing student, sibling's donors,
/// match key (primary, alternate household, swapped parents), new donor.
/// The first step that yields a donor wins.
pub struct Matcher<'a> {
    config: &'a SyncConfig,
    options: &'a RunOptions,
    index: MatchKeyIndex,
    families: HashMap<&'a str, Vec<&'a str>>,
    other_date: String,
}

impl<'a> Matcher<'a> {
    pub fn new(
        repo: &Repository,
        roster: &'a [RosterRecord],
        config: &'a SyncConfig,
        options: &'a RunOptions,
    ) -> (Self, Vec<Anomaly>) {
        let (index, anomalies) = MatchKeyIndex::build(repo);
        log::debug!("indexed {} donor match keys", index.len());

        let mut families: HashMap<&str, Vec<&str>> = HashMap::new();
        for record in roster {
            if !record.family_ident.is_empty() {
                families
                    .entry(record.family_ident.as_str())
                    .or_default()
                    .push(record.system_id.as_str());
            }
        }

        let matcher = Self {
            config,
            options,
            index,
            families,
            other_date: options.today.format("%m/%d/%Y").to_string(),
        };
        (matcher, anomalies)
    }

    /// Resolve one roster student, creating student (and donor) records as needed.
    pub fn resolve(&mut self, repo: &mut Repository, record: &RosterRecord) -> Result<MatchOutcome, SyncError> {
        let stu_number = record.system_id.as_str();

        let existing = repo.donor_ids_for_number(stu_number);
        if !existing.is_empty() {
            return Ok(outcome(stu_number, MatchStrategy::Existing, existing));
        }

        let siblings = self.sibling_donors(repo, record);
        if !siblings.is_empty() {
            for &donor_id in &siblings {
                self.link_student(repo, record, donor_id)?;
            }
            log::debug!("student {stu_number}: linked to sibling donors {siblings:?}");
            return Ok(outcome(stu_number, MatchStrategy::Sibling, siblings));
        }

        for (view, strategy) in KEY_STRATEGIES {
            let Some(candidate) = donor_candidate(record, view, &self.options.school_year, &self.config.mail) else {
                continue;
            };
            if candidate.last_name.is_empty() {
                continue;
            }
            if let Some(donor_id) = self.index.get(&match_key(&candidate)) {
                self.link_student(repo, record, donor_id)?;
                log::debug!("student {stu_number}: {strategy} match to donor {donor_id}");
                return Ok(outcome(stu_number, strategy, vec![donor_id]));
            }
        }

        let mut donor = primary_donor(record, &self.options.school_year, &self.config.mail);
        if donor.last_name.is_empty() {
            log::warn!("student {stu_number}: roster has no contact last name; creating unnamed donor");
        }
        donor.donor_id = repo.next_donor_id();
        let donor_id = donor.donor_id;
        if !donor.last_name.is_empty() {
            self.index.insert(match_key(&donor), donor_id);
        }
        repo.add_donor(donor)?;
        self.link_student(repo, record, donor_id)?;
        log::debug!("student {stu_number}: new donor {donor_id}");
        Ok(outcome(stu_number, MatchStrategy::NewDonor, vec![donor_id]))
    }

    /// Distinct donors of family members already in the repository, whether
    /// loaded from the CRM or created earlier in this pass.
    fn sibling_donors(&self, repo: &Repository, record: &RosterRecord) -> Vec<i64> {
        let mut encountered: Vec<i64> = Vec::new();
        let Some(members) = self.families.get(record.family_ident.as_str()) else {
            return encountered;
        };
        for sibling in members {
            for donor_id in repo.donor_ids_for_number(sibling) {
                if !encountered.contains(&donor_id) {
                    encountered.push(donor_id);
                }
            }
        }
        encountered
    }

    fn link_student(&self, repo: &mut Repository, record: &RosterRecord, donor_id: i64) -> Result<i64, SyncError> {
        let mut student = student_from_roster(record, &self.config.schools, &self.other_date)?;
        student.donor_id = donor_id;
        student.other_id = repo.next_student_id();
        let other_id = student.other_id;
        repo.add_student(student)?;
        Ok(other_id)
    }
}

fn outcome(stu_number: &str, strategy: MatchStrategy, donor_ids: Vec<i64>) -> MatchOutcome {
    MatchOutcome {
        stu_number: stu_number.to_string(),
        strategy,
        donor_ids,
    }
}

/// Count outcomes per strategy, keyed by strategy name.
pub fn strategy_counts(outcomes: &[MatchOutcome]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for o in outcomes {
        *counts.entry(o.strategy.to_string()).or_insert(0) += 1;
    }
    counts
}
