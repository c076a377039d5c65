//! Post-pass invariants over every donor: mail flags and home-school fields.
//!
//! Safe to run repeatedly; a second pass changes nothing.

use std::collections::BTreeSet;

use crate::config::SyncConfig;
use crate::model::{DonorRecord, StudentRecord};
use crate::repository::Repository;

/// Scrub every donor in the repository. Returns the number of donors changed.
pub fn scrub(repo: &mut Repository, config: &SyncConfig) -> usize {
    let mut changed = 0;

    for donor_id in repo.donor_ids() {
        let students: Vec<StudentRecord> = repo.students_for_donor(donor_id).into_iter().cloned().collect();
        let Some(donor) = repo.donor_mut(donor_id) else {
            continue;
        };
        let before = donor.clone();

        scrub_mail_flags(donor, &students, config);
        scrub_home_school(donor, &students, config);

        if *donor != before {
            changed += 1;
        }
    }

    log::info!("scrubbed {changed} donors");
    changed
}

/// Donors without enrolled students stop receiving mail; donors with
/// enrolled students that were stopped for that reason resume.
pub fn scrub_mail_flags(donor: &mut DonorRecord, students: &[StudentRecord], config: &SyncConfig) {
    let mail = &config.mail;
    let enrolled = students
        .iter()
        .filter(|s| config.schools.is_enrolled(&s.school))
        .count();

    if donor.nomail == "N" && enrolled == 0 {
        log::debug!("donor {}: no enrolled students, mail stopped", donor.donor_id);
        donor.nomail = "Y".into();
        donor.nomail_reason = mail.inactive_reason.clone();
        donor.donor_type = mail.inactive_type.clone();
    } else if donor.nomail == "Y" && donor.nomail_reason == mail.inactive_reason && enrolled > 0 {
        log::debug!("donor {}: enrolled again, mail resumed", donor.donor_id);
        donor.nomail = "N".into();
        donor.nomail_reason.clear();
        donor.donor_type = mail.active_type.clone();
    } else if donor.nomail == "N" && !donor.nomail_reason.is_empty() {
        donor.nomail_reason.clear();
    }
}

/// `HOME_SCHOOL` summarises the active students' schools. The elementary
/// school is remembered in `FORMER_ELEM_SCHOOL` once a student reaches the
/// intermediate school.
pub fn scrub_home_school(donor: &mut DonorRecord, students: &[StudentRecord], config: &SyncConfig) {
    let schools = &config.schools;

    if donor.former_elem_school.is_empty()
        && schools.is_elementary(&donor.home_school)
        && students.iter().any(|s| s.school == schools.intermediate)
    {
        donor.former_elem_school = donor.home_school.clone();
    }

    let active: BTreeSet<&str> = students
        .iter()
        .map(|s| s.school.as_str())
        .filter(|code| schools.is_active(code))
        .collect();

    let mut active = active.into_iter();
    donor.home_school = match (active.next(), active.next()) {
        (None, _) => String::new(),
        (Some(code), None) => code.to_string(),
        _ => schools.multiple.clone(),
    };
}
