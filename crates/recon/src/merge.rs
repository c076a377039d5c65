//! Field-level updates applied to donors matched to roster students.

use crate::household::{has_household_spouse, informal_salutation, opt_line, represents_contact2, salutation};
use crate::model::{DonorRecord, RosterRecord};
use crate::repository::Repository;

/// Apply guardian email and household updates for every roster record to
/// the donors linked to its student. Returns the number of donors touched.
pub fn merge_roster(repo: &mut Repository, roster: &[RosterRecord]) -> usize {
    let mut touched = 0;

    for record in roster {
        let donor_ids = repo.donor_ids_for_number(&record.system_id);
        let single = donor_ids.len() == 1;

        for donor_id in donor_ids {
            let Some(donor) = repo.donor_mut(donor_id) else {
                continue;
            };
            let before = donor.clone();

            update_guardian_email(donor, record);
            if single {
                merge_single_donor(donor, record);
            } else {
                merge_multi_donor(donor, record);
            }

            if *donor != before {
                log::debug!("donor {donor_id}: updated from roster student {}", record.system_id);
                touched += 1;
            }
        }
    }

    log::info!("{touched} donor merges applied from roster");
    touched
}

/// Replace `GUARD_EMAIL` when the roster's guardian email differs, ignoring
/// case and surrounding whitespace.
pub fn update_guardian_email(donor: &mut DonorRecord, record: &RosterRecord) {
    let roster_email = record.guardian_email.trim();
    if roster_email.is_empty() {
        return;
    }
    if donor.guard_email.trim().to_lowercase() != roster_email.to_lowercase() {
        donor.guard_email = roster_email.to_string();
    }
}

/// The student's only donor: address, parent order and missing emails follow
/// the roster.
pub fn merge_single_donor(donor: &mut DonorRecord, record: &RosterRecord) {
    let contact2_side = represents_contact2(record, donor);
    let home = if contact2_side { record.contact2() } else { record.contact1() };
    donor.address = home.street.to_string();
    donor.city = home.city.to_string();
    donor.state = home.state.to_string();
    donor.zip = home.zip.to_string();

    if !contact2_side && has_household_spouse(record) && !donor.sp_fname.is_empty() && parents_reversed(donor, record) {
        swap_parents(donor);
    }

    let (c1, c2) = (record.contact1(), record.contact2());
    if contact2_side {
        fill(&mut donor.email, c2.email);
        return;
    }
    fill(&mut donor.email, c1.email);
    if has_household_spouse(record) {
        fill(&mut donor.spouse_email, c2.email);
    }
}

/// One of several donors for the student: only a missing email is filled,
/// from the contact carrying the donor's first name.
pub fn merge_multi_donor(donor: &mut DonorRecord, record: &RosterRecord) {
    if !donor.email.is_empty() {
        return;
    }
    let first = donor.first_name.trim();
    let (c1, c2) = (record.contact1(), record.contact2());
    if first.eq_ignore_ascii_case(c1.first_name) {
        fill(&mut donor.email, c1.email);
    } else if first.eq_ignore_ascii_case(c2.first_name) {
        fill(&mut donor.email, c2.email);
    }
}

fn fill(field: &mut String, value: &str) {
    if field.is_empty() && !value.is_empty() {
        *field = value.to_string();
    }
}

/// The stored informal salutation reads closer to "C2 and C1" than to
/// "C1 and C2", and the donor is not already headed by contact 1.
fn parents_reversed(donor: &DonorRecord, record: &RosterRecord) -> bool {
    let (c1, c2) = (record.contact1(), record.contact2());
    if donor.first_name.trim().eq_ignore_ascii_case(c1.first_name) {
        return false;
    }

    let stored = donor.informal_sal.to_lowercase();
    let straight = informal_salutation(c1.first_name, c2.first_name).to_lowercase();
    let reversed = informal_salutation(c2.first_name, c1.first_name).to_lowercase();
    strsim::levenshtein(&stored, &reversed) < strsim::levenshtein(&stored, &straight)
}

fn swap_parents(donor: &mut DonorRecord) {
    let derived_informal = informal_salutation(&donor.first_name, &donor.sp_fname);
    let derived_salutation = salutation(&donor.first_name, &donor.last_name, &donor.sp_fname, &donor.sp_lname);
    let derived_opt = opt_line(&donor.sp_fname, &donor.sp_lname);

    std::mem::swap(&mut donor.first_name, &mut donor.sp_fname);
    std::mem::swap(&mut donor.last_name, &mut donor.sp_lname);
    std::mem::swap(&mut donor.email, &mut donor.spouse_email);
    std::mem::swap(&mut donor.mobile_phone, &mut donor.spouse_mobile);
    std::mem::swap(&mut donor.employer, &mut donor.sp_employer);
    std::mem::swap(&mut donor.mailmerge_fname, &mut donor.sp_mailmerge_fname);

    // Hand-edited salutations are kept.
    if donor.informal_sal == derived_informal {
        donor.informal_sal = informal_salutation(&donor.first_name, &donor.sp_fname);
    }
    if donor.salutation == derived_salutation {
        donor.salutation = salutation(&donor.first_name, &donor.last_name, &donor.sp_fname, &donor.sp_lname);
    }
    if donor.opt_line == derived_opt {
        donor.opt_line = opt_line(&donor.sp_fname, &donor.sp_lname);
    }

    log::debug!("donor {}: parent order swapped", donor.donor_id);
}
