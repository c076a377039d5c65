//! Turning roster contacts into CRM donor records.

use crate::config::MailConfig;
use crate::matcher::{key_part, KEY_WIDTHS};
use crate::model::{Contact, DonorRecord, RosterRecord};

const PARENTS: &[&str] = &["Mother", "Father"];
const SPOUSES: &[&str] = &["Mother", "Father", "Stepmother", "Stepfather"];
const NO_EMAIL: &str = "no email";

/// Street prefix length compared when deciding whether two contacts share a home.
const STREET_PREFIX: usize = 8;

/// Which reading of the roster contacts a candidate donor is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HouseholdView {
    /// Contact 1 as the donor, contact 2 as spouse when they share a home.
    Primary,
    /// Contact 2's own household, for parents living apart.
    Alternate,
    /// Same household as `Primary` with the parents in the other order.
    SwappedParents,
}

fn prefix(s: &str, n: usize) -> String {
    s.trim().chars().take(n).collect()
}

fn is_one_of(relationship: &str, set: &[&str]) -> bool {
    set.iter().any(|r| r.eq_ignore_ascii_case(relationship.trim()))
}

/// The record describes two homes: both streets are given, they differ, and
/// contact 2 is a parent.
pub fn different_household(record: &RosterRecord) -> bool {
    let (c1, c2) = (record.contact1(), record.contact2());
    !c1.street.is_empty()
        && !c2.street.is_empty()
        && prefix(c1.street, STREET_PREFIX) != prefix(c2.street, STREET_PREFIX)
        && is_one_of(c2.relationship, PARENTS)
}

/// Contact 2 lives with contact 1 as a parent or step-parent.
pub fn has_household_spouse(record: &RosterRecord) -> bool {
    !different_household(record) && is_one_of(record.contact2().relationship, SPOUSES)
}

pub fn salutation(first: &str, last: &str, sp_first: &str, sp_last: &str) -> String {
    if sp_last.is_empty() {
        format!("{first} {last}")
    } else if sp_last == last {
        format!("{first} and {sp_first} {sp_last}")
    } else {
        format!("{first} {last} and {sp_first} {sp_last}")
    }
}

pub fn informal_salutation(first: &str, sp_first: &str) -> String {
    if sp_first.is_empty() {
        first.to_string()
    } else {
        format!("{first} and {sp_first}")
    }
}

pub fn opt_line(sp_first: &str, sp_last: &str) -> String {
    format!("{sp_first} {sp_last}").trim().to_string()
}

/// Same person as far as the match key can tell: names compared after the
/// key's normalisation, so "Mary Ann" and "Mary-Ann" agree.
fn same_name(donor: &DonorRecord, contact: &Contact<'_>) -> bool {
    let [last_width, first_width, ..] = KEY_WIDTHS;
    key_part(&donor.last_name, last_width) == key_part(contact.last_name, last_width)
        && key_part(&donor.first_name, first_width) == key_part(contact.first_name, first_width)
}

/// The donor stands for contact 2: contact 1 is unnamed, or the parents live
/// apart and the donor carries contact 2's name.
pub fn represents_contact2(record: &RosterRecord, donor: &DonorRecord) -> bool {
    let (c1, c2) = (record.contact1(), record.contact2());
    if c1.last_name.is_empty() {
        return true;
    }
    different_household(record) && same_name(donor, &c2)
}

/// Every address the roster gives for the student's homes.
pub fn household_addresses(record: &RosterRecord) -> Vec<String> {
    let (c1, c2) = (record.contact1(), record.contact2());
    if c1.last_name.is_empty() {
        return vec![c2.address_line()];
    }
    let mut addresses = vec![c1.address_line()];
    if different_household(record) {
        addresses.push(c2.address_line());
    }
    addresses
}

/// Donor for the roster's primary household: contact 1 (with contact 2 as
/// spouse when they share a home), or contact 2 alone when contact 1 has no
/// last name.
pub fn primary_donor(record: &RosterRecord, school_year: &str, mail: &MailConfig) -> DonorRecord {
    let (c1, c2) = (record.contact1(), record.contact2());
    if c1.last_name.is_empty() {
        return build_donor(record, c2, None, c2, school_year, mail);
    }
    let spouse = has_household_spouse(record).then_some(c2);
    build_donor(record, c1, spouse, c1, school_year, mail)
}

/// Build a donor from the roster's contacts, for matching and, when nothing
/// matches, for insertion. `None` when the view does not apply to the record.
pub fn donor_candidate(
    record: &RosterRecord,
    view: HouseholdView,
    school_year: &str,
    mail: &MailConfig,
) -> Option<DonorRecord> {
    let (c1, c2) = (record.contact1(), record.contact2());

    match view {
        HouseholdView::Primary => Some(primary_donor(record, school_year, mail)),
        HouseholdView::Alternate => {
            if !different_household(record) || c2.last_name.is_empty() {
                return None;
            }
            Some(build_donor(record, c2, None, c2, school_year, mail))
        }
        HouseholdView::SwappedParents => {
            if c1.last_name.is_empty() || c2.last_name.is_empty() || !has_household_spouse(record) {
                return None;
            }
            Some(build_donor(record, c2, Some(c1), c1, school_year, mail))
        }
    }
}

fn build_donor(
    record: &RosterRecord,
    main: Contact<'_>,
    spouse: Option<Contact<'_>>,
    home: Contact<'_>,
    school_year: &str,
    mail: &MailConfig,
) -> DonorRecord {
    let mut donor = DonorRecord {
        donor_id: 0,
        first_name: main.first_name.into(),
        last_name: main.last_name.into(),
        address_type: "HOME".into(),
        address: home.street.into(),
        city: home.city.into(),
        state: home.state.into(),
        zip: home.zip.into(),
        email: main.email.into(),
        donor_type: mail.active_type.clone(),
        nomail: "N".into(),
        guardian: record.guardian.trim().into(),
        guard_email: record.guardian_email.trim().into(),
        fy_join_bsd: school_year.into(),
        receipt_delivery: "E".into(),
        ..Default::default()
    };

    if main.phone_type.eq_ignore_ascii_case("home") {
        donor.home_phone = main.phone.into();
    } else {
        donor.mobile_phone = main.phone.into();
    }

    if let Some(sp) = spouse {
        donor.sp_fname = sp.first_name.into();
        donor.sp_lname = sp.last_name.into();
        donor.spouse_email = sp.email.into();
        donor.spouse_mobile = sp.phone.into();
    }

    donor.salutation = salutation(&donor.first_name, &donor.last_name, &donor.sp_fname, &donor.sp_lname);
    donor.informal_sal = informal_salutation(&donor.first_name, &donor.sp_fname);
    donor.opt_line = opt_line(&donor.sp_fname, &donor.sp_lname);
    donor.mailmerge_fname = mailmerge_name(&donor.first_name, &donor.email, "");
    donor.sp_mailmerge_fname = mailmerge_name(&donor.sp_fname, &donor.spouse_email, &donor.email);
    donor
}

/// First name for mail merges, or `no email` when the person has no address
/// of their own.
fn mailmerge_name(first: &str, email: &str, other_email: &str) -> String {
    if email.is_empty() || email == other_email {
        NO_EMAIL.into()
    } else {
        first.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RosterRecord {
        RosterRecord {
            system_id: "100".into(),
            guardian: "Grandma Kim".into(),
            c1_first_name: "Maria".into(),
            c1_last_name: "Garcia".into(),
            c1_relationship: "Mother".into(),
            c1_phone_type: "Cell".into(),
            c1_phone: "650-555-0101".into(),
            c1_email: "maria@example.com".into(),
            c1_street: "12 Oak Grove Ave".into(),
            c1_city: "Burlingame".into(),
            c1_state: "CA".into(),
            c1_zip: "94010".into(),
            c2_first_name: "Luis".into(),
            c2_last_name: "Garcia".into(),
            c2_relationship: "Father".into(),
            c2_phone_type: "Home".into(),
            c2_phone: "650-555-0102".into(),
            c2_email: "luis@example.com".into(),
            c2_street: "12 Oak Grove Ave".into(),
            c2_city: "Burlingame".into(),
            c2_state: "CA".into(),
            c2_zip: "94010".into(),
            ..Default::default()
        }
    }

    #[test]
    fn salutation_forms() {
        assert_eq!(salutation("Maria", "Garcia", "", ""), "Maria Garcia");
        assert_eq!(salutation("Maria", "Garcia", "Luis", "Garcia"), "Maria and Luis Garcia");
        assert_eq!(salutation("Maria", "Garcia", "Tom", "Reed"), "Maria Garcia and Tom Reed");
        assert_eq!(informal_salutation("Maria", ""), "Maria");
        assert_eq!(informal_salutation("Maria", "Luis"), "Maria and Luis");
        assert_eq!(opt_line("", ""), "");
    }

    #[test]
    fn primary_household_with_spouse() {
        let d = donor_candidate(&record(), HouseholdView::Primary, "SY2026-27", &MailConfig::default()).unwrap();
        assert_eq!(d.first_name, "Maria");
        assert_eq!(d.sp_fname, "Luis");
        assert_eq!(d.salutation, "Maria and Luis Garcia");
        assert_eq!(d.informal_sal, "Maria and Luis");
        assert_eq!(d.opt_line, "Luis Garcia");
        assert_eq!(d.mobile_phone, "650-555-0101");
        assert_eq!(d.spouse_mobile, "650-555-0102");
        assert_eq!(d.mailmerge_fname, "Maria");
        assert_eq!(d.sp_mailmerge_fname, "Luis");
        assert_eq!(d.guardian, "Grandma Kim");
        assert_eq!(d.fy_join_bsd, "SY2026-27");
        assert_eq!((d.donor_type.as_str(), d.nomail.as_str()), ("IN", "N"));
    }

    #[test]
    fn grandparent_is_not_a_spouse() {
        let mut r = record();
        r.c2_relationship = "Grandmother".into();
        let d = donor_candidate(&r, HouseholdView::Primary, "SY", &MailConfig::default()).unwrap();
        assert_eq!(d.sp_fname, "");
        assert_eq!(d.informal_sal, "Maria");
        assert_eq!(d.sp_mailmerge_fname, "no email");
    }

    #[test]
    fn separate_homes() {
        let mut r = record();
        r.c2_street = "400 Elm St".into();
        r.c2_zip = "94401".into();
        assert!(different_household(&r));

        let primary = donor_candidate(&r, HouseholdView::Primary, "SY", &MailConfig::default()).unwrap();
        assert_eq!(primary.sp_fname, "");

        let alt = donor_candidate(&r, HouseholdView::Alternate, "SY", &MailConfig::default()).unwrap();
        assert_eq!(alt.first_name, "Luis");
        assert_eq!(alt.address, "400 Elm St");
        assert_eq!(alt.home_phone, "650-555-0102");
        assert_eq!(household_addresses(&r).len(), 2);

        assert!(donor_candidate(&r, HouseholdView::SwappedParents, "SY", &MailConfig::default()).is_none());
    }

    #[test]
    fn street_variants_share_a_home() {
        let mut r = record();
        r.c2_street = "12 Oak Grove Avenue".into();
        assert!(!different_household(&r));
        assert!(donor_candidate(&r, HouseholdView::Alternate, "SY", &MailConfig::default()).is_none());
    }

    #[test]
    fn swapped_parents_view() {
        let d = donor_candidate(&record(), HouseholdView::SwappedParents, "SY", &MailConfig::default()).unwrap();
        assert_eq!(d.first_name, "Luis");
        assert_eq!(d.sp_fname, "Maria");
        assert_eq!(d.address, "12 Oak Grove Ave");
        assert_eq!(d.home_phone, "650-555-0102");
    }

    #[test]
    fn missing_contact1_uses_contact2() {
        let mut r = record();
        r.c1_last_name = "".into();
        let d = donor_candidate(&r, HouseholdView::Primary, "SY", &MailConfig::default()).unwrap();
        assert_eq!(d.first_name, "Luis");
        assert_eq!(d.sp_fname, "");
        assert!(donor_candidate(&r, HouseholdView::SwappedParents, "SY", &MailConfig::default()).is_none());
    }

    #[test]
    fn donor_side_follows_household() {
        let mut r = record();
        r.c2_street = "400 Elm St".into();
        let luis = DonorRecord {
            first_name: "LUIS".into(),
            last_name: "Garcia".into(),
            ..Default::default()
        };
        assert!(represents_contact2(&r, &luis));
        let maria = DonorRecord {
            first_name: "Maria".into(),
            last_name: "Garcia".into(),
            ..Default::default()
        };
        assert!(!represents_contact2(&r, &maria));
    }

    #[test]
    fn donor_side_ignores_what_the_key_ignores() {
        let mut r = record();
        r.c2_first_name = "Mary-Ann".into();
        r.c2_last_name = "Van der Berg".into();
        r.c2_street = "400 Elm St".into();
        let donor = DonorRecord {
            first_name: "Mary Ann".into(),
            last_name: "vanderberg".into(),
            ..Default::default()
        };
        assert!(represents_contact2(&r, &donor));
    }
}
