use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CRM records
// ---------------------------------------------------------------------------

/// Column-ordered access to a CRM record, used by the loader's header check
/// and by the diff writer.
pub trait Record {
    const HEADERS: &'static [&'static str];

    /// Values aligned with `HEADERS`.
    fn values(&self) -> Vec<String>;

    fn value(&self, column: &str) -> Option<String> {
        Self::HEADERS
            .iter()
            .position(|h| *h == column)
            .map(|i| self.values().swap_remove(i))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DonorRecord {
    pub donor_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub sp_fname: String,
    pub sp_lname: String,
    pub salutation: String,
    pub informal_sal: String,
    pub opt_line: String,
    pub address_type: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub email: String,
    pub spouse_email: String,
    pub home_phone: String,
    pub mobile_phone: String,
    pub spouse_mobile: String,
    pub employer: String,
    pub sp_employer: String,
    pub mailmerge_fname: String,
    pub sp_mailmerge_fname: String,
    pub donor_type: String,
    pub nomail: String,
    pub nomail_reason: String,
    pub guardian: String,
    pub guard_email: String,
    pub fy_join_bsd: String,
    pub receipt_delivery: String,
    pub home_school: String,
    pub former_elem_school: String,
}

impl Record for DonorRecord {
    const HEADERS: &'static [&'static str] = &[
        "DONOR_ID",
        "FIRST_NAME",
        "LAST_NAME",
        "SP_FNAME",
        "SP_LNAME",
        "SALUTATION",
        "INFORMAL_SAL",
        "OPT_LINE",
        "ADDRESS_TYPE",
        "ADDRESS",
        "CITY",
        "STATE",
        "ZIP",
        "EMAIL",
        "SPOUSE_EMAIL",
        "HOME_PHONE",
        "MOBILE_PHONE",
        "SPOUSE_MOBILE",
        "EMPLOYER",
        "SP_EMPLOYER",
        "MAILMERGE_FNAME",
        "SP_MAILMERGE_FNAME",
        "DONOR_TYPE",
        "NOMAIL",
        "NOMAIL_REASON",
        "GUARDIAN",
        "GUARD_EMAIL",
        "FY_JOIN_BSD",
        "RECEIPT_DELIVERY",
        "HOME_SCHOOL",
        "FORMER_ELEM_SCHOOL",
    ];

    fn values(&self) -> Vec<String> {
        vec![
            self.donor_id.to_string(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.sp_fname.clone(),
            self.sp_lname.clone(),
            self.salutation.clone(),
            self.informal_sal.clone(),
            self.opt_line.clone(),
            self.address_type.clone(),
            self.address.clone(),
            self.city.clone(),
            self.state.clone(),
            self.zip.clone(),
            self.email.clone(),
            self.spouse_email.clone(),
            self.home_phone.clone(),
            self.mobile_phone.clone(),
            self.spouse_mobile.clone(),
            self.employer.clone(),
            self.sp_employer.clone(),
            self.mailmerge_fname.clone(),
            self.sp_mailmerge_fname.clone(),
            self.donor_type.clone(),
            self.nomail.clone(),
            self.nomail_reason.clone(),
            self.guardian.clone(),
            self.guard_email.clone(),
            self.fy_join_bsd.clone(),
            self.receipt_delivery.clone(),
            self.home_school.clone(),
            self.former_elem_school.clone(),
        ]
    }
}

impl DonorRecord {
    pub fn is_new(&self) -> bool {
        self.donor_id < 0
    }

    pub fn has_nomail(&self) -> bool {
        self.nomail == "Y"
    }

    /// "street city state zip", as compared in review notes.
    pub fn address_line(&self) -> String {
        format!("{} {} {} {}", self.address, self.city, self.state, self.zip)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StudentRecord {
    pub donor_id: i64,
    pub stu_number: String,
    pub stu_fname: String,
    pub stu_lname: String,
    pub grade: String,
    pub school: String,
    pub other_id: i64,
    pub other_date: String,
}

impl Record for StudentRecord {
    const HEADERS: &'static [&'static str] = &[
        "DONOR_ID",
        "STU_NUMBER",
        "STU_FNAME",
        "STU_LNAME",
        "GRADE",
        "SCHOOL",
        "OTHER_ID",
        "OTHER_DATE",
    ];

    fn values(&self) -> Vec<String> {
        vec![
            self.donor_id.to_string(),
            self.stu_number.clone(),
            self.stu_fname.clone(),
            self.stu_lname.clone(),
            self.grade.clone(),
            self.school.clone(),
            self.other_id.to_string(),
            self.other_date.clone(),
        ]
    }
}

impl StudentRecord {
    pub fn is_new(&self) -> bool {
        self.other_id < 0
    }

    pub fn grade_number(&self) -> Option<i32> {
        self.grade.trim().parse().ok()
    }
}

/// Columns of the CRM report: every donor column plus the student columns
/// not already present.
pub fn report_headers() -> Vec<&'static str> {
    let mut headers: Vec<&'static str> = DonorRecord::HEADERS.to_vec();
    headers.extend(
        StudentRecord::HEADERS
            .iter()
            .filter(|h| !DonorRecord::HEADERS.contains(h)),
    );
    headers
}

/// Names of the columns whose values differ between two snapshots of a record.
pub fn modified_fields<R: Record>(before: &R, after: &R) -> Vec<&'static str> {
    R::HEADERS
        .iter()
        .zip(before.values().into_iter().zip(after.values()))
        .filter(|(_, (old, new))| old != new)
        .map(|(h, _)| *h)
        .collect()
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// A single row of the district extract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterRecord {
    #[serde(rename = "School")]
    pub school: String,
    #[serde(rename = "SystemID")]
    pub system_id: String,
    #[serde(rename = "Family_Ident")]
    pub family_ident: String,
    #[serde(rename = "Student Last Name")]
    pub student_last_name: String,
    #[serde(rename = "Student First Name")]
    pub student_first_name: String,
    #[serde(rename = "Grade")]
    pub grade: String,
    #[serde(rename = "Guardian")]
    pub guardian: String,
    #[serde(rename = "GuardianEmail")]
    pub guardian_email: String,

    #[serde(rename = "Contact 1 First Name")]
    pub c1_first_name: String,
    #[serde(rename = "Contact 1 Last Name")]
    pub c1_last_name: String,
    #[serde(rename = "Contact 1 Relationship")]
    pub c1_relationship: String,
    #[serde(rename = "Contact 1 Phone Type")]
    pub c1_phone_type: String,
    #[serde(rename = "Contact 1 Phone")]
    pub c1_phone: String,
    #[serde(rename = "Contact 1 Email")]
    pub c1_email: String,
    #[serde(rename = "Contact 1 Street")]
    pub c1_street: String,
    #[serde(rename = "Contact 1 City")]
    pub c1_city: String,
    #[serde(rename = "Contact 1 State")]
    pub c1_state: String,
    #[serde(rename = "Contact 1 Zip")]
    pub c1_zip: String,

    #[serde(rename = "Contact 2 First Name")]
    pub c2_first_name: String,
    #[serde(rename = "Contact 2 Last Name")]
    pub c2_last_name: String,
    #[serde(rename = "Contact 2 Relationship")]
    pub c2_relationship: String,
    #[serde(rename = "Contact 2 Phone Type")]
    pub c2_phone_type: String,
    #[serde(rename = "Contact 2 Phone")]
    pub c2_phone: String,
    #[serde(rename = "Contact 2 Email")]
    pub c2_email: String,
    #[serde(rename = "Contact 2 Street")]
    pub c2_street: String,
    #[serde(rename = "Contact 2 City")]
    pub c2_city: String,
    #[serde(rename = "Contact 2 State")]
    pub c2_state: String,
    #[serde(rename = "Contact 2 Zip")]
    pub c2_zip: String,
}

pub const ROSTER_HEADERS: &[&str] = &[
    "School",
    "SystemID",
    "Family_Ident",
    "Student Last Name",
    "Student First Name",
    "Grade",
    "Guardian",
    "GuardianEmail",
    "Contact 1 First Name",
    "Contact 1 Last Name",
    "Contact 1 Relationship",
    "Contact 1 Phone Type",
    "Contact 1 Phone",
    "Contact 1 Email",
    "Contact 1 Street",
    "Contact 1 City",
    "Contact 1 State",
    "Contact 1 Zip",
    "Contact 2 First Name",
    "Contact 2 Last Name",
    "Contact 2 Relationship",
    "Contact 2 Phone Type",
    "Contact 2 Phone",
    "Contact 2 Email",
    "Contact 2 Street",
    "Contact 2 City",
    "Contact 2 State",
    "Contact 2 Zip",
];

/// Borrowed view of one roster contact.
#[derive(Debug, Clone, Copy)]
pub struct Contact<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub relationship: &'a str,
    pub phone_type: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub street: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub zip: &'a str,
}

impl Contact<'_> {
    pub fn address_line(&self) -> String {
        format!("{} {} {} {}", self.street, self.city, self.state, self.zip)
    }
}

impl RosterRecord {
    pub fn contact1(&self) -> Contact<'_> {
        Contact {
            first_name: self.c1_first_name.trim(),
            last_name: self.c1_last_name.trim(),
            relationship: self.c1_relationship.trim(),
            phone_type: self.c1_phone_type.trim(),
            phone: self.c1_phone.trim(),
            email: self.c1_email.trim(),
            street: self.c1_street.trim(),
            city: self.c1_city.trim(),
            state: self.c1_state.trim(),
            zip: self.c1_zip.trim(),
        }
    }

    pub fn contact2(&self) -> Contact<'_> {
        Contact {
            first_name: self.c2_first_name.trim(),
            last_name: self.c2_last_name.trim(),
            relationship: self.c2_relationship.trim(),
            phone_type: self.c2_phone_type.trim(),
            phone: self.c2_phone.trim(),
            email: self.c2_email.trim(),
            street: self.c2_street.trim(),
            city: self.c2_city.trim(),
            state: self.c2_state.trim(),
            zip: self.c2_zip.trim(),
        }
    }

    pub fn student_name(&self) -> String {
        format!("{} {}", self.student_first_name.trim(), self.student_last_name.trim())
    }
}

/// Pre-loaded roster records in file order.
pub struct SyncInput {
    pub roster: Vec<RosterRecord>,
}

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Beginning of the school year: grades advance and missing 8th graders graduate.
    NewYearImport,
    MidYearUpdate,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewYearImport => write!(f, "new_year_import"),
            Self::MidYearUpdate => write!(f, "mid_year_update"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Written to `FY_JOIN_BSD` of new donors, e.g. `SY2016-17`.
    pub school_year: String,
    /// Date stamped into `OTHER_DATE`.
    pub today: chrono::NaiveDate,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Which step of the fallback chain resolved a roster student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Existing,
    Sibling,
    MatchKey,
    AlternateHousehold,
    SwappedParents,
    NewDonor,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Sibling => write!(f, "sibling"),
            Self::MatchKey => write!(f, "match_key"),
            Self::AlternateHousehold => write!(f, "alternate_household"),
            Self::SwappedParents => write!(f, "swapped_parents"),
            Self::NewDonor => write!(f, "new_donor"),
        }
    }
}

/// Outcome of matching one roster student.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub stu_number: String,
    pub strategy: MatchStrategy,
    pub donor_ids: Vec<i64>,
}

/// Non-fatal oddity found while matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Two existing donors produce the same match key; the lower id is kept.
    KeyCollision { key: String, kept: i64, ignored: i64 },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyCollision { key, kept, ignored } => {
                write!(f, "duplicate match key '{key}' for donors {kept} and {ignored}")
            }
        }
    }
}

/// Household that needs a person to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewNote {
    pub stu_number: String,
    pub student_name: String,
    pub donor_addresses: BTreeMap<i64, String>,
    pub roster_addresses: Vec<String>,
}

impl std::fmt::Display for ReviewNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Found MANUAL UPDATE for student {} ({}) with {} donor records:",
            self.student_name,
            self.stu_number,
            self.donor_addresses.len()
        )?;
        for (donor_id, address) in &self.donor_addresses {
            writeln!(f, "  Donor {donor_id} address: {address}")?;
        }
        for address in &self.roster_addresses {
            writeln!(f, "  District address: {address}")?;
        }
        writeln!(f)
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub roster_students: usize,
    pub crm_donors: usize,
    pub crm_students: usize,
    pub student_updates: usize,
    pub new_students: usize,
    pub new_donor_students: usize,
    pub donor_updates: usize,
    pub new_donors: usize,
    pub manual_reviews: usize,
    pub anomalies: usize,
    pub strategy_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncMeta {
    pub mode: Option<RunMode>,
    pub school_year: Option<String>,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub meta: SyncMeta,
    pub summary: SyncSummary,
    pub matches: Vec<MatchOutcome>,
    pub anomalies: Vec<Anomaly>,
    pub notes: Vec<ReviewNote>,
    #[serde(skip)]
    pub diff: crate::diff::DiffSet,
}
