use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub schools: SchoolConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Schools
// ---------------------------------------------------------------------------

/// School codes as stored in the CRM `SCHOOL` / `HOME_SCHOOL` columns.
///
/// `mapping` translates the district's school names to CRM codes. Every
/// mapped code other than `intermediate` is treated as an elementary school.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchoolConfig {
    #[serde(default = "default_intermediate")]
    pub intermediate: String,
    #[serde(default = "default_alumni")]
    pub alumni: String,
    #[serde(default = "default_out_of_district")]
    pub out_of_district: String,
    #[serde(default = "default_multiple")]
    pub multiple: String,
    #[serde(default = "default_mapping")]
    pub mapping: BTreeMap<String, String>,
}

fn default_intermediate() -> String {
    "BIS".into()
}

fn default_alumni() -> String {
    "ALUM".into()
}

fn default_out_of_district() -> String {
    "NOBSD".into()
}

fn default_multiple() -> String {
    "MULTIPLE".into()
}

fn default_mapping() -> BTreeMap<String, String> {
    [
        ("BIS", "BIS"),
        ("Franklin", "FRANKLIN"),
        ("Hoover", "HOOVER"),
        ("Lincoln", "LINCOLN"),
        ("McKinley", "MCKINLEY"),
        ("Roosevelt", "ROOSEVELT"),
        ("Washington", "WASHINGTON"),
    ]
    .into_iter()
    .map(|(name, code)| (name.to_string(), code.to_string()))
    .collect()
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            intermediate: default_intermediate(),
            alumni: default_alumni(),
            out_of_district: default_out_of_district(),
            multiple: default_multiple(),
            mapping: default_mapping(),
        }
    }
}

impl SchoolConfig {
    /// CRM code for a district school name.
    pub fn code_for(&self, district_name: &str) -> Option<&str> {
        self.mapping.get(district_name.trim()).map(String::as_str)
    }

    pub fn is_elementary(&self, code: &str) -> bool {
        code != self.intermediate && self.mapping.values().any(|c| c == code)
    }

    /// Enrolled in the district (alumni still count as enrolled for mail purposes).
    pub fn is_enrolled(&self, code: &str) -> bool {
        code != self.out_of_district
    }

    /// Attending one of the district's schools this year.
    pub fn is_active(&self, code: &str) -> bool {
        !code.is_empty() && code != self.out_of_district && code != self.alumni
    }
}

// ---------------------------------------------------------------------------
// Mail flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    /// `NOMAIL_REASON` written when a donor has no enrolled students.
    #[serde(default = "default_inactive")]
    pub inactive_reason: String,
    /// `DONOR_TYPE` for donors without enrolled students.
    #[serde(default = "default_inactive")]
    pub inactive_type: String,
    /// `DONOR_TYPE` for donors with at least one enrolled student.
    #[serde(default = "default_active_type")]
    pub active_type: String,
    /// Refuse CRM exports that carry no `NOMAIL=Y` rows.
    #[serde(default = "default_true")]
    pub require_nomail_rows: bool,
}

fn default_inactive() -> String {
    "NO".into()
}

fn default_active_type() -> String {
    "IN".into()
}

fn default_true() -> bool {
    true
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            inactive_reason: default_inactive(),
            inactive_type: default_inactive(),
            active_type: default_active_type(),
            require_nomail_rows: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_student_updates")]
    pub student_updates: String,
    #[serde(default = "default_new_students")]
    pub new_students: String,
    #[serde(default = "default_new_donors")]
    pub new_donors: String,
    #[serde(default = "default_donor_updates")]
    pub donor_updates: String,
    #[serde(default = "default_manual_updates")]
    pub manual_updates: String,
    /// Donor file written by a scrub-only run.
    #[serde(default = "default_scrub_updates")]
    pub scrub_updates: String,
}

fn default_student_updates() -> String {
    "01-student-updates.csv".into()
}

fn default_new_students() -> String {
    "02-new-students.csv".into()
}

fn default_new_donors() -> String {
    "03-new-donors.csv".into()
}

fn default_donor_updates() -> String {
    "04-donor-updates.csv".into()
}

fn default_manual_updates() -> String {
    "05-donor-manual-updates.txt".into()
}

fn default_scrub_updates() -> String {
    "donor-updates.csv".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            student_updates: default_student_updates(),
            new_students: default_new_students(),
            new_donors: default_new_donors(),
            donor_updates: default_donor_updates(),
            manual_updates: default_manual_updates(),
            scrub_updates: default_scrub_updates(),
        }
    }
}

impl OutputConfig {
    fn names(&self) -> [&str; 6] {
        [
            &self.student_updates,
            &self.new_students,
            &self.new_donors,
            &self.donor_updates,
            &self.manual_updates,
            &self.scrub_updates,
        ]
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            toml::from_str(input).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let s = &self.schools;
        for (name, code) in [
            ("schools.intermediate", &s.intermediate),
            ("schools.alumni", &s.alumni),
            ("schools.out_of_district", &s.out_of_district),
            ("schools.multiple", &s.multiple),
            ("mail.inactive_reason", &self.mail.inactive_reason),
            ("mail.inactive_type", &self.mail.inactive_type),
            ("mail.active_type", &self.mail.active_type),
        ] {
            if code.trim().is_empty() {
                return Err(SyncError::ConfigValidation(format!("{name} must not be empty")));
            }
        }

        if s.mapping.is_empty() {
            return Err(SyncError::ConfigValidation(
                "schools.mapping must map at least one district school".into(),
            ));
        }

        if !s.mapping.values().any(|c| *c == s.intermediate) {
            return Err(SyncError::ConfigValidation(format!(
                "intermediate school '{}' is not a value of schools.mapping",
                s.intermediate
            )));
        }

        for reserved in [&s.alumni, &s.out_of_district, &s.multiple] {
            if s.mapping.values().any(|c| c == reserved) {
                return Err(SyncError::ConfigValidation(format!(
                    "'{reserved}' is reserved and cannot be a district school code"
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for name in self.output.names() {
            if name.trim().is_empty() {
                return Err(SyncError::ConfigValidation("output file names must not be empty".into()));
            }
            if !seen.insert(name) {
                return Err(SyncError::ConfigValidation(format!(
                    "output file '{name}' is used twice"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
