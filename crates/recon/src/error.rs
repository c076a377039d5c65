use std::fmt;

#[derive(Debug)]
pub enum SyncError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty code, bad school reference, etc.).
    ConfigValidation(String),
    /// Input file does not carry exactly the expected header set.
    HeaderMismatch {
        file: String,
        missing: Vec<String>,
        extra: Vec<String>,
    },
    /// Malformed CSV row.
    Csv { file: String, message: String },
    /// Roster grade outside TK, K, -1..=8.
    GradeOutOfRange { stu_number: String, value: String },
    /// Roster school name with no CRM code mapping.
    UnknownSchool { stu_number: String, school: String },
    /// A join id is missing on a record.
    MissingField { record: &'static str, field: &'static str },
    /// A student references a donor that is not registered.
    UnknownDonor { other_id: i64, donor_id: i64 },
    /// A record id was registered twice.
    DuplicateId { record: &'static str, id: String },
    /// The same donor appears in several report rows with different values.
    DonorMismatch { donor_id: i64, fields: Vec<String> },
    /// The CRM export was generated without "no mail" names.
    MissingNoMailRows { file: String },
    /// IO error (file read/write).
    Io(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::HeaderMismatch { file, missing, extra } => {
                write!(f, "{file}: header mismatch")?;
                if !missing.is_empty() {
                    write!(f, "; missing {}", missing.join(", "))?;
                }
                if !extra.is_empty() {
                    write!(f, "; unexpected {}", extra.join(", "))?;
                }
                Ok(())
            }
            Self::Csv { file, message } => write!(f, "{file}: {message}"),
            Self::GradeOutOfRange { stu_number, value } => {
                write!(f, "student '{stu_number}': grade '{value}' is out of range")
            }
            Self::UnknownSchool { stu_number, school } => {
                write!(f, "student '{stu_number}': no school code for '{school}'")
            }
            Self::MissingField { record, field } => write!(f, "{record} record: {field} required"),
            Self::UnknownDonor { other_id, donor_id } => {
                write!(f, "student {other_id}: donor {donor_id} is not registered")
            }
            Self::DuplicateId { record, id } => write!(f, "{record} id {id} already present"),
            Self::DonorMismatch { donor_id, fields } => write!(
                f,
                "donor {donor_id}: report rows disagree on {}",
                fields.join(", ")
            ),
            Self::MissingNoMailRows { file } => write!(
                f,
                "{file}: no NOMAIL=Y rows; regenerate the report with \"no mail\" names included"
            ),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
