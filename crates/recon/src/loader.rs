use std::collections::{BTreeSet, HashSet};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::{report_headers, DonorRecord, RosterRecord, StudentRecord, ROSTER_HEADERS};
use crate::repository::Repository;

/// The file must carry exactly the expected columns, in any order.
pub fn validate_headers(file: &str, expected: &[&str], actual: &csv::StringRecord) -> Result<(), SyncError> {
    let expected: BTreeSet<&str> = expected.iter().copied().collect();
    let actual: BTreeSet<&str> = actual.iter().collect();

    let missing: Vec<String> = expected.difference(&actual).map(|h| h.to_string()).collect();
    let extra: Vec<String> = actual.difference(&expected).map(|h| h.to_string()).collect();

    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(SyncError::HeaderMismatch {
            file: file.into(),
            missing,
            extra,
        })
    }
}

fn reader(csv_data: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.trim_start_matches('\u{feff}').as_bytes())
}

fn csv_err(file: &str, e: impl std::fmt::Display) -> SyncError {
    SyncError::Csv {
        file: file.into(),
        message: e.to_string(),
    }
}

/// Load a CRM report (one row per donor/student link) into a repository.
pub fn load_crm_report(file: &str, csv_data: &str, config: &SyncConfig) -> Result<Repository, SyncError> {
    let mut reader = reader(csv_data);
    let headers = reader.headers().map_err(|e| csv_err(file, e))?.clone();
    validate_headers(file, &report_headers(), &headers)?;

    let donor_idx = headers.iter().position(|h| h == "DONOR_ID");
    let other_idx = headers.iter().position(|h| h == "OTHER_ID");

    let mut repo = Repository::new();
    let mut includes_nomail = false;
    let mut rows = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| csv_err(file, e))?;

        if donor_idx.and_then(|i| record.get(i)).map_or(true, |v| v.trim().is_empty()) {
            return Err(SyncError::MissingField { record: "donor", field: "DONOR_ID" });
        }
        if other_idx.and_then(|i| record.get(i)).map_or(true, |v| v.trim().is_empty()) {
            return Err(SyncError::MissingField { record: "student", field: "OTHER_ID" });
        }

        let donor: DonorRecord = record.deserialize(Some(&headers)).map_err(|e| csv_err(file, e))?;
        let student: StudentRecord = record.deserialize(Some(&headers)).map_err(|e| csv_err(file, e))?;

        includes_nomail |= donor.has_nomail();
        repo.load_row(donor, student)?;
        rows += 1;
    }

    if config.mail.require_nomail_rows && !includes_nomail {
        return Err(SyncError::MissingNoMailRows { file: file.into() });
    }

    log::info!(
        "{file}: read {rows} report rows ({} donors)",
        repo.loaded_donor_count()
    );
    Ok(repo)
}

/// Load the district roster, keeping file order. Student numbers must be unique.
pub fn load_roster(file: &str, csv_data: &str) -> Result<Vec<RosterRecord>, SyncError> {
    let mut reader = reader(csv_data);
    let headers = reader.headers().map_err(|e| csv_err(file, e))?.clone();
    validate_headers(file, ROSTER_HEADERS, &headers)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut roster = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| csv_err(file, e))?;
        let mut row: RosterRecord = record.deserialize(Some(&headers)).map_err(|e| csv_err(file, e))?;

        row.system_id = row.system_id.trim().to_string();
        row.family_ident = row.family_ident.trim().to_string();
        if row.system_id.is_empty() {
            return Err(SyncError::MissingField { record: "roster", field: "SystemID" });
        }
        if !seen.insert(row.system_id.clone()) {
            return Err(SyncError::DuplicateId {
                record: "roster",
                id: row.system_id,
            });
        }
        roster.push(row);
    }

    log::info!("{file}: read {} roster records", roster.len());
    Ok(roster)
}
