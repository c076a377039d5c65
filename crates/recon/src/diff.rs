use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::config::OutputConfig;
use crate::error::SyncError;
use crate::model::{modified_fields, report_headers, DonorRecord, Record, ReviewNote, StudentRecord};
use crate::repository::Repository;

/// Audit column listing the changed columns of an updated record.
pub const MODIFIED_FIELDS: &str = "_MODIFIED_FIELDS";

/// Date format of `OTHER_DATE`.
pub const OTHER_DATE_FORMAT: &str = "%m/%d/%Y";

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One import file: a header row and its data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DiffTable {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let i = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row).and_then(|r| r.get(i)).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffKind {
    /// Full roster run: four CSV files and the review notes.
    #[default]
    Sync,
    /// Scrub-only run: donor updates alone.
    Scrub,
}

/// Everything a run asks the operator to import, split by import file.
#[derive(Debug, Clone, Default)]
pub struct DiffSet {
    pub kind: DiffKind,
    pub student_updates: DiffTable,
    pub new_students: DiffTable,
    pub new_donors: DiffTable,
    pub donor_updates: DiffTable,
    pub notes: Vec<ReviewNote>,
}

impl DiffSet {
    /// True when the run found nothing to import and nothing to review.
    pub fn is_empty(&self) -> bool {
        self.student_updates.is_empty()
            && self.new_students.is_empty()
            && self.new_donors.is_empty()
            && self.donor_updates.is_empty()
            && self.notes.is_empty()
    }

    /// Write the import files into `dir`. Files are written even when empty so
    /// a stale file from an earlier run is never mistaken for this one's.
    pub fn write_to_dir(&self, dir: &Path, output: &OutputConfig) -> Result<Vec<PathBuf>, SyncError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| SyncError::Io(format!("cannot create {}: {e}", dir.display())))?;

        let mut written = Vec::new();
        match self.kind {
            DiffKind::Scrub => {
                written.push(write_table(&dir.join(&output.scrub_updates), &self.donor_updates)?);
            }
            DiffKind::Sync => {
                written.push(write_table(&dir.join(&output.student_updates), &self.student_updates)?);
                written.push(write_table(&dir.join(&output.new_students), &self.new_students)?);
                written.push(write_table(&dir.join(&output.new_donors), &self.new_donors)?);
                written.push(write_table(&dir.join(&output.donor_updates), &self.donor_updates)?);

                let path = dir.join(&output.manual_updates);
                let text: String = self.notes.iter().map(ToString::to_string).collect();
                std::fs::write(&path, text)
                    .map_err(|e| SyncError::Io(format!("cannot write {}: {e}", path.display())))?;
                written.push(path);
            }
        }

        for path in &written {
            log::info!("wrote {}", path.display());
        }
        Ok(written)
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, SyncError> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .map_err(|e| SyncError::Io(format!("cannot write {}: {e}", path.display())))
}

fn write_table(path: &Path, table: &DiffTable) -> Result<PathBuf, SyncError> {
    let err = |e: csv::Error| SyncError::Io(format!("cannot write {}: {e}", path.display()));

    let mut writer = csv_writer(path)?;
    writer.write_record(&table.headers).map_err(err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(err)?;
    }
    writer.flush().map_err(|e| SyncError::Io(e.to_string()))?;
    Ok(path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

fn columns_of<R: Record>(record: &R) -> HashMap<&'static str, String> {
    R::HEADERS.iter().copied().zip(record.values()).collect()
}

fn project(headers: &[&'static str], columns: &HashMap<&'static str, String>) -> Vec<String> {
    headers
        .iter()
        .map(|h| columns.get(h).cloned().unwrap_or_default())
        .collect()
}

fn with_audit_column(headers: &[&'static str]) -> Vec<&'static str> {
    let mut headers = headers.to_vec();
    headers.push(MODIFIED_FIELDS);
    headers
}

/// New records in the order they were created (-1, -2, ...).
fn new_students(repo: &Repository) -> Vec<&StudentRecord> {
    let mut students: Vec<&StudentRecord> = repo.students().filter(|s| s.is_new()).collect();
    students.sort_by_key(|s| std::cmp::Reverse(s.other_id));
    students
}

fn donor_updates(repo: &Repository) -> DiffTable {
    let mut table = DiffTable::new(&with_audit_column(DonorRecord::HEADERS));
    for donor in repo.donors().filter(|d| !d.is_new()) {
        let Some(loaded) = repo.loaded_donor(donor.donor_id) else {
            continue;
        };
        let modified = modified_fields(loaded, donor);
        if modified.is_empty() {
            continue;
        }
        let mut row = donor.values();
        row.push(modified.join("|"));
        table.rows.push(row);
    }
    table
}

/// Compare the repository against its as-loaded snapshot.
pub fn build_diff(repo: &Repository, notes: Vec<ReviewNote>, today: NaiveDate) -> DiffSet {
    let run_date = today.format(OTHER_DATE_FORMAT).to_string();

    let mut student_updates = DiffTable::new(&with_audit_column(StudentRecord::HEADERS));
    for student in repo.students().filter(|s| !s.is_new()) {
        let Some(loaded) = repo.loaded_student(student.other_id) else {
            continue;
        };
        let modified = modified_fields(loaded, student);
        if modified.is_empty() {
            continue;
        }
        let mut out = student.clone();
        if out.other_date.trim().is_empty() {
            out.other_date = run_date.clone();
        }
        let mut row = out.values();
        row.push(modified.join("|"));
        student_updates.rows.push(row);
    }

    let student_headers: Vec<&'static str> = StudentRecord::HEADERS
        .iter()
        .copied()
        .filter(|h| *h != "OTHER_ID")
        .collect();
    let combined_headers: Vec<&'static str> = report_headers()
        .into_iter()
        .filter(|h| *h != "DONOR_ID" && *h != "OTHER_ID")
        .collect();

    let mut new_students_table = DiffTable::new(&student_headers);
    let mut new_donors_table = DiffTable::new(&combined_headers);
    for student in new_students(repo) {
        let Some(donor) = repo.donor(student.donor_id) else {
            continue;
        };
        if donor.is_new() {
            let mut columns = columns_of(donor);
            columns.extend(columns_of(student));
            new_donors_table.rows.push(project(&combined_headers, &columns));
        } else {
            new_students_table.rows.push(project(&student_headers, &columns_of(student)));
        }
    }

    let diff = DiffSet {
        kind: DiffKind::Sync,
        student_updates,
        new_students: new_students_table,
        new_donors: new_donors_table,
        donor_updates: donor_updates(repo),
        notes,
    };
    log::info!(
        "diff: {} student updates, {} new students, {} new-donor rows, {} donor updates",
        diff.student_updates.len(),
        diff.new_students.len(),
        diff.new_donors.len(),
        diff.donor_updates.len()
    );
    diff
}

/// Donor updates only, for scrub-only runs.
pub fn build_scrub_diff(repo: &Repository) -> DiffSet {
    DiffSet {
        kind: DiffKind::Scrub,
        donor_updates: donor_updates(repo),
        ..Default::default()
    }
}

/// Write the current state in CRM report shape, one row per student link.
pub fn write_snapshot(repo: &Repository, path: &Path) -> Result<(), SyncError> {
    let headers = report_headers();
    let mut table = DiffTable::new(&headers);
    for (donor, student) in repo.report_rows() {
        let mut columns = columns_of(donor);
        columns.extend(columns_of(student));
        table.rows.push(project(&headers, &columns));
    }
    write_table(path, &table)?;
    log::info!("wrote snapshot {} ({} rows)", path.display(), table.len());
    Ok(())
}
