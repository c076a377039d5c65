use std::collections::{BTreeMap, HashMap};

use crate::error::SyncError;
use crate::model::{modified_fields, DonorRecord, StudentRecord};

/// Hands out negative placeholder ids for records that do not exist in the
/// CRM yet. Each kind has its own counter: -1, -2, -3, ...
#[derive(Debug, Default)]
pub struct IdSequence {
    last_donor: i64,
    last_student: i64,
}

impl IdSequence {
    pub fn next_donor_id(&mut self) -> i64 {
        self.last_donor -= 1;
        self.last_donor
    }

    pub fn next_student_id(&mut self) -> i64 {
        self.last_student -= 1;
        self.last_student
    }
}

/// In-memory donors and students with the as-loaded snapshot used for diffing.
#[derive(Debug, Default)]
pub struct Repository {
    donors: BTreeMap<i64, DonorRecord>,
    students: BTreeMap<i64, StudentRecord>,
    loaded_donors: BTreeMap<i64, DonorRecord>,
    loaded_students: BTreeMap<i64, StudentRecord>,
    students_by_donor: HashMap<i64, Vec<i64>>,
    students_by_number: HashMap<String, Vec<i64>>,
    ids: IdSequence,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one CRM report row. A donor repeated across rows must carry
    /// identical values every time.
    pub fn load_row(&mut self, donor: DonorRecord, student: StudentRecord) -> Result<(), SyncError> {
        match self.loaded_donors.get(&donor.donor_id) {
            Some(existing) => {
                if *existing != donor {
                    return Err(SyncError::DonorMismatch {
                        donor_id: donor.donor_id,
                        fields: modified_fields(existing, &donor)
                            .into_iter()
                            .map(String::from)
                            .collect(),
                    });
                }
            }
            None => {
                self.loaded_donors.insert(donor.donor_id, donor.clone());
                self.add_donor(donor)?;
            }
        }

        self.add_student(student.clone())?;
        self.loaded_students.insert(student.other_id, student);
        Ok(())
    }

    pub fn add_donor(&mut self, donor: DonorRecord) -> Result<(), SyncError> {
        if self.donors.contains_key(&donor.donor_id) {
            return Err(SyncError::DuplicateId {
                record: "donor",
                id: donor.donor_id.to_string(),
            });
        }
        self.donors.insert(donor.donor_id, donor);
        Ok(())
    }

    pub fn add_student(&mut self, student: StudentRecord) -> Result<(), SyncError> {
        if !self.donors.contains_key(&student.donor_id) {
            return Err(SyncError::UnknownDonor {
                other_id: student.other_id,
                donor_id: student.donor_id,
            });
        }
        if self.students.contains_key(&student.other_id) {
            return Err(SyncError::DuplicateId {
                record: "student",
                id: student.other_id.to_string(),
            });
        }

        let other_id = student.other_id;
        self.students_by_donor.entry(student.donor_id).or_default().push(other_id);
        if !student.stu_number.is_empty() {
            self.students_by_number
                .entry(student.stu_number.clone())
                .or_default()
                .push(other_id);
        }
        self.students.insert(other_id, student);
        Ok(())
    }

    pub fn next_donor_id(&mut self) -> i64 {
        self.ids.next_donor_id()
    }

    pub fn next_student_id(&mut self) -> i64 {
        self.ids.next_student_id()
    }

    // -- donors --------------------------------------------------------------

    pub fn donor(&self, donor_id: i64) -> Option<&DonorRecord> {
        self.donors.get(&donor_id)
    }

    pub fn donor_mut(&mut self, donor_id: i64) -> Option<&mut DonorRecord> {
        self.donors.get_mut(&donor_id)
    }

    pub fn donors(&self) -> impl Iterator<Item = &DonorRecord> {
        self.donors.values()
    }

    pub fn donor_ids(&self) -> Vec<i64> {
        self.donors.keys().copied().collect()
    }

    pub fn loaded_donor(&self, donor_id: i64) -> Option<&DonorRecord> {
        self.loaded_donors.get(&donor_id)
    }

    pub fn loaded_donor_count(&self) -> usize {
        self.loaded_donors.len()
    }

    // -- students ------------------------------------------------------------

    pub fn student(&self, other_id: i64) -> Option<&StudentRecord> {
        self.students.get(&other_id)
    }

    pub fn student_mut(&mut self, other_id: i64) -> Option<&mut StudentRecord> {
        self.students.get_mut(&other_id)
    }

    pub fn students(&self) -> impl Iterator<Item = &StudentRecord> {
        self.students.values()
    }

    pub fn student_ids(&self) -> Vec<i64> {
        self.students.keys().copied().collect()
    }

    pub fn loaded_student(&self, other_id: i64) -> Option<&StudentRecord> {
        self.loaded_students.get(&other_id)
    }

    pub fn loaded_student_ids(&self) -> Vec<i64> {
        self.loaded_students.keys().copied().collect()
    }

    pub fn students_for_donor(&self, donor_id: i64) -> Vec<&StudentRecord> {
        self.students_by_donor
            .get(&donor_id)
            .map(|ids| ids.iter().filter_map(|id| self.students.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn students_for_number(&self, stu_number: &str) -> Vec<&StudentRecord> {
        self.students_by_number
            .get(stu_number)
            .map(|ids| ids.iter().filter_map(|id| self.students.get(id)).collect())
            .unwrap_or_default()
    }

    /// Distinct donors linked to a student number, in link order.
    pub fn donor_ids_for_number(&self, stu_number: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::new();
        for student in self.students_for_number(stu_number) {
            if !ids.contains(&student.donor_id) {
                ids.push(student.donor_id);
            }
        }
        ids
    }

    /// Current state joined back into report rows (one per student link).
    pub fn report_rows(&self) -> Vec<(&DonorRecord, &StudentRecord)> {
        self.students
            .values()
            .filter_map(|s| self.donors.get(&s.donor_id).map(|d| (d, s)))
            .collect()
    }
}
