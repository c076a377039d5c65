//! Grade and school bookkeeping for CRM student records.

use std::collections::HashMap;

use crate::config::SchoolConfig;
use crate::error::SyncError;
use crate::model::{RosterRecord, RunMode, StudentRecord};
use crate::repository::Repository;

/// Last grade taught in the district.
pub const FINAL_GRADE: i32 = 8;

/// The district lists 6th graders under their elementary school.
const INTERMEDIATE_ENTRY_GRADE: i32 = 6;

/// CRM grade for a roster record: `TK` is -1, `K` is 0.
pub fn roster_grade(record: &RosterRecord) -> Result<i32, SyncError> {
    let raw = record.grade.trim();
    let grade = match raw.to_ascii_uppercase().as_str() {
        "TK" => -1,
        "K" => 0,
        _ => raw.parse::<i32>().map_err(|_| SyncError::GradeOutOfRange {
            stu_number: record.system_id.clone(),
            value: raw.into(),
        })?,
    };

    if !(-1..=FINAL_GRADE).contains(&grade) {
        return Err(SyncError::GradeOutOfRange {
            stu_number: record.system_id.clone(),
            value: raw.into(),
        });
    }
    Ok(grade)
}

/// CRM school code for a roster record in the given grade.
pub fn roster_school(record: &RosterRecord, grade: i32, schools: &SchoolConfig) -> Result<String, SyncError> {
    if grade == INTERMEDIATE_ENTRY_GRADE {
        return Ok(schools.intermediate.clone());
    }
    schools
        .code_for(&record.school)
        .map(String::from)
        .ok_or_else(|| SyncError::UnknownSchool {
            stu_number: record.system_id.clone(),
            school: record.school.clone(),
        })
}

/// New CRM student for a roster record, not yet linked to a donor.
pub fn student_from_roster(
    record: &RosterRecord,
    schools: &SchoolConfig,
    other_date: &str,
) -> Result<StudentRecord, SyncError> {
    let grade = roster_grade(record)?;
    Ok(StudentRecord {
        donor_id: 0,
        stu_number: record.system_id.clone(),
        stu_fname: record.student_first_name.trim().to_string(),
        stu_lname: record.student_last_name.trim().to_string(),
        grade: grade.to_string(),
        school: roster_school(record, grade, schools)?,
        other_id: 0,
        other_date: other_date.to_string(),
    })
}

/// Advance a student one grade for the new school year. Students leaving the
/// final grade at the intermediate school become alumni.
pub fn promote(student: &mut StudentRecord, schools: &SchoolConfig) {
    advance_grade(student);
    graduate(student, schools);
}

fn advance_grade(student: &mut StudentRecord) {
    if let Some(grade) = student.grade_number() {
        if grade <= FINAL_GRADE {
            student.grade = (grade + 1).to_string();
        }
    }
}

fn graduate(student: &mut StudentRecord, schools: &SchoolConfig) -> bool {
    if student.grade_number() == Some(FINAL_GRADE + 1) && student.school == schools.intermediate {
        student.school = schools.alumni.clone();
        return true;
    }
    false
}

/// Refresh every student loaded from the CRM against the roster.
///
/// Returning students take grade and school from the roster. Students missing
/// from it graduate (new-year import, leaving the intermediate school) or are
/// marked out of district.
pub fn update_loaded_students(
    repo: &mut Repository,
    roster: &HashMap<&str, &RosterRecord>,
    mode: RunMode,
    schools: &SchoolConfig,
) -> Result<usize, SyncError> {
    let mut returning = 0;

    for other_id in repo.loaded_student_ids() {
        let Some(student) = repo.student_mut(other_id) else {
            continue;
        };

        if mode == RunMode::NewYearImport {
            advance_grade(student);
        }

        if let Some(record) = roster.get(student.stu_number.as_str()) {
            let grade = roster_grade(record)?;
            student.grade = grade.to_string();
            student.school = roster_school(record, grade, schools)?;
            returning += 1;
        } else if mode == RunMode::NewYearImport && graduate(student, schools) {
            log::debug!("student {} graduated", student.stu_number);
        } else if student.school != schools.alumni {
            student.school = schools.out_of_district.clone();
        }
    }

    log::info!("{returning} returning students refreshed from roster");
    Ok(returning)
}

/// New-year import: students inserted during this run advance with everyone else.
pub fn promote_new_students(repo: &mut Repository, schools: &SchoolConfig) -> usize {
    let mut promoted = 0;
    for other_id in repo.student_ids() {
        if let Some(student) = repo.student_mut(other_id) {
            if student.is_new() {
                promote(student, schools);
                promoted += 1;
            }
        }
    }
    promoted
}
