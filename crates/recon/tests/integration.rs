use std::path::PathBuf;

use chrono::NaiveDate;

use donorsync_recon::diff::MODIFIED_FIELDS;
use donorsync_recon::loader::{load_crm_report, load_roster};
use donorsync_recon::model::{report_headers, MatchStrategy, Record, ROSTER_HEADERS};
use donorsync_recon::{run, run_scrub, Repository, RunMode, RunOptions, SyncConfig, SyncInput, SyncResult};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn options(mode: RunMode) -> RunOptions {
    RunOptions {
        mode,
        school_year: "SY2026-27".into(),
        today: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
    }
}

fn load_and_run(crm: &str, roster: &str, mode: RunMode) -> (Repository, SyncResult) {
    let config = SyncConfig::default();
    let mut repo = load_crm_report("crm-report.csv", crm, &config).unwrap();
    let input = SyncInput {
        roster: load_roster("roster.csv", roster).unwrap(),
    };
    let result = run(&config, &mut repo, &input, &options(mode)).unwrap();
    (repo, result)
}

fn fixture_run() -> (Repository, SyncResult) {
    load_and_run(&fixture("crm-report.csv"), &fixture("roster.csv"), RunMode::MidYearUpdate)
}

/// Row of `table` whose `column` equals `value`.
fn row_where(table: &donorsync_recon::diff::DiffTable, column: &str, value: &str) -> usize {
    (0..table.len())
        .find(|&i| table.get(i, column) == Some(value))
        .unwrap_or_else(|| panic!("no row with {column}={value}"))
}

/// Rewrite a report-shaped CSV so placeholder (negative) ids become real ids,
/// as if the import files had been applied to the CRM.
fn as_imported(snapshot: &str) -> String {
    let mut reader = csv::Reader::from_reader(snapshot.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let donor_idx = headers.iter().position(|h| h == "DONOR_ID").unwrap();
    let other_idx = headers.iter().position(|h| h == "OTHER_ID").unwrap();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).unwrap();
    for record in reader.records() {
        let mut fields: Vec<String> = record.unwrap().iter().map(String::from).collect();
        for idx in [donor_idx, other_idx] {
            let id: i64 = fields[idx].parse().unwrap();
            if id < 0 {
                fields[idx] = (1000 - id).to_string();
            }
        }
        writer.write_record(&fields).unwrap();
    }
    String::from_utf8(writer.into_inner().unwrap()).unwrap()
}

// -------------------------------------------------------------------------
// End to end
// -------------------------------------------------------------------------

#[test]
fn mid_year_summary() {
    let (_, result) = fixture_run();
    let s = &result.summary;

    assert_eq!(s.roster_students, 9);
    assert_eq!(s.crm_donors, 7);
    assert_eq!(s.crm_students, 9);
    assert_eq!(s.student_updates, 4);
    assert_eq!(s.new_students, 2);
    assert_eq!(s.new_donor_students, 2);
    assert_eq!(s.new_donors, 1);
    assert_eq!(s.donor_updates, 5);
    assert_eq!(s.manual_reviews, 1);
    assert_eq!(s.anomalies, 0);

    assert_eq!(s.strategy_counts.get("existing"), Some(&5));
    assert_eq!(s.strategy_counts.get("sibling"), Some(&2));
    assert_eq!(s.strategy_counts.get("match_key"), Some(&1));
    assert_eq!(s.strategy_counts.get("new_donor"), Some(&1));

    assert_eq!(result.meta.mode, Some(RunMode::MidYearUpdate));
    assert_eq!(result.meta.engine_version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn student_updates_carry_modified_fields() {
    let (_, result) = fixture_run();
    let table = &result.diff.student_updates;

    let ana = row_where(table, "OTHER_ID", "9001");
    assert_eq!(table.get(ana, "GRADE"), Some("4"));
    assert_eq!(table.get(ana, MODIFIED_FIELDS), Some("GRADE"));
    assert_eq!(table.get(ana, "OTHER_DATE"), Some("09/02/2024"));

    let ben = row_where(table, "OTHER_ID", "9002");
    assert_eq!(table.get(ben, "SCHOOL"), Some("NOBSD"));
    assert_eq!(table.get(ben, "OTHER_DATE"), Some("09/01/2026"));

    let cy = row_where(table, "OTHER_ID", "9003");
    assert_eq!(table.get(cy, "SCHOOL"), Some("FRANKLIN"));

    let leo = row_where(table, "OTHER_ID", "9009");
    assert_eq!(table.get(leo, MODIFIED_FIELDS), Some("SCHOOL"));
}

#[test]
fn new_students_and_new_donors() {
    let (repo, result) = fixture_run();

    let new_students = &result.diff.new_students;
    let gus = row_where(new_students, "STU_NUMBER", "6001");
    assert_eq!(new_students.get(gus, "DONOR_ID"), Some("100"));
    assert_eq!(new_students.get(gus, "GRADE"), Some("0"));
    assert_eq!(new_students.get(gus, "OTHER_DATE"), Some("09/01/2026"));
    let mia = row_where(new_students, "STU_NUMBER", "6004");
    assert_eq!(new_students.get(mia, "DONOR_ID"), Some("107"));

    // Two siblings, one household.
    let new_donors = &result.diff.new_donors;
    assert_eq!(new_donors.len(), 2);
    for i in 0..2 {
        assert_eq!(new_donors.get(i, "SALUTATION"), Some("Olga and Pete Stone"));
        assert_eq!(new_donors.get(i, "HOME_PHONE"), Some("650-555-0170"));
        assert_eq!(new_donors.get(i, "SPOUSE_MOBILE"), Some("650-555-0171"));
        assert_eq!(new_donors.get(i, "HOME_SCHOOL"), Some("MULTIPLE"));
        assert_eq!(new_donors.get(i, "FY_JOIN_BSD"), Some("SY2026-27"));
    }
    let ivan = row_where(new_donors, "STU_NUMBER", "6003");
    assert_eq!(new_donors.get(ivan, "SCHOOL"), Some("BIS"));

    let stone: Vec<_> = repo.donors().filter(|d| d.is_new()).collect();
    assert_eq!(stone.len(), 1);
    assert_eq!(repo.students_for_donor(stone[0].donor_id).len(), 2);
}

#[test]
fn donor_updates_follow_roster_and_scrub() {
    let (repo, result) = fixture_run();
    let table = &result.diff.donor_updates;

    let garcia = row_where(table, "DONOR_ID", "100");
    assert_eq!(table.get(garcia, "GUARD_EMAIL"), Some("garcia.family@example.com"));
    assert_eq!(table.get(garcia, MODIFIED_FIELDS), Some("GUARD_EMAIL"));

    let reed = row_where(table, "DONOR_ID", "102");
    assert_eq!(table.get(reed, MODIFIED_FIELDS), Some("DONOR_TYPE|NOMAIL|NOMAIL_REASON|HOME_SCHOOL"));
    let d = repo.donor(102).unwrap();
    assert_eq!((d.nomail.as_str(), d.nomail_reason.as_str(), d.donor_type.as_str()), ("Y", "NO", "NO"));

    let park = repo.donor(103).unwrap();
    assert_eq!((park.nomail.as_str(), park.nomail_reason.as_str(), park.donor_type.as_str()), ("N", "", "IN"));
    assert_eq!(park.home_school, "FRANKLIN");

    let holt = row_where(table, "DONOR_ID", "107");
    assert_eq!(table.get(holt, MODIFIED_FIELDS), Some("HOME_SCHOOL"));
    assert_eq!(table.get(holt, "HOME_SCHOOL"), Some("HOOVER"));
}

#[test]
fn reversed_parents_are_swapped() {
    let (repo, result) = fixture_run();
    let ortiz = repo.donor(104).unwrap();

    assert_eq!(ortiz.first_name, "Elena");
    assert_eq!(ortiz.sp_fname, "Luis");
    assert_eq!(ortiz.informal_sal, "Elena and Luis");
    assert_eq!(ortiz.salutation, "Elena and Luis Ortiz");
    assert_eq!(ortiz.email, "elena@example.com");
    assert_eq!(ortiz.spouse_email, "luis.ortiz@example.com");
    assert_eq!(ortiz.mobile_phone, "650-555-0141");

    let table = &result.diff.donor_updates;
    let row = row_where(table, "DONOR_ID", "104");
    let modified = table.get(row, MODIFIED_FIELDS).unwrap();
    assert!(modified.starts_with("FIRST_NAME|SP_FNAME|SALUTATION|INFORMAL_SAL|OPT_LINE"));
    assert!(!modified.contains("LAST_NAME"));
}

#[test]
fn split_household_reported_once() {
    let (repo, result) = fixture_run();

    assert_eq!(result.notes.len(), 1);
    let note = &result.notes[0];
    assert_eq!(note.stu_number, "5005");
    assert_eq!(note.donor_addresses.len(), 2);
    assert!(note.roster_addresses.contains(&"99 New Rd Burlingame CA 94010".to_string()));

    // Multi-donor households keep their CRM addresses.
    assert_eq!(repo.donor(106).unwrap().address, "2 Ash St");
    assert!(result.diff.donor_updates.rows.iter().all(|r| r[0] != "105" && r[0] != "106"));
}

// -------------------------------------------------------------------------
// Idempotency
// -------------------------------------------------------------------------

#[test]
fn second_run_on_imported_state_is_clean() {
    let (repo, _) = fixture_run();

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("snapshot.csv");
    donorsync_recon::diff::write_snapshot(&repo, &path).unwrap();
    let crm = as_imported(&std::fs::read_to_string(&path).unwrap());

    let (_, again) = load_and_run(&crm, &fixture("roster.csv"), RunMode::MidYearUpdate);
    assert_eq!(again.summary.crm_donors, 8);
    assert_eq!(again.summary.crm_students, 13);
    assert!(again.diff.student_updates.is_empty());
    assert!(again.diff.new_students.is_empty());
    assert!(again.diff.new_donors.is_empty());
    assert!(again.diff.donor_updates.is_empty(), "{:?}", again.diff.donor_updates.rows);
    assert_eq!(again.summary.strategy_counts.get("existing"), Some(&9));

    // The split household still needs a person.
    assert_eq!(again.notes.len(), 1);
}

// -------------------------------------------------------------------------
// New-year import
// -------------------------------------------------------------------------

fn report_csv(rows: &[&[(&str, &str)]]) -> String {
    let headers = report_headers();
    let mut out = headers.join(",");
    out.push('\n');
    for row in rows {
        let line: Vec<&str> = headers
            .iter()
            .map(|h| row.iter().find(|(k, _)| k == h).map_or("", |(_, v)| *v))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn roster_csv(rows: &[&[(&str, &str)]]) -> String {
    let mut out = ROSTER_HEADERS.join(",");
    out.push('\n');
    for row in rows {
        let line: Vec<&str> = ROSTER_HEADERS
            .iter()
            .map(|h| row.iter().find(|(k, _)| k == h).map_or("", |(_, v)| *v))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[test]
fn new_year_eighth_grader_graduates_on_insert() {
    let crm = report_csv(&[&[
        ("DONOR_ID", "1"),
        ("FIRST_NAME", "Kay"),
        ("LAST_NAME", "Moss"),
        ("NOMAIL", "Y"),
        ("NOMAIL_REASON", "NO"),
        ("DONOR_TYPE", "NO"),
        ("STU_NUMBER", "50"),
        ("GRADE", "9"),
        ("SCHOOL", "NOBSD"),
        ("OTHER_ID", "10"),
    ]]);
    let roster = roster_csv(&[&[
        ("School", "BIS"),
        ("SystemID", "100"),
        ("Student First Name", "Sam"),
        ("Student Last Name", "Smith"),
        ("Grade", "8"),
        ("Contact 1 First Name", "Pat"),
        ("Contact 1 Last Name", "Smith"),
        ("Contact 1 Street", "4 Hill Rd"),
        ("Contact 1 Zip", "94010"),
    ]]);

    let (repo, result) = load_and_run(&crm, &roster, RunMode::NewYearImport);

    assert_eq!(result.summary.new_donors, 1);
    let rows = &result.diff.new_donors;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.get(0, "LAST_NAME"), Some("Smith"));
    assert_eq!(rows.get(0, "GRADE"), Some("9"));
    assert_eq!(rows.get(0, "SCHOOL"), Some("ALUM"));

    // Alumni still count as enrolled, so the new household receives mail.
    let smith = repo.donors().find(|d| d.is_new()).unwrap();
    assert_eq!(smith.nomail, "N");
    assert_eq!(smith.home_school, "");

    // The out-of-district student already in the CRM is left alone.
    assert!(result.diff.student_updates.is_empty());
    assert_eq!(repo.donor(1).unwrap().nomail, "Y");
}

#[test]
fn new_year_promotes_and_graduates_loaded_students() {
    let donor = [
        ("DONOR_ID", "1"),
        ("FIRST_NAME", "Kay"),
        ("LAST_NAME", "Moss"),
        ("NOMAIL", "Y"),
        ("NOMAIL_REASON", "NO"),
        ("DONOR_TYPE", "NO"),
    ];
    let mut eighth = donor.to_vec();
    eighth.extend([("STU_NUMBER", "50"), ("GRADE", "8"), ("SCHOOL", "BIS"), ("OTHER_ID", "10")]);
    let mut fourth = donor.to_vec();
    fourth.extend([("STU_NUMBER", "51"), ("GRADE", "4"), ("SCHOOL", "HOOVER"), ("OTHER_ID", "11")]);
    let crm = report_csv(&[eighth.as_slice(), fourth.as_slice()]);
    let roster = roster_csv(&[&[
        ("School", "Hoover"),
        ("SystemID", "51"),
        ("Grade", "5"),
        ("Contact 1 First Name", "Kay"),
        ("Contact 1 Last Name", "Moss"),
    ]]);

    let (repo, result) = load_and_run(&crm, &roster, RunMode::NewYearImport);

    let graduate = repo.student(10).unwrap();
    assert_eq!((graduate.grade.as_str(), graduate.school.as_str()), ("9", "ALUM"));
    let returning = repo.student(11).unwrap();
    assert_eq!((returning.grade.as_str(), returning.school.as_str()), ("5", "HOOVER"));

    let moss = repo.donor(1).unwrap();
    assert_eq!((moss.nomail.as_str(), moss.donor_type.as_str()), ("N", "IN"));
    assert_eq!(moss.home_school, "HOOVER");
    assert_eq!(result.summary.student_updates, 2);
}

// -------------------------------------------------------------------------
// Scrub-only
// -------------------------------------------------------------------------

#[test]
fn scrub_only_run() {
    let config = SyncConfig::default();
    let mut repo = load_crm_report("crm-report.csv", &fixture("crm-report.csv"), &config).unwrap();
    let result = run_scrub(&config, &mut repo);

    assert!(result.meta.mode.is_none());
    // The export is already consistent: Park's only student is out of
    // district and every other household has an enrolled student.
    assert!(result.diff.donor_updates.is_empty());
    assert_eq!(repo.donor(103).unwrap().nomail, "Y");

    let tmp = tempfile::tempdir().unwrap();
    let written = result.diff.write_to_dir(tmp.path(), &config.output).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with("donor-updates.csv"));
}

#[test]
fn header_mismatch_is_reported() {
    let roster = fixture("roster.csv").replacen("Family_Ident", "FamilyID", 1);
    let err = load_roster("roster.csv", &roster).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("missing Family_Ident"));
    assert!(msg.contains("unexpected FamilyID"));
}

#[test]
fn donor_columns_round_trip_through_report() {
    let config = SyncConfig::default();
    let repo = load_crm_report("crm-report.csv", &fixture("crm-report.csv"), &config).unwrap();
    let ortiz = repo.donor(104).unwrap();
    assert_eq!(ortiz.value("INFORMAL_SAL").as_deref(), Some("Luis and Elena"));
    assert_eq!(ortiz.value("SPOUSE_MOBILE").as_deref(), Some("650-555-0141"));
}

// -------------------------------------------------------------------------
// Split households
// -------------------------------------------------------------------------

#[test]
fn alternate_household_match_keeps_its_own_address() {
    let crm = report_csv(&[
        &[
            ("DONOR_ID", "1"),
            ("FIRST_NAME", "Kay"),
            ("LAST_NAME", "Moss"),
            ("NOMAIL", "Y"),
            ("STU_NUMBER", "50"),
            ("GRADE", "9"),
            ("SCHOOL", "NOBSD"),
            ("OTHER_ID", "10"),
        ],
        &[
            ("DONOR_ID", "6"),
            ("FIRST_NAME", "Mary Ann"),
            ("LAST_NAME", "Lee"),
            ("ADDRESS", "400 Elm St"),
            ("CITY", "Burlingame"),
            ("STATE", "CA"),
            ("ZIP", "94010"),
            ("NOMAIL", "N"),
            ("STU_NUMBER", "600"),
            ("GRADE", "3"),
            ("SCHOOL", "HOOVER"),
            ("OTHER_ID", "60"),
        ],
    ]);
    let roster = roster_csv(&[&[
        ("School", "Hoover"),
        ("SystemID", "700"),
        ("Student First Name", "Zoe"),
        ("Student Last Name", "Lee"),
        ("Grade", "2"),
        ("Contact 1 First Name", "Bob"),
        ("Contact 1 Last Name", "Lee"),
        ("Contact 1 Relationship", "Father"),
        ("Contact 1 Street", "12 Oak Grove Ave"),
        ("Contact 1 City", "Burlingame"),
        ("Contact 1 State", "CA"),
        ("Contact 1 Zip", "94010"),
        ("Contact 2 First Name", "Mary-Ann"),
        ("Contact 2 Last Name", "Lee"),
        ("Contact 2 Relationship", "Mother"),
        ("Contact 2 Street", "400 Elm St"),
        ("Contact 2 City", "Burlingame"),
        ("Contact 2 State", "CA"),
        ("Contact 2 Zip", "94010"),
    ]]);

    let (repo, result) = load_and_run(&crm, &roster, RunMode::MidYearUpdate);

    let outcome = result.matches.iter().find(|m| m.stu_number == "700").unwrap();
    assert_eq!(outcome.strategy, MatchStrategy::AlternateHousehold);
    assert_eq!(outcome.donor_ids, vec![6]);

    let donor = repo.donor(6).unwrap();
    assert_eq!(donor.address, "400 Elm St");
    assert_eq!(donor.first_name, "Mary Ann");
    assert!(result
        .diff
        .donor_updates
        .rows
        .iter()
        .all(|r| r[0] != "6" || !r.last().unwrap().contains("ADDRESS")));
}
