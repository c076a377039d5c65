//! `dsync run` / `dsync scrub` / `dsync validate`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{ArgGroup, Subcommand};

use donorsync_recon::loader::{load_crm_report, load_roster};
use donorsync_recon::{RunMode, RunOptions, SyncConfig, SyncInput, SyncResult};

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::CliError;

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Reconcile a district roster against a CRM report and write import files
    #[command(after_help = "\
Examples:
  dsync run --crm-report report-271.csv --roster district.csv --school-year SY2016-17 --mid-year-update
  dsync run --crm-report report-271.csv --roster district.csv --school-year SY2017-18 --new-year-import \\
            --output-dir imports/ --snapshot imports/merged.csv
  dsync run --crm-report report-271.csv --roster district.csv --school-year SY2016-17 --mid-year-update --json")]
    #[command(group(
        ArgGroup::new("mode")
            .required(true)
            .args(["new_year_import", "mid_year_update"]),
    ))]
    Run {
        /// CRM export (report 271) as CSV
        #[arg(long, value_parser = parse_csv_path)]
        crm_report: PathBuf,

        /// District roster as CSV
        #[arg(long, value_parser = parse_csv_path)]
        roster: PathBuf,

        /// School year stamped on new donors, e.g. SY2016-17
        #[arg(long, value_parser = parse_school_year)]
        school_year: String,

        /// Start of the school year: advance grades and graduate 8th graders
        #[arg(long)]
        new_year_import: bool,

        /// Refresh during the year without advancing grades
        #[arg(long)]
        mid_year_update: bool,

        /// TOML config (school codes, mail flags, output names)
        #[arg(long, env = "DSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Directory for the import files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Also write the merged CRM state in report shape
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Date stamped into OTHER_DATE (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_run_date)]
        run_date: Option<NaiveDate>,

        /// Print the JSON summary to stdout
        #[arg(long)]
        json: bool,
    },

    /// Re-derive mail flags and home schools of a CRM report, no roster
    #[command(after_help = "\
Examples:
  dsync scrub --crm-report report-271.csv
  dsync scrub --crm-report report-271.csv --output-dir imports/ --json")]
    Scrub {
        /// CRM export (report 271) as CSV
        #[arg(long, value_parser = parse_csv_path)]
        crm_report: PathBuf,

        /// TOML config (school codes, mail flags, output names)
        #[arg(long, env = "DSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Directory for the import file
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Print the JSON summary to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a config file without running
    #[command(after_help = "\
Examples:
  dsync validate dsync.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },
}

pub fn cmd_sync(cmd: SyncCommands) -> Result<(), CliError> {
    match cmd {
        SyncCommands::Run {
            crm_report,
            roster,
            school_year,
            new_year_import,
            mid_year_update: _,
            config,
            output_dir,
            snapshot,
            run_date,
            json,
        } => {
            let mode = if new_year_import { RunMode::NewYearImport } else { RunMode::MidYearUpdate };
            let options = RunOptions {
                mode,
                school_year,
                today: run_date.unwrap_or_else(|| chrono::Local::now().date_naive()),
            };
            cmd_run(&crm_report, &roster, options, config.as_deref(), &output_dir, snapshot.as_deref(), json)
        }
        SyncCommands::Scrub { crm_report, config, output_dir, json } => {
            cmd_scrub(&crm_report, config.as_deref(), &output_dir, json)
        }
        SyncCommands::Validate { config } => cmd_validate(&config),
    }
}

fn sync_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

// ============================================================================
// Argument parsers
// ============================================================================

fn parse_csv_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        Ok(path)
    } else {
        Err(format!("{value} must be a csv file"))
    }
}

/// `SYyyyy-yy` where the second year follows the first.
fn parse_school_year(value: &str) -> Result<String, String> {
    let bad = || format!("'{value}' is not a school year like SY2016-17");

    let rest = value.strip_prefix("SY").ok_or_else(bad)?;
    let (start, end) = rest.split_once('-').ok_or_else(bad)?;
    if start.len() != 4 || end.len() != 2 {
        return Err(bad());
    }
    let start: u32 = start.parse().map_err(|_| bad())?;
    let end: u32 = end.parse().map_err(|_| bad())?;
    if (start + 1) % 100 != end {
        return Err(format!("'{value}': school year must span consecutive years"));
    }
    Ok(value.to_string())
}

fn parse_run_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("'{value}': {e} (expected YYYY-MM-DD)"))
}

// ============================================================================
// Loading
// ============================================================================

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| sync_err(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display())))
}

fn load_config(path: Option<&Path>) -> Result<SyncConfig, CliError> {
    let Some(path) = path else {
        log::debug!("no config given, using built-in school codes");
        return Ok(SyncConfig::default());
    };
    let config_str = read_file(path)?;
    SyncConfig::from_toml(&config_str).map_err(|e| {
        CliError::from(e).with_hint(format!("check {} (dsync validate {})", path.display(), path.display()))
    })
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_run(
    crm_report: &Path,
    roster: &Path,
    options: RunOptions,
    config_path: Option<&Path>,
    output_dir: &Path,
    snapshot: Option<&Path>,
    json_output: bool,
) -> Result<(), CliError> {
    if crm_report == roster {
        return Err(CliError::usage("--crm-report and --roster must be different files"));
    }
    let config = load_config(config_path)?;

    let report_name = crm_report.display().to_string();
    let mut repo = load_crm_report(&report_name, &read_file(crm_report)?, &config)?;

    let roster_name = roster.display().to_string();
    let input = SyncInput { roster: load_roster(&roster_name, &read_file(roster)?)? };

    log::info!("{} run for {}", options.mode, options.school_year);
    let result = donorsync_recon::run(&config, &mut repo, &input, &options)?;

    let written = result.diff.write_to_dir(output_dir, &config.output)?;
    if let Some(path) = snapshot {
        donorsync_recon::diff::write_snapshot(&repo, path)?;
    }

    print_json(&result, json_output)?;

    let s = &result.summary;
    eprintln!(
        "{} roster students, {} CRM donors: {} student updates, {} new students, {} new donors ({} students), {} donor updates, {} manual reviews",
        s.roster_students,
        s.crm_donors,
        s.student_updates,
        s.new_students,
        s.new_donors,
        s.new_donor_students,
        s.donor_updates,
        s.manual_reviews,
    );
    let strategies: Vec<String> = s.strategy_counts.iter().map(|(k, v)| format!("{k}={v}")).collect();
    eprintln!("matched by: {}", strategies.join(", "));
    for anomaly in &result.anomalies {
        eprintln!("warning: {anomaly}");
    }
    eprintln!("wrote {} files to {}", written.len(), output_dir.display());

    Ok(())
}

fn cmd_scrub(
    crm_report: &Path,
    config_path: Option<&Path>,
    output_dir: &Path,
    json_output: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    let report_name = crm_report.display().to_string();
    let mut repo = load_crm_report(&report_name, &read_file(crm_report)?, &config)?;

    let result = donorsync_recon::run_scrub(&config, &mut repo);
    let written = result.diff.write_to_dir(output_dir, &config.output)?;

    print_json(&result, json_output)?;

    eprintln!(
        "scrub: {} CRM donors, {} donor updates",
        result.summary.crm_donors, result.summary.donor_updates,
    );
    for path in &written {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<(), CliError> {
    let config_str = read_file(config_path)?;
    let config = SyncConfig::from_toml(&config_str)
        .map_err(|e| sync_err(EXIT_INVALID_CONFIG, e.to_string()))?;

    eprintln!(
        "valid: {} district schools, intermediate {}, alumni {}, out of district {}",
        config.schools.mapping.len(),
        config.schools.intermediate,
        config.schools.alumni,
        config.schools.out_of_district,
    );
    Ok(())
}

fn print_json(result: &SyncResult, json_output: bool) -> Result<(), CliError> {
    if !json_output {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(result)
        .map_err(|e| sync_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
    println!("{json_str}");
    Ok(())
}
