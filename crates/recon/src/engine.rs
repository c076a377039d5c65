use std::collections::HashMap;

use crate::config::SyncConfig;
use crate::diff::{build_diff, build_scrub_diff};
use crate::error::SyncError;
use crate::matcher::Matcher;
use crate::merge::merge_roster;
use crate::model::{RosterRecord, RunMode, RunOptions, SyncInput, SyncMeta, SyncResult};
use crate::repository::Repository;
use crate::review::review_notes;
use crate::school::{promote_new_students, update_loaded_students};
use crate::scrub::scrub;
use crate::summary::compute_summary;

/// Reconcile the roster against a loaded CRM repository.
///
/// The repository is updated in place; the returned diff compares it with
/// the state it was loaded in.
pub fn run(
    config: &SyncConfig,
    repo: &mut Repository,
    input: &SyncInput,
    options: &RunOptions,
) -> Result<SyncResult, SyncError> {
    let roster = &input.roster;
    let index: HashMap<&str, &RosterRecord> = roster.iter().map(|r| (r.system_id.as_str(), r)).collect();

    update_loaded_students(repo, &index, options.mode, &config.schools)?;

    let (mut matcher, anomalies) = Matcher::new(repo, roster, config, options);
    let mut matches = Vec::with_capacity(roster.len());
    for record in roster {
        matches.push(matcher.resolve(repo, record)?);
    }

    if options.mode == RunMode::NewYearImport {
        let promoted = promote_new_students(repo, &config.schools);
        log::info!("{promoted} new students promoted for the new school year");
    }

    merge_roster(repo, roster);
    let notes = review_notes(repo, roster);
    scrub(repo, config);

    let diff = build_diff(repo, notes.clone(), options.today);
    let summary = compute_summary(repo, roster.len(), &matches, &anomalies, &diff);

    Ok(SyncResult {
        meta: meta(Some(options)),
        summary,
        matches,
        anomalies,
        notes,
        diff,
    })
}

/// Scrub-only pass over a loaded CRM repository, no roster.
pub fn run_scrub(config: &SyncConfig, repo: &mut Repository) -> SyncResult {
    scrub(repo, config);

    let diff = build_scrub_diff(repo);
    let summary = compute_summary(repo, 0, &[], &[], &diff);

    SyncResult {
        meta: meta(None),
        summary,
        matches: Vec::new(),
        anomalies: Vec::new(),
        notes: Vec::new(),
        diff,
    }
}

fn meta(options: Option<&RunOptions>) -> SyncMeta {
    SyncMeta {
        mode: options.map(|o| o.mode),
        school_year: options.map(|o| o.school_year.clone()),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
    }
}
