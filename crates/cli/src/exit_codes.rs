//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `dsync` exit codes.
//! Scheduled import jobs branch on them, so treat them as a contract.
//!
//! # Exit Codes
//!
//! | Code | Description                                             |
//! |------|---------------------------------------------------------|
//! | 0    | Success                                                 |
//! | 1    | General error (unspecified)                             |
//! | 2    | CLI usage error (bad args, wrong file extension)        |
//! | 3    | Invalid config (TOML parse or validation failure)       |
//! | 4    | Input data error (headers, grades, schools, ids)        |
//! | 5    | Runtime / IO error (cannot read inputs or write output) |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map the engine error in `sync_exit_code`

use donorsync_recon::SyncError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, input without a `.csv` extension,
/// malformed school year or run date.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Sync (3-5)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// An input file was rejected: header mismatch, bad CSV row, grade out of
/// range, unmapped school, duplicate or missing id, inconsistent donor rows,
/// export without no-mail names.
pub const EXIT_INPUT_DATA: u8 = 4;

/// Cannot read an input or write an output file.
pub const EXIT_RUNTIME: u8 = 5;

// =============================================================================
// Mapping
// =============================================================================

/// Map an engine error to its exit code.
pub fn sync_exit_code(err: &SyncError) -> u8 {
    match err {
        SyncError::ConfigParse(_) | SyncError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        SyncError::Io(_) => EXIT_RUNTIME,
        SyncError::HeaderMismatch { .. }
        | SyncError::Csv { .. }
        | SyncError::GradeOutOfRange { .. }
        | SyncError::UnknownSchool { .. }
        | SyncError::MissingField { .. }
        | SyncError::UnknownDonor { .. }
        | SyncError::DuplicateId { .. }
        | SyncError::DonorMismatch { .. }
        | SyncError::MissingNoMailRows { .. } => EXIT_INPUT_DATA,
    }
}
