//! `donorsync-recon`: roster to donor-CRM reconciliation engine.
//!
//! Loads a CRM report and a district roster, links every roster student to
//! a donor household, and produces the import files that bring the CRM up
//! to date. File access is limited to the loader's callers and the `diff`
//! writer.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod household;
pub mod loader;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod repository;
pub mod review;
pub mod school;
pub mod scrub;
pub mod summary;

pub use config::SyncConfig;
pub use engine::{run, run_scrub};
pub use error::SyncError;
pub use model::{RunMode, RunOptions, SyncInput, SyncResult};
pub use repository::Repository;
