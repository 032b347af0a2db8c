//! Importing ballots from the candidacy feed and the geography registry.

pub mod ballots;
pub mod elections;
pub mod fetch;
pub mod merge;
pub mod metadata;
pub mod options;
pub mod paginator;
pub mod posts;
pub mod replacement;

pub use ballots::{BallotImporter, ImportSummary};
pub use options::{ImportOptions, RunState};
