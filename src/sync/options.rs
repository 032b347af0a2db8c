use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};

/// What a single import run should cover and how hard it should push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Only ballots in current elections.
    pub current_only: bool,
    /// Only ballots modified upstream since the newest one we hold.
    pub recently_updated: bool,
    /// Only ballots modified upstream since this time.
    pub since: Option<DateTime<Utc>>,
    /// Re-derive enriched fields even when they are already set.
    pub force_update: bool,
    /// Enrich ballots in non-current elections too.
    pub force_metadata: bool,
    /// Refresh the metadata blob even when one is already set.
    pub force_current_metadata: bool,
    /// Import ballots without their candidacies.
    pub exclude_candidacies: bool,
    /// Delete elections and ballots the registry has soft-deleted.
    pub remove_deleted: bool,
}

impl ImportOptions {
    /// Only ballots modified after some point are fetched.
    pub fn is_incremental(&self) -> bool {
        self.recently_updated || self.since.is_some()
    }

    /// No filter applies, so the whole dataset is read.
    pub fn is_full_import(&self) -> bool {
        !self.current_only && !self.is_incremental()
    }

    /// Enough of the dataset is read to trust the set of cancelled ballots.
    pub fn covers_cancellations(&self) -> bool {
        self.is_full_import() || self.current_only
    }

    /// Bulk-load the registry before merging rather than fetching per ballot.
    pub fn should_prewarm(&self) -> bool {
        self.current_only || self.is_full_import()
    }
}

/// Phase of an import run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Merging,
    LinkingReplacements,
    ReconcilingMetadata,
    CleaningOrphans,
    Done,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::LinkingReplacements => "linking replacements",
            Self::ReconcilingMetadata => "reconciling metadata",
            Self::CleaningOrphans => "cleaning orphans",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}
