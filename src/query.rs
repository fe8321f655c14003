//! Pure filtering, searching and sorting over branch snapshots.
//!
//! Nothing here touches git. Callers hold their own query state (options,
//! search text, selection) and pass it in explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::models::BranchRecord;

/// Which records a view shows. Every gate must pass for a record to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFilterOptions {
    pub show_merged: bool,
    pub show_unmerged: bool,
    /// Stale records are hidden unless set; fresh records are unaffected
    pub show_stale: bool,
    pub show_local: bool,
    pub show_remote: bool,
}

impl Default for BranchFilterOptions {
    fn default() -> Self {
        FilterPreset::All.options()
    }
}

impl BranchFilterOptions {
    /// Whether a single record passes every gate
    pub fn matches(&self, record: &BranchRecord) -> bool {
        let location = if record.is_remote() {
            self.show_remote
        } else {
            self.show_local
        };
        let merge_state = if record.merged() {
            self.show_merged
        } else {
            self.show_unmerged
        };
        let staleness = !record.is_stale || self.show_stale;

        location && merge_state && staleness
    }
}

/// Named filter configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    /// Every local branch
    All,
    /// Merged local branches
    Merged,
    /// Same gates as `All`: staleness is shown, not used to narrow
    Stale,
    /// Unmerged local branches
    Unmerged,
}

impl FilterPreset {
    pub const ALL: [FilterPreset; 4] = [Self::All, Self::Merged, Self::Stale, Self::Unmerged];

    pub fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Merged => "merged",
            Self::Stale => "stale",
            Self::Unmerged => "unmerged",
        }
    }

    pub fn options(self) -> BranchFilterOptions {
        let local_only = BranchFilterOptions {
            show_merged: true,
            show_unmerged: true,
            show_stale: true,
            show_local: true,
            show_remote: false,
        };
        match self {
            Self::All | Self::Stale => local_only,
            Self::Merged => BranchFilterOptions {
                show_unmerged: false,
                ..local_only
            },
            Self::Unmerged => BranchFilterOptions {
                show_merged: false,
                ..local_only
            },
        }
    }
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FilterPreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EngineError::UnknownFilterPreset { name: s.to_string() })
    }
}

/// Look up a preset by name ("all", "merged", "stale", "unmerged")
pub fn apply_filter_preset(name: &str) -> crate::error::Result<BranchFilterOptions> {
    Ok(name.parse::<FilterPreset>()?.options())
}

/// Records passing every gate of `options`, in input order
pub fn filter(records: &[BranchRecord], options: &BranchFilterOptions) -> Vec<BranchRecord> {
    records.iter().filter(|r| options.matches(r)).cloned().collect()
}

/// Case-insensitive substring match on the branch name.
///
/// Blank queries return the input unchanged.
pub fn search(records: &[BranchRecord], query: &str) -> Vec<BranchRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Current branch first, then most recent commit first, then by name
pub fn sort(records: &mut [BranchRecord]) {
    records.sort_by(|a, b| {
        b.is_current
            .cmp(&a.is_current)
            .then_with(|| b.last_commit_date.cmp(&a.last_commit_date))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Sorted copy of `records`
pub fn sorted(records: &[BranchRecord]) -> Vec<BranchRecord> {
    let mut out = records.to_vec();
    sort(&mut out);
    out
}
