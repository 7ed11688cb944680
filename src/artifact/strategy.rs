//! Reduction of a filtered candidate set to the selected artifacts

use std::cmp::Reverse;

use crate::artifact::types::BlobEntry;
use crate::artifact::version::Version;

/// Strategies that operate directly on a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    Latest,
    First,
    /// Lowest version at or above the target, else the highest overall
    Closest(Version),
    SecondToLastMajor,
}

fn version_of(blob: &BlobEntry) -> Version {
    blob.artifact().map(|a| a.version).unwrap_or_default()
}

/// Sort candidates ascending by version (stable for equal versions)
pub fn sort_ascending(mut candidates: Vec<BlobEntry>) -> Vec<BlobEntry> {
    candidates.sort_by_key(version_of);
    candidates
}

/// Apply a selection. Empty input always yields empty output.
pub fn select(candidates: Vec<BlobEntry>, selection: Selection) -> Vec<BlobEntry> {
    match selection {
        Selection::All => sort_ascending(candidates),
        Selection::Latest => sort_ascending(candidates).pop().into_iter().collect(),
        Selection::First => sort_ascending(candidates).into_iter().take(1).collect(),
        Selection::Closest(target) => closest(candidates, target).into_iter().collect(),
        Selection::SecondToLastMajor => second_to_last_major(candidates).into_iter().collect(),
    }
}

fn closest(candidates: Vec<BlobEntry>, target: Version) -> Option<BlobEntry> {
    let mut sorted = sort_ascending(candidates);
    match sorted.iter().position(|blob| version_of(blob) >= target) {
        Some(index) => Some(sorted.swap_remove(index)),
        None => sorted.pop(),
    }
}

fn second_to_last_major(mut candidates: Vec<BlobEntry>) -> Option<BlobEntry> {
    candidates.sort_by_key(|blob| Reverse(version_of(blob)));
    let latest_major = version_of(candidates.first()?).major;
    candidates
        .into_iter()
        .find(|blob| version_of(blob).major != latest_major)
}
