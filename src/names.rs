//! Branch name normalization for user input.

use crate::error::{EngineError, Result};

/// Prefixes stripped from user input, longest first
const STRIPPED_PREFIXES: &[&str] = &["refs/heads/", "refs/branchbin/trash/", "heads/"];

/// Turn user input ("refs/heads/x", "heads/x", " x ") into a short branch name.
///
/// The result must be a name git accepts under `refs/heads/`.
pub fn normalize_branch_name(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let name = STRIPPED_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);

    let invalid = || EngineError::InvalidBranchName {
        name: input.to_string(),
    };

    // HEAD is a valid ref component but never a branch
    if name.is_empty() || name == "HEAD" || name.starts_with('-') {
        return Err(invalid());
    }
    if !git2::Reference::is_valid_name(&format!("refs/heads/{}", name)) {
        return Err(invalid());
    }

    Ok(name.to_string())
}
