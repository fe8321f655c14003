//! Upstream tracking for GitGateway.

use super::{GitGateway, LOCAL_PREFIX, REMOTE_PREFIX};
use crate::error::{EngineError, Result};
use crate::models::UpstreamTrack;

/// Configured upstream of a local branch and how the branch relates to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamStatus {
    /// Short upstream name ("origin/feature")
    pub name: String,
    pub track: UpstreamTrack,
}

impl GitGateway {
    /// Upstream of a local branch; None when no upstream is configured.
    ///
    /// A configured upstream whose ref no longer exists is reported as `Gone`.
    pub fn upstream_status(&self, branch: &str) -> Result<Option<UpstreamStatus>> {
        let upstream_ref = match self.backend.upstream_of(branch).map_err(EngineError::gateway)? {
            Some(r) => r,
            None => return Ok(None),
        };
        let name = short_ref_name(&upstream_ref).to_string();

        if !self.pointer_exists(&upstream_ref)? {
            return Ok(Some(UpstreamStatus {
                name,
                track: UpstreamTrack::Gone,
            }));
        }

        let local_ref = format!("{}{}", LOCAL_PREFIX, branch);
        let (ahead, behind) = self
            .backend
            .ahead_behind(&upstream_ref, &local_ref)
            .map_err(EngineError::gateway)?;

        Ok(Some(UpstreamStatus {
            name,
            track: UpstreamTrack::from_counts(
                u32::try_from(ahead).unwrap_or(u32::MAX),
                u32::try_from(behind).unwrap_or(u32::MAX),
            ),
        }))
    }
}

/// Strip the namespace from a full branch ref
fn short_ref_name(full: &str) -> &str {
    full.strip_prefix(REMOTE_PREFIX)
        .or_else(|| full.strip_prefix(LOCAL_PREFIX))
        .unwrap_or(full)
}
