//! Reference and blob operations for GitGateway.
//!
//! These operations delegate to the GitBackend, which handles the
//! reftable vs files format difference internally. Names are always full
//! ref names ("refs/heads/x").

use super::GitGateway;
use crate::error::{EngineError, Result};

// Re-export the canonical types from git_backend
pub use crate::git_backend::{Oid, RefFormat};

impl GitGateway {
    // === Pointer Operations ===

    /// Find a pointer by name; None if the ref doesn't exist
    pub fn find_pointer(&self, name: &str) -> Result<Option<Oid>> {
        self.backend.find_reference(name).map_err(EngineError::gateway)
    }

    /// Whether a pointer exists
    pub fn pointer_exists(&self, name: &str) -> Result<bool> {
        Ok(self.find_pointer(name)?.is_some())
    }

    /// List all pointers whose name starts with `prefix`
    pub fn list_pointers(&self, prefix: &str) -> Result<Vec<(String, Oid)>> {
        self.backend.list_references(prefix).map_err(EngineError::gateway)
    }

    /// Create a pointer; fails if one already exists under that name
    pub fn create_pointer(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        self.backend
            .create_reference(name, target, msg)
            .map_err(EngineError::gateway)
    }

    /// Create or overwrite a pointer
    pub fn update_pointer(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        self.backend
            .update_reference(name, target, msg)
            .map_err(EngineError::gateway)
    }

    /// Delete a pointer (idempotent - succeeds even if the ref doesn't exist)
    pub fn delete_pointer(&self, name: &str) -> Result<()> {
        self.backend.delete_reference(name).map_err(EngineError::gateway)
    }

    // === Blob Operations ===

    /// Create a blob with the given content
    pub fn write_blob(&self, content: &[u8]) -> Result<Oid> {
        self.backend.create_blob(content).map_err(EngineError::gateway)
    }

    /// Read a blob's content
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>> {
        self.backend.read_blob(oid).map_err(EngineError::gateway)
    }
}
