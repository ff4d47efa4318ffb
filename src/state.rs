//! Repository state resolution
//!
//! A working copy is either there or it is not, and that single fact
//! selects the whole sync procedure: clone into place, or pull and push
//! what already exists. The check is a bare existence test on purpose —
//! no git metadata validation, no network. A directory that exists but
//! is not a repository will surface as an open error later in the run.

use std::path::Path;

/// Derived state of the local working copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// Nothing at the local path; the engine will clone
    Absent,
    /// The local path exists; the engine will pull, commit, and push
    Present,
}

/// Resolve the current state of the working copy at `local_path`.
///
/// Side-effect free; a non-existent parent path simply yields `Absent`.
pub fn resolve(local_path: &Path) -> RepositoryState {
    if local_path.exists() {
        RepositoryState::Present
    } else {
        RepositoryState::Absent
    }
}
