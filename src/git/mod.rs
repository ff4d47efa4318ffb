//! Git transport layer for gitvault
//!
//! Wraps libgit2 with the five primitives the sync engine needs: clone,
//! open, pull, commit-everything, and push. Credentials are passed through
//! from the configuration as a username/password pair; local (file) remotes
//! never hit the credential callback, which is what the tests rely on.

use std::path::Path;

use git2::build::RepoBuilder;
use git2::{
    Cred, FetchOptions, IndexAddOption, Oid, RemoteCallbacks, Repository as Git2Repo, Signature,
};

use crate::error::Result;
use crate::settings::Credentials;

mod sync;

pub use sync::PullOutcome;

/// Name of the remote every operation talks to
pub const DEFAULT_REMOTE: &str = "origin";

/// Git repository wrapper for gitvault
pub struct Repository {
    inner: Git2Repo,
}

impl Repository {
    /// Open an existing repository at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let inner = Git2Repo::open(path)?;
        Ok(Self { inner })
    }

    /// Clone `url` into `path`, checking out `branch`
    pub fn clone(url: &str, path: &Path, branch: &str, credentials: &Credentials) -> Result<Self> {
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks(credentials));

        let inner = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fetch_options)
            .clone(url, path)?;

        Ok(Self { inner })
    }

    /// Stage every change in the working tree and commit it.
    ///
    /// Returns `None` when the staged tree is identical to HEAD's tree —
    /// there is nothing to commit and no empty commit is created.
    pub fn commit_all(&self, message: &str) -> Result<Option<Oid>> {
        let sig = self.signature()?;
        let mut index = self.inner.index()?;

        // Add all changes; the repository's own ignore rules still apply
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let head = self.inner.head()?;
        let parent = head.peel_to_commit()?;

        if tree_id == parent.tree_id() {
            return Ok(None);
        }

        let tree = self.inner.find_tree(tree_id)?;
        let oid = self
            .inner
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;

        Ok(Some(oid))
    }

    /// Get the current HEAD commit hash
    pub fn head_hash(&self) -> Result<String> {
        let head = self.inner.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Check if there are uncommitted changes
    pub fn has_changes(&self) -> Result<bool> {
        let statuses = self.inner.statuses(None)?;
        Ok(!statuses.is_empty())
    }

    /// Get a signature for commits
    fn signature(&self) -> Result<Signature<'_>> {
        // Try to get from git config, fall back to defaults
        self.inner
            .signature()
            .or_else(|_| Signature::now("gitvault", "gitvault@localhost"))
            .map_err(Into::into)
    }

    /// Get the underlying git2 repository (for advanced operations)
    pub fn inner(&self) -> &Git2Repo {
        &self.inner
    }
}

/// Remote callbacks that answer credential prompts with the configured
/// username/password pair. Empty credentials fall back to the default
/// (agent / anonymous) negotiation.
fn callbacks(credentials: &Credentials) -> RemoteCallbacks<'static> {
    let username = credentials.username.clone();
    let password = credentials.password.clone();

    let mut cb = RemoteCallbacks::new();
    cb.credentials(move |_url, _username_from_url, _allowed| {
        if username.is_empty() {
            Cred::default()
        } else {
            Cred::userpass_plaintext(&username, &password)
        }
    });
    cb
}
