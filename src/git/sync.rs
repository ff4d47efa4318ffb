//! Pull and push against the configured remote
//!
//! Pull applies a fixed conflict policy: the remote wins unconditionally.
//! Fast-forwards are checked out with force, so local uncommitted edits to
//! files the remote also changed are discarded. Diverged histories are
//! merged with file-level favor-theirs; any residue the merge machinery
//! cannot resolve is taken from the remote tree wholesale. Local edits the
//! remote did not touch survive either way and are picked up by the
//! commit step that follows.

use git2::build::CheckoutBuilder;
use git2::{AnnotatedCommit, FetchOptions, FileFavor, MergeOptions, PushOptions};

use super::{callbacks, Repository, DEFAULT_REMOTE};
use crate::error::Result;
use crate::settings::Credentials;

/// How a pull changed the local branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local branch already matched the remote
    UpToDate,
    /// Local branch was fast-forwarded to the remote tip
    FastForwarded,
    /// Histories had diverged; a merge commit was created with the remote
    /// side winning every conflict
    Merged,
}

impl Repository {
    /// Fetch `branch` from the remote and integrate it, remote-wins
    pub fn pull(&self, branch: &str, credentials: &Credentials) -> Result<PullOutcome> {
        {
            let mut remote = self.inner.find_remote(DEFAULT_REMOTE)?;
            let mut fetch_options = FetchOptions::new();
            fetch_options.remote_callbacks(callbacks(credentials));
            remote.fetch(&[branch], Some(&mut fetch_options), None)?;
        }

        let fetch_head = self.inner.find_reference("FETCH_HEAD")?;
        let incoming = self.inner.reference_to_annotated_commit(&fetch_head)?;

        let (analysis, _) = self.inner.merge_analysis(&[&incoming])?;
        if analysis.is_up_to_date() {
            return Ok(PullOutcome::UpToDate);
        }

        if analysis.is_fast_forward() {
            self.fast_forward(branch, &incoming)?;
            return Ok(PullOutcome::FastForwarded);
        }

        self.merge_remote_wins(branch, &incoming)?;
        Ok(PullOutcome::Merged)
    }

    /// Push the local branch to the remote
    pub fn push(&self, branch: &str, credentials: &Credentials) -> Result<()> {
        let mut remote = self.inner.find_remote(DEFAULT_REMOTE)?;
        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks(credentials));

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec.as_str()], Some(&mut push_options))?;
        Ok(())
    }

    /// Move the branch ref to the fetched tip and check it out.
    ///
    /// The forced checkout only rewrites paths that differ between the old
    /// and new tips, so unrelated local edits are left in the working tree.
    fn fast_forward(&self, branch: &str, incoming: &AnnotatedCommit<'_>) -> Result<()> {
        let refname = format!("refs/heads/{branch}");
        let mut reference = self.inner.find_reference(&refname)?;
        reference.set_target(incoming.id(), "pull: fast-forward")?;
        self.inner.set_head(&refname)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.inner.checkout_head(Some(&mut checkout))?;
        Ok(())
    }

    /// Merge the fetched tip into the local branch with the remote side
    /// winning every conflict, then commit and check out the result.
    fn merge_remote_wins(&self, branch: &str, incoming: &AnnotatedCommit<'_>) -> Result<()> {
        let local = self.inner.head()?.peel_to_commit()?;
        let remote = self.inner.find_commit(incoming.id())?;

        let mut merge_options = MergeOptions::new();
        merge_options.file_favor(FileFavor::Theirs);

        let mut merged = self
            .inner
            .merge_commits(&local, &remote, Some(&merge_options))?;

        // Favor-theirs resolves content conflicts; structural leftovers
        // (e.g. file/directory collisions) fall back to the remote tree.
        let tree_id = if merged.has_conflicts() {
            remote.tree_id()
        } else {
            merged.write_tree_to(&self.inner)?
        };

        let tree = self.inner.find_tree(tree_id)?;
        let sig = self.signature()?;
        let message = format!("Merge remote-tracking branch '{DEFAULT_REMOTE}/{branch}'");
        self.inner
            .commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&local, &remote])?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.inner.checkout_head(Some(&mut checkout))?;
        self.inner.cleanup_state()?;
        Ok(())
    }
}
