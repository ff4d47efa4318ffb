//! The synchronization engine
//!
//! One call to [`SyncEngine::run`] performs one full reconciliation of the
//! working copy against the remote: clone when the local path is absent,
//! otherwise pull (remote wins), stage everything, commit, and push. The
//! engine is deliberately boring about failure — every error from the
//! sequence is caught here, logged, and collapsed into a terminal
//! [`Outcome::Failure`]; retrying is the scheduler's job, not ours.

use chrono::Utc;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::git::Repository;
use crate::scheduler::SyncJob;
use crate::settings::{SettingsStore, SyncConfiguration};
use crate::state::{self, RepositoryState};

/// Fixed message used for every sync commit
pub const COMMIT_MESSAGE: &str = "vault backup";

/// Progress reported once the pull has completed, before commit and push
pub const PROGRESS_AFTER_PULL: u8 = 50;

/// Terminal result of a single sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// Executes sync runs and owns the single writable last-sync slot
pub struct SyncEngine {
    store: SettingsStore,
}

impl SyncEngine {
    pub fn new(store: SettingsStore) -> Self {
        Self { store }
    }

    /// Perform one sync run.
    ///
    /// `progress` receives values in 0..=100, monotonic within the run:
    /// 0 at the start, and one intermediate checkpoint after the pull on
    /// the pull-commit-push path. Terminal state is the returned outcome,
    /// not a progress value.
    ///
    /// Never panics and never returns an error — any failure in the
    /// sequence is logged and reported as [`Outcome::Failure`].
    pub fn run(&self, config: &SyncConfiguration, progress: &mut dyn FnMut(u8)) -> Outcome {
        progress(0);

        match self.execute(config, progress) {
            Ok(()) => {
                info!(remote = %config.remote_url, "sync completed");
                Outcome::Success
            }
            Err(err) => {
                error!(error = %err, remote = %config.remote_url, "sync failed");
                Outcome::Failure
            }
        }
    }

    fn execute(&self, config: &SyncConfiguration, progress: &mut dyn FnMut(u8)) -> Result<()> {
        // The only precondition checked up front; everything else is left
        // to the transport to reject. Checked before the state resolution
        // so a misconfigured run touches neither filesystem nor network.
        if config.remote_url.is_empty() {
            return Err(Error::MissingRemoteUrl);
        }

        match state::resolve(&config.local_path) {
            RepositoryState::Absent => {
                info!(path = %config.local_path.display(), "working copy absent, cloning");
                Repository::clone(
                    &config.remote_url,
                    &config.local_path,
                    &config.branch,
                    &config.credentials,
                )?;
            }
            RepositoryState::Present => {
                let repo = Repository::open(&config.local_path)?;

                let pulled = repo.pull(&config.branch, &config.credentials)?;
                debug!(?pulled, "pull finished");
                progress(PROGRESS_AFTER_PULL);

                match repo.commit_all(COMMIT_MESSAGE)? {
                    Some(oid) => debug!(commit = %oid, "committed local changes"),
                    // Nothing staged is a no-op continuation, not a failure;
                    // the push below is attempted regardless.
                    None => debug!("nothing to commit"),
                }

                repo.push(&config.branch, &config.credentials)?;
            }
        }

        self.store.record_last_sync(Utc::now().timestamp_millis())?;
        Ok(())
    }
}

/// Scheduler-facing adapter around the engine.
///
/// Settings are re-read at every trigger, so edits to the settings file
/// apply from the next run onwards without restarting the daemon.
pub struct SyncWorker {
    store: SettingsStore,
    engine: SyncEngine,
}

impl SyncWorker {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            engine: SyncEngine::new(store.clone()),
            store,
        }
    }
}

impl SyncJob for SyncWorker {
    fn execute(&self, progress: &mut dyn FnMut(u8)) -> Outcome {
        let settings = match self.store.load_or_default() {
            Ok(settings) => settings,
            Err(err) => {
                error!(error = %err, "could not load settings for sync run");
                return Outcome::Failure;
            }
        };
        self.engine.run(&settings.sync_configuration(), progress)
    }
}
