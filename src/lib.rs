//! gitvault - continuous git-backed backup
//!
//! Keeps a local working copy reconciled with a single remote repository:
//! the first run clones, every later run pulls (remote wins), commits all
//! local changes, and pushes. Runs are triggered by a periodic scheduler
//! or manually, and report progress plus a terminal outcome.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        gitvault                           │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────────┐   ┌─────────────┐  │
//! │  │ Scheduler  │──▶│    Sync Engine   │──▶│   Status    │  │
//! │  │ (periodic, │   │ clone | pull-    │   │ (state map, │  │
//! │  │  one-shot) │   │ commit-push      │   │  progress)  │  │
//! │  └────────────┘   └───────┬──────────┘   └─────────────┘  │
//! │                           │                               │
//! │          ┌────────────────┼────────────────┐              │
//! │          ▼                ▼                ▼              │
//! │  ┌──────────────┐  ┌─────────────┐  ┌──────────────┐      │
//! │  │ State        │  │ Git Layer   │  │ Settings     │      │
//! │  │ Resolver     │  │ (libgit2)   │  │ Store (TOML) │      │
//! │  └──────────────┘  └─────────────┘  └──────────────┘      │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod git;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod status;

pub use engine::{Outcome, SyncEngine, SyncWorker, COMMIT_MESSAGE};
pub use error::{Error, Result};
pub use scheduler::{
    AlwaysOnline, ConnectivityProbe, ExistingJobPolicy, JobId, JobSnapshot, JobState,
    RecurringSchedule, Scheduler, SyncJob, TcpProbe,
};
pub use settings::{Credentials, Settings, SettingsStore, SyncConfiguration};
pub use state::{resolve, RepositoryState};
