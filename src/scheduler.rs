//! Job scheduling for sync runs
//!
//! The engine itself only knows how to perform a single run; everything
//! about *when* runs happen lives here. The scheduler keeps at most one
//! named recurring job (a resubmission under the same name updates or
//! replaces the pending instance, it never stacks a second one) plus any
//! number of one-shot jobs. Each job exposes a watch channel of
//! `{state, progress}` snapshots for the presentation layer.
//!
//! Runs execute on blocking worker threads; the scheduler does not
//! serialize a one-shot against the recurring job, so two runs can race
//! on the same working copy. Callers that need exclusion must provide it
//! around the job itself.

use std::collections::HashMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Outcome;

/// Opaque identifier the scheduler assigns to every submitted job
pub type JobId = u64;

/// Default flex window for recurring submissions
pub const DEFAULT_FLEX: Duration = Duration::from_secs(15 * 60);

/// Observable lifecycle state of a scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for the next trigger
    Scheduled,
    /// A run is executing
    Running,
    /// The last run completed successfully
    Succeeded,
    /// The last run failed
    Failed,
    /// Waiting for connectivity before the run may start
    Blocked,
    /// The pending instance was abandoned
    Cancelled,
    /// The queried job is not known to this scheduler
    Unknown,
}

/// Point-in-time view of a job, delivered over the observation channel
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub state: JobState,
    /// 0..=100, monotonic within a run, reset when the next run starts
    pub progress: u8,
}

/// The unit of work the scheduler triggers.
///
/// Implementations block for the duration of the run and report progress
/// through the supplied sink; the scheduler moves them onto a blocking
/// worker thread.
pub trait SyncJob: Send + Sync + 'static {
    fn execute(&self, progress: &mut dyn FnMut(u8)) -> Outcome;
}

/// Cadence of a recurring submission
#[derive(Debug, Clone, Copy)]
pub struct RecurringSchedule {
    /// Time between runs
    pub interval: Duration,
    /// Window before the interval deadline in which the run may fire;
    /// doubles as the budget for waiting out a connectivity outage
    pub flex: Duration,
    /// Gate each run on the connectivity probe
    pub requires_network: bool,
}

/// What to do when a recurring name is submitted again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingJobPolicy {
    /// Keep the pending instance and its id, adopt the new schedule
    Update,
    /// Cancel the pending instance and start a fresh one
    Replace,
}

// =============================================================================
// Connectivity
// =============================================================================

/// Answers "is the remote reachable right now"
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn is_online(&self) -> bool;
}

/// Probe for setups that never want network gating
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// TCP reachability probe against the remote host
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(5),
        }
    }

    /// Derive a probe from the configured remote URL. Returns `None` for
    /// remotes without a host component (local paths, `file://`), which
    /// need no connectivity to sync.
    pub fn for_remote(remote_url: &str) -> Option<Self> {
        let parsed = url::Url::parse(remote_url).ok()?;
        if parsed.scheme() == "file" {
            return None;
        }
        let host = parsed.host_str()?.to_string();
        let port = parsed.port_or_known_default().unwrap_or(match parsed.scheme() {
            "ssh" | "git" => 22,
            _ => 443,
        });
        Some(Self::new(host, port))
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_online(&self) -> bool {
        let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(_) => return false,
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                return true;
            }
        }
        false
    }
}

// =============================================================================
// Scheduler
// =============================================================================

struct JobRecord {
    tx: watch::Sender<JobSnapshot>,
}

struct RecurringEntry {
    id: JobId,
    schedule: Arc<Mutex<RecurringSchedule>>,
    handle: JoinHandle<()>,
}

struct Inner {
    job: Arc<dyn SyncJob>,
    probe: Arc<dyn ConnectivityProbe>,
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    recurring: Mutex<HashMap<String, RecurringEntry>>,
    /// How often a blocked job re-checks the probe
    connectivity_poll: Duration,
}

/// Submits, observes, and cancels sync jobs. Cheap to share via the
/// handles it returns; owns the tokio tasks driving recurring cadences.
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(job: Arc<dyn SyncJob>, probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self::with_connectivity_poll(job, probe, Duration::from_secs(5))
    }

    /// As [`Scheduler::new`], with a custom probe re-check cadence
    pub fn with_connectivity_poll(
        job: Arc<dyn SyncJob>,
        probe: Arc<dyn ConnectivityProbe>,
        connectivity_poll: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                job,
                probe,
                next_id: AtomicU64::new(0),
                jobs: Mutex::new(HashMap::new()),
                recurring: Mutex::new(HashMap::new()),
                connectivity_poll,
            }),
        }
    }

    /// Submit a one-shot job, tagged for later lookup. One-shots are not
    /// deduplicated against each other or against the recurring job.
    pub fn submit_once(&self, tags: Vec<String>) -> JobId {
        let (id, tx) = self.allocate(None, tags);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            execute_run(&inner, &tx).await;
        });
        debug!(id, "one-shot sync submitted");
        id
    }

    /// Submit (or resubmit) the named recurring job.
    ///
    /// At most one pending instance exists per name: `Update` keeps the
    /// pending instance and adopts the new schedule, `Replace` cancels it
    /// and starts over.
    pub fn submit_recurring(
        &self,
        name: &str,
        schedule: RecurringSchedule,
        policy: ExistingJobPolicy,
    ) -> JobId {
        let mut recurring = self.inner.recurring.lock().unwrap();

        if let Some(entry) = recurring.get(name) {
            match policy {
                ExistingJobPolicy::Update => {
                    *entry.schedule.lock().unwrap() = schedule;
                    debug!(name, id = entry.id, "recurring sync schedule updated");
                    return entry.id;
                }
                ExistingJobPolicy::Replace => {
                    let old = recurring.remove(name).expect("entry present");
                    old.handle.abort();
                    self.mark_cancelled(old.id);
                    info!(name, id = old.id, "recurring sync replaced");
                }
            }
        }

        let (id, tx) = self.allocate(Some(name.to_string()), Vec::new());
        let shared = Arc::new(Mutex::new(schedule));
        let inner = Arc::clone(&self.inner);
        let loop_schedule = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            recurring_loop(inner, tx, loop_schedule).await;
        });

        recurring.insert(
            name.to_string(),
            RecurringEntry {
                id,
                schedule: shared,
                handle,
            },
        );
        info!(name, id, "recurring sync submitted");
        id
    }

    /// Subscribe to a job's `{state, progress}` snapshots
    pub fn observe(&self, id: JobId) -> Option<watch::Receiver<JobSnapshot>> {
        self.inner
            .jobs
            .lock()
            .unwrap()
            .get(&id)
            .map(|record| record.tx.subscribe())
    }

    /// Current snapshot of a job; `Unknown` state for ids this scheduler
    /// has never seen
    pub fn snapshot(&self, id: JobId) -> JobSnapshot {
        match self.inner.jobs.lock().unwrap().get(&id) {
            Some(record) => record.tx.borrow().clone(),
            None => JobSnapshot {
                id,
                name: None,
                tags: Vec::new(),
                state: JobState::Unknown,
                progress: 0,
            },
        }
    }

    /// Summaries of all jobs, optionally filtered to a recurring name
    pub fn query_all(&self, name: Option<&str>) -> Vec<JobSnapshot> {
        let jobs = self.inner.jobs.lock().unwrap();
        let mut summaries: Vec<JobSnapshot> = jobs
            .values()
            .map(|record| record.tx.borrow().clone())
            .filter(|snapshot| name.is_none() || snapshot.name.as_deref() == name)
            .collect();
        summaries.sort_by_key(|snapshot| snapshot.id);
        summaries
    }

    /// Abandon the named recurring job. A run already on a worker thread
    /// is not interrupted mid-step; the pending instance is dropped.
    pub fn cancel_recurring(&self, name: &str) -> bool {
        let removed = self.inner.recurring.lock().unwrap().remove(name);
        match removed {
            Some(entry) => {
                entry.handle.abort();
                self.mark_cancelled(entry.id);
                info!(name, id = entry.id, "recurring sync cancelled");
                true
            }
            None => false,
        }
    }

    /// Abandon every recurring job
    pub fn shutdown(&self) {
        let names: Vec<String> = self
            .inner
            .recurring
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        for name in names {
            self.cancel_recurring(&name);
        }
    }

    fn allocate(&self, name: Option<String>, tags: Vec<String>) -> (JobId, watch::Sender<JobSnapshot>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, _rx) = watch::channel(JobSnapshot {
            id,
            name,
            tags,
            state: JobState::Scheduled,
            progress: 0,
        });
        self.inner
            .jobs
            .lock()
            .unwrap()
            .insert(id, JobRecord { tx: tx.clone() });
        (id, tx)
    }

    fn mark_cancelled(&self, id: JobId) {
        if let Some(record) = self.inner.jobs.lock().unwrap().get(&id) {
            record.tx.send_modify(|snapshot| snapshot.state = JobState::Cancelled);
        }
    }
}

/// Drive one run on a blocking worker and record its terminal state
async fn execute_run(inner: &Arc<Inner>, tx: &watch::Sender<JobSnapshot>) {
    tx.send_modify(|snapshot| {
        snapshot.state = JobState::Running;
        snapshot.progress = 0;
    });

    let job = Arc::clone(&inner.job);
    let progress_tx = tx.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let mut report = move |value: u8| {
            progress_tx.send_modify(|snapshot| {
                // Monotonic within the run
                if value > snapshot.progress {
                    snapshot.progress = value;
                }
            });
        };
        job.execute(&mut report)
    })
    .await;

    let state = match joined {
        Ok(Outcome::Success) => JobState::Succeeded,
        Ok(Outcome::Failure) => JobState::Failed,
        Err(err) => {
            warn!(error = %err, "sync worker aborted");
            JobState::Failed
        }
    };
    tx.send_modify(|snapshot| snapshot.state = state);
}

/// Periodic cadence: sleep to the start of the flex window, wait out any
/// connectivity outage, run, repeat. The loop itself is the "at most one
/// pending instance" guarantee — a cycle cannot start before the previous
/// run finished.
async fn recurring_loop(
    inner: Arc<Inner>,
    tx: watch::Sender<JobSnapshot>,
    schedule: Arc<Mutex<RecurringSchedule>>,
) {
    loop {
        tx.send_modify(|snapshot| snapshot.state = JobState::Scheduled);

        let current = *schedule.lock().unwrap();
        tokio::time::sleep(current.interval.saturating_sub(current.flex)).await;

        if current.requires_network && !inner.probe.is_online() {
            tx.send_modify(|snapshot| snapshot.state = JobState::Blocked);
            debug!("connectivity unavailable, sync blocked");
            while !inner.probe.is_online() {
                tokio::time::sleep(inner.connectivity_poll).await;
            }
        }

        execute_run(&inner, &tx).await;
    }
}
