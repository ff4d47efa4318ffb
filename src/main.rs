//! gitvault CLI - continuous git-backed backup

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use gitvault::engine::SyncWorker;
use gitvault::scheduler::{AlwaysOnline, DEFAULT_FLEX};
use gitvault::status::{progress_fraction, status_text};
use gitvault::{
    ConnectivityProbe, Error, ExistingJobPolicy, JobState, RecurringSchedule, RepositoryState,
    Scheduler, Settings, SettingsStore, TcpProbe,
};

/// Name of the unique recurring job the daemon keeps alive
const PERIODIC_JOB: &str = "periodic-sync";

#[derive(Parser)]
#[command(name = "gitvault")]
#[command(about = "Keeps a local working copy backed up to a remote git repository", long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a settings file with defaults
    Init,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run a single sync now
    Sync,

    /// Run the periodic sync daemon until interrupted
    Daemon,

    /// Show configuration, working copy state, and last sync time
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,

    /// Set a settings key (remote_url, local_path, branch, git_username,
    /// git_password, sync_interval)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let store = match cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::default_location().map_err(with_suggestion)?,
    };

    match cli.command {
        Commands::Init => init_settings(&store),
        Commands::Config { action } => configure(&store, action),
        Commands::Sync => sync_once(&store).await,
        Commands::Daemon => run_daemon(&store).await,
        Commands::Status => show_status(&store),
    }
}

fn init_settings(store: &SettingsStore) -> anyhow::Result<()> {
    if store.path().exists() {
        println!("Settings file already exists at {}", store.path().display());
        return Ok(());
    }

    store.save(&Settings::default()).map_err(with_suggestion)?;

    println!("Created {}", store.path().display());
    println!();
    println!("Get started:");
    println!("  gitvault config set remote_url https://example.test/vault.git");
    println!("  gitvault config set local_path ~/vault");
    println!("  gitvault sync");
    Ok(())
}

fn configure(store: &SettingsStore, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = store.load_or_default().map_err(with_suggestion)?;
            println!("remote_url    = {}", settings.remote_url);
            println!("local_path    = {}", settings.local_path.display());
            println!("branch        = {}", settings.branch);
            println!("git_username  = {}", settings.git_username);
            println!(
                "git_password  = {}",
                if settings.git_password.is_empty() { "" } else { "********" }
            );
            println!("sync_interval = {} minutes", settings.sync_interval);
        }
        ConfigAction::Set { key, value } => {
            let mut settings = store.load_or_default().map_err(with_suggestion)?;
            settings.set_key(&key, &value).map_err(with_suggestion)?;
            store.save(&settings).map_err(with_suggestion)?;
            println!("Set {key}");
        }
    }
    Ok(())
}

async fn sync_once(store: &SettingsStore) -> anyhow::Result<()> {
    let worker = Arc::new(SyncWorker::new(store.clone()));
    let scheduler = Scheduler::new(worker, Arc::new(AlwaysOnline));

    let id = scheduler.submit_once(vec!["manual".to_string()]);
    let mut rx = scheduler
        .observe(id)
        .context("submitted job is not observable")?;

    loop {
        let snapshot = rx.borrow().clone();
        println!(
            "{} ({:3.0}%)",
            status_text(snapshot.state),
            progress_fraction(snapshot.progress) * 100.0
        );
        match snapshot.state {
            JobState::Succeeded => return Ok(()),
            JobState::Failed | JobState::Cancelled => {
                anyhow::bail!("sync did not complete: {}", status_text(snapshot.state))
            }
            _ => rx.changed().await?,
        }
    }
}

async fn run_daemon(store: &SettingsStore) -> anyhow::Result<()> {
    let settings = store.load_or_default().map_err(with_suggestion)?;
    if settings.remote_url.is_empty() {
        return Err(with_suggestion(Error::MissingRemoteUrl));
    }

    let probe: Arc<dyn ConnectivityProbe> = match TcpProbe::for_remote(&settings.remote_url) {
        Some(probe) => Arc::new(probe),
        // Local remotes need no connectivity
        None => Arc::new(AlwaysOnline),
    };

    let interval = Duration::from_secs(settings.sync_interval.max(1) * 60);
    let schedule = RecurringSchedule {
        interval,
        flex: DEFAULT_FLEX.min(interval / 2),
        requires_network: true,
    };

    let scheduler = Scheduler::new(Arc::new(SyncWorker::new(store.clone())), probe);
    let id = scheduler.submit_recurring(PERIODIC_JOB, schedule, ExistingJobPolicy::Update);
    info!(
        id,
        interval_minutes = settings.sync_interval,
        remote = %settings.remote_url,
        "periodic sync scheduled"
    );

    let mut rx = scheduler
        .observe(id)
        .context("recurring job is not observable")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                changed?;
                let snapshot = rx.borrow().clone();
                info!(
                    state = status_text(snapshot.state),
                    progress = snapshot.progress,
                    "sync state changed"
                );
            }
        }
    }

    info!("shutting down");
    scheduler.shutdown();
    Ok(())
}

fn show_status(store: &SettingsStore) -> anyhow::Result<()> {
    let settings = store.load_or_default().map_err(with_suggestion)?;

    println!("gitvault status");
    println!("===============");
    println!("Settings file: {}", store.path().display());
    if settings.remote_url.is_empty() {
        println!("Remote: (not configured)");
    } else {
        println!("Remote: {}", settings.remote_url);
    }
    println!("Branch: {}", settings.branch);
    println!("Sync interval: {} minutes", settings.sync_interval);

    match gitvault::resolve(&settings.local_path) {
        RepositoryState::Absent => {
            println!("Working copy: absent (first sync will clone)");
        }
        RepositoryState::Present => match gitvault::git::Repository::open(&settings.local_path) {
            Ok(repo) => {
                let dirty = repo.has_changes().unwrap_or(false);
                println!(
                    "Working copy: {} ({})",
                    settings.local_path.display(),
                    if dirty { "uncommitted changes" } else { "clean" }
                );
            }
            Err(_) => {
                println!(
                    "Working copy: {} (not a valid repository)",
                    settings.local_path.display()
                );
            }
        },
    }

    match settings.last_sync() {
        Some(when) => println!("Last sync: {}", when.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Last sync: never"),
    }
    Ok(())
}

/// Attach the error's suggestion, when it has one, to the message shown
/// at the CLI boundary
fn with_suggestion(err: Error) -> anyhow::Error {
    match err.suggestion() {
        Some(hint) => anyhow::anyhow!("{err}\n  hint: {hint}"),
        None => anyhow::Error::new(err),
    }
}
