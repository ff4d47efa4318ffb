//! Integration tests for gitvault
//!
//! Exercises full sync runs against local bare repositories: first-run
//! clone, pull-commit-push reconciliation, the remote-wins conflict
//! policy, and failure isolation. No network access is required.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git2::{Repository as Git2Repo, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use gitvault::{
    AlwaysOnline, Credentials, JobState, Outcome, Scheduler, Settings, SettingsStore,
    SyncConfiguration, SyncEngine, SyncWorker,
};

/// A seeded bare remote plus an engine wired to a private settings store
struct Fixture {
    _tmp: TempDir,
    remote_url: String,
    local_path: PathBuf,
    store: SettingsStore,
    engine: SyncEngine,
}

fn setup() -> Fixture {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let remote_url = seed_remote(tmp.path());
    let store = SettingsStore::new(tmp.path().join("config.toml"));
    let engine = SyncEngine::new(store.clone());
    let local_path = tmp.path().join("vault");
    Fixture {
        _tmp: tmp,
        remote_url,
        local_path,
        store,
        engine,
    }
}

/// Create a bare remote containing one commit of `base.txt` on `main`
fn seed_remote(root: &Path) -> String {
    let seed = root.join("seed");
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("refs/heads/main");
    let repo = Git2Repo::init_opts(&seed, &opts).expect("Failed to init seed repo");
    std::fs::write(seed.join("base.txt"), "base\n").expect("Failed to write seed file");

    let sig = Signature::now("seed", "seed@localhost").unwrap();
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();
    drop(tree);

    let bare = root.join("remote.git");
    git2::build::RepoBuilder::new()
        .bare(true)
        .clone(seed.to_str().unwrap(), &bare)
        .expect("Failed to create bare remote");
    bare.to_str().unwrap().to_string()
}

fn config_for(fixture: &Fixture) -> SyncConfiguration {
    SyncConfiguration {
        remote_url: fixture.remote_url.clone(),
        local_path: fixture.local_path.clone(),
        branch: "main".to_string(),
        credentials: Credentials::default(),
    }
}

/// Run the engine once, collecting every progress report
fn run(fixture: &Fixture, config: &SyncConfiguration) -> (Outcome, Vec<u8>) {
    let mut reports = Vec::new();
    let outcome = fixture.engine.run(config, &mut |value| reports.push(value));
    (outcome, reports)
}

/// A second author committing and pushing `contents` to `file`
fn push_from_other_clone(root: &Path, remote_url: &str, file: &str, contents: &str) {
    let other = root.join("other");
    let repo =
        gitvault::git::Repository::clone(remote_url, &other, "main", &Credentials::default())
            .expect("other clone failed");
    std::fs::write(other.join(file), contents).unwrap();
    repo.commit_all("other change").unwrap();
    repo.push("main", &Credentials::default()).unwrap();
    std::fs::remove_dir_all(other).unwrap();
}

fn remote_tip_id(remote_url: &str) -> git2::Oid {
    let repo = Git2Repo::open(remote_url).unwrap();
    let id = repo
        .find_reference("refs/heads/main")
        .unwrap()
        .peel_to_commit()
        .unwrap()
        .id();
    id
}

fn remote_tip_message(remote_url: &str) -> String {
    let repo = Git2Repo::open(remote_url).unwrap();
    let tip = repo
        .find_reference("refs/heads/main")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    tip.message().unwrap_or_default().to_string()
}

fn remote_has_file(remote_url: &str, name: &str) -> bool {
    let repo = Git2Repo::open(remote_url).unwrap();
    let tip = repo
        .find_reference("refs/heads/main")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    let has = tip.tree().unwrap().get_name(name).is_some();
    has
}

fn last_sync_time(store: &SettingsStore) -> Option<i64> {
    store.load_or_default().unwrap().last_sync_time
}

// =============================================================================
// Fast-fail and state resolution
// =============================================================================

#[test]
fn test_empty_remote_url_fails_without_side_effects() {
    let fixture = setup();
    let mut config = config_for(&fixture);
    config.remote_url = String::new();

    let (outcome, _) = run(&fixture, &config);

    assert_eq!(outcome, Outcome::Failure);
    assert!(!fixture.local_path.exists());
    assert!(last_sync_time(&fixture.store).is_none());
}

#[test]
fn test_present_but_invalid_repository_fails() {
    let fixture = setup();
    std::fs::create_dir(&fixture.local_path).unwrap();

    let (outcome, _) = run(&fixture, &config_for(&fixture));

    assert_eq!(outcome, Outcome::Failure);
    assert!(last_sync_time(&fixture.store).is_none());
}

// =============================================================================
// CLONE branch
// =============================================================================

#[test]
fn test_absent_path_clones_and_records_last_sync() {
    let fixture = setup();

    let (outcome, reports) = run(&fixture, &config_for(&fixture));

    assert_eq!(outcome, Outcome::Success);
    assert!(fixture.local_path.join("base.txt").exists());

    let repo = Git2Repo::open(&fixture.local_path).unwrap();
    assert_eq!(repo.head().unwrap().shorthand(), Some("main"));

    assert!(last_sync_time(&fixture.store).is_some());
    // No intermediate checkpoint on the clone branch.
    assert_eq!(reports, vec![0]);
}

// =============================================================================
// PULL-COMMIT-PUSH branch
// =============================================================================

#[test]
fn test_second_run_is_idempotent_and_advances_last_sync() {
    let fixture = setup();
    let config = config_for(&fixture);

    let (first, _) = run(&fixture, &config);
    assert_eq!(first, Outcome::Success);
    let first_sync = last_sync_time(&fixture.store).unwrap();

    std::thread::sleep(Duration::from_millis(10));

    let (second, reports) = run(&fixture, &config);
    assert_eq!(second, Outcome::Success);

    let second_sync = last_sync_time(&fixture.store).unwrap();
    assert!(second_sync > first_sync);

    // Nothing to commit is a continuation, and the pull checkpoint fired.
    assert!(reports.contains(&50));
}

#[test]
fn test_local_changes_are_committed_and_pushed() {
    let fixture = setup();
    let config = config_for(&fixture);
    assert_eq!(run(&fixture, &config).0, Outcome::Success);

    std::fs::write(fixture.local_path.join("note.txt"), "local work\n").unwrap();
    assert_eq!(run(&fixture, &config).0, Outcome::Success);

    assert!(remote_has_file(&fixture.remote_url, "note.txt"));
    assert_eq!(remote_tip_message(&fixture.remote_url), "vault backup");
}

#[test]
fn test_incoming_remote_changes_are_pulled() {
    let fixture = setup();
    let config = config_for(&fixture);
    assert_eq!(run(&fixture, &config).0, Outcome::Success);

    push_from_other_clone(
        fixture._tmp.path(),
        &fixture.remote_url,
        "shared.txt",
        "from elsewhere\n",
    );

    assert_eq!(run(&fixture, &config).0, Outcome::Success);
    let contents = std::fs::read_to_string(fixture.local_path.join("shared.txt")).unwrap();
    assert_eq!(contents, "from elsewhere\n");
}

#[test]
fn test_conflicting_local_edit_is_discarded_remote_wins() {
    let fixture = setup();
    let config = config_for(&fixture);
    assert_eq!(run(&fixture, &config).0, Outcome::Success);

    // Remote rewrites base.txt; local has an uncommitted edit to the same
    // file plus an unrelated new file.
    push_from_other_clone(
        fixture._tmp.path(),
        &fixture.remote_url,
        "base.txt",
        "remote version\n",
    );
    std::fs::write(fixture.local_path.join("base.txt"), "local edit\n").unwrap();
    std::fs::write(fixture.local_path.join("mine.txt"), "survives\n").unwrap();

    assert_eq!(run(&fixture, &config).0, Outcome::Success);

    let base = std::fs::read_to_string(fixture.local_path.join("base.txt")).unwrap();
    assert_eq!(base, "remote version\n");

    // The non-conflicting local file survived the pull and was pushed.
    assert!(remote_has_file(&fixture.remote_url, "mine.txt"));
}

// =============================================================================
// Failure isolation
// =============================================================================

#[test]
fn test_push_failure_preserves_local_commit() {
    let fixture = setup();
    let config = config_for(&fixture);
    assert_eq!(run(&fixture, &config).0, Outcome::Success);
    let first_sync = last_sync_time(&fixture.store).unwrap();
    let tip_before = remote_tip_id(&fixture.remote_url);

    // Pull keeps using the fetch URL; only the push target is broken.
    let local = Git2Repo::open(&fixture.local_path).unwrap();
    local
        .remote_set_pushurl("origin", Some("/nonexistent/push-target.git"))
        .unwrap();
    drop(local);

    std::fs::write(fixture.local_path.join("stranded.txt"), "not published\n").unwrap();
    let (outcome, _) = run(&fixture, &config);

    assert_eq!(outcome, Outcome::Failure);

    // The commit exists locally even though the run failed...
    let local = Git2Repo::open(&fixture.local_path).unwrap();
    let head = local.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.message(), Some("vault backup"));

    // ...while the remote and the last-sync record are untouched.
    assert_eq!(remote_tip_id(&fixture.remote_url), tip_before);
    assert_eq!(last_sync_time(&fixture.store), Some(first_sync));
}

// =============================================================================
// Scheduler wiring
// =============================================================================

#[tokio::test]
async fn test_one_shot_sync_through_the_scheduler() {
    let fixture = setup();

    let mut settings = Settings::default();
    settings.remote_url = fixture.remote_url.clone();
    settings.local_path = fixture.local_path.clone();
    fixture.store.save(&settings).unwrap();

    let worker = Arc::new(SyncWorker::new(fixture.store.clone()));
    let scheduler = Scheduler::new(worker, Arc::new(AlwaysOnline));

    let id = scheduler.submit_once(vec!["manual".to_string()]);
    let mut rx = scheduler.observe(id).expect("job is observable");

    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let state = rx.borrow().state;
            match state {
                JobState::Succeeded => break,
                JobState::Failed | JobState::Cancelled => panic!("sync failed"),
                _ => rx.changed().await.expect("sender dropped"),
            }
        }
    })
    .await
    .expect("sync did not finish in time");

    assert!(fixture.local_path.join("base.txt").exists());
    assert!(last_sync_time(&fixture.store).is_some());
}
