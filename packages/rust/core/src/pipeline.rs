//! End-to-end mirror pipeline: fetch every repository, then collect and write artifacts.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use docmirror_artifacts::{ArtifactRequest, ArtifactWriter};
use docmirror_collector::{CollectOptions, collect};
use docmirror_fetcher::{Fetcher, GitCli, Vcs, WorkingCopy};
use docmirror_shared::{DocMirrorError, MirrorConfig, RepoDescriptor, Result, validate_repos};

use crate::report::{MirrorReport, RepoOutcome, RepoStatus};

/// Source of the local time stamped into artifact names and headers.
pub type Clock = fn() -> NaiveDateTime;

/// Result of fetching one repository in phase 1.
pub type FetchOutcome = Result<WorkingCopy>;

/// Current local wall-clock time.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each fetch completes, in completion order.
    fn repo_fetched(&self, name: &str, ok: bool, current: usize, total: usize);
    /// Called once per repository, in configuration order.
    fn repo_finished(&self, outcome: &RepoOutcome);
    /// Called when the pipeline completes.
    fn done(&self, report: &MirrorReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn repo_fetched(&self, _name: &str, _ok: bool, _current: usize, _total: usize) {}
    fn repo_finished(&self, _outcome: &RepoOutcome) {}
    fn done(&self, _report: &MirrorReport) {}
}

/// Mirror every configured repository using the `git` binary from `config`.
pub async fn mirror_with_git(
    config: &MirrorConfig,
    progress: &dyn ProgressReporter,
) -> Result<MirrorReport> {
    let vcs: Arc<dyn Vcs> = Arc::new(GitCli::new(config.git_binary.clone()));
    mirror_all(config, vcs, progress).await
}

/// Run the full mirror pipeline with the local clock.
pub async fn mirror_all(
    config: &MirrorConfig,
    vcs: Arc<dyn Vcs>,
    progress: &dyn ProgressReporter,
) -> Result<MirrorReport> {
    mirror_all_with_clock(config, vcs, progress, local_now).await
}

/// Run the full mirror pipeline.
///
/// 1. Fetch: every repository is cloned or pulled exactly once, up to
///    `config.concurrency` at a time.
/// 2. Collect + write: sequentially, in configuration order.
///
/// Per-repository failures land in the report; only an empty repository
/// list or descriptors that would share a working copy are errors.
#[instrument(skip_all, fields(repos = config.repos.len(), concurrency = config.concurrency))]
pub async fn mirror_all_with_clock(
    config: &MirrorConfig,
    vcs: Arc<dyn Vcs>,
    progress: &dyn ProgressReporter,
    clock: Clock,
) -> Result<MirrorReport> {
    if config.repos.is_empty() {
        return Err(DocMirrorError::validation("no repositories configured"));
    }
    validate_repos(&config.repos)?;

    let start = Instant::now();
    info!(output = %config.output_dir.display(), "starting mirror run");

    // --- Phase 1: Fetch ---
    progress.phase("Fetching repositories");
    let fetcher = Fetcher::new(vcs, &config.clone_root);
    let fetched = fetch_all(&fetcher, &config.repos, config.concurrency, progress).await;

    // --- Phase 2: Collect + write ---
    progress.phase("Writing artifacts");
    let writer = ArtifactWriter::new(&config.output_dir, &config.artifact_extension);
    let options = CollectOptions {
        extensions: config.extensions.clone(),
        sort_paths: config.sort_paths,
    };

    let mut outcomes = Vec::with_capacity(config.repos.len());
    for (repo, result) in config.repos.iter().zip(fetched) {
        let name = display_name(repo);
        let status = match result {
            Err(e) => RepoStatus::FetchFailed {
                error: e.to_string(),
            },
            Ok(wc) => match process(wc, &writer, &options, clock).await {
                Ok(status) => status,
                Err(e) => {
                    error!(repo = %name, error = %e, "failed to produce artifact");
                    RepoStatus::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };
        let outcome = RepoOutcome { name, status };
        progress.repo_finished(&outcome);
        outcomes.push(outcome);
    }

    let report = MirrorReport {
        repos: outcomes,
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    info!(
        updated = report.updated(),
        unchanged = report.unchanged(),
        failed = report.failed(),
        elapsed_ms = report.elapsed_ms,
        "mirror run complete"
    );

    progress.done(&report);
    Ok(report)
}

/// Fetch all repositories with bounded parallelism.
///
/// Results come back in `repos` order regardless of completion order.
async fn fetch_all(
    fetcher: &Fetcher,
    repos: &[RepoDescriptor],
    concurrency: usize,
    progress: &dyn ProgressReporter,
) -> Vec<FetchOutcome> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, repo) in repos.iter().cloned().enumerate() {
        let fetcher = fetcher.clone();
        let sem = semaphore.clone();
        set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let remote = repo.remote.clone();
            let result = tokio::task::spawn_blocking(move || fetcher.fetch(&repo))
                .await
                .unwrap_or_else(|e| {
                    Err(DocMirrorError::vcs("fetch", remote, format!("fetch task failed: {e}")))
                });
            (index, result)
        });
    }

    let total = repos.len();
    let mut slots: Vec<Option<FetchOutcome>> = (0..total).map(|_| None).collect();
    let mut completed = 0;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => {
                completed += 1;
                progress.repo_fetched(&display_name(&repos[index]), result.is_ok(), completed, total);
                slots[index] = Some(result);
            }
            Err(e) => warn!(error = %e, "fetch task aborted"),
        }
    }

    slots
        .into_iter()
        .zip(repos)
        .map(|(slot, repo)| {
            slot.unwrap_or_else(|| {
                Err(DocMirrorError::vcs("fetch", &repo.remote, "fetch task aborted"))
            })
        })
        .collect()
}

/// Collect one working copy and write its artifact off the async runtime.
async fn process(
    wc: WorkingCopy,
    writer: &ArtifactWriter,
    options: &CollectOptions,
    clock: Clock,
) -> Result<RepoStatus> {
    let writer = writer.clone();
    let options = options.clone();
    let name = wc.name.clone();

    tokio::task::spawn_blocking(move || -> Result<RepoStatus> {
        let doc = collect(&wc.docs_path, &options)?;
        if doc.is_empty() {
            warn!(repo = %wc.name, docs = %wc.docs_path.display(), "no documents found");
        }
        let outcome = writer.write(&ArtifactRequest {
            repo_name: &wc.name,
            revision: &wc.revision,
            content: &doc.content,
            generated_at: clock(),
        })?;
        Ok(RepoStatus::from_write(outcome, wc.revision, doc.files.len()))
    })
    .await
    .map_err(|e| DocMirrorError::validation(format!("artifact task for {name} failed: {e}")))?
}

fn display_name(repo: &RepoDescriptor) -> String {
    repo.name().unwrap_or_else(|_| repo.remote.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use docmirror_artifacts::parse_artifact;

    /// Fake git: clones materialise `docs` from an in-memory tree.
    struct FakeVcs {
        docs: Mutex<Vec<(String, String)>>,
        revision: Mutex<String>,
        failing_remotes: Vec<String>,
        fetches: Mutex<usize>,
    }

    impl FakeVcs {
        fn new(docs: &[(&str, &str)]) -> Self {
            Self {
                docs: Mutex::new(
                    docs.iter()
                        .map(|(p, c)| (p.to_string(), c.to_string()))
                        .collect(),
                ),
                revision: Mutex::new("1111111aaaaaaa".into()),
                failing_remotes: Vec::new(),
                fetches: Mutex::new(0),
            }
        }

        fn failing(mut self, remote: &str) -> Self {
            self.failing_remotes.push(remote.into());
            self
        }

        fn set_revision(&self, rev: &str) {
            *self.revision.lock().unwrap() = rev.into();
        }

        fn set_doc(&self, path: &str, content: &str) {
            let mut docs = self.docs.lock().unwrap();
            docs.retain(|(p, _)| p != path);
            docs.push((path.into(), content.into()));
        }

        fn fetches(&self) -> usize {
            *self.fetches.lock().unwrap()
        }

        fn materialise(&self, dest: &Path) {
            for (rel, content) in self.docs.lock().unwrap().iter() {
                let path = dest.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, content).unwrap();
            }
        }
    }

    impl Vcs for FakeVcs {
        fn clone_shallow(&self, remote: &str, dest: &Path) -> Result<()> {
            *self.fetches.lock().unwrap() += 1;
            if self.failing_remotes.iter().any(|r| r == remote) {
                return Err(DocMirrorError::vcs("git clone", remote, "repository not found"));
            }
            std::fs::create_dir_all(dest.join(".git")).unwrap();
            self.materialise(dest);
            Ok(())
        }

        fn pull(&self, working_copy: &Path) -> Result<()> {
            *self.fetches.lock().unwrap() += 1;
            self.materialise(working_copy);
            Ok(())
        }

        fn head_revision(&self, _working_copy: &Path) -> Result<String> {
            Ok(self.revision.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        fetched: Mutex<Vec<String>>,
        finished: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn repo_fetched(&self, name: &str, _ok: bool, _current: usize, _total: usize) {
            self.fetched.lock().unwrap().push(name.to_string());
        }
        fn repo_finished(&self, outcome: &RepoOutcome) {
            self.finished.lock().unwrap().push(outcome.summary_line());
        }
        fn done(&self, _report: &MirrorReport) {}
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dm-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(root: &Path, remotes: &[&str]) -> MirrorConfig {
        MirrorConfig {
            output_dir: root.join("output"),
            clone_root: root.join("clones"),
            git_binary: "git".into(),
            concurrency: 2,
            extensions: vec!["md".into(), "mdx".into()],
            sort_paths: true,
            artifact_extension: "mdx".into(),
            repos: remotes
                .iter()
                .map(|r| RepoDescriptor::new(*r, "website/docs"))
                .collect(),
        }
    }

    #[tokio::test]
    async fn writes_one_artifact_per_repo() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[
            ("website/docs/index.md", "Hello"),
            ("website/docs/guide/intro.mdx", "World"),
            ("README.md", "outside the docs subtree"),
        ]));
        let config = config(
            &tmp,
            &["https://example.com/org/alpha.git", "https://example.com/org/beta"],
        );

        let report = mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(report.updated(), 2);
        assert!(report.is_success());
        assert_eq!(vcs.fetches(), 2);
        assert_eq!(report.repos[0].name, "alpha");
        assert_eq!(report.repos[1].name, "beta");

        let artifact = tmp.join("output/alpha_20240501_1111111.mdx");
        let text = std::fs::read_to_string(&artifact).unwrap();
        assert!(text.starts_with(
            "Generated on: 2024-05-01 09:30:00\nLatest Commit SHA: 1111111\n\n"
        ));
        let body = parse_artifact(&text).unwrap().body;
        assert!(body.contains("Hello"));
        assert!(body.contains("World"));
        assert!(!body.contains("outside the docs subtree"));
        assert!(body.find("World").unwrap() < body.find("Hello").unwrap());

        match &report.repos[0].status {
            RepoStatus::Updated { artifact: path, files, .. } => {
                assert_eq!(path, &artifact);
                assert_eq!(*files, 2);
            }
            other => panic!("unexpected status: {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn rerun_without_changes_is_unchanged() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[("website/docs/index.md", "Hello")]));
        let config = config(&tmp, &["https://example.com/org/alpha.git"]);

        mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap();
        let progress = RecordingProgress::default();
        let second = mirror_all_with_clock(&config, vcs.clone(), &progress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(second.unchanged(), 1);
        assert_eq!(second.updated(), 0);
        assert_eq!(vcs.fetches(), 2);
        let lines = progress.finished.lock().unwrap().clone();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Skipping alpha - No changes detected."));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn content_change_on_same_revision_overwrites() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[("website/docs/index.md", "Hello")]));
        let config = config(&tmp, &["https://example.com/org/alpha.git"]);

        mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap();
        vcs.set_doc("website/docs/index.md", "Hello!");
        let report = mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(report.updated(), 1);
        let text =
            std::fs::read_to_string(tmp.join("output/alpha_20240501_1111111.mdx")).unwrap();
        assert!(text.contains("Hello!"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn new_revision_gets_new_artifact() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[("website/docs/index.md", "Hello")]));
        let config = config(&tmp, &["https://example.com/org/alpha.git"]);

        mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap();
        vcs.set_revision("2222222bbbbbbb");
        let report = mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(report.updated(), 1);
        assert!(tmp.join("output/alpha_20240501_1111111.mdx").exists());
        assert!(tmp.join("output/alpha_20240501_2222222.mdx").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn fetch_failure_does_not_stop_other_repos() {
        let tmp = temp_dir();
        let vcs = Arc::new(
            FakeVcs::new(&[("website/docs/index.md", "Hello")])
                .failing("https://example.com/org/broken.git"),
        );
        let config = config(
            &tmp,
            &[
                "https://example.com/org/broken.git",
                "https://example.com/org/alpha.git",
            ],
        );
        let progress = RecordingProgress::default();

        let report = mirror_all_with_clock(&config, vcs.clone(), &progress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.updated(), 1);
        assert!(!report.is_success());
        assert!(matches!(report.repos[0].status, RepoStatus::FetchFailed { .. }));
        assert!(!tmp.join("clones/broken").exists());
        assert!(tmp.join("output/alpha_20240501_1111111.mdx").exists());

        let mut fetched = progress.fetched.lock().unwrap().clone();
        fetched.sort();
        assert_eq!(fetched, vec!["alpha", "broken"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_docs_subtree_writes_header_only_artifact() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[("src/main.rs", "fn main() {}")]));
        let config = config(&tmp, &["https://example.com/org/alpha.git"]);

        let report = mirror_all_with_clock(&config, vcs, &SilentProgress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(report.updated(), 1);
        let text =
            std::fs::read_to_string(tmp.join("output/alpha_20240501_1111111.mdx")).unwrap();
        assert_eq!(
            text,
            "Generated on: 2024-05-01 09:30:00\nLatest Commit SHA: 1111111\n\n"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn unwritable_output_is_a_per_repo_failure() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[("website/docs/index.md", "Hello")]));
        let mut config = config(&tmp, &["https://example.com/org/alpha.git"]);
        // A regular file where the output directory should be.
        std::fs::write(tmp.join("blocker"), "x").unwrap();
        config.output_dir = tmp.join("blocker");

        let report = mirror_all_with_clock(&config, vcs, &SilentProgress, fixed_clock)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert!(matches!(report.repos[0].status, RepoStatus::Failed { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn empty_repo_list_is_rejected() {
        let tmp = temp_dir();
        let config = config(&tmp, &[]);
        let err = mirror_all(&config, Arc::new(FakeVcs::new(&[])), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DocMirrorError::Validation { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn colliding_repo_names_are_rejected_before_fetching() {
        let tmp = temp_dir();
        let vcs = Arc::new(FakeVcs::new(&[("website/docs/index.md", "Hello")]));
        let config = config(
            &tmp,
            &[
                "https://example.com/org/alpha.git",
                "https://mirror.example.com/alpha",
            ],
        );

        let err = mirror_all_with_clock(&config, vcs.clone(), &SilentProgress, fixed_clock)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("duplicate repository name 'alpha'"));
        assert_eq!(vcs.fetches(), 0);
        assert!(!tmp.join("clones").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
