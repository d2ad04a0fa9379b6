//! Mirror of the Ergo Improvement Proposals repository
//!
//! Keeps a local clone of the EIP repository, parses it into an in-memory
//! index and refreshes it on a timer. Readers always see a fully built
//! index: publishing is an atomic swap of the index handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use git2::Repository;
use regex::Regex;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use utoipa::ToSchema;

pub const DEFAULT_EIP_REPO_URL: &str = "https://github.com/ergoplatform/eips.git";

/// The refresher checks the shutdown signal at least this often.
const SHUTDOWN_POLL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EipSummary {
    pub number: u32,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EipDetail {
    pub number: u32,
    pub title: String,
    pub status: String,
    pub content: String,
}

type EipIndex = BTreeMap<u32, EipDetail>;

pub struct EipManager {
    repo_url: String,
    local_dir: PathBuf,
    refresh_interval: Duration,
    index: RwLock<Arc<EipIndex>>,
    shutdown: watch::Sender<bool>,
}

impl EipManager {
    pub fn new(repo_url: &str, local_dir: impl Into<PathBuf>, refresh_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            repo_url: repo_url.to_string(),
            local_dir: local_dir.into(),
            refresh_interval,
            index: RwLock::new(Arc::new(EipIndex::new())),
            shutdown,
        }
    }

    /// Sync the local mirror and rebuild the index. On failure the
    /// previously published index stays in place.
    pub async fn load(&self) -> Result<usize> {
        let repo_url = self.repo_url.clone();
        let local_dir = self.local_dir.clone();

        let index = tokio::task::spawn_blocking(move || -> Result<EipIndex> {
            sync_repository(&repo_url, &local_dir)?;
            parse_directory(&local_dir)
        })
        .await
        .context("EIP load task panicked")??;

        let count = index.len();
        *self.index.write().await = Arc::new(index);
        tracing::info!(count, "published EIP index");
        Ok(count)
    }

    /// All EIPs, ascending by number.
    pub async fn list(&self) -> Vec<EipSummary> {
        let index = self.index.read().await.clone();
        index
            .values()
            .map(|eip| EipSummary {
                number: eip.number,
                title: eip.title.clone(),
                status: eip.status.clone(),
            })
            .collect()
    }

    pub async fn get(&self, number: u32) -> Option<EipDetail> {
        let index = self.index.read().await.clone();
        index.get(&number).cloned()
    }

    /// Start the background refresh loop. The task sleeps in short slices
    /// so a shutdown signal is observed within a minute.
    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                let mut remaining = manager.refresh_interval;
                while remaining > Duration::ZERO {
                    let slice = remaining.min(SHUTDOWN_POLL);
                    tokio::select! {
                        _ = tokio::time::sleep(slice) => {}
                        _ = shutdown.changed() => {}
                    }
                    if *shutdown.borrow() {
                        tracing::info!("EIP refresher stopping");
                        return;
                    }
                    remaining = remaining.saturating_sub(slice);
                }

                match manager.load().await {
                    Ok(count) => tracing::info!(count, "refreshed EIP index"),
                    Err(e) => {
                        tracing::error!(error = %e, "EIP refresh failed, keeping previous index");
                    }
                }
            }
        })
    }

    /// Signal the refresher to exit; the caller joins the handle with a
    /// bounded timeout.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Clone the repository if the directory is missing, otherwise pull. A
/// failed pull removes the working copy and re-clones once.
fn sync_repository(repo_url: &str, local_dir: &Path) -> Result<()> {
    if !local_dir.exists() {
        tracing::info!(url = repo_url, dir = %local_dir.display(), "cloning EIP repository");
        Repository::clone(repo_url, local_dir)
            .with_context(|| format!("failed to clone {repo_url}"))?;
        return Ok(());
    }

    match pull_fast_forward(local_dir) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, dir = %local_dir.display(), "pull failed, recloning");
            std::fs::remove_dir_all(local_dir).ok();
            Repository::clone(repo_url, local_dir)
                .with_context(|| format!("failed to re-clone {repo_url}"))?;
            Ok(())
        }
    }
}

fn pull_fast_forward(local_dir: &Path) -> Result<()> {
    let repo = Repository::open(local_dir).context("failed to open EIP working copy")?;
    let branch = repo
        .head()
        .ok()
        .and_then(|h| h.shorthand().map(str::to_string))
        .unwrap_or_else(|| "master".to_string());

    let mut remote = repo.find_remote("origin").context("no origin remote")?;
    remote
        .fetch(&[branch.as_str()], None, None)
        .with_context(|| format!("fetch of {branch} failed"))?;

    let remote_ref = repo
        .find_reference(&format!("refs/remotes/origin/{branch}"))
        .context("remote tracking branch missing")?;
    let target = remote_ref.peel_to_commit().context("remote head is not a commit")?;
    // The mirror is read-only: hard reset is the whole merge strategy.
    repo.reset(target.as_object(), git2::ResetType::Hard, None)
        .context("reset to remote head failed")?;

    tracing::info!(branch = %branch, commit = %target.id(), "EIP mirror up to date");
    Ok(())
}

fn eip_file_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^eip-(\d+)\.md$").expect("valid EIP file pattern"))
}

/// Walk a working copy and parse every `eip-<number>.md` into the index.
fn parse_directory(dir: &Path) -> Result<EipIndex> {
    let mut index = EipIndex::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)
            .with_context(|| format!("cannot read {}", current.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                // .git holds packfiles, nothing to parse there
                if entry.file_name() != ".git" {
                    pending.push(path);
                }
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(captures) = eip_file_pattern().captures(name) else {
                continue;
            };
            let Ok(number) = captures[1].parse::<u32>() else {
                continue;
            };

            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let (title, status) = parse_front_matter(&content);
                    tracing::debug!(number, title = %title, "parsed EIP file");
                    index.insert(
                        number,
                        EipDetail {
                            number,
                            title,
                            status,
                            content,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable EIP file");
                }
            }
        }
    }

    Ok(index)
}

/// Title = first top-level markdown heading; status = the value of the
/// first `| Status | ... |` table row.
fn parse_front_matter(content: &str) -> (String, String) {
    static TITLE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    static STATUS: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let title_re = TITLE.get_or_init(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid title pattern"));
    let status_re = STATUS
        .get_or_init(|| Regex::new(r"(?m)^\|\s*Status\s*\|\s*(.+?)\s*\|").expect("valid status pattern"));

    let title = title_re
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "Unknown Title".to_string());
    let status = status_re
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    (title, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EIP_1: &str = "# UTXO-Set Scanning Wallet API\n\n\
        | Author | kushti |\n| Status | Implemented |\n| Created | 2019 |\n\n\
        Body text.\n";
    const EIP_22: &str = "# Auction contract\n\nNo status table here.\n";

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eip-1.md"), EIP_1).unwrap();
        std::fs::write(dir.path().join("eip-22.md"), EIP_22).unwrap();
        std::fs::write(dir.path().join("README.md"), "# not an eip").unwrap();
        std::fs::write(dir.path().join("eip-bad.md"), "# malformed name").unwrap();
        dir
    }

    #[test]
    fn parses_only_eip_files() {
        let dir = fixture_dir();
        let index = parse_directory(dir.path()).unwrap();
        assert_eq!(index.keys().copied().collect::<Vec<_>>(), vec![1, 22]);

        let eip1 = &index[&1];
        assert_eq!(eip1.title, "UTXO-Set Scanning Wallet API");
        assert_eq!(eip1.status, "Implemented");
        assert!(eip1.content.contains("Body text."));

        let eip22 = &index[&22];
        assert_eq!(eip22.title, "Auction contract");
        assert_eq!(eip22.status, "Unknown");
    }

    #[test]
    fn missing_title_defaults() {
        let (title, status) = parse_front_matter("just prose, no headings");
        assert_eq!(title, "Unknown Title");
        assert_eq!(status, "Unknown");
    }

    #[test]
    fn nested_directories_are_walked() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("assets");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("eip-7.md"), "# Nested proposal\n").unwrap();
        let index = parse_directory(dir.path()).unwrap();
        assert_eq!(index[&7].title, "Nested proposal");
    }

    #[tokio::test]
    async fn list_is_sorted_and_get_round_trips() {
        let dir = fixture_dir();
        let manager = EipManager::new(
            DEFAULT_EIP_REPO_URL,
            dir.path(),
            Duration::from_secs(24 * 60 * 60),
        );
        // install an index directly; repository sync is not under test here
        *manager.index.write().await = Arc::new(parse_directory(dir.path()).unwrap());

        let listed = manager.list().await;
        assert_eq!(
            listed.iter().map(|e| e.number).collect::<Vec<_>>(),
            vec![1, 22]
        );
        for summary in &listed {
            let detail = manager.get(summary.number).await.unwrap();
            assert_eq!(detail.number, summary.number);
            assert_eq!(detail.title, summary.title);
        }
        assert!(manager.get(999).await.is_none());
    }

    #[tokio::test]
    async fn refresher_exits_promptly_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(EipManager::new(
            DEFAULT_EIP_REPO_URL,
            dir.path(),
            Duration::from_secs(24 * 60 * 60),
        ));
        let handle = manager.spawn_refresher();
        manager.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("refresher did not stop in time")
            .unwrap();
    }
}
