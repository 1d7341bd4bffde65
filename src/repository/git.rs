use super::CommitInfo;
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::fs;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

const LOG_TARGET: &str = "       git";

/// Field separator used in `git log` output
const FIELD_SEPARATOR: char = '\x1f';

/// Local VCS client that drives the `git` command line.
///
/// Every invocation is bounded by a timeout; a command that overruns is killed.
#[derive(Debug, Clone, Copy)]
pub struct Git {
    timeout: Duration,
}

impl Git {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Make `dest` an up-to-date working clone of `clone_url`.
    ///
    /// A missing clone is created; an existing one has all its tags and branches fetched forward.
    /// An existing directory is never removed or recreated.
    pub async fn mirror(&self, clone_url: &str, dest: &Path) -> Result<()> {
        let start_time = std::time::Instant::now();
        let path_str = dest.to_str().into_app_err("invalid UTF-8 in repository path")?;

        if dest.exists() {
            if !dest.join(".git").exists() {
                bail!("'{path_str}' exists but is not a git working clone");
            }

            log::debug!(target: LOG_TARGET, "Fetching '{clone_url}' into '{path_str}'");
            let output = self.run(&["-C", path_str, "fetch", "--quiet", "--tags", "--force", "origin"]).await?;
            check_git_output(&output, "git fetch")?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
            }

            log::debug!(target: LOG_TARGET, "Cloning '{clone_url}' into '{path_str}'");
            let output = self.run(&["clone", "--quiet", clone_url, path_str]).await?;
            check_git_output(&output, "git clone")?;
        }

        log::debug!(target: LOG_TARGET, "Mirrored '{clone_url}' in {:.3}s", start_time.elapsed().as_secs_f64());
        Ok(())
    }

    /// Fetch one branch from `origin` so `origin/<branch>` is current
    pub async fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        let path_str = repo.to_str().into_app_err("invalid UTF-8 in repository path")?;
        let output = self.run(&["-C", path_str, "fetch", "--quiet", "origin", branch]).await?;
        check_git_output(&output, "git fetch")
    }

    /// Point the working tree at `target`, discarding anything left over from a previous checkout
    pub async fn checkout(&self, repo: &Path, target: &str) -> Result<()> {
        let path_str = repo.to_str().into_app_err("invalid UTF-8 in repository path")?;
        let output = self.run(&["-C", path_str, "checkout", "--quiet", "--force", "--detach", target]).await?;
        check_git_output(&output, "git checkout")
    }

    pub async fn list_tags(&self, repo: &Path) -> Result<Vec<String>> {
        let path_str = repo.to_str().into_app_err("invalid UTF-8 in repository path")?;
        let output = self.run(&["-C", path_str, "tag", "--list"]).await?;
        check_git_output(&output, "git tag")?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Read up to `limit` commits starting at `rev`, newest first
    pub async fn commit_log(&self, repo: &Path, rev: &str, limit: usize) -> Result<Vec<CommitInfo>> {
        let path_str = repo.to_str().into_app_err("invalid UTF-8 in repository path")?;
        let count = limit.to_string();
        let output = self
            .run(&["-C", path_str, "log", "-n", &count, "--format=%H%x1f%aI", rev, "--"])
            .await?;
        check_git_output(&output, "git log")?;
        parse_commit_log(&String::from_utf8_lossy(&output.stdout))
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        log::trace!(target: LOG_TARGET, "git {}", args.join(" "));

        let child = Command::new("git")
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .into_app_err("could not spawn git command")?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
            Err(_) => {
                bail!("'git {}' timed out after {} seconds", args.join(" "), self.timeout.as_secs());
            }
        }
    }
}

fn check_git_output(output: &Output, operation: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{operation} failed: {}", stderr.trim());
    }
    Ok(())
}

/// Parse `git log --format=%H%x1f%aI` output
fn parse_commit_log(stdout: &str) -> Result<Vec<CommitInfo>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let Some((hash, when)) = line.split_once(FIELD_SEPARATOR) else {
                bail!("malformed git log line '{line}'");
            };

            let when = DateTime::parse_from_rfc3339(when.trim())
                .into_app_err_with(|| format!("invalid commit date in git log line '{line}'"))?
                .with_timezone(&Utc);

            Ok(CommitInfo {
                hash: hash.trim().to_string(),
                when,
            })
        })
        .collect()
}
