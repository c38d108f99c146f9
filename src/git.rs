//! Subprocess git client — the reference `GitClient` implementation
//!
//! Shells out to the `git` binary. Credentials are embedded into the
//! remote URL for http(s) remotes; public remotes work untouched.

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;

use repowiki_core::git::{
    CloneOutcome, CommitInfo, DiffEntry, GitClient, GitError, GitResult, PullOutcome,
};

/// Field and record separators for machine-readable `git log` output.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const LOG_FORMAT: &str = "%H%x1f%an%x1f%aI%x1f%B%x1e";

pub struct SubprocessGit;

impl SubprocessGit {
    pub fn new() -> Self {
        Self
    }

    async fn run(args: &[&str], dir: Option<&str>) -> Result<String, String> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        debug!("git {}", args.join(" "));
        let output = cmd.output().await.map_err(|e| e.to_string())?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn authed_url(address: &str, user: Option<&str>, password: Option<&str>) -> String {
        if let (Some(user), Some(password)) = (user, password) {
            if let Some(rest) = address.strip_prefix("https://") {
                return format!("https://{}:{}@{}", user, password, rest);
            }
            if let Some(rest) = address.strip_prefix("http://") {
                return format!("http://{}:{}@{}", user, password, rest);
            }
        }
        address.to_string()
    }

    fn parse_log(raw: &str) -> Vec<CommitInfo> {
        raw.split(RECORD_SEP)
            .filter_map(|record| {
                let record = record.trim();
                if record.is_empty() {
                    return None;
                }
                let mut fields = record.split(FIELD_SEP);
                let id = fields.next()?.trim().to_string();
                let author = fields.next()?.trim().to_string();
                let date = fields
                    .next()
                    .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
                    .map(|d| d.with_timezone(&Utc))?;
                let message = fields.next().unwrap_or_default().trim().to_string();
                Some(CommitInfo {
                    id,
                    message,
                    author,
                    date,
                })
            })
            .collect()
    }

    /// Derive `(organization, repository_name)` from a remote address.
    fn identity(address: &str) -> (String, String) {
        let trimmed = address
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .replace(':', "/");
        let mut segments = trimmed.rsplit('/');
        let name = segments.next().unwrap_or_default().to_string();
        let organization = segments.next().unwrap_or_default().to_string();
        (organization, name)
    }
}

impl Default for SubprocessGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GitClient for SubprocessGit {
    async fn clone_repository(
        &self,
        address: &str,
        user: Option<&str>,
        password: Option<&str>,
        branch: Option<&str>,
        target_dir: &str,
    ) -> GitResult<CloneOutcome> {
        let url = Self::authed_url(address, user, password);

        if std::path::Path::new(target_dir).join(".git").is_dir() {
            // Working tree already materialized from an earlier run.
            Self::run(&["fetch", "--all"], Some(target_dir))
                .await
                .map_err(GitError::CloneFailed)?;
        } else {
            let mut args = vec!["clone"];
            if let Some(branch) = branch {
                args.extend(["--branch", branch]);
            }
            args.extend([url.as_str(), target_dir]);
            Self::run(&args, None)
                .await
                .map_err(GitError::CloneFailed)?;
        }

        let branch_name = Self::run(&["rev-parse", "--abbrev-ref", "HEAD"], Some(target_dir))
            .await
            .map_err(GitError::CloneFailed)?
            .trim()
            .to_string();
        let version = Self::run(&["rev-parse", "HEAD"], Some(target_dir))
            .await
            .map_err(GitError::CloneFailed)?
            .trim()
            .to_string();
        let (organization, repository_name) = Self::identity(address);

        Ok(CloneOutcome {
            local_path: target_dir.to_string(),
            repository_name,
            branch_name,
            organization,
            version,
        })
    }

    async fn pull(
        &self,
        local_path: &str,
        since: Option<&str>,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> GitResult<PullOutcome> {
        Self::run(&["pull", "--ff-only"], Some(local_path))
            .await
            .map_err(GitError::PullFailed)?;

        let head_version = Self::run(&["rev-parse", "HEAD"], Some(local_path))
            .await
            .map_err(GitError::PullFailed)?
            .trim()
            .to_string();

        let range = match since {
            Some(since) if since != head_version => format!("{}..HEAD", since),
            Some(_) => return Ok(PullOutcome {
                commits: Vec::new(),
                head_version,
            }),
            None => "HEAD".to_string(),
        };
        let raw = Self::run(
            &["log", "--reverse", &format!("--format={}", LOG_FORMAT), &range],
            Some(local_path),
        )
        .await
        .map_err(GitError::PullFailed)?;

        Ok(PullOutcome {
            commits: Self::parse_log(&raw),
            head_version,
        })
    }

    async fn diff(&self, local_path: &str, from: &str, to: &str) -> GitResult<Vec<DiffEntry>> {
        let raw = Self::run(&["diff", "--name-status", from, to], Some(local_path))
            .await
            .map_err(GitError::DiffFailed)?;
        Ok(raw
            .lines()
            .filter_map(|line| {
                let mut parts = line.split('\t');
                let status = parts.next()?.trim().to_string();
                // Renames carry two paths; the new one is last.
                let path = parts.last()?.trim().to_string();
                if status.is_empty() || path.is_empty() {
                    None
                } else {
                    Some(DiffEntry { status, path })
                }
            })
            .collect())
    }

    async fn log(&self, local_path: &str, limit: usize) -> GitResult<Vec<CommitInfo>> {
        let count = limit.to_string();
        let raw = Self::run(
            &["log", "-n", &count, &format!("--format={}", LOG_FORMAT)],
            Some(local_path),
        )
        .await
        .map_err(GitError::LogFailed)?;
        Ok(Self::parse_log(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_https_remote() {
        let (org, name) = SubprocessGit::identity("https://example.test/acme/widget.git");
        assert_eq!(org, "acme");
        assert_eq!(name, "widget");
    }

    #[test]
    fn identity_from_ssh_remote() {
        let (org, name) = SubprocessGit::identity("git@example.test:acme/widget.git");
        assert_eq!(org, "acme");
        assert_eq!(name, "widget");
    }

    #[test]
    fn credentials_embed_into_https() {
        let url = SubprocessGit::authed_url("https://example.test/a/b.git", Some("u"), Some("p"));
        assert_eq!(url, "https://u:p@example.test/a/b.git");
        let public = SubprocessGit::authed_url("https://example.test/a/b.git", None, None);
        assert_eq!(public, "https://example.test/a/b.git");
    }

    #[test]
    fn log_parsing_handles_multiline_messages() {
        let raw = format!(
            "abc{f}alice{f}2026-01-02T03:04:05+00:00{f}feat: add thing\n\nlonger body{r}\ndef{f}bob{f}2026-01-03T03:04:05+00:00{f}fix: oops{r}",
            f = FIELD_SEP,
            r = RECORD_SEP
        );
        let commits = SubprocessGit::parse_log(&raw);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "abc");
        assert!(commits[0].message.contains("longer body"));
        assert_eq!(commits[1].author, "bob");
    }
}
