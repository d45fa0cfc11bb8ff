//! In-process fakes for the GitHub service and the chart renderer.
//!
//! Both record every call so tests can assert on ordering and on calls that
//! must never happen.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::args::Credentials;
use crate::chart::{ChartRenderer, ChartSpec};
use crate::github::{ApiError, RepoService};
use crate::types::{CommitBatch, CommitFilter, CommitRecord, Contributor, ContributorWeeklyStats};

#[derive(Default)]
pub struct FakeRepoService {
    missing: HashSet<String>,
    private: HashSet<String>,
    broken: HashSet<String>,
    invalid_passwords: HashSet<String>,
    identity_outage: bool,
    fetch_failure: bool,
    stats_pending: bool,
    commits_truncated: bool,
    contributors: Vec<Contributor>,
    commits: Vec<CommitRecord>,
    stats: Vec<ContributorWeeklyStats>,
    calls: Mutex<Vec<String>>,
}

impl FakeRepoService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_repo(mut self, link: &str) -> Self {
        self.missing.insert(link.to_string());
        self
    }

    pub fn with_private_repo(mut self, link: &str) -> Self {
        self.private.insert(link.to_string());
        self
    }

    pub fn with_broken_repo(mut self, link: &str) -> Self {
        self.broken.insert(link.to_string());
        self
    }

    pub fn with_invalid_password(mut self, password: &str) -> Self {
        self.invalid_passwords.insert(password.to_string());
        self
    }

    pub fn with_identity_outage(mut self) -> Self {
        self.identity_outage = true;
        self
    }

    pub fn with_fetch_failure(mut self) -> Self {
        self.fetch_failure = true;
        self
    }

    pub fn with_stats_pending(mut self) -> Self {
        self.stats_pending = true;
        self
    }

    /// Listings come back flagged as cut short by the page limit.
    pub fn with_truncated_commits(mut self) -> Self {
        self.commits_truncated = true;
        self
    }

    pub fn with_contributors(mut self, contributors: Vec<Contributor>) -> Self {
        self.contributors = contributors;
        self
    }

    pub fn with_commits(mut self, commits: Vec<CommitRecord>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_stats(mut self, stats: Vec<ContributorWeeklyStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fetch_guard(&self, owner: &str, name: &str) -> Result<(), ApiError> {
        if self.fetch_failure {
            return Err(ApiError::Status {
                status: 502,
                url: format!("fake://{owner}/{name}"),
            });
        }
        Ok(())
    }
}

fn describe(credentials: Option<&Credentials>) -> String {
    credentials
        .map(|c| format!(" as {}", c.username))
        .unwrap_or_default()
}

#[async_trait]
impl RepoService for FakeRepoService {
    async fn repository_exists_and_public(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<bool, ApiError> {
        let link = format!("{owner}/{name}");
        self.record(format!(
            "repository_exists_and_public {link}{}",
            describe(credentials)
        ));
        if self.missing.contains(&link) {
            return Err(ApiError::NotFound(link));
        }
        if self.broken.contains(&link) {
            return Err(ApiError::Status {
                status: 500,
                url: link,
            });
        }
        Ok(!self.private.contains(&link))
    }

    async fn identity_check(&self, username: &str, password: &str) -> Result<(), ApiError> {
        self.record(format!("identity_check {username}"));
        if self.identity_outage {
            return Err(ApiError::Status {
                status: 503,
                url: "fake://user".to_string(),
            });
        }
        if self.invalid_passwords.contains(password) {
            return Err(ApiError::Auth(401));
        }
        Ok(())
    }

    async fn fetch_contributors(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Contributor>, ApiError> {
        self.record(format!(
            "fetch_contributors {owner}/{name}{}",
            describe(credentials)
        ));
        self.fetch_guard(owner, name)?;
        Ok(self.contributors.clone())
    }

    async fn fetch_commits(
        &self,
        owner: &str,
        name: &str,
        filter: &CommitFilter,
        credentials: Option<&Credentials>,
    ) -> Result<CommitBatch, ApiError> {
        let since = filter
            .since
            .map(|d| format!(" since {d}"))
            .unwrap_or_default();
        let limit = filter
            .limit
            .map(|n| format!(" limit {n}"))
            .unwrap_or_default();
        self.record(format!(
            "fetch_commits {owner}/{name}{since}{limit}{}",
            describe(credentials)
        ));
        self.fetch_guard(owner, name)?;
        let mut commits = self.commits.clone();
        if let Some(n) = filter.limit {
            commits.truncate(n as usize);
        }
        Ok(CommitBatch {
            commits,
            truncated: self.commits_truncated && filter.limit.is_none(),
        })
    }

    async fn fetch_contributor_weekly_stats(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<ContributorWeeklyStats>, ApiError> {
        self.record(format!(
            "fetch_contributor_weekly_stats {owner}/{name}{}",
            describe(credentials)
        ));
        self.fetch_guard(owner, name)?;
        if self.stats_pending {
            return Err(ApiError::Pending(format!("{owner}/{name}")));
        }
        Ok(self.stats.clone())
    }
}

/// Writes a placeholder file instead of calling a chart service.
#[derive(Default)]
pub struct FakeChartRenderer {
    pub fail: bool,
    rendered: Mutex<Vec<ChartSpec>>,
}

impl FakeChartRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> Vec<ChartSpec> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChartRenderer for FakeChartRenderer {
    async fn render(&self, spec: &ChartSpec, out: &Path) -> Result<()> {
        if self.fail {
            anyhow::bail!("chart service unavailable");
        }
        self.rendered.lock().unwrap().push(spec.clone());
        std::fs::write(out, b"\x89PNG fake")?;
        Ok(())
    }
}
