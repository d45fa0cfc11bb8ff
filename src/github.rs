use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::args::Credentials;
use crate::types::{
    CommitBatch, CommitFilter, CommitInfo, CommitRecord, Contributor, ContributorInfo,
    ContributorStatsInfo, ContributorWeeklyStats, RepoInfo, WeekStats,
};

pub static DEFAULT_API_BASE: &str = "https://api.github.com";

const PER_PAGE: u32 = 100;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication rejected with status {0}")]
    Auth(u16),

    /// `/stats/*` answers 202 while GitHub computes the numbers.
    #[error("statistics for {0} are still being computed")]
    Pending(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Everything the bot needs from the source-hosting service.
///
/// `credentials` switches a call from the bot's default identity to the
/// user's own, which is how private repositories become visible.
#[async_trait]
pub trait RepoService: Send + Sync {
    async fn repository_exists_and_public(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<bool, ApiError>;

    async fn identity_check(&self, username: &str, password: &str) -> Result<(), ApiError>;

    async fn fetch_contributors(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Contributor>, ApiError>;

    /// Newest first. `truncated` is set when the page limit cut the listing short.
    async fn fetch_commits(
        &self,
        owner: &str,
        name: &str,
        filter: &CommitFilter,
        credentials: Option<&Credentials>,
    ) -> Result<CommitBatch, ApiError>;

    async fn fetch_contributor_weekly_stats(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<ContributorWeeklyStats>, ApiError>;
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    base: String,
    token: Option<String>,
    max_pages: usize,
}

impl GitHubClient {
    pub fn new(base: &str, token: Option<&str>, max_pages: usize) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("gitguard-bot/0.1"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        let client = Client::builder().default_headers(headers).build()?;
        Ok(GitHubClient {
            client,
            base: base.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
            max_pages: max_pages.max(1),
        })
    }

    /// User credentials win over the configured token; they are the only way
    /// to see repositories the bot's own identity cannot.
    fn get(&self, url: &str, credentials: Option<&Credentials>) -> RequestBuilder {
        let request = self.client.get(url);
        match (credentials, self.token.as_deref()) {
            (Some(c), _) => request.basic_auth(&c.username, Some(&c.password)),
            (None, Some(t)) => request.bearer_auth(t),
            (None, None) => request,
        }
    }

    /// Follows `rel="next"` for at most `max_pages` pages. The flag tells
    /// whether more pages were left unread.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        first_url: String,
        max_pages: usize,
        credentials: Option<&Credentials>,
    ) -> Result<(Vec<T>, bool), ApiError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;
        let mut truncated = false;
        while let Some(url) = next.take() {
            if pages == max_pages {
                debug!(%url, max_pages, "page limit reached, stopping");
                truncated = true;
                break;
            }
            let resp = check_status(self.get(&url, credentials).send().await?, &url)?;
            next = resp
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(|link| parse_rel_url(link, "next"));
            let mut page: Vec<T> = resp.json().await?;
            items.append(&mut page);
            pages += 1;
        }
        Ok((items, truncated))
    }
}

#[async_trait]
impl RepoService for GitHubClient {
    async fn repository_exists_and_public(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<bool, ApiError> {
        let url = format!("{}/repos/{owner}/{name}", self.base);
        let resp = check_status(self.get(&url, credentials).send().await?, &url)?;
        let repo: RepoInfo = resp.json().await?;
        debug!(repo = %repo.full_name, private = repo.private, "repository lookup");
        Ok(!repo.private)
    }

    async fn identity_check(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = format!("{}/user", self.base);
        let resp = self
            .client
            .get(&url)
            .basic_auth(username, Some(password))
            .send()
            .await?;
        check_status(resp, &url)?;
        Ok(())
    }

    async fn fetch_contributors(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Contributor>, ApiError> {
        let url = format!(
            "{}/repos/{owner}/{name}/contributors?per_page={PER_PAGE}",
            self.base
        );
        let (raw, truncated): (Vec<ContributorInfo>, _) =
            self.get_paginated(url, self.max_pages, credentials).await?;
        if truncated {
            debug!(owner, name, "contributor listing cut at page limit");
        }
        Ok(raw
            .into_iter()
            .map(|c| Contributor {
                username: c.login,
                contributions: c.contributions,
            })
            .collect())
    }

    async fn fetch_commits(
        &self,
        owner: &str,
        name: &str,
        filter: &CommitFilter,
        credentials: Option<&Credentials>,
    ) -> Result<CommitBatch, ApiError> {
        let (url, max_pages) = commits_request(&self.base, owner, name, filter, self.max_pages);
        let (raw, truncated): (Vec<CommitInfo>, _) =
            self.get_paginated(url, max_pages, credentials).await?;
        Ok(CommitBatch {
            commits: raw.into_iter().map(to_commit_record).collect(),
            // A limited listing asks for the first few on purpose.
            truncated: truncated && filter.limit.is_none(),
        })
    }

    async fn fetch_contributor_weekly_stats(
        &self,
        owner: &str,
        name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<ContributorWeeklyStats>, ApiError> {
        let url = format!("{}/repos/{owner}/{name}/stats/contributors", self.base);
        let resp = check_status(self.get(&url, credentials).send().await?, &url)?;
        if resp.status() == StatusCode::ACCEPTED {
            return Err(ApiError::Pending(format!("{owner}/{name}")));
        }
        let raw: Vec<ContributorStatsInfo> = resp.json().await?;
        Ok(raw.into_iter().map(to_weekly_stats).collect())
    }
}

fn check_status(resp: Response, url: &str) -> Result<Response, ApiError> {
    let status = resp.status();
    match status {
        s if s.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(url.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Auth(status.as_u16())),
        _ => Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }),
    }
}

/// URL of the first commits page and how many pages to follow. A `limit`
/// is served by a single page of that size.
fn commits_request(
    base: &str,
    owner: &str,
    name: &str,
    filter: &CommitFilter,
    max_pages: usize,
) -> (String, usize) {
    let (per_page, pages) = match filter.limit {
        Some(n) => (n.clamp(1, PER_PAGE), 1),
        None => (PER_PAGE, max_pages),
    };
    let mut url = format!("{base}/repos/{owner}/{name}/commits?per_page={per_page}");
    if let Some(since) = filter.since {
        url.push_str(&format!("&since={}T00:00:00Z", since.format("%Y-%m-%d")));
    }
    (url, pages)
}

fn to_commit_record(info: CommitInfo) -> CommitRecord {
    CommitRecord {
        sha: info.sha,
        message: info.commit.message,
        author_name: info.commit.author.name,
        author_email: info.commit.author.email,
        author_login: info.author.map(|a| a.login),
        committer_login: info.committer.map(|c| c.login),
        timestamp: info.commit.committer.date,
    }
}

fn to_weekly_stats(info: ContributorStatsInfo) -> ContributorWeeklyStats {
    ContributorWeeklyStats {
        login: info
            .author
            .map(|a| a.login)
            .unwrap_or_else(|| "(unknown)".to_string()),
        weeks: info
            .weeks
            .into_iter()
            .filter_map(|w| {
                let week_start = DateTime::from_timestamp(w.w, 0)?.date_naive();
                Some(WeekStats {
                    week_start,
                    commits: w.c,
                    additions: w.a,
                    deletions: w.d,
                })
            })
            .collect(),
    }
}

/// Target of the `Link` entry tagged `rel`, e.g. the next page of a listing.
fn parse_rel_url(link_header: &str, rel: &str) -> Option<String> {
    let tag = format!("rel=\"{rel}\"");
    link_header
        .split(',')
        .map(str::trim)
        .filter(|entry| entry.ends_with(&tag))
        .find_map(|entry| {
            let (_, rest) = entry.split_once('<')?;
            let (url, _) = rest.split_once('>')?;
            Some(url.to_string())
        })
}
