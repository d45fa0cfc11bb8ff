use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

// GitHub REST payloads, only the fields the bot reads.

#[derive(Debug, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContributorInfo {
    pub login: String,
    pub contributions: u64,
}

#[derive(Debug, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub commit: CommitMeta,
    pub author: Option<AccountRef>,
    pub committer: Option<AccountRef>,
}

#[derive(Debug, Deserialize)]
pub struct CommitMeta {
    pub author: AuthorMeta,
    pub committer: AuthorMeta,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthorMeta {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AccountRef {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct ContributorStatsInfo {
    pub author: Option<AccountRef>,
    pub weeks: Vec<WeekInfo>,
}

/// One row of `/stats/contributors`: `w` is the week start as a unix timestamp,
/// `a`/`d`/`c` are additions, deletions and commits.
#[derive(Debug, Deserialize)]
pub struct WeekInfo {
    pub w: i64,
    pub a: u64,
    pub d: u64,
    pub c: u64,
}

// Flat records handed to the rest of the bot.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub username: String,
    pub contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub author_login: Option<String>,
    pub committer_login: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekStats {
    pub week_start: NaiveDate,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorWeeklyStats {
    pub login: String,
    pub weeks: Vec<WeekStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitBatch {
    pub commits: Vec<CommitRecord>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CommitFilter {
    pub since: Option<NaiveDate>,
    /// Only the newest `limit` commits, fetched in one request.
    pub limit: Option<u32>,
}
