use chrono::NaiveDate;

use crate::analytics::{LineTotals, TopContributor};
use crate::args::{RejectionReason, format_date};
use crate::github::ApiError;
use crate::types::{CommitRecord, Contributor};

pub fn greeting(commands: &[String]) -> String {
    format!(
        "I'm a bot, please talk to me!\nYou can use {}",
        commands.join(" ")
    )
}

pub fn format_top_contributors(repo: &str, contributors: &[Contributor]) -> String {
    if contributors.is_empty() {
        return format!("{repo} has no contributors yet.");
    }
    let mut lines = vec![format!("Top contributors of {repo}:")];
    for (rank, c) in contributors.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({} commits)",
            rank + 1,
            c.username,
            c.contributions
        ));
    }
    lines.join("\n")
}

/// `partial` carries the number of commits counted when the listing was cut
/// short by the page limit.
pub fn format_top_contributor(
    repo: &str,
    since: NaiveDate,
    top: Option<&TopContributor>,
    partial: Option<usize>,
) -> String {
    let since = format_date(since);
    let text = match top {
        Some(t) if t.username == t.name => format!(
            "Top contributor of {repo} since {since}: {} with {} commits",
            t.username, t.commits
        ),
        Some(t) => format!(
            "Top contributor of {repo} since {since}: {} ({}) with {} commits",
            t.username, t.name, t.commits
        ),
        None => format!("No commits in {repo} since {since}."),
    };
    match partial {
        Some(counted) => format!(
            "{text}\nOnly the newest {counted} commits were counted; older ones in this period were skipped."
        ),
        None => text,
    }
}

pub fn format_commit_summary(repo: &str, commit: Option<&CommitRecord>) -> String {
    let Some(c) = commit else {
        return format!("{repo} has no commits yet.");
    };
    let username = c.committer_login.as_deref().unwrap_or("-");
    format!(
        "Last commit of {repo}\n\
         Author    : {} <{}>\n\
         Username  : {username}\n\
         Timestamp : {}\n\
         Message   : {}",
        c.author_name,
        c.author_email,
        c.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        first_line(&c.message)
    )
}

pub fn format_line_totals(repo: &str, totals: &[LineTotals]) -> String {
    let commits: u64 = totals.iter().map(|t| t.commits).sum();
    let additions: u64 = totals.iter().map(|t| t.additions).sum();
    let deletions: u64 = totals.iter().map(|t| t.deletions).sum();
    format!("{repo}: {commits} commits, +{additions} / -{deletions} lines")
}

pub fn format_rejection(reason: RejectionReason, usage: &str) -> String {
    match reason {
        RejectionReason::BadArgumentCount => {
            format!("Wrong format. Format must follow `{usage}`")
        }
        RejectionReason::InvalidRepoFormat => {
            "Wrong or invalid github repo. Repo format must follow `<username>/<repo_name>`"
                .to_string()
        }
        RejectionReason::InvalidCredentials => "Wrong github credentials.".to_string(),
        RejectionReason::InvalidDateFormat => {
            "Wrong date format. Format must follow `yyyy/mm/dd`".to_string()
        }
    }
}

pub fn format_service_failure(error: &ApiError) -> String {
    match error {
        ApiError::Pending(repo) => format!(
            "GitHub is still computing statistics for {repo}. Please try again in a minute."
        ),
        _ => "GitHub is unavailable right now. Please try again later.".to_string(),
    }
}

pub fn chart_failure() -> String {
    "Could not draw the chart right now. Please try again later.".to_string()
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s)
}
