use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::chart::{ChartKind, ChartSpec, Series};
use crate::types::{CommitRecord, Contributor, ContributorWeeklyStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopContributor {
    pub username: String,
    pub name: String,
    pub commits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTotals {
    pub login: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// GitHub already orders contributors by contribution count.
pub fn top_n(mut contributors: Vec<Contributor>, n: usize) -> Vec<Contributor> {
    contributors.truncate(n);
    contributors
}

/// Author with the most commits in `commits`. Ties go to whoever appears first,
/// which for GitHub's newest-first listing is the most recently active author.
pub fn top_contributor(commits: &[CommitRecord]) -> Option<TopContributor> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, (usize, &str)> = HashMap::new();
    for c in commits {
        let key = c.author_login.as_deref().unwrap_or(&c.author_name);
        let entry = counts.entry(key).or_insert_with(|| {
            order.push(key);
            (0, c.author_name.as_str())
        });
        entry.0 += 1;
    }

    let mut best: Option<(&str, usize, &str)> = None;
    for key in order {
        let (count, name) = counts[key];
        if best.is_none_or(|(_, top, _)| count > top) {
            best = Some((key, count, name));
        }
    }
    best.map(|(username, commits, name)| TopContributor {
        username: username.to_string(),
        name: name.to_string(),
        commits,
    })
}

/// Commits per week across all authors, oldest week first.
pub fn weekly_commit_totals(stats: &[ContributorWeeklyStats]) -> Vec<(NaiveDate, u64)> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for author in stats {
        for week in &author.weeks {
            *buckets.entry(week.week_start).or_default() += week.commits;
        }
    }
    buckets.into_iter().collect()
}

/// Per-author sums, largest number of touched lines first.
pub fn line_totals(stats: &[ContributorWeeklyStats]) -> Vec<LineTotals> {
    let mut totals: Vec<LineTotals> = stats
        .iter()
        .map(|author| LineTotals {
            login: author.login.clone(),
            commits: author.weeks.iter().map(|w| w.commits).sum(),
            additions: author.weeks.iter().map(|w| w.additions).sum(),
            deletions: author.weeks.iter().map(|w| w.deletions).sum(),
        })
        .collect();
    totals.sort_by(|a, b| {
        (b.additions + b.deletions)
            .cmp(&(a.additions + a.deletions))
            .then_with(|| a.login.cmp(&b.login))
    });
    totals
}

pub fn team_contribution_chart(contributors: &[Contributor]) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Bar,
        title: "Team Contribution".to_string(),
        labels: contributors.iter().map(|c| c.username.clone()).collect(),
        series: vec![Series {
            label: "Commits".to_string(),
            values: contributors.iter().map(|c| c.contributions).collect(),
        }],
    }
}

pub fn commit_history_chart(stats: &[ContributorWeeklyStats]) -> ChartSpec {
    let weeks = weekly_commit_totals(stats);
    ChartSpec {
        kind: ChartKind::Line,
        title: "Team Commit History".to_string(),
        labels: weeks
            .iter()
            .map(|(week, _)| week.format("%Y-%m-%d").to_string())
            .collect(),
        series: vec![Series {
            label: "Commits per week".to_string(),
            values: weeks.iter().map(|(_, commits)| *commits).collect(),
        }],
    }
}

pub fn team_lines_chart(totals: &[LineTotals]) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Bar,
        title: "Team Lines Contribution".to_string(),
        labels: totals.iter().map(|t| t.login.clone()).collect(),
        series: vec![
            Series {
                label: "Insertions".to_string(),
                values: totals.iter().map(|t| t.additions).collect(),
            },
            Series {
                label: "Deletions".to_string(),
                values: totals.iter().map(|t| t.deletions).collect(),
            },
        ],
    }
}
