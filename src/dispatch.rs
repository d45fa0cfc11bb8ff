use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analytics;
use crate::args::{RejectionReason, ResolvedParameters, disambiguate};
use crate::chart::{ChartRenderer, ChartSpec};
use crate::commands::{Command, CommandInvocation, REPORT_COMMANDS};
use crate::github::{ApiError, RepoService};
use crate::output;
use crate::types::CommitFilter;

static CHART_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text { text: String, markdown: bool },
    Photo { path: PathBuf, caption: Option<String> },
}

impl Reply {
    fn plain(text: String) -> Self {
        Reply::Text {
            text,
            markdown: false,
        }
    }

    fn markdown(text: String) -> Self {
        Reply::Text {
            text,
            markdown: true,
        }
    }
}

fn greeting() -> Reply {
    let names: Vec<String> = REPORT_COMMANDS.iter().map(|c| c.to_string()).collect();
    Reply::plain(output::greeting(&names))
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Rejected(#[from] RejectionReason),

    #[error(transparent)]
    ExternalService(#[from] ApiError),

    #[error("chart rendering failed: {0:#}")]
    Chart(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub top_n: usize,
    pub since_default_days: u64,
    pub chart_dir: PathBuf,
}

/// Runs one command from tokens to reply. Holds no per-request state, so a
/// single instance serves every chat concurrently.
pub struct Dispatcher<S, C> {
    service: S,
    charts: C,
    settings: DispatchSettings,
}

impl<S: RepoService, C: ChartRenderer> Dispatcher<S, C> {
    pub fn new(service: S, charts: C, settings: DispatchSettings) -> Self {
        Dispatcher {
            service,
            charts,
            settings,
        }
    }

    /// Always yields exactly one reply; failures become templated messages.
    pub async fn handle(&self, invocation: &CommandInvocation, today: NaiveDate) -> Reply {
        let command = invocation.command;
        match self.run(invocation, today).await {
            Ok(reply) => reply,
            Err(DispatchError::Rejected(reason)) => {
                info!(%command, ?reason, "command rejected");
                Reply::markdown(output::format_rejection(reason, &command.usage()))
            }
            Err(DispatchError::ExternalService(e)) => {
                error!(%command, error = %e, "GitHub request failed");
                Reply::plain(output::format_service_failure(&e))
            }
            Err(e @ DispatchError::Chart(_)) => {
                error!(%command, error = %e, "chart request failed");
                Reply::plain(output::chart_failure())
            }
        }
    }

    async fn run(
        &self,
        invocation: &CommandInvocation,
        today: NaiveDate,
    ) -> Result<Reply, DispatchError> {
        let command = invocation.command;
        if command == Command::Start {
            return Ok(greeting());
        }

        let params = disambiguate(command.shape(), &invocation.tokens, &self.service).await?;
        debug!(
            %command,
            repo = %params.repo,
            since = ?params.since,
            authenticated = params.credentials.is_some(),
            "arguments resolved"
        );
        self.report(command, &params, today, invocation.chat_id)
            .await
    }

    async fn report(
        &self,
        command: Command,
        params: &ResolvedParameters,
        today: NaiveDate,
        chat_id: i64,
    ) -> Result<Reply, DispatchError> {
        let repo = params.repo.to_string();
        let (owner, name) = (params.repo.owner.as_str(), params.repo.name.as_str());
        let credentials = params.credentials.as_ref();

        match command {
            Command::Start => Ok(greeting()),
            Command::TopThree => {
                let contributors = self
                    .service
                    .fetch_contributors(owner, name, credentials)
                    .await?;
                let top = analytics::top_n(contributors, self.settings.top_n);
                Ok(Reply::plain(output::format_top_contributors(&repo, &top)))
            }
            Command::TopContributor => {
                let since = params.since.unwrap_or_else(|| self.default_since(today));
                let filter = CommitFilter {
                    since: Some(since),
                    limit: None,
                };
                let batch = self
                    .service
                    .fetch_commits(owner, name, &filter, credentials)
                    .await?;
                if batch.truncated {
                    warn!(
                        %repo,
                        counted = batch.commits.len(),
                        "commit listing cut at page limit"
                    );
                }
                let top = analytics::top_contributor(&batch.commits);
                Ok(Reply::plain(output::format_top_contributor(
                    &repo,
                    since,
                    top.as_ref(),
                    batch.truncated.then_some(batch.commits.len()),
                )))
            }
            Command::LastCommit => {
                let filter = CommitFilter {
                    since: None,
                    limit: Some(1),
                };
                let batch = self
                    .service
                    .fetch_commits(owner, name, &filter, credentials)
                    .await?;
                Ok(Reply::plain(output::format_commit_summary(
                    &repo,
                    batch.commits.first(),
                )))
            }
            Command::CommitHistory => {
                let stats = self
                    .service
                    .fetch_contributor_weekly_stats(owner, name, credentials)
                    .await?;
                let chart = analytics::commit_history_chart(&stats);
                self.chart_reply(command, chat_id, &chart, None).await
            }
            Command::TeamContribution => {
                let contributors = self
                    .service
                    .fetch_contributors(owner, name, credentials)
                    .await?;
                let chart = analytics::team_contribution_chart(&contributors);
                self.chart_reply(command, chat_id, &chart, None).await
            }
            Command::TeamLinesContribution => {
                let stats = self
                    .service
                    .fetch_contributor_weekly_stats(owner, name, credentials)
                    .await?;
                let totals = analytics::line_totals(&stats);
                let chart = analytics::team_lines_chart(&totals);
                let caption = output::format_line_totals(&repo, &totals);
                self.chart_reply(command, chat_id, &chart, Some(caption))
                    .await
            }
        }
    }

    fn default_since(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(self.settings.since_default_days))
            .unwrap_or(NaiveDate::MIN)
    }

    async fn chart_reply(
        &self,
        command: Command,
        chat_id: i64,
        chart: &ChartSpec,
        caption: Option<String>,
    ) -> Result<Reply, DispatchError> {
        let path = self.settings.chart_dir.join(format!(
            "gitguard-{}-{}-{}-{}.png",
            std::process::id(),
            command.name(),
            chat_id,
            CHART_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        self.charts
            .render(chart, &path)
            .await
            .map_err(DispatchError::Chart)?;
        Ok(Reply::Photo { path, caption })
    }
}
