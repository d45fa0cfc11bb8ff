use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod analytics;
mod args;
mod chart;
mod commands;
mod config;
mod dispatch;
mod github;
mod output;
mod telegram;
mod types;

#[cfg(test)]
mod testing;

use chart::QuickChartRenderer;
use commands::CommandInvocation;
use config::Config;
use dispatch::Dispatcher;
use github::GitHubClient;
use telegram::TelegramClient;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

type BotDispatcher = Dispatcher<GitHubClient, QuickChartRenderer>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = Config::parse();

    let config = if let Some(config_file) = &cli_config.config_file {
        let file_config = Config::from_toml(config_file)
            .with_context(|| format!("Failed to load configuration from {config_file}"))?;
        cli_config.merge(file_config)
    } else {
        cli_config
    };

    init_tracing(config.verbose);
    config.validate()?;

    let github = GitHubClient::new(
        config.api_base(),
        config.github_token.as_deref(),
        config.max_pages(),
    )?;
    let charts = QuickChartRenderer::new(
        config.chart_url(),
        config.chart_width(),
        config.chart_height(),
    )?;
    let dispatcher = Arc::new(Dispatcher::new(github, charts, config.dispatch_settings()));
    let bot = TelegramClient::new(
        config.telegram_api(),
        config.telegram_token()?,
        config.poll_timeout(),
    )?;

    let me = bot
        .get_me()
        .await
        .context("Failed to identify the bot with Telegram")?;
    info!(
        api = config.api_base(),
        bot_id = me.id,
        bot = me.username.as_deref().unwrap_or("-"),
        "gitguard bot started, polling for updates"
    );

    tokio::select! {
        _ = poll_updates(&bot, me.username.as_deref(), dispatcher, config.poll_timeout()) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("shutdown requested");
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "gitguard_bot=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn poll_updates(
    bot: &TelegramClient,
    bot_username: Option<&str>,
    dispatcher: Arc<BotDispatcher>,
    timeout: u64,
) {
    let mut offset = 0;
    loop {
        let updates = match bot.get_updates(offset, timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to fetch updates, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text.as_deref() else {
                continue;
            };
            let Some(invocation) =
                CommandInvocation::from_text(text, message.chat.id, bot_username)
            else {
                continue;
            };
            debug!(
                chat_id = message.chat.id,
                message_id = message.message_id,
                command = %invocation.command,
                "command received"
            );

            // One task per command so a slow GitHub call never stalls other chats.
            let bot = bot.clone();
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let reply = dispatcher.handle(&invocation, Local::now().date_naive()).await;
                if let Err(e) = bot.deliver(invocation.chat_id, reply).await {
                    error!(
                        chat_id = invocation.chat_id,
                        command = %invocation.command,
                        error = %format!("{e:#}"),
                        "failed to send reply"
                    );
                }
            });
        }
    }
}
