use std::str::FromStr;

use crate::args::ArgumentShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    TopThree,
    TopContributor,
    LastCommit,
    CommitHistory,
    TeamContribution,
    TeamLinesContribution,
}

/// Report commands, in the order the greeting lists them.
pub const REPORT_COMMANDS: [Command; 6] = [
    Command::TopThree,
    Command::TopContributor,
    Command::CommitHistory,
    Command::TeamContribution,
    Command::TeamLinesContribution,
    Command::LastCommit,
];

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::TopThree => "top_three",
            Command::TopContributor => "top_contributor",
            Command::LastCommit => "last_commit",
            Command::CommitHistory => "commit_history",
            Command::TeamContribution => "team_contribution",
            Command::TeamLinesContribution => "team_lines_contribution",
        }
    }

    pub fn shape(self) -> ArgumentShape {
        match self {
            Command::TopContributor => ArgumentShape::RepoWithSinceAndCredentials,
            _ => ArgumentShape::RepoWithCredentials,
        }
    }

    pub fn usage(self) -> String {
        if self == Command::Start {
            return "/start".to_string();
        }
        match self.shape() {
            ArgumentShape::RepoWithCredentials => {
                format!("/{} <repo_link> [<username> <password>]", self.name())
            }
            ArgumentShape::RepoWithSinceAndCredentials => {
                format!(
                    "/{} <repo_link> [since] [<username> <password>]",
                    self.name()
                )
            }
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.name())
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Command::Start),
            "top_three" => Ok(Command::TopThree),
            "top_contributor" => Ok(Command::TopContributor),
            "last_commit" => Ok(Command::LastCommit),
            "commit_history" => Ok(Command::CommitHistory),
            "team_contribution" => Ok(Command::TeamContribution),
            "team_lines_contribution" => Ok(Command::TeamLinesContribution),
            _ => anyhow::bail!("Unknown command '{}'", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: Command,
    pub tokens: Vec<String>,
    pub chat_id: i64,
}

/// Reads `/name[@bot] arg arg ...`. A `@bot` suffix naming some other bot, as
/// seen in group chats, is not a command for us; neither is anything else.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<(Command, Vec<String>)> {
    let mut words = text.split_whitespace();
    let head = words.next()?.strip_prefix('/')?;
    let name = match head.split_once('@') {
        Some((name, addressee)) => {
            if bot_username.is_some_and(|me| !me.eq_ignore_ascii_case(addressee)) {
                return None;
            }
            name
        }
        None => head,
    };
    let command = name.parse::<Command>().ok()?;
    Some((command, words.map(str::to_string).collect()))
}

impl CommandInvocation {
    pub fn from_text(text: &str, chat_id: i64, bot_username: Option<&str>) -> Option<Self> {
        let (command, tokens) = parse_command(text, bot_username)?;
        Some(CommandInvocation {
            command,
            tokens,
            chat_id,
        })
    }
}
