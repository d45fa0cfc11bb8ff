//! Turns the loose token list of a bot command into a fixed parameter set.
//!
//! Every report command takes a repository link first. After it, some commands
//! accept a `username password` pair, and `/top_contributor` also accepts a
//! `YYYY/MM/DD` cutoff, before or after the pair. Validation always runs
//! repo first, then date, then credentials.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::github::{ApiError, RepoService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLink {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keeps passwords out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameters {
    pub repo: RepoLink,
    pub since: Option<NaiveDate>,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("wrong number of arguments")]
    BadArgumentCount,
    #[error("invalid or unknown repository link")]
    InvalidRepoFormat,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid date")]
    InvalidDateFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentShape {
    /// `<repo> [<user> <pass>]`
    RepoWithCredentials,
    /// `<repo> [since] [<user> <pass>]`, date and pair in either order
    RepoWithSinceAndCredentials,
}

impl ArgumentShape {
    pub fn accepts_count(self, count: usize) -> bool {
        match self {
            ArgumentShape::RepoWithCredentials => count == 1 || count == 3,
            ArgumentShape::RepoWithSinceAndCredentials => (1..=4).contains(&count),
        }
    }
}

/// Splits `owner/name` without touching the network.
pub fn split_repo_link(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.split('/').map(str::trim);
    let owner = parts.next()?;
    let name = parts.next()?;
    if parts.next().is_some() || owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner, name))
}

pub async fn validate_repo_link<S: RepoService + ?Sized>(
    token: &str,
    service: &S,
    credentials: Option<&Credentials>,
) -> Result<RepoLink, RejectionReason> {
    let Some((owner, name)) = split_repo_link(token) else {
        debug!(token, "repository link is not owner/name");
        return Err(RejectionReason::InvalidRepoFormat);
    };
    match service
        .repository_exists_and_public(owner, name, credentials)
        .await
    {
        Ok(true) => Ok(RepoLink {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        Ok(false) => {
            info!(owner, name, "repository is not public");
            Err(RejectionReason::InvalidRepoFormat)
        }
        Err(ApiError::NotFound(_)) => {
            info!(owner, name, "repository not found");
            Err(RejectionReason::InvalidRepoFormat)
        }
        Err(e) => {
            warn!(owner, name, error = %e, "repository lookup failed, rejecting link");
            Err(RejectionReason::InvalidRepoFormat)
        }
    }
}

pub async fn validate_credentials<S: RepoService + ?Sized>(
    service: &S,
    username: &str,
    password: &str,
) -> bool {
    match service.identity_check(username, password).await {
        Ok(()) => true,
        Err(ApiError::Auth(status)) => {
            info!(username, status, "credentials rejected");
            false
        }
        Err(e) => {
            warn!(username, error = %e, "identity check failed, treating credentials as invalid");
            false
        }
    }
}

/// Parses a zero-padded `YYYY/MM/DD` calendar date. Never fails loudly.
pub fn parse_date(token: &str) -> Option<NaiveDate> {
    let bytes = token.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'/' || bytes[7] != b'/' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    let year = token[0..4].parse::<i32>().ok()?;
    let month = token[5..7].parse::<u32>().ok()?;
    let day = token[8..10].parse::<u32>().ok()?;
    if year < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn format_date(date: NaiveDate) -> String {
    format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day())
}

async fn credentials_from<S: RepoService + ?Sized>(
    service: &S,
    username: &str,
    password: &str,
) -> Result<Credentials, RejectionReason> {
    if validate_credentials(service, username, password).await {
        Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    } else {
        Err(RejectionReason::InvalidCredentials)
    }
}

pub async fn disambiguate<S: RepoService + ?Sized>(
    shape: ArgumentShape,
    tokens: &[String],
    service: &S,
) -> Result<ResolvedParameters, RejectionReason> {
    if !shape.accepts_count(tokens.len()) {
        return Err(RejectionReason::BadArgumentCount);
    }

    let repo = validate_repo_link(&tokens[0], service, None).await?;

    let (since, credentials) = match (shape, &tokens[1..]) {
        (_, []) => (None, None),
        (ArgumentShape::RepoWithSinceAndCredentials, [date]) => {
            let since = parse_date(date).ok_or(RejectionReason::InvalidDateFormat)?;
            (Some(since), None)
        }
        // A bare trailing pair is always credentials, never (date, junk).
        (_, [user, pass]) => (None, Some(credentials_from(service, user, pass).await?)),
        (ArgumentShape::RepoWithSinceAndCredentials, [first, middle, last]) => {
            // The leading date wins; a credential failure after it is final.
            if let Some(since) = parse_date(first) {
                let creds = credentials_from(service, middle, last).await?;
                (Some(since), Some(creds))
            } else if let Some(since) = parse_date(last) {
                let creds = credentials_from(service, first, middle).await?;
                (Some(since), Some(creds))
            } else {
                return Err(RejectionReason::InvalidDateFormat);
            }
        }
        _ => return Err(RejectionReason::BadArgumentCount),
    };

    Ok(ResolvedParameters {
        repo,
        since,
        credentials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepoService;
    use proptest::prelude::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_bad_count_makes_no_calls() {
        let service = FakeRepoService::new();
        for raw in [vec![], vec!["a/b", "x"], vec!["a/b", "u", "p", "x"]] {
            let result =
                disambiguate(ArgumentShape::RepoWithCredentials, &tokens(&raw), &service).await;
            assert_eq!(result, Err(RejectionReason::BadArgumentCount));
        }
        for raw in [vec![], vec!["a/b", "1", "2", "3", "4"]] {
            let result = disambiguate(
                ArgumentShape::RepoWithSinceAndCredentials,
                &tokens(&raw),
                &service,
            )
            .await;
            assert_eq!(result, Err(RejectionReason::BadArgumentCount));
        }
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repo_only() {
        let service = FakeRepoService::new();
        let resolved = disambiguate(
            ArgumentShape::RepoWithCredentials,
            &tokens(&["alice/repo"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(resolved.repo.owner, "alice");
        assert_eq!(resolved.repo.name, "repo");
        assert_eq!(resolved.since, None);
        assert_eq!(resolved.credentials, None);
    }

    #[tokio::test]
    async fn test_wrong_credentials_checked_after_repo() {
        let service = FakeRepoService::new().with_invalid_password("wrongpass");
        let result = disambiguate(
            ArgumentShape::RepoWithCredentials,
            &tokens(&["alice/repo", "u", "wrongpass"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidCredentials));
        assert_eq!(
            service.calls(),
            vec!["repository_exists_and_public alice/repo", "identity_check u"]
        );
    }

    #[tokio::test]
    async fn test_unknown_repo_stops_before_credentials() {
        let service = FakeRepoService::new().with_missing_repo("alice/ghost");
        let result = disambiguate(
            ArgumentShape::RepoWithCredentials,
            &tokens(&["alice/ghost", "u", "p"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidRepoFormat));
        assert_eq!(service.calls(), vec!["repository_exists_and_public alice/ghost"]);
    }

    #[tokio::test]
    async fn test_private_repo_and_lookup_failure_reject() {
        let service = FakeRepoService::new()
            .with_private_repo("corp/secret")
            .with_broken_repo("corp/flaky");
        for link in ["corp/secret", "corp/flaky"] {
            let result = validate_repo_link(link, &service, None).await;
            assert_eq!(result, Err(RejectionReason::InvalidRepoFormat));
        }
    }

    #[tokio::test]
    async fn test_malformed_links_fail_before_io() {
        let service = FakeRepoService::new();
        for link in ["", "alice", "/repo", "alice/", "a/b/c", " / ", "alice//repo"] {
            let result = validate_repo_link(link, &service, None).await;
            assert_eq!(result, Err(RejectionReason::InvalidRepoFormat), "{link:?}");
        }
        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_split_repo_link_tolerates_spaces() {
        assert_eq!(split_repo_link("alice / repo"), Some(("alice", "repo")));
        assert_eq!(split_repo_link("alice/repo"), Some(("alice", "repo")));
        assert_eq!(split_repo_link("alice"), None);
    }

    #[tokio::test]
    async fn test_since_only() {
        let service = FakeRepoService::new();
        let resolved = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "2023/01/15"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(resolved.since, Some(date(2023, 1, 15)));
        assert_eq!(resolved.credentials, None);
    }

    #[tokio::test]
    async fn test_since_only_bad_date() {
        let service = FakeRepoService::new();
        let result = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "2023-01-15"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidDateFormat));
    }

    #[tokio::test]
    async fn test_trailing_pair_is_always_credentials() {
        let service = FakeRepoService::new().with_invalid_password("junk");
        let result = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "2023/01/15", "junk"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidCredentials));
        assert_eq!(service.calls().last().unwrap(), "identity_check 2023/01/15");
    }

    #[tokio::test]
    async fn test_leading_date_then_credentials() {
        let service = FakeRepoService::new();
        let resolved = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "2023/01/15", "u", "p"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(resolved.since, Some(date(2023, 1, 15)));
        assert_eq!(
            resolved.credentials,
            Some(Credentials {
                username: "u".into(),
                password: "p".into()
            })
        );
    }

    #[tokio::test]
    async fn test_credentials_then_trailing_date() {
        let service = FakeRepoService::new();
        let resolved = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "u", "p", "2023/01/15"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(resolved.since, Some(date(2023, 1, 15)));
        assert_eq!(resolved.credentials.unwrap().username, "u");
    }

    #[tokio::test]
    async fn test_trailing_date_with_bad_credentials() {
        // Only the password "bad" is refused, so the rejection shows which
        // pair reached the identity check.
        let service = FakeRepoService::new().with_invalid_password("bad");
        let result = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "u", "bad", "2023/01/15"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidCredentials));
        let identity_checks: Vec<_> = service
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("identity_check"))
            .collect();
        assert_eq!(identity_checks, vec!["identity_check u"]);
    }

    #[tokio::test]
    async fn test_three_tokens_resolve_credentials() {
        let service = FakeRepoService::new();
        let resolved = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "u", "p"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(resolved.repo.to_string(), "alice/repo");
        assert_eq!(resolved.since, None);
        assert_eq!(
            resolved.credentials,
            Some(Credentials {
                username: "u".into(),
                password: "p".into()
            })
        );
        assert_eq!(
            service.calls(),
            vec!["repository_exists_and_public alice/repo", "identity_check u"]
        );
    }

    #[tokio::test]
    async fn test_leading_date_has_no_fallback() {
        // Falling back to the trailing date would check (2020/01/01, 2021/02/02),
        // which the fake accepts.
        let service = FakeRepoService::new().with_invalid_password("2022/03/03");
        let result = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "2020/01/01", "2021/02/02", "2022/03/03"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidCredentials));
        let identity_checks: Vec<_> = service
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("identity_check"))
            .collect();
        assert_eq!(identity_checks, vec!["identity_check 2021/02/02"]);
    }

    #[tokio::test]
    async fn test_four_tokens_without_any_date() {
        let service = FakeRepoService::new();
        let result = disambiguate(
            ArgumentShape::RepoWithSinceAndCredentials,
            &tokens(&["alice/repo", "u", "p", "yesterday"]),
            &service,
        )
        .await;
        assert_eq!(result, Err(RejectionReason::InvalidDateFormat));
        assert!(!service.calls().iter().any(|c| c.starts_with("identity_check")));
    }

    #[tokio::test]
    async fn test_identity_outage_is_invalid_credentials() {
        let service = FakeRepoService::new().with_identity_outage();
        assert!(!validate_credentials(&service, "u", "p").await);
    }

    #[test]
    fn test_parse_date_shapes() {
        assert_eq!(parse_date("2023/01/15"), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("0001/01/01"), Some(date(1, 1, 1)));
        assert_eq!(parse_date("2024/02/29"), Some(date(2024, 2, 29)));
        assert_eq!(parse_date("2023/02/29"), None);
        assert_eq!(parse_date("2023/13/01"), None);
        assert_eq!(parse_date("2023/1/15"), None);
        assert_eq!(parse_date("23/01/15"), None);
        assert_eq!(parse_date("2023-01-15"), None);
        assert_eq!(parse_date("2023/01/15 "), None);
        assert_eq!(parse_date("+023/01/15"), None);
        assert_eq!(parse_date("0000/01/01"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("２０２３/01/15"), None);
    }

    proptest! {
        #[test]
        fn test_format_then_parse_roundtrip(days in 1i32..=3_652_059) {
            let d = NaiveDate::from_num_days_from_ce_opt(days).unwrap();
            let text = format_date(d);
            prop_assert_eq!(text.len(), 10);
            prop_assert_eq!(parse_date(&text), Some(d));
        }
    }

    #[test]
    fn test_roundtrip_bounds() {
        assert_eq!(format_date(date(1, 1, 1)), "0001/01/01");
        assert_eq!(format_date(date(9999, 12, 31)), "9999/12/31");
        assert_eq!(NaiveDate::from_num_days_from_ce_opt(3_652_059), Some(date(9999, 12, 31)));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: "u".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
