//! Pull request references and GitHub host handling.

use std::fmt;

use thiserror::Error;
use url::Url;

pub const DEFAULT_GITHUB_HOST: &str = "github.com";
const PUBLIC_GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Reasons a pull request selector could not be resolved.
pub enum PullRequestRefError {
    #[error("must specify a pull request via --pr or selector")]
    MissingSelector,
    #[error("pull request argument '{selector}' does not match --pr={pr}")]
    SelectorMismatch { selector: String, pr: u64 },
    #[error("--repo must be owner/repo when using numeric selectors: {0}")]
    InvalidRepo(String),
    #[error("invalid pull request selector '{0}': must be a pull request URL or number")]
    InvalidSelector(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A fully resolved pull request on a specific GitHub host.
pub struct PullRequestRef {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn new(host: &str, owner: &str, repo: &str, number: u64) -> Self {
        Self {
            host: sanitize_host(host),
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        }
    }

    /// Parse `https://<host>/<owner>/<repo>/pull/<number>[/...]`.
    pub fn parse_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        let host = url.host_str()?;
        let segments = url.path_segments()?.collect::<Vec<_>>();
        let [owner, repo, "pull", number, ..] = segments.as_slice() else {
            return None;
        };
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        let number = parse_pull_number(number)?;
        Some(Self::new(host, owner, repo, number))
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

/// Resolve a positional selector, `--pr`, `--repo`, and host into a reference.
///
/// URL selectors carry their own host and repository. Numeric selectors
/// borrow both from `repo_flag` and `host`.
pub fn resolve_pull_request(
    selector: Option<&str>,
    pr_flag: Option<u64>,
    repo_flag: Option<&str>,
    host: Option<&str>,
) -> Result<PullRequestRef, PullRequestRefError> {
    let selector = selector.map(str::trim).filter(|value| !value.is_empty());
    let selector = match (selector, pr_flag) {
        (Some(selector), Some(pr)) => {
            if !selector_matches_number(selector, pr) {
                return Err(PullRequestRefError::SelectorMismatch {
                    selector: selector.to_string(),
                    pr,
                });
            }
            selector.to_string()
        }
        (Some(selector), None) => selector.to_string(),
        (None, Some(pr)) => pr.to_string(),
        (None, None) => return Err(PullRequestRefError::MissingSelector),
    };

    if let Some(reference) = PullRequestRef::parse_url(&selector) {
        return Ok(reference);
    }

    let Some(number) = parse_pull_number(&selector) else {
        return Err(PullRequestRefError::InvalidSelector(selector));
    };
    let (owner, repo) = split_repo(repo_flag.unwrap_or_default())?;
    Ok(PullRequestRef::new(
        host.unwrap_or(DEFAULT_GITHUB_HOST),
        owner,
        repo,
        number,
    ))
}

/// Map a host to its REST/GraphQL API root.
pub fn api_base_for_host(host: &str) -> String {
    let host = sanitize_host(host);
    if host == DEFAULT_GITHUB_HOST {
        PUBLIC_GITHUB_API_BASE.to_string()
    } else {
        format!("https://{host}/api")
    }
}

/// Reduce a host or URL-ish value to a bare lowercase hostname.
pub fn sanitize_host(raw: &str) -> String {
    let mut host = raw.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(stripped) = host.strip_prefix(scheme) {
            host = stripped.to_string();
        }
    }
    if let Some((head, _)) = host.split_once('/') {
        host = head.to_string();
    }
    if let Some((head, _)) = host.split_once(':') {
        host = head.to_string();
    }
    let host = host.trim();
    if host.is_empty() {
        DEFAULT_GITHUB_HOST.to_string()
    } else {
        host.to_string()
    }
}

fn parse_pull_number(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok().filter(|number| *number > 0)
}

fn selector_matches_number(selector: &str, target: u64) -> bool {
    if let Some(reference) = PullRequestRef::parse_url(selector) {
        return reference.number == target;
    }
    parse_pull_number(selector) == Some(target)
}

fn split_repo(raw: &str) -> Result<(&str, &str), PullRequestRefError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PullRequestRefError::InvalidRepo("missing --repo".to_string()));
    }
    match trimmed.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(PullRequestRefError::InvalidRepo(
            "expected owner/repo".to_string(),
        )),
    }
}
