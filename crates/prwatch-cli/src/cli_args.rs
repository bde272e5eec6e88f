use clap::{ArgAction, Parser};

const LONG_ABOUT: &str = "Watch a pull request for new review or general comments.

Polls at a fixed interval (default 10s). When new comments appear, waits for a
quiet period (default 5s) to collect follow-ups that arrive in quick succession,
then prints every new comment as a single JSON document and exits.

Exit codes:
  0  New comments found, or the watch was interrupted
  1  Error occurred
  2  Timed out with no new comments";

#[derive(Debug, Parser)]
#[command(
    name = "pr-watch",
    about = "Watch for new pull request comments and exit when they arrive",
    long_about = LONG_ABOUT,
    version
)]
pub(crate) struct Cli {
    #[arg(
        value_name = "NUMBER|URL",
        help = "Pull request number (requires --repo) or pull request URL"
    )]
    pub(crate) selector: Option<String>,

    #[arg(long = "pr", help = "Pull request number")]
    pub(crate) pr: Option<u64>,

    #[arg(
        short = 'R',
        long = "repo",
        env = "GH_REPO",
        help = "Repository in owner/repo format"
    )]
    pub(crate) repo: Option<String>,

    #[arg(
        long = "hostname",
        env = "GH_HOST",
        help = "GitHub host for numeric selectors (defaults to github.com)"
    )]
    pub(crate) host: Option<String>,

    #[arg(
        short = 'i',
        long = "interval",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Polling interval in seconds"
    )]
    pub(crate) interval_seconds: u64,

    #[arg(
        long = "debounce",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Quiet period in seconds after the last new comment"
    )]
    pub(crate) debounce_seconds: u64,

    #[arg(
        long = "timeout",
        default_value_t = 3_600,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Maximum watch duration in seconds"
    )]
    pub(crate) timeout_seconds: u64,

    #[arg(
        long = "issue-comments",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Include general conversation comments, not just review comments"
    )]
    pub(crate) include_issue_comments: bool,

    #[arg(
        long = "max-consecutive-failures",
        default_value_t = 3,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Consecutive failed polls tolerated before giving up"
    )]
    pub(crate) max_consecutive_failures: u64,

    #[arg(
        long = "api-base",
        env = "PR_WATCH_API_BASE",
        help = "GitHub API base URL (derived from the pull request host when omitted)"
    )]
    pub(crate) api_base: Option<String>,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token (falls back to GH_TOKEN)"
    )]
    pub(crate) github_token: Option<String>,

    #[arg(
        long = "request-timeout-ms",
        default_value_t = 30_000,
        help = "Timeout for a single GitHub API request in milliseconds"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        default_value_t = 3,
        help = "Attempts per GitHub API request for rate limits and server errors"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        default_value_t = 500,
        help = "Base backoff delay between GitHub API request attempts"
    )]
    pub(crate) retry_base_delay_ms: u64,
}
