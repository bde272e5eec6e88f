use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use prwatch_core::{watch, CancellationListener, GithubCommentSource, WatchOptions, WatchResult};
use prwatch_github::{api_base_for_host, resolve_pull_request, GithubGraphqlClient, PullRequestRef};

use crate::cli_args::Cli;

const GH_TOKEN_ENV: &str = "GH_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Fully resolved inputs for one `pr-watch` invocation.
pub(crate) struct WatchCommandConfig {
    pub(crate) target: PullRequestRef,
    pub(crate) api_base: String,
    pub(crate) token: String,
    pub(crate) options: WatchOptions,
    pub(crate) request_timeout_ms: u64,
    pub(crate) retry_max_attempts: usize,
    pub(crate) retry_base_delay_ms: u64,
}

impl WatchCommandConfig {
    pub(crate) fn from_cli(cli: &Cli, fallback_token: Option<String>) -> Result<Self> {
        let target = resolve_pull_request(
            cli.selector.as_deref(),
            cli.pr,
            cli.repo.as_deref(),
            cli.host.as_deref(),
        )?;
        let api_base = cli
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| api_base_for_host(&target.host));
        let token = cli
            .github_token
            .clone()
            .or(fallback_token)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                anyhow!("missing GitHub token: pass --github-token or set GITHUB_TOKEN or GH_TOKEN")
            })?;
        let options = WatchOptions {
            interval: Duration::from_secs(cli.interval_seconds),
            debounce: Duration::from_secs(cli.debounce_seconds),
            timeout: Duration::from_secs(cli.timeout_seconds),
            include_general: cli.include_issue_comments,
            max_consecutive_failures: usize::try_from(cli.max_consecutive_failures)
                .context("--max-consecutive-failures is too large")?,
        };
        options.validate()?;
        Ok(Self {
            target,
            api_base,
            token,
            options,
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        })
    }
}

/// Run one watch to completion and return the process exit code.
pub(crate) async fn run_watch_command(cli: &Cli) -> Result<i32> {
    let config = WatchCommandConfig::from_cli(cli, std::env::var(GH_TOKEN_ENV).ok())?;
    let client = GithubGraphqlClient::new(
        config.api_base.clone(),
        config.token.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?;
    tracing::debug!(
        pull_request = %config.target,
        api_base = client.api_base(),
        "resolved github api endpoint"
    );
    let source = GithubCommentSource::new(client);

    eprintln!(
        "Watching {} for new comments (interval={}s, debounce={}s, timeout={}s)...",
        config.target.as_slug(),
        config.options.interval.as_secs(),
        config.options.debounce.as_secs(),
        config.options.timeout.as_secs()
    );

    let (listener, trigger) = CancellationListener::ctrl_c();
    let outcome = watch(&source, &config.target, &config.options, trigger).await;
    drop(listener);
    let result = outcome?;

    let stdout = std::io::stdout();
    write_watch_result(&mut stdout.lock(), &result)?;
    Ok(result.exit_code())
}

pub(crate) fn write_watch_result<W: Write>(writer: &mut W, result: &WatchResult) -> Result<()> {
    serde_json::to_writer(&mut *writer, result).context("encode json")?;
    writer.write_all(b"\n").context("write watch result")?;
    writer.flush().context("flush watch result")
}
