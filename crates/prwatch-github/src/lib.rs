//! GitHub transport for the pull request comment watcher.
//!
//! This crate resolves pull request references and issues GraphQL queries
//! with bounded retries. It knows nothing about comment semantics.

pub mod graphql_client;
pub mod pull_request_ref;
pub mod retry_policy;

pub use graphql_client::{GithubApiError, GithubGraphqlClient, GraphqlTransport};
pub use pull_request_ref::{api_base_for_host, resolve_pull_request, PullRequestRef};
pub use retry_policy::RetryPolicy;
