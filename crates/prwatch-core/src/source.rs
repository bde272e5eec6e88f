//! Comment source adapter: fetches the full comment history of a pull request.

use async_trait::async_trait;
use prwatch_github::{GithubApiError, GraphqlTransport, PullRequestRef};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::comment::{Comment, CommentKind};

const REVIEW_THREADS_QUERY: &str = r#"query ReviewThreads($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: 100, after: $cursor) {
        nodes {
          id
          path
          line
          comments(first: 100) {
            nodes {
              id
              databaseId
              body
              createdAt
              updatedAt
              url
              author { login }
            }
            pageInfo {
              hasNextPage
              endCursor
            }
          }
        }
        pageInfo {
          hasNextPage
          endCursor
        }
      }
    }
  }
}"#;

const THREAD_COMMENTS_QUERY: &str = r#"query ReviewThreadComments($threadId: ID!, $cursor: String) {
  node(id: $threadId) {
    ... on PullRequestReviewThread {
      comments(first: 100, after: $cursor) {
        nodes {
          id
          databaseId
          body
          createdAt
          updatedAt
          url
          author { login }
        }
        pageInfo {
          hasNextPage
          endCursor
        }
      }
    }
  }
}"#;

const ISSUE_COMMENTS_QUERY: &str = r#"query IssueComments($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      comments(first: 100, after: $cursor) {
        nodes {
          id
          databaseId
          body
          createdAt
          updatedAt
          url
          author { login }
        }
        pageInfo {
          hasNextPage
          endCursor
        }
      }
    }
  }
}"#;

const REVIEW_THREADS_OPERATION: &str = "review threads";
const THREAD_COMMENTS_OPERATION: &str = "review thread comments";
const ISSUE_COMMENTS_OPERATION: &str = "issue comments";

#[derive(Debug, Error)]
/// Failure to produce a complete comment set. Partial results are never returned.
pub enum FetchError {
    #[error("pull request {number} not found on {owner}/{repo}")]
    PullRequestNotFound {
        owner: String,
        repo: String,
        number: u64,
    },
    #[error("malformed {operation} response: {detail}")]
    Malformed {
        operation: &'static str,
        detail: String,
    },
    #[error("fetch {operation}")]
    Transport {
        operation: &'static str,
        #[source]
        source: GithubApiError,
    },
}

#[async_trait]
/// Trait contract for fetching every comment currently on a pull request.
///
/// Implementations are stateless: each call returns the full history, not a delta.
pub trait CommentSource: Send + Sync {
    async fn fetch_all(
        &self,
        target: &PullRequestRef,
        include_general: bool,
    ) -> Result<Vec<Comment>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<PullRequestData<T>>,
}

#[derive(Debug, Deserialize)]
struct PullRequestData<T> {
    #[serde(rename = "pullRequest")]
    pull_request: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ReviewThreadsPullRequest {
    #[serde(rename = "reviewThreads")]
    review_threads: Connection<RawReviewThread>,
}

#[derive(Debug, Deserialize)]
struct IssueCommentsPullRequest {
    comments: Connection<RawComment>,
}

#[derive(Debug, Deserialize)]
struct ThreadNodeData {
    node: Option<ThreadNode>,
}

#[derive(Debug, Deserialize)]
struct ThreadNode {
    comments: Connection<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReviewThread {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    comments: Connection<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    database_id: Option<u64>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    login: String,
}

struct ThreadPosition<'a> {
    thread_id: &'a str,
    path: Option<&'a str>,
    line: Option<u32>,
}

/// GitHub GraphQL backed [`CommentSource`].
pub struct GithubCommentSource<T> {
    transport: T,
}

impl<T: GraphqlTransport> GithubCommentSource<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn fetch_review_comments(
        &self,
        target: &PullRequestRef,
    ) -> Result<Vec<Comment>, FetchError> {
        let mut comments = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let variables = pull_request_variables(target, cursor.as_deref());
            let data = self
                .request_for_pull_request(
                    target,
                    REVIEW_THREADS_OPERATION,
                    REVIEW_THREADS_QUERY,
                    variables,
                )
                .await?;
            let page: RepositoryData<ReviewThreadsPullRequest> =
                decode(REVIEW_THREADS_OPERATION, data)?;
            let threads = require_pull_request(target, page)?.review_threads;

            for thread in threads.nodes {
                let thread_id = thread.id.filter(|id| !id.is_empty()).ok_or_else(|| {
                    FetchError::Malformed {
                        operation: REVIEW_THREADS_OPERATION,
                        detail: "review thread is missing its id".to_string(),
                    }
                })?;
                let position = ThreadPosition {
                    thread_id: &thread_id,
                    path: thread.path.as_deref(),
                    line: thread.line,
                };
                let mut thread_cursor = next_cursor(
                    THREAD_COMMENTS_OPERATION,
                    None,
                    &thread.comments.page_info,
                )?;
                push_review_comments(&mut comments, thread.comments.nodes, &position)?;

                while let Some(after) = thread_cursor {
                    let page = self.fetch_thread_comment_page(&thread_id, &after).await?;
                    thread_cursor =
                        next_cursor(THREAD_COMMENTS_OPERATION, Some(&after), &page.page_info)?;
                    push_review_comments(&mut comments, page.nodes, &position)?;
                }
            }

            cursor = next_cursor(
                REVIEW_THREADS_OPERATION,
                cursor.as_deref(),
                &threads.page_info,
            )?;
            if cursor.is_none() {
                break;
            }
        }
        Ok(comments)
    }

    async fn fetch_thread_comment_page(
        &self,
        thread_id: &str,
        cursor: &str,
    ) -> Result<Connection<RawComment>, FetchError> {
        let variables = json!({ "threadId": thread_id, "cursor": cursor });
        let data = self
            .request(THREAD_COMMENTS_OPERATION, THREAD_COMMENTS_QUERY, variables)
            .await?;
        let page: ThreadNodeData = decode(THREAD_COMMENTS_OPERATION, data)?;
        page.node
            .map(|node| node.comments)
            .ok_or_else(|| FetchError::Malformed {
                operation: THREAD_COMMENTS_OPERATION,
                detail: format!("review thread {thread_id} not found"),
            })
    }

    async fn fetch_issue_comments(
        &self,
        target: &PullRequestRef,
    ) -> Result<Vec<Comment>, FetchError> {
        let mut comments = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let variables = pull_request_variables(target, cursor.as_deref());
            let data = self
                .request_for_pull_request(
                    target,
                    ISSUE_COMMENTS_OPERATION,
                    ISSUE_COMMENTS_QUERY,
                    variables,
                )
                .await?;
            let page: RepositoryData<IssueCommentsPullRequest> =
                decode(ISSUE_COMMENTS_OPERATION, data)?;
            let connection = require_pull_request(target, page)?.comments;

            for raw in connection.nodes {
                comments.push(normalize_comment(
                    ISSUE_COMMENTS_OPERATION,
                    CommentKind::Issue,
                    raw,
                    None,
                )?);
            }

            cursor = next_cursor(
                ISSUE_COMMENTS_OPERATION,
                cursor.as_deref(),
                &connection.page_info,
            )?;
            if cursor.is_none() {
                break;
            }
        }
        Ok(comments)
    }

    /// Query scoped to `target`; an unresolvable repository or pull request is not found.
    async fn request_for_pull_request(
        &self,
        target: &PullRequestRef,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<Value, FetchError> {
        self.request(operation, query, variables)
            .await
            .map_err(|error| match error {
                FetchError::Transport {
                    source: GithubApiError::NotFound { .. },
                    ..
                } => pull_request_not_found(target),
                other => other,
            })
    }

    async fn request(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<Value, FetchError> {
        self.transport
            .query(operation, query, variables)
            .await
            .map_err(|source| FetchError::Transport { operation, source })
    }
}

#[async_trait]
impl<T: GraphqlTransport> CommentSource for GithubCommentSource<T> {
    async fn fetch_all(
        &self,
        target: &PullRequestRef,
        include_general: bool,
    ) -> Result<Vec<Comment>, FetchError> {
        let mut comments = self.fetch_review_comments(target).await?;
        if include_general {
            comments.extend(self.fetch_issue_comments(target).await?);
        }
        tracing::debug!(
            pull_request = %target,
            fetched = comments.len(),
            include_general,
            "fetched pull request comments"
        );
        Ok(comments)
    }
}

fn pull_request_variables(target: &PullRequestRef, cursor: Option<&str>) -> Value {
    json!({
        "owner": target.owner,
        "name": target.repo,
        "number": target.number,
        "cursor": cursor,
    })
}

fn decode<D: DeserializeOwned>(operation: &'static str, data: Value) -> Result<D, FetchError> {
    serde_json::from_value(data).map_err(|error| FetchError::Malformed {
        operation,
        detail: error.to_string(),
    })
}

fn require_pull_request<T>(
    target: &PullRequestRef,
    page: RepositoryData<T>,
) -> Result<T, FetchError> {
    page.repository
        .and_then(|repository| repository.pull_request)
        .ok_or_else(|| pull_request_not_found(target))
}

fn pull_request_not_found(target: &PullRequestRef) -> FetchError {
    FetchError::PullRequestNotFound {
        owner: target.owner.clone(),
        repo: target.repo.clone(),
        number: target.number,
    }
}

/// Continuation cursor for the next page, if the source reports one.
///
/// A page that claims more results without a fresh cursor would loop forever.
fn next_cursor(
    operation: &'static str,
    current: Option<&str>,
    page_info: &PageInfo,
) -> Result<Option<String>, FetchError> {
    if !page_info.has_next_page {
        return Ok(None);
    }
    match page_info.end_cursor.as_deref() {
        Some(cursor) if !cursor.is_empty() && Some(cursor) != current => {
            Ok(Some(cursor.to_string()))
        }
        Some(cursor) if !cursor.is_empty() => Err(FetchError::Malformed {
            operation,
            detail: format!("pagination cursor '{cursor}' did not advance"),
        }),
        _ => Err(FetchError::Malformed {
            operation,
            detail: "hasNextPage set without an endCursor".to_string(),
        }),
    }
}

fn push_review_comments(
    comments: &mut Vec<Comment>,
    raw_comments: Vec<RawComment>,
    position: &ThreadPosition<'_>,
) -> Result<(), FetchError> {
    for raw in raw_comments {
        comments.push(normalize_comment(
            REVIEW_THREADS_OPERATION,
            CommentKind::Review,
            raw,
            Some(position),
        )?);
    }
    Ok(())
}

fn normalize_comment(
    operation: &'static str,
    kind: CommentKind,
    raw: RawComment,
    position: Option<&ThreadPosition<'_>>,
) -> Result<Comment, FetchError> {
    let database_id = raw.database_id.ok_or_else(|| FetchError::Malformed {
        operation,
        detail: format!(
            "{} comment {} is missing databaseId",
            kind.as_str(),
            raw.id.as_deref().unwrap_or("<unknown>")
        ),
    })?;
    Ok(Comment {
        identity: kind.identity_for(database_id),
        node_id: raw.id,
        body: raw.body.unwrap_or_default(),
        author_login: raw.author.map(|author| author.login).unwrap_or_default(),
        created_at: raw.created_at.unwrap_or_default(),
        updated_at: raw.updated_at.unwrap_or_default(),
        path: position.and_then(|position| position.path.map(str::to_string)),
        line: position.and_then(|position| position.line),
        kind,
        thread_id: position.map(|position| position.thread_id.to_string()),
        url: raw.url.filter(|url| !url.is_empty()),
    })
}
