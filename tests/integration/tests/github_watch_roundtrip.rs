use std::time::Duration;

use httpmock::prelude::*;
use prwatch_core::{
    watch, CancellationTrigger, CommentKind, CommentSource, GithubCommentSource, WatchOptions,
};
use prwatch_github::{GithubGraphqlClient, PullRequestRef};
use serde_json::{json, Value};

fn target() -> PullRequestRef {
    PullRequestRef::new("github.com", "acme", "widgets", 7)
}

fn client(server: &MockServer) -> GithubGraphqlClient {
    GithubGraphqlClient::new(server.base_url(), "test-token".to_string(), 5_000, 2, 1)
        .expect("client")
}

fn page_info(next: Option<&str>) -> Value {
    json!({"hasNextPage": next.is_some(), "endCursor": next})
}

fn raw_comment(prefix: &str, database_id: u64, body: &str) -> Value {
    json!({
        "id": format!("{prefix}_{database_id}"),
        "databaseId": database_id,
        "body": body,
        "createdAt": "2026-03-01T12:00:00Z",
        "updatedAt": "2026-03-01T12:00:00Z",
        "url": format!("https://github.com/acme/widgets/pull/7#c{database_id}"),
        "author": {"login": "reviewer"}
    })
}

fn review_threads(threads: Value, next: Option<&str>) -> Value {
    json!({"data": {"repository": {"pullRequest": {
        "reviewThreads": {"nodes": threads, "pageInfo": page_info(next)}
    }}}})
}

fn issue_comments(comments: Value) -> Value {
    json!({"data": {"repository": {"pullRequest": {
        "comments": {"nodes": comments, "pageInfo": page_info(None)}
    }}}})
}

#[tokio::test]
async fn integration_fetch_all_walks_every_page_over_http() {
    let server = MockServer::start_async().await;
    let first_threads = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query ReviewThreads")
            .body_includes("\"cursor\":null");
        then.status(200).json_body(review_threads(
            json!([{
                "id": "PRRT_1",
                "path": "src/lib.rs",
                "line": 12,
                "comments": {
                    "nodes": [raw_comment("PRRC", 101, "first")],
                    "pageInfo": page_info(Some("C1"))
                }
            }]),
            Some("T1"),
        ));
    });
    let second_threads = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query ReviewThreads")
            .body_includes("\"cursor\":\"T1\"");
        then.status(200).json_body(review_threads(
            json!([{
                "id": "PRRT_2",
                "path": "README.md",
                "line": null,
                "comments": {
                    "nodes": [raw_comment("PRRC", 301, "outdated")],
                    "pageInfo": page_info(None)
                }
            }]),
            None,
        ));
    });
    let continuation = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query ReviewThreadComments")
            .body_includes("\"threadId\":\"PRRT_1\"")
            .body_includes("\"cursor\":\"C1\"");
        then.status(200).json_body(json!({"data": {"node": {"comments": {
            "nodes": [raw_comment("PRRC", 102, "reply")],
            "pageInfo": page_info(None)
        }}}}));
    });
    let general = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query IssueComments");
        then.status(200)
            .json_body(issue_comments(json!([raw_comment("IC", 55, "lgtm")])));
    });

    let source = GithubCommentSource::new(client(&server));
    let comments = source.fetch_all(&target(), true).await.expect("fetch");

    let mut identities = comments
        .iter()
        .map(|comment| comment.identity.as_str())
        .collect::<Vec<_>>();
    identities.sort_unstable();
    assert_eq!(
        identities,
        vec!["issue-55", "review-101", "review-102", "review-301"]
    );

    let reply = comments
        .iter()
        .find(|comment| comment.identity == "review-102")
        .expect("continued thread comment");
    assert_eq!(reply.kind, CommentKind::Review);
    assert_eq!(reply.thread_id.as_deref(), Some("PRRT_1"));
    assert_eq!(reply.path.as_deref(), Some("src/lib.rs"));
    assert_eq!(reply.line, Some(12));

    let outdated = comments
        .iter()
        .find(|comment| comment.identity == "review-301")
        .expect("second page comment");
    assert_eq!(outdated.line, None);

    first_threads.assert_calls(1);
    second_threads.assert_calls(1);
    continuation.assert_calls(1);
    general.assert_calls(1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn integration_watch_reports_only_comments_posted_after_baseline() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query ReviewThreads");
        then.status(200).json_body(review_threads(json!([]), None));
    });
    let baseline = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query IssueComments");
        then.status(200)
            .json_body(issue_comments(json!([raw_comment("IC", 1, "existing")])));
    });

    let source = GithubCommentSource::new(client(&server));
    let options = WatchOptions {
        interval: Duration::from_secs(1),
        debounce: Duration::from_secs(1),
        timeout: Duration::from_secs(30),
        ..WatchOptions::default()
    };
    let target = target();

    let post_comment = async {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        baseline.delete_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_includes("query IssueComments");
            then.status(200).json_body(issue_comments(json!([
                raw_comment("IC", 1, "edited existing"),
                raw_comment("IC", 2, "new question")
            ])));
        });
    };

    let (result, ()) = tokio::join!(
        watch(&source, &target, &options, CancellationTrigger::never()),
        post_comment
    );
    let result = result.expect("watch");

    assert!(!result.timed_out);
    assert!(!result.cancelled);
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.comments.len(), 1);
    assert_eq!(result.comments[0].identity, "issue-2");
    assert_eq!(result.comments[0].body, "new question");
    assert!(result.watched_ms < 30_000);
}

#[tokio::test]
async fn regression_watch_surfaces_missing_pull_request_from_initial_fetch() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({"data": {"repository": null}}));
    });

    let source = GithubCommentSource::new(client(&server));
    let error = watch(
        &source,
        &target(),
        &WatchOptions::default(),
        CancellationTrigger::never(),
    )
    .await
    .expect_err("missing pull request");
    let source_error = std::error::Error::source(&error).expect("fetch error");
    assert_eq!(
        source_error.to_string(),
        "pull request 7 not found on acme/widgets"
    );
}

#[tokio::test]
async fn regression_graphql_not_found_error_maps_to_missing_pull_request() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "data": {"repository": {"pullRequest": null}},
            "errors": [{
                "type": "NOT_FOUND",
                "path": ["repository", "pullRequest"],
                "message": "Could not resolve to a PullRequest with the number of 7."
            }]
        }));
    });

    let source = GithubCommentSource::new(client(&server));
    let error = source
        .fetch_all(&target(), true)
        .await
        .expect_err("missing pull request");
    assert_eq!(error.to_string(), "pull request 7 not found on acme/widgets");
}
