use serde::{Deserialize, Serialize};

pub const EXIT_CODE_NEW_COMMENTS: i32 = 0;
pub const EXIT_CODE_ERROR: i32 = 1;
pub const EXIT_CODE_TIMED_OUT_EMPTY: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Enumerates the two comment namespaces on a pull request.
pub enum CommentKind {
    /// Positional comments that belong to a review thread.
    Review,
    /// General conversation comments with no file position.
    Issue,
}

impl CommentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Issue => "issue",
        }
    }

    /// Build the namespaced identity used for diffing, e.g. `review-101`.
    pub fn identity_for(&self, database_id: u64) -> String {
        format!("{}-{database_id}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single discussion entry, normalized across both namespaces.
pub struct Comment {
    /// Stable across fetches and unique across both namespaces.
    #[serde(rename = "id")]
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub body: String,
    pub author_login: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(rename = "type")]
    pub kind: CommentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(
        rename = "html_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Terminal outcome of a watch that did not fail.
pub struct WatchResult {
    /// Newly discovered comments in discovery order.
    pub comments: Vec<Comment>,
    pub timed_out: bool,
    pub cancelled: bool,
    pub watched_ms: u64,
}

impl WatchResult {
    /// Process exit status for callers: `2` only when the deadline passed with nothing collected.
    pub fn exit_code(&self) -> i32 {
        if self.timed_out && self.comments.is_empty() {
            EXIT_CODE_TIMED_OUT_EMPTY
        } else {
            EXIT_CODE_NEW_COMMENTS
        }
    }
}
