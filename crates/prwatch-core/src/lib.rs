//! Comment-watch engine for pull request discussions.
//!
//! A watch takes a baseline snapshot of every comment on a pull request, polls
//! for comments that were not in the baseline, and returns once a burst of new
//! activity has gone quiet, the deadline passes, or the caller cancels.

pub mod cancellation;
pub mod comment;
pub mod diff_tracker;
pub mod source;
pub mod watch;

pub use cancellation::{CancellationListener, CancellationTrigger};
pub use comment::{Comment, CommentKind, WatchResult};
pub use diff_tracker::ObservedSet;
pub use source::{CommentSource, FetchError, GithubCommentSource};
pub use watch::{watch, WatchError, WatchOptions, DEFAULT_MAX_CONSECUTIVE_FAILURES};
