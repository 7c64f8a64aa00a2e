//! Completes events from provider pull request and commit metadata.
//!
//! Branch fields that decide where configuration is read from and where
//! statuses land (`base_branch`, `default_branch`) are only ever copied from
//! the base side of a pull request. The head side may come from a fork.

use crate::event::{CommitInfo, Event, EventType, PullRequest};
use tracing::info;

/// Populate `event` from a pull request snapshot.
#[must_use]
pub fn apply_pull_request(mut event: Event, pr: PullRequest) -> Event {
    event.default_branch = pr.base_repo_default_branch;
    event.base_branch = pr.base_ref;
    event.url = pr.base_repo_url;
    event.sha = pr.head_sha;
    event.sha_url = pr.head_commit_url;
    event.head_branch = pr.head_ref;
    event.sender = pr.author;
    event.event_type = EventType::PullRequest;
    event.pull_request_number = Some(pr.number);

    info!(
        repo = %event.full_name(),
        pull_request = pr.number,
        base = %event.base_branch,
        head = %event.head_branch,
        sha = %event.sha,
        "Resolved pull request"
    );
    event
}

/// Populate the commit permalink and title of `event`.
pub fn apply_commit(event: &mut Event, commit: CommitInfo) {
    event.sha_url = commit.html_url;
    event.sha_title = commit_title(&commit.message).to_string();
}

/// First line of a commit message.
#[must_use]
pub fn commit_title(message: &str) -> &str {
    message.lines().next().unwrap_or_default().trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forked_pull_request() -> PullRequest {
        PullRequest {
            number: 17,
            base_repo_default_branch: "main".to_string(),
            base_repo_url: "https://github.com/owner/repo".to_string(),
            base_ref: "release-1.0".to_string(),
            base_sha: "base000".to_string(),
            head_ref: "main".to_string(),
            head_sha: "head111".to_string(),
            head_repo_default_branch: Some("attacker-default".to_string()),
            author: "contributor".to_string(),
            html_url: "https://github.com/owner/repo/pull/17".to_string(),
            head_commit_url: "https://github.com/owner/repo/pull/17/commits/head111".to_string(),
        }
    }

    #[test]
    fn test_branches_come_from_base() {
        let event = apply_pull_request(
            Event::new("owner", "repo", "").with_base_branch("forged"),
            forked_pull_request(),
        );

        assert_eq!(event.default_branch, "main");
        assert_ne!(event.default_branch, "attacker-default");
        assert_eq!(event.base_branch, "release-1.0");
        assert_eq!(event.url, "https://github.com/owner/repo");
    }

    #[test]
    fn test_head_fields() {
        let event = apply_pull_request(Event::new("owner", "repo", ""), forked_pull_request());

        assert_eq!(event.sha, "head111");
        assert_eq!(event.head_branch, "main");
        assert_eq!(event.sender, "contributor");
        assert_eq!(event.event_type, EventType::PullRequest);
        assert_eq!(event.pull_request_number, Some(17));
        assert!(event.sha_url.ends_with("head111"));
    }

    #[test]
    fn test_apply_pull_request_keeps_check_run() {
        let mut event = Event::new("owner", "repo", "");
        event.check_run_id = Some(5_u64.into());
        let event = apply_pull_request(event, forked_pull_request());
        assert_eq!(event.check_run_id, Some(5_u64.into()));
    }

    #[test]
    fn test_apply_commit() {
        let mut event = Event::new("owner", "repo", "abc");
        apply_commit(
            &mut event,
            CommitInfo {
                html_url: "https://github.com/owner/repo/commit/abc".to_string(),
                message: "Fix the thing\n\nLonger explanation\nover lines".to_string(),
            },
        );
        assert_eq!(event.sha_title, "Fix the thing");
        assert_eq!(event.sha_url, "https://github.com/owner/repo/commit/abc");
    }

    #[test]
    fn test_commit_title_edge_cases() {
        assert_eq!(commit_title(""), "");
        assert_eq!(commit_title("single"), "single");
        assert_eq!(commit_title("crlf title\r\nbody"), "crlf title");
    }
}
