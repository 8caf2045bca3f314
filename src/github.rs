//! Typed views over GitHub REST v3 payloads.
//!
//! Handlers never walk raw JSON: each decodes the fields it needs through one
//! of these models and ignores the rest of the payload. Every field a payload
//! may legitimately omit is an `Option`; a handler that cannot find its
//! essential fields returns the document untouched.

use serde::de::{Deserialize, Deserializer};
use serde_json::Value;

/// A user or organization reference as it appears inline in other payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: u64,
    pub login: Option<String>,
    pub url: Option<String>,
    pub repos_url: Option<String>,
    pub members_url: Option<String>,
    pub events_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoRef {
    pub id: u64,
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub id: u64,
    pub owner: Option<Account>,
    pub organization: Option<Account>,
    pub teams_url: Option<String>,
    pub collaborators_url: Option<String>,
    pub contributors_url: Option<String>,
    pub subscribers_url: Option<String>,
    pub issues_url: Option<String>,
    pub commits_url: Option<String>,
    pub events_url: Option<String>,
    pub pulls_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: u64,
    pub url: Option<String>,
    pub organization: Option<Account>,
    pub members_url: Option<String>,
    pub repositories_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub url: Option<String>,
    pub author: Option<Account>,
    pub committer: Option<Account>,
    pub comments_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub sha: Option<String>,
    pub user: Option<Account>,
    pub repo: Option<RepoRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub url: Option<String>,
    pub user: Option<Account>,
    pub merged_by: Option<Account>,
    pub assignee: Option<Account>,
    pub head: Option<GitRef>,
    pub base: Option<GitRef>,
    pub review_comments_url: Option<String>,
    pub commits_url: Option<String>,
    pub statuses_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: u64,
    pub url: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Milestone {
    pub id: u64,
    pub url: Option<String>,
}

/// Marker that an issue is also a pull request; carries no id of its own.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub url: Option<String>,
    pub user: Option<Account>,
    pub assignee: Option<Account>,
    pub assignees: Option<Vec<Account>>,
    pub milestone: Option<Milestone>,
    pub labels: Option<Vec<Label>>,
    pub comments_url: Option<String>,
    pub pull_request: Option<PullRequestRef>,
}

/// Issue, review, and commit comments share one shape; only commit comments
/// carry `commit_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub url: Option<String>,
    pub user: Option<Account>,
    pub commit_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub id: u64,
    pub url: Option<String>,
    pub sha: Option<String>,
    pub creator: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitStatus {
    pub id: u64,
    pub url: Option<String>,
    pub creator: Option<Account>,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub id: u64,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub url: Option<String>,
}

/// The envelope common to every activity event. The per-family `payload` is
/// left raw here; each event handler decodes it with its own model below.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub actor: Option<Account>,
    pub repo: Option<RepoRef>,
    pub org: Option<Account>,
    #[serde(default)]
    pub payload: Value,
}

// Event ids arrive as JSON numbers from some endpoints and strings from
// others.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Str(String),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Num(n) => n.to_string(),
        Repr::Str(s) => s,
    })
}

// --- per-family event payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct CommitCommentPayload {
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentPayload {
    pub comment: Option<Comment>,
    pub issue: Option<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesPayload {
    pub issue: Option<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestReviewPayload {
    pub review: Option<Review>,
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestReviewCommentPayload {
    pub comment: Option<Comment>,
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    pub sha: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub commits: Option<Vec<PushCommit>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForkPayload {
    pub forkee: Option<RepoRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowPayload {
    pub target: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberPayload {
    pub member: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MembershipPayload {
    pub member: Option<Account>,
    pub team: Option<Team>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamPayload {
    pub team: Option<Team>,
    pub repository: Option<RepoRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub repository: Option<RepoRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentPayload {
    pub deployment: Option<Deployment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentStatusPayload {
    pub deployment: Option<Deployment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GistPayload {
    pub gist: Option<GistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GistRef {
    pub id: Value,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    pub label: Option<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestonePayload {
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleasePayload {
    pub release: Option<Release>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_event_envelope_id_forms() {
        let numeric: EventEnvelope =
            serde_json::from_value(json!({"id": 12345, "type": "PushEvent"})).unwrap();
        assert_eq!("12345", numeric.id);

        let string: EventEnvelope =
            serde_json::from_value(json!({"id": "22249084947", "type": "PushEvent"})).unwrap();
        assert_eq!("22249084947", string.id);
    }

    #[test]
    fn test_repo_ignores_unknown_fields() {
        let repo: Repo = serde_json::from_value(json!({
            "id": 12,
            "full_name": "octo/repo",
            "owner": {"id": 45, "url": "http://user/45"},
            "watchers": 3,
        }))
        .unwrap();
        assert_eq!(12, repo.id);
        assert_eq!(45, repo.owner.unwrap().id);
    }
}
