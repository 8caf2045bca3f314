//! Handlers for the `*Event` family.
//!
//! Every event shares the envelope treatment: a self URN scoped to the repo
//! (or team, or org, in that order), plus actor/repo/org links. The payload
//! then varies per family; each arm decodes it with its own model and links
//! the distinguishing entities. An event with no usable scope is persisted
//! untouched for audit.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::github::{
    CommitCommentPayload, DeploymentPayload, DeploymentStatusPayload, EventEnvelope,
    FollowPayload, ForkPayload, GistPayload, IssueCommentPayload, IssuesPayload, LabelPayload,
    MemberPayload, MembershipPayload, MilestonePayload, PullRequestPayload,
    PullRequestReviewCommentPayload, PullRequestReviewPayload, PushPayload, ReleasePayload,
    RepositoryPayload, StatusPayload, TeamPayload,
};
use crate::policy::EdgeRole;
use crate::store::StoreError;
use crate::urn::Urn;

use super::HandlerCx;

pub(super) const EVENT_TYPES: &[&str] = &[
    "CommitCommentEvent",
    "CreateEvent",
    "DeleteEvent",
    "DeploymentEvent",
    "DeploymentStatusEvent",
    "DownloadEvent",
    "FollowEvent",
    "ForkEvent",
    "ForkApplyEvent",
    "GistEvent",
    "GollumEvent",
    "IssueCommentEvent",
    "IssuesEvent",
    "LabelEvent",
    "MemberEvent",
    "MembershipEvent",
    "MilestoneEvent",
    "PageBuildEvent",
    "PublicEvent",
    "PullRequestEvent",
    "PullRequestReviewEvent",
    "PullRequestReviewCommentEvent",
    "PushEvent",
    "ReleaseEvent",
    "RepositoryEvent",
    "StatusEvent",
    "TeamEvent",
    "TeamAddEvent",
    "WatchEvent",
];

pub(super) fn event(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let envelope: EventEnvelope = match cx.decode() {
        Some(envelope) => envelope,
        None => return Ok(()),
    };

    let scope = match event_scope(&envelope) {
        Some(scope) => scope,
        None => {
            warn!(
                "'{}' at {} has neither repo, team, nor org; leaving as-is",
                cx.request.kind, cx.request.url
            );
            return Ok(());
        }
    };

    let kind = cx.request.kind.clone();
    cx.links()
        .add_self_and_siblings(scope.child(&kind, &envelope.id), scope.collection("events"));

    if let Some(actor) = &envelope.actor {
        cx.resource("actor", Urn::entity("user", actor.id), "user", actor.url.as_deref());
    }
    if let Some(repo) = &envelope.repo {
        cx.resource("repo", Urn::entity("repo", repo.id), "repo", repo.url.as_deref());
    }
    if let Some(org) = &envelope.org {
        cx.resource("org", Urn::entity("org", org.id), "org", org.url.as_deref());
    }

    let repo_url = envelope.repo.as_ref().and_then(|r| r.url.clone());
    link_payload(cx, &kind, &scope, repo_url.as_deref(), &envelope.payload);
    Ok(())
}

/// Events are named under their repo; team-scoped events under the team and
/// org-level events without a repo under the org.
fn event_scope(envelope: &EventEnvelope) -> Option<Urn> {
    if let Some(repo) = &envelope.repo {
        return Some(Urn::entity("repo", repo.id));
    }
    if let Some(team_id) = envelope
        .payload
        .get("team")
        .and_then(|team| team.get("id"))
        .and_then(Value::as_u64)
    {
        return Some(Urn::entity("team", team_id));
    }
    envelope.org.as_ref().map(|org| Urn::entity("org", org.id))
}

fn link_payload(cx: &mut HandlerCx<'_>, kind: &str, scope: &Urn, repo_url: Option<&str>, payload: &Value) {
    match kind {
        "CommitCommentEvent" => {
            let Some(p) = decode::<CommitCommentPayload>(cx, payload) else {
                return;
            };
            if let Some(comment) = p.comment {
                cx.scoped_resource(
                    "comment",
                    scope.child("commit_comment", comment.id),
                    "commit_comment",
                    comment.url.as_deref(),
                    scope,
                );
                // The payload names the commit only by sha; its API URL is
                // synthesized from the repo.
                if let (Some(commit_id), Some(repo_url)) = (&comment.commit_id, repo_url) {
                    let commit_url = format!("{}/commits/{}", repo_url, commit_id);
                    cx.scoped_resource(
                        "commit",
                        scope.child("commit", commit_id),
                        "commit",
                        Some(&commit_url),
                        scope,
                    );
                }
            }
        }
        "DeploymentEvent" => {
            let Some(p) = decode::<DeploymentPayload>(cx, payload) else {
                return;
            };
            if let Some(deployment) = p.deployment {
                cx.scoped_resource(
                    "deployment",
                    scope.child("deployment", deployment.id),
                    "deployment",
                    deployment.url.as_deref(),
                    scope,
                );
            }
        }
        "DeploymentStatusEvent" => {
            let Some(p) = decode::<DeploymentStatusPayload>(cx, payload) else {
                return;
            };
            if let Some(deployment) = p.deployment {
                cx.scoped_resource(
                    "deployment",
                    scope.child("deployment", deployment.id),
                    "deployment",
                    deployment.url.as_deref(),
                    scope,
                );
            }
        }
        "FollowEvent" => {
            let Some(p) = decode::<FollowPayload>(cx, payload) else {
                return;
            };
            if let Some(target) = p.target {
                cx.resource(
                    "target",
                    Urn::entity("user", target.id),
                    "user",
                    target.url.as_deref(),
                );
            }
        }
        "ForkEvent" => {
            let Some(p) = decode::<ForkPayload>(cx, payload) else {
                return;
            };
            if let Some(forkee) = p.forkee {
                cx.resource(
                    "forkee",
                    Urn::entity("repo", forkee.id),
                    "repo",
                    forkee.url.as_deref(),
                );
            }
        }
        "GistEvent" => {
            let Some(p) = decode::<GistPayload>(cx, payload) else {
                return;
            };
            // Gists are outside the crawl; link without queueing.
            if let Some(id) = p.gist.and_then(|gist| value_id(&gist.id)) {
                cx.links().add_resource("gist", Urn::entity("gist", id));
            }
        }
        "IssueCommentEvent" => {
            let Some(p) = decode::<IssueCommentPayload>(cx, payload) else {
                return;
            };
            if let Some(comment) = p.comment {
                cx.scoped_resource(
                    "comment",
                    scope.child("issue_comment", comment.id),
                    "issue_comment",
                    comment.url.as_deref(),
                    scope,
                );
            }
            if let Some(issue) = p.issue {
                cx.scoped_resource(
                    "issue",
                    scope.child("issue", issue.id),
                    "issue",
                    issue.url.as_deref(),
                    scope,
                );
            }
        }
        "IssuesEvent" => {
            let Some(p) = decode::<IssuesPayload>(cx, payload) else {
                return;
            };
            if let Some(issue) = p.issue {
                cx.scoped_resource(
                    "issue",
                    scope.child("issue", issue.id),
                    "issue",
                    issue.url.as_deref(),
                    scope,
                );
            }
        }
        "LabelEvent" => {
            let Some(p) = decode::<LabelPayload>(cx, payload) else {
                return;
            };
            if let Some(label) = p.label {
                cx.links()
                    .add_resource("label", scope.child("label", label.id));
            }
        }
        "MemberEvent" => {
            let Some(p) = decode::<MemberPayload>(cx, payload) else {
                return;
            };
            if let Some(member) = p.member {
                cx.resource(
                    "member",
                    Urn::entity("user", member.id),
                    "user",
                    member.url.as_deref(),
                );
            }
        }
        "MembershipEvent" => {
            let Some(p) = decode::<MembershipPayload>(cx, payload) else {
                return;
            };
            if let Some(member) = p.member {
                cx.resource(
                    "member",
                    Urn::entity("user", member.id),
                    "user",
                    member.url.as_deref(),
                );
            }
            if let Some(team) = p.team {
                cx.resource("team", Urn::entity("team", team.id), "team", team.url.as_deref());
            }
        }
        "MilestoneEvent" => {
            let Some(p) = decode::<MilestonePayload>(cx, payload) else {
                return;
            };
            if let Some(milestone) = p.milestone {
                cx.links()
                    .add_resource("milestone", scope.child("milestone", milestone.id));
            }
        }
        "PullRequestEvent" => {
            let Some(p) = decode::<PullRequestPayload>(cx, payload) else {
                return;
            };
            if let Some(pull) = p.pull_request {
                cx.scoped_resource(
                    "pull_request",
                    scope.child("pull_request", pull.id),
                    "pull_request",
                    pull.url.as_deref(),
                    scope,
                );
            }
        }
        "PullRequestReviewEvent" => {
            let Some(p) = decode::<PullRequestReviewPayload>(cx, payload) else {
                return;
            };
            if let Some(review) = p.review {
                cx.links()
                    .add_resource("review", scope.child("review", review.id));
            }
            if let Some(pull) = p.pull_request {
                cx.scoped_resource(
                    "pull_request",
                    scope.child("pull_request", pull.id),
                    "pull_request",
                    pull.url.as_deref(),
                    scope,
                );
            }
        }
        "PullRequestReviewCommentEvent" => {
            let Some(p) = decode::<PullRequestReviewCommentPayload>(cx, payload) else {
                return;
            };
            if let Some(comment) = p.comment {
                cx.scoped_resource(
                    "comment",
                    scope.child("review_comment", comment.id),
                    "review_comment",
                    comment.url.as_deref(),
                    scope,
                );
            }
            if let Some(pull) = p.pull_request {
                cx.scoped_resource(
                    "pull_request",
                    scope.child("pull_request", pull.id),
                    "pull_request",
                    pull.url.as_deref(),
                    scope,
                );
            }
        }
        "PushEvent" => {
            let Some(p) = decode::<PushPayload>(cx, payload) else {
                return;
            };
            let commits = p.commits.unwrap_or_default();
            if commits.is_empty() {
                return;
            }
            let hrefs = commits
                .iter()
                .map(|commit| scope.child("commit", &commit.sha))
                .collect();
            cx.links().add_resource_list("commits", hrefs);
            for commit in &commits {
                if let Some(url) = commit.url.as_deref() {
                    let mut child = cx.request.child("commit", url, EdgeRole::Resource);
                    child.context.qualifier = Some(scope.clone());
                    cx.queue.queue(child);
                }
            }
        }
        "ReleaseEvent" => {
            let Some(p) = decode::<ReleasePayload>(cx, payload) else {
                return;
            };
            if let Some(release) = p.release {
                cx.links()
                    .add_resource("release", scope.child("release", release.id));
            }
        }
        "RepositoryEvent" => {
            let Some(p) = decode::<RepositoryPayload>(cx, payload) else {
                return;
            };
            if let Some(repository) = p.repository {
                cx.resource(
                    "repository",
                    Urn::entity("repo", repository.id),
                    "repo",
                    repository.url.as_deref(),
                );
            }
        }
        "TeamEvent" | "TeamAddEvent" => {
            let Some(p) = decode::<TeamPayload>(cx, payload) else {
                return;
            };
            if let Some(team) = p.team {
                cx.resource("team", Urn::entity("team", team.id), "team", team.url.as_deref());
            }
            if let Some(repository) = p.repository {
                cx.resource(
                    "repository",
                    Urn::entity("repo", repository.id),
                    "repo",
                    repository.url.as_deref(),
                );
            }
        }
        "StatusEvent" => {
            let Some(p) = decode::<StatusPayload>(cx, payload) else {
                return;
            };
            // Only the sha is known; there is no URL to queue.
            if let Some(sha) = p.sha {
                cx.links().add_resource("commit", scope.child("commit", sha));
            }
        }
        // CreateEvent, DeleteEvent, DownloadEvent, ForkApplyEvent,
        // GollumEvent, PageBuildEvent, PublicEvent, WatchEvent: the envelope
        // links are all there is.
        _ => (),
    }
}

fn decode<T: DeserializeOwned>(cx: &HandlerCx<'_>, payload: &Value) -> Option<T> {
    match serde_json::from_value(payload.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(
                "malformed '{}' payload at {}: {}",
                cx.request.kind, cx.request.url, e
            );
            None
        }
    }
}

fn value_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
