//! Handlers for the singleton GitHub entities.
//!
//! Every handler follows the same shape: link self and siblings, link and
//! enqueue the payload's inbound references, link and enqueue child
//! collections and relations, and leave the payload itself untouched. A
//! payload missing its essential fields is persisted as-is for audit.

use crate::github;
use crate::policy::EdgeRole;
use crate::store::StoreError;
use crate::urn::Urn;

use super::HandlerCx;

pub(super) fn org(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let account: github::Account = match cx.decode() {
        Some(account) => account,
        None => return Ok(()),
    };

    let self_urn = Urn::entity("org", account.id);
    cx.links()
        .add_self_and_siblings(self_urn.clone(), Urn::root_collection("orgs"));

    cx.collection("repos", &self_urn, account.repos_url.as_deref());
    cx.relation("org", "members", &self_urn, account.members_url.as_deref());
    cx.collection("events", &self_urn, account.events_url.as_deref());
    Ok(())
}

pub(super) fn user(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let account: github::Account = match cx.decode() {
        Some(account) => account,
        None => return Ok(()),
    };

    let self_urn = Urn::entity("user", account.id);
    cx.links()
        .add_self_and_siblings(self_urn.clone(), Urn::root_collection("users"));

    cx.collection("repos", &self_urn, account.repos_url.as_deref());
    Ok(())
}

pub(super) fn repo(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let repo: github::Repo = match cx.decode() {
        Some(repo) => repo,
        None => return Ok(()),
    };
    let owner = match repo.owner {
        Some(owner) => owner,
        None => {
            warn!("repo payload at {} has no owner", cx.request.url);
            return Ok(());
        }
    };

    let self_urn = Urn::entity("repo", repo.id);
    let owner_urn = Urn::entity("user", owner.id);
    cx.links()
        .add_self_and_siblings(self_urn.clone(), owner_urn.collection("repos"));

    cx.resource("owner", owner_urn, "user", owner.url.as_deref());
    if let Some(organization) = &repo.organization {
        cx.resource(
            "organization",
            Urn::entity("org", organization.id),
            "org",
            organization.url.as_deref(),
        );
    }

    cx.relation("repo", "teams", &self_urn, repo.teams_url.as_deref());
    cx.relation(
        "repo",
        "collaborators",
        &self_urn,
        repo.collaborators_url.as_deref(),
    );
    cx.relation(
        "repo",
        "contributors",
        &self_urn,
        repo.contributors_url.as_deref(),
    );
    cx.relation(
        "repo",
        "subscribers",
        &self_urn,
        repo.subscribers_url.as_deref(),
    );
    cx.collection("issues", &self_urn, repo.issues_url.as_deref());
    cx.collection("commits", &self_urn, repo.commits_url.as_deref());
    cx.collection("events", &self_urn, repo.events_url.as_deref());
    Ok(())
}

pub(super) fn team(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let team: github::Team = match cx.decode() {
        Some(team) => team,
        None => return Ok(()),
    };

    let self_urn = Urn::entity("team", team.id);
    let siblings = match &team.organization {
        Some(org) => Urn::entity("org", org.id).collection("teams"),
        None => Urn::root_collection("teams"),
    };
    cx.links().add_self_and_siblings(self_urn.clone(), siblings);

    if let Some(organization) = &team.organization {
        cx.resource(
            "organization",
            Urn::entity("org", organization.id),
            "org",
            organization.url.as_deref(),
        );
    }
    cx.relation(
        "team",
        "team_members",
        &self_urn,
        team.members_url.as_deref(),
    );
    cx.relation("team", "repos", &self_urn, team.repositories_url.as_deref());
    Ok(())
}

pub(super) fn commit(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let commit: github::Commit = match cx.decode() {
        Some(commit) => commit,
        None => return Ok(()),
    };
    let qualifier = match cx.qualifier() {
        Some(qualifier) => qualifier,
        None => {
            warn!("commit request for {} has no qualifier", cx.request.url);
            return Ok(());
        }
    };

    let self_urn = qualifier.child("commit", &commit.sha);
    cx.links()
        .add_self_and_siblings(self_urn.clone(), qualifier.collection("commits"));

    if let Some(author) = &commit.author {
        cx.resource(
            "author",
            Urn::entity("user", author.id),
            "user",
            author.url.as_deref(),
        );
    }
    if let Some(committer) = &commit.committer {
        cx.resource(
            "committer",
            Urn::entity("user", committer.id),
            "user",
            committer.url.as_deref(),
        );
    }
    cx.collection(
        "commit_comments",
        &self_urn,
        commit.comments_url.as_deref(),
    );
    Ok(())
}

pub(super) fn pull_request(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let pull: github::PullRequest = match cx.decode() {
        Some(pull) => pull,
        None => return Ok(()),
    };
    let qualifier = match cx.qualifier() {
        Some(qualifier) => qualifier,
        None => {
            warn!(
                "pull_request request for {} has no qualifier",
                cx.request.url
            );
            return Ok(());
        }
    };

    let self_urn = qualifier.child("pull_request", pull.id);
    cx.links()
        .add_self_and_siblings(self_urn.clone(), qualifier.collection("pull_requests"));

    if let Some(user) = &pull.user {
        cx.resource("user", Urn::entity("user", user.id), "user", user.url.as_deref());
    }
    if let Some(merged_by) = &pull.merged_by {
        cx.resource(
            "merged_by",
            Urn::entity("user", merged_by.id),
            "user",
            merged_by.url.as_deref(),
        );
    }
    if let Some(assignee) = &pull.assignee {
        cx.resource(
            "assignee",
            Urn::entity("user", assignee.id),
            "user",
            assignee.url.as_deref(),
        );
    }
    if let Some(repo) = pull.head.as_ref().and_then(|head| head.repo.as_ref()) {
        cx.resource("head_repo", Urn::entity("repo", repo.id), "repo", repo.url.as_deref());
    }
    if let Some(repo) = pull.base.as_ref().and_then(|base| base.repo.as_ref()) {
        cx.resource("base_repo", Urn::entity("repo", repo.id), "repo", repo.url.as_deref());
    }

    cx.collection(
        "review_comments",
        &self_urn,
        pull.review_comments_url.as_deref(),
    );
    cx.collection("commits", &self_urn, pull.commits_url.as_deref());
    cx.collection("statuses", &self_urn, pull.statuses_url.as_deref());
    Ok(())
}

pub(super) fn issue(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let issue: github::Issue = match cx.decode() {
        Some(issue) => issue,
        None => return Ok(()),
    };
    let qualifier = match cx.qualifier() {
        Some(qualifier) => qualifier,
        None => {
            warn!("issue request for {} has no qualifier", cx.request.url);
            return Ok(());
        }
    };

    let self_urn = qualifier.child("issue", issue.id);
    cx.links()
        .add_self_and_siblings(self_urn.clone(), qualifier.collection("issues"));

    if let Some(user) = &issue.user {
        cx.resource("user", Urn::entity("user", user.id), "user", user.url.as_deref());
    }
    if let Some(assignee) = &issue.assignee {
        cx.resource(
            "assignee",
            Urn::entity("user", assignee.id),
            "user",
            assignee.url.as_deref(),
        );
    }
    if let Some(assignees) = &issue.assignees {
        if !assignees.is_empty() {
            let hrefs = assignees
                .iter()
                .map(|a| Urn::entity("user", a.id))
                .collect();
            cx.links().add_resource_list("assignees", hrefs);
        }
    }
    if let Some(labels) = &issue.labels {
        if !labels.is_empty() {
            let hrefs = labels
                .iter()
                .map(|label| qualifier.child("label", label.id))
                .collect();
            cx.links().add_resource_list("labels", hrefs);
        }
    }
    if let Some(milestone) = &issue.milestone {
        cx.links()
            .add_resource("milestone", qualifier.child("milestone", milestone.id));
    }

    cx.collection("issue_comments", &self_urn, issue.comments_url.as_deref());

    // An issue that is also a pull request carries only the PR's URL.
    if let Some(url) = issue
        .pull_request
        .as_ref()
        .and_then(|pr| pr.url.as_deref())
    {
        let child = cx.request.child("pull_request", url, EdgeRole::Resource);
        cx.queue.queue(child);
    }
    Ok(())
}

fn comment(cx: &mut HandlerCx<'_>, kind: &str, siblings: &str) -> Result<(), StoreError> {
    let comment: github::Comment = match cx.decode() {
        Some(comment) => comment,
        None => return Ok(()),
    };
    let qualifier = match cx.qualifier() {
        Some(qualifier) => qualifier,
        None => {
            warn!("{} request for {} has no qualifier", kind, cx.request.url);
            return Ok(());
        }
    };

    let self_urn = qualifier.child(kind, comment.id);
    cx.links()
        .add_self_and_siblings(self_urn, qualifier.collection(siblings));

    if let Some(user) = &comment.user {
        cx.resource("user", Urn::entity("user", user.id), "user", user.url.as_deref());
    }
    Ok(())
}

pub(super) fn review_comment(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    comment(cx, "review_comment", "review_comments")
}

pub(super) fn issue_comment(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    comment(cx, "issue_comment", "issue_comments")
}

pub(super) fn commit_comment(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    comment(cx, "commit_comment", "commit_comments")
}

pub(super) fn deployment(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let deployment: github::Deployment = match cx.decode() {
        Some(deployment) => deployment,
        None => return Ok(()),
    };
    let qualifier = match cx.qualifier() {
        Some(qualifier) => qualifier,
        None => {
            warn!("deployment request for {} has no qualifier", cx.request.url);
            return Ok(());
        }
    };

    let self_urn = qualifier.child("deployment", deployment.id);
    cx.links()
        .add_self_and_siblings(self_urn, qualifier.collection("deployments"));

    if let Some(creator) = &deployment.creator {
        cx.resource(
            "creator",
            Urn::entity("user", creator.id),
            "user",
            creator.url.as_deref(),
        );
    }
    if let Some(sha) = &deployment.sha {
        cx.links()
            .add_resource("commit", qualifier.child("commit", sha));
    }
    Ok(())
}

pub(super) fn status(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let status: github::CommitStatus = match cx.decode() {
        Some(status) => status,
        None => return Ok(()),
    };
    let qualifier = match cx.qualifier() {
        Some(qualifier) => qualifier,
        None => {
            warn!("status request for {} has no qualifier", cx.request.url);
            return Ok(());
        }
    };

    let self_urn = qualifier.child("status", status.id);
    cx.links()
        .add_self_and_siblings(self_urn, qualifier.collection("statuses"));

    if let Some(creator) = &status.creator {
        cx.resource(
            "creator",
            Urn::entity("user", creator.id),
            "user",
            creator.url.as_deref(),
        );
    }
    if let Some(sha) = &status.sha {
        cx.links()
            .add_resource("commit", qualifier.child("commit", sha));
    }
    Ok(())
}
