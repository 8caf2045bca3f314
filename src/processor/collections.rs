//! Handlers for collection and relation pages.
//!
//! GitHub list endpoints arrive wrapped as `{ "elements": [...] }`. One
//! generic handler serves every collection: it links the page, lists the
//! element URNs, and enqueues one child request per element. Relation pages
//! (requests carrying a relation descriptor) additionally link back to the
//! entity that emitted them. Event pages are deduplicated against the store
//! before fan-out.

use serde_json::Value;
use url::Url;

use crate::events::{event_document_url, find_new};
use crate::document::Document;
use crate::github::{EventEnvelope, RepoRef};
use crate::policy::EdgeRole;
use crate::store::StoreError;
use crate::urn::Urn;

use super::HandlerCx;

pub(super) struct CollectionSpec {
    pub name: &'static str,
    /// Type of the child requests queued per element.
    pub element_kind: &'static str,
    /// Top-level listings decay their elements one step further.
    pub root: bool,
    /// Whether element URNs live under the page's qualifier.
    pub scoped: bool,
    /// Event feeds are deduplicated against the store before fan-out.
    pub events: bool,
}

const fn collection(name: &'static str, element_kind: &'static str, scoped: bool) -> CollectionSpec {
    CollectionSpec {
        name,
        element_kind,
        root: false,
        scoped,
        events: false,
    }
}

const fn root_collection(name: &'static str, element_kind: &'static str) -> CollectionSpec {
    CollectionSpec {
        name,
        element_kind,
        root: true,
        scoped: false,
        events: false,
    }
}

pub(super) const SPECS: &[CollectionSpec] = &[
    root_collection("orgs", "org"),
    root_collection("users", "user"),
    collection("repos", "repo", false),
    collection("teams", "team", false),
    collection("collaborators", "user", false),
    collection("contributors", "user", false),
    collection("subscribers", "user", false),
    collection("members", "user", false),
    collection("team_members", "user", false),
    collection("issues", "issue", true),
    collection("pull_requests", "pull_request", true),
    collection("commits", "commit", true),
    collection("issue_comments", "issue_comment", true),
    collection("review_comments", "review_comment", true),
    collection("commit_comments", "commit_comment", true),
    collection("statuses", "status", true),
    collection("deployments", "deployment", true),
    CollectionSpec {
        name: "events",
        element_kind: "",
        root: false,
        scoped: true,
        events: true,
    },
];

pub(super) fn page(cx: &mut HandlerCx<'_>) -> Result<(), StoreError> {
    let spec = match SPECS.iter().find(|spec| spec.name == cx.request.kind) {
        Some(spec) => spec,
        None => return Ok(()),
    };

    let elements = match page_elements(&cx.document.body) {
        Some(elements) => elements,
        None => {
            warn!(
                "'{}' page at {} has no elements",
                cx.request.kind, cx.request.url
            );
            return Ok(());
        }
    };
    let elements = if spec.events {
        find_new(elements, cx.store)?
    } else {
        elements
    };

    link_page(cx, page_number(&cx.request.url));

    if spec.events {
        process_event_page(cx, elements);
    } else {
        process_element_page(cx, spec, elements);
    }
    Ok(())
}

/// Self, siblings, and (for relation pages) origin links for the page
/// document itself.
fn link_page(cx: &mut HandlerCx<'_>, page: u64) {
    let page_segment = page.to_string();

    if let Some(relation) = cx.request.context.relation.clone() {
        let self_urn = relation
            .qualifier
            .qualified(&[relation.kind.as_str(), "pages", page_segment.as_str()]);
        cx.links().add_resource("self", self_urn);
        cx.links()
            .add_relation("siblings", relation.qualifier.relation(&relation.kind));
        cx.links().add_resource("origin", relation.qualifier);
        return;
    }

    let name = cx.request.kind.clone();
    match cx.qualifier() {
        Some(qualifier) => {
            let self_urn = qualifier.qualified(&[name.as_str(), "pages", page_segment.as_str()]);
            cx.links().add_resource("self", self_urn);
            cx.links().add_collection("siblings", qualifier.collection(&name));
        }
        None => {
            let listing = Urn::root_collection(&name);
            cx.links()
                .add_resource("self", listing.qualified(&["pages", page_segment.as_str()]));
            cx.links().add_collection("siblings", listing);
        }
    }
}

fn process_element_page(cx: &mut HandlerCx<'_>, spec: &CollectionSpec, elements: Vec<Value>) {
    let qualifier = cx.qualifier();

    let hrefs: Vec<Urn> = elements
        .iter()
        .filter_map(|element| element_urn(spec, qualifier.as_ref(), element))
        .collect();
    cx.links().add_resource_list("resources", hrefs);

    let role = if spec.root {
        EdgeRole::RootCollectionElement
    } else {
        EdgeRole::CollectionElement
    };
    for element in &elements {
        if let Some(url) = element.get("url").and_then(Value::as_str) {
            let child = cx.request.child(spec.element_kind, url, role);
            cx.queue.queue(child);
        }
    }
}

/// Events cannot be refetched individually, so each child request carries the
/// event payload as its document, stored under a synthetic per-event URL.
fn process_event_page(cx: &mut HandlerCx<'_>, elements: Vec<Value>) {
    let hrefs: Vec<Urn> = elements
        .iter()
        .filter_map(|element| event_urn(element))
        .collect();
    cx.links().add_resource_list("resources", hrefs);

    for element in &elements {
        let envelope: EventEnvelope = match serde_json::from_value(element.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("undecodable event on {}: {}", cx.request.url, e);
                continue;
            }
        };
        let (kind, repo_url) = match (envelope.kind, envelope.repo.and_then(|r| r.url)) {
            (Some(kind), Some(repo_url)) => (kind, repo_url),
            _ => {
                debug!("event {} has no type or repo url, skipping", envelope.id);
                continue;
            }
        };

        let url = event_document_url(&repo_url, &envelope.id);
        let mut child = cx
            .request
            .child(&kind, &url, EdgeRole::CollectionElement);
        child.document = Some(Document::new(&kind, &url, element.clone()));
        cx.queue.queue(child);
    }
}

fn page_elements(body: &Value) -> Option<Vec<Value>> {
    match body.get("elements") {
        Some(Value::Array(elements)) => Some(elements.clone()),
        _ => body.as_array().cloned(),
    }
}

fn element_urn(spec: &CollectionSpec, qualifier: Option<&Urn>, element: &Value) -> Option<Urn> {
    let id = element_id(element)?;
    if spec.scoped {
        Some(qualifier?.child(spec.element_kind, id))
    } else {
        Some(Urn::entity(spec.element_kind, id))
    }
}

fn event_urn(element: &Value) -> Option<Urn> {
    let envelope: EventEnvelope = serde_json::from_value(element.clone()).ok()?;
    let kind = envelope.kind?;
    let repo: RepoRef = envelope.repo?;
    Some(Urn::entity("repo", repo.id).child(&kind, envelope.id))
}

fn element_id(element: &Value) -> Option<String> {
    match element.get("id") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => element
            .get("sha")
            .and_then(Value::as_str)
            .map(str::to_owned),
    }
}

fn page_number(url: &str) -> u64 {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(name, _)| name == "page")
                .and_then(|(_, value)| value.parse().ok())
        })
        .unwrap_or(1)
}
