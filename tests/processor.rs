use pretty_assertions::assert_eq;

use std::sync::Arc;

use github_crawler as ghc;

use ghc::document::Document;
use ghc::fetch::FetchedResponse;
use ghc::policy::{Fetch, Freshness, Transitivity, TraversalPolicy};
use ghc::processor::{Processor, PROCESSOR_VERSION};
use ghc::queue::{Priority, RecordingQueue};
use ghc::request::{Relation, Request};
use ghc::store::{DocumentStore, MemoryStore};
use ghc::urn::Urn;

use serde_json::{json, Value};

fn processor() -> (Processor, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Processor::new(store.clone()), store)
}

fn attach(request: Request, body: Value) -> Request {
    let document = Document::new(&request.kind, &request.url, body);
    request.with_document(document)
}

fn run(processor: &Processor, request: &mut Request) -> (Document, RecordingQueue) {
    let mut queue = RecordingQueue::new();
    let document = processor
        .process(request, &mut queue)
        .expect("store should be reachable")
        .expect("request should carry a document");
    (document, queue)
}

fn link_href(document: &Document, role: &str) -> String {
    document
        .metadata
        .links
        .get(role)
        .unwrap_or_else(|| panic!("no '{}' link", role))
        .href()
        .unwrap_or_else(|| panic!("'{}' link has no href", role))
        .to_string()
}

fn queued(queue: &RecordingQueue) -> Vec<(String, String)> {
    queue
        .requests()
        .map(|r| (r.kind.clone(), r.url.clone()))
        .collect()
}

fn repo_payload() -> Value {
    json!({
        "id": 12,
        "owner": {"id": 45, "url": "http://user/45"},
        "organization": {"id": 24, "url": "http://org/24"},
        "teams_url": "http://teams",
        "collaborators_url": "http://collaborators{/collaborator}",
        "commits_url": "http://commits{/sha}",
        "contributors_url": "http://contributors",
        "events_url": "http://events",
        "issues_url": "http://issues{/number}",
        "pulls_url": "http://pulls{/number}",
        "subscribers_url": "http://subscribers",
    })
}

#[test]
fn repo_processing() {
    let (processor, _) = processor();
    let mut request = attach(Request::new("repo", "http://foo/repo/12"), repo_payload());

    let (document, queue) = run(&processor, &mut request);

    assert_eq!("urn:repo:12", link_href(&document, "self"));
    assert_eq!("urn:user:45:repos", link_href(&document, "siblings"));
    assert_eq!("urn:user:45", link_href(&document, "owner"));
    assert_eq!("urn:org:24", link_href(&document, "organization"));
    assert_eq!("urn:repo:12:teams:pages:*", link_href(&document, "teams"));
    assert_eq!(
        "urn:repo:12:collaborators:pages:*",
        link_href(&document, "collaborators")
    );
    assert_eq!(
        "urn:repo:12:contributors:pages:*",
        link_href(&document, "contributors")
    );
    assert_eq!(
        "urn:repo:12:subscribers:pages:*",
        link_href(&document, "subscribers")
    );

    assert_eq!(
        vec![
            ("user".to_owned(), "http://user/45".to_owned()),
            ("org".to_owned(), "http://org/24".to_owned()),
            ("teams".to_owned(), "http://teams".to_owned()),
            ("collaborators".to_owned(), "http://collaborators".to_owned()),
            ("contributors".to_owned(), "http://contributors".to_owned()),
            ("subscribers".to_owned(), "http://subscribers".to_owned()),
            ("issues".to_owned(), "http://issues".to_owned()),
            ("commits".to_owned(), "http://commits".to_owned()),
            ("events".to_owned(), "http://events".to_owned()),
        ],
        queued(&queue)
    );

    // No queued URL may retain URI Template variables.
    for request in queue.requests() {
        assert!(
            !request.url.contains('{') && !request.url.contains('}'),
            "template variables leaked into {}",
            request.url
        );
    }

    // The document's version stamp matches this processor.
    assert_eq!(Some(PROCESSOR_VERSION), document.metadata.version);
}

#[test]
fn repo_relation_children_carry_descriptors() {
    let (processor, _) = processor();
    let mut request = attach(Request::new("repo", "http://foo/repo/12"), repo_payload());
    let (_, queue) = run(&processor, &mut request);

    let mut relation_count = 0;
    for child in queue.requests() {
        if let Some(relation) = &child.context.relation {
            relation_count += 1;
            assert_eq!("repo", relation.origin);
            assert_eq!(Urn::entity("repo", 12), relation.qualifier);
            assert!(!relation.guid.is_empty());
            assert_eq!(child.kind, relation.kind);
        }
    }
    assert_eq!(4, relation_count, "teams/collaborators/contributors/subscribers");
}

#[test]
fn processing_is_idempotent_modulo_guids() {
    let (processor, _) = processor();

    let mut first = attach(Request::new("repo", "http://foo/repo/12"), repo_payload());
    let (doc_one, queue_one) = run(&processor, &mut first);

    // Feed the processed document straight back through.
    let mut second = Request::new("repo", "http://foo/repo/12").with_document(doc_one.clone());
    let (doc_two, queue_two) = run(&processor, &mut second);

    assert_eq!(doc_one.metadata.links, doc_two.metadata.links);
    assert_eq!(doc_one.body, doc_two.body);
    assert_eq!(queued(&queue_one), queued(&queue_two));
}

#[test]
fn pull_request_event() {
    let (processor, _) = processor();
    let mut request = attach(
        Request::new("PullRequestEvent", "http://repo/4/events/12345"),
        json!({
            "id": 12345,
            "type": "PullRequestEvent",
            "actor": {"id": 3, "url": "http://user/3"},
            "repo": {"id": 4, "url": "http://repo/4"},
            "org": {"id": 5, "url": "http://org/5"},
            "payload": {"pull_request": {"id": 1, "url": "http://pull_request/1"}},
        }),
    );

    let (document, queue) = run(&processor, &mut request);

    assert_eq!("urn:repo:4:PullRequestEvent:12345", link_href(&document, "self"));
    assert_eq!("urn:user:3", link_href(&document, "actor"));
    assert_eq!("urn:repo:4", link_href(&document, "repo"));
    assert_eq!("urn:org:5", link_href(&document, "org"));
    assert_eq!(
        "urn:repo:4:pull_request:1",
        link_href(&document, "pull_request")
    );

    assert_eq!(
        vec![
            ("user".to_owned(), "http://user/3".to_owned()),
            ("repo".to_owned(), "http://repo/4".to_owned()),
            ("org".to_owned(), "http://org/5".to_owned()),
            ("pull_request".to_owned(), "http://pull_request/1".to_owned()),
        ],
        queued(&queue)
    );

    // The pull request child is named under the event's repo.
    let pull_child = queue
        .requests()
        .find(|r| r.kind == "pull_request")
        .unwrap();
    assert_eq!(Some(Urn::entity("repo", 4)), pull_child.context.qualifier);
}

#[test]
fn status_event_synthesizes_commit_link_without_queueing() {
    let (processor, _) = processor();
    let mut request = attach(
        Request::new("StatusEvent", "http://repo/4/events/777"),
        json!({
            "id": 777,
            "type": "StatusEvent",
            "repo": {"id": 4, "url": "http://repo/4"},
            "payload": {"sha": "a1b2"},
        }),
    );

    let (document, queue) = run(&processor, &mut request);

    assert_eq!("urn:repo:4:commit:a1b2", link_href(&document, "commit"));
    assert!(
        queue.requests().all(|r| r.kind != "commit"),
        "no commit URL is known, so none may be queued"
    );
}

#[test]
fn event_without_scope_is_left_untouched() {
    let (processor, _) = processor();
    let mut request = attach(
        Request::new("WatchEvent", "http://events/0"),
        json!({"id": 0, "type": "WatchEvent", "payload": {}}),
    );

    let (document, queue) = run(&processor, &mut request);
    assert!(document.metadata.links.is_empty());
    assert_eq!(0, queued(&queue).len());
}

#[test]
fn root_collection_page_fans_out() {
    let (processor, _) = processor();
    let policy = TraversalPolicy::new(
        Transitivity::DeepShallow,
        Freshness::Match,
        Fetch::OriginStorage,
    );
    let mut request = attach(
        Request::new("orgs", "http://test.com/orgs").with_policy(policy),
        json!({"elements": [{"type": "org", "url": "http://child1"}]}),
    );
    request.response = Some(FetchedResponse {
        status: 200,
        etag: None,
        link: Some(
            "<http://test.com/orgs?page=2&per_page=100>; rel=\"next\", \
             <http://test.com/orgs?page=2&per_page=100>; rel=\"last\""
                .to_owned(),
        ),
        body: Value::Null,
    });

    let (_, queue) = run(&processor, &mut request);

    let pages: Vec<&Request> = queue.at_priority(Priority::Soon).collect();
    assert_eq!(1, pages.len());
    assert_eq!("http://test.com/orgs?page=2&per_page=100", pages[0].url);
    assert_eq!("orgs", pages[0].kind);
    assert_eq!(Transitivity::DeepShallow, pages[0].policy.transitivity);

    let elements: Vec<&Request> = queue.at_priority(Priority::Normal).collect();
    assert_eq!(1, elements.len());
    assert_eq!("http://child1", elements[0].url);
    assert_eq!("org", elements[0].kind);
    assert_eq!(Transitivity::Shallow, elements[0].policy.transitivity);
}

#[test]
fn version_gate_skips_reprocessing() {
    let (processor, _) = processor();
    let policy = TraversalPolicy::new(
        Transitivity::DeepShallow,
        Freshness::Version,
        Fetch::Storage,
    );

    let mut document = Document::new("repo", "http://foo/repo/12", repo_payload());
    document.metadata.version = Some(processor.version());
    let mut request = Request::new("repo", "http://foo/repo/12")
        .with_policy(policy)
        .with_document(document.clone());

    assert!(!processor.can_handle(&request).unwrap());

    let mut queue = RecordingQueue::new();
    let unchanged = processor.process(&mut request, &mut queue).unwrap().unwrap();
    assert_eq!(document, unchanged);
    assert_eq!(0, queued(&queue).len());
}

#[test]
fn matching_etag_skips_reprocessing() {
    let (processor, store) = processor();

    let mut stored = Document::new("repo", "http://foo/repo/12", repo_payload());
    stored.metadata.etag = Some("\"abc\"".to_owned());
    stored
        .metadata
        .links
        .add_self_and_siblings(Urn::entity("repo", 12), Urn::entity("user", 45).collection("repos"));
    store.upsert(&stored).unwrap();

    let mut request = attach(Request::new("repo", "http://foo/repo/12"), repo_payload());
    request.response = Some(FetchedResponse {
        status: 200,
        etag: Some("\"abc\"".to_owned()),
        link: None,
        body: Value::Null,
    });
    assert!(!processor.can_handle(&request).unwrap());

    // A different etag reprocesses.
    if let Some(response) = request.response.as_mut() {
        response.etag = Some("\"def\"".to_owned());
    }
    assert!(processor.can_handle(&request).unwrap());
}

#[test]
fn unknown_type_is_not_handled() {
    let (processor, _) = processor();
    let request = attach(Request::new("banana", "http://banana/1"), json!({"id": 1}));
    assert!(!processor.can_handle(&request).unwrap());
}

#[test]
fn event_page_dedups_against_store() {
    let (processor, store) = processor();

    // Events 3 and 4 were already crawled.
    for id in [3u64, 4] {
        let url = format!("http://repo/4/events/{}", id);
        let mut doc = Document::new(
            "PushEvent",
            &url,
            json!({"id": id, "type": "PushEvent", "repo": {"id": 4, "url": "http://repo/4"}}),
        );
        doc.metadata.links.add_self_and_siblings(
            Urn::entity("repo", 4).child("PushEvent", id),
            Urn::entity("repo", 4).collection("events"),
        );
        store.upsert(&doc).unwrap();
    }

    let elements: Vec<Value> = (0..20)
        .map(|id| {
            json!({
                "id": id,
                "type": "PushEvent",
                "repo": {"id": 4, "url": "http://repo/4"},
            })
        })
        .collect();
    let mut request = attach(
        Request::new("events", "http://repo/4/events")
            .with_qualifier(Urn::entity("repo", 4)),
        json!({ "elements": elements }),
    );

    let (_, queue) = run(&processor, &mut request);

    let children = queued(&queue);
    assert_eq!(18, children.len());
    assert!(children
        .iter()
        .all(|(_, url)| url != "http://repo/4/events/3" && url != "http://repo/4/events/4"));

    // Event children carry their payload; there is nothing to refetch.
    for child in queue.requests() {
        assert_eq!("PushEvent", child.kind);
        assert!(child.document.is_some());
    }
}

#[test]
fn relation_page_links_back_to_origin() {
    let (processor, _) = processor();
    let team = Urn::entity("team", 66);
    let mut request = attach(
        Request::new("team_members", "http://team/66/members?page=2")
            .with_qualifier(team.clone())
            .with_relation(Relation::new("team", team.clone(), "team_members")),
        json!({"elements": [{"id": 9, "url": "http://user/9"}]}),
    );

    let (document, queue) = run(&processor, &mut request);

    assert_eq!(
        "urn:team:66:team_members:pages:2",
        link_href(&document, "self")
    );
    assert_eq!(
        "urn:team:66:team_members:pages:*",
        link_href(&document, "siblings")
    );
    assert_eq!("urn:team:66", link_href(&document, "origin"));
    assert_eq!(
        vec![Urn::entity("user", 9)],
        document
            .metadata
            .links
            .get("resources")
            .unwrap()
            .hrefs()
            .unwrap()
            .to_vec()
    );

    assert_eq!(
        vec![("user".to_owned(), "http://user/9".to_owned())],
        queued(&queue)
    );
}

#[test]
fn pagination_preserves_relation_descriptor() {
    let (processor, _) = processor();
    let team = Urn::entity("team", 66);
    let relation = Relation::new("team", team.clone(), "team_members");
    let mut request = attach(
        Request::new("team_members", "http://team/66/members")
            .with_qualifier(team.clone())
            .with_relation(relation.clone()),
        json!({"elements": []}),
    );
    request.response = Some(FetchedResponse {
        status: 200,
        etag: None,
        link: Some(
            "<http://team/66/members?page=2>; rel=\"next\", \
             <http://team/66/members?page=3>; rel=\"last\""
                .to_owned(),
        ),
        body: Value::Null,
    });

    let (_, queue) = run(&processor, &mut request);

    let pages: Vec<&Request> = queue.at_priority(Priority::Soon).collect();
    assert_eq!(2, pages.len());
    for page in pages {
        assert_eq!("team_members", page.kind);
        assert_eq!(Some(&relation), page.context.relation.as_ref());
    }
}

#[test]
fn processed_documents_round_trip_through_the_store() {
    let (processor, store) = processor();
    let mut request = attach(Request::new("repo", "http://foo/repo/12"), repo_payload());
    let (document, _) = run(&processor, &mut request);

    let urn = store.upsert(&document).unwrap();
    assert_eq!("urn:repo:12", urn.as_str());

    let loaded = store.get("repo", "http://foo/repo/12").unwrap().unwrap();
    assert_eq!(document, loaded);
    assert_eq!(
        loaded.self_urn().map(Urn::to_string),
        Some("urn:repo:12".to_owned())
    );
}
