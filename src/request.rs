//! The unit of crawl work.
//!
//! A request carries everything the processor needs: the entity type expected
//! of the payload, the (template-stripped) URL, the traversal policy, and a
//! context with the URN qualifier for subordinate entities plus an optional
//! relation descriptor. The fetch layer attaches `document` and `response`
//! before dispatch.

use regex::Regex;
use uuid::Uuid;

use crate::document::Document;
use crate::fetch::FetchedResponse;
use crate::policy::{EdgeRole, TraversalPolicy};
use crate::urn::Urn;

/// Describes a many-to-many edge to the relation page that will crawl it, so
/// the page handler can emit back-links into the origin entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Type of the emitting entity (`repo`, `team`, ...).
    pub origin: String,
    /// URN of the emitting entity.
    pub qualifier: Urn,
    /// Name of the relation collection (`teams`, `team_members`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque correlation id, freshly generated per enqueue.
    pub guid: String,
}

impl Relation {
    pub fn new(origin: &str, qualifier: Urn, kind: &str) -> Relation {
        Relation {
            origin: origin.to_owned(),
            qualifier,
            kind: kind.to_owned(),
            guid: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// URN prefix under which subordinate entities are named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Urn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub policy: TraversalPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip)]
    pub response: Option<FetchedResponse>,
}

impl Request {
    pub fn new(kind: &str, url: &str) -> Request {
        Request {
            kind: kind.to_owned(),
            url: strip_templates(url),
            context: Context::default(),
            policy: TraversalPolicy::default(),
            document: None,
            response: None,
        }
    }

    pub fn with_policy(mut self, policy: TraversalPolicy) -> Request {
        self.policy = policy;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Urn) -> Request {
        self.context.qualifier = Some(qualifier);
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Request {
        self.context.relation = Some(relation);
        self
    }

    pub fn with_document(mut self, document: Document) -> Request {
        self.document = Some(document);
        self
    }

    /// Follow-up request over an edge of the given role. The child inherits
    /// this request's qualifier and the policy the transition table assigns;
    /// URI Template variables are stripped from the URL.
    pub fn child(&self, kind: &str, url: &str, role: EdgeRole) -> Request {
        Request {
            kind: kind.to_owned(),
            url: strip_templates(url),
            context: Context {
                qualifier: self.context.qualifier.clone(),
                relation: None,
            },
            policy: self.policy.child_for(role),
            document: None,
            response: None,
        }
    }
}

/// Remove RFC 6570 template groups from a GitHub hypermedia URL
/// (`http://x{/y}` → `http://x`).
pub fn strip_templates(url: &str) -> String {
    lazy_static! {
        static ref TEMPLATE: Regex = Regex::new(r"\{[^}]*\}").unwrap();
    }

    TEMPLATE.replace_all(url, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Fetch, Freshness, Transitivity};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_templates() {
        assert_eq!("http://x", strip_templates("http://x{/y}"));
        assert_eq!(
            "http://commits",
            strip_templates("http://commits{/sha}")
        );
        assert_eq!(
            "http://api/search?q=1",
            strip_templates("http://api/search{?page,per_page}?q=1")
        );
        assert_eq!("http://plain", strip_templates("http://plain"));
    }

    #[test]
    fn test_child_inherits_qualifier_and_policy() {
        let parent = Request::new("repo", "http://foo/repo/12")
            .with_policy(TraversalPolicy::new(
                Transitivity::DeepShallow,
                Freshness::Match,
                Fetch::OriginStorage,
            ))
            .with_qualifier(Urn::entity("repo", 12));

        let child = parent.child("user", "http://user/45", EdgeRole::Resource);
        assert_eq!("user", child.kind);
        assert_eq!(Transitivity::Shallow, child.policy.transitivity);
        assert_eq!(Some(Urn::entity("repo", 12)), child.context.qualifier);
        assert_eq!(None, child.context.relation);
    }

    #[test]
    fn test_relation_guids_are_fresh() {
        let a = Relation::new("repo", Urn::entity("repo", 12), "teams");
        let b = Relation::new("repo", Urn::entity("repo", 12), "teams");
        assert!(!a.guid.is_empty());
        assert_ne!(a.guid, b.guid);
    }
}
