//! Canonical document model.
//!
//! A document is the fetched GitHub payload plus a `_metadata` block holding
//! the entity type, the canonical source URL, the typed link map, and the
//! processor's version/timestamp stamps. The payload itself stays an opaque
//! JSON object; handlers decode the fields they need through the typed models
//! in `crate::github`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::urn::Urn;

/// A typed link entry on `_metadata.links`.
///
/// `resource` is a singleton outbound edge, `collection` a child collection
/// fully enumerated under the qualifier, and `relation` a many-to-many edge
/// whose URN carries the `pages:*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Link {
    Resource(LinkTarget),
    Collection(LinkTarget),
    Relation(LinkTarget),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkTarget {
    One { href: Urn },
    Many { hrefs: Vec<Urn> },
}

impl Link {
    pub fn href(&self) -> Option<&Urn> {
        match self.target() {
            LinkTarget::One { href } => Some(href),
            LinkTarget::Many { .. } => None,
        }
    }

    pub fn hrefs(&self) -> Option<&[Urn]> {
        match self.target() {
            LinkTarget::One { .. } => None,
            LinkTarget::Many { hrefs } => Some(hrefs),
        }
    }

    fn target(&self) -> &LinkTarget {
        match self {
            Link::Resource(t) | Link::Collection(t) | Link::Relation(t) => t,
        }
    }
}

/// Role → link map. Writes are idempotent at the role level: a later write
/// for the same role overwrites the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(BTreeMap<String, Link>);

impl Links {
    pub fn add_resource(&mut self, role: &str, href: Urn) {
        self.0
            .insert(role.to_owned(), Link::Resource(LinkTarget::One { href }));
    }

    /// Resource link carrying several targets (labels, assignees).
    pub fn add_resource_list(&mut self, role: &str, hrefs: Vec<Urn>) {
        self.0
            .insert(role.to_owned(), Link::Resource(LinkTarget::Many { hrefs }));
    }

    pub fn add_collection(&mut self, role: &str, href: Urn) {
        self.0
            .insert(role.to_owned(), Link::Collection(LinkTarget::One { href }));
    }

    pub fn add_relation(&mut self, role: &str, href: Urn) {
        self.0
            .insert(role.to_owned(), Link::Relation(LinkTarget::One { href }));
    }

    /// Conventional shorthand: every handler opens with this pair.
    pub fn add_self_and_siblings(&mut self, self_urn: Urn, siblings: Urn) {
        self.add_resource("self", self_urn);
        self.add_collection("siblings", siblings);
    }

    pub fn get(&self, role: &str) -> Option<&Link> {
        self.0.get(role)
    }

    pub fn self_href(&self) -> Option<&Urn> {
        self.get("self").and_then(Link::href)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains_key(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Link)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(rename = "type")]
    pub kind: String,
    /// Canonical source URL, GitHub API form.
    pub url: String,
    #[serde(default)]
    pub links: Links,
    /// Stamped by the processor; monotonic per type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl Metadata {
    pub fn new(kind: &str, url: &str) -> Metadata {
        Metadata {
            kind: kind.to_owned(),
            url: url.to_owned(),
            links: Links::default(),
            version: None,
            etag: None,
            fetched_at: None,
            processed_at: None,
            extra: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_metadata")]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub body: Value,
}

impl Document {
    pub fn new(kind: &str, url: &str, body: Value) -> Document {
        Document {
            metadata: Metadata::new(kind, url),
            body,
        }
    }

    /// The document's own URN, once a handler has linked it.
    pub fn self_urn(&self) -> Option<&Urn> {
        self.metadata.links.self_href()
    }
}
