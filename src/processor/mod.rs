//! Handler dispatch.
//!
//! The processor owns the registry mapping request types to handlers, gates
//! reprocessing on the policy's freshness axis, stamps processed documents
//! with its version, and fans remaining collection pages out in one bulk
//! push. Handlers themselves never perform I/O; the one sanctioned store
//! read inside the core is the event-page dedup lookup.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use fnv::{FnvHashMap, FnvHashSet};
use serde::de::DeserializeOwned;

use crate::document::{Document, Links};
use crate::pagination;
use crate::policy::{EdgeRole, Freshness};
use crate::queue::{Priority, QueueSink};
use crate::request::{Relation, Request};
use crate::store::{DocumentStore, StoreError};
use crate::urn::Urn;

mod collections;
mod entities;
mod events;

/// Bumped whenever handler output changes shape; stored documents with an
/// older stamp are reprocessed under `Freshness::Version`.
pub const PROCESSOR_VERSION: u32 = 11;

type Handler = fn(&mut HandlerCx<'_>) -> Result<(), StoreError>;

/// Everything a handler may touch: the request for context, the document to
/// mutate, the queue to enqueue follow-ups into, and the store (event dedup
/// only).
pub struct HandlerCx<'a> {
    pub request: &'a Request,
    pub document: &'a mut Document,
    pub store: &'a dyn DocumentStore,
    pub queue: &'a mut dyn QueueSink,
}

impl HandlerCx<'_> {
    /// Decode the payload into a typed view. A payload that does not fit is
    /// logged and treated as absent; the handler returns the document
    /// untouched.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        match serde_json::from_value(self.document.body.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(
                    "malformed '{}' payload at {}: {}",
                    self.request.kind, self.request.url, e
                );
                None
            }
        }
    }

    pub fn qualifier(&self) -> Option<Urn> {
        self.request.context.qualifier.clone()
    }

    pub fn links(&mut self) -> &mut Links {
        &mut self.document.metadata.links
    }

    /// Singleton outbound edge: link it, and enqueue the referenced entity
    /// when its URL is known.
    pub fn resource(&mut self, role: &str, urn: Urn, kind: &str, url: Option<&str>) {
        self.links().add_resource(role, urn);
        if let Some(url) = url {
            let child = self.request.child(kind, url, EdgeRole::Resource);
            self.queue.queue(child);
        }
    }

    /// Child collection owned by `owner`: link it and enqueue its first page.
    pub fn collection(&mut self, name: &str, owner: &Urn, url: Option<&str>) {
        self.links().add_collection(name, owner.collection(name));
        if let Some(url) = url {
            let mut child = self.request.child(name, url, EdgeRole::CollectionPage);
            child.context.qualifier = Some(owner.clone());
            self.queue.queue(child);
        }
    }

    /// Like `resource`, but the child is named under `scope` rather than the
    /// current request's qualifier. Event payload entities use this: the
    /// event itself has no qualifier, its repo scope does.
    pub fn scoped_resource(
        &mut self,
        role: &str,
        urn: Urn,
        kind: &str,
        url: Option<&str>,
        scope: &Urn,
    ) {
        self.links().add_resource(role, urn);
        if let Some(url) = url {
            let mut child = self.request.child(kind, url, EdgeRole::Resource);
            child.context.qualifier = Some(scope.clone());
            self.queue.queue(child);
        }
    }

    /// Many-to-many edge: link the paged relation and enqueue its first page
    /// with a relation descriptor so the page handler can emit back-links.
    pub fn relation(&mut self, origin: &str, name: &str, owner: &Urn, url: Option<&str>) {
        self.links().add_relation(name, owner.relation(name));
        if let Some(url) = url {
            let mut child = self.request.child(name, url, EdgeRole::CollectionPage);
            child.context.qualifier = Some(owner.clone());
            child.context.relation = Some(Relation::new(origin, owner.clone(), name));
            self.queue.queue(child);
        }
    }
}

pub struct Processor {
    version: u32,
    store: Arc<dyn DocumentStore>,
    handlers: FnvHashMap<&'static str, Handler>,
    unknown_logged: Mutex<FnvHashSet<String>>,
}

impl Processor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Processor {
        Processor::with_version(store, PROCESSOR_VERSION)
    }

    pub fn with_version(store: Arc<dyn DocumentStore>, version: u32) -> Processor {
        let mut handlers: FnvHashMap<&'static str, Handler> = FnvHashMap::default();

        handlers.insert("org", entities::org);
        handlers.insert("user", entities::user);
        handlers.insert("repo", entities::repo);
        handlers.insert("team", entities::team);
        handlers.insert("commit", entities::commit);
        handlers.insert("pull_request", entities::pull_request);
        handlers.insert("issue", entities::issue);
        handlers.insert("review_comment", entities::review_comment);
        handlers.insert("issue_comment", entities::issue_comment);
        handlers.insert("commit_comment", entities::commit_comment);
        handlers.insert("deployment", entities::deployment);
        handlers.insert("status", entities::status);

        for spec in collections::SPECS {
            handlers.insert(spec.name, collections::page);
        }
        for event_type in events::EVENT_TYPES.iter().copied() {
            handlers.insert(event_type, events::event);
        }

        Processor {
            version,
            store,
            handlers,
            unknown_logged: Mutex::new(FnvHashSet::default()),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether this processor has a handler registered for the type at all.
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Freshness gate plus registry lookup. `false` means the request is left
    /// exactly as it arrived: no mutation, no enqueues.
    pub fn can_handle(&self, request: &Request) -> Result<bool, StoreError> {
        if !self.handles(&request.kind) {
            if let Ok(mut logged) = self.unknown_logged.lock() {
                if logged.insert(request.kind.clone()) {
                    warn!("no handler registered for request type '{}'", request.kind);
                }
            }
            return Ok(false);
        }

        match request.policy.freshness {
            Freshness::Always => Ok(true),
            Freshness::Match => {
                let fetched = request
                    .response
                    .as_ref()
                    .and_then(|r| r.etag.as_deref())
                    .or_else(|| {
                        request
                            .document
                            .as_ref()
                            .and_then(|d| d.metadata.etag.as_deref())
                    });
                let stored = self.store.etag(&request.kind, &request.url)?;
                match (stored, fetched) {
                    (Some(stored), Some(fetched)) if stored == fetched => Ok(false),
                    _ => Ok(true),
                }
            }
            Freshness::Version | Freshness::Mutables => {
                let stored_version = match request.document.as_ref().and_then(|d| d.metadata.version)
                {
                    Some(version) => Some(version),
                    None => self
                        .store
                        .get(&request.kind, &request.url)?
                        .and_then(|d| d.metadata.version),
                };
                match stored_version {
                    Some(stored) if stored > self.version => {
                        warn!(
                            "document at {} carries version {} from a newer processor (this is {})",
                            request.url, stored, self.version
                        );
                        Ok(false)
                    }
                    Some(stored) if stored == self.version => Ok(false),
                    _ => Ok(true),
                }
            }
        }
    }

    /// Transform the request's document and enqueue discovered work. Returns
    /// the document for upsert; a gated or handler-less request comes back
    /// unchanged. Only store I/O can fail.
    pub fn process(
        &self,
        request: &mut Request,
        queue: &mut dyn QueueSink,
    ) -> Result<Option<Document>, StoreError> {
        if !self.can_handle(request)? {
            return Ok(request.document.clone());
        }

        // can_handle verified the registry entry exists.
        let handler = match self.handlers.get(request.kind.as_str()) {
            Some(handler) => *handler,
            None => return Ok(request.document.clone()),
        };

        let mut document = match request.document.take() {
            Some(document) => document,
            None => {
                warn!(
                    "no document attached to '{}' request for {}",
                    request.kind, request.url
                );
                return Ok(None);
            }
        };

        let result = {
            let mut cx = HandlerCx {
                request: &*request,
                document: &mut document,
                store: self.store.as_ref(),
                queue: &mut *queue,
            };
            handler(&mut cx)
        };

        if let Err(e) = result {
            request.document = Some(document);
            return Err(e);
        }

        document.metadata.version = Some(self.version);
        document.metadata.processed_at = Some(Utc::now());
        request.document = Some(document);

        self.queue_remaining_pages(request, queue);

        Ok(request.document.clone())
    }

    /// Bulk-push the remaining pages of a paginated response, each typed like
    /// the parent and prioritized `Soon`. An unparseable header means no next
    /// page.
    fn queue_remaining_pages(&self, request: &Request, queue: &mut dyn QueueSink) {
        let link_header = match request.response.as_ref().and_then(|r| r.link.as_deref()) {
            Some(header) => header,
            None => return,
        };

        match pagination::remaining_pages(&request.url, link_header) {
            Ok(pages) if !pages.is_empty() => {
                let children = pages
                    .iter()
                    .map(|url| {
                        let mut child =
                            request.child(&request.kind, url, EdgeRole::CollectionPage);
                        // Later pages of a relation are still relation pages.
                        child.context.relation = request.context.relation.clone();
                        child
                    })
                    .collect();
                queue.push(children, Priority::Soon);
            }
            Ok(_) => (),
            Err(e) => warn!("unparseable link header on {}: {}", request.url, e),
        }
    }
}
