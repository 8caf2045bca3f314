use std::sync::Arc;

use crate::ghc;
use crate::ghc::document::Document;
use crate::ghc::fetch::{FetchOutcome, Fetcher, GithubClient};
use crate::ghc::policy::{Fetch, TraversalPolicy};
use crate::ghc::processor::Processor;
use crate::ghc::queue::{InMemoryQueues, QueueSink};
use crate::ghc::request::Request;
use crate::ghc::store::{DocumentStore, MemoryStore, SnapshotStorage};

use chrono::Utc;

pub struct Crawler {
    client: GithubClient,
    store: Arc<MemoryStore>,
    processor: Processor,
    queues: InMemoryQueues,
}

impl Crawler {
    pub fn new() -> ghc::Result<Crawler> {
        let store = Arc::new(MemoryStore::new());
        let processor = Processor::new(store.clone());
        Ok(Crawler {
            client: GithubClient::new()?,
            store,
            processor,
            queues: InMemoryQueues::new(),
        })
    }

    /// Seed the queues and drain them until empty or until the request budget
    /// runs out. The snapshot, if given, is loaded before and written after.
    pub fn crawl(
        &self,
        kind: &str,
        seed_url: &str,
        policy: TraversalPolicy,
        snapshot: Option<&SnapshotStorage>,
        max_requests: usize,
    ) -> ghc::Result<()> {
        if let Some(snapshot) = snapshot {
            if let Some(documents) = snapshot.read()? {
                info!("restoring {} documents from {}", documents.len(), snapshot);
                self.store.restore(documents)?;
            }
        }

        let seed = Request::new(kind, seed_url).with_policy(policy);
        self.queues.sink().queue(seed);

        let mut handled = 0;
        while let Some(mut request) = self.queues.pop() {
            if handled >= max_requests {
                warn!(
                    "request budget ({}) exhausted with {} requests still queued",
                    max_requests,
                    self.queues.len() + 1
                );
                break;
            }
            handled += 1;

            if let Err(e) = self.step(&mut request) {
                error!("processing {} {} failed: {}", request.kind, request.url, e);
            }
        }
        info!("crawl done after {} requests", handled);

        if let Some(snapshot) = snapshot {
            let documents = self.store.documents()?;
            info!("writing {} documents to {}", documents.len(), snapshot);
            snapshot.write(&documents)?;
        }
        Ok(())
    }

    fn step(&self, request: &mut Request) -> ghc::Result<()> {
        debug!("processing {} {}", request.kind, request.url);

        if self.attach(request)? {
            let mut sink = self.queues.sink();
            if let Some(document) = self.processor.process(request, &mut sink)? {
                if document.self_urn().is_some() {
                    self.store.upsert(&document)?;
                }
            }
        }
        Ok(())
    }

    /// Attach a document to the request per its fetch policy. Returns false
    /// when there is nothing to process (stored copy still current, or no
    /// source at all).
    fn attach(&self, request: &mut Request) -> ghc::Result<bool> {
        // Event children arrive with their payload already attached.
        if request.document.is_some() {
            return Ok(true);
        }

        if request.policy.fetch == Fetch::None {
            debug!("no document and fetch policy 'none' for {}", request.url);
            return Ok(false);
        }

        if request.policy.fetch == Fetch::Storage {
            return match self.store.get(&request.kind, &request.url)? {
                Some(document) => {
                    request.document = Some(document);
                    Ok(true)
                }
                None => Ok(false),
            };
        }

        let prior_etag = self.store.etag(&request.kind, &request.url)?;
        match self.client.fetch(&request.url, prior_etag.as_deref())? {
            FetchOutcome::NotModified => {
                // Still reprocess the stored copy; the freshness gate decides
                // whether anything actually happens.
                request.document = self.store.get(&request.kind, &request.url)?;
                Ok(request.document.is_some())
            }
            FetchOutcome::Fetched(response) => {
                let mut document = Document::new(&request.kind, &request.url, response.body.clone());
                document.metadata.etag = response.etag.clone();
                document.metadata.fetched_at = Some(Utc::now());
                request.document = Some(document);
                request.response = Some(response);
                Ok(true)
            }
        }
    }
}
