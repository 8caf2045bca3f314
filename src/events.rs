//! Dedup filter over a page of activity events.
//!
//! Event feeds overlap between crawls, so before fanning a page out the
//! crawler drops every event the store has already seen. The store key is the
//! same URL the event's own document is later stored under.

use serde_json::Value;

use crate::github::EventEnvelope;
use crate::store::{DocumentStore, StoreError};

const LOOKUP_THREADS: usize = 8;

/// Store key for an individual event document.
pub fn event_document_url(repo_url: &str, id: &str) -> String {
    format!("{}/events/{}", repo_url, id)
}

fn event_key(event: &Value) -> Option<(String, String)> {
    let envelope: EventEnvelope = serde_json::from_value(event.clone()).ok()?;
    let kind = envelope.kind?;
    let repo_url = envelope.repo.and_then(|r| r.url)?;
    Some((kind, event_document_url(&repo_url, &envelope.id)))
}

/// The subset of `events` not yet present in the store, input order
/// preserved. Events without a usable key are passed through as new; the
/// handler decides what to do with them. Store lookups fan out across a
/// small pool of threads; any store failure aborts the whole page.
pub fn find_new(events: Vec<Value>, store: &dyn DocumentStore) -> Result<Vec<Value>, StoreError> {
    if events.is_empty() {
        return Ok(events);
    }

    let keys: Vec<Option<(String, String)>> = events.iter().map(event_key).collect();
    let workers = LOOKUP_THREADS.min(events.len());

    let seen = crossbeam::thread::scope(|scope| -> Result<Vec<bool>, StoreError> {
        let keys = &keys;
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                scope.spawn(move |_| {
                    let mut hits = Vec::new();
                    for (i, key) in keys.iter().enumerate().skip(worker).step_by(workers) {
                        let hit = match key {
                            Some((kind, url)) => store.get(kind, url)?.is_some(),
                            None => false,
                        };
                        hits.push((i, hit));
                    }
                    Ok::<_, StoreError>(hits)
                })
            })
            .collect();

        let mut seen = vec![false; keys.len()];
        for handle in handles {
            let hits = handle
                .join()
                .map_err(|_| StoreError::Unavailable("event lookup worker panicked".to_owned()))??;
            for (i, hit) in hits {
                seen[i] = hit;
            }
        }
        Ok(seen)
    })
    .map_err(|_| StoreError::Unavailable("event lookup scope panicked".to_owned()))??;

    let fresh = events
        .into_iter()
        .zip(&seen)
        .filter(|(_, seen)| !**seen)
        .map(|(event, _)| event)
        .collect();
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::store::MemoryStore;
    use crate::urn::Urn;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(id: u64) -> Value {
        json!({
            "id": id,
            "type": "PushEvent",
            "repo": {"id": 4, "url": "http://repo/4"},
        })
    }

    fn stored_event(store: &MemoryStore, id: u64) {
        let url = event_document_url("http://repo/4", &id.to_string());
        let mut doc = Document::new("PushEvent", &url, event(id));
        doc.metadata.links.add_self_and_siblings(
            Urn::entity("repo", 4).child("PushEvent", id),
            Urn::entity("repo", 4).collection("events"),
        );
        store.upsert(&doc).unwrap();
    }

    #[test]
    fn test_find_new_drops_seen_events_in_order() {
        let store = MemoryStore::new();
        stored_event(&store, 3);
        stored_event(&store, 4);

        let page: Vec<Value> = (0..20).map(event).collect();
        let fresh = find_new(page, &store).unwrap();

        assert_eq!(18, fresh.len());
        let ids: Vec<u64> = fresh.iter().map(|e| e["id"].as_u64().unwrap()).collect();
        assert!(!ids.contains(&3));
        assert!(!ids.contains(&4));
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids, "input order preserved");
    }

    #[test]
    fn test_find_new_passes_keyless_events_through() {
        let store = MemoryStore::new();
        let page = vec![json!({"id": 1, "type": "PushEvent"})];
        assert_eq!(1, find_new(page, &store).unwrap().len());
    }

    #[test]
    fn test_find_new_empty_page() {
        let store = MemoryStore::new();
        assert!(find_new(Vec::new(), &store).unwrap().is_empty());
    }
}
