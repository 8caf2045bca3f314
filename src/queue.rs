//! Work queue contract.
//!
//! The processor only ever pushes: single follow-ups at `Normal` priority and
//! bulk page fan-outs at `Soon`. Delivery semantics (at-least-once, retry,
//! cross-request ordering) belong to the host; the in-process implementation
//! here backs the crawl binary and tests.

use crossbeam::channel::{self, Receiver, Sender};

use crate::request::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Immediate,
    Soon,
    Normal,
    Later,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Immediate,
        Priority::Soon,
        Priority::Normal,
        Priority::Later,
    ];

    fn index(self) -> usize {
        match self {
            Priority::Immediate => 0,
            Priority::Soon => 1,
            Priority::Normal => 2,
            Priority::Later => 3,
        }
    }
}

/// Where handlers enqueue follow-up work.
pub trait QueueSink {
    /// Single follow-up at default priority.
    fn queue(&mut self, request: Request) {
        self.push(vec![request], Priority::Normal);
    }

    /// Bulk enqueue at an explicit priority.
    fn push(&mut self, requests: Vec<Request>, priority: Priority);
}

/// Priority FIFOs backed by crossbeam channels, drained highest-priority
/// first.
pub struct InMemoryQueues {
    senders: [Sender<Request>; 4],
    receivers: [Receiver<Request>; 4],
}

impl InMemoryQueues {
    pub fn new() -> InMemoryQueues {
        let (i_tx, i_rx) = channel::unbounded();
        let (s_tx, s_rx) = channel::unbounded();
        let (n_tx, n_rx) = channel::unbounded();
        let (l_tx, l_rx) = channel::unbounded();
        InMemoryQueues {
            senders: [i_tx, s_tx, n_tx, l_tx],
            receivers: [i_rx, s_rx, n_rx, l_rx],
        }
    }

    /// A cloneable handle handlers can push into.
    pub fn sink(&self) -> QueueHandle {
        QueueHandle {
            senders: self.senders.clone(),
        }
    }

    /// The next request in priority order, or `None` when all queues are
    /// empty.
    pub fn pop(&self) -> Option<Request> {
        for receiver in &self.receivers {
            if let Ok(request) = receiver.try_recv() {
                return Some(request);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.receivers.iter().map(Receiver::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryQueues {
    fn default() -> InMemoryQueues {
        InMemoryQueues::new()
    }
}

#[derive(Clone)]
pub struct QueueHandle {
    senders: [Sender<Request>; 4],
}

impl QueueSink for QueueHandle {
    fn push(&mut self, requests: Vec<Request>, priority: Priority) {
        for request in requests {
            // Receivers outlive the handle inside InMemoryQueues; a closed
            // channel means the crawl is shutting down and the work is moot.
            if self.senders[priority.index()].send(request).is_err() {
                debug!("queue closed, dropping request");
            }
        }
    }
}

/// Records every push for inspection; used by tests and dry runs.
#[derive(Default)]
pub struct RecordingQueue {
    pub pushed: Vec<(Request, Priority)>,
}

impl RecordingQueue {
    pub fn new() -> RecordingQueue {
        RecordingQueue::default()
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.pushed.iter().map(|(request, _)| request)
    }

    pub fn at_priority(&self, priority: Priority) -> impl Iterator<Item = &Request> {
        self.pushed
            .iter()
            .filter(move |(_, p)| *p == priority)
            .map(|(request, _)| request)
    }
}

impl QueueSink for RecordingQueue {
    fn push(&mut self, requests: Vec<Request>, priority: Priority) {
        for request in requests {
            self.pushed.push((request, priority));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pop_respects_priority_order() {
        let queues = InMemoryQueues::new();
        let mut sink = queues.sink();
        sink.push(vec![Request::new("org", "http://org/1")], Priority::Later);
        sink.push(vec![Request::new("org", "http://org/2")], Priority::Soon);
        sink.queue(Request::new("org", "http://org/3"));

        assert_eq!("http://org/2", queues.pop().unwrap().url);
        assert_eq!("http://org/3", queues.pop().unwrap().url);
        assert_eq!("http://org/1", queues.pop().unwrap().url);
        assert!(queues.pop().is_none());
    }

    #[test]
    fn test_recording_queue_keeps_order_and_priority() {
        let mut queue = RecordingQueue::new();
        queue.queue(Request::new("user", "http://user/1"));
        queue.push(vec![Request::new("orgs", "http://orgs?page=2")], Priority::Soon);

        let urls: Vec<&str> = queue.requests().map(|r| r.url.as_str()).collect();
        assert_eq!(vec!["http://user/1", "http://orgs?page=2"], urls);
        assert_eq!(1, queue.at_priority(Priority::Soon).count());
    }
}
