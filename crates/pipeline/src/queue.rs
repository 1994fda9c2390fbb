//! Transcript queue with backpressure
//!
//! Bounded FIFO holding only finalized utterances. The STT event task
//! enqueues, the processing loop dequeues; both go through the internal
//! lock. Enqueueing at capacity rejects instead of blocking — the caller
//! tells the client it is busy and the user is expected to re-speak.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

use voicebridge_core::TranscriptEntry;

/// Result of an enqueue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Entry accepted. `nearing_capacity` is set once depth reaches the
    /// load-notice threshold (⌈0.8·capacity⌉) so the client can surface
    /// saturation before outright rejection.
    Accepted {
        depth: usize,
        nearing_capacity: bool,
    },
    /// Queue full; the entry was dropped.
    Rejected,
}

/// Bounded FIFO of finalized transcripts.
pub struct TranscriptQueue {
    entries: Mutex<VecDeque<TranscriptEntry>>,
    capacity: usize,
    notify: Notify,
}

impl TranscriptQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Depth at which accepted enqueues start carrying the load notice.
    pub fn load_notice_threshold(&self) -> usize {
        (self.capacity * 4).div_ceil(5)
    }

    /// Attempt to enqueue a finalized transcript. Never blocks.
    pub fn enqueue(&self, entry: TranscriptEntry) -> EnqueueOutcome {
        let depth = {
            let mut entries = self.entries.lock();
            if entries.len() >= self.capacity {
                return EnqueueOutcome::Rejected;
            }
            entries.push_back(entry);
            entries.len()
        };
        self.notify.notify_one();
        EnqueueOutcome::Accepted {
            depth,
            nearing_capacity: depth >= self.load_notice_threshold(),
        }
    }

    /// Pop the oldest entry if one is present.
    pub fn try_dequeue(&self) -> Option<TranscriptEntry> {
        self.entries.lock().pop_front()
    }

    /// Wait for the oldest entry. Strictly FIFO; single consumer.
    pub async fn dequeue(&self) -> TranscriptEntry {
        loop {
            if let Some(entry) = self.try_dequeue() {
                return entry;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> TranscriptEntry {
        TranscriptEntry::new(text)
    }

    #[test]
    fn test_rejects_beyond_capacity() {
        let queue = TranscriptQueue::new(5);
        for i in 0..5 {
            assert!(matches!(
                queue.enqueue(entry(&format!("utterance {i}"))),
                EnqueueOutcome::Accepted { .. }
            ));
        }
        assert_eq!(queue.enqueue(entry("one too many")), EnqueueOutcome::Rejected);
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_strict_fifo_order() {
        let queue = TranscriptQueue::new(5);
        queue.enqueue(entry("a"));
        queue.enqueue(entry("b"));
        queue.enqueue(entry("c"));

        assert_eq!(queue.try_dequeue().unwrap().text, "a");
        assert_eq!(queue.try_dequeue().unwrap().text, "b");
        assert_eq!(queue.try_dequeue().unwrap().text, "c");
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_load_notice_at_eighty_percent() {
        let queue = TranscriptQueue::new(5);
        assert_eq!(queue.load_notice_threshold(), 4);

        for expected_notice in [false, false, false, true, true] {
            match queue.enqueue(entry("x")) {
                EnqueueOutcome::Accepted {
                    nearing_capacity, ..
                } => assert_eq!(nearing_capacity, expected_notice),
                EnqueueOutcome::Rejected => panic!("unexpected rejection"),
            }
        }
    }

    #[test]
    fn test_capacity_frees_after_dequeue() {
        let queue = TranscriptQueue::new(1);
        queue.enqueue(entry("a"));
        assert_eq!(queue.enqueue(entry("b")), EnqueueOutcome::Rejected);

        queue.try_dequeue().unwrap();
        assert!(matches!(
            queue.enqueue(entry("b")),
            EnqueueOutcome::Accepted { .. }
        ));
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(TranscriptQueue::new(5));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::task::yield_now().await;
        queue.enqueue(entry("wake up"));

        let got = consumer.await.unwrap();
        assert_eq!(got.text, "wake up");
    }
}
