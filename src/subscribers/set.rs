//! # SubscriberSet: non-blocking fan-out.
//!
//! - `emit(&Event)` returns immediately; per-subscriber order is FIFO.
//! - A panicking subscriber is logged and keeps receiving later events.
//! - No ordering across subscribers, no retry on overflow.
//!
//! ```text
//!    emit(&Event)
//!        │                 (Arc-clone per subscriber)
//!        ├──────► [queue S1] ─► worker S1 ─► on_event()
//!        └──────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Subscribe;
use crate::events::Event;

struct Queue {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Subscribers with one bounded queue and one worker each.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Requires a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                        .catch_unwind()
                        .await;
                    if handled.is_err() {
                        tracing::error!(subscriber = name, kind = ev.kind.as_str(), "subscriber panicked");
                    }
                }
            }));
            queues.push(Queue { name, sender: tx });
        }

        Self { queues, workers }
    }

    /// Queues `event` for every subscriber without waiting.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for queue in &self.queues {
            match queue.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = queue.name, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(subscriber = queue.name, "event dropped: worker closed");
                }
            }
        }
    }

    /// Closes all queues and waits until every queued event was handled.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }
}
