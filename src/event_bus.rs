use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Broadcast bus with a bounded replay history. Publishing is synchronous so
/// that state transitions and classification can emit events without
/// suspending; only subscription is async.
#[derive(Clone)]
pub struct EventBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    history: Arc<Mutex<VecDeque<T>>>,
    tx: broadcast::Sender<T>,
    history_limit: usize,
}

impl<T> EventBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            history: Arc::new(Mutex::new(VecDeque::new())),
            tx,
            history_limit,
        }
    }

    /// Adds the event to history, removing old events if over the history
    /// limit, then sends the event on the channel.
    pub fn publish(&self, event: T) {
        {
            let mut hist = self.history.lock().expect("event history poisoned");
            hist.push_back(event.clone());

            if hist.len() > self.history_limit {
                hist.pop_front();
            }
        }

        let _ = self.tx.send(event);
    }

    /// Returns a stream that yields all events in history, then all future
    /// events until the channel is closed.
    pub fn subscribe(&self) -> Pin<Box<impl Stream<Item = T> + Send + '_>> {
        let history_snapshot = {
            let history_guard = self.history.lock().expect("event history poisoned");
            history_guard.clone()
        };

        let mut rx = self.tx.subscribe();

        let stream = async_stream::stream! {
            for event in history_snapshot {
                yield event;
            }

            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // the bus only feeds the embedding UI, so a skipped
                        // event is harmless and we can continue
                        println!("Subscriber lagged, needed to skip {n} events");
                        continue;
                    }
                }
            }
        };

        Box::pin(stream)
    }
}
