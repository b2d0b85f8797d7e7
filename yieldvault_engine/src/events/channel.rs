//! Simple stateless pub-sub event plumbing.
//!
//! Components subscribe to engine events (position activated, instructions composed) and react to
//! them without any access to engine internals — all a handler receives is the event itself.
//! Publishing is fire-and-forget: a slow or failing handler can never block or fail the
//! reconciliation commit that produced the event.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Run the dispatch loop until every subscribed producer has been dropped, then drain any
    /// in-flight handler jobs before returning.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Drop the internal sender so the loop ends automatically once the last subscribed
        // producer goes away.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.receiver.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            // Reap whatever has already finished so the set stays small.
            while let Some(done) = jobs.try_join_next() {
                if let Err(e) = done {
                    warn!("📬️ An event handler job failed: {e}");
                }
            }
        }
        debug!("📬️ Event channel closed. Waiting for {} in-flight jobs", jobs.len());
        while let Some(done) = jobs.join_next().await {
            if let Err(e) = done {
                warn!("📬️ An event handler job failed during shutdown: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn events_fan_in_from_multiple_producers() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler = Arc::new(move |v| {
            let count = count.clone();
            Box::pin(async move {
                debug!("Handler received {v}");
                let _ = count.fetch_add(v, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(1, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5 {
                producer_1.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5 {
                producer_2.publish_event(i * 2).await;
            }
        });

        event_handler.start_handler().await;
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }
}
