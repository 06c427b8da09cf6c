use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::models::ProgressEvent;

/// Identifies one subscriber of one job's event channel.
pub type SubscriptionId = u64;

#[derive(Default)]
struct BusInner {
    next_id: SubscriptionId,
    subscribers: HashMap<String, Vec<(SubscriptionId, mpsc::UnboundedSender<ProgressEvent>)>>,
}

/// In-memory fan-out of per-job progress events to live subscribers.
///
/// No persistence, no replay: events published while nobody listens are
/// dropped. Delivery to a single subscriber preserves publish order;
/// nothing is guaranteed across jobs or across subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, job_id: &str) -> Subscription {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        inner
            .subscribers
            .entry(job_id.to_string())
            .or_default()
            .push((id, tx));

        Subscription {
            job_id: job_id.to_string(),
            id,
            rx,
            bus: self.clone(),
        }
    }

    /// Remove a subscriber. Safe to call for a handle that is already gone.
    pub async fn unsubscribe(&self, job_id: &str, id: SubscriptionId) {
        let mut inner = self.inner.lock().await;
        if let Some(subs) = inner.subscribers.get_mut(job_id) {
            subs.retain(|(sub_id, _)| *sub_id != id);
            if subs.is_empty() {
                inner.subscribers.remove(job_id);
            }
        }
    }

    /// Deliver an event to every live subscriber of the job. Subscribers
    /// whose channel has closed are pruned on the way.
    pub async fn publish(&self, job_id: &str, event: ProgressEvent) {
        let mut inner = self.inner.lock().await;
        let Some(subs) = inner.subscribers.get_mut(job_id) else {
            debug!(job_id = %job_id, status = %event.status, "No subscribers; progress event dropped");
            return;
        };

        subs.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        if subs.is_empty() {
            inner.subscribers.remove(job_id);
        }
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self, job_id: &str) -> usize {
        self.inner
            .lock()
            .await
            .subscribers
            .get(job_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// One live per-job event channel. Unsubscribes itself when dropped, so a
/// disconnecting stream handler always tears its registration down.
pub struct Subscription {
    job_id: String,
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    bus: EventBus,
}

impl Subscription {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // A subscription can outlive the runtime during shutdown; the bus
        // dies with the process then, so skipping the unsubscribe is fine.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let bus = self.bus.clone();
        let job_id = self.job_id.clone();
        let id = self.id;
        handle.spawn(async move {
            bus.unsubscribe(&job_id, id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("job-1").await;

        for status in [
            JobStatus::Processing,
            JobStatus::Extracting,
            JobStatus::Validating,
            JobStatus::Done,
        ] {
            bus.publish("job-1", ProgressEvent::new(status, status.to_string()))
                .await;
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(sub.recv().await.unwrap().progress_percent);
        }
        assert_eq!(seen, vec![20, 55, 80, 100]);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe("job-1").await;
        let mut b = bus.subscribe("job-1").await;

        bus.publish("job-1", ProgressEvent::new(JobStatus::Done, "ocr complete"))
            .await;

        assert_eq!(a.recv().await.unwrap().message, "ocr complete");
        assert_eq!(b.recv().await.unwrap().message, "ocr complete");
    }

    #[tokio::test]
    async fn events_are_scoped_to_their_job() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("job-1").await;

        bus.publish("job-2", ProgressEvent::new(JobStatus::Done, "other job"))
            .await;
        bus.publish("job-1", ProgressEvent::new(JobStatus::Done, "mine"))
            .await;

        assert_eq!(sub.recv().await.unwrap().message, "mine");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_silent_drop() {
        let bus = EventBus::new();
        bus.publish("job-1", ProgressEvent::new(JobStatus::Done, "nobody listening"))
            .await;

        // A late subscriber sees no backlog.
        let mut sub = bus.subscribe("job-1").await;
        bus.publish("job-1", ProgressEvent::new(JobStatus::Done, "live"))
            .await;
        assert_eq!(sub.recv().await.unwrap().message, "live");
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.subscribe("job-1").await;
        let (job_id, id) = (sub.job_id().to_string(), sub.id());

        bus.unsubscribe(&job_id, id).await;
        bus.unsubscribe(&job_id, id).await;
        assert_eq!(bus.subscriber_count(&job_id).await, 0);
    }

    #[tokio::test]
    async fn dropping_a_subscription_unregisters_it() {
        let bus = EventBus::new();
        let sub = bus.subscribe("job-1").await;
        assert_eq!(bus.subscriber_count("job-1").await, 1);

        drop(sub);
        // Drop unsubscribes via a spawned task; give it a tick.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(bus.subscriber_count("job-1").await, 0);
    }

    #[test]
    fn dropping_a_subscription_outside_a_runtime_does_not_panic() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let bus = EventBus::new();
        let sub = rt.block_on(bus.subscribe("job-1"));

        drop(rt);
        drop(sub);
    }
}
