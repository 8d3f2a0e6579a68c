use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Each subscriber runs on its own worker task fed by a bounded queue, so a
/// slow subscriber never delays the supervisor or other subscribers. When the
/// queue is full the event is dropped for that subscriber only (warn).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in log lines about this subscriber.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        256
    }
}
