use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use super::context::Context;
use crate::events::Event;
use crate::subscribers::SubscriberSet;

/// Applies connection events until disposal, then drains the subscribers.
pub(super) async fn listen(ctx: Arc<Context>, mut rx: broadcast::Receiver<Event>, subs: SubscriberSet) {
    loop {
        let received = tokio::select! {
            biased;
            _ = ctx.disposing.cancelled() => break,
            r = rx.recv() => r,
        };
        match received {
            Ok(ev) => ctx.on_event(&subs, ev),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "supervisor listener lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    subs.shutdown().await;
}
