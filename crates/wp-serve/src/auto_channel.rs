//! Opens a channel for every new check-in notification without waiting for a
//! dispatcher. Off unless `auto_create_channels` is set.

use crate::AppState;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wp_core::RequestContext;
use wp_core::types::{ChannelRequest, EventBody};
use wp_events::EventRecord;

pub const ACTOR: &str = "system:auto-channel";

/// Subscribes before returning, so nothing published after this call is missed.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let mut receiver = state.event_bus().subscribe_all();
    tokio::spawn(async move {
        info!("auto channel creation enabled");
        loop {
            match receiver.recv().await {
                Ok(record) => handle(&state, record).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auto channel rule lagged; skipped check-ins stay actionable");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn handle(state: &AppState, record: EventRecord) {
    // Fan-out repeats the record once per group; act on the primary group's copy.
    if record.topic != state.engine.config().primary_recipient_group() {
        return;
    }
    let notification = match serde_json::from_value::<EventBody>(record.body) {
        Ok(EventBody::CheckinRequested(notification)) => notification,
        Ok(_) => return,
        Err(err) => {
            debug!(error = %err, "ignoring undecodable live record");
            return;
        }
    };

    let mut ctx = RequestContext::system(ACTOR);
    ctx.correlation_id = record.correlation_id;
    let request = ChannelRequest::Notification {
        notification_id: notification.id.clone(),
    };
    match state.engine.channels().create(&ctx, request).await {
        Ok(channel) => info!(
            notification_id = %notification.id,
            channel_id = %channel.id,
            "auto-created channel"
        ),
        Err(err) => error!(
            notification_id = %notification.id,
            error = %err,
            "auto channel creation failed; notification stays actionable"
        ),
    }
}
