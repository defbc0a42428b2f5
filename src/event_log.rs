//! Tracing subscriber for both event channels

use albrt_core::{ManagerEvent, PropertyEvent, Subscriber};
use tracing::{debug, error, info};

/// Logs every event it sees. Subscribed by the manager at start and removed
/// while stopping.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventLogger;

impl Subscriber<PropertyEvent> for EventLogger {
    fn on_event(&self, event: &PropertyEvent) {
        match event {
            PropertyEvent::Dirty(change) => {
                debug!(property = %change.property, old = ?change.old, new = ?change.new, "config dirty")
            }
            PropertyEvent::Cleared { property, value } => {
                debug!(%property, ?value, "config cleared")
            }
            PropertyEvent::Init {
                filter,
                property,
                value,
            } => debug!(%filter, %property, ?value, "config init"),
        }
    }
}

impl Subscriber<ManagerEvent> for EventLogger {
    fn on_event(&self, event: &ManagerEvent) {
        match event {
            ManagerEvent::Error {
                code,
                error,
                solution,
            } => error!(%code, %error, %solution, "startup failed"),
            other => info!(event = ?other, "lifecycle"),
        }
    }
}
