use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Topic that every subscription receives regardless of its recipient group.
pub const BROADCAST_TOPIC: &str = "*";

/// Topic for engine-internal records no UI session subscribes to.
pub const SYSTEM_TOPIC: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EventRecord {
    pub id: String,
    pub seq: i64,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: EventSource,
    /// Recipient group this record is addressed to, or [`BROADCAST_TOPIC`].
    pub topic: String,
    pub body: Value,
}

impl EventRecord {
    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    pub fn is_for(&self, topic: &str) -> bool {
        self.topic == topic || self.topic == BROADCAST_TOPIC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub enum EventSource {
    Driver,
    Dispatcher,
    System,
}
