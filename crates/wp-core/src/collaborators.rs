//! Systems the engine consumes but does not own: the trip-sheet directory and
//! the channel-hosting subsystem. The engine bounds every call with the
//! configured upstream timeout.

use crate::types::channel::{ChannelSpec, HostedChannel};
use crate::types::trip::TripSheet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpstreamFailure {
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait TripSheetDirectory: Send + Sync {
    /// `Ok(None)` when the directory answered but has no such trip.
    async fn lookup(&self, trip_id: &str) -> Result<Option<TripSheet>, UpstreamFailure>;
}

#[async_trait]
pub trait ChannelHost: Send + Sync {
    async fn create_channel(&self, spec: &ChannelSpec) -> Result<HostedChannel, UpstreamFailure>;
}

/// Trip sheets held in memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct InMemoryTripSheets {
    sheets: HashMap<String, TripSheet>,
}

impl InMemoryTripSheets {
    pub fn new(sheets: impl IntoIterator<Item = TripSheet>) -> Self {
        Self {
            sheets: sheets
                .into_iter()
                .map(|sheet| (sheet.trip_id.clone(), sheet))
                .collect(),
        }
    }
}

#[async_trait]
impl TripSheetDirectory for InMemoryTripSheets {
    async fn lookup(&self, trip_id: &str) -> Result<Option<TripSheet>, UpstreamFailure> {
        Ok(self.sheets.get(trip_id).cloned())
    }
}

/// Channel host that mints local identifiers. Idempotent on the spec's key,
/// like the hosted messaging platforms it stands in for.
#[derive(Debug, Default)]
pub struct LocalChannelHost {
    created: Mutex<HashMap<String, HostedChannel>>,
}

impl LocalChannelHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ChannelHost for LocalChannelHost {
    async fn create_channel(&self, spec: &ChannelSpec) -> Result<HostedChannel, UpstreamFailure> {
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        let hosted = created
            .entry(spec.idempotency_key.clone())
            .or_insert_with(|| HostedChannel {
                external_id: format!("local-{}", Ulid::new().to_string().to_lowercase()),
            });
        Ok(hosted.clone())
    }
}
