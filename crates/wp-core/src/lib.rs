pub mod audit;
pub mod channels;
pub mod checkins;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod idempotency;
pub mod locations;
pub mod locks;
pub mod notifications;
pub mod store;
pub mod zones;

pub mod types;

pub use crate::config::EngineConfig;
pub use crate::engine::{Engine, RequestContext};
pub use crate::error::EngineError;
pub use crate::store::{Store, StoreProvider};
