//! Leonardo trading client
//!
//! Mirrors the Leonardo backend's settings, watchlist, instrument directory,
//! and account total in a synchronized in-memory store, and sizes positions
//! from ATR so that a stop-out loses at most a fixed share of total assets.

pub mod api;
pub mod error;
pub mod models;
pub mod sizing;
pub mod store;

pub use api::{Gateway, GatewayConfig, HttpGateway};
pub use error::{DecodeError, StoreError, StoreResult};
pub use sizing::{PositionSizer, SizingConfig, SizingOutcome};
pub use store::Store;
