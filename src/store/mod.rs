//! Client-side synchronized state store.

mod failures;
mod names;
mod slot;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use failures::{Entity, StoreFailure};
pub use state::{Recommendation, ReloadReport, Store};
