//! Router - capability-aware backend selection
//!
//! # Module Structure
//!
//! - `preferences`: task type -> backend preference rows
//! - `types`: route request, routed completion, backend info
//! - `mock`: mock adapter for testing
//! - `router_impl`: [`ProviderRouter`]

mod mock;
mod preferences;
mod router_impl;
mod types;

#[cfg(test)]
mod tests;

pub use mock::MockAdapter;
pub use preferences::TaskPreferences;
pub use router_impl::{ProviderRouter, SharedContext};
pub use types::{BackendInfo, RouteRequest, RoutedCompletion};
