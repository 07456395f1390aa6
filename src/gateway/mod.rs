//! Gateway implementation

mod builder;
mod service;

pub use builder::{DEFAULT_REQUEST_TIMEOUT, Sluice, SluiceBuilder};
pub use service::{Gateway, PerformanceMetrics};
