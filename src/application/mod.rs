// Application layer - use cases and orchestration.
// The service owns validation and the delete/retry policies; `reporting`
// is pure and works on snapshots the service hands out.

pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use service::*;
