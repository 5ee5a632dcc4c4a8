pub mod export;
pub mod rest;
pub mod views;

pub use export::Exporter;
pub use rest::{AppState, create_router};
