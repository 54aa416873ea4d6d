//! Builders to construct services from configuration.

pub mod service_builder;

pub use service_builder::{build_service, build_service_with_store, build_store, ServiceHandle};
