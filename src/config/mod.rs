//! Configuration models for the engine, store backend, and service rules.

pub mod engine;
pub mod service;

pub use engine::EngineConfig;
pub use service::{ServiceConfig, StoreBackendConfig, UpdateStatusRule, ENV_PREFIX};
