//! Transport-facing API surface.

pub mod api;

pub use api::{health, ErrorBody, Health, JobKeyParams, JobRequest};
