//! AWS-oriented adapters and handlers for the variant-effect prediction tool
//! Lambda.
//!
//! This crate owns runtime integration details (the Lambda entrypoint, S3 and
//! SageMaker Runtime adapters, CloudWatch metrics) around the pure contract
//! primitives in `vep_endpoint_core`. Handlers are synchronous and depend only
//! on capability traits, so any in-memory backend is substitutable in tests.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod telemetry;
