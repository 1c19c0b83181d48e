//! Contract, validation, and storage-key primitives for the variant-effect
//! prediction tool Lambda.
//!
//! This crate is pure logic: no AWS clients, no environment access. The
//! runtime integration lives in `crates/vep_endpoint_lambda`.

pub mod contract;
pub mod storage_keys;
pub mod validators;
