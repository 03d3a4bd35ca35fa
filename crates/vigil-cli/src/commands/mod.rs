//! CLI command implementations.

pub mod config;
pub mod identity;
pub mod introspect;
pub mod scanners;
