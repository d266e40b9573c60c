//! Proxy Probe - Proxy Endpoint Prober and Resolver
//!
//! This crate verifies whether candidate endpoints behave as working
//! forward proxies. It parses heterogeneous endpoint notations, expands
//! address ranges, resolves domains over DoH, and probes candidates over
//! raw TCP with bounded concurrency.

pub mod proxy;
pub mod server;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
