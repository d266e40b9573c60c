//! Proxy module for parsing, resolving and probing endpoints
//!
//! This module provides functionality for:
//! - Parsing endpoint notations (`.tp<port>.` embedded, `[v6]:port`, `v4:port`, bare host)
//! - Expanding `/24` and last-octet address ranges
//! - Resolving domains to IP sets over DNS-over-HTTPS
//! - Probing candidates over raw TCP and classifying the response
//! - Extracting candidate lists from remote text resources
//! - Issuing and validating rotating anti-abuse tokens

pub mod bulk;
pub mod checker;
pub mod expander;
pub mod geo;
pub mod models;
pub mod parser;
pub mod resolver;
pub mod token;

pub use bulk::{BulkConfig, BulkLoader};
pub use checker::{CheckerConfig, ProxyChecker};
pub use expander::RangeExpander;
pub use geo::{GeoClient, GeoLocation};
pub use models::{Candidate, ProbeResult, ResolutionOutcome};
pub use parser::AddressParser;
pub use resolver::{DohResolver, ResolverConfig};
pub use token::TokenAuthenticator;
