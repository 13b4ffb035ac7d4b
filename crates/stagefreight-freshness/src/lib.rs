pub mod ecosystems;
pub mod error;
pub mod rules;
pub mod vuln;

pub use error::{FreshnessError, Result};
pub use ecosystems::{EndpointConfig, Parser, Resolver, dispatch_ecosystem};
