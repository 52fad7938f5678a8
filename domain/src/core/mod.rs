//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`time`]: timestamp helpers used by round records

pub mod error;
pub mod time;
