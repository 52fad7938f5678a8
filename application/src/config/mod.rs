//! Application-level configuration.
//!
//! - [`RoundConfig`]: quorum rule, retry policy and synthesis strategy for rounds

pub mod round_config;

pub use round_config::RoundConfig;
