//! Use cases (application services)

pub mod round_cache;
pub mod run_round;
