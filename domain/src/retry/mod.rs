//! Retry decisions for failed agent attempts and busy storage writes.

pub mod policy;

pub use policy::RetryPolicy;
