//! Domain layer for quorum-gate
//!
//! This crate contains the pure types and logic of the consensus engine.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! - **Agent tasks and outcomes**: one external agent's assignment in a round
//!   and its terminal result, with failures normalized into a closed
//!   [`ErrorKind`] set
//! - **Retry Policy**: retryable/permanent classification and jittered
//!   exponential backoff
//! - **Consensus Resolver**: applies a [`QuorumRule`] to settled outcomes and
//!   synthesizes one decision text

pub mod agent;
pub mod core;
pub mod quorum;
pub mod retry;

// Re-export commonly used types
pub use agent::{
    error_kind::{ErrorClass, ErrorKind},
    outcome::{AgentOutcome, AgentStatus},
    task::{AgentId, AgentSpec, AgentTask},
};
pub use core::error::DomainError;
pub use quorum::{
    AgentOutputRecord, ConsensusRound, MostDetailed, QuorumRule, Resolution, RoundFilter, RoundId,
    Sectioned, StoredRound, SynthesisKind, SynthesisStrategy, Verdict, resolve,
};
pub use retry::RetryPolicy;
