//! Application layer for quorum-gate
//!
//! This crate contains the round orchestrator use case, port definitions, and
//! round configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::RoundConfig;
pub use ports::{
    agent_runner::{AgentRunner, NoOutputObserver, OutputObserver},
    consensus_store::{ConsensusRepository, MaintenanceReport, RetentionPolicy, StoreError},
    progress::{NoProgress, RoundProgressNotifier},
};
pub use use_cases::round_cache::CachedConsensusStore;
pub use use_cases::run_round::{RoundResult, RunRoundError, RunRoundInput, RunRoundUseCase};
