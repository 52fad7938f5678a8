//! Quorum consensus domain
//!
//! Resolves a settled round of agent outcomes into one verdict.
//!
//! ```text
//! outcomes ──► QuorumRule::required_successes(n)
//!          ──► resolve() ──► Resolution { verdict, synthesized_content, .. }
//!          ──► ConsensusRound + AgentOutputRecord rows
//! ```

pub mod resolver;
pub mod round;
pub mod rule;
pub mod synthesis;

// Re-export main types
pub use resolver::{Resolution, resolve};
pub use round::{AgentOutputRecord, ConsensusRound, RoundFilter, RoundId, StoredRound, Verdict};
pub use rule::QuorumRule;
pub use synthesis::{MostDetailed, Sectioned, SynthesisKind, SynthesisStrategy};
