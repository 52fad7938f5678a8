//! Consensus Resolver: applies a quorum rule to a settled set of outcomes.

use super::round::Verdict;
use super::rule::QuorumRule;
use super::synthesis::SynthesisStrategy;
use crate::agent::outcome::AgentOutcome;
use serde::{Deserialize, Serialize};

/// Verdict and synthesized content for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub verdict: Verdict,
    pub synthesized_content: Option<String>,
    pub quorum_met: bool,
    pub success_count: usize,
    pub required_successes: usize,
    pub degraded: bool,
}

/// Resolve a round.
///
/// The roster size is `outcomes.len()`. Pure and deterministic: the same
/// outcomes in the same order always produce the same resolution.
///
/// | successes              | verdict  | content                 |
/// |------------------------|----------|-------------------------|
/// | `>= required`          | Accepted | synthesized             |
/// | `1 ..< required`       | Degraded | synthesized, partial    |
/// | `0`                    | Failed   | none                    |
pub fn resolve(
    outcomes: &[AgentOutcome],
    rule: QuorumRule,
    strategy: &dyn SynthesisStrategy,
) -> Resolution {
    let required = rule.required_successes(outcomes.len());
    let successes: Vec<&AgentOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();
    let success_count = successes.len();

    let verdict = if success_count == 0 {
        Verdict::Failed
    } else if success_count >= required {
        Verdict::Accepted
    } else {
        Verdict::Degraded
    };

    let synthesized_content = match verdict {
        Verdict::Failed => None,
        Verdict::Accepted | Verdict::Degraded => strategy.synthesize(&successes),
    };

    Resolution {
        verdict,
        synthesized_content,
        quorum_met: verdict == Verdict::Accepted,
        success_count,
        required_successes: required,
        degraded: verdict == Verdict::Degraded,
    }
}
