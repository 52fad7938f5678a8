//! Quorum configuration from TOML (`[quorum]` section)
//!
//! ```toml
//! [quorum]
//! rule = "majority"          # or "unanimous", "atleast:2", "2/3"
//! synthesis = "most_detailed" # or "sectioned"
//! ```

use quorum_gate_domain::{DomainError, QuorumRule, SynthesisKind};
use serde::{Deserialize, Serialize};

/// Raw quorum configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQuorumConfig {
    /// Quorum rule text, parsed with [`QuorumRule`]'s `FromStr`
    pub rule: String,
    pub synthesis: SynthesisKind,
}

impl Default for FileQuorumConfig {
    fn default() -> Self {
        Self {
            rule: QuorumRule::default().to_string(),
            synthesis: SynthesisKind::default(),
        }
    }
}

impl FileQuorumConfig {
    pub fn parse_rule(&self) -> Result<QuorumRule, DomainError> {
        self.rule.trim().parse()
    }
}
