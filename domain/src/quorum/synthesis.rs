//! Synthesis strategies: how successful outputs become one decision text.

use crate::agent::outcome::AgentOutcome;
use serde::{Deserialize, Serialize};

/// Combines the successful outputs of a round into one text.
///
/// `successes` is in roster order and never empty when called by the
/// resolver. Implementations must be deterministic.
pub trait SynthesisStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn synthesize(&self, successes: &[&AgentOutcome]) -> Option<String>;
}

/// Pick the output with the most non-whitespace characters.
///
/// Ties go to the earliest agent in roster order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostDetailed;

impl SynthesisStrategy for MostDetailed {
    fn name(&self) -> &'static str {
        "most_detailed"
    }

    fn synthesize(&self, successes: &[&AgentOutcome]) -> Option<String> {
        let mut best: Option<(&AgentOutcome, usize)> = None;
        for outcome in successes {
            let weight = detail_weight(outcome.content());
            // Strictly greater keeps the earliest on ties
            if best.is_none_or(|(_, best_weight)| weight > best_weight) {
                best = Some((outcome, weight));
            }
        }
        best.map(|(outcome, _)| outcome.content().to_string())
    }
}

/// Concatenate every output under an `## <agent_id>` heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sectioned;

impl SynthesisStrategy for Sectioned {
    fn name(&self) -> &'static str {
        "sectioned"
    }

    fn synthesize(&self, successes: &[&AgentOutcome]) -> Option<String> {
        if successes.is_empty() {
            return None;
        }
        let sections: Vec<String> = successes
            .iter()
            .map(|outcome| format!("## {}\n\n{}", outcome.agent_id, outcome.content().trim()))
            .collect();
        Some(sections.join("\n\n"))
    }
}

fn detail_weight(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Configurable choice of built-in strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisKind {
    #[default]
    MostDetailed,
    Sectioned,
}

impl SynthesisKind {
    pub fn strategy(self) -> &'static dyn SynthesisStrategy {
        match self {
            SynthesisKind::MostDetailed => &MostDetailed,
            SynthesisKind::Sectioned => &Sectioned,
        }
    }
}

impl std::fmt::Display for SynthesisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.strategy().name())
    }
}

impl std::str::FromStr for SynthesisKind {
    type Err = crate::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "most_detailed" => Ok(SynthesisKind::MostDetailed),
            "sectioned" => Ok(SynthesisKind::Sectioned),
            _ => Err(crate::DomainError::UnknownValue {
                kind: "synthesis strategy",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::task::AgentId;
    use std::time::Duration;

    fn ok(id: &str, text: &str) -> AgentOutcome {
        AgentOutcome::success(AgentId::new(id), text, Duration::ZERO)
    }

    #[test]
    fn test_most_detailed_picks_longest_ignoring_whitespace() {
        let a = ok("a", "short     answer          ");
        let b = ok("b", "a noticeably longer answer");
        let picked = MostDetailed.synthesize(&[&a, &b]);
        assert_eq!(picked.as_deref(), Some("a noticeably longer answer"));
    }

    #[test]
    fn test_most_detailed_tie_goes_to_roster_order() {
        let a = ok("a", "abcd");
        let b = ok("b", "wxyz");
        assert_eq!(MostDetailed.synthesize(&[&a, &b]).as_deref(), Some("abcd"));
        assert_eq!(MostDetailed.synthesize(&[&b, &a]).as_deref(), Some("wxyz"));
    }

    #[test]
    fn test_sectioned_keeps_roster_order() {
        let a = ok("claude", "first\n");
        let b = ok("gemini", "second");
        let text = Sectioned.synthesize(&[&a, &b]).unwrap();
        assert_eq!(text, "## claude\n\nfirst\n\n## gemini\n\nsecond");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert_eq!(MostDetailed.synthesize(&[]), None);
        assert_eq!(Sectioned.synthesize(&[]), None);
    }

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("most-detailed".parse::<SynthesisKind>().ok(), Some(SynthesisKind::MostDetailed));
        assert_eq!("sectioned".parse::<SynthesisKind>().ok(), Some(SynthesisKind::Sectioned));
        assert!("vote".parse::<SynthesisKind>().is_err());
        assert_eq!(SynthesisKind::Sectioned.to_string(), "sectioned");
    }
}
