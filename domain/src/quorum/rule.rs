//! Quorum rules for round resolution
//!
//! A rule turns a roster size into the number of successful agent outputs a
//! round needs before its verdict is `Accepted`.

use crate::DomainError;
use serde::{Deserialize, Serialize};

/// Rule for determining whether a round reached quorum
///
/// - `Majority`: strictly more than half must succeed (default)
/// - `Unanimous`: every agent must succeed
/// - `AtLeast(k)`: at least k agents must succeed
/// - `Fraction`: at least `ceil(n * numerator / denominator)` must succeed
///
/// Every rule requires at least one success, so an empty output set never
/// reaches quorum.
///
/// # Example
///
/// ```
/// use quorum_gate_domain::quorum::QuorumRule;
///
/// let rule = QuorumRule::Majority;
/// assert!(rule.is_satisfied(2, 3));  // 2 of 3 > 50%
/// assert!(!rule.is_satisfied(1, 3));
///
/// let two_thirds: QuorumRule = "2/3".parse().unwrap();
/// assert_eq!(two_thirds.required_successes(5), 4); // ceil(10/3)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum QuorumRule {
    /// More than half must succeed (n/2 + 1)
    #[default]
    Majority,

    /// All roster members must succeed
    Unanimous,

    /// At least n successes
    AtLeast(usize),

    /// At least this fraction of the roster must succeed
    Fraction { numerator: u32, denominator: u32 },
}

impl QuorumRule {
    /// Build a fraction rule, rejecting `0/x`, `x/0` and fractions above one.
    pub fn fraction(numerator: u32, denominator: u32) -> Result<Self, DomainError> {
        if denominator == 0 || numerator == 0 || numerator > denominator {
            return Err(DomainError::InvalidQuorumRule(format!(
                "{numerator}/{denominator} is not a fraction in (0, 1]"
            )));
        }
        Ok(QuorumRule::Fraction {
            numerator,
            denominator,
        })
    }

    /// Successes needed for a roster of `roster_size` agents (always ≥ 1).
    pub fn required_successes(&self, roster_size: usize) -> usize {
        let required = match self {
            QuorumRule::Majority => roster_size / 2 + 1,
            QuorumRule::Unanimous => roster_size,
            QuorumRule::AtLeast(n) => *n,
            QuorumRule::Fraction {
                numerator,
                denominator,
            } => {
                let den = (*denominator).max(1) as usize;
                (roster_size * *numerator as usize).div_ceil(den)
            }
        };
        required.max(1)
    }

    /// Check whether `successes` out of `roster_size` meets the rule
    pub fn is_satisfied(&self, successes: usize, roster_size: usize) -> bool {
        roster_size > 0 && successes >= self.required_successes(roster_size)
    }

    /// Reject a rule that no outcome of this roster could ever satisfy.
    pub fn check_reachable(&self, roster_size: usize) -> Result<(), DomainError> {
        let required = self.required_successes(roster_size);
        if required > roster_size {
            return Err(DomainError::InvalidQuorumRule(format!(
                "{} needs {} successes but the roster has {} agents",
                self, required, roster_size
            )));
        }
        Ok(())
    }

    /// Human-readable description of this rule
    pub fn description(&self) -> String {
        match self {
            QuorumRule::Majority => "majority (more than half)".to_string(),
            QuorumRule::Unanimous => "unanimous (all must succeed)".to_string(),
            QuorumRule::AtLeast(n) => format!("at least {} successes", n),
            QuorumRule::Fraction {
                numerator,
                denominator,
            } => format!("at least {}/{} of the roster", numerator, denominator),
        }
    }
}

impl std::fmt::Display for QuorumRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuorumRule::Majority => write!(f, "majority"),
            QuorumRule::Unanimous => write!(f, "unanimous"),
            QuorumRule::AtLeast(n) => write!(f, "atleast:{}", n),
            QuorumRule::Fraction {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator, denominator),
        }
    }
}

impl std::str::FromStr for QuorumRule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DomainError::InvalidQuorumRule(format!("{s}: {reason}"));

        match s.trim().to_lowercase().as_str() {
            "majority" => Ok(QuorumRule::Majority),
            "unanimous" => Ok(QuorumRule::Unanimous),
            s if s.starts_with("atleast:") || s.starts_with("at_least:") => {
                let n: usize = s
                    .split(':')
                    .nth(1)
                    .ok_or_else(|| invalid("missing number after atleast:"))?
                    .trim()
                    .parse()
                    .map_err(|_| invalid("invalid number for atleast"))?;
                if n == 0 {
                    return Err(invalid("atleast needs a positive count"));
                }
                Ok(QuorumRule::AtLeast(n))
            }
            s if s.contains('/') => {
                let (num, den) = s.split_once('/').ok_or_else(|| invalid("expected N/D"))?;
                let numerator: u32 = num.trim().parse().map_err(|_| invalid("invalid numerator"))?;
                let denominator: u32 = den
                    .trim()
                    .parse()
                    .map_err(|_| invalid("invalid denominator"))?;
                QuorumRule::fraction(numerator, denominator)
            }
            _ => Err(invalid("valid rules are majority, unanimous, atleast:K, N/D")),
        }
    }
}

impl TryFrom<String> for QuorumRule {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuorumRule> for String {
    fn from(rule: QuorumRule) -> Self {
        rule.to_string()
    }
}
