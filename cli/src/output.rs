//! Console and JSON formatting of rounds

use colored::{ColoredString, Colorize};
use quorum_gate_application::{MaintenanceReport, RoundResult};
use quorum_gate_domain::core::time::format_timestamp;
use quorum_gate_domain::{AgentOutcome, AgentOutputRecord, ConsensusRound, StoredRound, Verdict};
use serde::Serialize;

pub fn verdict_label(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Accepted => "ACCEPTED".green().bold(),
        Verdict::Degraded => "DEGRADED".yellow().bold(),
        Verdict::Failed => "FAILED".red().bold(),
    }
}

/// Formats rounds for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format a freshly settled round
    pub fn format_result(result: &RoundResult) -> String {
        let mut output = Self::round_header(&result.round);
        if result.cancelled {
            output.push_str(&format!("{}\n", "Round was cancelled".yellow()));
        }

        output.push_str(&Self::section_header("Agents"));
        for outcome in &result.outcomes {
            output.push_str(&Self::outcome_line(outcome));
        }

        output.push_str(&Self::synthesis_section(&result.round));
        output
    }

    /// Format a stored round with its output records
    pub fn format_stored(stored: &StoredRound) -> String {
        let mut output = Self::round_header(&stored.round);

        output.push_str(&Self::section_header("Agents"));
        for record in &stored.outputs {
            output.push_str(&Self::record_block(record));
        }

        output.push_str(&Self::synthesis_section(&stored.round));
        output
    }

    /// Only the synthesized content, or nothing for a failed round
    pub fn format_content(round: &ConsensusRound) -> String {
        round.synthesized_content.clone().unwrap_or_default()
    }

    /// One line per round, newest first
    pub fn format_list(rounds: &[ConsensusRound]) -> String {
        if rounds.is_empty() {
            return "No rounds found.\n".dimmed().to_string();
        }
        rounds
            .iter()
            .map(|round| {
                format!(
                    "{}  {}  {}/{}  {} {}/{}\n",
                    round.round_id.as_str().bold(),
                    format_timestamp(round.started_at).dimmed(),
                    round.milestone_id,
                    round.stage,
                    verdict_label(round.verdict),
                    round.success_count,
                    round.roster_size
                )
            })
            .collect()
    }

    pub fn format_report(report: &MaintenanceReport) -> String {
        format!(
            "{} {} rounds deleted, {} KB reclaimed ({} -> {} bytes)\n",
            "Maintenance:".cyan().bold(),
            report.rounds_deleted,
            report.bytes_reclaimed() / 1024,
            report.bytes_before,
            report.bytes_after
        )
    }

    fn round_header(round: &ConsensusRound) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} {}\n",
            "Round:".cyan().bold(),
            round.round_id
        ));
        output.push_str(&format!(
            "{} {} / {}\n",
            "Milestone:".cyan().bold(),
            round.milestone_id,
            round.stage
        ));
        output.push_str(&format!(
            "{} {} ({} of {} succeeded, {} required)\n",
            "Verdict:".cyan().bold(),
            verdict_label(round.verdict),
            round.success_count,
            round.roster_size,
            round.required_successes
        ));
        output.push_str(&format!(
            "{} {} -> {}\n",
            "Time:".cyan().bold(),
            format_timestamp(round.started_at),
            format_timestamp(round.settled_at)
        ));
        output
    }

    fn outcome_line(outcome: &AgentOutcome) -> String {
        let detail = match outcome.error_kind {
            None => format!("{} chars", outcome.content().chars().count()),
            Some(kind) => match &outcome.diagnostic {
                Some(diagnostic) => format!("{kind}: {}", first_line(diagnostic)),
                None => kind.to_string(),
            },
        };
        format!(
            "  {} {} [{}] attempts={} {:.1}s  {}\n",
            status_mark(outcome.is_success()),
            outcome.agent_id.as_str().bold(),
            outcome.status,
            outcome.attempt_count,
            outcome.elapsed.as_secs_f64(),
            detail.dimmed()
        )
    }

    fn record_block(record: &AgentOutputRecord) -> String {
        let success = record.final_status.is_success();
        let mut block = format!(
            "\n{} {} [{}] attempts={} {}ms\n",
            status_mark(success),
            format!("── {} ──", record.agent_id).yellow().bold(),
            record.final_status,
            record.attempt_count,
            record.elapsed_ms
        );
        match record.error_kind {
            Some(kind) => block.push_str(&format!("Error: {kind}\n")),
            None => {
                block.push_str(&record.content);
                if !record.content.ends_with('\n') {
                    block.push('\n');
                }
            }
        }
        block
    }

    fn synthesis_section(round: &ConsensusRound) -> String {
        let mut output = Self::section_header("Synthesis");
        match &round.synthesized_content {
            Some(content) => {
                output.push('\n');
                output.push_str(content);
                output.push('\n');
            }
            None => output.push_str(&format!("\n{}\n", "(no successful output)".dimmed())),
        }
        output
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n", format!("== {title} ==").cyan().bold())
    }
}

fn status_mark(success: bool) -> ColoredString {
    if success { "v".green() } else { "x".red() }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

// ==================== JSON ====================

#[derive(Serialize)]
struct OutcomeView<'a> {
    agent_id: &'a str,
    status: &'a str,
    error_kind: Option<&'a str>,
    attempt_count: u32,
    elapsed_ms: u128,
    exit_code: Option<i32>,
    output_text: Option<&'a str>,
    diagnostic: Option<&'a str>,
}

#[derive(Serialize)]
struct RoundResultView<'a> {
    round: &'a ConsensusRound,
    outcomes: Vec<OutcomeView<'a>>,
    cancelled: bool,
}

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_result(result: &RoundResult) -> serde_json::Result<String> {
        let view = RoundResultView {
            round: &result.round,
            outcomes: result
                .outcomes
                .iter()
                .map(|outcome| OutcomeView {
                    agent_id: outcome.agent_id.as_str(),
                    status: outcome.status.as_str(),
                    error_kind: outcome.error_kind.map(|kind| kind.as_str()),
                    attempt_count: outcome.attempt_count,
                    elapsed_ms: outcome.elapsed.as_millis(),
                    exit_code: outcome.exit_code,
                    output_text: outcome.output_text.as_deref(),
                    diagnostic: outcome.diagnostic.as_deref(),
                })
                .collect(),
            cancelled: result.cancelled,
        };
        serde_json::to_string_pretty(&view)
    }

    pub fn format<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
        serde_json::to_string_pretty(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use quorum_gate_domain::{AgentId, ErrorKind, RoundId};
    use std::time::Duration;

    fn round(verdict: Verdict, content: Option<&str>) -> ConsensusRound {
        let at = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();
        ConsensusRound {
            round_id: RoundId::new("r-1"),
            milestone_id: "SPEC-9".into(),
            stage: "plan".into(),
            started_at: at,
            settled_at: at,
            verdict,
            synthesized_content: content.map(str::to_string),
            quorum_met: verdict == Verdict::Accepted,
            roster_size: 3,
            success_count: 2,
            required_successes: 2,
        }
    }

    fn result() -> RoundResult {
        RoundResult {
            round: round(Verdict::Accepted, Some("final plan")),
            outcomes: vec![
                AgentOutcome::success(AgentId::new("claude"), "final plan", Duration::from_secs(2)),
                AgentOutcome::failure(AgentId::new("gemini"), ErrorKind::RateLimited, Duration::from_secs(1))
                    .with_attempts(3)
                    .with_diagnostic("429 Too Many Requests\nretry later"),
            ],
            cancelled: false,
        }
    }

    #[test]
    fn test_text_report_lists_agents_and_synthesis() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format_result(&result());

        assert!(text.contains("Verdict: ACCEPTED (2 of 3 succeeded, 2 required)"));
        assert!(text.contains("claude"));
        assert!(text.contains("rate_limited: 429 Too Many Requests"));
        assert!(text.contains("final plan"));
    }

    #[test]
    fn test_failed_round_has_no_content() {
        colored::control::set_override(false);
        let failed = round(Verdict::Failed, None);
        assert_eq!(ConsoleFormatter::format_content(&failed), "");
        let stored = StoredRound {
            round: failed,
            outputs: Vec::new(),
        };
        assert!(ConsoleFormatter::format_stored(&stored).contains("(no successful output)"));
    }

    #[test]
    fn test_json_result_shape() {
        let json = JsonFormatter::format_result(&result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["round"]["verdict"], "accepted");
        assert_eq!(value["outcomes"][1]["error_kind"], "rate_limited");
        assert_eq!(value["outcomes"][1]["attempt_count"], 3);
        assert_eq!(value["outcomes"][0]["output_text"], "final plan");
        assert_eq!(value["cancelled"], false);
    }

    #[test]
    fn test_empty_list() {
        colored::control::set_override(false);
        assert_eq!(ConsoleFormatter::format_list(&[]), "No rounds found.\n");
    }
}
