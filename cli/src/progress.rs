//! Progress reporting while a round runs

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use quorum_gate_application::RoundProgressNotifier;
use quorum_gate_domain::{AgentId, AgentOutcome, ConsensusRound, ErrorKind};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One spinner per agent, updated from concurrent agent tasks
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<AgentId, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {elapsed:>4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<AgentId, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bar_for(&self, agent_id: &AgentId) -> ProgressBar {
        self.bars()
            .entry(agent_id.clone())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::spinner_style());
                bar.set_prefix(agent_id.to_string());
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            })
            .clone()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundProgressNotifier for ProgressReporter {
    fn on_round_start(&self, milestone_id: &str, stage: &str, roster_size: usize) {
        let _ = self.multi.println(format!(
            "{} {}/{} ({} agents)",
            "->".cyan(),
            milestone_id.bold(),
            stage.bold(),
            roster_size
        ));
    }

    fn on_attempt_start(&self, agent_id: &AgentId, attempt: u32) {
        let bar = self.bar_for(agent_id);
        if attempt == 1 {
            bar.set_message("running");
        } else {
            bar.set_message(format!("attempt {attempt}"));
        }
    }

    fn on_agent_output(&self, agent_id: &AgentId, chunk: &str) {
        if let Some(line) = chunk.lines().rev().find(|l| !l.trim().is_empty()) {
            let preview: String = line.trim().chars().take(60).collect();
            self.bar_for(agent_id).set_message(preview.dimmed().to_string());
        }
    }

    fn on_retry_scheduled(&self, agent_id: &AgentId, attempt: u32, kind: ErrorKind, delay: Duration) {
        self.bar_for(agent_id).set_message(format!(
            "{} after attempt {attempt}, retrying in {}ms",
            kind.to_string().yellow(),
            delay.as_millis()
        ));
    }

    fn on_agent_complete(&self, outcome: &AgentOutcome) {
        let bar = self.bar_for(&outcome.agent_id);
        let message = match outcome.error_kind {
            None => format!("{} ({:.1}s)", "v".green(), outcome.elapsed.as_secs_f64()),
            Some(kind) => format!(
                "{} {} after {} attempt(s)",
                "x".red(),
                kind,
                outcome.attempt_count
            ),
        };
        bar.finish_with_message(message);
    }

    fn on_round_settled(&self, round: &ConsensusRound) {
        for bar in self.bars().values() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
        let _ = self.multi.println(format!(
            "{} {} ({}/{} succeeded, {} required)",
            "=>".cyan(),
            crate::output::verdict_label(round.verdict),
            round.success_count,
            round.roster_size,
            round.required_successes
        ));
    }
}

/// Plain line-per-event progress for non-terminal stderr
pub struct SimpleProgress;

impl RoundProgressNotifier for SimpleProgress {
    fn on_round_start(&self, milestone_id: &str, stage: &str, roster_size: usize) {
        eprintln!("-> {milestone_id}/{stage} ({roster_size} agents)");
    }

    fn on_retry_scheduled(&self, agent_id: &AgentId, attempt: u32, kind: ErrorKind, delay: Duration) {
        eprintln!(
            "  ~ {agent_id}: {kind} on attempt {attempt}, retrying in {}ms",
            delay.as_millis()
        );
    }

    fn on_agent_complete(&self, outcome: &AgentOutcome) {
        match outcome.error_kind {
            None => eprintln!("  v {}", outcome.agent_id),
            Some(kind) => eprintln!("  x {} ({kind})", outcome.agent_id),
        }
    }

    fn on_round_settled(&self, round: &ConsensusRound) {
        eprintln!("=> {}", round.verdict);
    }
}
