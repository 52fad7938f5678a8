//! Row-level reads and writes for rounds and output records

use super::{DbError, Result};
use quorum_gate_domain::core::time::{format_timestamp, parse_timestamp};
use quorum_gate_domain::{
    AgentId, AgentOutputRecord, AgentStatus, ConsensusRound, ErrorKind, RoundFilter, RoundId,
    StoredRound, Verdict,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const ROUND_COLUMNS: &str = "round_id, milestone_id, stage, started_at, settled_at, verdict, \
     synthesized_content, quorum_met, roster_size, success_count, required_successes";

const OUTPUT_COLUMNS: &str = "round_id, agent_id, content, attempt_count, final_status, \
     error_kind, elapsed_ms, recorded_at";

// ==================== Writes ====================

pub fn insert_round(conn: &Connection, round: &ConsensusRound) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO consensus_rounds ({ROUND_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            round.round_id.as_str(),
            round.milestone_id,
            round.stage,
            format_timestamp(round.started_at),
            format_timestamp(round.settled_at),
            round.verdict.as_str(),
            round.synthesized_content,
            round.quorum_met,
            to_sql_count(round.roster_size)?,
            to_sql_count(round.success_count)?,
            to_sql_count(round.required_successes)?,
        ],
    )?;
    Ok(())
}

pub fn insert_output(conn: &Connection, record: &AgentOutputRecord) -> Result<()> {
    let elapsed_ms = i64::try_from(record.elapsed_ms)
        .map_err(|_| DbError::Corrupt(format!("elapsed_ms out of range: {}", record.elapsed_ms)))?;

    conn.execute(
        &format!("INSERT INTO agent_output_records ({OUTPUT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            record.round_id.as_str(),
            record.agent_id.as_str(),
            record.content,
            record.attempt_count,
            record.final_status.as_str(),
            record.error_kind.map(ErrorKind::as_str),
            elapsed_ms,
            format_timestamp(record.recorded_at),
        ],
    )?;
    Ok(())
}

/// Delete rounds settled before `cutoff`; output rows follow via cascade.
pub fn delete_rounds_settled_before(conn: &Connection, cutoff: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM consensus_rounds WHERE settled_at < ?1",
        [cutoff],
    )?)
}

// ==================== Reads ====================

pub fn select_stored_round(conn: &Connection, round_id: &RoundId) -> Result<StoredRound> {
    let round = conn
        .query_row(
            &format!("SELECT {ROUND_COLUMNS} FROM consensus_rounds WHERE round_id = ?1"),
            [round_id.as_str()],
            RawRound::from_row,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(round_id.to_string()))?
        .into_domain()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {OUTPUT_COLUMNS} FROM agent_output_records WHERE round_id = ?1 ORDER BY rowid"
    ))?;
    let outputs = stmt
        .query_map([round_id.as_str()], RawOutput::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(RawOutput::into_domain)
        .collect::<Result<Vec<_>>>()?;

    Ok(StoredRound { round, outputs })
}

pub fn select_rounds(conn: &Connection, filter: &RoundFilter) -> Result<Vec<ConsensusRound>> {
    let mut sql = format!("SELECT {ROUND_COLUMNS} FROM consensus_rounds");
    let mut clauses = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(milestone_id) = &filter.milestone_id {
        values.push(Value::Text(milestone_id.clone()));
        clauses.push(format!("milestone_id = ?{}", values.len()));
    }
    if let Some(stage) = &filter.stage {
        values.push(Value::Text(stage.clone()));
        clauses.push(format!("stage = ?{}", values.len()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    // rowid breaks ties between rounds started within the same millisecond
    sql.push_str(" ORDER BY started_at DESC, rowid DESC");
    if let Some(limit) = filter.limit {
        values.push(Value::Integer(to_sql_count(limit)?));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), RawRound::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(RawRound::into_domain).collect()
}

pub fn count_rounds(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM consensus_rounds", [], |r| r.get(0))?;
    from_sql_count(count, "round count")
}

// ==================== Row decoding ====================

/// Round row as stored; decoded into the domain type outside the rusqlite
/// row callback so decoding failures surface as [`DbError::Corrupt`].
struct RawRound {
    round_id: String,
    milestone_id: String,
    stage: String,
    started_at: String,
    settled_at: String,
    verdict: String,
    synthesized_content: Option<String>,
    quorum_met: bool,
    roster_size: i64,
    success_count: i64,
    required_successes: i64,
}

impl RawRound {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            round_id: row.get(0)?,
            milestone_id: row.get(1)?,
            stage: row.get(2)?,
            started_at: row.get(3)?,
            settled_at: row.get(4)?,
            verdict: row.get(5)?,
            synthesized_content: row.get(6)?,
            quorum_met: row.get(7)?,
            roster_size: row.get(8)?,
            success_count: row.get(9)?,
            required_successes: row.get(10)?,
        })
    }

    fn into_domain(self) -> Result<ConsensusRound> {
        Ok(ConsensusRound {
            started_at: decode_timestamp(&self.started_at)?,
            settled_at: decode_timestamp(&self.settled_at)?,
            verdict: self
                .verdict
                .parse::<Verdict>()
                .map_err(|e| DbError::Corrupt(format!("round {}: {e}", self.round_id)))?,
            roster_size: from_sql_count(self.roster_size, "roster_size")?,
            success_count: from_sql_count(self.success_count, "success_count")?,
            required_successes: from_sql_count(self.required_successes, "required_successes")?,
            round_id: RoundId::new(self.round_id),
            milestone_id: self.milestone_id,
            stage: self.stage,
            synthesized_content: self.synthesized_content,
            quorum_met: self.quorum_met,
        })
    }
}

struct RawOutput {
    round_id: String,
    agent_id: String,
    content: String,
    attempt_count: u32,
    final_status: String,
    error_kind: Option<String>,
    elapsed_ms: i64,
    recorded_at: String,
}

impl RawOutput {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            round_id: row.get(0)?,
            agent_id: row.get(1)?,
            content: row.get(2)?,
            attempt_count: row.get(3)?,
            final_status: row.get(4)?,
            error_kind: row.get(5)?,
            elapsed_ms: row.get(6)?,
            recorded_at: row.get(7)?,
        })
    }

    fn into_domain(self) -> Result<AgentOutputRecord> {
        let corrupt = |e: quorum_gate_domain::DomainError| {
            DbError::Corrupt(format!("output {}/{}: {e}", self.round_id, self.agent_id))
        };
        let final_status = self.final_status.parse::<AgentStatus>().map_err(corrupt)?;
        let error_kind = self
            .error_kind
            .as_deref()
            .map(str::parse::<ErrorKind>)
            .transpose()
            .map_err(corrupt)?;
        let elapsed_ms = u64::try_from(self.elapsed_ms)
            .map_err(|_| DbError::Corrupt(format!("negative elapsed_ms: {}", self.elapsed_ms)))?;
        let recorded_at = decode_timestamp(&self.recorded_at)?;

        Ok(AgentOutputRecord {
            round_id: RoundId::new(self.round_id),
            agent_id: AgentId::new(self.agent_id),
            content: self.content,
            attempt_count: self.attempt_count,
            final_status,
            error_kind,
            elapsed_ms,
            recorded_at,
        })
    }
}

fn decode_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(value).ok_or_else(|| DbError::Corrupt(format!("invalid timestamp: {value}")))
}

fn to_sql_count(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| DbError::Corrupt(format!("count out of range: {value}")))
}

fn from_sql_count(value: i64, column: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| DbError::Corrupt(format!("{column} out of range: {value}")))
}
