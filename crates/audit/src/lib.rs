//! C10 Audit Logger: one append-only trace per in-flight query,
//! flushed to a JSON file at close. Grounded in `query_logger.py`'s
//! `QueryLogger` (event kinds, `finalize_query_log`'s timing/summary
//! bookkeeping, and the `query_<timestamp>_<id prefix>.json` filename
//! scheme), rebuilt around `contracts::AuditTrace` instead of an
//! untyped context dict.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use contracts::{AuditEvent, AuditEventKind, AuditTrace, FinalSummary};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuditLoggerConfig {
    pub log_dir: PathBuf,
    pub log_to_file: bool,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self { log_dir: PathBuf::from("logs/queries"), log_to_file: true }
    }
}

/// Factory for per-query `AuditHandle`s, holding the shared directory
/// configuration.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    config: AuditLoggerConfig,
}

impl AuditLogger {
    pub fn new(config: AuditLoggerConfig) -> Self {
        if config.log_to_file {
            if let Err(err) = fs::create_dir_all(&config.log_dir) {
                tracing::error!(error = %err, dir = %config.log_dir.display(), "failed to create audit log directory");
            }
        }
        Self { config }
    }

    /// Opens a new trace and records `QUERY_START`. The caller holds
    /// the returned handle for the query's lifetime and must call
    /// `close()` exactly once.
    pub fn open(&self, query_id: Uuid, user_query: Value) -> AuditHandle {
        let trace = AuditTrace::open(query_id, Utc::now());
        let handle = AuditHandle {
            query_id,
            config: self.config.clone(),
            inner: Mutex::new(Inner { trace, events: Vec::new() }),
        };
        handle.push(AuditEventKind::QueryStart, serde_json::json!({ "query": user_query }));
        handle
    }
}

struct Inner {
    trace: AuditTrace,
    events: Vec<AuditEvent>,
}

/// One query's live append-only trace. All mutating methods take
/// `&self`: the single `Mutex` serializes concurrent appends from
/// different executor tasks.
pub struct AuditHandle {
    query_id: Uuid,
    config: AuditLoggerConfig,
    inner: Mutex<Inner>,
}

impl AuditHandle {
    fn push(&self, kind: AuditEventKind, payload: Value) {
        let mut inner = self.inner.lock();
        tracing::debug!(query_id = %self.query_id, kind = ?kind, "audit event");
        inner.events.push(AuditEvent { kind, at: Utc::now(), payload });
    }

    pub fn reasoning(&self, mode: &str, payload: Value) {
        {
            let mut inner = self.inner.lock();
            inner.trace.reasoning = Some(payload.clone());
        }
        self.push(
            AuditEventKind::ReasoningDecision,
            serde_json::json!({ "mode": mode, "result": payload }),
        );
    }

    pub fn agent_interaction(&self, payload: Value) {
        {
            let mut inner = self.inner.lock();
            inner.trace.steps.push(payload.clone());
        }
        self.push(AuditEventKind::AgentInteraction, payload);
    }

    pub fn tool_interaction(&self, payload: Value) {
        self.push(AuditEventKind::ToolInteraction, payload);
    }

    pub fn validation(&self, payload: Value) {
        {
            let mut inner = self.inner.lock();
            inner.trace.validations.push(payload.clone());
        }
        self.push(AuditEventKind::Validation, payload);
    }

    pub fn retry_attempt(&self, attempt_number: u32, reason: &str, agents: &[String]) {
        let payload = serde_json::json!({
            "attempt": attempt_number,
            "reason": reason,
            "agents": agents,
        });
        {
            let mut inner = self.inner.lock();
            inner.trace.retries.push(payload.clone());
        }
        self.push(AuditEventKind::RetryAttempt, payload);
    }

    pub fn error(&self, error_type: &str, message: &str) {
        let payload = serde_json::json!({ "error_type": error_type, "error_message": message });
        {
            let mut inner = self.inner.lock();
            inner.trace.errors.push(payload.clone());
        }
        self.push(AuditEventKind::Error, payload);
    }

    /// Closes the trace: stamps end-of-query timing, records the final
    /// summary, writes the trace to disk if configured, and appends
    /// `QUERY_END`. Returns the finished trace for callers that also
    /// want it in-process (e.g. a `/query/{id}/trace` debug endpoint).
    ///
    /// File-write failures are logged and swallowed -- the audit
    /// logger never affects the user-facing response.
    pub fn close(self, final_summary: FinalSummary) -> AuditTrace {
        let end = Utc::now();
        let (trace, events) = {
            let mut inner = self.inner.into_inner();
            inner.trace.timing.end = Some(end);
            inner.trace.timing.total_ms =
                Some((end - inner.trace.timing.start).num_milliseconds().max(0) as u64);
            inner.trace.final_summary = Some(final_summary.clone());
            (inner.trace.clone(), std::mem::take(&mut inner.events))
        };

        let mut events = events;
        events.push(AuditEvent {
            kind: AuditEventKind::QueryEnd,
            at: end,
            payload: serde_json::json!({
                "success": final_summary.success,
                "duration_ms": trace.timing.total_ms,
                "agents_used": final_summary.agents_used,
            }),
        });

        if self.config.log_to_file {
            if let Err(err) = write_trace_file(&self.config.log_dir, &trace) {
                tracing::error!(query_id = %self.query_id, error = %err, "failed to write audit trace file");
            }
        }

        tracing::info!(
            query_id = %self.query_id,
            success = final_summary.success,
            duration_ms = trace.timing.total_ms,
            agents = ?final_summary.agents_used,
            "query finished"
        );

        trace
    }
}

fn write_trace_file(log_dir: &std::path::Path, trace: &AuditTrace) -> std::io::Result<()> {
    let timestamp = trace
        .timing
        .start
        .to_rfc3339()
        .replace(':', "-")
        .replace('.', "-");
    let id_prefix = trace.query_id.to_string()[..8].to_string();
    let filename = format!("query_{timestamp}_{id_prefix}.json");
    let path = log_dir.join(filename);
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, trace)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_records_query_start_in_the_trace() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(AuditLoggerConfig { log_dir: dir.path().to_path_buf(), log_to_file: false });
        let handle = logger.open(Uuid::new_v4(), serde_json::json!({"text": "hello"}));
        handle.reasoning("rule", serde_json::json!({"agents": ["weather"]}));
        let trace = handle.close(FinalSummary { success: true, agent_count: 1, agents_used: vec!["weather".into()], error_count: 0 });
        assert!(trace.is_closed());
        assert!(trace.reasoning.is_some());
    }

    #[test]
    fn close_writes_a_json_file_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(AuditLoggerConfig { log_dir: dir.path().to_path_buf(), log_to_file: true });
        let handle = logger.open(Uuid::new_v4(), serde_json::json!({"text": "hi"}));
        handle.close(FinalSummary { success: true, agent_count: 0, agents_used: vec![], error_count: 0 });

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn errors_and_retries_accumulate_on_the_trace() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(AuditLoggerConfig { log_dir: dir.path().to_path_buf(), log_to_file: false });
        let handle = logger.open(Uuid::new_v4(), serde_json::json!({"text": "hi"}));
        handle.retry_attempt(1, "hallucination_detected", &["weather".to_string()]);
        handle.error("Timeout", "step exceeded its deadline");
        let trace = handle.close(FinalSummary { success: false, agent_count: 0, agents_used: vec![], error_count: 1 });
        assert_eq!(trace.retries.len(), 1);
        assert_eq!(trace.errors.len(), 1);
    }
}
