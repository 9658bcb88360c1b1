use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use agent_dispatch_proto::{TicketSnapshot, TicketStatus};

use crate::classify::{classify_action, RequestKind};

pub type WorkResult = Result<serde_json::Value, String>;
pub(crate) type WorkFn = Box<dyn FnOnce() -> WorkResult + Send + 'static>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TicketRecord {
    pub id: u64,
    pub agent_id: String,
    pub action_name: String,
    pub status: TicketStatus,
    pub queue_position: usize,
    pub submitted_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl TicketRecord {
    pub fn new(
        id: u64,
        agent_id: String,
        action_name: String,
        queue_position: usize,
        submitted_at_ms: i64,
    ) -> Self {
        Self {
            id,
            agent_id,
            action_name,
            status: TicketStatus::Queued,
            queue_position,
            submitted_at_ms,
            completed_at_ms: None,
            result: None,
            error_message: None,
        }
    }

    pub fn kind(&self) -> RequestKind {
        classify_action(&self.action_name)
    }

    /// `-1` until the ticket reaches a terminal state.
    pub fn execution_time_ms(&self) -> i64 {
        match self.completed_at_ms {
            Some(completed_at_ms) if self.status.is_terminal() => {
                completed_at_ms.saturating_sub(self.submitted_at_ms)
            }
            _ => -1,
        }
    }

    pub fn finish(&mut self, outcome: WorkResult, completed_at_ms: i64) {
        match outcome {
            Ok(value) => {
                self.status = TicketStatus::Completed;
                self.result = Some(value);
                self.error_message = None;
            }
            Err(message) => {
                self.status = TicketStatus::Failed;
                self.result = None;
                self.error_message = Some(message);
            }
        }
        self.completed_at_ms = Some(completed_at_ms);
    }

    pub fn time_out(&mut self, message: String, completed_at_ms: i64) {
        self.status = TicketStatus::TimedOut;
        self.result = None;
        self.error_message = Some(message);
        self.completed_at_ms = Some(completed_at_ms);
    }

    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            ticket_id: self.id,
            agent_id: self.agent_id.clone(),
            action_name: self.action_name.clone(),
            status: self.status,
            queue_position: self.queue_position,
            submitted_at_ms: self.submitted_at_ms,
            completed_at_ms: self.completed_at_ms,
            execution_time_ms: self.execution_time_ms(),
            result: self.result.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// A queued ticket together with the work it owns until dispatch.
pub(crate) struct PendingTicket {
    pub record: TicketRecord,
    work: Option<WorkFn>,
}

impl PendingTicket {
    pub fn new(record: TicketRecord, work: WorkFn) -> Self {
        Self {
            record,
            work: Some(work),
        }
    }

    /// Runs the owned work exactly once and drops it. Panics are reported as
    /// failures so one work item cannot take down the dispatch cycle.
    pub fn execute(&mut self) -> WorkResult {
        let Some(work) = self.work.take() else {
            return Err(format!("request {} has already been executed", self.record.id));
        };
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(outcome) => outcome,
            Err(payload) => Err(format!("work panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    pub fn into_record(self) -> TicketRecord {
        self.record
    }
}

impl fmt::Debug for PendingTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTicket")
            .field("record", &self.record)
            .field("has_work", &self.work.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record(id: u64) -> TicketRecord {
        TicketRecord::new(id, "agent".to_string(), "gameobject/create".to_string(), 0, 100)
    }

    #[test]
    fn execution_time_is_negative_until_terminal() {
        let mut ticket = record(1);
        assert_eq!(ticket.execution_time_ms(), -1);
        ticket.finish(Ok(serde_json::json!({"ok": true})), 145);
        assert_eq!(ticket.status, TicketStatus::Completed);
        assert_eq!(ticket.execution_time_ms(), 45);
    }

    #[test]
    fn failure_keeps_message_and_clears_result() {
        let mut ticket = record(2);
        ticket.finish(Err("missing object".to_string()), 120);
        let snapshot = ticket.snapshot();
        assert_eq!(snapshot.status, TicketStatus::Failed);
        assert_eq!(snapshot.error_message.as_deref(), Some("missing object"));
        assert!(snapshot.result.is_none());
    }

    #[test]
    fn work_runs_once_and_is_released() {
        let calls = Arc::new(AtomicUsize::new(0));
        let captured = Arc::clone(&calls);
        let mut pending = PendingTicket::new(
            record(3),
            Box::new(move || -> WorkResult {
                captured.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::Value::Null)
            }),
        );

        assert_eq!(pending.execute(), Ok(serde_json::Value::Null));
        assert_eq!(Arc::strong_count(&calls), 1);
        assert!(pending.execute().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_work_becomes_an_error() {
        let mut pending =
            PendingTicket::new(record(4), Box::new(|| -> WorkResult { panic!("boom") }));
        let err = pending.execute().expect_err("panic must surface as error");
        assert!(err.contains("boom"), "{err}");
    }
}
