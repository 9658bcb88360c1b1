use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_dispatch_proto::{
    normalized_agent_id, ActivityEntry, QueueInfo, SessionSnapshot, TicketSnapshot, TicketStatus,
};

use crate::classify::RequestKind;
use crate::config::SchedulerConfig;
use crate::error::TicketError;
use crate::runtime_util::{duration_millis_to_i64_saturating, lock_state, now_unix_ms};
use crate::selection::AgentQueues;
use crate::session::Session;
use crate::ticket::{PendingTicket, TicketRecord, WorkFn};

/// Source of unix-millisecond timestamps.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// What one call to [`RequestScheduler::run_one_cycle`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub tick: u64,
    /// Another cycle was already in progress; nothing was selected.
    pub skipped: bool,
    pub cleaned: usize,
    /// Ticket ids in execution order.
    pub dispatched: Vec<u64>,
    pub completed: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.dispatched.is_empty()
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    queues: AgentQueues<PendingTicket>,
    executing: HashMap<u64, TicketRecord>,
    completed: HashMap<u64, TicketRecord>,
    waiters: HashMap<u64, mpsc::Sender<()>>,
    sessions: BTreeMap<String, Session>,
    tick_count: u64,
}

/// Fair multi-producer, single-consumer request queue.
///
/// Producers call [`submit`](Self::submit) or
/// [`submit_and_wait`](Self::submit_and_wait) from any thread. A single
/// driver calls [`run_one_cycle`](Self::run_one_cycle) on its own cadence;
/// every unit of work runs inside that call with the state lock released, so
/// work items may submit further requests or query the scheduler.
pub struct RequestScheduler {
    config: SchedulerConfig,
    clock: Clock,
    next_ticket_id: AtomicU64,
    dispatching: AtomicBool,
    state: Mutex<SchedulerState>,
}

impl fmt::Debug for RequestScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("config", &self.config)
            .field("next_ticket_id", &self.next_ticket_id)
            .field("dispatching", &self.dispatching)
            .finish_non_exhaustive()
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl RequestScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(now_unix_ms))
    }

    pub fn with_clock(config: SchedulerConfig, clock: Clock) -> Self {
        Self {
            config,
            clock,
            next_ticket_id: AtomicU64::new(0),
            dispatching: AtomicBool::new(false),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queues `work` for `agent_id` and returns immediately.
    pub fn submit<F, E>(&self, agent_id: &str, action_name: &str, work: F) -> TicketSnapshot
    where
        F: FnOnce() -> Result<serde_json::Value, E> + Send + 'static,
        E: fmt::Display,
    {
        self.enqueue(agent_id, action_name, box_work(work), None)
    }

    /// Queues `work` and blocks the calling thread until it resolves or the
    /// configured wait timeout elapses.
    pub fn submit_and_wait<F, E>(
        &self,
        agent_id: &str,
        action_name: &str,
        work: F,
    ) -> Result<serde_json::Value, TicketError>
    where
        F: FnOnce() -> Result<serde_json::Value, E> + Send + 'static,
        E: fmt::Display,
    {
        self.submit_and_wait_timeout(agent_id, action_name, work, self.config.wait_timeout)
    }

    /// Like [`submit_and_wait`](Self::submit_and_wait) with an explicit
    /// deadline. On timeout the ticket is recorded as `TimedOut` but its work
    /// still runs when dispatched; a later completion replaces the record.
    pub fn submit_and_wait_timeout<F, E>(
        &self,
        agent_id: &str,
        action_name: &str,
        work: F,
        timeout: Duration,
    ) -> Result<serde_json::Value, TicketError>
    where
        F: FnOnce() -> Result<serde_json::Value, E> + Send + 'static,
        E: fmt::Display,
    {
        let (signal_tx, signal_rx) = mpsc::channel::<()>();
        let ticket = self.enqueue(agent_id, action_name, box_work(work), Some(signal_tx));
        let ticket_id = ticket.ticket_id;
        let wait = signal_rx.recv_timeout(timeout);

        let mut state = lock_state(&self.state);
        state.waiters.remove(&ticket_id);
        if let Some(record) = state.completed.get(&ticket_id) {
            if wait.is_ok() || record.status != TicketStatus::TimedOut {
                return outcome_of(record);
            }
        }

        let message = format!(
            "request {ticket_id} ({action_name}) timed out after {} ms",
            timeout.as_millis()
        );
        let pending_record = state.executing.get(&ticket_id).cloned().or_else(|| {
            state
                .queues
                .items()
                .find(|pending| pending.record.id == ticket_id)
                .map(|pending| pending.record.clone())
        });
        let Some(mut record) = pending_record else {
            return Err(TicketError::Missing { ticket_id });
        };
        record.time_out(message.clone(), self.now_ms());
        state.completed.insert(ticket_id, record);
        drop(state);

        tracing::warn!(
            ticket_id,
            agent_id = %ticket.agent_id,
            action = action_name,
            timeout_ms = timeout.as_millis() as u64,
            "synchronous wait timed out"
        );
        Err(TicketError::TimedOut { ticket_id, message })
    }

    /// Selects and executes one batch. Never blocks waiting for work.
    pub fn run_one_cycle(&self) -> CycleReport {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            return CycleReport {
                skipped: true,
                ..CycleReport::default()
            };
        }
        let _dispatching = DispatchGuard(&self.dispatching);

        let mut report = CycleReport::default();
        let batch = {
            let mut state = lock_state(&self.state);
            state.tick_count = state.tick_count.saturating_add(1);
            report.tick = state.tick_count;
            if state.tick_count % self.config.cleanup_every_cycles.max(1) == 0 {
                report.cleaned = self.cleanup_locked(&mut state, self.now_ms());
            }

            let mut batch = state
                .queues
                .select_batch(self.config.max_read_batch, |pending| {
                    pending.record.kind() == RequestKind::Read
                });
            for pending in batch.iter_mut() {
                pending.record.status = TicketStatus::Executing;
                state
                    .executing
                    .insert(pending.record.id, pending.record.clone());
                if let Some(session) = state.sessions.get_mut(&pending.record.agent_id) {
                    session.record_dispatched();
                }
            }
            batch
        };

        if !batch.is_empty() {
            tracing::debug!(tick = report.tick, size = batch.len(), "dispatching batch");
        }
        for mut pending in batch {
            let outcome = pending.execute();
            let completed_at_ms = self.now_ms();
            let mut record = pending.into_record();
            record.finish(outcome, completed_at_ms);
            match record.status {
                TicketStatus::Completed => report.completed += 1,
                _ => {
                    report.failed += 1;
                    tracing::warn!(
                        ticket_id = record.id,
                        agent_id = %record.agent_id,
                        action = %record.action_name,
                        error = record.error_message.as_deref().unwrap_or_default(),
                        "request failed"
                    );
                }
            }
            report.dispatched.push(record.id);
            self.publish(record);
        }
        report
    }

    /// Evicts expired terminal tickets from the completed cache and returns
    /// how many were removed. Also runs automatically every
    /// `cleanup_every_cycles` dispatch cycles.
    pub fn cleanup(&self) -> usize {
        let now_ms = self.now_ms();
        let mut state = lock_state(&self.state);
        self.cleanup_locked(&mut state, now_ms)
    }

    pub fn get_status(&self, ticket_id: u64) -> Option<TicketSnapshot> {
        let state = lock_state(&self.state);
        if let Some(record) = state.completed.get(&ticket_id) {
            return Some(record.snapshot());
        }
        if let Some(record) = state.executing.get(&ticket_id) {
            return Some(record.snapshot());
        }
        let queued = state
            .queues
            .items()
            .find(|pending| pending.record.id == ticket_id)
            .map(|pending| pending.record.snapshot());
        queued
    }

    pub fn get_queue_info(&self) -> QueueInfo {
        let state = lock_state(&self.state);
        QueueInfo {
            total_queued: state.queues.total_queued(),
            active_agents: state.queues.active_agents(),
            executing: state.executing.len(),
            completed_cached: state.completed.len(),
            agent_queues: state.queues.depths(),
            total_sessions: state.sessions.len(),
            tick_count: state.tick_count,
        }
    }

    pub fn get_active_sessions(&self) -> Vec<SessionSnapshot> {
        let now_ms = self.now_ms();
        let window_ms = duration_millis_to_i64_saturating(self.config.session_active_window);
        let state = lock_state(&self.state);
        state
            .sessions
            .values()
            .filter(|session| session.is_active(now_ms, window_ms))
            .map(|session| session.snapshot(now_ms, window_ms))
            .collect()
    }

    pub fn get_session(&self, agent_id: &str) -> Option<SessionSnapshot> {
        let now_ms = self.now_ms();
        let window_ms = duration_millis_to_i64_saturating(self.config.session_active_window);
        let state = lock_state(&self.state);
        state
            .sessions
            .get(&normalized_agent_id(agent_id))
            .map(|session| session.snapshot(now_ms, window_ms))
    }

    /// Activity log of one agent, oldest first. Empty for unknown agents.
    pub fn get_agent_log(&self, agent_id: &str) -> Vec<ActivityEntry> {
        let state = lock_state(&self.state);
        state
            .sessions
            .get(&normalized_agent_id(agent_id))
            .map(Session::activity_log)
            .unwrap_or_default()
    }

    fn enqueue(
        &self,
        agent_id: &str,
        action_name: &str,
        work: WorkFn,
        waiter: Option<mpsc::Sender<()>>,
    ) -> TicketSnapshot {
        let agent_id = normalized_agent_id(agent_id);
        let now_ms = self.now_ms();
        let log_capacity = self.config.activity_log_capacity;

        let mut state = lock_state(&self.state);
        let ticket_id = self.next_ticket_id.fetch_add(1, Ordering::SeqCst) + 1;
        let queue_position = state.queues.queue_len(&agent_id);
        let record = TicketRecord::new(
            ticket_id,
            agent_id.clone(),
            action_name.to_string(),
            queue_position,
            now_ms,
        );
        let snapshot = record.snapshot();
        state
            .queues
            .enqueue(&agent_id, PendingTicket::new(record, work));
        let session = state
            .sessions
            .entry(agent_id.clone())
            .or_insert_with(|| Session::new(agent_id.clone(), now_ms, log_capacity));
        session.log_action(action_name, now_ms);
        session.record_enqueued();
        if let Some(waiter) = waiter {
            state.waiters.insert(ticket_id, waiter);
        }
        drop(state);

        tracing::debug!(
            ticket_id,
            agent_id = %agent_id,
            action = action_name,
            queue_position,
            "request queued"
        );
        snapshot
    }

    fn publish(&self, record: TicketRecord) {
        let mut state = lock_state(&self.state);
        state.executing.remove(&record.id);
        if let Some(session) = state.sessions.get_mut(&record.agent_id) {
            session.record_completion(record.execution_time_ms());
        }
        let waiter = state.waiters.remove(&record.id);
        state.completed.insert(record.id, record);
        if let Some(waiter) = waiter {
            let _ = waiter.send(());
        }
    }

    fn cleanup_locked(&self, state: &mut SchedulerState, now_ms: i64) -> usize {
        let completed_retention_ms =
            duration_millis_to_i64_saturating(self.config.completed_retention);
        let timed_out_retention_ms =
            duration_millis_to_i64_saturating(self.config.timed_out_retention);
        let before = state.completed.len();
        state.completed.retain(|_, record| {
            let finished_at_ms = record.completed_at_ms.unwrap_or(record.submitted_at_ms);
            let retention_ms = if record.status == TicketStatus::TimedOut {
                timed_out_retention_ms
            } else {
                completed_retention_ms
            };
            now_ms.saturating_sub(finished_at_ms) <= retention_ms
        });
        let evicted = before - state.completed.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = state.completed.len(), "completed cache swept");
        }
        evicted
    }

    fn now_ms(&self) -> i64 {
        (self.clock)()
    }
}

struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn box_work<F, E>(work: F) -> WorkFn
where
    F: FnOnce() -> Result<serde_json::Value, E> + Send + 'static,
    E: fmt::Display,
{
    Box::new(move || work().map_err(|err| err.to_string()))
}

fn outcome_of(record: &TicketRecord) -> Result<serde_json::Value, TicketError> {
    let ticket_id = record.id;
    let message = || {
        record
            .error_message
            .clone()
            .unwrap_or_else(|| format!("request {ticket_id} ended with {}", record.status))
    };
    match record.status {
        TicketStatus::Completed => Ok(record.result.clone().unwrap_or(serde_json::Value::Null)),
        TicketStatus::Failed => Err(TicketError::Failed {
            ticket_id,
            message: message(),
        }),
        TicketStatus::TimedOut => Err(TicketError::TimedOut {
            ticket_id,
            message: message(),
        }),
        TicketStatus::Queued | TicketStatus::Executing => Err(TicketError::Missing { ticket_id }),
    }
}
