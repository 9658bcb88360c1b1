//! Per-agent activity tracking.

use std::collections::VecDeque;

use agent_dispatch_proto::{ActivityEntry, SessionSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Session {
    agent_id: String,
    connected_at_ms: i64,
    last_activity_at_ms: i64,
    current_action: Option<String>,
    total_actions: u64,
    queued_requests: u64,
    completed_requests: u64,
    total_response_time_ms: u64,
    activity_log: VecDeque<ActivityEntry>,
    log_capacity: usize,
}

impl Session {
    pub fn new(agent_id: impl Into<String>, now_ms: i64, log_capacity: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            connected_at_ms: now_ms,
            last_activity_at_ms: now_ms,
            current_action: None,
            total_actions: 0,
            queued_requests: 0,
            completed_requests: 0,
            total_response_time_ms: 0,
            activity_log: VecDeque::with_capacity(log_capacity.min(128)),
            log_capacity: log_capacity.max(1),
        }
    }

    pub fn log_action(&mut self, action_name: &str, now_ms: i64) {
        self.current_action = Some(action_name.to_string());
        self.last_activity_at_ms = now_ms;
        self.total_actions = self.total_actions.saturating_add(1);
        while self.activity_log.len() >= self.log_capacity {
            self.activity_log.pop_front();
        }
        self.activity_log.push_back(ActivityEntry {
            timestamp_ms: now_ms,
            action_name: action_name.to_string(),
        });
    }

    pub fn record_enqueued(&mut self) {
        self.queued_requests = self.queued_requests.saturating_add(1);
    }

    pub fn record_dispatched(&mut self) {
        self.queued_requests = self.queued_requests.saturating_sub(1);
    }

    pub fn record_completion(&mut self, response_time_ms: i64) {
        self.completed_requests = self.completed_requests.saturating_add(1);
        if let Ok(response_time_ms) = u64::try_from(response_time_ms) {
            self.total_response_time_ms =
                self.total_response_time_ms.saturating_add(response_time_ms);
        }
    }

    pub fn average_response_time_ms(&self) -> f64 {
        if self.completed_requests == 0 {
            return 0.0;
        }
        self.total_response_time_ms as f64 / self.completed_requests as f64
    }

    pub fn is_active(&self, now_ms: i64, active_window_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_activity_at_ms) < active_window_ms
    }

    pub fn activity_log(&self) -> Vec<ActivityEntry> {
        self.activity_log.iter().cloned().collect()
    }

    pub fn snapshot(&self, now_ms: i64, active_window_ms: i64) -> SessionSnapshot {
        SessionSnapshot {
            agent_id: self.agent_id.clone(),
            connected_at_ms: self.connected_at_ms,
            last_activity_at_ms: self.last_activity_at_ms,
            current_action: self.current_action.clone(),
            total_actions: self.total_actions,
            queued_requests: self.queued_requests,
            completed_requests: self.completed_requests,
            total_response_time_ms: self.total_response_time_ms,
            average_response_time_ms: self.average_response_time_ms(),
            is_active: self.is_active(now_ms, active_window_ms),
        }
    }
}
