use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp_ms: i64,
    pub action_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub agent_id: String,
    pub connected_at_ms: i64,
    pub last_activity_at_ms: i64,
    #[serde(default)]
    pub current_action: Option<String>,
    pub total_actions: u64,
    pub queued_requests: u64,
    pub completed_requests: u64,
    pub total_response_time_ms: u64,
    pub average_response_time_ms: f64,
    pub is_active: bool,
}
