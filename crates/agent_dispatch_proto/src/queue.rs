use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregate view of the scheduler queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub total_queued: usize,
    pub active_agents: usize,
    pub executing: usize,
    pub completed_cached: usize,
    pub agent_queues: BTreeMap<String, usize>,
    pub total_sessions: usize,
    pub tick_count: u64,
}
