//! Ticket lifecycle types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Agent id used for submissions that arrive without one.
pub const ANONYMOUS_AGENT_ID: &str = "anonymous";

pub fn normalized_agent_id(agent_id: &str) -> String {
    if agent_id.is_empty() {
        ANONYMOUS_AGENT_ID.to_string()
    } else {
        agent_id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Queued,
    Executing,
    Completed,
    Failed,
    TimedOut,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Queued => "queued",
            TicketStatus::Executing => "executing",
            TicketStatus::Completed => "completed",
            TicketStatus::Failed => "failed",
            TicketStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TicketStatus::Completed | TicketStatus::Failed | TicketStatus::TimedOut
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(TicketStatus::Queued),
            "executing" => Ok(TicketStatus::Executing),
            "completed" => Ok(TicketStatus::Completed),
            "failed" => Ok(TicketStatus::Failed),
            "timed_out" | "timedout" => Ok(TicketStatus::TimedOut),
            _ => Err(format!("unknown ticket status: {raw}")),
        }
    }
}

/// Point-in-time view of one submitted request.
///
/// `queue_position` is the depth of the agent's queue when the request was
/// enqueued. It is not refreshed as earlier requests drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub ticket_id: u64,
    pub agent_id: String,
    pub action_name: String,
    pub status: TicketStatus,
    pub queue_position: usize,
    pub submitted_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<i64>,
    pub execution_time_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TicketSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_agent_ids_normalize_to_anonymous() {
        assert_eq!(normalized_agent_id(""), ANONYMOUS_AGENT_ID);
        assert_eq!(normalized_agent_id("   "), "   ");
        assert_eq!(normalized_agent_id("agent-7"), "agent-7");
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TicketStatus::Queued,
            TicketStatus::Executing,
            TicketStatus::Completed,
            TicketStatus::Failed,
            TicketStatus::TimedOut,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
        assert!("done".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn snapshot_json_omits_unset_outcome_fields() {
        let snapshot = TicketSnapshot {
            ticket_id: 3,
            agent_id: "a".to_string(),
            action_name: "scene/info".to_string(),
            status: TicketStatus::Queued,
            queue_position: 0,
            submitted_at_ms: 10,
            completed_at_ms: None,
            execution_time_ms: -1,
            result: None,
            error_message: None,
        };
        let json = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert_eq!(json["status"], "queued");
        assert!(json.get("result").is_none());
        assert!(json.get("completed_at_ms").is_none());
    }
}
