use agent_dispatch_proto::TicketStatus;

/// Outcome of a synchronous submission that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    #[error("request {ticket_id} failed: {message}")]
    Failed { ticket_id: u64, message: String },
    #[error("request {ticket_id} timed out: {message}")]
    TimedOut { ticket_id: u64, message: String },
    #[error("request {ticket_id} has no recorded outcome")]
    Missing { ticket_id: u64 },
}

impl TicketError {
    pub fn ticket_id(&self) -> u64 {
        match self {
            TicketError::Failed { ticket_id, .. }
            | TicketError::TimedOut { ticket_id, .. }
            | TicketError::Missing { ticket_id } => *ticket_id,
        }
    }

    /// Status the ticket carried when the error was produced. `Missing` has none.
    pub fn status(&self) -> Option<TicketStatus> {
        match self {
            TicketError::Failed { .. } => Some(TicketStatus::Failed),
            TicketError::TimedOut { .. } => Some(TicketStatus::TimedOut),
            TicketError::Missing { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TicketError::Failed { message, .. } | TicketError::TimedOut { message, .. } => {
                message.clone()
            }
            TicketError::Missing { .. } => self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("dispatch driver already running")]
    AlreadyRunning,
    #[error("dispatch driver not running")]
    NotRunning,
    #[error("failed to spawn dispatch thread: {reason}")]
    ThreadSpawnFailed { reason: String },
    #[error("failed to join dispatch thread")]
    ThreadJoinFailed,
}
