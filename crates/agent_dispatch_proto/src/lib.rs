//! Snapshot and status types shared between the request scheduler and its callers.

pub mod queue;
pub mod session;
pub mod ticket;

pub use queue::QueueInfo;
pub use session::{ActivityEntry, SessionSnapshot};
pub use ticket::{normalized_agent_id, TicketSnapshot, TicketStatus, ANONYMOUS_AGENT_ID};
