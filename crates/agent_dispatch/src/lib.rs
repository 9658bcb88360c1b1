//! Fair request scheduling for many agents sharing one execution context.
//!
//! Agents submit named units of work that are queued per agent and executed
//! one batch per dispatch cycle. Agents are served round-robin; consecutive
//! read-only requests from different agents may share a batch, writes never do.

mod classify;
mod config;
mod driver;
mod error;
mod runtime_util;
mod scheduler;
mod selection;
mod session;
mod ticket;

pub use classify::{classify_action, is_read_action, RequestKind};
pub use config::{
    ConfigError, SchedulerConfig, DEFAULT_CONFIG_FILE_NAME, ENV_ACTIVITY_LOG_CAPACITY,
    ENV_CLEANUP_EVERY_CYCLES, ENV_COMPLETED_RETENTION_MS, ENV_MAX_READ_BATCH,
    ENV_SESSION_ACTIVE_WINDOW_MS, ENV_TICK_INTERVAL_MS, ENV_TIMED_OUT_RETENTION_MS,
    ENV_WAIT_TIMEOUT_MS,
};
pub use driver::DispatchDriver;
pub use error::{DriverError, TicketError};
pub use runtime_util::now_unix_ms;
pub use scheduler::{Clock, CycleReport, RequestScheduler};
pub use ticket::WorkResult;

pub use agent_dispatch_proto::{
    ActivityEntry, QueueInfo, SessionSnapshot, TicketSnapshot, TicketStatus, ANONYMOUS_AGENT_ID,
};
