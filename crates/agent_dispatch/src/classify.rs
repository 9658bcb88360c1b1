//! Read/write classification of action names.
//!
//! Reads may share a dispatch batch with reads from other agents. Writes are
//! always dispatched alone.

use std::fmt;

const READ_EXACT: &[&str] = &[
    "ping",
    "scene/info",
    "scene/hierarchy",
    "editor/state",
    "project/info",
    "console/log",
];
const READ_SUFFIXES: &[&str] = &["/info", "/list", "/log", "/stats", "/get"];
const READ_PREFIXES: &[&str] = &[
    "search/",
    "agents/",
    "queue/",
    "profiler/",
    "debugger/",
    "selection/get",
    "selection/find",
];
const READ_FRAGMENTS: &[&str] = &["/info", "/list", "/get-", "/status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Read,
    Write,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Read => "read",
            RequestKind::Write => "write",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify_action(action_name: &str) -> RequestKind {
    if is_read_action(action_name) {
        RequestKind::Read
    } else {
        RequestKind::Write
    }
}

pub fn is_read_action(action_name: &str) -> bool {
    let name = action_name.to_lowercase();
    READ_EXACT.contains(&name.as_str())
        || READ_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || READ_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || READ_FRAGMENTS.iter().any(|fragment| name.contains(fragment))
}
