use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the work item a thread drives (an actor id, a task name).
pub type ThreadKey = String;

/// Name of a location in the world graph, e.g. a room name.
pub type Location = String;

/// Process identifier, unique for the lifetime of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid:{}", self.0)
    }
}

/// Thread identifier. Allocated monotonically, so ordering by `Tid` is
/// ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tid(pub u64);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid:{}", self.0)
    }
}

/// Why a thread left its process's thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    /// The continuation ran to completion.
    Completed,
    /// The work item behind the thread no longer exists.
    Ceased,
    /// The owning process (or a caller) tore the thread down.
    Cancelled,
    /// The thread failed too many consecutive steps and was reaped.
    Faulted,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Completed => write!(f, "Completed"),
            ExitReason::Ceased => write!(f, "Ceased"),
            ExitReason::Cancelled => write!(f, "Cancelled"),
            ExitReason::Faulted => write!(f, "Faulted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_orders_by_creation() {
        assert!(Tid(1) < Tid(2));
        assert_eq!(Tid(7).to_string(), "tid:7");
        assert_eq!(Pid(0).to_string(), "pid:0");
    }

    #[test]
    fn exit_reason_roundtrips_through_json() {
        let json = serde_json::to_string(&ExitReason::Ceased).unwrap();
        assert_eq!(json, "\"Ceased\"");
        let back: ExitReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ExitReason::Ceased);
    }
}
