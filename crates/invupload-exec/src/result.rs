//! Process state and outcome types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Idle,
    Running { pid: u32 },
    /// Exited with status 0
    Completed,
    /// Non-zero exit, killed, or supervision error
    Failed,
}

/// Result of a finished process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Process id of the child
    pub pid: u32,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Terminal status as written to the progress record
    pub status: String,
    /// Number of output lines forwarded
    pub lines: usize,
    /// Time between spawn and exit
    pub duration: Duration,
}

impl ProcessOutcome {
    /// Check if the process exited with code 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
