//! invupload-exec: Supervised process execution
//!
//! Runs external generation and upload commands while streaming their output
//! into progress records that can be polled while the command is running.

pub mod error;
pub mod progress;
pub mod result;
pub mod runner;
pub mod traits;

pub use error::ExecError;
pub use progress::{MemoryProgress, ProgressGuard, ProgressOutput, ProgressSnapshot, TracingProgress};
pub use result::{ProcessOutcome, ProcessState};
pub use runner::ShellProcess;
pub use traits::{ProgressRegistry, ProgressSink};
