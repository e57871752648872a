//! Result type for command execution.

use std::fmt;
use std::time::Duration;

/// Outcome of executing one command.
///
/// Command failures are data, not errors: a rejected command, a timeout,
/// or a mid-command disconnect all come back as a `CommandResult` so
/// normal control flow drives the caller's logic. Only transport and
/// session faults surface as [`Error`](crate::Error).
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The command that was sent.
    pub command: String,

    /// Heuristic verdict: no recognized failure marker in the output.
    pub success: bool,

    /// The raw accumulated output, including the command echo and the
    /// trailing prompt when one was seen.
    pub output: String,

    /// Why the command was classified as failed, when it was.
    pub error_message: Option<String>,

    /// The connection closed while waiting for output.
    ///
    /// Deliberately distinct from `success`: a command that reboots the
    /// device drops the connection by design, and callers expecting that
    /// treat this as the successful outcome.
    pub connection_lost: bool,

    /// Wall-clock time from write to classification.
    pub elapsed: Duration,
}

impl CommandResult {
    /// Classify a completed exchange; success is the absence of a marker.
    pub(crate) fn completed(
        command: impl Into<String>,
        output: impl Into<String>,
        error_message: Option<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            success: error_message.is_none(),
            output: output.into(),
            error_message,
            connection_lost: false,
            elapsed,
        }
    }

    /// A failure that never reached classification (mode switch, timeout).
    pub(crate) fn failed(
        command: impl Into<String>,
        output: impl Into<String>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            success: false,
            output: output.into(),
            error_message: Some(message.into()),
            connection_lost: false,
            elapsed,
        }
    }

    /// The connection dropped mid-command.
    pub(crate) fn lost(
        command: impl Into<String>,
        output: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            success: false,
            output: output.into(),
            error_message: Some("connection closed while waiting for output".to_string()),
            connection_lost: true,
            elapsed,
        }
    }

    /// Iterate over the output lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Whether the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.output.contains(pattern)
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.output)
    }
}
