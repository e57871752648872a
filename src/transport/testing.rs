//! Scripted in-memory transport for unit tests.
//!
//! Reads come from a predetermined script; writes are recorded into a
//! shared log so tests can assert exactly which bytes a session sent
//! (including that none were sent at all).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ConnectConfig, Connector, ReadChunk, ShellTransport};
use crate::error::{Result, TransportError};

/// Shared record of everything written to scripted transports.
pub(crate) type WriteLog = Arc<Mutex<Vec<String>>>;

/// One scripted read outcome.
pub(crate) enum Step {
    /// Deliver these bytes.
    Data(String),

    /// One full quiet interval with no data.
    Quiet,

    /// The remote side closes the connection.
    Close,
}

pub(crate) fn data(text: &str) -> Step {
    Step::Data(text.to_string())
}

pub(crate) struct ScriptedTransport {
    steps: VecDeque<Step>,
    writes: WriteLog,
    open: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>, writes: WriteLog) -> Self {
        Self {
            steps: steps.into(),
            writes,
            open: true,
        }
    }

}

impl ShellTransport for ScriptedTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Disconnected.into());
        }
        self.writes
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(data).to_string());
        Ok(())
    }

    async fn read_chunk(&mut self, wait: Duration) -> Result<ReadChunk> {
        if !self.open {
            return Ok(ReadChunk::Closed);
        }
        match self.steps.pop_front() {
            Some(Step::Data(text)) => Ok(ReadChunk::Data(text.into_bytes())),
            Some(Step::Quiet) | None => {
                // Model real silence: the wait interval elapses in full.
                tokio::time::sleep(wait).await;
                Ok(ReadChunk::Quiet)
            }
            Some(Step::Close) => {
                self.open = false;
                Ok(ReadChunk::Closed)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// Hands out scripted transports in order; `None` entries fail the
/// connection attempt. Counts attempts for reconnect assertions.
pub(crate) struct ScriptedConnector {
    transports: VecDeque<Option<ScriptedTransport>>,
    pub(crate) connects: Arc<Mutex<usize>>,
}

impl ScriptedConnector {
    pub(crate) fn new(transports: Vec<Option<ScriptedTransport>>) -> Self {
        Self {
            transports: transports.into(),
            connects: Arc::new(Mutex::new(0)),
        }
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&mut self, _config: &ConnectConfig) -> Result<ScriptedTransport> {
        *self.connects.lock().unwrap() += 1;
        match self.transports.pop_front() {
            Some(Some(transport)) => Ok(transport),
            _ => Err(TransportError::Disconnected.into()),
        }
    }
}
