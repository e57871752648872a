//! Transport layer: raw I/O primitives over an interactive shell channel.
//!
//! Higher layers never touch the SSH library directly; they speak to a
//! [`ShellTransport`], and re-establish one through a [`Connector`] when
//! the connection is lost.

mod config;
mod ssh;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AuthMethod, ConnectConfig};
pub use ssh::{SshConnector, SshTransport};

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Outcome of one bounded read from the remote shell.
#[derive(Debug)]
pub enum ReadChunk {
    /// Bytes arrived.
    Data(Vec<u8>),

    /// Nothing arrived within the wait interval.
    Quiet,

    /// The remote side closed the channel or connection.
    Closed,
}

/// Raw byte-level access to an interactive remote shell.
///
/// A transport is exclusively owned by one [`Session`](crate::Session);
/// there is no internal locking, and interleaving writers is undefined
/// behavior on the remote side.
pub trait ShellTransport: Send {
    /// Write raw bytes to the shell. No line terminator is appended.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait up to `wait` for the next chunk of output.
    fn read_chunk(&mut self, wait: Duration) -> impl Future<Output = Result<ReadChunk>> + Send;

    /// Whether the underlying channel is still open.
    ///
    /// This is a local bookkeeping check; a dead peer is only discovered
    /// by a read observing the close.
    fn is_open(&self) -> bool;

    /// Close the channel and the connection beneath it.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Establishes a [`ShellTransport`] from connection parameters.
///
/// Kept separate from the transport so a session can reconnect after the
/// device reboots or the idle timeout expires.
pub trait Connector: Send {
    type Transport: ShellTransport;

    fn connect(
        &mut self,
        config: &ConnectConfig,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}
