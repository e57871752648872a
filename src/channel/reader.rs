//! Prompt-driven read loop over a shell transport.
//!
//! The remote shell gives no framing and no acknowledgements; the only
//! signals that a response is complete are a recognized prompt at the
//! tail of the output, a stretch of silence, or the connection closing.
//! This module implements that accumulation loop once, bounded by an
//! overall timeout, for every higher-level exchange.

use std::time::Duration;

use log::trace;
use regex::bytes::Regex;

use super::buffer::OutputBuffer;
use crate::error::Result;
use crate::transport::{ReadChunk, ShellTransport};

/// Why a read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The stop pattern matched the tail of the accumulated output.
    Prompt,

    /// No stop pattern was given and a full quiet period elapsed after
    /// at least one chunk of output.
    Quiet,

    /// The overall timeout elapsed before the stop pattern appeared.
    TimedOut,

    /// The remote side closed the connection mid-read.
    Closed,
}

/// Accumulate output into `buffer` until a terminating condition.
///
/// With `stop` set, the loop runs until the pattern matches the buffer
/// tail ([`ReadEnd::Prompt`]) or `timeout` elapses ([`ReadEnd::TimedOut`]).
/// Without it, a quiet period after the first output ends the read
/// ([`ReadEnd::Quiet`]); silence from the start runs out the full timeout.
pub async fn read_until<T: ShellTransport>(
    transport: &mut T,
    buffer: &mut OutputBuffer,
    stop: Option<&Regex>,
    quiet_period: Duration,
    timeout: Duration,
) -> Result<ReadEnd> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(match stop {
                Some(_) => ReadEnd::TimedOut,
                None => ReadEnd::Quiet,
            });
        }

        let wait = quiet_period.min(remaining);
        match transport.read_chunk(wait).await? {
            ReadChunk::Data(chunk) => {
                trace!("read {} bytes", chunk.len());
                buffer.push(&chunk);
                if let Some(pattern) = stop
                    && buffer.matches_tail(pattern)
                {
                    return Ok(ReadEnd::Prompt);
                }
            }
            ReadChunk::Quiet => {
                if stop.is_none() && !buffer.is_empty() {
                    return Ok(ReadEnd::Quiet);
                }
            }
            ReadChunk::Closed => return Ok(ReadEnd::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::transport::testing::{ScriptedTransport, Step, data};

    const QUIET: Duration = Duration::from_millis(10);
    const TIMEOUT: Duration = Duration::from_millis(120);

    fn transport(steps: Vec<Step>) -> ScriptedTransport {
        ScriptedTransport::new(steps, Arc::new(Mutex::new(Vec::new())))
    }

    #[tokio::test]
    async fn stops_on_prompt() {
        let mut t = transport(vec![data("show version\r\n"), data("R82\r\ngw-1> ")]);
        let mut buffer = OutputBuffer::new(100);
        let pattern = Regex::new(r"(?m)^[\w.\-]+>\s*$").unwrap();

        let end = read_until(&mut t, &mut buffer, Some(&pattern), QUIET, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(end, ReadEnd::Prompt);
        assert!(buffer.text().contains("R82"));
    }

    #[tokio::test]
    async fn times_out_without_prompt() {
        let mut t = transport(vec![data("still going...")]);
        let mut buffer = OutputBuffer::new(100);
        let pattern = Regex::new(r"never matches \$\$\$").unwrap();

        let end = read_until(&mut t, &mut buffer, Some(&pattern), QUIET, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(end, ReadEnd::TimedOut);
        assert_eq!(buffer.text(), "still going...");
    }

    #[tokio::test]
    async fn quiet_period_ends_unpatterned_read() {
        let mut t = transport(vec![data("banner text"), Step::Quiet, data("late")]);
        let mut buffer = OutputBuffer::new(100);

        let end = read_until(&mut t, &mut buffer, None, QUIET, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(end, ReadEnd::Quiet);
        // The late chunk was never consumed.
        assert_eq!(buffer.text(), "banner text");
    }

    #[tokio::test]
    async fn silence_from_start_runs_out_the_timeout() {
        let mut t = transport(vec![]);
        let mut buffer = OutputBuffer::new(100);

        let end = read_until(&mut t, &mut buffer, None, QUIET, Duration::from_millis(40))
            .await
            .unwrap();
        assert_eq!(end, ReadEnd::Quiet);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn reports_connection_close() {
        let mut t = transport(vec![data("rebooting now"), Step::Close]);
        let mut buffer = OutputBuffer::new(100);
        let pattern = Regex::new(r"(?m)^[\w.\-]+>\s*$").unwrap();

        let end = read_until(&mut t, &mut buffer, Some(&pattern), QUIET, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(end, ReadEnd::Closed);
        assert_eq!(buffer.text(), "rebooting now");
    }
}
