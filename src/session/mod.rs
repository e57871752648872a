//! Session layer: mode-aware command execution over one SSH connection.
//!
//! A [`Session`] owns the transport exclusively and tracks which CLI mode
//! the remote shell is in. Mode is never assumed: it starts `Unknown`,
//! is derived by probing observable output, and is re-derived from every
//! prompt the session sees. Commands go through a bounded retry loop
//! that reconnects on transient connectivity loss.
//!
//! One command is in flight at a time; `&mut self` on every operation
//! makes that a compile-time rule rather than a runtime lock.

mod builder;
mod mode;
mod result;
mod retry;

pub use builder::SessionBuilder;
pub use mode::Mode;
pub use result::CommandResult;
pub use retry::RetryPolicy;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::{OutputBuffer, ReadEnd, read_until};
use crate::dialect::ShellDialect;
use crate::error::{Error, Result, SessionError, TransportError};
use crate::transport::{ConnectConfig, Connector, ShellTransport};

/// Whether an expert secret is configured on the device.
///
/// The device answers the expert trigger with either a password challenge
/// or a "has not been defined" notice; password provisioning built on top
/// of the session branches on exactly this distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStatus {
    /// The challenge appeared; a secret is configured.
    Defined,

    /// The device reported that no secret has been defined yet.
    NotDefined,

    /// The response matched neither marker.
    Unknown,
}

type BoxedOp<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// One interactive session against a Gaia appliance.
///
/// Generic over the [`Connector`] so tests can drive the full control
/// flow against a scripted transport; production code uses
/// [`SessionBuilder`] to get a `Session<SshConnector>`.
pub struct Session<C: Connector> {
    connector: C,
    config: ConnectConfig,
    dialect: Arc<ShellDialect>,

    /// Combined pattern matching either mode's prompt.
    prompt_pattern: Regex,

    transport: Option<C::Transport>,
    mode: Mode,

    last_activity: Instant,
    idle_timeout: Duration,
    auto_reconnect: bool,

    retry: RetryPolicy,
    command_timeout: Duration,

    /// Cached after a successful expert entry; falls back to the login
    /// password when absent.
    expert_secret: Option<SecretString>,

    /// Unsolicited text captured right after connecting.
    login_banner: String,
}

impl<C: Connector> Session<C> {
    /// Create a disconnected session. Call [`connect`](Self::connect) to
    /// establish the transport.
    pub fn new(connector: C, config: ConnectConfig, dialect: ShellDialect) -> Self {
        let prompt_pattern = dialect.prompt_pattern();
        Self {
            connector,
            config,
            dialect: Arc::new(dialect),
            prompt_pattern,
            transport: None,
            mode: Mode::Unknown,
            last_activity: Instant::now(),
            idle_timeout: Duration::from_secs(300),
            auto_reconnect: true,
            retry: RetryPolicy::default(),
            command_timeout: Duration::from_secs(10),
            expert_secret: None,
            login_banner: String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Establish the connection, capture the login banner, and detect the
    /// initial CLI mode.
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Err(SessionError::AlreadyConnected.into());
        }

        info!("connecting to {}", self.config.socket_addr());
        let transport = self.connector.connect(&self.config).await?;
        self.transport = Some(transport);
        self.last_activity = Instant::now();

        let (banner, closed) = self.drain_output(self.dialect.banner_timeout).await?;
        if closed {
            self.drop_transport();
            return Err(TransportError::Disconnected.into());
        }
        self.login_banner = banner;

        let mode = self.detect_mode().await?;
        info!("connected to {} in {} mode", self.config.host, mode);
        Ok(())
    }

    /// Close the channel and connection. Idempotent; never fails.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("error during disconnect: {e}");
            }
            info!("disconnected from {}", self.config.host);
        }
        self.mode = Mode::Unknown;
        self.login_banner.clear();
    }

    /// Pure liveness query: the transport is open and the idle timeout
    /// has not elapsed. Never reconnects; see
    /// [`ensure_connected`](Self::ensure_connected) for that.
    pub fn is_connected(&self) -> bool {
        let open = self.transport.as_ref().is_some_and(|t| t.is_open());
        open && self.last_activity.elapsed() <= self.idle_timeout
    }

    /// Reconnect unless the session is already live.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        if self.transport.is_some() {
            info!(
                "session stale (idle limit {:?}), reconnecting",
                self.idle_timeout
            );
        }
        self.disconnect().await;
        self.connect().await
    }

    /// Poll for the device to come back, e.g. after a config-triggered
    /// reboot. Tries a full connect up to `max_attempts` times with a
    /// fixed delay between attempts.
    pub async fn wait_for_reconnect(&mut self, max_attempts: u32, delay: Duration) -> bool {
        info!("waiting for {} to become available", self.config.host);

        for attempt in 0..max_attempts {
            debug!("reconnection attempt {}/{}", attempt + 1, max_attempts);
            self.disconnect().await;
            match self.connect().await {
                Ok(()) => {
                    info!("reconnection successful");
                    return true;
                }
                Err(e) => debug!("not reachable yet: {e}"),
            }
            tokio::time::sleep(delay).await;
        }

        error!("failed to reconnect after {max_attempts} attempts");
        false
    }

    // ------------------------------------------------------------------
    // Mode control
    // ------------------------------------------------------------------

    /// The mode as of the last probe or prompt observation.
    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// Probe the shell to determine the active mode.
    ///
    /// Sends the dialect's probe command: clish rejects it with an
    /// "invalid command" message, expert mode accepts it and shows the
    /// expert prompt. When neither marker appears, a bare newline is sent
    /// and the resulting prompt matched directly.
    pub async fn detect_mode(&mut self) -> Result<Mode> {
        if self.transport.is_none() {
            return Err(SessionError::NotConnected.into());
        }

        let probe = self.dialect.probe_command.clone();
        debug!("probing CLI mode with {probe:?}");
        self.write_line(&probe).await?;
        let (output, closed) = self.drain_output(self.dialect.probe_timeout).await?;
        if closed {
            self.drop_transport();
            return Err(TransportError::Disconnected.into());
        }

        let lower = output.to_lowercase();
        let mode = if lower.contains(&self.dialect.invalid_marker)
            && lower.contains(&probe.to_lowercase())
        {
            Mode::Clish
        } else if lower.contains(&self.dialect.expert_marker) {
            Mode::Expert
        } else {
            self.write_line("").await?;
            let (prompt, closed) = self.drain_output(self.dialect.probe_timeout).await?;
            if closed {
                self.drop_transport();
                return Err(TransportError::Disconnected.into());
            }
            if self.dialect.expert_prompt.is_match(prompt.as_bytes()) {
                Mode::Expert
            } else if self.dialect.clish_prompt.is_match(prompt.as_bytes()) {
                Mode::Clish
            } else {
                warn!("could not determine CLI mode from output: {output:?}");
                Mode::Unknown
            }
        };

        debug!("detected {mode} mode");
        self.mode = mode;
        Ok(mode)
    }

    /// Enter expert mode via the password challenge.
    ///
    /// Idempotent: already being in expert mode succeeds without sending
    /// a single byte. Returns `Ok(false)` for every protocol-level
    /// failure — no challenge, no secret configured on the device, or a
    /// rejected secret — since those are expected outcomes the caller
    /// handles. The secret is never written unless the challenge
    /// actually appeared.
    pub async fn enter_expert(&mut self, secret: &str) -> Result<bool> {
        if self.transport.is_none() {
            return Err(SessionError::NotConnected.into());
        }

        if self.mode == Mode::Unknown {
            self.detect_mode().await?;
        }
        if self.mode == Mode::Expert {
            debug!("already in expert mode");
            self.expert_secret = Some(SecretString::from(secret.to_string()));
            return Ok(true);
        }
        if self.mode == Mode::Unknown {
            warn!("cannot enter expert mode: current mode is unknown");
            return Ok(false);
        }

        info!("entering expert mode");
        let trigger = self.dialect.expert_trigger.clone();
        self.write_line(&trigger).await?;
        let (output, closed) = self.drain_output(self.dialect.challenge_timeout).await?;
        if closed {
            self.drop_transport();
            return Err(TransportError::Disconnected.into());
        }

        // The "not been defined" notice also contains the word
        // "password", so it must be checked first.
        let lower = output.to_lowercase();
        if lower.contains(&self.dialect.secret_missing_marker) {
            warn!("expert password has not been defined on the device");
            return Ok(false);
        }

        if lower.contains(&self.dialect.challenge_marker) {
            trace!("challenge received, sending secret ({} chars)", secret.len());
            self.write_line(secret).await?;

            let mode = self.detect_mode().await?;
            if mode == Mode::Expert {
                info!("expert mode entered");
                self.expert_secret = Some(SecretString::from(secret.to_string()));
                Ok(true)
            } else {
                error!("expert mode not confirmed after challenge (current: {mode})");
                Ok(false)
            }
        } else if lower.contains(&self.dialect.expert_marker) {
            // The prompt changed without a challenge.
            debug!("expert prompt appeared without a challenge");
            self.mode = Mode::Expert;
            self.expert_secret = Some(SecretString::from(secret.to_string()));
            Ok(true)
        } else {
            error!("no password challenge after {trigger:?}: {output:?}");
            Ok(false)
        }
    }

    /// Leave expert mode back to clish.
    ///
    /// Idempotent: already being in clish succeeds without sending a
    /// byte. The result is confirmed by a fresh probe, never assumed.
    pub async fn exit_expert(&mut self) -> Result<bool> {
        if self.transport.is_none() {
            return Err(SessionError::NotConnected.into());
        }

        if self.mode == Mode::Unknown {
            self.detect_mode().await?;
        }
        if self.mode != Mode::Expert {
            debug!("not in expert mode, nothing to exit");
            return Ok(true);
        }

        info!("exiting expert mode");
        let exit = self.dialect.exit_command.clone();
        self.write_line(&exit).await?;
        let (_, closed) = self.drain_output(self.dialect.probe_timeout).await?;
        if closed {
            self.drop_transport();
            return Err(TransportError::Disconnected.into());
        }

        let mode = self.detect_mode().await?;
        Ok(mode == Mode::Clish)
    }

    /// Bring the session into `target` mode, switching only if needed.
    ///
    /// The transition table is checked centrally here; `Unknown` is not a
    /// valid target, and an unresolvable current mode fails rather than
    /// guessing. Expert entry uses the cached secret, falling back to
    /// the login password (the appliance default after provisioning).
    pub async fn ensure_mode(&mut self, target: Mode) -> Result<bool> {
        if target == Mode::Unknown {
            return Err(SessionError::UnsupportedTransition {
                from: self.mode,
                to: target,
            }
            .into());
        }

        if self.mode == Mode::Unknown {
            self.detect_mode().await?;
        }
        if self.mode == target {
            trace!("already in {target} mode");
            return Ok(true);
        }
        if !self.mode.can_transition_to(target) {
            return Err(SessionError::UnsupportedTransition {
                from: self.mode,
                to: target,
            }
            .into());
        }

        match target {
            Mode::Expert => {
                let secret = match self
                    .expert_secret
                    .as_ref()
                    .or_else(|| self.config.login_password())
                {
                    Some(secret) => secret.expose_secret().to_string(),
                    None => {
                        warn!("no expert secret available for mode switch");
                        return Ok(false);
                    }
                };
                self.enter_expert(&secret).await
            }
            Mode::Clish => self.exit_expert().await,
            Mode::Unknown => unreachable!("rejected above"),
        }
    }

    /// Check whether an expert secret is configured without entering
    /// expert mode. A live challenge is cancelled with Ctrl-C so the
    /// shell returns to its prompt.
    pub async fn probe_expert_secret(&mut self) -> Result<SecretStatus> {
        if self.transport.is_none() {
            return Err(SessionError::NotConnected.into());
        }

        if self.mode == Mode::Unknown {
            self.detect_mode().await?;
        }
        if self.mode == Mode::Expert {
            // Getting here required the challenge in the first place.
            return Ok(SecretStatus::Defined);
        }

        debug!("probing expert secret status");
        let trigger = self.dialect.expert_trigger.clone();
        self.write_line(&trigger).await?;
        let (output, closed) = self.drain_output(self.dialect.challenge_timeout).await?;
        if closed {
            self.drop_transport();
            return Err(TransportError::Disconnected.into());
        }

        let lower = output.to_lowercase();
        if lower.contains(&self.dialect.secret_missing_marker) {
            return Ok(SecretStatus::NotDefined);
        }
        if lower.contains(&self.dialect.challenge_marker) {
            self.write_text("\x03").await?;
            let _ = self.drain_output(self.dialect.probe_timeout).await?;
            return Ok(SecretStatus::Defined);
        }

        warn!("unexpected response while probing expert secret: {output:?}");
        Ok(SecretStatus::Unknown)
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    /// Execute in whatever mode is currently active, with the default
    /// command timeout.
    pub async fn execute(&mut self, command: &str) -> Result<CommandResult> {
        self.execute_with(command, None, self.command_timeout).await
    }

    /// Execute after ensuring the session is in `mode`.
    pub async fn execute_in(&mut self, command: &str, mode: Mode) -> Result<CommandResult> {
        self.execute_with(command, Some(mode), self.command_timeout)
            .await
    }

    /// Execute a clish command, switching mode first when necessary.
    pub async fn execute_clish(&mut self, command: &str) -> Result<CommandResult> {
        self.execute_in(command, Mode::Clish).await
    }

    /// Execute an expert (bash) command, switching mode first when
    /// necessary.
    pub async fn execute_expert(&mut self, command: &str) -> Result<CommandResult> {
        self.execute_in(command, Mode::Expert).await
    }

    /// Execute one command with full control over mode and timeout.
    ///
    /// Transient connectivity failures are retried per the session's
    /// [`RetryPolicy`], reconnecting between attempts. Everything the
    /// device itself decides — rejected commands, silence past the
    /// timeout, the connection dropping mid-command — comes back as a
    /// [`CommandResult`], not an error, and is never retried.
    pub async fn execute_with(
        &mut self,
        command: &str,
        target_mode: Option<Mode>,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let command = command.to_string();
        self.run_with_retry("command execution", move |session| {
            let command = command.clone();
            Box::pin(async move {
                session
                    .execute_attempt(&command, target_mode, timeout)
                    .await
            })
        })
        .await
    }

    /// One unretried execution attempt.
    async fn execute_attempt(
        &mut self,
        command: &str,
        target_mode: Option<Mode>,
        timeout: Duration,
    ) -> Result<CommandResult> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected.into());
        }

        let start = Instant::now();

        if let Some(target) = target_mode
            && target != self.mode
        {
            debug!("switching to {target} mode for {command:?}");
            if !self.ensure_mode(target).await? {
                return Ok(CommandResult::failed(
                    command,
                    "",
                    format!("failed to switch to {target} mode"),
                    start.elapsed(),
                ));
            }
        }

        trace!("sending {command:?}");
        self.write_line(command).await?;

        let mut buffer = OutputBuffer::new(self.dialect.search_depth);
        let quiet = self.dialect.quiet_period;
        let transport = self
            .transport
            .as_mut()
            .ok_or(Error::Session(SessionError::NotConnected))?;
        let end = read_until(
            transport,
            &mut buffer,
            Some(&self.prompt_pattern),
            quiet,
            timeout,
        )
        .await?;
        self.last_activity = Instant::now();

        match end {
            ReadEnd::Prompt => {
                // The matched prompt tells us which mode we ended up in.
                if buffer.matches_tail(&self.dialect.expert_prompt) {
                    self.mode = Mode::Expert;
                } else if buffer.matches_tail(&self.dialect.clish_prompt) {
                    self.mode = Mode::Clish;
                }

                let output = buffer.take_text();
                let error_message = self
                    .dialect
                    .find_error_marker(&output)
                    .map(|marker| format!("output contains failure marker {marker:?}"));
                let result =
                    CommandResult::completed(command, output, error_message, start.elapsed());
                debug!(
                    "{command:?} completed in {:?} (success: {})",
                    result.elapsed, result.success
                );
                Ok(result)
            }
            ReadEnd::TimedOut => {
                warn!("{command:?} timed out after {timeout:?}");
                Ok(CommandResult::failed(
                    command,
                    buffer.take_text(),
                    format!("timed out after {timeout:?} waiting for prompt"),
                    start.elapsed(),
                ))
            }
            ReadEnd::Closed => {
                warn!("connection closed during {command:?}; device may be rebooting");
                self.drop_transport();
                Ok(CommandResult::lost(
                    command,
                    buffer.take_text(),
                    start.elapsed(),
                ))
            }
            ReadEnd::Quiet => unreachable!("quiet end requires no stop pattern"),
        }
    }

    // ------------------------------------------------------------------
    // Raw primitives
    // ------------------------------------------------------------------

    /// Write raw text with no line terminator appended.
    ///
    /// Together with [`read_available`](Self::read_available) this is the
    /// contract heredoc-style file uploads build on: the caller streams
    /// content and a sentinel line through the shell itself.
    pub async fn write_text(&mut self, text: &str) -> Result<()> {
        trace!("raw write of {} bytes", text.len());
        self.transport_mut()?.write(text.as_bytes()).await?;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Read whatever output arrives until a quiet period or `timeout`.
    ///
    /// If the connection closes mid-read, the text accumulated so far is
    /// returned and the session is left disconnected.
    pub async fn read_available(&mut self, timeout: Duration) -> Result<String> {
        let (text, closed) = self.drain_output(timeout).await?;
        if closed {
            debug!("connection closed during read");
            self.drop_transport();
        }
        Ok(text)
    }

    // ------------------------------------------------------------------
    // Accessors & tuning
    // ------------------------------------------------------------------

    /// Unsolicited text the device printed at login.
    ///
    /// First-boot detection (the appliance advertises its initial-setup
    /// wizard here) is the caller's business; the session just keeps the
    /// evidence.
    pub fn login_banner(&self) -> &str {
        &self.login_banner
    }

    /// The dialect this session matches output against.
    pub fn dialect(&self) -> &ShellDialect {
        &self.dialect
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry = policy;
    }

    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.auto_reconnect = enabled;
    }

    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    /// Provide the expert secret ahead of the first mode switch.
    pub fn set_expert_secret(&mut self, secret: impl Into<String>) {
        self.expert_secret = Some(SecretString::from(secret.into()));
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Bounded retry executor for transient connectivity failures.
    ///
    /// Runs `op` up to `retry.max_attempts` times. Only transient
    /// transport errors are retried; before each retry the session
    /// reconnects if the liveness query reports it dead (a failed
    /// reconnect does not abort the loop — the next attempt fails fast).
    /// On exhaustion the last error is wrapped with the attempt count and
    /// whether a reconnect was tried, so "device unreachable" stays
    /// distinguishable from "device rejected the command".
    async fn run_with_retry<T, F>(&mut self, what: &str, mut op: F) -> Result<T>
    where
        F: for<'a> FnMut(&'a mut Self) -> BoxedOp<'a, T>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut reconnect_attempted = false;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                info!(
                    "retrying {what} in {delay:?} (attempt {}/{attempts})",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;

                if !self.is_connected() && self.auto_reconnect {
                    reconnect_attempted = true;
                    if let Err(e) = self.ensure_connected().await {
                        warn!("reconnect failed: {e}");
                    }
                }
            }

            match op(self).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("{what} succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    warn!("{what} failed (attempt {}/{attempts}): {e}", attempt + 1);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        error!("{what} failed after {attempts} attempts");
        let source = last_error.expect("at least one attempt ran");
        Err(SessionError::RetriesExhausted {
            attempts,
            reconnect_attempted,
            source: Box::new(source),
        }
        .into())
    }

    fn transport_mut(&mut self) -> Result<&mut C::Transport> {
        self.transport
            .as_mut()
            .ok_or(Error::Session(SessionError::NotConnected))
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let data = format!("{line}\n");
        self.transport_mut()?.write(data.as_bytes()).await?;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Accumulate output until a quiet period or `timeout`; the flag is
    /// set when the connection closed mid-read.
    async fn drain_output(&mut self, timeout: Duration) -> Result<(String, bool)> {
        let mut buffer = OutputBuffer::new(self.dialect.search_depth);
        let quiet = self.dialect.quiet_period;
        let transport = self
            .transport
            .as_mut()
            .ok_or(Error::Session(SessionError::NotConnected))?;
        let end = read_until(transport, &mut buffer, None, quiet, timeout).await?;
        self.last_activity = Instant::now();
        Ok((buffer.take_text(), end == ReadEnd::Closed))
    }

    fn drop_transport(&mut self) {
        self.transport = None;
        self.mode = Mode::Unknown;
    }
}
