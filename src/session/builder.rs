//! Builder for configuring and creating sessions.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::{RetryPolicy, Session};
use crate::dialect::ShellDialect;
use crate::error::{Result, SessionError};
use crate::transport::{AuthMethod, ConnectConfig, SshConnector};

/// Builder for SSH-backed sessions.
///
/// # Example
///
/// ```rust,no_run
/// use gaiash::SessionBuilder;
///
/// # async fn example() -> Result<(), gaiash::Error> {
/// let mut session = SessionBuilder::new("198.51.100.7")
///     .username("admin")
///     .password("admin")
///     .build()?;
///
/// session.connect().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    connect_timeout: Duration,
    command_timeout: Duration,
    idle_timeout: Duration,
    auto_reconnect: bool,
    retry: RetryPolicy,
    dialect: ShellDialect,
    terminal_width: u32,
    terminal_height: u32,
    expert_secret: Option<SecretString>,
}

impl SessionBuilder {
    /// Create a builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            auto_reconnect: true,
            retry: RetryPolicy::default(),
            dialect: ShellDialect::gaia(),
            terminal_width: 511,
            terminal_height: 24,
            expert_secret: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with a passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(passphrase.into()),
        };
        self
    }

    /// Provide the expert secret up front instead of relying on the
    /// login-password fallback.
    pub fn expert_secret(mut self, secret: impl Into<String>) -> Self {
        self.expert_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the connection timeout (default: 30 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default per-command timeout (default: 10 s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the idle timeout after which the session counts as stale
    /// (default: 300 s).
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Enable or disable reconnection inside the retry loop
    /// (default: enabled).
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the retry policy for transient connectivity failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Use a custom shell dialect instead of the Gaia default.
    pub fn dialect(mut self, dialect: ShellDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set terminal dimensions for the PTY.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Build the session.
    ///
    /// This does not connect; call
    /// [`connect()`](Session::connect) on the returned session.
    pub fn build(self) -> Result<Session<SshConnector>> {
        let username = self.username.ok_or_else(|| SessionError::InvalidConfig {
            message: "username is required".to_string(),
        })?;

        let config = ConnectConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.connect_timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
        };

        let mut session = Session::new(SshConnector, config, self.dialect);
        session.retry = self.retry;
        session.idle_timeout = self.idle_timeout;
        session.auto_reconnect = self.auto_reconnect;
        session.command_timeout = self.command_timeout;
        session.expert_secret = self.expert_secret;
        Ok(session)
    }
}
