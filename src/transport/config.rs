//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// SSH connection configuration.
#[derive(Debug)]
pub struct ConnectConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Connection timeout.
    pub timeout: Duration,

    /// Terminal width for the PTY.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,
}

impl ConnectConfig {
    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The login password, when password authentication is configured.
    ///
    /// Used as the fallback expert secret, matching the appliance default
    /// where the expert password starts out equal to the admin password.
    pub fn login_password(&self) -> Option<&SecretString> {
        match &self.auth {
            AuthMethod::Password(password) => Some(password),
            _ => None,
        }
    }
}

/// Authentication method for SSH connections.
#[derive(Debug)]
pub enum AuthMethod {
    /// No authentication (for testing only).
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_formatting() {
        let config = ConnectConfig {
            host: "198.51.100.7".to_string(),
            port: 2222,
            username: "admin".to_string(),
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
        };
        assert_eq!(config.socket_addr(), "198.51.100.7:2222");
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let config = ConnectConfig {
            host: "gw".to_string(),
            port: 22,
            username: "admin".to_string(),
            auth: AuthMethod::Password(SecretString::from("vpn123".to_string())),
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("vpn123"));
    }

    #[test]
    fn login_password_only_for_password_auth() {
        let keyed = ConnectConfig {
            host: "gw".to_string(),
            port: 22,
            username: "admin".to_string(),
            auth: AuthMethod::PrivateKey {
                path: PathBuf::from("/tmp/id_ed25519"),
                passphrase: None,
            },
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
        };
        assert!(keyed.login_password().is_none());
    }
}
