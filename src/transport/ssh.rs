//! SSH transport implementation using russh.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, ConnectConfig};
use super::{Connector, ReadChunk, ShellTransport};
use crate::error::{Result, TransportError};

/// Production [`Connector`] establishing [`SshTransport`]s.
#[derive(Debug, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(&mut self, config: &ConnectConfig) -> Result<SshTransport> {
        SshTransport::connect(config).await
    }
}

/// Interactive PTY shell over a russh client connection.
pub struct SshTransport {
    /// The russh session handle.
    handle: Handle<SshHandler>,

    /// The interactive shell channel.
    channel: Channel<Msg>,

    /// Set once a read observes EOF or a channel close.
    closed: bool,
}

impl SshTransport {
    /// Connect, authenticate, and allocate an interactive shell channel.
    pub async fn connect(config: &ConnectConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config::default());

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
        };

        let mut handle = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(TransportError::Ssh)?;

        Self::authenticate(&mut handle, config).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(Self {
            handle,
            channel,
            closed: false,
        })
    }

    /// Authenticate with the server.
    async fn authenticate(handle: &mut Handle<SshHandler>, config: &ConnectConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => handle
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => handle
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_deref())
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                handle
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }
}

impl ShellTransport for SshTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn read_chunk(&mut self, wait: Duration) -> Result<ReadChunk> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(ReadChunk::Quiet);
            }

            match tokio::time::timeout(remaining, self.channel.wait()).await {
                Err(_) => return Ok(ReadChunk::Quiet),
                Ok(None) => {
                    self.closed = true;
                    return Ok(ReadChunk::Closed);
                }
                Ok(Some(ChannelMsg::Data { data })) => return Ok(ReadChunk::Data(data.to_vec())),
                Ok(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    return Ok(ReadChunk::Data(data.to_vec()));
                }
                Ok(Some(ChannelMsg::Eof)) | Ok(Some(ChannelMsg::Close)) => {
                    self.closed = true;
                    return Ok(ReadChunk::Closed);
                }
                // Exit status, window adjustments, and other bookkeeping
                // messages carry no shell output.
                Ok(Some(_)) => continue,
            }
        }
    }

    fn is_open(&self) -> bool {
        !self.closed && !self.handle.is_closed()
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            let _ = self.channel.eof().await;
            self.closed = true;
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// SSH client handler for russh.
///
/// Host keys are accepted as presented: appliances in this workflow are
/// freshly imaged and re-keyed on every rebuild, so pinning would break
/// the provisioning loop.
struct SshHandler {
    host: String,
    port: u16,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        debug!(
            "accepting {} host key from {}:{}",
            server_public_key.algorithm(),
            self.host,
            self.port
        );
        Ok(true)
    }
}
