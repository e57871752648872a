//! # Gaiash
//!
//! Async SSH session and mode-control library for Check Point Gaia
//! firewalls.
//!
//! Gaia exposes no structured API over SSH — only the interactive clish
//! shell, with a privileged expert (bash) mode behind a password
//! challenge. Everything the shell says is free text; which mode is
//! active, whether a command finished, even whether the box just
//! rebooted must all be inferred from output and timing. Gaiash owns
//! that inference so automation on top of it can just issue commands.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Mode detection and clish ⇄ expert switching, confirmed by probing
//!   rather than assumed
//! - Prompt-pattern command framing with quiet-period and timeout
//!   heuristics
//! - Bounded retry with exponential backoff, jitter, and automatic
//!   reconnection on transient connectivity loss
//! - Reboot-aware execution: a connection lost mid-command is reported
//!   distinctly, not folded into generic failure
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gaiash::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gaiash::Error> {
//!     let mut session = SessionBuilder::new("198.51.100.7")
//!         .username("admin")
//!         .password("admin")
//!         .expert_secret("3xp3rt")
//!         .build()?;
//!
//!     session.connect().await?;
//!
//!     let result = session.execute_clish("show interfaces").await?;
//!     println!("{}", result.output);
//!
//!     if session.enter_expert("3xp3rt").await? {
//!         let df = session.execute("df -h").await?;
//!         println!("{}", df.output);
//!         session.exit_expert().await?;
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod dialect;
pub mod error;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use dialect::ShellDialect;
pub use error::Error;
pub use session::{CommandResult, Mode, RetryPolicy, SecretStatus, Session, SessionBuilder};
pub use transport::{AuthMethod, ConnectConfig, Connector, ShellTransport, SshConnector};
