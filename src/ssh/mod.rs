/// Módulo SSH: sessão única autenticada com o roteador e execução de comandos

pub mod config;
pub mod connection;
pub mod error;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports para facilitar o uso
pub use config::{SshServerConfig, SshTimeouts};
pub use connection::{SshSession, is_benign_stderr};
pub use error::SshError;
pub use transport::{Connector, ShellTransport, Ssh2Connector};
pub use types::{ChainOutput, ChainSource, CommandResult, ConnectedSummary, SessionState};
