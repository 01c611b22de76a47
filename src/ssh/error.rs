use std::time::Duration;
use thiserror::Error;

/// Erros da camada de sessão remota.
///
/// Saída não-zero ou stderr de um comando NÃO são erros: chegam como dados
/// dentro de [`CommandResult`](super::CommandResult).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SshError {
    #[error("Host {0} não responde ao ping")]
    HostUnreachable(String),

    #[error("Falha de autenticação: {0}")]
    AuthenticationFailed(String),

    #[error("Falha na conexão: {0}")]
    ConnectionFailed(String),

    #[error("SSH não conectado")]
    NotConnected,

    #[error("Comando \"{command}\" excedeu o tempo limite de {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("Conexão perdida: {0}")]
    ConnectionLost(String),

    #[error("Comando \"{command}\" falhou: {message}")]
    CommandTransport { command: String, message: String },

    #[error("Configuração inválida: {0}")]
    InvalidConfig(String),
}

impl SshError {
    /// Erros da fase de conexão (host, autenticação, handshake).
    pub fn is_connect_phase(&self) -> bool {
        matches!(
            self,
            SshError::HostUnreachable(_)
                | SshError::AuthenticationFailed(_)
                | SshError::ConnectionFailed(_)
                | SshError::InvalidConfig(_)
        )
    }

    /// Indica que o transporte caiu e a sessão não pode mais ser reutilizada.
    pub fn drops_session(&self) -> bool {
        matches!(self, SshError::ConnectionLost(_))
    }

    /// Anexa o comando (e o timeout aplicado) a um erro vindo do transporte.
    pub(crate) fn for_command(self, command: &str, timeout: Duration) -> Self {
        match self {
            SshError::ConnectionFailed(message) => SshError::CommandTransport {
                command: command.to_string(),
                message,
            },
            SshError::Timeout { .. } => SshError::Timeout {
                command: command.to_string(),
                secs: timeout.as_secs(),
            },
            other => other,
        }
    }
}

// Códigos do libssh2 (libssh2.h)
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

impl From<ssh2::Error> for SshError {
    fn from(error: ssh2::Error) -> Self {
        let message = error.message().to_string();
        match error.code() {
            ssh2::ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED) => {
                SshError::AuthenticationFailed(message)
            }
            ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => SshError::Timeout {
                command: String::new(),
                secs: 0,
            },
            ssh2::ErrorCode::Session(
                LIBSSH2_ERROR_SOCKET_SEND
                | LIBSSH2_ERROR_SOCKET_DISCONNECT
                | LIBSSH2_ERROR_SOCKET_RECV,
            ) => SshError::ConnectionLost(message),
            _ => SshError::ConnectionFailed(message),
        }
    }
}

impl From<std::io::Error> for SshError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => SshError::ConnectionLost(error.to_string()),
            _ => SshError::ConnectionFailed(error.to_string()),
        }
    }
}
