use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::SshError;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeouts independentes de conexão, ping e comando
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshTimeouts {
    pub connect: Duration,
    pub command: Duration,
    pub ping: Duration,
}

impl Default for SshTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            command: DEFAULT_COMMAND_TIMEOUT,
            ping: DEFAULT_PING_TIMEOUT,
        }
    }
}

/// Descritor de conexão com o roteador.
///
/// Imutável depois que a sessão é estabelecida; a senha nunca é serializada
/// nem aparece no `Debug`.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SshServerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(skip)]
    pub timeouts: SshTimeouts,
}

impl fmt::Debug for SshServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl SshServerConfig {
    /// Cria um descritor com porta 22 e timeouts padrão
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            password: password.into(),
            timeouts: SshTimeouts::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeouts(mut self, timeouts: SshTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Endereço `host:port` usado pelo socket TCP
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Valida se a configuração está válida
    pub fn validate(&self) -> Result<(), SshError> {
        if self.host.trim().is_empty() {
            return Err(SshError::InvalidConfig("Host não pode estar vazio".to_string()));
        }

        // o host vai direto para o argv do ping
        if self.host.starts_with('-')
            || self
                .host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ';' | '|' | '&' | '$' | '`'))
        {
            return Err(SshError::InvalidConfig(format!("Host inválido: {}", self.host)));
        }

        if self.port == 0 {
            return Err(SshError::InvalidConfig("Porta deve ser maior que 0".to_string()));
        }

        if self.username.trim().is_empty() {
            return Err(SshError::InvalidConfig("Username não pode estar vazio".to_string()));
        }

        if self.timeouts.connect.is_zero() || self.timeouts.command.is_zero() {
            return Err(SshError::InvalidConfig("Timeouts devem ser maiores que zero".to_string()));
        }

        Ok(())
    }
}
