use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Saída de um comando remoto. Efêmero, nunca persistido.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Saída utilizável numa cadeia de fallback: exit 0 e stdout não vazio
    pub fn is_usable(&self) -> bool {
        self.success() && !self.stdout.trim().is_empty()
    }
}

/// Estado da sessão SSH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Resumo devolvido por um `connect` bem-sucedido
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedSummary {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub message: String,
    pub connected_at: DateTime<Utc>,
}

/// Origem do texto de um campo resolvido por cadeia de fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSource {
    /// Índice da alternativa que produziu a saída
    Command(usize),
    /// Nenhuma alternativa serviu; texto literal do catálogo
    Fallback,
}

/// Resultado de uma cadeia de comandos alternativos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutput {
    pub text: String,
    pub source: ChainSource,
    pub last: Option<CommandResult>,
}

impl ChainOutput {
    /// Verdadeiro quando o texto veio de um comando (e pode ser parseado)
    pub fn from_command(&self) -> bool {
        matches!(self.source, ChainSource::Command(_))
    }
}
