use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::config::{DEFAULT_COMMAND_TIMEOUT, SshServerConfig};
use super::error::SshError;
use super::transport::{Connector, ShellTransport, Ssh2Connector};
use super::types::{ChainOutput, ChainSource, CommandResult, ConnectedSummary, SessionState};

pub const CANARY_COMMAND: &str = "echo \"Connection Test OK\"";
const CANARY_REPLY: &str = "Connection Test OK";

/// Trechos de stderr que não merecem aviso no log (sondagem de ferramentas
/// opcionais, avisos de depreciação). Afeta só o log, nunca os dados.
const BENIGN_STDERR_PATTERNS: &[&str] = &[
    "WARNING:",
    "Warning:",
    "deprecated",
    "not found",
    "No such file or directory",
    "opkg list",
];

pub fn is_benign_stderr(stderr: &str) -> bool {
    BENIGN_STDERR_PATTERNS
        .iter()
        .any(|pattern| stderr.contains(pattern))
}

/// Sessão SSH única com o roteador.
///
/// `Disconnected --connect--> Connecting --(ping+auth+canary)--> Connected --dispose--> Disconnected`.
/// Todos os comandos passam pelo mesmo mutex, então chamadores concorrentes
/// nunca têm respostas trocadas.
pub struct SshSession {
    connector: Arc<dyn Connector>,
    transport: Mutex<Option<Box<dyn ShellTransport>>>,
    state: RwLock<SessionState>,
    command_timeout: RwLock<Duration>,
}

impl SshSession {
    /// Sessão sobre libssh2
    pub fn new() -> Self {
        Self::with_connector(Arc::new(Ssh2Connector))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            transport: Mutex::new(None),
            state: RwLock::new(SessionState::Disconnected),
            command_timeout: RwLock::new(DEFAULT_COMMAND_TIMEOUT),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Connected
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    /// Conecta ao roteador: ping, autenticação e comando de teste.
    ///
    /// Uma conexão anterior é descartada antes. Qualquer falha volta o estado
    /// para `Disconnected`; não há nova tentativa automática.
    pub async fn connect(&self, config: &SshServerConfig) -> Result<ConnectedSummary, SshError> {
        config.validate()?;

        let mut transport = self.transport.lock().await;
        if let Some(previous) = transport.take() {
            tracing::info!("descartando sessão anterior antes de reconectar");
            previous.close().await;
        }

        self.set_state(SessionState::Connecting).await;
        tracing::info!(host = %config.host, port = config.port, "conectando");

        match self.establish(config).await {
            Ok(opened) => {
                *transport = Some(opened);
                *self.command_timeout.write().await = config.timeouts.command;
                self.set_state(SessionState::Connected).await;
                tracing::info!(host = %config.host, "SSH conectado");

                Ok(ConnectedSummary {
                    host: config.host.clone(),
                    port: config.port,
                    username: config.username.clone(),
                    message: format!("Conectado com sucesso ao {}", config.host),
                    connected_at: chrono::Utc::now(),
                })
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected).await;
                tracing::warn!(host = %config.host, error = %e, "falha na conexão");
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        config: &SshServerConfig,
    ) -> Result<Box<dyn ShellTransport>, SshError> {
        if !self.connector.is_reachable(config).await {
            return Err(SshError::HostUnreachable(config.host.clone()));
        }

        let opened = match self.connector.open(config).await {
            Ok(opened) => opened,
            Err(e) if e.is_connect_phase() => return Err(e),
            Err(e) => return Err(SshError::ConnectionFailed(e.to_string())),
        };

        match opened.exec(CANARY_COMMAND, config.timeouts.connect).await {
            Ok(result) if result.stdout.contains(CANARY_REPLY) => {
                tracing::debug!(stdout = result.stdout.trim(), "teste de comando OK");
                Ok(opened)
            }
            Ok(result) => {
                opened.close().await;
                Err(SshError::ConnectionFailed(format!(
                    "shell remoto não respondeu ao teste (exit {}): {}",
                    result.exit_code,
                    result.stderr.trim()
                )))
            }
            Err(e) => {
                opened.close().await;
                Err(SshError::ConnectionFailed(format!("teste de comando falhou: {}", e)))
            }
        }
    }

    /// Executa um comando com timeout próprio.
    ///
    /// Exit não-zero e stderr são dados; só falhas de transporte viram `Err`.
    /// Se o transporte reportar queda, a sessão passa a `Disconnected`.
    pub async fn run(&self, command: &str, timeout: Duration) -> Result<CommandResult, SshError> {
        let mut guard = self.transport.lock().await;
        let Some(transport) = guard.as_ref() else {
            return Err(SshError::NotConnected);
        };
        if self.state().await != SessionState::Connected {
            return Err(SshError::NotConnected);
        }

        tracing::debug!(command, "executando");
        let outcome = transport.exec(command, timeout).await;
        match outcome {
            Ok(result) => {
                log_stderr(&result);
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(command, error = %e, "falha de transporte");
                if e.drops_session() {
                    if let Some(dropped) = guard.take() {
                        dropped.close().await;
                    }
                    self.set_state(SessionState::Disconnected).await;
                }
                Err(e)
            }
        }
    }

    /// `run` com o timeout de comando do descritor conectado
    pub async fn execute_command(&self, command: &str) -> Result<CommandResult, SshError> {
        let timeout = *self.command_timeout.read().await;
        self.run(command, timeout).await
    }

    /// Tenta as alternativas em ordem até uma produzir saída utilizável.
    ///
    /// Sem vencedora, usa `fallback` se houver; senão o stdout da última.
    /// Erro de transporte interrompe a cadeia.
    pub async fn run_chain(
        &self,
        alternatives: &[&str],
        fallback: Option<&str>,
    ) -> Result<ChainOutput, SshError> {
        let mut last: Option<CommandResult> = None;

        for (index, command) in alternatives.iter().enumerate() {
            let result = self.execute_command(command).await?;
            if result.is_usable() {
                return Ok(ChainOutput {
                    text: result.stdout.clone(),
                    source: ChainSource::Command(index),
                    last: Some(result),
                });
            }
            tracing::debug!(
                command,
                exit_code = result.exit_code,
                "alternativa sem saída, tentando próxima"
            );
            last = Some(result);
        }

        match (fallback, last) {
            (Some(text), last) => Ok(ChainOutput {
                text: text.to_string(),
                source: ChainSource::Fallback,
                last,
            }),
            (None, Some(result)) => Ok(ChainOutput {
                text: result.stdout.clone(),
                source: ChainSource::Command(alternatives.len() - 1),
                last: Some(result),
            }),
            (None, None) => Ok(ChainOutput {
                text: String::new(),
                source: ChainSource::Fallback,
                last: None,
            }),
        }
    }

    /// Fecha a conexão. Idempotente e nunca falha.
    pub async fn dispose(&self) {
        let mut guard = self.transport.lock().await;
        if let Some(transport) = guard.take() {
            transport.close().await;
            tracing::info!("sessão SSH encerrada");
        }
        self.set_state(SessionState::Disconnected).await;
    }
}

impl Default for SshSession {
    fn default() -> Self {
        Self::new()
    }
}

fn log_stderr(result: &CommandResult) {
    let stderr = result.stderr.trim();
    if stderr.is_empty() {
        return;
    }
    if is_benign_stderr(stderr) {
        tracing::debug!(command = %result.command, stderr, "stderr ignorável");
    } else {
        tracing::warn!(
            command = %result.command,
            exit_code = result.exit_code,
            stderr,
            "comando retornou stderr"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::testing::{MockEvent, MockRouter};

    fn config() -> SshServerConfig {
        SshServerConfig::new("192.168.1.1", "root", "secret")
    }

    #[tokio::test]
    async fn test_connect_runs_ping_auth_and_canary_in_order() {
        let router = MockRouter::new();
        let session = SshSession::with_connector(router.connector());

        let summary = session.connect(&config()).await.unwrap();
        assert_eq!(summary.host, "192.168.1.1");
        assert!(session.is_connected().await);
        assert_eq!(
            router.events(),
            vec![
                MockEvent::Ping,
                MockEvent::Auth,
                MockEvent::Exec(CANARY_COMMAND.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_before_auth() {
        let router = MockRouter::new().unreachable();
        let session = SshSession::with_connector(router.connector());

        let err = session.connect(&config()).await.unwrap_err();
        assert_eq!(err, SshError::HostUnreachable("192.168.1.1".to_string()));
        assert_eq!(router.events(), vec![MockEvent::Ping]);
        assert_eq!(session.state().await, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_auth_failure_leaves_session_disconnected() {
        let router = MockRouter::new().reject_auth();
        let session = SshSession::with_connector(router.connector());

        let err = session.connect(&config()).await.unwrap_err();
        assert!(matches!(err, SshError::AuthenticationFailed(_)));
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_canary_fails_connect_and_closes() {
        let router = MockRouter::new().fail(CANARY_COMMAND, SshError::ConnectionLost("eof".into()));
        let session = SshSession::with_connector(router.connector());

        let err = session.connect(&config()).await.unwrap_err();
        assert!(matches!(err, SshError::ConnectionFailed(_)));
        assert!(router.events().contains(&MockEvent::Close));
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_run_while_disconnected_sends_nothing() {
        let router = MockRouter::new();
        let session = SshSession::with_connector(router.connector());

        let err = session.run("uptime", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, SshError::NotConnected);
        assert!(router.events().is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_and_stderr_are_data() {
        let router =
            MockRouter::new().reply_full("netstat -tunap", "", "sh: netstat: not found", 127);
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();

        let result = session.execute_command("netstat -tunap").await.unwrap();
        assert_eq!(result.exit_code, 127);
        assert_eq!(result.stderr, "sh: netstat: not found");
        assert!(session.is_connected().await);
    }

    #[tokio::test]
    async fn test_timeout_keeps_session_usable() {
        let router = MockRouter::new()
            .fail("logread -f", SshError::Timeout { command: "logread -f".into(), secs: 30 })
            .reply("uptime", "up 1 day");
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();

        assert!(matches!(
            session.execute_command("logread -f").await,
            Err(SshError::Timeout { .. })
        ));
        assert_eq!(session.execute_command("uptime").await.unwrap().stdout, "up 1 day");
    }

    #[tokio::test]
    async fn test_dropped_connection_disconnects() {
        let router =
            MockRouter::new().fail("reboot", SshError::ConnectionLost("broken pipe".into()));
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();

        assert!(session.execute_command("reboot").await.is_err());
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_eq!(session.execute_command("uptime").await, Err(SshError::NotConnected));
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let router = MockRouter::new();
        let never_connected = SshSession::with_connector(router.connector());
        never_connected.dispose().await;
        never_connected.dispose().await;

        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();
        session.dispose().await;
        session.dispose().await;
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_eq!(
            router.events().iter().filter(|e| **e == MockEvent::Close).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_transport() {
        let router = MockRouter::new();
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();
        session.connect(&config()).await.unwrap();

        let events = router.events();
        let close_at = events.iter().position(|e| *e == MockEvent::Close).unwrap();
        let second_ping = events.iter().rposition(|e| *e == MockEvent::Ping).unwrap();
        assert!(close_at < second_ping);
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_next_alternative() {
        let router = MockRouter::new()
            .reply_full("netstat -tunap", "", "sh: netstat: not found", 127)
            .reply("ss -tunap", "tcp ESTAB 0 0 192.168.1.1:22");
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();

        let output = session.run_chain(&["netstat -tunap", "ss -tunap"], None).await.unwrap();
        assert_eq!(output.source, ChainSource::Command(1));
        assert!(output.text.starts_with("tcp ESTAB"));
    }

    #[tokio::test]
    async fn test_chain_uses_fallback_text() {
        let router = MockRouter::new();
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();

        let output = session
            .run_chain(&["cat /tmp/dhcp.leases"], Some("Arquivo de leases não encontrado"))
            .await
            .unwrap();
        assert_eq!(output.source, ChainSource::Fallback);
        assert!(!output.from_command());
        assert_eq!(output.text, "Arquivo de leases não encontrado");
    }

    #[tokio::test]
    async fn test_chain_without_fallback_keeps_last_output() {
        let router = MockRouter::new().reply_full("iw dev", "", "iw: not found", 127);
        let session = SshSession::with_connector(router.connector());
        session.connect(&config()).await.unwrap();

        let output = session.run_chain(&["iwinfo", "iw dev"], None).await.unwrap();
        assert_eq!(output.source, ChainSource::Command(1));
        assert_eq!(output.text, "");
        assert_eq!(output.last.unwrap().exit_code, 127);
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_their_own_output() {
        let router = MockRouter::new()
            .reply("cat /proc/version", "Linux 5.15")
            .reply("hostname", "OpenWrt");
        let session = Arc::new(SshSession::with_connector(router.connector()));
        session.connect(&config()).await.unwrap();

        let a = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute_command("cat /proc/version").await })
        };
        let b = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute_command("hostname").await })
        };

        assert_eq!(a.await.unwrap().unwrap().stdout, "Linux 5.15");
        assert_eq!(b.await.unwrap().unwrap().stdout, "OpenWrt");
    }

    #[test]
    fn test_benign_stderr_matches_content_only() {
        assert!(is_benign_stderr("sh: iwinfo: not found"));
        assert!(is_benign_stderr("WARNING: option deprecated"));
        assert!(!is_benign_stderr("iptables: Permission denied (you must be root)"));
        // o comando contendo "grep" não torna o erro ignorável
        assert!(!is_benign_stderr("Segmentation fault"));
    }
}
