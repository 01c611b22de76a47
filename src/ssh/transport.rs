//! Transporte de shell remoto.
//!
//! `Connector` abre conexões autenticadas e testa alcançabilidade;
//! `ShellTransport` executa um comando numa conexão aberta. A implementação
//! real usa libssh2 (`ssh2`), que é bloqueante: cada chamada roda em
//! `spawn_blocking` e o `Session` fica atrás de um `std::sync::Mutex`.

use async_trait::async_trait;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::config::SshServerConfig;
use super::error::SshError;
use super::types::CommandResult;

/// Conexão autenticada capaz de executar comandos
#[async_trait]
pub trait ShellTransport: Send + Sync {
    /// Executa o comando literalmente. Exit não-zero e stderr voltam como dados.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandResult, SshError>;

    /// Fecha a conexão. Nunca falha.
    async fn close(&self);
}

/// Fábrica de conexões
#[async_trait]
pub trait Connector: Send + Sync {
    /// Teste de alcançabilidade (estilo ICMP) feito antes da autenticação
    async fn is_reachable(&self, config: &SshServerConfig) -> bool;

    /// Abre e autentica uma conexão respeitando `config.timeouts.connect`
    async fn open(&self, config: &SshServerConfig) -> Result<Box<dyn ShellTransport>, SshError>;
}

/// Connector padrão: `ping` do sistema + libssh2
#[derive(Debug, Default, Clone)]
pub struct Ssh2Connector;

#[async_trait]
impl Connector for Ssh2Connector {
    async fn is_reachable(&self, config: &SshServerConfig) -> bool {
        match ping_once(&config.host, config.timeouts.ping).await {
            Ok(alive) => alive,
            Err(e) => {
                // sem binário de ping (ou sem permissão): testa a porta SSH
                tracing::debug!(
                    host = %config.host,
                    error = %e,
                    "ping indisponível, testando TCP"
                );
                tcp_probe(config.address(), config.timeouts.ping).await
            }
        }
    }

    async fn open(&self, config: &SshServerConfig) -> Result<Box<dyn ShellTransport>, SshError> {
        let config = config.clone();
        let session = tokio::task::spawn_blocking(move || open_blocking(&config))
            .await
            .map_err(|e| {
                SshError::ConnectionFailed(format!("tarefa de conexão abortada: {}", e))
            })??;

        Ok(Box::new(Ssh2Transport {
            session: Arc::new(Mutex::new(session)),
        }))
    }
}

/// Executa `ping` uma vez. `Err` significa que o binário não pôde ser usado.
async fn ping_once(host: &str, timeout: Duration) -> std::io::Result<bool> {
    let mut command = Command::new("ping");
    command.args(ping_args(host, timeout));
    command.kill_on_drop(true);

    // margem para resolução de nome antes do ping propriamente dito
    match tokio::time::timeout(timeout + Duration::from_secs(2), command.output()).await {
        Ok(output) => Ok(output?.status.success()),
        Err(_) => Ok(false),
    }
}

/// Argumentos de um único ping. O `-W` do ping do macOS/BSD é em ms.
fn ping_args(host: &str, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1).to_string();
    let millis = timeout.as_millis().max(1000).to_string();

    let args: [&str; 5] = if cfg!(windows) {
        ["-n", "1", "-w", &millis, host]
    } else if cfg!(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        ["-c", "1", "-W", &millis, host]
    } else {
        ["-c", "1", "-W", &secs, host]
    };
    args.iter().map(|a| a.to_string()).collect()
}

async fn tcp_probe(address: String, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await,
        Ok(Ok(_))
    )
}

fn open_blocking(config: &SshServerConfig) -> Result<ssh2::Session, SshError> {
    let address = config
        .address()
        .to_socket_addrs()
        .map_err(|e| SshError::ConnectionFailed(format!("{}: {}", config.host, e)))?
        .next()
        .ok_or_else(|| {
            SshError::ConnectionFailed(format!("{}: endereço não resolvido", config.host))
        })?;

    let connect_timeout = config.timeouts.connect;
    let tcp = TcpStream::connect_timeout(&address, connect_timeout)
        .map_err(|e| SshError::ConnectionFailed(format!("{}: {}", address, e)))?;

    let mut session = ssh2::Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(millis_u32(connect_timeout));
    session.handshake()?;

    if let Err(e) = session.userauth_password(&config.username, &config.password) {
        tracing::debug!(error = %e, "auth por senha recusada, tentando keyboard-interactive");
        let mut prompt = PasswordPrompt {
            password: config.password.clone(),
        };
        session
            .userauth_keyboard_interactive(&config.username, &mut prompt)
            .map_err(|_| SshError::AuthenticationFailed(e.message().to_string()))?;
    }

    if !session.authenticated() {
        return Err(SshError::AuthenticationFailed(format!(
            "usuário {} não autenticado",
            config.username
        )));
    }

    Ok(session)
}

fn millis_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Responde qualquer prompt keyboard-interactive com a senha
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

const EXEC_GRACE: Duration = Duration::from_secs(2);

/// Transporte sobre uma sessão libssh2
pub struct Ssh2Transport {
    session: Arc<Mutex<ssh2::Session>>,
}

fn exec_blocking(
    session: &Mutex<ssh2::Session>,
    command: &str,
    timeout: Duration,
) -> Result<CommandResult, SshError> {
    let deadline = Instant::now() + timeout;
    let session = session
        .lock()
        .map_err(|_| SshError::ConnectionLost("sessão SSH envenenada".to_string()))?;
    let arm = |remaining: Duration| session.set_timeout(millis_u32(remaining).max(1));

    arm(remaining_until(deadline).ok_or_else(timed_out)?);
    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let output = read_until_deadline(&mut channel, deadline, arm).and_then(|stdout| {
        let stderr = read_until_deadline(&mut channel.stderr(), deadline, arm)?;
        Ok((stdout, stderr))
    });
    let (stdout, stderr) = match output {
        Ok(output) => output,
        Err(e) => {
            // libera o canal para que o próximo comando não espere por este
            if let Err(close) = channel.close() {
                tracing::debug!(error = %close, command, "erro ao fechar canal");
            }
            return Err(e);
        }
    };

    arm(remaining_until(deadline).unwrap_or(Duration::from_millis(1)));
    channel.wait_close()?;
    let exit_code = channel.exit_status()?;

    Ok(CommandResult {
        command: command.to_string(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    })
}

fn remaining_until(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
}

fn timed_out() -> SshError {
    SshError::Timeout {
        command: String::new(),
        secs: 0,
    }
}

/// Lê até EOF ou até o prazo acabar.
///
/// O timeout do libssh2 vale por chamada bloqueante, então um comando que não
/// para de escrever (`logread -f`) nunca o dispara; o prazo é conferido a cada
/// bloco lido. `arm` recebe o tempo restante antes de cada leitura.
fn read_until_deadline<R: Read>(
    reader: &mut R,
    deadline: Instant,
    mut arm: impl FnMut(Duration),
) -> Result<Vec<u8>, SshError> {
    let mut output = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let remaining = remaining_until(deadline).ok_or_else(timed_out)?;
        arm(remaining);

        match reader.read(&mut chunk) {
            Ok(0) => return Ok(output),
            Ok(n) => output.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(timed_out()),
            Err(e) => return Err(e.into()),
        }
    }
}

#[async_trait]
impl ShellTransport for Ssh2Transport {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandResult, SshError> {
        let session = Arc::clone(&self.session);
        let owned = command.to_string();

        let task = tokio::task::spawn_blocking(move || exec_blocking(&session, &owned, timeout));

        // o prazo principal é aplicado dentro da tarefa; este só cobre um travamento do libssh2
        match tokio::time::timeout(timeout + EXEC_GRACE, task).await {
            Ok(Ok(result)) => result.map_err(|e| e.for_command(command, timeout)),
            Ok(Err(join)) => Err(SshError::CommandTransport {
                command: command.to_string(),
                message: join.to_string(),
            }),
            Err(_) => Err(SshError::Timeout {
                command: command.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn close(&self) {
        let session = Arc::clone(&self.session);
        let closed = tokio::task::spawn_blocking(move || {
            if let Ok(session) = session.lock() {
                if let Err(e) = session.disconnect(None, "bye", None) {
                    tracing::debug!(error = %e, "erro ao encerrar sessão SSH");
                }
            }
        })
        .await;

        if let Err(e) = closed {
            tracing::debug!(error = %e, "tarefa de desconexão abortada");
        }
    }
}
