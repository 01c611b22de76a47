//! Roteador falso para testes: responde comandos roteirizados e registra
//! cada ping, autenticação, comando e encerramento.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::config::SshServerConfig;
use super::connection::CANARY_COMMAND;
use super::error::SshError;
use super::transport::{Connector, ShellTransport};
use super::types::CommandResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Ping,
    Auth,
    Exec(String),
    Close,
}

#[derive(Debug, Clone)]
enum Reply {
    Output { stdout: String, stderr: String, exit_code: i32 },
    Fail(SshError),
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, Reply>,
    events: Vec<MockEvent>,
}

#[derive(Clone)]
pub struct MockRouter {
    script: Arc<Mutex<Script>>,
    reachable: bool,
    auth_ok: bool,
}

impl MockRouter {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            reachable: true,
            auth_ok: true,
        }
        .reply(CANARY_COMMAND, "Connection Test OK\n")
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn reject_auth(mut self) -> Self {
        self.auth_ok = false;
        self
    }

    pub fn reply(self, command: &str, stdout: &str) -> Self {
        self.reply_full(command, stdout, "", 0)
    }

    pub fn reply_full(self, command: &str, stdout: &str, stderr: &str, exit_code: i32) -> Self {
        self.script.lock().unwrap().replies.insert(
            command.to_string(),
            Reply::Output {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code,
            },
        );
        self
    }

    pub fn fail(self, command: &str, error: SshError) -> Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(command.to_string(), Reply::Fail(error));
        self
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.script.lock().unwrap().events.clone()
    }

    /// Comandos executados, sem o teste de conexão
    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Exec(command) if command != CANARY_COMMAND => Some(command),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: MockEvent) {
        self.script.lock().unwrap().events.push(event);
    }
}

#[async_trait]
impl Connector for MockRouter {
    async fn is_reachable(&self, _config: &SshServerConfig) -> bool {
        self.record(MockEvent::Ping);
        self.reachable
    }

    async fn open(&self, config: &SshServerConfig) -> Result<Box<dyn ShellTransport>, SshError> {
        self.record(MockEvent::Auth);
        if !self.auth_ok {
            return Err(SshError::AuthenticationFailed(format!(
                "usuário {} rejeitado",
                config.username
            )));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ShellTransport for MockRouter {
    async fn exec(&self, command: &str, _timeout: Duration) -> Result<CommandResult, SshError> {
        self.record(MockEvent::Exec(command.to_string()));
        let reply = self.script.lock().unwrap().replies.get(command).cloned();

        match reply {
            Some(Reply::Output { stdout, stderr, exit_code }) => {
                Ok(CommandResult::new(command, stdout, stderr, exit_code))
            }
            Some(Reply::Fail(error)) => Err(error),
            None => {
                let tool = command.split_whitespace().next().unwrap_or(command);
                Ok(CommandResult::new(
                    command,
                    "",
                    format!("sh: {}: not found", tool),
                    127,
                ))
            }
        }
    }

    async fn close(&self) {
        self.record(MockEvent::Close);
    }
}
