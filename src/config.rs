use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ssh::SshTimeouts;
use crate::ssh::config::DEFAULT_SSH_PORT;

/// Diretório da aplicação dentro do diretório de configuração do usuário
pub const APP_DIR: &str = "openwrt-manager";

/// Configuração geral da aplicação
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Timeout de conexão (ping + autenticação), em segundos
    pub connect_timeout_secs: u64,
    /// Timeout padrão por comando, em segundos
    pub command_timeout_secs: u64,
    pub ping_timeout_secs: u64,
    pub default_port: u16,
    pub default_username: String,
    /// Filtro do tracing quando `RUST_LOG` não está definido
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            command_timeout_secs: 30,
            ping_timeout_secs: 3,
            default_port: DEFAULT_SSH_PORT,
            default_username: "root".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn timeouts(&self) -> SshTimeouts {
        SshTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            command: Duration::from_secs(self.command_timeout_secs),
            ping: Duration::from_secs(self.ping_timeout_secs),
        }
    }
}

/// Obtém o diretório de configuração da aplicação, criando se preciso
pub fn app_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Não foi possível encontrar diretório de configuração")?
        .join(APP_DIR);

    fs::create_dir_all(&config_dir).context("Falha ao criar diretório de configuração")?;

    Ok(config_dir)
}

/// Gerenciador do arquivo `config.json`
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Carrega do diretório padrão. Arquivo ausente resulta nos padrões.
    pub fn new() -> Result<Self> {
        Self::with_path(app_config_dir()?.join("config.json"))
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let config = Self::load_config(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    fn load_config(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Falha ao ler {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Falha ao deserializar configuração em {}", path.display()))
    }

    /// Salva configuração no arquivo
    pub fn save_config(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.config).context("Falha ao serializar configuração")?;

        fs::write(&self.config_path, content).context("Falha ao salvar arquivo de configuração")?;

        Ok(())
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
