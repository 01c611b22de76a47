use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::app_config_dir;
use crate::ssh::SshServerConfig;

/// Última conexão usada, só para preencher o formulário. A senha nunca é salva.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConnection {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub last_connected: Option<DateTime<Utc>>,
}

impl SavedConnection {
    pub fn from_config(config: &SshServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            username: config.username.clone(),
            port: config.port,
            last_connected: Some(Utc::now()),
        }
    }
}

pub struct ConnectionStore {
    path: PathBuf,
}

impl ConnectionStore {
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(app_config_dir()?.join("connection.json")))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` se ainda não houve conexão salva
    pub fn load(&self) -> Result<Option<SavedConnection>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).context("Falha ao ler conexão salva")?;
        let saved = serde_json::from_str(&content).context("Falha ao interpretar conexão salva")?;

        Ok(Some(saved))
    }

    pub fn save(&self, connection: &SavedConnection) -> Result<()> {
        let content =
            serde_json::to_string_pretty(connection).context("Falha ao serializar conexão")?;

        fs::write(&self.path, content).context("Falha ao salvar conexão")?;

        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Falha ao remover conexão salva")?;
        }
        Ok(())
    }
}
