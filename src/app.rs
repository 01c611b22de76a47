use std::sync::Arc;
use tokio::sync::RwLock;

use crate::openwrt::OpenWrtApi;
use crate::persistence::{ConnectionStore, SavedConnection};
use crate::ssh::{ConnectedSummary, Connector, Ssh2Connector, SshError, SshServerConfig, SshSession};

/// Contexto da aplicação: guarda a única sessão ativa com o roteador.
///
/// Toda consulta passa por [`AppContext::api`], que falha com
/// `NotConnected` antes de qualquer comando quando não há sessão.
#[derive(Clone)]
pub struct AppContext {
    connector: Arc<dyn Connector>,
    store: Option<Arc<ConnectionStore>>,
    api: Arc<RwLock<Option<Arc<OpenWrtApi>>>>,
}

impl AppContext {
    pub fn new(store: Option<ConnectionStore>) -> Self {
        Self::with_connector(Arc::new(Ssh2Connector), store)
    }

    pub fn with_connector(connector: Arc<dyn Connector>, store: Option<ConnectionStore>) -> Self {
        Self {
            connector,
            store: store.map(Arc::new),
            api: Arc::new(RwLock::new(None)),
        }
    }

    /// Conecta ao roteador, descartando antes a sessão anterior.
    /// Em caso de sucesso salva host/usuário/porta para a próxima vez.
    pub async fn connect(&self, config: &SshServerConfig) -> Result<ConnectedSummary, SshError> {
        let mut slot = self.api.write().await;
        if let Some(previous) = slot.take() {
            previous.session().dispose().await;
        }

        let session = Arc::new(SshSession::with_connector(self.connector.clone()));
        let summary = session.connect(config).await?;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&SavedConnection::from_config(config)) {
                tracing::warn!(error = %e, "não foi possível salvar a conexão");
            }
        }

        *slot = Some(Arc::new(OpenWrtApi::new(session)));
        Ok(summary)
    }

    /// Encerra a sessão ativa. Idempotente.
    pub async fn disconnect(&self) {
        let previous = self.api.write().await.take();
        if let Some(api) = previous {
            api.session().dispose().await;
        }
    }

    pub async fn api(&self) -> Result<Arc<OpenWrtApi>, SshError> {
        self.api
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(SshError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        match self.api.read().await.as_ref() {
            Some(api) => api.session().is_connected().await,
            None => false,
        }
    }

    /// Última conexão salva, para preencher host e usuário
    pub fn saved_connection(&self) -> Option<SavedConnection> {
        let store = self.store.as_ref()?;
        match store.load() {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, "conexão salva ilegível");
                None
            }
        }
    }
}
