use tracing_subscriber::EnvFilter;

/// Filtro efetivo: `RUST_LOG` tem prioridade sobre o da configuração
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Inicializa o tracing no stderr (o stdout fica para o JSON).
/// Chamadas repetidas são ignoradas.
pub fn init(default_filter: &str) {
    let initialized = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if initialized {
        tracing::debug!(filter = default_filter, "logging inicializado");
    }
}
