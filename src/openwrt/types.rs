use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ssh::SshError;

/// Prefixo de um campo cujo comando falhou no transporte
pub const ERROR_PREFIX: &str = "Erro: ";

/// Resultado de um campo: texto do comando ou mensagem de erro
pub type FieldResult = Result<String, String>;

/// Mapa de campos de um grupo de sondas.
///
/// Sempre contém todas as chaves do grupo, na ordem do catálogo. Na
/// serialização, `Err(msg)` vira a string `"Erro: msg"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeMap {
    fields: IndexMap<String, FieldResult>,
}

impl ProbeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldResult) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FieldResult> {
        self.fields.get(key)
    }

    /// Texto do campo se o comando chegou a rodar
    pub fn ok(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.as_deref().ok()
    }

    /// Texto como o consumidor vê, com o prefixo de erro aplicado
    pub fn rendered(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(render)
    }

    pub fn is_error(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(Err(_)))
    }

    pub fn error_count(&self) -> usize {
        self.fields.values().filter(|v| v.is_err()).count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn render(value: &FieldResult) -> String {
    match value {
        Ok(text) => text.clone(),
        Err(message) => format!("{}{}", ERROR_PREFIX, message),
    }
}

/// Monta o mapa a partir dos resultados por campo, convertendo cada falha
/// de transporte em mensagem no próprio campo.
impl<K: Into<String>> FromIterator<(K, Result<String, SshError>)> for ProbeMap {
    fn from_iter<I: IntoIterator<Item = (K, Result<String, SshError>)>>(iter: I) -> Self {
        let mut map = ProbeMap::new();
        for (key, value) in iter {
            map.insert(key, value.map_err(|e| e.to_string()));
        }
        map
    }
}

impl Serialize for ProbeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, &render(value))?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Registros derivados
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub name: String,
    pub ip: Option<String>,
    pub subnet_mask: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DhcpLease {
    pub lease_expiry: u64,
    pub mac: String,
    pub ip: String,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    pub chain_name: String,
    pub chain_policy: Option<String>,
    pub rule_index: u32,
    pub target: String,
    pub protocol: String,
    pub source: String,
    pub destination: String,
    pub packets: Option<String>,
    pub bytes: Option<String>,
    /// Restante da linha (portas, estado etc.)
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub installed_version: String,
    pub available_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unknown,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Stopped => write!(f, "stopped"),
            ServiceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub total_mb: u64,
    pub used_mb: u64,
    pub free_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemUsage {
    pub filesystem: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub use_percent: String,
    pub mounted_on: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirelessNetwork {
    pub interface: String,
    pub ssid: String,
    pub mode: Option<String>,
    pub channel: Option<String>,
}

// ---------------------------------------------------------------------------
// Respostas dos grupos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub raw: ProbeMap,
    pub release: IndexMap<String, String>,
    pub uptime_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub raw: ProbeMap,
    pub memory: Option<MemoryUsage>,
    pub load: Option<LoadAverage>,
    pub disks: Vec<FilesystemUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    pub raw: ProbeMap,
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WirelessInfo {
    pub raw: ProbeMap,
    pub networks: Vec<WirelessNetwork>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DhcpInfo {
    pub raw: ProbeMap,
    pub leases: Vec<DhcpLease>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FirewallInfo {
    pub raw: ProbeMap,
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub raw: ProbeMap,
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsInfo {
    pub raw: ProbeMap,
}

/// Estado de cada serviço de `/etc/init.d`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServicesInfo {
    pub services: IndexMap<String, ServiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Saída de `ubus call network.interface dump`, ou o texto de `ifstatus`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum InterfaceStatus {
    Json(serde_json::Value),
    Raw(String),
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FilesystemInfo {
    #[serde(flatten)]
    pub result: OperationResult,
    pub usage: Vec<FilesystemUsage>,
}

/// Painel com os grupos mais usados, buscados em paralelo
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub system: SystemInfo,
    pub stats: SystemStats,
    pub network: NetworkInfo,
}

/// Resultado uniforme das operações.
///
/// `success` significa apenas que o comando foi entregue e retornou; não
/// verifica o efeito. `exit_code` mostra o código remoto quando houve execução.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl OperationResult {
    pub fn ok(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            exit_code: Some(exit_code),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Saída de `uci export`, entregue no campo `config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UciExport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<OperationResult> for UciExport {
    fn from(result: OperationResult) -> Self {
        Self {
            success: result.success,
            config: result.output,
            error: result.error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageUpdateResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgradable: Option<String>,
    pub upgradable_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uci_export_uses_config_key() {
        let export = UciExport::from(OperationResult::ok("package network\n", 0));
        let json = serde_json::to_value(export).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["config"], "package network\n");
        assert!(json.get("output").is_none());

        let failed = UciExport::from(OperationResult::failed("SSH não conectado"));
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["error"], "SSH não conectado");
        assert!(json.get("config").is_none());
    }

    #[test]
    fn test_probe_map_renders_errors_in_place() {
        let map: ProbeMap = vec![
            ("release", Ok("DISTRIB_ID='OpenWrt'".to_string())),
            ("uptime", Err(SshError::NotConnected)),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["release", "uptime"]);
        assert!(map.is_error("uptime"));
        assert_eq!(map.rendered("uptime").unwrap(), "Erro: SSH não conectado");

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["release"], "DISTRIB_ID='OpenWrt'");
        assert_eq!(json["uptime"], "Erro: SSH não conectado");
    }

    #[test]
    fn test_operation_result_shape() {
        let result = OperationResult::ok("done", 0).with_message("Pacote instalado");
        let ok = serde_json::to_value(result).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["output"], "done");
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(OperationResult::failed("SSH não conectado")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "SSH não conectado");
        assert!(failed.get("output").is_none());
    }

    #[test]
    fn test_service_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ServiceStatus::Running).unwrap(), "running");
        assert_eq!(ServiceStatus::Unknown.to_string(), "unknown");
    }
}
