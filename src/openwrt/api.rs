use indexmap::IndexMap;
use std::sync::Arc;

use super::commands::{self, ProbeCommand};
use super::parsers;
use super::types::{
    Dashboard, DhcpInfo, FilesystemInfo, FirewallInfo, InterfaceStatus, LogsInfo, NetworkInfo,
    OperationResult, PackageInfo, ProbeMap, ServiceStatus, ServicesInfo, SystemInfo, SystemStats,
    UciExport, WirelessInfo,
};
use crate::ssh::{ChainOutput, CommandResult, SshError, SshSession};

type GroupOutputs = IndexMap<&'static str, Result<ChainOutput, SshError>>;

/// Fatos do roteador OpenWrt.
///
/// Cada grupo executa seus comandos um após o outro na sessão compartilhada
/// e devolve sempre o mapa completo de chaves, com falhas no próprio campo.
/// Nada é guardado entre chamadas: cada chamada reexecuta os comandos.
pub struct OpenWrtApi {
    pub(super) session: Arc<SshSession>,
}

impl OpenWrtApi {
    pub fn new(session: Arc<SshSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SshSession> {
        &self.session
    }

    async fn run_group(&self, group: &[ProbeCommand]) -> GroupOutputs {
        let mut outputs = IndexMap::with_capacity(group.len());
        for probe in group {
            let output = self.session.run_chain(probe.alternatives, probe.fallback).await;
            if let Err(e) = &output {
                tracing::debug!(key = probe.key, error = %e, "campo com erro");
            }
            outputs.insert(probe.key, output);
        }
        outputs
    }

    // === SISTEMA ===

    /// Release, versão do kernel, uptime, hostname e modelo
    pub async fn get_system_info(&self) -> SystemInfo {
        let outputs = self.run_group(commands::SYSTEM_INFO).await;
        let raw = probe_map(&outputs, true);

        SystemInfo {
            release: parsed_text(&outputs, "release")
                .map(parsers::parse_release)
                .unwrap_or_default(),
            uptime_seconds: parsed_text(&outputs, "uptime").and_then(parsers::parse_uptime_seconds),
            raw,
        }
    }

    pub async fn get_system_stats(&self) -> SystemStats {
        let outputs = self.run_group(commands::SYSTEM_STATS).await;

        SystemStats {
            memory: parsed_text(&outputs, "memory").and_then(parsers::parse_memory),
            load: parsed_text(&outputs, "load").and_then(parsers::parse_load_average),
            disks: parsed_text(&outputs, "disk")
                .map(parsers::parse_df)
                .unwrap_or_default(),
            raw: probe_map(&outputs, false),
        }
    }

    // === REDE ===

    pub async fn get_network_info(&self) -> NetworkInfo {
        let outputs = self.run_group(commands::NETWORK_INFO).await;

        NetworkInfo {
            interfaces: parsed_text(&outputs, "interfaces")
                .map(parsers::parse_interfaces)
                .unwrap_or_default(),
            raw: probe_map(&outputs, false),
        }
    }

    /// Dump JSON do ubus; sem ele, o texto cru de `ifstatus`
    pub async fn get_interface_status(&self) -> InterfaceStatus {
        match self.session.execute_command(commands::INTERFACE_DUMP).await {
            Ok(result) if result.success() => {
                match serde_json::from_str::<serde_json::Value>(&result.stdout) {
                    Ok(value) => return InterfaceStatus::Json(value),
                    Err(e) => tracing::debug!(error = %e, "dump do ubus não é JSON"),
                }
            }
            Ok(result) => tracing::debug!(exit_code = result.exit_code, "ubus indisponível"),
            Err(e) => tracing::debug!(error = %e, "ubus falhou"),
        }

        match self
            .session
            .execute_command(commands::INTERFACE_STATUS_FALLBACK)
            .await
        {
            Ok(result) => InterfaceStatus::Raw(result.stdout),
            Err(e) => InterfaceStatus::Unavailable(e.to_string()),
        }
    }

    // === WIRELESS ===

    pub async fn get_wireless_info(&self) -> WirelessInfo {
        let outputs = self.run_group(commands::WIRELESS_INFO).await;

        WirelessInfo {
            networks: parsed_text(&outputs, "status")
                .map(parsers::parse_wireless_networks)
                .unwrap_or_default(),
            raw: probe_map(&outputs, false),
        }
    }

    pub async fn get_wireless_clients(&self) -> OperationResult {
        match self.session.run_chain(commands::WIRELESS_CLIENTS, None).await {
            Ok(output) => {
                let exit_code = output.last.as_ref().map_or(0, |r| r.exit_code);
                OperationResult::ok(output.text, exit_code)
            }
            Err(e) => OperationResult::failed(e.to_string()),
        }
    }

    // === DHCP ===

    pub async fn get_dhcp_info(&self) -> DhcpInfo {
        let outputs = self.run_group(commands::DHCP_INFO).await;

        DhcpInfo {
            leases: parsed_text(&outputs, "leases")
                .map(parsers::parse_dhcp_leases)
                .unwrap_or_default(),
            raw: probe_map(&outputs, false),
        }
    }

    // === FIREWALL ===

    pub async fn get_firewall_info(&self) -> FirewallInfo {
        let outputs = self.run_group(commands::FIREWALL_INFO).await;

        FirewallInfo {
            rules: parsed_text(&outputs, "status")
                .map(parsers::parse_firewall_rules)
                .unwrap_or_default(),
            raw: probe_map(&outputs, false),
        }
    }

    // === PACOTES ===

    pub async fn get_package_info(&self) -> PackageInfo {
        let outputs = self.run_group(commands::PACKAGE_INFO).await;

        let packages = match parsed_text(&outputs, "installed") {
            Some(installed) => parsers::parse_packages(
                installed,
                parsed_text(&outputs, "upgradable").unwrap_or(""),
            ),
            None => Vec::new(),
        };

        PackageInfo {
            packages,
            raw: probe_map(&outputs, false),
        }
    }

    // === SERVIÇOS ===

    /// Estado de cada script de `/etc/init.d`.
    ///
    /// A falha de um serviço vira `unknown` só para ele; só uma falha na
    /// listagem preenche `error`.
    pub async fn get_services(&self) -> ServicesInfo {
        let listing = match self.session.execute_command(commands::LIST_SERVICES).await {
            Ok(listing) => listing,
            Err(e) => {
                return ServicesInfo {
                    services: IndexMap::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let mut services = IndexMap::new();
        for name in parsers::parse_service_names(&listing.stdout) {
            if !commands::is_safe_identifier(&name) {
                tracing::debug!(service = %name, "nome de serviço ignorado");
                continue;
            }

            let status = match self
                .session
                .execute_command(&commands::service_status(&name))
                .await
            {
                Ok(result) => parsers::classify_service_status(&result.stdout),
                Err(e) => {
                    tracing::debug!(service = %name, error = %e, "status indisponível");
                    ServiceStatus::Unknown
                }
            };
            services.insert(name, status);
        }

        ServicesInfo {
            services,
            error: None,
        }
    }

    // === LOGS ===

    pub async fn get_logs(&self) -> LogsInfo {
        let outputs = self.run_group(commands::LOGS).await;
        LogsInfo {
            raw: probe_map(&outputs, false),
        }
    }

    // === DIVERSOS ===

    /// `df -h` e a listagem da raiz, separados por `---`
    pub async fn get_filesystem_info(&self) -> FilesystemInfo {
        let result = self.session.execute_command(commands::FILESYSTEM).await;

        let usage = match &result {
            Ok(output) => {
                let df: Vec<&str> = output
                    .stdout
                    .lines()
                    .take_while(|line| line.trim() != commands::FILESYSTEM_SEPARATOR)
                    .collect();
                parsers::parse_df(&df.join("\n"))
            }
            Err(_) => Vec::new(),
        };

        FilesystemInfo {
            result: operation_result(result),
            usage,
        }
    }

    pub async fn get_processes(&self) -> OperationResult {
        operation_result(self.session.execute_command(commands::PROCESSES).await)
    }

    pub async fn get_uci_config(&self) -> UciExport {
        operation_result(self.session.execute_command(commands::UCI_EXPORT).await).into()
    }

    /// Sistema, estatísticas e rede buscados em paralelo. Os comandos ainda
    /// passam um por vez pela sessão.
    pub async fn get_dashboard(&self) -> Dashboard {
        let (system, stats, network) = tokio::join!(
            self.get_system_info(),
            self.get_system_stats(),
            self.get_network_info()
        );
        Dashboard {
            system,
            stats,
            network,
        }
    }
}

/// Converte a execução de um único comando no formato uniforme
pub(super) fn operation_result(result: Result<CommandResult, SshError>) -> OperationResult {
    match result {
        Ok(output) => OperationResult::ok(output.stdout, output.exit_code),
        Err(e) => OperationResult::failed(e.to_string()),
    }
}

fn probe_map(outputs: &GroupOutputs, trim: bool) -> ProbeMap {
    outputs
        .iter()
        .map(|(key, output)| {
            let value = output.as_ref().map_err(Clone::clone).map(|o| {
                if trim {
                    o.text.trim().to_string()
                } else {
                    o.text.clone()
                }
            });
            (*key, value)
        })
        .collect()
}

/// Texto de um campo apto a parse: veio de um comando, não do texto fixo
fn parsed_text<'a>(outputs: &'a GroupOutputs, key: &str) -> Option<&'a str> {
    match outputs.get(key)? {
        Ok(output) if output.from_command() => Some(output.text.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::SshServerConfig;
    use crate::ssh::testing::MockRouter;

    async fn connected(router: &MockRouter) -> OpenWrtApi {
        let session = Arc::new(SshSession::with_connector(router.connector()));
        session
            .connect(&SshServerConfig::new("192.168.1.1", "root", "secret"))
            .await
            .unwrap();
        OpenWrtApi::new(session)
    }

    fn group_keys(group: &[ProbeCommand]) -> Vec<&'static str> {
        group.iter().map(|p| p.key).collect()
    }

    #[tokio::test]
    async fn test_every_key_present_when_disconnected() {
        let router = MockRouter::new();
        let api = OpenWrtApi::new(Arc::new(SshSession::with_connector(router.connector())));

        let info = api.get_system_info().await;
        assert_eq!(info.raw.keys().collect::<Vec<_>>(), group_keys(commands::SYSTEM_INFO));
        assert_eq!(info.raw.error_count(), 5);
        assert_eq!(info.raw.rendered("hostname").unwrap(), "Erro: SSH não conectado");

        let network = api.get_network_info().await;
        assert_eq!(network.raw.len(), 5);
        assert!(network.interfaces.is_empty());

        assert_eq!(api.get_dhcp_info().await.raw.len(), 4);
        assert_eq!(api.get_firewall_info().await.raw.len(), 5);
        assert_eq!(api.get_package_info().await.raw.len(), 5);
        assert_eq!(api.get_logs().await.raw.len(), 5);
        assert_eq!(api.get_wireless_info().await.raw.len(), 4);
        assert_eq!(api.get_system_stats().await.raw.len(), 6);

        // Nada foi enviado ao roteador
        assert!(router.events().is_empty());
    }

    #[tokio::test]
    async fn test_system_info_with_fallbacks() {
        let router = MockRouter::new()
            .reply("cat /etc/openwrt_release", "DISTRIB_ID='OpenWrt'\nDISTRIB_RELEASE='23.05.2'\n")
            .reply("cat /proc/version", "Linux version 5.15.137\n")
            .reply("cat /proc/uptime && uptime", "35712.48 68221.10\n 10:12:01 up 9:55\n")
            .reply("hostname", "OpenWrt\n");
        let api = connected(&router).await;

        let info = api.get_system_info().await;
        assert_eq!(info.raw.ok("hostname"), Some("OpenWrt"));
        assert_eq!(info.raw.ok("model"), Some("Modelo não detectado"));
        assert_eq!(info.raw.ok("version"), Some("Linux version 5.15.137"));
        assert_eq!(info.release.get("RELEASE").map(String::as_str), Some("23.05.2"));
        assert_eq!(info.uptime_seconds, Some(35712));

        let commands = router.commands();
        assert_eq!(commands[3], "uci get system.@system[0].hostname");
        assert_eq!(commands[4], "hostname");
        assert!(!commands.contains(&"cat /proc/sys/kernel/hostname".to_string()));
    }

    #[tokio::test]
    async fn test_one_failing_field_does_not_abort_group() {
        let router = MockRouter::new()
            .reply(
                "ip addr show",
                "1: lo: <LOOPBACK,UP> mtu 65536 state UNKNOWN\n    inet 127.0.0.1/8 scope host lo\n",
            )
            .fail(
                "ip route show",
                SshError::Timeout { command: "ip route show".into(), secs: 30 },
            )
            .reply("cat /etc/resolv.conf", "nameserver 1.1.1.1\n")
            .reply("ip neigh show", "192.168.1.20 dev br-lan lladdr aa:bb:cc:dd:ee:ff REACHABLE\n")
            .reply("ss -tunap", "tcp ESTAB 0 0 192.168.1.1:22\n");
        let api = connected(&router).await;

        let network = api.get_network_info().await;
        assert!(network.raw.is_error("routes"));
        assert!(network.raw.rendered("routes").unwrap().starts_with("Erro: "));
        assert_eq!(network.raw.ok("dns"), Some("nameserver 1.1.1.1\n"));
        assert_eq!(network.raw.ok("connections"), Some("tcp ESTAB 0 0 192.168.1.1:22\n"));
        assert_eq!(network.interfaces.len(), 1);
        assert_eq!(network.interfaces[0].subnet_mask.as_deref(), Some("255.0.0.0"));
    }

    #[tokio::test]
    async fn test_fallback_text_is_not_parsed() {
        let router = MockRouter::new().reply("uci show dhcp", "dhcp.lan=dhcp\n");
        let api = connected(&router).await;

        let dhcp = api.get_dhcp_info().await;
        assert_eq!(dhcp.raw.ok("leases"), Some("Arquivo de leases não encontrado"));
        assert_eq!(dhcp.raw.ok("hosts"), Some("Arquivo hosts não encontrado"));
        assert!(dhcp.leases.is_empty());
    }

    #[tokio::test]
    async fn test_dhcp_leases_parsed() {
        let router = MockRouter::new().reply(
            "cat /tmp/dhcp.leases",
            "1717000000 aa:bb:cc:dd:ee:ff 192.168.1.50 myphone 01:aa:bb:cc:dd:ee:ff\n",
        );
        let api = connected(&router).await;

        let dhcp = api.get_dhcp_info().await;
        assert_eq!(dhcp.leases.len(), 1);
        assert_eq!(dhcp.leases[0].hostname.as_deref(), Some("myphone"));
    }

    #[tokio::test]
    async fn test_firewall_and_packages() {
        let router = MockRouter::new()
            .reply(
                "iptables -L -n -v --line-numbers",
                "Chain INPUT (policy ACCEPT 0 packets, 0 bytes)\nnum pkts bytes target prot opt in out source destination\n1 0 0 ACCEPT all -- lo * 0.0.0.0/0 0.0.0.0/0\n",
            )
            .reply("opkg list-installed", "dnsmasq - 2.89-4\nluci - 23.051\n")
            .reply("opkg list-upgradable", "dnsmasq - 2.89-4 - 2.90-1\n");
        let api = connected(&router).await;

        let firewall = api.get_firewall_info().await;
        assert_eq!(firewall.rules.len(), 1);
        assert_eq!(firewall.rules[0].chain_name, "INPUT");
        assert_eq!(firewall.raw.ok("config"), Some("Configuração não encontrada"));

        let packages = api.get_package_info().await;
        assert_eq!(packages.packages.len(), 2);
        assert_eq!(packages.packages[0].available_version.as_deref(), Some("2.90-1"));
        assert_eq!(packages.raw.ok("config"), Some("Configuração padrão"));
    }

    #[tokio::test]
    async fn test_failing_service_does_not_block_others() {
        let router = MockRouter::new()
            .reply("ls /etc/init.d/", "dnsmasq\nfirewall\nodhcpd\nsysntpd\n")
            .reply("/etc/init.d/dnsmasq status", "running\n")
            .fail(
                "/etc/init.d/firewall status",
                SshError::Timeout { command: "/etc/init.d/firewall status".into(), secs: 30 },
            )
            .reply("/etc/init.d/odhcpd status", "not running\n")
            .reply("/etc/init.d/sysntpd status", "");
        let api = connected(&router).await;

        let info = api.get_services().await;
        assert_eq!(info.error, None);
        assert_eq!(info.services["dnsmasq"], ServiceStatus::Running);
        assert_eq!(info.services["firewall"], ServiceStatus::Unknown);
        assert_eq!(info.services["odhcpd"], ServiceStatus::Stopped);
        assert_eq!(info.services["sysntpd"], ServiceStatus::Unknown);
        assert_eq!(
            info.services.keys().collect::<Vec<_>>(),
            vec!["dnsmasq", "firewall", "odhcpd", "sysntpd"]
        );
    }

    #[tokio::test]
    async fn test_services_listing_failure_sets_error() {
        let router = MockRouter::new();
        let api = OpenWrtApi::new(Arc::new(SshSession::with_connector(router.connector())));

        let info = api.get_services().await;
        assert!(info.services.is_empty());
        assert_eq!(info.error.as_deref(), Some("SSH não conectado"));
    }

    #[tokio::test]
    async fn test_interface_status_json_then_raw() {
        let router = MockRouter::new().reply(
            commands::INTERFACE_DUMP,
            r#"{"interface":[{"interface":"lan","up":true}]}"#,
        );
        let api = connected(&router).await;
        match api.get_interface_status().await {
            InterfaceStatus::Json(value) => assert_eq!(value["interface"][0]["interface"], "lan"),
            other => panic!("esperava JSON, veio {:?}", other),
        }

        let router = MockRouter::new().reply("ifstatus", "Usage: ifstatus <interface>\n");
        let api = connected(&router).await;
        match api.get_interface_status().await {
            InterfaceStatus::Raw(text) => assert!(text.starts_with("Usage")),
            other => panic!("esperava texto, veio {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filesystem_info_parses_df_part() {
        let router = MockRouter::new().reply(
            commands::FILESYSTEM,
            "Filesystem Size Used Available Use% Mounted on\n/dev/root 4.0M 4.0M 0 100% /rom\n---\ndrwxr-xr-x 17 root root 0 Jan 1 1970 .\n",
        );
        let api = connected(&router).await;

        let info = api.get_filesystem_info().await;
        assert!(info.result.success);
        assert_eq!(info.usage.len(), 1);
        assert_eq!(info.usage[0].mounted_on, "/rom");
    }

    #[tokio::test]
    async fn test_single_command_probes() {
        let router = MockRouter::new()
            .reply(
                "ps ww",
                "  PID USER       VSZ STAT COMMAND\n    1 root      1520 S    /sbin/procd\n",
            )
            .reply("uci export", "package system\n");
        let api = connected(&router).await;

        let processes = api.get_processes().await;
        assert!(processes.success);
        assert!(processes.output.unwrap().contains("procd"));
        assert_eq!(api.get_uci_config().await.config.as_deref(), Some("package system\n"));

        let clients = api.get_wireless_clients().await;
        assert!(clients.success);
        assert_eq!(clients.exit_code, Some(127));
    }

    #[tokio::test]
    async fn test_dashboard_runs_groups_concurrently() {
        let router = MockRouter::new()
            .reply("hostname", "OpenWrt\n")
            .reply("cat /proc/loadavg", "0.10 0.20 0.30 1/50 999\n")
            .reply("free -m", "       total used free\nMem:     245   52  150\n");
        let api = connected(&router).await;

        let dashboard = api.get_dashboard().await;
        assert_eq!(dashboard.system.raw.ok("hostname"), Some("OpenWrt"));
        assert_eq!(dashboard.stats.load.unwrap().fifteen, 0.30);
        assert_eq!(dashboard.stats.memory.unwrap().total_mb, 245);
        assert_eq!(dashboard.network.raw.len(), 5);
    }
}
