//! Catálogo de comandos enviados ao roteador.
//!
//! Cada campo de um grupo é uma cadeia ordenada de alternativas (a primeira
//! ferramenta disponível vence) e, opcionalmente, um texto fixo exibido
//! quando nenhuma alternativa produz saída.

/// Um campo de um grupo de sondas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeCommand {
    pub key: &'static str,
    pub alternatives: &'static [&'static str],
    pub fallback: Option<&'static str>,
}

const fn probe(key: &'static str, alternatives: &'static [&'static str]) -> ProbeCommand {
    ProbeCommand {
        key,
        alternatives,
        fallback: None,
    }
}

const fn probe_or(
    key: &'static str,
    alternatives: &'static [&'static str],
    fallback: &'static str,
) -> ProbeCommand {
    ProbeCommand {
        key,
        alternatives,
        fallback: Some(fallback),
    }
}

// === SISTEMA ===
pub const SYSTEM_INFO: &[ProbeCommand] = &[
    probe("release", &["cat /etc/openwrt_release"]),
    probe("version", &["cat /proc/version"]),
    probe("uptime", &["cat /proc/uptime && uptime"]),
    probe(
        "hostname",
        &[
            "uci get system.@system[0].hostname",
            "hostname",
            "cat /proc/sys/kernel/hostname",
        ],
    ),
    probe_or(
        "model",
        &["cat /tmp/sysinfo/model", "cat /proc/cpuinfo | grep machine"],
        "Modelo não detectado",
    ),
];

pub const SYSTEM_STATS: &[ProbeCommand] = &[
    probe("memory", &["free -m"]),
    probe("load", &["cat /proc/loadavg"]),
    probe("disk", &["df -h"]),
    probe("processes", &["ps | wc -l"]),
    probe_or("temperature", &["cat /sys/class/thermal/thermal_zone*/temp"], "N/A"),
    probe("cpu", &["top -bn1 | grep \"CPU:\" | head -1"]),
];

// === REDE ===
pub const NETWORK_INFO: &[ProbeCommand] = &[
    probe("interfaces", &["ip addr show"]),
    probe("routes", &["ip route show"]),
    probe("dns", &["cat /tmp/resolv.conf.auto", "cat /etc/resolv.conf"]),
    probe("arp", &["ip neigh show"]),
    probe("connections", &["netstat -tunap", "ss -tunap"]),
];

pub const INTERFACE_DUMP: &str = "ubus call network.interface dump";
pub const INTERFACE_STATUS_FALLBACK: &str = "ifstatus";

// === WIRELESS ===
pub const WIRELESS_INFO: &[ProbeCommand] = &[
    probe("status", &["iwinfo", "wifi status"]),
    probe("config", &["uci show wireless"]),
    probe_or("clients", &["iwinfo", "iw dev"], "Wireless não disponível"),
    probe_or(
        "scan",
        &["iwinfo scan", "iw dev wlan0 scan"],
        "Scan não disponível",
    ),
];

pub const WIRELESS_CLIENTS: &[&str] = &["iwinfo", "iw dev"];

// === DHCP ===
pub const DHCP_INFO: &[ProbeCommand] = &[
    probe_or("leases", &["cat /tmp/dhcp.leases"], "Arquivo de leases não encontrado"),
    probe("config", &["uci show dhcp"]),
    probe_or("stats", &["cat /tmp/dnsmasq.status"], "Status não disponível"),
    probe_or("hosts", &["cat /etc/hosts"], "Arquivo hosts não encontrado"),
];

// === FIREWALL ===
pub const FIREWALL_INFO: &[ProbeCommand] = &[
    probe("status", &["iptables -L -n -v --line-numbers"]),
    probe("rules", &["uci show firewall"]),
    probe("zones", &["iptables -t nat -L -n -v"]),
    probe("traffic", &["iptables -L -v -x -n"]),
    probe_or("config", &["cat /etc/config/firewall"], "Configuração não encontrada"),
];

// === PACOTES ===
pub const PACKAGE_INFO: &[ProbeCommand] = &[
    probe("installed", &["opkg list-installed"]),
    probe("upgradable", &["opkg list-upgradable"]),
    probe("all", &["opkg list | head -100"]),
    probe_or(
        "config",
        &["cat /etc/opkg/customfeeds.conf /etc/opkg/distfeeds.conf"],
        "Configuração padrão",
    ),
    probe("space", &["df -h /overlay /tmp"]),
];

pub const OPKG_UPDATE: &str = "opkg update";
pub const OPKG_LIST_UPGRADABLE: &str = "opkg list-upgradable";

// === SERVIÇOS ===
pub const LIST_SERVICES: &str = "ls /etc/init.d/";

// === LOGS ===
pub const LOGS: &[ProbeCommand] = &[
    probe("system", &["logread", "dmesg | tail -50"]),
    probe("kernel", &["dmesg | tail -30"]),
    probe_or(
        "messages",
        &["tail -50 /var/log/messages"],
        "Arquivo /var/log/messages não encontrado",
    ),
    probe_or("debug", &["logread -l 100"], "Logs do sistema não disponíveis"),
    probe_or(
        "auth",
        &["tail -30 /var/log/auth.log"],
        "Logs de autenticação não disponíveis",
    ),
];

pub const CLEAR_LOGS: &str =
    "echo \"\" > /var/log/messages 2>/dev/null; logread -c 2>/dev/null; echo \"Logs limpos\"";

// === DIVERSOS ===
pub const FILESYSTEM: &str = "df -h && echo \"---\" && ls -la /";
pub const FILESYSTEM_SEPARATOR: &str = "---";
pub const PROCESSES: &str = "ps ww";
pub const UCI_EXPORT: &str = "uci export";
/// Redirecionado e em background: o canal fecha antes do roteador cair
pub const REBOOT: &str = "reboot >/dev/null 2>&1 &";
pub const BACKUP_PATH: &str = "/tmp/backup.tar.gz";
pub const BACKUP: &str =
    "sysupgrade -b /tmp/backup.tar.gz 2>/dev/null || echo \"Backup criado em /tmp/backup.tar.gz\"";

/// Ações aceitas por um script de `/etc/init.d`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Remove,
    Upgrade,
}

impl PackageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageAction::Install => "install",
            PackageAction::Remove => "remove",
            PackageAction::Upgrade => "upgrade",
        }
    }
}

/// Nomes de pacote, serviço, chain ou seção UCI seguros para interpolar
pub fn is_safe_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| {
                c.is_ascii_alphanumeric()
                    || matches!(c, '_' | '.' | '@' | '-' | '[' | ']' | '+')
            })
        && !value.starts_with('-')
}

/// Aspas simples de shell: `it's` vira `'it'\''s'`
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

pub fn service_status(service: &str) -> String {
    format!("/etc/init.d/{} status", service)
}

pub fn service_action(service: &str, action: ServiceAction) -> String {
    format!("/etc/init.d/{} {}", service, action.as_str())
}

pub fn package_action(package: &str, action: PackageAction) -> String {
    format!("opkg {} {}", action.as_str(), package)
}

/// Fragmento de regra repassado ao `iptables` como veio
pub fn add_firewall_rule(rule: &str) -> String {
    format!("iptables {}", rule.trim())
}

pub fn delete_firewall_rule(chain: &str, line_number: u32) -> String {
    format!("iptables -D {} {}", chain, line_number)
}

/// `uci set` seguido de `commit` do arquivo de configuração da seção
pub fn set_uci(section: &str, option: &str, value: &str) -> String {
    let config = section.split('.').next().unwrap_or(section);
    format!(
        "uci set {}.{}={} && uci commit {}",
        section,
        option,
        shell_quote(value),
        config
    )
}
