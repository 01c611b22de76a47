//! Parsers puros: texto das ferramentas do roteador para registros tipados.
//!
//! Nenhuma função aqui falha; linhas que não reconhecem são ignoradas.

use indexmap::IndexMap;
use std::net::Ipv4Addr;

use super::types::{
    DhcpLease, FilesystemUsage, FirewallRule, LoadAverage, MemoryUsage, NetworkInterface, Package,
    ServiceStatus, WirelessNetwork,
};

const STOPPED_PATTERNS: &[&str] = &["not running", "stopped"];
const RUNNING_PATTERNS: &[&str] = &["running", "started"];

/// Converte o tamanho do prefixo CIDR em máscara decimal (`24` -> `255.255.255.0`).
/// Valores acima de 32 são tratados como 32.
pub fn cidr_to_mask(prefix: u8) -> String {
    let prefix = u32::from(prefix.min(32));
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    Ipv4Addr::from(mask).to_string()
}

/// Interfaces de `ip addr show`.
///
/// Cada bloco começa em `N: nome[@pai]: <FLAGS> ... state X` e o primeiro
/// `inet a.b.c.d/nn` do bloco fornece IP e máscara.
pub fn parse_interfaces(output: &str) -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = Vec::new();

    for line in output.lines() {
        if let Some(interface) = parse_interface_header(line) {
            interfaces.push(interface);
            continue;
        }

        let Some(current) = interfaces.last_mut() else {
            continue;
        };
        if current.ip.is_some() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("inet") {
            continue;
        }
        if let Some(address) = tokens.next() {
            match address.split_once('/') {
                Some((ip, prefix)) => {
                    current.ip = Some(ip.to_string());
                    current.subnet_mask = prefix.parse::<u8>().ok().map(cidr_to_mask);
                }
                None => current.ip = Some(address.to_string()),
            }
        }
    }

    interfaces
}

fn parse_interface_header(line: &str) -> Option<NetworkInterface> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = line.split_whitespace();
    let index = tokens.next()?.strip_suffix(':')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let raw_name = tokens.next()?.strip_suffix(':')?;
    let name = raw_name.split('@').next().unwrap_or(raw_name);
    if name.is_empty() {
        return None;
    }

    let flags = line
        .split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(flags, _)| flags)
        .unwrap_or("");

    let rest: Vec<&str> = line.split_whitespace().collect();
    let state = rest
        .iter()
        .position(|t| *t == "state")
        .and_then(|i| rest.get(i + 1))
        .copied();

    let status = match state {
        Some(state) if state != "UNKNOWN" => state.to_string(),
        _ if flags.split(',').any(|f| f == "UP") => "UP".to_string(),
        _ => "DOWN".to_string(),
    };

    Some(NetworkInterface {
        name: name.to_string(),
        ip: None,
        subnet_mask: None,
        status,
    })
}

/// Leases de `/tmp/dhcp.leases`: `expiração mac ip hostname [client-id]`.
/// Linhas com menos de 4 campos ou expiração não numérica são ignoradas.
pub fn parse_dhcp_leases(output: &str) -> Vec<DhcpLease> {
    output
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 4 {
                return None;
            }
            let lease_expiry = tokens[0].parse::<u64>().ok()?;
            let hostname = match tokens[3] {
                "*" => None,
                name => Some(name.to_string()),
            };
            Some(DhcpLease {
                lease_expiry,
                mac: tokens[1].to_string(),
                ip: tokens[2].to_string(),
                hostname,
            })
        })
        .collect()
}

const VERBOSE_COLUMNS: &[&str] = &[
    "num", "pkts", "bytes", "target", "prot", "opt", "in", "out", "source", "destination",
];

/// Regras de `iptables -L -n -v --line-numbers`.
///
/// O cabeçalho `Chain NOME (...)` define a chain das linhas numeradas que
/// seguem; a linha `num ...` define as colunas.
pub fn parse_firewall_rules(output: &str) -> Vec<FirewallRule> {
    let mut rules = Vec::new();
    let mut chain: Option<(String, Option<String>)> = None;
    let mut columns: Vec<String> = VERBOSE_COLUMNS.iter().map(|c| c.to_string()).collect();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };

        if *first == "Chain" {
            chain = tokens.get(1).map(|name| {
                let policy = line
                    .split_once("(policy ")
                    .and_then(|(_, rest)| rest.split_whitespace().next())
                    .map(|p| p.trim_end_matches(')').to_string());
                (name.to_string(), policy)
            });
            continue;
        }

        if *first == "num" {
            columns = tokens.iter().map(|c| c.to_string()).collect();
            continue;
        }

        let Ok(rule_index) = first.parse::<u32>() else {
            continue;
        };
        let Some((chain_name, chain_policy)) = &chain else {
            continue;
        };

        let tokens = with_blank_target(tokens, &columns);
        let column = |name: &str| -> Option<String> {
            columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| tokens.get(i))
                .map(|t| t.to_string())
        };

        rules.push(FirewallRule {
            chain_name: chain_name.clone(),
            chain_policy: chain_policy.clone(),
            rule_index,
            target: column("target").unwrap_or_default(),
            protocol: column("prot").unwrap_or_default(),
            source: column("source").unwrap_or_default(),
            destination: column("destination").unwrap_or_default(),
            packets: column("pkts"),
            bytes: column("bytes"),
            extra: tokens
                .get(columns.len()..)
                .map(|rest| rest.join(" "))
                .unwrap_or_default(),
        });
    }

    rules
}

fn is_opt_flag(token: &str) -> bool {
    matches!(token, "--" | "-f" | "!f")
}

/// Regras sem `-j` deixam a coluna `target` vazia e o resto da linha anda
/// uma posição para a esquerda. A coluna `opt` serve de âncora.
fn with_blank_target<'a>(mut tokens: Vec<&'a str>, columns: &[String]) -> Vec<&'a str> {
    let target = columns.iter().position(|c| c == "target");
    let opt = columns.iter().position(|c| c == "opt");
    if let (Some(target), Some(opt)) = (target, opt) {
        let shifted = opt > 0
            && tokens.get(opt).is_none_or(|t| !is_opt_flag(t))
            && tokens.get(opt - 1).is_some_and(|t| is_opt_flag(t));
        if shifted && target <= tokens.len() {
            tokens.insert(target, "");
        }
    }
    tokens
}

/// Junta `opkg list-installed` (`nome - versão`) com `opkg list-upgradable`
/// (`nome - atual - disponível`), na ordem dos instalados.
pub fn parse_packages(installed: &str, upgradable: &str) -> Vec<Package> {
    let mut packages: IndexMap<String, Package> = IndexMap::new();

    for line in installed.lines() {
        let parts: Vec<&str> = line.split(" - ").map(str::trim).collect();
        if parts.len() < 2 || parts[0].is_empty() {
            continue;
        }
        packages.insert(
            parts[0].to_string(),
            Package {
                name: parts[0].to_string(),
                installed_version: parts[1].to_string(),
                available_version: None,
            },
        );
    }

    for line in upgradable.lines() {
        let parts: Vec<&str> = line.split(" - ").map(str::trim).collect();
        if parts.len() < 2 || parts[0].is_empty() {
            continue;
        }
        let available = parts[parts.len() - 1].to_string();
        packages
            .entry(parts[0].to_string())
            .and_modify(|p| p.available_version = Some(available.clone()))
            .or_insert_with(|| Package {
                name: parts[0].to_string(),
                installed_version: parts[1].to_string(),
                available_version: Some(available.clone()),
            });
    }

    packages.into_values().collect()
}

/// Classifica a saída de `/etc/init.d/X status`
pub fn classify_service_status(output: &str) -> ServiceStatus {
    let lowered = output.to_lowercase();
    if STOPPED_PATTERNS.iter().any(|p| lowered.contains(p)) {
        ServiceStatus::Stopped
    } else if RUNNING_PATTERNS.iter().any(|p| lowered.contains(p)) {
        ServiceStatus::Running
    } else {
        ServiceStatus::Unknown
    }
}

/// Nomes de serviço da listagem de `/etc/init.d/`
pub fn parse_service_names(output: &str) -> Vec<String> {
    output
        .split_whitespace()
        .map(|name| name.trim_end_matches('*').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// `/etc/openwrt_release`: `DISTRIB_ID='OpenWrt'` vira `ID -> OpenWrt`
pub fn parse_release(output: &str) -> IndexMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let key = key.strip_prefix("DISTRIB_").unwrap_or(key);
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Segundos de atividade: primeiro número de `/proc/uptime`
pub fn parse_uptime_seconds(output: &str) -> Option<u64> {
    let seconds = output.split_whitespace().next()?.parse::<f64>().ok()?;
    (seconds >= 0.0).then(|| seconds as u64)
}

/// Linha `Mem:` de `free -m`
pub fn parse_memory(output: &str) -> Option<MemoryUsage> {
    let line = output
        .lines()
        .find(|line| line.trim_start().starts_with("Mem:"))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(3)
        .map(|v| v.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match values.as_slice() {
        [total_mb, used_mb, free_mb] => Some(MemoryUsage {
            total_mb: *total_mb,
            used_mb: *used_mb,
            free_mb: *free_mb,
        }),
        _ => None,
    }
}

/// `/proc/loadavg`: `0.12 0.08 0.05 1/45 1234`
pub fn parse_load_average(output: &str) -> Option<LoadAverage> {
    let mut values = output.split_whitespace().map(|v| v.parse::<f64>());
    Some(LoadAverage {
        one: values.next()?.ok()?,
        five: values.next()?.ok()?,
        fifteen: values.next()?.ok()?,
    })
}

/// Linhas de `df -h`. Um nome de filesystem longo pode vir sozinho numa
/// linha, com os valores na linha seguinte.
pub fn parse_df(output: &str) -> Vec<FilesystemUsage> {
    let mut usage = Vec::new();
    let mut pending: Option<String> = None;

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() == Some(&"Filesystem") {
            continue;
        }

        let (filesystem, values) = match tokens.len() {
            1 => {
                pending = Some(tokens[0].to_string());
                continue;
            }
            5 => match pending.take() {
                Some(name) => (name, &tokens[..]),
                None => continue,
            },
            n if n >= 6 => (tokens[0].to_string(), &tokens[1..]),
            _ => {
                pending = None;
                continue;
            }
        };

        usage.push(FilesystemUsage {
            filesystem,
            size: values[0].to_string(),
            used: values[1].to_string(),
            available: values[2].to_string(),
            use_percent: values[3].to_string(),
            mounted_on: values[4..].join(" "),
        });
    }

    usage
}

/// Redes de `iwinfo`: blocos `IFACE ESSID: "nome"` com `Mode:` e `Channel:`
/// nas linhas seguintes.
pub fn parse_wireless_networks(output: &str) -> Vec<WirelessNetwork> {
    let mut networks: Vec<WirelessNetwork> = Vec::new();

    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            if let Some((head, essid)) = line.split_once("ESSID:") {
                let Some(interface) = head.split_whitespace().next() else {
                    continue;
                };
                networks.push(WirelessNetwork {
                    interface: interface.to_string(),
                    ssid: unquote(essid.trim()).to_string(),
                    mode: None,
                    channel: None,
                });
            }
            continue;
        }

        let Some(current) = networks.last_mut() else {
            continue;
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let value_after = |label: &str| {
            tokens
                .iter()
                .position(|t| *t == label)
                .and_then(|i| tokens.get(i + 1))
                .map(|v| v.to_string())
        };
        if current.mode.is_none() {
            current.mode = value_after("Mode:");
        }
        if current.channel.is_none() {
            current.channel = value_after("Channel:");
        }
    }

    networks
}

/// Pacotes listados por `opkg list-upgradable`
pub fn count_upgradable(output: &str) -> usize {
    output.lines().filter(|line| line.contains(" - ")).count()
}
