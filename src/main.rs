use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;

use openwrt_manager::config::ConfigManager;
use openwrt_manager::persistence::ConnectionStore;
use openwrt_manager::{AppContext, OpenWrtApi, SshServerConfig, logging};

#[derive(Parser)]
#[command(name = "openwrt-manager", version, about = "Gerencia um roteador OpenWrt via SSH")]
struct Cli {
    /// Host do roteador (padrão: última conexão salva)
    #[arg(long, short = 'H')]
    host: Option<String>,

    /// Usuário SSH
    #[arg(long, short = 'u')]
    user: Option<String>,

    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Senha SSH; sem ela, é pedida no terminal
    #[arg(long, env = "OPENWRT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mostra a última conexão salva (não conecta)
    Saved,
    /// Release, kernel, uptime, hostname e modelo
    System,
    /// Memória, carga, disco, processos, temperatura e CPU
    Stats,
    /// Sistema, estatísticas e rede de uma vez
    Dashboard,
    Network,
    /// Dump do ubus (ou ifstatus)
    InterfaceStatus,
    Wireless,
    WirelessClients,
    Dhcp,
    Firewall,
    Packages,
    Services,
    Logs,
    Filesystem,
    Processes,
    /// uci export
    Uci,
    /// Adiciona regra: `firewall-add -- -A INPUT -p tcp --dport 8080 -j ACCEPT`
    FirewallAdd {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        rule: Vec<String>,
    },
    /// Remove a regra `index` da chain
    FirewallDelete { chain: String, index: u32 },
    Package {
        action: PackageCmd,
        name: String,
    },
    /// opkg update + lista de atualizáveis
    UpdatePackages,
    Service {
        action: ServiceCmd,
        name: String,
    },
    /// uci set + commit
    UciSet {
        section: String,
        option: String,
        value: String,
    },
    Reboot,
    Backup,
    ClearLogs,
}

#[derive(Clone, Copy, ValueEnum)]
enum PackageCmd {
    Install,
    Remove,
    Upgrade,
}

#[derive(Clone, Copy, ValueEnum)]
enum ServiceCmd {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new()?;
    let config = config_manager.get_config().clone();
    logging::init(&config.log_filter);

    let store = match ConnectionStore::new() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = %e, "persistência da conexão desativada");
            None
        }
    };
    let app = AppContext::new(store);
    let saved = app.saved_connection();

    if let Command::Saved = cli.command {
        print_json(&saved)?;
        return Ok(());
    }

    let host = cli
        .host
        .or_else(|| saved.as_ref().map(|s| s.host.clone()))
        .context("Informe --host (nenhuma conexão salva)")?;
    let username = cli
        .user
        .or_else(|| saved.as_ref().map(|s| s.username.clone()))
        .unwrap_or_else(|| config.default_username.clone());
    let port = cli
        .port
        .or_else(|| saved.as_ref().map(|s| s.port))
        .unwrap_or(config.default_port);
    let password = match cli.password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Senha de {}@{}: ", username, host))
            .context("Falha ao ler a senha")?,
    };

    let descriptor = SshServerConfig::new(host, username, password)
        .with_port(port)
        .with_timeouts(config.timeouts());

    let summary = app.connect(&descriptor).await?;
    tracing::info!("{}", summary.message);

    let api = app.api().await?;
    let result = run(&api, cli.command).await;
    app.disconnect().await;

    print_json(&result?)
}

async fn run(api: &OpenWrtApi, command: Command) -> Result<Value> {
    let value = match command {
        Command::Saved => Value::Null,
        Command::System => to_json(api.get_system_info().await)?,
        Command::Stats => to_json(api.get_system_stats().await)?,
        Command::Dashboard => to_json(api.get_dashboard().await)?,
        Command::Network => to_json(api.get_network_info().await)?,
        Command::InterfaceStatus => to_json(api.get_interface_status().await)?,
        Command::Wireless => to_json(api.get_wireless_info().await)?,
        Command::WirelessClients => to_json(api.get_wireless_clients().await)?,
        Command::Dhcp => to_json(api.get_dhcp_info().await)?,
        Command::Firewall => to_json(api.get_firewall_info().await)?,
        Command::Packages => to_json(api.get_package_info().await)?,
        Command::Services => to_json(api.get_services().await)?,
        Command::Logs => to_json(api.get_logs().await)?,
        Command::Filesystem => to_json(api.get_filesystem_info().await)?,
        Command::Processes => to_json(api.get_processes().await)?,
        Command::Uci => to_json(api.get_uci_config().await)?,
        Command::FirewallAdd { rule } => to_json(api.add_firewall_rule(&rule.join(" ")).await)?,
        Command::FirewallDelete { chain, index } => {
            to_json(api.delete_firewall_rule(&chain, index).await)?
        }
        Command::Package { action, name } => {
            let result = match action {
                PackageCmd::Install => api.install_package(&name).await,
                PackageCmd::Remove => api.remove_package(&name).await,
                PackageCmd::Upgrade => api.upgrade_package(&name).await,
            };
            to_json(result)?
        }
        Command::UpdatePackages => to_json(api.update_packages().await)?,
        Command::Service { action, name } => {
            let result = match action {
                ServiceCmd::Start => api.start_service(&name).await,
                ServiceCmd::Stop => api.stop_service(&name).await,
                ServiceCmd::Restart => api.restart_service(&name).await,
                ServiceCmd::Enable => api.enable_service(&name).await,
                ServiceCmd::Disable => api.disable_service(&name).await,
            };
            to_json(result)?
        }
        Command::UciSet {
            section,
            option,
            value,
        } => to_json(api.set_uci_config(&section, &option, &value).await)?,
        Command::Reboot => to_json(api.reboot().await)?,
        Command::Backup => to_json(api.backup_config().await)?,
        Command::ClearLogs => to_json(api.clear_logs().await)?,
    };
    Ok(value)
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("Falha ao serializar resultado")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Falha ao serializar resultado")?
    );
    Ok(())
}
