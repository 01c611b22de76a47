//! Operações que alteram o roteador.
//!
//! Todas são "dispara e esquece": `success` quer dizer que o comando foi
//! entregue e retornou, não que o efeito foi verificado. `reboot` volta antes
//! do roteador cair. Nenhuma operação devolve `Err`; falhas chegam como
//! `OperationResult { success: false, error }`.

use super::api::{OpenWrtApi, operation_result};
use super::commands::{self, PackageAction, ServiceAction};
use super::parsers;
use super::types::{OperationResult, PackageUpdateResult};

/// Caracteres que encerrariam o comando `iptables` e iniciariam outro
const RULE_FORBIDDEN: &[char] = &[';', '|', '&', '`', '$', '>', '<', '\n', '\r'];

fn invalid_name(kind: &str, value: &str) -> OperationResult {
    OperationResult::failed(format!("{} inválido: {:?}", kind, value))
}

impl OpenWrtApi {
    async fn mutate(&self, command: &str, message: impl Into<String>) -> OperationResult {
        tracing::info!(command, "operação no roteador");
        let result = operation_result(self.session.execute_command(command).await);
        if result.success {
            result.with_message(message)
        } else {
            result
        }
    }

    // === FIREWALL ===

    /// Executa `iptables <rule>`. A regra não pode conter operadores de shell.
    pub async fn add_firewall_rule(&self, rule: &str) -> OperationResult {
        if rule.trim().is_empty() || rule.contains(RULE_FORBIDDEN) {
            return OperationResult::failed(format!("Regra de firewall inválida: {:?}", rule));
        }
        self.mutate(
            &commands::add_firewall_rule(rule),
            "Regra de firewall adicionada com sucesso",
        )
        .await
    }

    pub async fn delete_firewall_rule(&self, chain: &str, line_number: u32) -> OperationResult {
        if !commands::is_safe_identifier(chain) {
            return invalid_name("Chain", chain);
        }
        self.mutate(
            &commands::delete_firewall_rule(chain, line_number),
            "Regra de firewall removida com sucesso",
        )
        .await
    }

    // === PACOTES ===

    async fn package(&self, name: &str, action: PackageAction, done: &str) -> OperationResult {
        if !commands::is_safe_identifier(name) {
            return invalid_name("Pacote", name);
        }
        self.mutate(
            &commands::package_action(name, action),
            format!("Pacote {} {} com sucesso", name, done),
        )
        .await
    }

    pub async fn install_package(&self, name: &str) -> OperationResult {
        self.package(name, PackageAction::Install, "instalado").await
    }

    pub async fn remove_package(&self, name: &str) -> OperationResult {
        self.package(name, PackageAction::Remove, "removido").await
    }

    pub async fn upgrade_package(&self, name: &str) -> OperationResult {
        self.package(name, PackageAction::Upgrade, "atualizado").await
    }

    /// `opkg update` seguido da lista de atualizáveis
    pub async fn update_packages(&self) -> PackageUpdateResult {
        let update = match self.session.execute_command(commands::OPKG_UPDATE).await {
            Ok(update) => update,
            Err(e) => {
                return PackageUpdateResult {
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        match self
            .session
            .execute_command(commands::OPKG_LIST_UPGRADABLE)
            .await
        {
            Ok(upgradable) => PackageUpdateResult {
                success: true,
                update_output: Some(update.stdout),
                upgradable_count: parsers::count_upgradable(&upgradable.stdout),
                upgradable: Some(upgradable.stdout),
                message: Some("Lista de pacotes atualizada com sucesso".to_string()),
                error: None,
            },
            Err(e) => PackageUpdateResult {
                update_output: Some(update.stdout),
                error: Some(e.to_string()),
                ..Default::default()
            },
        }
    }

    // === SERVIÇOS ===

    async fn service(&self, name: &str, action: ServiceAction) -> OperationResult {
        if !commands::is_safe_identifier(name) {
            return invalid_name("Serviço", name);
        }
        let message = match action {
            ServiceAction::Start => format!("Serviço {} iniciado com sucesso", name),
            ServiceAction::Stop => format!("Serviço {} parado com sucesso", name),
            ServiceAction::Restart => format!("Serviço {} reiniciado com sucesso", name),
            ServiceAction::Enable => format!("Serviço {} habilitado na inicialização", name),
            ServiceAction::Disable => format!("Serviço {} desabilitado na inicialização", name),
        };
        self.mutate(&commands::service_action(name, action), message)
            .await
    }

    pub async fn restart_service(&self, name: &str) -> OperationResult {
        self.service(name, ServiceAction::Restart).await
    }

    pub async fn start_service(&self, name: &str) -> OperationResult {
        self.service(name, ServiceAction::Start).await
    }

    pub async fn stop_service(&self, name: &str) -> OperationResult {
        self.service(name, ServiceAction::Stop).await
    }

    pub async fn enable_service(&self, name: &str) -> OperationResult {
        self.service(name, ServiceAction::Enable).await
    }

    pub async fn disable_service(&self, name: &str) -> OperationResult {
        self.service(name, ServiceAction::Disable).await
    }

    // === UCI ===

    /// `uci set section.option='value'` e commit do arquivo da seção
    pub async fn set_uci_config(
        &self,
        section: &str,
        option: &str,
        value: &str,
    ) -> OperationResult {
        if !commands::is_safe_identifier(section) {
            return invalid_name("Seção UCI", section);
        }
        if !commands::is_safe_identifier(option) {
            return invalid_name("Opção UCI", option);
        }
        self.mutate(
            &commands::set_uci(section, option, value),
            format!("Configuração {}.{} atualizada", section, option),
        )
        .await
    }

    // === SISTEMA ===

    /// Pede o reboot em background e retorna sem esperar o roteador cair
    pub async fn reboot(&self) -> OperationResult {
        let mut result = self.mutate(commands::REBOOT, "Sistema reiniciando...").await;
        result.output = None;
        result
    }

    pub async fn backup_config(&self) -> OperationResult {
        self.mutate(
            commands::BACKUP,
            format!("Backup criado em {}", commands::BACKUP_PATH),
        )
        .await
    }

    pub async fn clear_logs(&self) -> OperationResult {
        self.mutate(commands::CLEAR_LOGS, "Logs do sistema limpos com sucesso")
            .await
    }
}
