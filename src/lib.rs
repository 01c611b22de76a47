//! Gerenciador de roteadores OpenWrt via SSH.
//!
//! `ssh` mantém a sessão única com o roteador; `openwrt` executa o catálogo
//! de comandos e transforma a saída em registros tipados.

pub mod app;
pub mod config;
pub mod logging;
pub mod openwrt;
pub mod persistence;
pub mod ssh;

pub use app::AppContext;
pub use openwrt::OpenWrtApi;
pub use ssh::{SshError, SshServerConfig, SshSession};
