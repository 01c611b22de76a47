/// Fatos do roteador: catálogo de comandos, parsers e operações
pub mod actions;
pub mod api;
pub mod commands;
pub mod parsers;
pub mod types;

pub use api::OpenWrtApi;
pub use commands::ProbeCommand;
pub use types::{
    Dashboard, DhcpInfo, DhcpLease, FilesystemInfo, FilesystemUsage, FirewallInfo, FirewallRule,
    InterfaceStatus, LoadAverage, LogsInfo, MemoryUsage, NetworkInfo, NetworkInterface,
    OperationResult, Package, PackageInfo, PackageUpdateResult, ProbeMap, ServiceStatus,
    ServicesInfo, SystemInfo, SystemStats, UciExport, WirelessInfo, WirelessNetwork,
};
