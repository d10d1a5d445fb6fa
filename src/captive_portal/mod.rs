//! SoftAP + Web 配网模块
//!
//! 会话状态机和路由与平台无关；SoftAP 和 HTTP 服务器的 ESP-IDF 实现只在
//! `espidf` 目标上编译。

pub mod dns;
mod routes;
mod session;

#[cfg(target_os = "espidf")]
mod handlers;
#[cfg(target_os = "espidf")]
mod server;

pub use routes::{PortalRouter, PortalState, SharedState, PROBE_PATHS};
#[cfg(target_os = "espidf")]
pub use server::EspPortalServices;
pub use session::{PortalServices, PortalSession, SessionState};
