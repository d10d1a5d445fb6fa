//! 嵌入式设备的自助配置：类型化的配置表、NVS 持久化和 captive portal 表单。
//!
//! ```ignore
//! static SCHEMA: [EntryInfo; 2] = [
//!     EntryInfo::string("WiFi SSID", "ssid"),
//!     EntryInfo::boolean("Enabled", "enabled"),
//! ];
//!
//! let registry = Registry::new(&SCHEMA)?;
//! let mut session = PortalSession::new(registry, NvsBackend::take()?, PortalConfig::default());
//! if !session.load()? {
//!     session.start_portal(&mut services)?;
//! }
//! ```

pub mod captive_portal;
pub mod config;
pub mod form;
mod html;
#[cfg(target_os = "espidf")]
pub mod nvs;
pub mod persist;
pub mod registry;
pub mod render;
pub mod store;

pub use captive_portal::{PortalServices, PortalSession, SessionState};
pub use config::PortalConfig;
pub use form::apply_form_body;
pub use persist::{load, save};
pub use registry::{ConfigError, EntryInfo, EntryKind, Registry, Value};
pub use render::render;
pub use store::{KeyValueStore, MemoryStore, StoreBackend, StoreError};
