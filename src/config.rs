//! 配网门户的运行参数

use std::net::Ipv4Addr;

use crate::persist::DEFAULT_NAMESPACE;

/// AP 模式的固定 IP 地址
pub const DEFAULT_AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// SoftAP 的 SSID
    pub ap_ssid: String,
    /// SoftAP 的地址，同时也是网关和 DNS 应答地址
    pub ap_ip: Ipv4Addr,
    /// 子网掩码位数
    pub ap_netmask: u8,
    pub channel: u8,
    pub max_connections: u16,
    /// HTTP 服务器任务栈大小
    pub http_stack_size: usize,
    pub max_uri_handlers: usize,
    /// 保存配置用的 NVS 命名空间
    pub namespace: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            ap_ssid: "EasyConfig".to_string(),
            ap_ip: DEFAULT_AP_IP,
            ap_netmask: 24,
            channel: 1,
            max_connections: 4,
            http_stack_size: 8192,
            max_uri_handlers: 12,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl PortalConfig {
    pub fn with_ssid(mut self, ssid: impl Into<String>) -> Self {
        self.ap_ssid = ssid.into();
        self
    }

    /// 门户首页地址，用于 captive portal 检测时的重定向
    pub fn root_url(&self) -> String {
        format!("http://{}/", self.ap_ip)
    }
}
