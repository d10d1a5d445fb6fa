//! HTTP 服务器、SoftAP 和 DNS 的 ESP-IDF 实现

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    http::server::{Configuration, EspHttpServer},
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration, NetifStack},
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration as WifiConfig, EspWifi,
        WifiDriver,
    },
};

use super::dns::{DnsRedirect, DNS_PORT};
use super::handlers;
use super::routes::PortalRouter;
use super::session::PortalServices;
use crate::config::PortalConfig;
use crate::nvs::NvsBackend;

pub struct EspPortalServices {
    modem: Option<Modem>,
    sysloop: EspSystemEventLoop,
    config: PortalConfig,
    wifi: Option<BlockingWifi<EspWifi<'static>>>,
    server: Option<EspHttpServer<'static>>,
    dns: Option<DnsRedirect>,
}

impl EspPortalServices {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop, config: PortalConfig) -> Self {
        Self {
            modem: Some(modem),
            sysloop,
            config,
            wifi: None,
            server: None,
            dns: None,
        }
    }

    fn start_ap(&mut self) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
        let modem = self
            .modem
            .take()
            .ok_or_else(|| anyhow::anyhow!("modem already used by a previous session"))?;

        let ap_ip = ipv4::Ipv4Addr::from(self.config.ap_ip.octets());

        // 配置 AP 网络接口，使用固定 IP，DNS 指向自己
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: ap_ip,
                    mask: Mask(self.config.ap_netmask),
                },
                dhcp_enabled: true,
                dns: Some(ap_ip),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };

        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;
        let driver = WifiDriver::new(modem, self.sysloop.clone(), None)?;

        // STA netif 在 AP 模式下不使用，但 API 需要
        let sta_netif = EspNetif::new(NetifStack::Sta)?;

        let mut wifi = BlockingWifi::wrap(
            EspWifi::wrap_all(driver, sta_netif, ap_netif)?,
            self.sysloop.clone(),
        )?;

        let ap_config = AccessPointConfiguration {
            ssid: self
                .config
                .ap_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("SSID too long: {}", self.config.ap_ssid))?,
            ssid_hidden: false,
            channel: self.config.channel,
            auth_method: AuthMethod::None,
            max_connections: self.config.max_connections,
            ..Default::default()
        };

        wifi.set_configuration(&WifiConfig::AccessPoint(ap_config))?;
        wifi.start()?;

        Ok(wifi)
    }
}

impl PortalServices<NvsBackend> for EspPortalServices {
    fn softap_up(&mut self) -> anyhow::Result<()> {
        let wifi = self.start_ap()?;
        self.wifi = Some(wifi);
        Ok(())
    }

    fn softap_down(&mut self) -> anyhow::Result<()> {
        if let Some(mut wifi) = self.wifi.take() {
            wifi.stop()?;
            log::info!("SoftAP stopped");
        }
        Ok(())
    }

    fn http_start(&mut self, router: Arc<PortalRouter<NvsBackend>>) -> anyhow::Result<()> {
        let config = Configuration {
            stack_size: self.config.http_stack_size,
            max_uri_handlers: self.config.max_uri_handlers,
            max_open_sockets: 7,
            lru_purge_enable: true,
            ..Default::default()
        };

        let mut server = EspHttpServer::new(&config)?;
        handlers::register_routes(&mut server, router)?;

        self.server = Some(server);
        Ok(())
    }

    fn http_stop(&mut self) -> anyhow::Result<()> {
        // drop 时 EspHttpServer 调用 httpd_stop
        if self.server.take().is_some() {
            log::info!("HTTP server stopped");
        }
        Ok(())
    }

    fn dns_start(&mut self) -> anyhow::Result<()> {
        let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DNS_PORT));
        self.dns = Some(DnsRedirect::start(bind, self.config.ap_ip)?);
        Ok(())
    }

    fn dns_stop(&mut self) -> anyhow::Result<()> {
        if let Some(mut dns) = self.dns.take() {
            dns.stop();
        }
        Ok(())
    }
}
