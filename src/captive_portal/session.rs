//! 配网会话状态机：`Idle → Serving → Idle`
//!
//! 启动 SoftAP、HTTP 和 DNS 后阻塞当前线程，直到有一次成功的表单提交。

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use super::routes::{lock, PortalRouter, PortalState, SharedState};
use crate::config::PortalConfig;
use crate::persist;
use crate::registry::Registry;
use crate::render::render;
use crate::store::{StoreBackend, StoreError};

/// 会话依赖的外部服务：SoftAP、HTTP 服务器和 DNS 劫持
pub trait PortalServices<B> {
    fn softap_up(&mut self) -> anyhow::Result<()>;
    fn softap_down(&mut self) -> anyhow::Result<()>;
    /// 服务器持有 router 直到 `http_stop`，每个请求都交给它处理
    fn http_start(&mut self, router: Arc<PortalRouter<B>>) -> anyhow::Result<()>;
    fn http_stop(&mut self) -> anyhow::Result<()>;
    fn dns_start(&mut self) -> anyhow::Result<()>;
    fn dns_stop(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Serving,
}

pub struct PortalSession<B> {
    shared: SharedState<B>,
    config: PortalConfig,
    state: SessionState,
}

fn log_teardown(what: &str, result: anyhow::Result<()>) {
    if let Err(e) = result {
        log::error!("Failed to stop {}: {:?}", what, e);
    }
}

impl<B: StoreBackend> PortalSession<B> {
    pub fn new(registry: Registry, backend: B, config: PortalConfig) -> Self {
        let shared = Arc::new(Mutex::new(PortalState {
            registry,
            backend,
            namespace: config.namespace.clone(),
        }));
        Self {
            shared,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&lock(&self.shared).registry)
    }

    pub fn with_registry_mut<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        f(&mut lock(&self.shared).registry)
    }

    /// 从存储加载已有配置，`Ok(false)` 表示有条目缺失
    pub fn load(&self) -> Result<bool, StoreError> {
        let mut state = lock(&self.shared);
        let state = &mut *state;
        persist::load(&mut state.registry, &state.backend, &state.namespace)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let state = lock(&self.shared);
        persist::save(&state.registry, &state.backend, &state.namespace)
    }

    /// 启动配网门户并阻塞，直到用户成功提交一次配置
    ///
    /// 内部用 `blocking_recv` 等待，不能在异步运行时中调用。
    pub fn start_portal<S: PortalServices<B>>(&mut self, services: &mut S) -> anyhow::Result<()> {
        if self.state == SessionState::Serving {
            anyhow::bail!("portal session is already serving");
        }

        self.state = SessionState::Serving;
        let result = self.serve(services);
        self.state = SessionState::Idle;
        result
    }

    fn serve<S: PortalServices<B>>(&mut self, services: &mut S) -> anyhow::Result<()> {
        services.softap_up()?;
        log::info!("SoftAP started: {}", self.config.ap_ssid);

        // 页面只在会话开始时生成一次
        let page: Arc<str> = Arc::from(render(&lock(&self.shared).registry));

        let (done_tx, done_rx) = oneshot::channel();
        let router = match PortalRouter::new(
            page,
            &self.config.root_url(),
            self.shared.clone(),
            done_tx,
        ) {
            Ok(router) => Arc::new(router),
            Err(e) => {
                log_teardown("softap", services.softap_down());
                return Err(e);
            }
        };

        if let Err(e) = services.http_start(router) {
            log_teardown("softap", services.softap_down());
            return Err(e);
        }
        log::info!("HTTP server started on {}", self.config.ap_ip);

        if let Err(e) = services.dns_start() {
            log_teardown("http server", services.http_stop());
            log_teardown("softap", services.softap_down());
            return Err(e);
        }

        log::info!("Waiting for configuration submit...");
        let submitted = done_rx.blocking_recv();

        log_teardown("http server", services.http_stop());
        log_teardown("dns server", services.dns_stop());
        log_teardown("softap", services.softap_down());

        match submitted {
            Ok(()) => {
                log::info!("Configuration submitted, portal closed");
                Ok(())
            }
            Err(_) => Err(anyhow::anyhow!(
                "portal closed before configuration was submitted"
            )),
        }
    }
}
