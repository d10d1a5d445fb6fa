//! HTTP 路由，和具体的 HTTP 服务器实现无关
//!
//! 服务器把每个请求的方法、路径和请求体交给 [`PortalRouter::handle`]，
//! 再把返回的响应原样写回客户端。

use std::sync::{Arc, Mutex, MutexGuard};

use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Method, Response, StatusCode};
use tokio::sync::oneshot;

use crate::form;
use crate::persist;
use crate::registry::Registry;
use crate::store::StoreBackend;

/// 配置表和存储后端，由同一把锁保护
pub struct PortalState<B> {
    pub registry: Registry,
    pub backend: B,
    pub namespace: String,
}

pub type SharedState<B> = Arc<Mutex<PortalState<B>>>;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// 各系统的 captive portal 检测地址
pub const PROBE_PATHS: [&str; 3] = ["/generate_204", "/hotspot-detect.html", "/connecttest.txt"];

pub struct PortalRouter<B> {
    page: Arc<str>,
    location: HeaderValue,
    state: SharedState<B>,
    done: Mutex<Option<oneshot::Sender<()>>>,
}

fn text(status: StatusCode, body: &str) -> Response<Arc<str>> {
    let mut resp = Response::new(Arc::from(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    resp
}

impl<B: StoreBackend> PortalRouter<B> {
    pub fn new(
        page: Arc<str>,
        root_url: &str,
        state: SharedState<B>,
        done: oneshot::Sender<()>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            page,
            location: HeaderValue::from_str(root_url)?,
            state,
            done: Mutex::new(Some(done)),
        })
    }

    pub fn handle(&self, method: &Method, uri: &str, body: &[u8]) -> Response<Arc<str>> {
        let path = uri.split_once('?').map_or(uri, |(path, _)| path);
        log::debug!("{} {}", method, path);

        match (method, path) {
            (&Method::GET, "/") => self.handle_index(),
            (&Method::POST, "/config") => self.handle_config_post(body),
            (&Method::GET, "/api/config") => self.handle_config_get(),
            (&Method::GET, "/api/schema") => self.handle_schema_get(),
            (&Method::GET, p) if PROBE_PATHS.contains(&p) => self.redirect(),
            _ => text(StatusCode::NOT_FOUND, "Not Found"),
        }
    }

    /// 读取请求体超时时的响应
    pub fn timeout_response() -> Response<Arc<str>> {
        text(StatusCode::REQUEST_TIMEOUT, "Request Timeout")
    }

    fn handle_index(&self) -> Response<Arc<str>> {
        let mut resp = Response::new(self.page.clone());
        resp.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        resp
    }

    fn handle_config_get(&self) -> Response<Arc<str>> {
        let json = lock(&self.state).registry.snapshot().to_string();
        let mut resp = Response::new(Arc::from(json));
        resp.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        resp
    }

    fn handle_schema_get(&self) -> Response<Arc<str>> {
        let schema = lock(&self.state).registry.schema();
        match serde_json::to_string(schema) {
            Ok(json) => {
                let mut resp = Response::new(Arc::from(json));
                resp.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                resp
            }
            Err(e) => {
                log::error!("Failed to serialize schema: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn handle_config_post(&self, body: &[u8]) -> Response<Arc<str>> {
        log::info!("Received config: {}", String::from_utf8_lossy(body));

        // 解析和保存在同一把锁内完成，并发提交会被串行化
        let saved = {
            let mut state = lock(&self.state);
            let state = &mut *state;
            form::apply_form_body(&mut state.registry, body);
            persist::save(&state.registry, &state.backend, &state.namespace)
        };

        match saved {
            Ok(()) => {
                if let Some(done) = lock(&self.done).take() {
                    // 接收端已经不在时没有人需要通知
                    let _ = done.send(());
                }
                text(StatusCode::OK, "OK")
            }
            Err(e) => {
                log::error!("Failed to save config: {}", e);
                text(StatusCode::OK, "Save failed!")
            }
        }
    }

    fn redirect(&self) -> Response<Arc<str>> {
        let mut resp = text(StatusCode::FOUND, "Redirecting...");
        resp.headers_mut().insert(LOCATION, self.location.clone());
        resp
    }
}
