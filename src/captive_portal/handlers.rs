//! 把 EspHttpServer 的请求转交给 [`PortalRouter`]

use std::sync::Arc;

use esp_idf_svc::{
    http::{
        server::{EspHttpConnection, EspHttpServer, Request},
        Headers, Method,
    },
    io::{EspIOError, Read, Write},
};

use super::routes::{PortalRouter, PROBE_PATHS};
use crate::nvs::NvsBackend;

type Router = Arc<PortalRouter<NvsBackend>>;

/// 注册所有 HTTP 路由
pub fn register_routes(server: &mut EspHttpServer<'static>, router: Router) -> anyhow::Result<()> {
    for path in ["/", "/api/config", "/api/schema"].into_iter().chain(PROBE_PATHS) {
        let router = router.clone();
        server.fn_handler(path, Method::Get, move |req| handle_get(req, &router))?;
    }

    server.fn_handler("/config", Method::Post, move |req| {
        handle_config_post(req, &router)
    })?;

    Ok(())
}

fn handle_get(req: Request<&mut EspHttpConnection<'_>>, router: &Router) -> anyhow::Result<()> {
    let resp = router.handle(&http::Method::GET, req.uri(), b"");
    respond(req, resp)
}

fn handle_config_post(
    mut req: Request<&mut EspHttpConnection<'_>>,
    router: &Router,
) -> anyhow::Result<()> {
    let body = match read_body(&mut req) {
        Ok(body) => body,
        Err(e) if e.0.code() == esp_idf_svc::sys::HTTPD_SOCK_ERR_TIMEOUT => {
            log::warn!("Timeout receiving config body");
            return respond(req, PortalRouter::<NvsBackend>::timeout_response());
        }
        Err(e) => return Err(e.into()),
    };

    let resp = router.handle(&http::Method::POST, "/config", &body);
    respond(req, resp)
}

fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Vec<u8>, EspIOError> {
    let len = req.content_len().unwrap_or(0) as usize;
    let mut buf = vec![0u8; len];
    let mut off = 0;

    while off < len {
        match req.read(&mut buf[off..])? {
            0 => break,
            n => off += n,
        }
    }

    buf.truncate(off);
    Ok(buf)
}

fn respond(
    req: Request<&mut EspHttpConnection<'_>>,
    resp: http::Response<Arc<str>>,
) -> anyhow::Result<()> {
    let headers: Vec<(&str, &str)> = resp
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();

    let status = resp.status();
    let mut out = req.into_response(status.as_u16(), status.canonical_reason(), &headers)?;
    out.write_all(resp.body().as_bytes())?;
    Ok(())
}
