//! Prometheus scrape endpoint. This is the only HTTP surface this crate
//! builds; the `metrics` export surface itself is an external collaborator
//! per the spec's scope note, so only the counter/histogram hooks and this
//! minimal exporter exist here — no dashboard, no auth.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::MetricsConfig;

pub struct MetricsServer {
    handle: PrometheusHandle,
    cfg: MetricsConfig,
}

impl MetricsServer {
    /// Installs the global Prometheus recorder. Must be called once before
    /// any `counter!`/`histogram!` macro use; panics if called twice.
    pub fn install(cfg: MetricsConfig) -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(MetricsServer { handle, cfg })
    }

    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.cfg.listen.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("metrics listening on http://{}{}", addr, self.cfg.path);

        let handle = Arc::new(self.handle);
        let path: Arc<str> = Arc::from(self.cfg.path.as_str());

        loop {
            let (stream, _) = listener.accept().await?;
            let handle = handle.clone();
            let path = path.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
                    let handle = handle.clone();
                    let path = path.clone();
                    async move { scrape_handler(req, handle, path).await }
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, service)
                    .await;
            });
        }
    }
}

async fn scrape_handler(
    req: Request<hyper::body::Incoming>,
    handle: Arc<PrometheusHandle>,
    path: Arc<str>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    if req.uri().path() != path.as_ref() {
        return Ok(Response::builder()
            .status(404)
            .body(Full::new(Bytes::from("not found")))
            .unwrap());
    }

    let body = handle.render();
    Ok(Response::builder()
        .status(200)
        .header("content-type", "text/plain; version=0.0.4")
        .body(Full::new(Bytes::from(body)))
        .unwrap())
}
