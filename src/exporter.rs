//! The `/metrics` listener.
//!
//! A plain hyper HTTP/1.1 server, one task per connection. It only reads
//! the registry; every scrape renders the current values.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::MetricsRegistry;

const INDEX_BODY: &str = "critic exporter\nmetrics are served at /metrics\n";

pub struct Exporter {
    listener: TcpListener,
    registry: MetricsRegistry,
}

impl Exporter {
    pub async fn bind(addr: SocketAddr, registry: MetricsRegistry) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve scrapes until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> std::io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    let (stream, peer_addr) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // Per-connection failures (e.g. EMFILE) must not stop the listener.
                            error!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let registry = self.registry.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let response = handle(&req, &registry);
                            async move { Ok::<_, Infallible>(response) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                            debug!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = cancel.cancelled() => {
                    info!("metrics listener shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn handle(req: &Request<Incoming>, registry: &MetricsRegistry) -> Response<Full<Bytes>> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n");
    }

    match req.uri().path() {
        "/metrics" => match registry.encode_text() {
            Ok((body, content_type)) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, content_type)
                .body(Full::new(Bytes::from(body)))
                .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")),
            Err(e) => {
                error!(error = %e, "failed to encode metrics");
                text(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n")
            }
        },
        "/" => text(StatusCode::OK, INDEX_BODY),
        _ => text(StatusCode::NOT_FOUND, "not found\n"),
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
