//! HTTP front end: routes inbound requests to the notifier and the health checks.

use crate::handler::{self, Notifier};
use crate::health::{self, Check};
use crate::transaction;
use bytes::Bytes;
use eyre::Context;
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

const HEALTH_NAME: &str = "Dependent services healthcheck";
const HEALTH_DESCRIPTION: &str = "Checks if all the dependent services are reachable and healthy.";

/// Everything a request handler needs, shared by all connections.
#[derive(Debug, Clone)]
pub struct App {
    notifier: Notifier,
    checks: Arc<[Check]>,
}

impl App {
    pub fn new(notifier: Notifier, checks: Vec<Check>) -> Self {
        Self {
            notifier,
            checks: checks.into(),
        }
    }
}

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// Each connection is served on its own task. Once `shutdown` fires, no new connections are
/// accepted, but requests already in flight are allowed to finish before this returns.
pub async fn serve(
    listener: TcpListener,
    app: App,
    shutdown: impl Future<Output = ()>,
) -> eyre::Result<()> {
    let app = Arc::new(app);
    let graceful = GracefulShutdown::new();
    let mut shutdown = std::pin::pin!(shutdown);

    let addr = listener.local_addr().context("get local address")?;
    tracing::info!(%addr, "listening for notifications");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                let app = Arc::clone(&app);
                let service = service_fn(move |req| route(Arc::clone(&app), req));
                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let conn = graceful.watch(conn);
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
            () = &mut shutdown => {
                tracing::info!("received termination signal, no longer accepting connections");
                break;
            }
        }
    }

    drop(listener);
    graceful.shutdown().await;
    tracing::info!("all connections drained");
    Ok(())
}

async fn route(app: Arc<App>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let tid = transaction::from_headers(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str(), force_notify_id(&path)) {
        (&Method::POST, "/notify", _) => {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::warn!(%tid, error = %e, "failed to read request body");
                    Bytes::new()
                }
            };
            let outcome = app.notifier.handle_notification(&body, &tid).await;
            empty(handler::response_status(&outcome))
        }
        (&Method::POST, _, Some(video_id)) => {
            let outcome = app
                .notifier
                .handle_force_notification(video_id, &tid)
                .await;
            empty(handler::response_status(&outcome))
        }
        (&Method::GET, "/__health", _) => {
            let report = health::report(HEALTH_NAME, HEALTH_DESCRIPTION, &app.checks).await;
            match serde_json::to_vec(&report) {
                Ok(json) => Response::builder()
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Full::new(Bytes::from(json)))
                    .unwrap_or_else(|_| empty(StatusCode::INTERNAL_SERVER_ERROR)),
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize health report");
                    empty(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
        (&Method::GET, "/__gtg", _) => match health::good_to_go(&app.checks).await {
            Ok(()) => empty(StatusCode::OK),
            Err((check, e)) => {
                tracing::warn!(
                    check,
                    error = &*e as &(dyn std::error::Error + 'static),
                    "not good to go"
                );
                empty(StatusCode::SERVICE_UNAVAILABLE)
            }
        },
        (_, "/notify" | "/__health" | "/__gtg", _) | (_, _, Some(_)) => {
            empty(StatusCode::METHOD_NOT_ALLOWED)
        }
        _ => empty(StatusCode::NOT_FOUND),
    };

    tracing::debug!(%tid, %method, %path, status = %response.status(), "handled request");
    Ok(response)
}

/// Extracts `{id}` from `/force-notify/{id}`.
fn force_notify_id(path: &str) -> Option<&str> {
    path.strip_prefix("/force-notify/")
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
