//! Thin HTTP boundary in front of the session layer.
//!
//! Two endpoints, both delegating straight to the hub: remote peers
//! establish reverse tunnels on `/connect` (authenticated by the
//! `x-tunnel-id` header), and the proxy route dials an established session
//! and reports the routed target. Payload transport over the tunnel is the
//! transport library's concern, not ours.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;
use warp::http::StatusCode;
use warp::reply;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::SessionManager;
use crate::TunnelHub;

/// Header carrying the connecting peer's identity.
pub const TUNNEL_ID_HEADER: &str = "x-tunnel-id";
/// Header carrying the connecting peer's credential.
pub const TUNNEL_TOKEN_HEADER: &str = "x-tunnel-token";

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    timeout: Option<u64>,
}

pub fn routes(
    hub: Arc<TunnelHub>,
    default_dial_timeout: Duration,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    connect_route(hub.clone()).or(client_route(hub, default_dial_timeout))
}

/// `GET /connect`: tunnel-accept endpoint. A non-empty `x-tunnel-id` header
/// authorizes the peer and registers its inbound session.
fn connect_route(hub: Arc<TunnelHub>) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path("connect")
        .and(warp::path::end())
        .and(warp::header::optional::<String>(TUNNEL_ID_HEADER))
        .and(warp::header::optional::<String>(TUNNEL_TOKEN_HEADER))
        .map(move |identity: Option<String>, token: Option<String>| {
            let identity = match identity.filter(|v| !v.is_empty()) {
                Some(identity) => identity,
                None => {
                    return reply::with_status("missing x-tunnel-id", StatusCode::UNAUTHORIZED).into_response();
                }
            };
            match hub.accept(&identity, token.as_deref().unwrap_or_default()) {
                Ok(()) => {
                    info!(%identity, "inbound tunnel registered");
                    reply::with_status("tunnel registered", StatusCode::OK).into_response()
                }
                Err(e) => {
                    warn!(%identity, error = %e, "inbound tunnel rejected");
                    reply::with_status("session already exists", StatusCode::CONFLICT).into_response()
                }
            }
        })
}

/// `GET /client/{id}/{scheme}/{host}/{path..}?timeout=n`: dial the target
/// peer's session and report the routed request target.
fn client_route(
    hub: Arc<TunnelHub>,
    default_dial_timeout: Duration,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path("client")
        .and(warp::path::param::<String>())
        .and(warp::path::param::<String>())
        .and(warp::path::param::<String>())
        .and(warp::path::tail())
        .and(warp::query::<ProxyQuery>())
        .and_then(
            move |identity: String, scheme: String, host: String, tail: warp::path::Tail, query: ProxyQuery| {
                let hub = hub.clone();
                async move {
                    let timeout = query
                        .timeout
                        .map(Duration::from_secs)
                        .unwrap_or(default_dial_timeout);
                    let target = format!("{}://{}/{}", scheme, host, tail.as_str());
                    match hub.dial(&identity, timeout).await {
                        Ok(conn) => {
                            info!(%identity, target = %target, session = %conn.address, "proxy dial ok");
                            Ok::<_, Infallible>(
                                reply::with_status(
                                    format!("routing {} via session {}", target, conn.address),
                                    StatusCode::OK,
                                )
                                .into_response(),
                            )
                        }
                        Err(e) => {
                            warn!(%identity, target = %target, error = %e, "proxy dial failed");
                            Ok(reply::with_status(format!("dial failed: {}", e), StatusCode::BAD_GATEWAY).into_response())
                        }
                    }
                }
            },
        )
}

/// Serve the tunnel front end until the graceful signal fires.
pub async fn start_server(
    hub: Arc<TunnelHub>,
    port: u16,
    default_dial_timeout: Duration,
    mut shutdown_signal: watch::Receiver<()>,
) -> crate::Result<()> {
    let (addr, server) =
        warp::serve(routes(hub, default_dial_timeout)).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    info!(%addr, "tunnel front end listening");
    server.await;
    Ok(())
}
