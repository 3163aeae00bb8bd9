use crate::assets::WS_PATH;
use crate::config::Config;
use crate::net::connection::{serve_connection, SessionContext};
use crate::pose::PoseEstimator;
use crate::session::SessionId;
use anyhow::Context;
use async_tungstenite::tokio::accept_hdr_async;
use async_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use async_tungstenite::tungstenite::http::StatusCode;
use log::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A live session as seen from the server
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub peer: SocketAddr,
    pub cancel: CancellationToken,
}

type Registry = Arc<Mutex<HashMap<SessionId, SessionHandle>>>;

/// Accepts WebSocket clients on [`WS_PATH`], one independent session each.
pub struct PoseServer {
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    sessions: Registry,
    next_id: AtomicU64,
}

impl PoseServer {
    pub async fn bind(config: &Config, estimator: Arc<dyn PoseEstimator>) -> anyhow::Result<PoseServer> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("could not listen on {}", addr))?;

        Ok(PoseServer {
            listener,
            ctx: SessionContext::new(estimator, config.session.clone()),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Accept until `shutdown` fires, then cancel every live session and
    /// wait for each one to close.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(
            "PoseServer: listening on ws://{}{} (estimator: {})",
            self.local_addr()?,
            WS_PATH,
            self.ctx.estimator.name()
        );

        let tasks = TaskTracker::new();

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("PoseServer: accept failed: {}", e);
                        continue;
                    }
                },
            };

            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            let cancel = shutdown.child_token();
            self.sessions.lock().await.insert(
                id,
                SessionHandle {
                    peer,
                    cancel: cancel.clone(),
                },
            );

            let ctx = Arc::clone(&self.ctx);
            let sessions = Arc::clone(&self.sessions);

            tasks.spawn(async move {
                let handshake = tokio::select! {
                    _ = cancel.cancelled() => None,
                    handshake = accept_hdr_async(stream, check_path) => Some(handshake),
                };
                match handshake {
                    None => {}
                    Some(Ok(ws)) => {
                        info!("Session {}: connected from {}", id, peer);
                        serve_connection(id, ws, ctx, cancel).await;
                    }
                    Some(Err(e)) => warn!("PoseServer: handshake with {} failed: {}", peer, e),
                }
                sessions.lock().await.remove(&id);
            });
        }

        let cancelled = {
            let sessions = self.sessions.lock().await;
            for handle in sessions.values() {
                handle.cancel.cancel();
            }
            sessions.len()
        };

        tasks.close();
        tasks.wait().await;
        info!("PoseServer: stopped, {} session(s) closed", cancelled);

        Ok(())
    }
}

fn check_path(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == WS_PATH {
        return Ok(resp);
    }

    let mut err = ErrorResponse::new(Some(format!("no endpoint at {}", req.uri().path())));
    *err.status_mut() = StatusCode::NOT_FOUND;
    Err(err)
}
