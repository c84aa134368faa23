// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shared lifecycle plumbing for the embedded axum servers: spawn on an
//! already-bound listener, stop with a grace period and a forced abort.

use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const SHUTDOWN_FORCE: Duration = Duration::from_secs(1);

/// A running embedded server plus the means to stop it.
pub struct ServerHandle {
    name: &'static str,
    task: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl ServerHandle {
    /// Serve `router` on `listener` until `stop` is called.
    pub fn spawn(name: &'static str, listener: TcpListener, router: axum::Router) -> ServerHandle {
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!("{} server error: {}", name, e);
            }
        });
        ServerHandle {
            name,
            task,
            shutdown,
        }
    }

    /// Graceful stop with a one second grace window, then a one second
    /// forced abort.
    pub async fn stop(self) {
        let ServerHandle {
            name,
            mut task,
            shutdown,
        } = self;
        let _ = shutdown.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_ok() {
            info!("{} server stopped", name);
            return;
        }
        task.abort();
        let _ = tokio::time::timeout(SHUTDOWN_FORCE, task).await;
        info!("{} server stopped (forced)", name);
    }
}
