//! Server lifecycle: replay, background sync, accept loop.

use std::sync::Arc;

use cinder_core::Store;
use cinder_persistence::{replay, spawn_sync_task, Aof, AofError};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::connection;
use crate::dispatch::Dispatcher;
use crate::pubsub::PubSub;
use crate::ServerConfig;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Aof(#[from] AofError),
}

/// Runs the server on an already-bound listener until the task is
/// cancelled.
///
/// When an append-only log is configured, the log is replayed into the
/// store before the first connection is accepted, so no client ever
/// observes partially recovered state. A corrupt log is a fatal error.
pub async fn run(listener: TcpListener, config: ServerConfig) -> Result<(), ServerError> {
    let store = Arc::new(Store::new());
    let pubsub = Arc::new(PubSub::new());

    let aof = match &config.aof_path {
        Some(path) => Some(Arc::new(Aof::open(path)?)),
        None => None,
    };

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&pubsub),
        aof.clone(),
    ));

    if let Some(path) = &config.aof_path {
        let mut applied = 0usize;
        let entries = replay(path, |frame| {
            if dispatcher.replay_frame(&frame) {
                applied += 1;
            }
        })?;
        if entries > 0 {
            tracing::info!(
                entries,
                applied,
                keys = store.key_count(),
                hashes = store.hash_count(),
                "replayed append-only log"
            );
        }
    }

    if let Some(aof) = &aof {
        spawn_sync_task(Arc::clone(aof), config.sync_interval);
    }

    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    connection::handle(stream, peer, dispatcher).await;
                });
            }
            Err(e) => {
                // transient accept failures (EMFILE and friends) should
                // not take the server down
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}
