use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::store::DocumentStore;

/// Resolving half of the one-shot backend readiness signal.
///
/// Consumed by [`ReadySignal::resolve`], so readiness fires at most once.
/// Dropping it unresolved means the backend failed to come up.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct ReadyListener {
    rx: watch::Receiver<bool>,
}

pub fn ready_signal() -> (ReadySignal, ReadyListener) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal { tx }, ReadyListener { rx })
}

impl ReadySignal {
    pub fn resolve(self) {
        self.tx.send_replace(true);
    }
}

impl ReadyListener {
    /// Returns `true` once the backend is ready, `false` if it never will be.
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|ready| *ready).await.is_ok()
    }
}

/// Initialises the store in the background and resolves readiness on success.
pub fn spawn_initialisation(store: Arc<dyn DocumentStore>) -> ReadyListener {
    let (signal, listener) = ready_signal();

    tokio::spawn(async move {
        match store.init().await {
            Ok(()) => {
                info!("Backend initialised");
                signal.resolve();
            }
            Err(e) => {
                error!(error = %e, "Failed to initialise backend, leaderboard will stay inoperative");
            }
        }
    });

    listener
}
