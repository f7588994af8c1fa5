mod backend;
mod config;
mod console;
mod leaderboard;
mod logging;
mod store;
mod util;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::leaderboard::LeaderboardManager;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> Result<(), Error> {
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let cfg = config::load_config()?;

    // The local UTC offset can only be read while the process is single-threaded.
    logging::init(&cfg.log)?;
    info!("Logging Initialised. Initialising topscores");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cfg))
}

async fn run(cfg: config::AppConfig) -> Result<(), Error> {
    let store = store::open_store(cfg.store, &cfg.database_path);
    let ready = backend::spawn_initialisation(store.clone());

    let sink = Arc::new(console::ConsoleSink::new());
    let manager = LeaderboardManager::start(cfg.manager_options(), ready, store, sink.clone());
    spawn_score_observer(manager.clone());

    info!(
        store = ?cfg.store,
        key = %cfg.document_key,
        max_scores = cfg.max_scores,
        policy = ?cfg.mutation_policy,
        "Setup complete. Starting console"
    );

    let result = console::run(&manager, &sink).await;
    if let Err(e) = &result {
        warn!(error = %e, "Console stopped unexpectedly");
    }

    manager.shutdown().await;
    info!("Shut down");
    result
}

fn spawn_score_observer(manager: LeaderboardManager) {
    tokio::spawn(async move {
        if !manager.wait_until_ready().await {
            return;
        }
        info!("Leaderboard is accepting scores");

        let mut scores = manager.subscribe_scores();
        while scores.changed().await.is_ok() {
            let current = scores.borrow_and_update();
            debug!(
                records = current.len(),
                top = ?current.first().map(|r| (r.name().to_string(), r.score())),
                "Leaderboard changed"
            );
        }
    });
}
