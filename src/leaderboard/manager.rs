use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::error::LeaderboardError;
use super::ranking;
use super::render::{render_scores, PresentationSink};
use super::score_record::{LeaderboardDocument, ScoreRecord};
use crate::backend::ReadyListener;
use crate::fmt;
use crate::store::{DocumentStore, StoreChange, StoreError, Subscription};

pub const DEFAULT_DOCUMENT_KEY: &str = "SCORE_LIST";
pub const DEFAULT_MAX_SCORES: usize = 10;
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_RETRY: Duration = Duration::from_secs(1);
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// What happens to a mutation issued while another one is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationPolicy {
    /// Wait in line; mutations apply in the order they were issued.
    #[default]
    Queue,
    /// Fail fast with [`LeaderboardError::Busy`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    AwaitingBackend,
    Ready,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub document_key: String,
    pub max_scores: usize,
    pub mutation_policy: MutationPolicy,
    pub store_timeout: Duration,
    /// Delay between attempts at the first read after the backend comes up.
    pub read_retry: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            document_key: DEFAULT_DOCUMENT_KEY.to_string(),
            max_scores: DEFAULT_MAX_SCORES,
            mutation_policy: MutationPolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            read_retry: DEFAULT_READ_RETRY,
        }
    }
}

/// Source of a score typed in by the user, read when a parameterless submit happens.
pub trait ScoreInput: Sync {
    fn name_text(&self) -> String;
    fn score_text(&self) -> String;
}

type Reply = oneshot::Sender<Result<(), LeaderboardError>>;

enum Mutation {
    Add(ScoreRecord),
    Clear,
}

enum Command {
    Mutate { mutation: Mutation, reply: Reply },
    Retrieve { reply: Reply },
    Shutdown { reply: oneshot::Sender<()> },
}

impl Command {
    fn reject(self, err: LeaderboardError) {
        match self {
            Command::Mutate { reply, .. } | Command::Retrieve { reply } => {
                let _ = reply.send(Err(err));
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

/// Handle to one leaderboard. Cheap to clone; every clone talks to the same worker.
#[derive(Clone)]
pub struct LeaderboardManager {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ManagerState>,
    scores: watch::Receiver<Vec<ScoreRecord>>,
    in_flight: Arc<AtomicBool>,
    policy: MutationPolicy,
}

impl LeaderboardManager {
    /// Spawns the worker task. The manager stays in `AwaitingBackend` until
    /// `ready` resolves and the stored document has been read once; until
    /// then every operation fails with `NotReady`.
    pub fn start(
        options: ManagerOptions,
        ready: ReadyListener,
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ManagerState::Uninitialized);
        let (scores_tx, scores_rx) = watch::channel(Vec::new());
        let policy = options.mutation_policy;

        let worker = Worker {
            options,
            store,
            sink,
            cache: LeaderboardDocument::default(),
            applied_revision: 0,
            state: state_tx,
            scores: scores_tx,
        };
        tokio::spawn(worker.run(ready, command_rx));

        Self {
            commands: command_tx,
            state: state_rx,
            scores: scores_rx,
            in_flight: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    pub async fn add_score(&self, name: impl Into<String>, score: i64) -> Result<(), LeaderboardError> {
        let record = ScoreRecord::new(name, score)?;
        self.mutate(Mutation::Add(record)).await
    }

    /// Submits whatever is currently typed into `input`.
    pub async fn add_score_from(&self, input: &dyn ScoreInput) -> Result<(), LeaderboardError> {
        let score_text = input.score_text();
        let score = score_text.trim().parse::<i64>().map_err(|_| {
            LeaderboardError::validation(fmt!("score '{score_text}' is not a whole number"))
        })?;
        self.add_score(input.name_text(), score).await
    }

    pub async fn clear_list(&self) -> Result<(), LeaderboardError> {
        self.mutate(Mutation::Clear).await
    }

    /// Re-reads the stored document and renders it.
    pub async fn retrieve_up_to_date_scores(&self) -> Result<(), LeaderboardError> {
        self.ensure_ready()?;
        self.request(|reply| Command::Retrieve { reply }).await
    }

    pub fn current_scores(&self) -> Vec<ScoreRecord> {
        self.scores.borrow().clone()
    }

    pub fn subscribe_scores(&self) -> watch::Receiver<Vec<ScoreRecord>> {
        self.scores.clone()
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Resolves `true` once ready, `false` if the manager stopped first.
    pub async fn wait_until_ready(&self) -> bool {
        let mut state = self.state.clone();
        state
            .wait_for(|s| matches!(s, ManagerState::Ready | ManagerState::Stopped))
            .await
            .map(|s| *s == ManagerState::Ready)
            .unwrap_or(false)
    }

    /// Unsubscribes from the store and stops the worker. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
    }

    fn ensure_ready(&self) -> Result<(), LeaderboardError> {
        match self.state() {
            ManagerState::Ready => Ok(()),
            ManagerState::Stopped => Err(LeaderboardError::Stopped),
            ManagerState::Uninitialized | ManagerState::AwaitingBackend => {
                Err(LeaderboardError::NotReady)
            }
        }
    }

    async fn mutate(&self, mutation: Mutation) -> Result<(), LeaderboardError> {
        self.ensure_ready()?;
        let _guard = match self.policy {
            MutationPolicy::Reject => Some(InFlightGuard::acquire(&self.in_flight)?),
            MutationPolicy::Queue => None,
        };
        self.request(|reply| Command::Mutate { mutation, reply }).await
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> Result<(), LeaderboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| LeaderboardError::Stopped)?;
        response.await.map_err(|_| LeaderboardError::Stopped)?
    }
}

/// Held for the whole round-trip of a mutation under [`MutationPolicy::Reject`].
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, LeaderboardError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| LeaderboardError::Busy)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the cached document. Commands and store changes are handled one at a
/// time, so a change notification is never processed in the middle of a mutation.
struct Worker {
    options: ManagerOptions,
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn PresentationSink>,
    cache: LeaderboardDocument,
    /// Highest revision written or applied; changes at or below it are stale.
    applied_revision: u64,
    state: watch::Sender<ManagerState>,
    scores: watch::Sender<Vec<ScoreRecord>>,
}

impl Worker {
    async fn run(mut self, mut ready: ReadyListener, mut commands: mpsc::Receiver<Command>) {
        self.state.send_replace(ManagerState::AwaitingBackend);
        info!(key = %self.options.document_key, "Waiting for backend");

        if !self.await_backend(&mut ready, &mut commands).await {
            return;
        }

        let mut subscription = Some(self.store.subscribe(&self.options.document_key));
        if !self.load_initial(&mut commands).await {
            return;
        }
        self.publish();
        self.state.send_replace(ManagerState::Ready);
        info!(
            key = %self.options.document_key,
            records = self.cache.records().len(),
            "Leaderboard ready"
        );

        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Mutate { mutation, reply }) => {
                        let result = self.apply_mutation(mutation).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Retrieve { reply }) => {
                        let result = self.retrieve().await;
                        self.publish();
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown { reply }) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    None => break,
                },
                change = next_change(&mut subscription) => {
                    self.on_change(change, &mut subscription).await;
                }
            }
        }

        drop(subscription);
        self.state.send_replace(ManagerState::Stopped);
        info!(key = %self.options.document_key, "Leaderboard manager stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    /// Returns `false` if the manager was shut down before the backend came up.
    async fn await_backend(
        &mut self,
        ready: &mut ReadyListener,
        commands: &mut mpsc::Receiver<Command>,
    ) -> bool {
        let mut backend_failed = false;
        loop {
            tokio::select! {
                is_ready = ready.wait(), if !backend_failed => {
                    if is_ready {
                        return true;
                    }
                    error!(
                        key = %self.options.document_key,
                        "Backend will never be ready, leaderboard is inoperative"
                    );
                    backend_failed = true;
                }
                command = commands.recv() => {
                    if !self.refuse(command) {
                        return false;
                    }
                }
            }
        }
    }

    /// Reads the stored document until one read succeeds. No mutation is
    /// accepted before that.
    async fn load_initial(&mut self, commands: &mut mpsc::Receiver<Command>) -> bool {
        loop {
            let failure = match self.retrieve().await {
                Ok(()) => return true,
                Err(e) => e,
            };
            warn!(
                error = %failure,
                retry_in = ?self.options.read_retry,
                "Initial leaderboard read failed"
            );

            let retry = tokio::time::sleep(self.options.read_retry);
            tokio::pin!(retry);
            loop {
                tokio::select! {
                    _ = &mut retry => break,
                    command = commands.recv() => {
                        if !self.refuse(command) {
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Answers a command that arrived before the manager was ready.
    /// Returns `false` when the manager should stop instead.
    fn refuse(&self, command: Option<Command>) -> bool {
        match command {
            Some(Command::Shutdown { reply }) => {
                self.state.send_replace(ManagerState::Stopped);
                let _ = reply.send(());
                false
            }
            Some(command) => {
                command.reject(LeaderboardError::NotReady);
                true
            }
            None => {
                self.state.send_replace(ManagerState::Stopped);
                false
            }
        }
    }

    async fn apply_mutation(&mut self, mutation: Mutation) -> Result<(), LeaderboardError> {
        let records = match mutation {
            Mutation::Add(record) => {
                debug!(name = record.name(), score = record.score(), "Adding score");
                ranking::rank(self.cache.records(), record, self.options.max_scores)
            }
            Mutation::Clear => {
                info!("Clearing leaderboard");
                Vec::new()
            }
        };

        // The cache changes before the write is issued and stays changed if it fails.
        self.cache = LeaderboardDocument::new(records);
        self.publish();

        let raw = self.cache.to_json().map_err(|e| {
            LeaderboardError::StoreWrite(StoreError::Encoding {
                message: e.to_string(),
            })
        })?;

        let written = self
            .within(self.store.set(&self.options.document_key, &raw))
            .await;
        match written {
            Ok(revision) => {
                self.applied_revision = self.applied_revision.max(revision);
                debug!(revision, records = self.cache.records().len(), "Leaderboard written");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to write leaderboard, keeping local list");
                Err(LeaderboardError::StoreWrite(e))
            }
        }
    }

    async fn retrieve(&mut self) -> Result<(), LeaderboardError> {
        let stored = self
            .within(self.store.get(&self.options.document_key))
            .await
            .map_err(LeaderboardError::StoreRead)?;

        match stored {
            Some(document) => {
                self.applied_revision = self.applied_revision.max(document.revision);
                self.apply_payload(document.revision, &document.value);
            }
            None => debug!(key = %self.options.document_key, "No leaderboard stored yet"),
        }
        Ok(())
    }

    async fn on_change(
        &mut self,
        change: Result<StoreChange, RecvError>,
        subscription: &mut Option<Subscription>,
    ) {
        match change {
            Ok(change) => self.handle_remote_change(change),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed leaderboard changes, reading the latest document");
                if let Err(e) = self.retrieve().await {
                    warn!(error = %e, "Could not catch up with leaderboard changes");
                }
                self.publish();
            }
            Err(RecvError::Closed) => {
                warn!("Change feed closed, remote updates will no longer be shown");
                *subscription = None;
            }
        }
    }

    fn handle_remote_change(&mut self, change: StoreChange) {
        if change.revision <= self.applied_revision {
            debug!(
                revision = change.revision,
                applied = self.applied_revision,
                "Skipping stale leaderboard change"
            );
            return;
        }
        self.applied_revision = change.revision;
        self.apply_payload(change.revision, &change.value);
        self.publish();
    }

    fn apply_payload(&mut self, revision: u64, raw: &str) {
        match LeaderboardDocument::from_json(raw) {
            Ok(document) => {
                debug!(revision, records = document.records().len(), "Leaderboard updated");
                self.cache = document;
            }
            Err(e) => {
                warn!(revision, error = %e, "Ignoring leaderboard payload, keeping current list");
            }
        }
    }

    /// Renders the cached list and hands it to score observers.
    fn publish(&self) {
        self.sink.render(&render_scores(self.cache.records()));
        self.scores.send_replace(self.cache.records().to_vec());
    }

    async fn within<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.options.store_timeout, operation)
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Timeout {
                    key: self.options.document_key.clone(),
                    after: self.options.store_timeout,
                })
            })
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Result<StoreChange, RecvError> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
