//! Mining controller
//!
//! A single event loop owns the miner state and at most one in-flight nonce
//! search. Pool changes cancel the current search and, when mining is enabled
//! and the pool is ready, start a new one on a fresh candidate block. Searches
//! run on the blocking thread pool and receive a copy of everything they need,
//! so nothing in the hot loop is shared with the controller except the
//! cancellation token.

use crate::chain::ChainView;
use crate::config::ConsensusConfig;
use crate::error::{ConsensusError, Result};
use crate::identity::Identity;
use crate::mining::{assemble_candidate, build_coinbase, current_timestamp, search_nonce};
use crate::pool::{PendingPool, PoolListener};
use crate::pow::Target;
use crate::types::{Block, Hash};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// Outbound path for mined blocks
pub trait NetworkSend: Send + Sync {
    fn send_block(&self, block: &Block);
}

/// Local block-handling path; returns whether the block was accepted
pub trait BlockAcceptor: Send + Sync {
    fn handle_block(&self, block: Block) -> bool;
}

/// Commands understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerCommand {
    PoolChanged,
    SetActive(bool),
    Shutdown,
}

/// Snapshot of the controller state, published after every transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerStatus {
    /// Mining enabled
    pub active: bool,
    /// A nonce search is in flight
    pub mining: bool,
    pub attempts_started: u64,
    pub attempts_cancelled: u64,
    pub attempts_exhausted: u64,
    pub blocks_mined: u64,
    /// Ids of the pending transactions in the current (or last) candidate
    pub pool_snapshot: Vec<Hash>,
}

/// Cloneable control surface of a running [`Miner`]
#[derive(Clone)]
pub struct MinerHandle {
    commands: mpsc::UnboundedSender<MinerCommand>,
    status: watch::Receiver<MinerStatus>,
}

impl MinerHandle {
    fn send(&self, command: MinerCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| ConsensusError::MinerStopped)
    }

    pub fn notify_pool_changed(&self) -> Result<()> {
        self.send(MinerCommand::PoolChanged)
    }

    pub fn set_active(&self, active: bool) -> Result<()> {
        self.send(MinerCommand::SetActive(active))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(MinerCommand::Shutdown)
    }

    pub fn status(&self) -> MinerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MinerStatus> {
        self.status.clone()
    }
}

impl PoolListener for MinerHandle {
    fn pool_changed(&self) {
        if self.notify_pool_changed().is_err() {
            trace!("Pool change dropped: miner stopped");
        }
    }
}

/// External collaborators the controller talks to
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainView>,
    pub pool: Arc<dyn PendingPool>,
    pub identity: Arc<dyn Identity>,
    pub network: Arc<dyn NetworkSend>,
    pub acceptor: Arc<dyn BlockAcceptor>,
}

struct Attempt {
    cancel: CancellationToken,
    handle: JoinHandle<(Block, bool)>,
}

enum Event {
    Command(Option<MinerCommand>),
    Completed(std::result::Result<(Block, bool), JoinError>),
}

pub struct Miner {
    config: ConsensusConfig,
    target: Target,
    collaborators: Collaborators,
    commands: mpsc::UnboundedReceiver<MinerCommand>,
    status_tx: watch::Sender<MinerStatus>,
    status: MinerStatus,
    attempt: Option<Attempt>,
}

impl Miner {
    /// Create a controller, initially inactive, and its handle
    pub fn new(config: ConsensusConfig, collaborators: Collaborators) -> Result<(Self, MinerHandle)> {
        let target = config.difficulty_target()?;
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(MinerStatus::default());

        let miner = Self {
            config,
            target,
            collaborators,
            commands,
            status_tx,
            status: MinerStatus::default(),
            attempt: None,
        };
        let handle = MinerHandle { commands: commands_tx, status: status_rx };
        Ok((miner, handle))
    }

    /// Run the event loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run().instrument(info_span!("miner")))
    }

    /// Event loop; returns after `Shutdown` or once every handle is dropped
    pub async fn run(mut self) {
        info!(difficulty = %self.target, nonce_limit = self.config.nonce_limit, "Miner started");

        loop {
            let event = match self.attempt.as_mut() {
                Some(attempt) => tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    joined = &mut attempt.handle => Event::Completed(joined),
                },
                None => Event::Command(self.commands.recv().await),
            };

            match event {
                Event::Command(None) | Event::Command(Some(MinerCommand::Shutdown)) => break,
                Event::Command(Some(MinerCommand::PoolChanged)) => self.on_pool_changed().await,
                Event::Command(Some(MinerCommand::SetActive(active))) => {
                    self.on_set_active(active).await
                }
                Event::Completed(joined) => {
                    self.attempt = None;
                    self.on_search_completed(joined).await;
                }
            }
            self.publish();
        }

        self.cancel_attempt().await;
        self.publish();
        info!(blocks_mined = self.status.blocks_mined, "Miner stopped");
    }

    async fn on_set_active(&mut self, active: bool) {
        debug!(active, "Mining toggled");
        self.status.active = active;
        if !active && self.config.cancel_on_deactivate {
            self.cancel_attempt().await;
        }
    }

    async fn on_pool_changed(&mut self) {
        self.cancel_attempt().await;

        if !self.status.active {
            trace!("Pool changed while inactive");
            return;
        }
        let pool = &self.collaborators.pool;
        if !pool.meets_priority_threshold() {
            debug!("Pool below priority threshold");
            return;
        }

        let selected = pool.select_for_mining();
        let chain = &self.collaborators.chain;
        let height = chain.current_height();
        let payee = self.collaborators.identity.payee();

        let coinbase = match build_coinbase(&selected, height, &payee, &self.config) {
            Ok(coinbase) => coinbase,
            Err(e) => {
                warn!(error = %e, "Not mining: coinbase could not be built");
                return;
            }
        };
        let candidate = match assemble_candidate(
            chain.tip_hash(),
            coinbase,
            &selected,
            &self.target,
            self.config.version,
            current_timestamp(),
        ) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, "Not mining: candidate could not be assembled");
                return;
            }
        };

        self.start_attempt(candidate, height);
    }

    fn start_attempt(&mut self, mut candidate: Block, height: u64) {
        let snapshot: Vec<Hash> =
            candidate.transactions.iter().skip(1).map(|tx| tx.id()).collect();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let target = self.target;
        let nonce_limit = self.config.nonce_limit;

        let handle = tokio::task::spawn_blocking(move || {
            let found = search_nonce(&mut candidate, &target, nonce_limit, &worker_cancel);
            (candidate, found)
        });

        self.attempt = Some(Attempt { cancel, handle });
        self.status.mining = true;
        self.status.attempts_started += 1;
        debug!(
            height,
            transactions = snapshot.len(),
            attempt = self.status.attempts_started,
            "Mining attempt started"
        );
        self.status.pool_snapshot = snapshot;
    }

    /// Signal the in-flight search to stop and wait for its worker to exit
    async fn cancel_attempt(&mut self) {
        let Some(attempt) = self.attempt.take() else {
            return;
        };
        attempt.cancel.cancel();
        match attempt.handle.await {
            // the worker won the race with the cancellation
            Ok((block, true)) => self.emit(block).await,
            Ok((_, false)) => {
                self.status.mining = false;
                self.status.attempts_cancelled += 1;
                debug!(attempt = self.status.attempts_started, "Mining attempt cancelled");
            }
            Err(e) => {
                self.status.mining = false;
                warn!(error = %e, "Mining worker failed");
            }
        }
    }

    async fn on_search_completed(
        &mut self,
        joined: std::result::Result<(Block, bool), JoinError>,
    ) {
        match joined {
            Ok((block, true)) => self.emit(block).await,
            Ok((_, false)) => {
                self.status.mining = false;
                self.status.attempts_exhausted += 1;
                debug!(nonce_limit = self.config.nonce_limit, "Nonce range exhausted");
            }
            Err(e) => {
                self.status.mining = false;
                warn!(error = %e, "Mining worker failed");
            }
        }
    }

    /// Back to idle, then hand the block to the network and local handling.
    /// Local handling verifies signatures, so it runs on the blocking pool.
    async fn emit(&mut self, block: Block) {
        self.status.mining = false;
        self.status.blocks_mined += 1;
        self.publish();

        let hash = block.hash();
        info!(
            hash = %hex::encode(hash),
            nonce = block.header.nonce,
            transactions = block.transactions.len(),
            "Block mined"
        );

        self.collaborators.network.send_block(&block);
        let acceptor = Arc::clone(&self.collaborators.acceptor);
        match tokio::task::spawn_blocking(move || acceptor.handle_block(block)).await {
            Ok(true) => {}
            Ok(false) => warn!(hash = %hex::encode(hash), "Mined block rejected locally"),
            Err(e) => warn!(error = %e, hash = %hex::encode(hash), "Local block handling failed"),
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}
