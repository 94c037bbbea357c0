// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Dispatch
//!
//! Creating a transaction is split in two:
//!
//! 1. **Synchronous**: obtain a client for the caller's xpriv, draft and
//!    finalize. Failures here are returned to the HTTP caller and nothing is
//!    pushed.
//! 2. **Background**: record the finalized transaction. The HTTP request has
//!    already returned. The outcome is pushed to the caller's socket as a
//!    [`TransactionEvent`], or dropped if the caller is not connected.
//!
//! Recording jobs go through a bounded queue served by a fixed worker pool.
//! A full queue makes the HTTP request wait for space. Jobs for the same user
//! are not ordered relative to each other.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::notify::{NotificationGateway, TransactionEvent, TransactionSummary};
use crate::users::UserId;
use crate::wallet::{
    FinalizedTransaction, Recipient, TransactionMetadata, WalletClient, WalletError,
    WalletProvider,
};

/// Default number of recording workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default capacity of the recording queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("recipient is required")]
    MissingRecipient,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("transaction dispatcher is shutting down")]
    QueueClosed,
}

/// A request to send `satoshis` from the caller's wallet to `recipient`.
pub struct CreateTransaction {
    pub user_id: UserId,
    pub sender_paymail: String,
    pub xpriv: Zeroizing<String>,
    pub recipient: String,
    pub satoshis: u64,
}

struct RecordJob {
    user_id: UserId,
    client: Arc<dyn WalletClient>,
    finalized: FinalizedTransaction,
    metadata: TransactionMetadata,
}

/// Handle used by request handlers to submit transactions.
#[derive(Clone)]
pub struct TransactionDispatcher {
    wallet: Arc<dyn WalletProvider>,
    queue: mpsc::Sender<RecordJob>,
}

/// Recording workers spawned by [`TransactionDispatcher::start`].
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl TransactionDispatcher {
    /// Spawn the worker pool and return the submitting handle.
    pub fn start(
        wallet: Arc<dyn WalletProvider>,
        gateway: NotificationGateway,
        config: DispatchConfig,
    ) -> (Self, WorkerPool) {
        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let shutdown = CancellationToken::new();

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    receiver.clone(),
                    gateway.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        info!(
            workers = config.workers.max(1),
            queue_capacity = config.queue_capacity.max(1),
            "Transaction dispatcher started"
        );

        (Self { wallet, queue }, WorkerPool { workers, shutdown })
    }

    /// Draft and finalize synchronously, then queue recording.
    ///
    /// Returns once the job is queued; the outcome of recording is only
    /// observable through the caller's socket.
    pub async fn create_transaction(&self, request: CreateTransaction) -> Result<(), DispatchError> {
        if request.satoshis == 0 {
            return Err(DispatchError::InvalidAmount);
        }
        if request.recipient.trim().is_empty() {
            return Err(DispatchError::MissingRecipient);
        }

        let client = self.wallet.client_for_xpriv(&request.xpriv)?;

        let metadata = TransactionMetadata {
            sender: request.sender_paymail,
            receiver: request.recipient.clone(),
        };
        let recipients = [Recipient {
            to: request.recipient,
            satoshis: request.satoshis,
        }];

        let draft = client.draft_transaction(&recipients, &metadata).await?;
        let finalized = client.finalize_transaction(&draft).await?;
        debug!(user_id = request.user_id, draft_id = %draft.id, "Draft finalized");

        self.queue
            .send(RecordJob {
                user_id: request.user_id,
                client,
                finalized,
                metadata,
            })
            .await
            .map_err(|_| DispatchError::QueueClosed)?;

        info!(user_id = request.user_id, draft_id = %draft.id, "Transaction queued for recording");
        Ok(())
    }
}

impl WorkerPool {
    /// Wait for every worker to exit.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Dispatch worker panicked");
            }
        }
    }

    /// Stop taking new work, finish what is queued, then wait for workers.
    pub async fn shutdown(self) {
        info!("Transaction dispatcher draining");
        self.shutdown.cancel();
        self.join().await;
        info!("Transaction dispatcher stopped");
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<RecordJob>>>,
    gateway: NotificationGateway,
    shutdown: CancellationToken,
) {
    debug!(worker, "Dispatch worker started");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                job = receiver.recv() => job,
                // Drain what is already queued before exiting.
                _ = shutdown.cancelled() => receiver.try_recv().ok(),
            }
        };

        match job {
            Some(job) => record(job, &gateway).await,
            None => break,
        }
    }

    debug!(worker, "Dispatch worker stopped");
}

async fn record(job: RecordJob, gateway: &NotificationGateway) {
    let event = match job
        .client
        .record_transaction(&job.finalized, &job.metadata)
        .await
    {
        Ok(tx) => {
            info!(user_id = job.user_id, tx_id = %tx.id, "Transaction recorded");
            TransactionEvent::Success(TransactionSummary::from(&tx))
        }
        Err(e) => {
            warn!(user_id = job.user_id, draft_id = %job.finalized.draft_id, error = %e, "Transaction recording failed");
            TransactionEvent::Error(e.to_string())
        }
    };

    gateway.notify(job.user_id, &event);
}
