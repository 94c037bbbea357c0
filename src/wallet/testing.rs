// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scriptable in-process wallet service for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use zeroize::Zeroizing;

use super::{
    AccessKey, Balance, Direction, DraftTransaction, FinalizedTransaction, NewWallet, Recipient,
    Transaction, TransactionMetadata, WalletClient, WalletError, WalletProvider,
};

pub(crate) const FAKE_BALANCE: u64 = 10_000;

#[derive(Default)]
struct Script {
    unreachable: bool,
    fail_client: bool,
    fail_draft: bool,
    fail_record: Option<String>,
    gate_record: bool,
}

struct Inner {
    script: Mutex<Script>,
    access_keys: Mutex<HashMap<String, AccessKey>>,
    recorded: Mutex<Vec<Transaction>>,
    counter: AtomicUsize,
    drafts: AtomicUsize,
    records: AtomicUsize,
    record_gate: Semaphore,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            script: Mutex::default(),
            access_keys: Mutex::default(),
            recorded: Mutex::default(),
            counter: AtomicUsize::new(0),
            drafts: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
            record_gate: Semaphore::new(0),
        }
    }
}

/// Fake wallet service. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct FakeWallet {
    inner: Arc<Inner>,
}

impl FakeWallet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a transport error.
    pub(crate) fn set_unreachable(&self, value: bool) {
        self.inner.script.lock().unwrap().unreachable = value;
    }

    pub(crate) fn fail_client_creation(&self) {
        self.inner.script.lock().unwrap().fail_client = true;
    }

    pub(crate) fn fail_draft(&self) {
        self.inner.script.lock().unwrap().fail_draft = true;
    }

    pub(crate) fn fail_record(&self, message: &str) {
        self.inner.script.lock().unwrap().fail_record = Some(message.to_string());
    }

    /// Hold recording until [`FakeWallet::release_record`] is called.
    pub(crate) fn gate_record(&self) {
        self.inner.script.lock().unwrap().gate_record = true;
    }

    pub(crate) fn release_record(&self) {
        self.inner.record_gate.add_permits(1);
    }

    pub(crate) fn revoke(&self, access_key_id: &str) {
        if let Some(key) = self.inner.access_keys.lock().unwrap().get_mut(access_key_id) {
            key.revoked_at = Some(Utc::now());
        }
    }

    /// Issue an access key directly, bypassing a client.
    pub(crate) fn issue_access_key(&self) -> AccessKey {
        let n = self.next();
        let key = AccessKey {
            id: format!("ak-{n}"),
            key: Some(format!("key-{n}")),
            created_at: Some(Utc::now()),
            revoked_at: None,
        };
        self.inner
            .access_keys
            .lock()
            .unwrap()
            .insert(key.id.clone(), key.clone());
        key
    }

    pub(crate) fn draft_calls(&self) -> usize {
        self.inner.drafts.load(Ordering::SeqCst)
    }

    pub(crate) fn record_calls(&self) -> usize {
        self.inner.records.load(Ordering::SeqCst)
    }

    fn next(&self) -> usize {
        self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_reachable(&self) -> Result<(), WalletError> {
        if self.inner.script.lock().unwrap().unreachable {
            return Err(WalletError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn client(&self) -> Result<Arc<dyn WalletClient>, WalletError> {
        if self.inner.script.lock().unwrap().fail_client {
            return Err(WalletError::InvalidInput("bad xpriv".to_string()));
        }
        Ok(Arc::new(FakeClient {
            wallet: self.clone(),
        }))
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    fn client_for_xpriv(&self, _xpriv: &str) -> Result<Arc<dyn WalletClient>, WalletError> {
        self.client()
    }

    fn client_for_access_key(
        &self,
        _access_key: &str,
    ) -> Result<Arc<dyn WalletClient>, WalletError> {
        self.client()
    }

    async fn register_wallet(&self, paymail: &str) -> Result<NewWallet, WalletError> {
        self.check_reachable()?;
        let n = self.next();
        Ok(NewWallet {
            xpriv: Zeroizing::new(format!("xprv-fake-{n}")),
            paymail: paymail.to_string(),
        })
    }
}

struct FakeClient {
    wallet: FakeWallet,
}

#[async_trait]
impl WalletClient for FakeClient {
    async fn get_access_key(&self, id: &str) -> Result<AccessKey, WalletError> {
        self.wallet.check_reachable()?;
        self.wallet
            .inner
            .access_keys
            .lock()
            .unwrap()
            .get(id)
            .map(|key| AccessKey {
                key: None,
                ..key.clone()
            })
            .ok_or(WalletError::Unauthorized)
    }

    async fn create_access_key(&self) -> Result<AccessKey, WalletError> {
        self.wallet.check_reachable()?;
        Ok(self.wallet.issue_access_key())
    }

    async fn revoke_access_key(&self, id: &str) -> Result<AccessKey, WalletError> {
        self.wallet.check_reachable()?;
        self.wallet.revoke(id);
        self.get_access_key(id).await
    }

    async fn draft_transaction(
        &self,
        recipients: &[Recipient],
        _metadata: &TransactionMetadata,
    ) -> Result<DraftTransaction, WalletError> {
        self.wallet.check_reachable()?;
        self.wallet.inner.drafts.fetch_add(1, Ordering::SeqCst);
        if self.wallet.inner.script.lock().unwrap().fail_draft {
            return Err(WalletError::Rejected {
                status: 422,
                message: "not enough funds".to_string(),
            });
        }
        if recipients.is_empty() {
            return Err(WalletError::InvalidInput("no recipients".to_string()));
        }
        Ok(DraftTransaction {
            id: format!("draft-{}", self.wallet.next()),
            hex: String::new(),
        })
    }

    async fn finalize_transaction(
        &self,
        draft: &DraftTransaction,
    ) -> Result<FinalizedTransaction, WalletError> {
        self.wallet.check_reachable()?;
        Ok(FinalizedTransaction {
            draft_id: draft.id.clone(),
            hex: "0100000001abcdef".to_string(),
        })
    }

    async fn record_transaction(
        &self,
        finalized: &FinalizedTransaction,
        metadata: &TransactionMetadata,
    ) -> Result<Transaction, WalletError> {
        let gated = self.wallet.inner.script.lock().unwrap().gate_record;
        if gated {
            let permit = self
                .wallet
                .inner
                .record_gate
                .acquire()
                .await
                .map_err(|e| WalletError::Transport(e.to_string()))?;
            permit.forget();
        }

        self.wallet.inner.records.fetch_add(1, Ordering::SeqCst);
        self.wallet.check_reachable()?;

        let failure = self.wallet.inner.script.lock().unwrap().fail_record.clone();
        if let Some(message) = failure {
            return Err(WalletError::Rejected {
                status: 400,
                message,
            });
        }

        let tx = Transaction {
            id: format!("tx-{}", finalized.draft_id),
            block_height: 0,
            direction: Direction::Outgoing,
            total_value: 1_000,
            fee: 1,
            created_at: Utc::now(),
            metadata: Some(metadata.clone()),
        };
        self.wallet.inner.recorded.lock().unwrap().push(tx.clone());
        Ok(tx)
    }

    async fn get_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Transaction>, WalletError> {
        self.wallet.check_reachable()?;
        let recorded = self.wallet.inner.recorded.lock().unwrap();
        let skip = page.saturating_sub(1) as usize * page_size as usize;
        Ok(recorded
            .iter()
            .rev()
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn get_balance(&self) -> Result<Balance, WalletError> {
        self.wallet.check_reachable()?;
        Ok(Balance {
            satoshis: FAKE_BALANCE,
        })
    }
}
