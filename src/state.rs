// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::config::AppConfig;
use crate::crypto::{CryptoError, EncryptedSecret, PasswordHasher, SecretCipher};
use crate::dispatch::{TransactionDispatcher, WorkerPool};
use crate::notify::NotificationGateway;
use crate::session::{SessionManager, SessionStore};
use crate::users::UserStore;
use crate::wallet::WalletProvider;

/// Shared application state. Every component is injected here; there are no
/// globals.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub users: Arc<dyn UserStore>,
    pub wallet: Arc<dyn WalletProvider>,
    pub cipher: Arc<SecretCipher>,
    pub hasher: Arc<PasswordHasher>,
    pub gateway: NotificationGateway,
    pub dispatcher: TransactionDispatcher,
    pub paymail_domain: Arc<str>,
}

impl AppState {
    /// Wire all components and start the dispatch workers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: &AppConfig,
        wallet: Arc<dyn WalletProvider>,
        users: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> (Self, WorkerPool) {
        let sessions = SessionManager::new(
            session_store,
            &config.session_secret,
            config.session.clone(),
        );
        let gateway = NotificationGateway::new(sessions.clone(), config.gateway.clone());
        let (dispatcher, workers) =
            TransactionDispatcher::start(wallet.clone(), gateway.clone(), config.dispatch.clone());

        let state = Self {
            sessions,
            users,
            wallet,
            cipher: Arc::new(SecretCipher::new()),
            hasher: Arc::new(PasswordHasher::new(config.hash_salt.as_str())),
            gateway,
            dispatcher,
            paymail_domain: Arc::from(config.paymail_domain.as_str()),
        };
        (state, workers)
    }

    /// Derive the passphrase for `password` and encrypt `secret` with it.
    pub async fn seal_secret(
        &self,
        password: &str,
        secret: Zeroizing<String>,
    ) -> Result<EncryptedSecret, CryptoError> {
        let passphrase = Zeroizing::new(self.hasher.hash(password));
        let cipher = self.cipher.clone();
        run_blocking(move || cipher.encrypt(&passphrase, secret.as_bytes())).await
    }

    /// Decrypt a stored xpriv with the caller's password.
    ///
    /// The result lives only as long as the caller keeps it; it is never
    /// written to the session.
    pub async fn unlock_secret(
        &self,
        password: &str,
        secret: &EncryptedSecret,
    ) -> Result<Zeroizing<String>, CryptoError> {
        let passphrase = Zeroizing::new(self.hasher.hash(password));
        let cipher = self.cipher.clone();
        let secret = secret.clone();
        run_blocking(move || cipher.decrypt_string(&passphrase, &secret)).await
    }
}

/// Key derivation is CPU bound; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, CryptoError>
where
    F: FnOnce() -> Result<T, CryptoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(CryptoError::Task(e.to_string())))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fully wired state over in-memory stores and a fake wallet.

    use super::*;
    use axum::http::HeaderValue;

    use crate::config::{
        HASH_SALT_ENV, PAYMAIL_DOMAIN_ENV, SESSION_SECRET_ENV, WALLET_ADMIN_KEY_ENV, WALLET_URL_ENV,
    };
    use crate::session::{InMemorySessionStore, SessionData, SessionId};
    use crate::users::{InMemoryUserStore, NewUser, User};
    use crate::wallet::testing::FakeWallet;

    pub(crate) fn test_config() -> AppConfig {
        AppConfig::from_lookup(|name| {
            match name {
                WALLET_URL_ENV => Some("http://wallet.test/"),
                WALLET_ADMIN_KEY_ENV => Some("admin"),
                PAYMAIL_DOMAIN_ENV => Some("example.com"),
                HASH_SALT_ENV => Some("test-salt"),
                SESSION_SECRET_ENV => Some("0123456789abcdef0123456789abcdef"),
                _ => None,
            }
            .map(String::from)
        })
        .unwrap()
    }

    pub(crate) fn test_state() -> (AppState, FakeWallet, WorkerPool) {
        let wallet = FakeWallet::new();
        let (state, pool) = AppState::new(
            &test_config(),
            Arc::new(wallet.clone()),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemorySessionStore::new()),
        );
        (state, wallet, pool)
    }

    pub(crate) struct TestLogin {
        pub user: User,
        pub session_id: SessionId,
        pub access_key_id: String,
        /// `Cookie` request header value.
        pub cookie: String,
    }

    /// Create a user and an authenticated session directly.
    pub(crate) async fn signed_in(
        state: &AppState,
        wallet: &FakeWallet,
        email: &str,
        password: &str,
    ) -> TestLogin {
        let alias = email.split('@').next().unwrap();
        let new_wallet = state
            .wallet
            .register_wallet(&format!("{alias}@{}", state.paymail_domain))
            .await
            .unwrap();
        let encrypted_xpriv = state
            .seal_secret(password, new_wallet.xpriv.clone())
            .await
            .unwrap();
        let user = state
            .users
            .insert(NewUser {
                email: email.to_string(),
                paymail: new_wallet.paymail.clone(),
                encrypted_xpriv,
            })
            .await
            .unwrap();

        let key = wallet.issue_access_key();
        let session = state
            .sessions
            .start(SessionData::signed_in(
                key.id.clone(),
                key.key.clone().unwrap(),
                user.id,
                user.paymail.clone(),
            ))
            .await
            .unwrap();

        TestLogin {
            cookie: cookie_pair(&state.sessions.set_cookie(&session).unwrap()),
            session_id: session.id().clone(),
            access_key_id: key.id,
            user,
        }
    }

    /// `name=value` part of a `Set-Cookie` header.
    pub(crate) fn cookie_pair(set_cookie: &HeaderValue) -> String {
        set_cookie
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }
}
