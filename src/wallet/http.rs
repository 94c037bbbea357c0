// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP adapter for the wallet service.
//!
//! ## Request authentication
//!
//! Scoped clients never transmit their credential. Each request carries:
//!
//! | Header | Value |
//! |--------|-------|
//! | `x-auth-key-id` | hex SHA-256 of the credential |
//! | `x-auth-time` | unix milliseconds |
//! | `x-auth-signature` | hex HMAC-SHA256(credential, `METHOD\nPATH?QUERY\nTIME\nBODY`) |
//!
//! Admin calls (wallet provisioning) send `x-admin-key` instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{header::CONTENT_TYPE, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;
use zeroize::Zeroizing;

use super::{
    AccessKey, Balance, DraftTransaction, FinalizedTransaction, NewWallet, Recipient, Transaction,
    TransactionMetadata, WalletClient, WalletError, WalletProvider,
};

/// Per-request timeout for wallet service calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const HEADER_KEY_ID: &str = "x-auth-key-id";
const HEADER_TIME: &str = "x-auth-time";
const HEADER_SIGNATURE: &str = "x-auth-signature";
const HEADER_ADMIN_KEY: &str = "x-admin-key";

type HmacSha256 = Hmac<Sha256>;

/// Wallet provider backed by the wallet service REST API.
pub struct HttpWalletProvider {
    base_url: Url,
    admin_key: Zeroizing<String>,
    http: reqwest::Client,
}

impl HttpWalletProvider {
    pub fn new(mut base_url: Url, admin_key: impl Into<String>) -> Result<Self, WalletError> {
        // `Url::join` drops the last segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        Ok(Self {
            base_url,
            admin_key: Zeroizing::new(admin_key.into()),
            http,
        })
    }

    fn scoped(&self, secret: &str) -> Result<Arc<dyn WalletClient>, WalletError> {
        if secret.trim().is_empty() {
            return Err(WalletError::InvalidInput("empty credential".to_string()));
        }
        Ok(Arc::new(HttpWalletClient {
            base_url: self.base_url.clone(),
            http: self.http.clone(),
            credential: Credential::new(secret),
        }))
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    fn client_for_xpriv(&self, xpriv: &str) -> Result<Arc<dyn WalletClient>, WalletError> {
        self.scoped(xpriv)
    }

    fn client_for_access_key(
        &self,
        access_key: &str,
    ) -> Result<Arc<dyn WalletClient>, WalletError> {
        self.scoped(access_key)
    }

    async fn register_wallet(&self, paymail: &str) -> Result<NewWallet, WalletError> {
        #[derive(Deserialize)]
        struct ProvisionedWallet {
            xpriv: String,
            paymail: String,
        }

        let url = endpoint(&self.base_url, "v1/admin/wallet", &[])?;
        let response = self
            .http
            .post(url)
            .header(HEADER_ADMIN_KEY, self.admin_key.as_str())
            .json(&json!({ "paymail": paymail }))
            .send()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        let provisioned: ProvisionedWallet = read_response(response).await?;
        Ok(NewWallet {
            xpriv: Zeroizing::new(provisioned.xpriv),
            paymail: provisioned.paymail,
        })
    }
}

/// Credential used to sign requests. The secret is wiped on drop.
struct Credential {
    key_id: String,
    secret: Zeroizing<String>,
}

impl Credential {
    fn new(secret: &str) -> Self {
        Self {
            key_id: hex::encode(Sha256::digest(secret.as_bytes())),
            secret: Zeroizing::new(secret.to_string()),
        }
    }

    fn sign(&self, method: &Method, path_and_query: &str, time: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(method.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(path_and_query.as_bytes());
        mac.update(b"\n");
        mac.update(time.to_string().as_bytes());
        mac.update(b"\n");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}

struct HttpWalletClient {
    base_url: Url,
    http: reqwest::Client,
    credential: Credential,
}

impl HttpWalletClient {
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, WalletError> {
        let url = endpoint(&self.base_url, path, query)?;
        let body = match body {
            Some(value) => {
                serde_json::to_vec(&value).map_err(|e| WalletError::InvalidInput(e.to_string()))?
            }
            None => Vec::new(),
        };

        let path_and_query = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };
        let time = chrono::Utc::now().timestamp_millis();
        let signature = self.credential.sign(&method, &path_and_query, time, &body);

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(HEADER_KEY_ID, &self.credential.key_id)
            .header(HEADER_TIME, time.to_string())
            .header(HEADER_SIGNATURE, signature);
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(method = %method, path, error = %e, "Wallet service request failed");
            WalletError::Transport(e.to_string())
        })?;

        read_response(response).await
    }
}

#[async_trait]
impl WalletClient for HttpWalletClient {
    async fn get_access_key(&self, id: &str) -> Result<AccessKey, WalletError> {
        self.call(Method::GET, "v1/access-key", &[("id", id.to_string())], None)
            .await
    }

    async fn create_access_key(&self) -> Result<AccessKey, WalletError> {
        self.call(Method::POST, "v1/access-key", &[], Some(json!({})))
            .await
    }

    async fn revoke_access_key(&self, id: &str) -> Result<AccessKey, WalletError> {
        self.call(Method::DELETE, "v1/access-key", &[("id", id.to_string())], None)
            .await
    }

    async fn draft_transaction(
        &self,
        recipients: &[Recipient],
        metadata: &TransactionMetadata,
    ) -> Result<DraftTransaction, WalletError> {
        if recipients.is_empty() {
            return Err(WalletError::InvalidInput("no recipients".to_string()));
        }
        let body = json!({
            "config": { "outputs": recipients },
            "metadata": metadata,
        });
        self.call(Method::POST, "v1/transaction", &[], Some(body)).await
    }

    async fn finalize_transaction(
        &self,
        draft: &DraftTransaction,
    ) -> Result<FinalizedTransaction, WalletError> {
        let body = json!({ "draftId": draft.id });
        self.call(Method::POST, "v1/transaction/finalize", &[], Some(body))
            .await
    }

    async fn record_transaction(
        &self,
        finalized: &FinalizedTransaction,
        metadata: &TransactionMetadata,
    ) -> Result<Transaction, WalletError> {
        let body = json!({
            "hex": finalized.hex,
            "referenceId": finalized.draft_id,
            "metadata": metadata,
        });
        self.call(Method::POST, "v1/transaction/record", &[], Some(body))
            .await
    }

    async fn get_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Transaction>, WalletError> {
        let query = [
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("orderByField", "created_at".to_string()),
            ("sortDirection", "desc".to_string()),
        ];
        self.call(Method::GET, "v1/transaction", &query, None).await
    }

    async fn get_balance(&self) -> Result<Balance, WalletError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct XpubInfo {
            current_balance: u64,
        }

        let info: XpubInfo = self.call(Method::GET, "v1/xpub", &[], None).await?;
        Ok(Balance {
            satoshis: info.current_balance,
        })
    }
}

fn endpoint(base: &Url, path: &str, query: &[(&str, String)]) -> Result<Url, WalletError> {
    let mut url = base
        .join(path)
        .map_err(|e| WalletError::InvalidInput(format!("bad endpoint {path}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, WalletError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_failure(status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| WalletError::Decode(e.to_string()))
}

/// Map a non-success response to an error.
fn classify_failure(status: StatusCode, body: &str) -> WalletError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return WalletError::Unauthorized;
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "error")]
        message: String,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());

    WalletError::Rejected {
        status: status.as_u16(),
        message,
    }
}
