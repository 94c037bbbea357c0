// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed session cookie codec.
//!
//! Cookie value: `<session id>.<base64url(HMAC-SHA256(secret, session id))>`.

use axum::http::{header::COOKIE, HeaderMap};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::SessionId;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "wallet_session";

type HmacSha256 = Hmac<Sha256>;

pub struct CookieSigner {
    key: Zeroizing<Vec<u8>>,
}

impl CookieSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: Zeroizing::new(secret.to_vec()),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"))
    }

    pub fn sign(&self, id: &SessionId) -> String {
        let mut mac = self.mac();
        mac.update(id.as_str().as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{}.{}", id.as_str(), Base64UrlUnpadded::encode_string(&tag))
    }

    /// Returns the session id if the signature checks out (constant time).
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, tag) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let tag = Base64UrlUnpadded::decode_vec(tag).ok()?;

        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&tag).ok()?;

        Some(SessionId::from_raw(id))
    }
}

/// Find a cookie by name across all `Cookie` headers.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}
