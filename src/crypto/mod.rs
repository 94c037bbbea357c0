// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Material Protection
//!
//! Wallet private keys are stored encrypted under a key derived from the
//! user's password. The pipeline is:
//!
//! ```text
//! password ──PasswordHasher──▶ passphrase ──PBKDF2──▶ AES-256 key
//!                                                        │
//! xpriv ─────────────────────────────── AES-256-GCM ─────┴──▶ EncryptedSecret
//! ```
//!
//! ## Stored format
//!
//! `hex(salt) - hex(iv) - hex(ciphertext || tag)`; see [`EncryptedSecret`].
//!
//! ## Known limitations
//!
//! - [`PasswordHasher`] uses one process-wide salt, not a per-user salt. It
//!   only stretches a password into key material and is not a credential
//!   store.
//! - A wrong passphrase surfaces as [`CryptoError::DecryptionFailed`]. Older
//!   deployments returned whatever bytes the cipher produced instead.

pub mod cipher;
pub mod hash;

pub use cipher::{EncryptedSecret, SecretCipher, PBKDF2_ITERATIONS};
pub use hash::PasswordHasher;

/// Errors raised while protecting or unlocking key material.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed encrypted secret: {0}")]
    Malformed(String),

    #[error("system random source unavailable")]
    Entropy,

    #[error("encryption failed")]
    Encryption,

    /// Authentication tag mismatch: wrong passphrase or tampered ciphertext.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("decrypted secret is not valid UTF-8")]
    NotUtf8,

    #[error("key derivation task failed: {0}")]
    Task(String),
}
