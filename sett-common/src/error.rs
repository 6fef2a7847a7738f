//! # Sett Error Types
//!
//! ## Design Principles
//!
//! 1. **Numbered Variants**: Codes 1-9 are caller mistakes, 10-19 are faults
//!    inside the table layer, 20+ come from the backing store.
//! 2. **Absence Is Absence**: A missing key and an expired key both surface as
//!    `NotFound`; callers never learn that a stale entry is still on disk.
//! 3. **Decode Failures Are The Caller's**: A value that does not fit the
//!    requested type is `Deserialize`, not a server fault, since the reader
//!    chose the type.
//! 4. **Only The Store Retries**: Transaction and I/O failures may succeed on
//!    a second attempt; nothing else will.

use thiserror::Error;

/// Result type used across Sett components.
pub type SettResult<T> = core::result::Result<T, SettError>;

/// High-level category for grouping error codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SettErrorCategory {
    /// Invalid input, missing keys, or values of the wrong shape.
    Client,
    /// Invariant failures inside the core (codec, generator, encoding).
    Server,
    /// Failures surfaced by the underlying transactional store.
    Storage,
}

impl SettErrorCategory {
    /// Returns true if the category is safe to retry.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Storage)
    }
}

/// Errors returned by table handles and the store adapters.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SettError {
    /// Client error: input failed validation (code 1).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Client error: key absent or expired (code 2).
    #[error("not found")]
    NotFound,
    /// Client error: stored bytes do not decode into the requested type (code 3).
    #[error("deserialize error: {0}")]
    Deserialize(String),

    /// Server error: key generator ran out of collision retries (code 10).
    #[error("keyspace exhausted after {attempts} attempts")]
    KeyspaceExhausted { attempts: usize },
    /// Server error: a physical key or envelope is malformed (code 11).
    #[error("codec error: {0}")]
    Codec(String),
    /// Server error: a value could not be serialized (code 12).
    #[error("serialize error: {0}")]
    Serialize(String),
    /// Server error: a background or blocking task failed (code 13).
    #[error("internal error: {0}")]
    Internal(String),

    /// Storage error: transaction, commit, or I/O failure (code 20).
    #[error("store error: {0}")]
    Store(String),
}

impl SettError {
    /// Wraps any store-level failure.
    pub fn store(err: impl core::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Returns the stable numeric code for the error.
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 1,
            Self::NotFound => 2,
            Self::Deserialize(_) => 3,
            Self::KeyspaceExhausted { .. } => 10,
            Self::Codec(_) => 11,
            Self::Serialize(_) => 12,
            Self::Internal(_) => 13,
            Self::Store(_) => 20,
        }
    }

    /// Returns the coarse category of the error.
    pub const fn category(&self) -> SettErrorCategory {
        match self {
            Self::InvalidInput(_) | Self::NotFound | Self::Deserialize(_) => {
                SettErrorCategory::Client
            }
            Self::KeyspaceExhausted { .. }
            | Self::Codec(_)
            | Self::Serialize(_)
            | Self::Internal(_) => SettErrorCategory::Server,
            Self::Store(_) => SettErrorCategory::Storage,
        }
    }

    /// Returns true if callers should retry the operation.
    pub const fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Returns true for the absent-or-expired case.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
