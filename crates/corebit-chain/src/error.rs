//! Errors the activator can return. Consensus rejections carry the
//! structured [`TxError`] (code, `RejectKind`, DoS score) straight through;
//! everything else — I/O, store corruption, a broken invariant — is an
//! opaque internal error that should stop the activator rather than be
//! treated as "this particular block was invalid" (§7).

use corebit_consensus::TxError;
use std::fmt;

#[derive(Debug)]
pub enum ChainError {
    /// A block or header failed a consensus rule. Permanent: the candidate
    /// is marked failed and will never be retried as-is.
    Consensus(TxError),
    /// Anything outside consensus's remit: store I/O, a corrupt on-disk
    /// record, a missing ancestor that should exist. The caller should
    /// treat this as cause to stop processing and surface it loudly rather
    /// than penalize whoever handed over the block.
    Internal(String),
}

impl ChainError {
    pub fn internal(msg: impl Into<String>) -> Self {
        ChainError::Internal(msg.into())
    }

    /// Whether this indicates a bug or environment fault rather than an
    /// invalid block, per §7 ("INTERNAL triggers a fail-stop").
    pub fn is_internal(&self) -> bool {
        matches!(self, ChainError::Internal(_))
    }

    pub fn dos_score(&self) -> u32 {
        match self {
            ChainError::Consensus(e) => e.dos_score(),
            ChainError::Internal(_) => 0,
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Consensus(e) => write!(f, "{e}"),
            ChainError::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<TxError> for ChainError {
    fn from(e: TxError) -> Self {
        ChainError::Consensus(e)
    }
}

impl From<String> for ChainError {
    fn from(msg: String) -> Self {
        ChainError::Internal(msg)
    }
}
