use core::fmt;

/// Coarse classification of a rejection. Consensus violations are
/// permanent and carry DoS score 100; everything else is either a policy
/// matter for some other layer (mempool) or transient/non-error state that
/// the caller must still be able to distinguish from a real rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectKind {
    Invalid,
    Obsolete,
    Duplicate,
    Nonstandard,
    InsufficientFee,
    Checkpoint,
    CorruptionPossible,
    Internal,
}

impl RejectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectKind::Invalid => "INVALID",
            RejectKind::Obsolete => "OBSOLETE",
            RejectKind::Duplicate => "DUPLICATE",
            RejectKind::Nonstandard => "NONSTANDARD",
            RejectKind::InsufficientFee => "INSUFFICIENT_FEE",
            RejectKind::Checkpoint => "CHECKPOINT",
            RejectKind::CorruptionPossible => "CORRUPTION_POSSIBLE",
            RejectKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    TxErrEmpty,
    TxErrOversize,
    TxErrValueOutOfRange,
    TxErrValueOverflow,
    TxErrDuplicateInput,
    TxErrCoinbaseScriptSize,
    TxErrNullPrevoutNonCoinbase,
    TxErrMissingUtxo,
    TxErrPrematureSpendOfCoinbase,
    TxErrValueConservation,
    TxErrScriptVerifyFailed,
    TxErrNonFinal,
    TxErrBadBip68,
    TxErrParse,

    BlockErrParse,
    BlockErrPowInvalid,
    BlockErrTargetInvalid,
    BlockErrTimestampFuture,
    BlockErrMerkleInvalid,
    BlockErrMerkleMutated,
    BlockErrFirstTxNotCoinbase,
    BlockErrMultipleCoinbase,
    BlockErrSigopsExceeded,
    BlockErrBadDifficultyBits,
    BlockErrTimeTooOld,
    BlockErrBadVersion,
    BlockErrHeightMismatch,
    BlockErrSizeExceeded,
    BlockErrBadCbAmount,
    BlockErrBip30,
    /// §9 Open Question #2: a block at a configured hard-fork height whose
    /// hash doesn't match the required one.
    BlockErrForkMismatch,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::TxErrEmpty => "bad-txns-empty",
            ErrorCode::TxErrOversize => "bad-txns-oversize",
            ErrorCode::TxErrValueOutOfRange => "bad-txns-vout-negative",
            ErrorCode::TxErrValueOverflow => "bad-txns-vout-toolarge",
            ErrorCode::TxErrDuplicateInput => "bad-txns-inputs-duplicate",
            ErrorCode::TxErrCoinbaseScriptSize => "bad-cb-length",
            ErrorCode::TxErrNullPrevoutNonCoinbase => "bad-txns-prevout-null",
            ErrorCode::TxErrMissingUtxo => "bad-txns-inputs-missingorspent",
            ErrorCode::TxErrPrematureSpendOfCoinbase => "bad-txns-premature-spend-of-coinbase",
            ErrorCode::TxErrValueConservation => "bad-txns-in-belowout",
            ErrorCode::TxErrScriptVerifyFailed => "mandatory-script-verify-flag-failed",
            ErrorCode::TxErrNonFinal => "bad-txns-nonfinal",
            ErrorCode::TxErrBadBip68 => "bad-txns-nonfinal-relative",
            ErrorCode::TxErrParse => "tx-parse-error",

            ErrorCode::BlockErrParse => "block-parse-error",
            ErrorCode::BlockErrPowInvalid => "high-hash",
            ErrorCode::BlockErrTargetInvalid => "bad-diffbits",
            ErrorCode::BlockErrTimestampFuture => "time-too-new",
            ErrorCode::BlockErrMerkleInvalid => "bad-txnmrklroot",
            ErrorCode::BlockErrMerkleMutated => "bad-txns-duplicate",
            ErrorCode::BlockErrFirstTxNotCoinbase => "bad-cb-missing",
            ErrorCode::BlockErrMultipleCoinbase => "bad-cb-multiple",
            ErrorCode::BlockErrSigopsExceeded => "bad-blk-sigops",
            ErrorCode::BlockErrBadDifficultyBits => "bad-diffbits",
            ErrorCode::BlockErrTimeTooOld => "time-too-old",
            ErrorCode::BlockErrBadVersion => "bad-version",
            ErrorCode::BlockErrHeightMismatch => "bad-cb-height",
            ErrorCode::BlockErrSizeExceeded => "bad-blk-length",
            ErrorCode::BlockErrBadCbAmount => "bad-cb-amount",
            ErrorCode::BlockErrBip30 => "bad-txns-BIP30",
            ErrorCode::BlockErrForkMismatch => "bad-fork-block",
        }
    }

    /// The [`RejectKind`] each error code is reported under. Most codes are
    /// permanent consensus violations; a few are narrower.
    pub fn kind(self) -> RejectKind {
        match self {
            ErrorCode::BlockErrMerkleMutated => RejectKind::CorruptionPossible,
            _ => RejectKind::Invalid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxError {
    pub code: ErrorCode,
    pub msg: &'static str,
}

impl TxError {
    pub fn new(code: ErrorCode, msg: &'static str) -> Self {
        Self { code, msg }
    }

    pub fn kind(&self) -> RejectKind {
        self.code.kind()
    }

    pub fn dos_score(&self) -> u32 {
        match self.kind() {
            RejectKind::Invalid => 100,
            _ => 0,
        }
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.msg.is_empty() {
            write!(f, "{}", self.code.as_str())
        } else {
            write!(f, "{}: {}", self.code.as_str(), self.msg)
        }
    }
}

impl std::error::Error for TxError {}
