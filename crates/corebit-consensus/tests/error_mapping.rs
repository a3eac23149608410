use corebit_consensus::{ErrorCode, TxError};

#[test]
fn error_code_as_str_covers_all_variants() {
    // Intentionally list every variant: keeps as_str() coverage high and
    // guards against accidental renames/typos.
    let cases: &[(ErrorCode, &str)] = &[
        (ErrorCode::TxErrEmpty, "bad-txns-empty"),
        (ErrorCode::TxErrOversize, "bad-txns-oversize"),
        (ErrorCode::TxErrValueOutOfRange, "bad-txns-vout-negative"),
        (ErrorCode::TxErrValueOverflow, "bad-txns-vout-toolarge"),
        (ErrorCode::TxErrDuplicateInput, "bad-txns-inputs-duplicate"),
        (ErrorCode::TxErrCoinbaseScriptSize, "bad-cb-length"),
        (ErrorCode::TxErrNullPrevoutNonCoinbase, "bad-txns-prevout-null"),
        (ErrorCode::TxErrMissingUtxo, "bad-txns-inputs-missingorspent"),
        (
            ErrorCode::TxErrPrematureSpendOfCoinbase,
            "bad-txns-premature-spend-of-coinbase",
        ),
        (ErrorCode::TxErrValueConservation, "bad-txns-in-belowout"),
        (
            ErrorCode::TxErrScriptVerifyFailed,
            "mandatory-script-verify-flag-failed",
        ),
        (ErrorCode::TxErrNonFinal, "bad-txns-nonfinal"),
        (ErrorCode::TxErrBadBip68, "bad-txns-nonfinal-relative"),
        (ErrorCode::TxErrParse, "tx-parse-error"),
        (ErrorCode::BlockErrParse, "block-parse-error"),
        (ErrorCode::BlockErrPowInvalid, "high-hash"),
        (ErrorCode::BlockErrTargetInvalid, "bad-diffbits"),
        (ErrorCode::BlockErrTimestampFuture, "time-too-new"),
        (ErrorCode::BlockErrMerkleInvalid, "bad-txnmrklroot"),
        (ErrorCode::BlockErrMerkleMutated, "bad-txns-duplicate"),
        (ErrorCode::BlockErrFirstTxNotCoinbase, "bad-cb-missing"),
        (ErrorCode::BlockErrMultipleCoinbase, "bad-cb-multiple"),
        (ErrorCode::BlockErrSigopsExceeded, "bad-blk-sigops"),
        (ErrorCode::BlockErrBadDifficultyBits, "bad-diffbits"),
        (ErrorCode::BlockErrTimeTooOld, "time-too-old"),
        (ErrorCode::BlockErrBadVersion, "bad-version"),
        (ErrorCode::BlockErrHeightMismatch, "bad-cb-height"),
        (ErrorCode::BlockErrSizeExceeded, "bad-blk-length"),
        (ErrorCode::BlockErrBadCbAmount, "bad-cb-amount"),
        (ErrorCode::BlockErrBip30, "bad-txns-BIP30"),
        (ErrorCode::BlockErrForkMismatch, "bad-fork-block"),
    ];

    for (code, want) in cases {
        assert_eq!(code.as_str(), *want);
    }
}

#[test]
fn tx_error_display() {
    let e = TxError::new(ErrorCode::TxErrParse, "");
    assert_eq!(e.to_string(), "tx-parse-error");
    let e2 = TxError::new(ErrorCode::TxErrParse, "bad");
    assert_eq!(e2.to_string(), "tx-parse-error: bad");
}

#[test]
fn dos_score_reflects_reject_kind() {
    let invalid = TxError::new(ErrorCode::TxErrEmpty, "");
    assert_eq!(invalid.dos_score(), 100);

    let mutation = TxError::new(ErrorCode::BlockErrMerkleMutated, "");
    assert_eq!(mutation.dos_score(), 0);
}
