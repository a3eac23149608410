//! The narrow boundary between consensus and script evaluation.
//!
//! Script interpreter internals are out of scope for this workspace:
//! consensus only needs a yes/no verdict for a given `(script_sig,
//! script_pubkey)` pair. This crate is a dependency-free interface that
//! consensus code depends on instead of a concrete implementation, so the
//! two can evolve independently and consensus never needs to link a script
//! engine to build.

/// A single verification flag. Kept as an opaque bit rather than an enum so
/// an implementation can define its own flag catalogue without forcing a
/// change here.
pub type ScriptFlags = u32;

pub const SCRIPT_VERIFY_NONE: ScriptFlags = 0;
/// The minimal flag set a block must satisfy to be consensus-valid.
pub const SCRIPT_VERIFY_MANDATORY: ScriptFlags = 1 << 0;
/// Additional flags policy layers may apply on top of the mandatory set;
/// consensus itself never requires these.
pub const SCRIPT_VERIFY_STANDARD_EXTRA: ScriptFlags = 1 << 1;

/// The transaction-relative data a script verifier needs to check a
/// signature. `tx_bytes` is the full serialized spending transaction rather
/// than a typed `Transaction`, so this crate carries no dependency on
/// corebit-consensus's data model.
pub struct ScriptSigContext<'a> {
    pub tx_bytes: &'a [u8],
    pub input_index: usize,
    pub prev_value: u64,
}

/// Implemented by whatever script engine a deployment plugs in. Consensus
/// calls `verify` once per input and treats the result as authoritative —
/// it does not interpret scripts itself.
pub trait ScriptVerifier {
    fn verify(
        &self,
        script_sig: &[u8],
        script_pubkey: &[u8],
        flags: ScriptFlags,
        sig_context: &ScriptSigContext<'_>,
    ) -> Result<bool, String>;
}

/// Accepts every input unconditionally. Useful for tests and for chain
/// replay where script correctness has already been established by some
/// other means (e.g. snapshotted state) — never wired in as a default for
/// live validation.
pub struct AcceptAllVerifier;

impl ScriptVerifier for AcceptAllVerifier {
    fn verify(&self, _: &[u8], _: &[u8], _: ScriptFlags, _: &ScriptSigContext<'_>) -> Result<bool, String> {
        Ok(true)
    }
}

/// Rejects every input unconditionally. Useful as a fail-closed default
/// before a real engine is wired in.
pub struct RejectAllVerifier;

impl ScriptVerifier for RejectAllVerifier {
    fn verify(&self, _: &[u8], _: &[u8], _: ScriptFlags, _: &ScriptSigContext<'_>) -> Result<bool, String> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_all_always_true() {
        let ctx = ScriptSigContext { tx_bytes: &[], input_index: 0, prev_value: 0 };
        assert!(AcceptAllVerifier.verify(&[], &[], SCRIPT_VERIFY_NONE, &ctx).unwrap());
    }

    #[test]
    fn reject_all_always_false() {
        let ctx = ScriptSigContext { tx_bytes: &[], input_index: 0, prev_value: 0 };
        assert!(!RejectAllVerifier.verify(&[], &[], SCRIPT_VERIFY_NONE, &ctx).unwrap());
    }
}
