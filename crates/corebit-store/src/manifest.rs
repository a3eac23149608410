//! `MANIFEST.json` — the durability mechanism behind the `'B' →
//! best_block_hash` marker (§6): an atomic write-temp/fsync/rename pattern
//! so a crash mid-write never leaves a corrupt or partial manifest behind.
//!
//! Rule: update only after a block is fully applied (all KV writes committed).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub schema_version: u32,
    pub tip_hash: String,
    pub tip_height: u64,
    /// Decimal string for determinism across platforms (chain_work can
    /// exceed u128 in theory, so no fixed-width integer is assumed).
    pub tip_chain_work: String,
    pub last_applied_block_hash: String,
    pub last_applied_height: u64,
}

impl Manifest {
    pub fn genesis(genesis_hash_hex: &str, genesis_work: &BigUint) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            tip_hash: genesis_hash_hex.to_string(),
            tip_height: 0,
            tip_chain_work: genesis_work.to_string(),
            last_applied_block_hash: genesis_hash_hex.to_string(),
            last_applied_height: 0,
        }
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let data = fs::read_to_string(path).map_err(|e| format!("read manifest: {e}"))?;
        let m: Manifest = serde_json::from_str(&data).map_err(|e| format!("parse manifest: {e}"))?;
        if m.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(format!(
                "manifest schema_version {} is newer than supported {}",
                m.schema_version, CURRENT_SCHEMA_VERSION,
            ));
        }
        Ok(m)
    }

    /// Atomically save the manifest: write to temp file, fsync, rename.
    pub fn save_atomic(&self, path: &Path) -> Result<(), String> {
        let dir = path.parent().ok_or_else(|| "manifest path has no parent dir".to_string())?;

        let pid = std::process::id();
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
        let tmp_path = dir.join(format!(".MANIFEST.json.tmp.{pid}.{nanos}"));

        let json = serde_json::to_string_pretty(self).map_err(|e| format!("serialize manifest: {e}"))?;

        let mut f = fs::File::create(&tmp_path).map_err(|e| format!("create manifest tmp: {e}"))?;
        f.write_all(json.as_bytes()).map_err(|e| format!("write manifest tmp: {e}"))?;
        f.sync_all().map_err(|e| format!("fsync manifest tmp: {e}"))?;
        drop(f);

        fs::rename(&tmp_path, path).map_err(|e| format!("rename manifest: {e}"))?;

        if let Ok(dir_f) = fs::File::open(dir) {
            let _ = dir_f.sync_all();
        }

        Ok(())
    }

    pub fn update_tip(&mut self, block_hash_hex: &str, height: u64, chain_work: &BigUint) {
        self.tip_hash = block_hash_hex.to_string();
        self.tip_height = height;
        self.tip_chain_work = chain_work.to_string();
        self.last_applied_block_hash = block_hash_hex.to_string();
        self.last_applied_height = height;
    }

    pub fn path_in(chain_dir: &Path) -> PathBuf {
        chain_dir.join("MANIFEST.json")
    }

    pub fn tip_hash_bytes(&self) -> Result<[u8; 32], String> {
        hex_to_32(&self.tip_hash)
    }

    pub fn tip_chain_work(&self) -> Result<BigUint, String> {
        self.tip_chain_work
            .parse::<BigUint>()
            .map_err(|e| format!("parse tip_chain_work: {e}"))
    }
}

fn hex_to_32(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex_decode_strict(s)?;
    if bytes.len() != 32 {
        return Err(format!("expected 32-byte hex, got {} bytes", bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn hex_decode_strict(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("odd-length hex string: {s}"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("invalid hex byte at {i}: {e}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_roundtrips_through_disk() {
        let m = Manifest::genesis(&"cd".repeat(32), &BigUint::from(42u64));
        let dir = std::env::temp_dir();
        let path = dir.join(format!("corebit_test_manifest_{}.json", std::process::id()));
        m.save_atomic(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(m, loaded);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_future_schema_version() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("corebit_test_manifest_future_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"schema_version":999,"tip_hash":"00","tip_height":0,"tip_chain_work":"0","last_applied_block_hash":"00","last_applied_height":0}"#).unwrap();
        assert!(Manifest::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn hex_roundtrips() {
        let hex: String = [0xabu8; 32].iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex_to_32(&hex).unwrap(), [0xabu8; 32]);
    }
}
