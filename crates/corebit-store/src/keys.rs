//! Canonical byte encoding and decoding for the block-index KV and the
//! persistent UTXO/undo tables (§3, §4.3, §6).
//!
//! All integers are little-endian. Keys and values are fixed-width where
//! the data model allows it; variable-length fields are CompactSize-prefixed.

use corebit_consensus::compactsize::{compact_size_bytes_len, compact_size_encode, read_compact_size};
use corebit_consensus::wire_read::Reader;
use corebit_consensus::{Coins, Outpoint, TxOutput};
use num_bigint::BigUint;

// ---------------------------------------------------------------------------
// Block index status bitset + validity tier
// ---------------------------------------------------------------------------

pub const STATUS_HAVE_DATA: u32 = 1 << 0;
pub const STATUS_HAVE_UNDO: u32 = 1 << 1;
pub const STATUS_FAILED_VALID: u32 = 1 << 2;
pub const STATUS_FAILED_CHILD: u32 = 1 << 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ValidityTier {
    Header = 0,
    Tree = 1,
    Transactions = 2,
    Chain = 3,
    Scripts = 4,
}

impl ValidityTier {
    pub fn from_u8(v: u8) -> Result<Self, String> {
        match v {
            0 => Ok(Self::Header),
            1 => Ok(Self::Tree),
            2 => Ok(Self::Transactions),
            3 => Ok(Self::Chain),
            4 => Ok(Self::Scripts),
            _ => Err(format!("invalid validity tier byte: {v}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Block index entry
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockIndexEntry {
    pub prev_hash: Option<[u8; 32]>,
    pub height: u64,
    /// Header fields duplicated from the block itself (Bitcoin Core's
    /// `CBlockIndex` does the same): a header-only entry has no block body
    /// yet to re-parse them from, but the activator still needs `time` for
    /// median-time-past/retarget windows, `bits` for chain-work, and
    /// `version` for the §4.1.3 super-majority upgrade rule.
    pub time: u32,
    pub bits: u32,
    pub version: i32,
    pub chain_work: BigUint,
    pub tx_count: u32,
    pub chain_tx_count: u64,
    pub file_no: u32,
    pub data_offset: u32,
    pub undo_offset: u32,
    pub status: u32,
    pub validity: ValidityTier,
    pub skip_ptr: Option<[u8; 32]>,
    pub sequence_id: u64,
}

/// `has_prev[1] || prev_hash[32] || height[8] || time[4] || bits[4] ||
///  version[4] || chain_work_len[compactsize] || chain_work_be[var] ||
///  tx_count[4] || chain_tx_count[8] || file_no[4] || data_offset[4] ||
///  undo_offset[4] || status[4] || validity[1] || has_skip[1] ||
///  skip_ptr[32] || sequence_id[8]`
pub fn encode_block_index(entry: &BlockIndexEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(108);
    buf.push(entry.prev_hash.is_some() as u8);
    buf.extend_from_slice(&entry.prev_hash.unwrap_or([0u8; 32]));
    buf.extend_from_slice(&entry.height.to_le_bytes());
    buf.extend_from_slice(&entry.time.to_le_bytes());
    buf.extend_from_slice(&entry.bits.to_le_bytes());
    buf.extend_from_slice(&entry.version.to_le_bytes());
    let work_bytes = entry.chain_work.to_bytes_be();
    buf.extend_from_slice(&compact_size_encode(work_bytes.len() as u64));
    buf.extend_from_slice(&work_bytes);
    buf.extend_from_slice(&entry.tx_count.to_le_bytes());
    buf.extend_from_slice(&entry.chain_tx_count.to_le_bytes());
    buf.extend_from_slice(&entry.file_no.to_le_bytes());
    buf.extend_from_slice(&entry.data_offset.to_le_bytes());
    buf.extend_from_slice(&entry.undo_offset.to_le_bytes());
    buf.extend_from_slice(&entry.status.to_le_bytes());
    buf.push(entry.validity as u8);
    buf.push(entry.skip_ptr.is_some() as u8);
    buf.extend_from_slice(&entry.skip_ptr.unwrap_or([0u8; 32]));
    buf.extend_from_slice(&entry.sequence_id.to_le_bytes());
    buf
}

pub fn decode_block_index(data: &[u8]) -> Result<BlockIndexEntry, String> {
    let mut r = Reader::new(data);
    let has_prev = r.read_u8().map_err(|e| format!("block_index has_prev: {e}"))? != 0;
    let prev_hash_bytes = r.read_bytes(32).map_err(|e| format!("block_index prev_hash: {e}"))?;
    let prev_hash = has_prev.then(|| {
        let mut h = [0u8; 32];
        h.copy_from_slice(prev_hash_bytes);
        h
    });
    let height = u64::from_le_bytes(
        r.read_bytes(8).map_err(|e| format!("block_index height: {e}"))?.try_into().unwrap(),
    );
    let time = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index time: {e}"))?.try_into().unwrap(),
    );
    let bits = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index bits: {e}"))?.try_into().unwrap(),
    );
    let version = i32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index version: {e}"))?.try_into().unwrap(),
    );
    let (work_len, _) = read_compact_size(&mut r).map_err(|e| format!("block_index work_len: {e}"))?;
    let work_bytes = r
        .read_bytes(work_len as usize)
        .map_err(|e| format!("block_index chain_work: {e}"))?;
    let chain_work = BigUint::from_bytes_be(work_bytes);
    let tx_count = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index tx_count: {e}"))?.try_into().unwrap(),
    );
    let chain_tx_count = u64::from_le_bytes(
        r.read_bytes(8).map_err(|e| format!("block_index chain_tx_count: {e}"))?.try_into().unwrap(),
    );
    let file_no = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index file_no: {e}"))?.try_into().unwrap(),
    );
    let data_offset = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index data_offset: {e}"))?.try_into().unwrap(),
    );
    let undo_offset = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index undo_offset: {e}"))?.try_into().unwrap(),
    );
    let status = u32::from_le_bytes(
        r.read_bytes(4).map_err(|e| format!("block_index status: {e}"))?.try_into().unwrap(),
    );
    let validity = ValidityTier::from_u8(r.read_u8().map_err(|e| format!("block_index validity: {e}"))?)?;
    let has_skip = r.read_u8().map_err(|e| format!("block_index has_skip: {e}"))? != 0;
    let skip_ptr_bytes = r.read_bytes(32).map_err(|e| format!("block_index skip_ptr: {e}"))?;
    let skip_ptr = has_skip.then(|| {
        let mut h = [0u8; 32];
        h.copy_from_slice(skip_ptr_bytes);
        h
    });
    let sequence_id = u64::from_le_bytes(
        r.read_bytes(8).map_err(|e| format!("block_index sequence_id: {e}"))?.try_into().unwrap(),
    );
    Ok(BlockIndexEntry {
        prev_hash,
        height,
        time,
        bits,
        version,
        chain_work,
        tx_count,
        chain_tx_count,
        file_no,
        data_offset,
        undo_offset,
        status,
        validity,
        skip_ptr,
        sequence_id,
    })
}

// ---------------------------------------------------------------------------
// Block/undo file info ('f' || file_no → file_info, §4.5)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FileInfo {
    pub size: u32,
    pub undo_size: u32,
    pub height_first: u64,
    pub height_last: u64,
    pub time_first: u32,
    pub time_last: u32,
    pub block_count: u32,
}

pub fn encode_file_info(info: &FileInfo) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[0..4].copy_from_slice(&info.size.to_le_bytes());
    buf[4..8].copy_from_slice(&info.undo_size.to_le_bytes());
    buf[8..16].copy_from_slice(&info.height_first.to_le_bytes());
    buf[16..24].copy_from_slice(&info.height_last.to_le_bytes());
    buf[24..28].copy_from_slice(&info.time_first.to_le_bytes());
    buf[28..32].copy_from_slice(&info.time_last.to_le_bytes());
    buf
}

pub fn decode_file_info(data: &[u8]) -> Result<FileInfo, String> {
    if data.len() != 32 {
        return Err(format!("file_info: expected 32 bytes, got {}", data.len()));
    }
    Ok(FileInfo {
        size: u32::from_le_bytes(data[0..4].try_into().unwrap()),
        undo_size: u32::from_le_bytes(data[4..8].try_into().unwrap()),
        height_first: u64::from_le_bytes(data[8..16].try_into().unwrap()),
        height_last: u64::from_le_bytes(data[16..24].try_into().unwrap()),
        time_first: u32::from_le_bytes(data[24..28].try_into().unwrap()),
        time_last: u32::from_le_bytes(data[28..32].try_into().unwrap()),
        block_count: 0,
    })
}

// ---------------------------------------------------------------------------
// Outpoint key: txid[32] || index_le[4] = 36 bytes
// ---------------------------------------------------------------------------

pub fn encode_outpoint_key(outpoint: &Outpoint) -> [u8; 36] {
    let mut buf = [0u8; 36];
    buf[0..32].copy_from_slice(&outpoint.tx_hash);
    buf[32..36].copy_from_slice(&outpoint.index.to_le_bytes());
    buf
}

pub fn decode_outpoint_key(data: &[u8]) -> Result<Outpoint, String> {
    if data.len() != 36 {
        return Err(format!("outpoint key: expected 36 bytes, got {}", data.len()));
    }
    let mut tx_hash = [0u8; 32];
    tx_hash.copy_from_slice(&data[0..32]);
    let index = u32::from_le_bytes(data[32..36].try_into().unwrap());
    Ok(Outpoint { tx_hash, index })
}

// ---------------------------------------------------------------------------
// Coins entry value (per-tx UTXO record, §3, §4.2): height[8] || coinbase[1]
//   || outputs_count[compactsize] || [present[1] || value[8] ||
//   script_len[compactsize] || script[var]]*
// Trailing spent (tombstone) outputs are trimmed before encoding.
// ---------------------------------------------------------------------------

pub fn encode_coins(coins: &Coins) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&coins.height.to_le_bytes());
    buf.push(coins.is_coinbase as u8);

    let mut last_live = None;
    for (i, slot) in coins.outputs.iter().enumerate() {
        if slot.is_some() {
            last_live = Some(i);
        }
    }
    let trimmed_len = last_live.map(|i| i + 1).unwrap_or(0);

    buf.extend_from_slice(&compact_size_encode(trimmed_len as u64));
    for slot in &coins.outputs[..trimmed_len] {
        match slot {
            Some(out) => {
                buf.push(1);
                buf.extend_from_slice(&out.value.to_le_bytes());
                buf.extend_from_slice(&compact_size_encode(out.script_pubkey.len() as u64));
                buf.extend_from_slice(&out.script_pubkey);
            }
            None => buf.push(0),
        }
    }
    buf
}

pub fn decode_coins(data: &[u8]) -> Result<Coins, String> {
    let mut r = Reader::new(data);
    let height = u64::from_le_bytes(
        r.read_bytes(8).map_err(|e| format!("coins height: {e}"))?.try_into().unwrap(),
    );
    let is_coinbase = r.read_u8().map_err(|e| format!("coins is_coinbase: {e}"))? != 0;
    let (count, _) = read_compact_size(&mut r).map_err(|e| format!("coins output count: {e}"))?;
    let mut outputs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let present = r.read_u8().map_err(|e| format!("coins slot tag: {e}"))? != 0;
        if !present {
            outputs.push(None);
            continue;
        }
        let value = u64::from_le_bytes(
            r.read_bytes(8).map_err(|e| format!("coins value: {e}"))?.try_into().unwrap(),
        );
        let (script_len, _) = read_compact_size(&mut r).map_err(|e| format!("coins script_len: {e}"))?;
        let script_pubkey = r
            .read_bytes(script_len as usize)
            .map_err(|e| format!("coins script: {e}"))?
            .to_vec();
        outputs.push(Some(TxOutput { value, script_pubkey }));
    }
    Ok(Coins {
        height,
        is_coinbase,
        outputs,
    })
}

// ---------------------------------------------------------------------------
// Undo record: restores exactly the Coins slots a block's connection spent,
// and names the tx records it created so disconnect can drop them.
//
// n_spent[compactsize] || [outpoint(36) || height[8] || coinbase[1] ||
//   script_len[compactsize] || script[var] || value[8]]* ||
// n_created[compactsize] || [txid(32)]*
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoEntry {
    pub outpoint: Outpoint,
    pub restored_output: TxOutput,
    pub restored_height: u64,
    pub restored_is_coinbase: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct UndoRecord {
    pub spent: Vec<UndoEntry>,
    pub created_txids: Vec<[u8; 32]>,
}

pub fn encode_undo_record(record: &UndoRecord) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&compact_size_encode(record.spent.len() as u64));
    for item in &record.spent {
        buf.extend_from_slice(&encode_outpoint_key(&item.outpoint));
        buf.extend_from_slice(&item.restored_height.to_le_bytes());
        buf.push(item.restored_is_coinbase as u8);
        buf.extend_from_slice(&item.restored_output.value.to_le_bytes());
        buf.extend_from_slice(&compact_size_encode(item.restored_output.script_pubkey.len() as u64));
        buf.extend_from_slice(&item.restored_output.script_pubkey);
    }
    buf.extend_from_slice(&compact_size_encode(record.created_txids.len() as u64));
    for txid in &record.created_txids {
        buf.extend_from_slice(txid);
    }
    buf
}

pub fn decode_undo_record(data: &[u8]) -> Result<UndoRecord, String> {
    let mut r = Reader::new(data);
    let (n_spent, _) = read_compact_size(&mut r).map_err(|e| format!("undo n_spent: {e}"))?;
    let mut spent = Vec::with_capacity(n_spent as usize);
    for _ in 0..n_spent {
        let outpoint = decode_outpoint_key(
            r.read_bytes(36).map_err(|e| format!("undo outpoint: {e}"))?,
        )?;
        let restored_height = u64::from_le_bytes(
            r.read_bytes(8).map_err(|e| format!("undo height: {e}"))?.try_into().unwrap(),
        );
        let restored_is_coinbase = r.read_u8().map_err(|e| format!("undo coinbase flag: {e}"))? != 0;
        let value = u64::from_le_bytes(
            r.read_bytes(8).map_err(|e| format!("undo value: {e}"))?.try_into().unwrap(),
        );
        let (script_len, _) = read_compact_size(&mut r).map_err(|e| format!("undo script_len: {e}"))?;
        let script_pubkey = r
            .read_bytes(script_len as usize)
            .map_err(|e| format!("undo script: {e}"))?
            .to_vec();
        spent.push(UndoEntry {
            outpoint,
            restored_output: TxOutput { value, script_pubkey },
            restored_height,
            restored_is_coinbase,
        });
    }
    let (n_created, _) = read_compact_size(&mut r).map_err(|e| format!("undo n_created: {e}"))?;
    let mut created_txids = Vec::with_capacity(n_created as usize);
    for _ in 0..n_created {
        let bytes = r.read_bytes(32).map_err(|e| format!("undo txid: {e}"))?;
        let mut txid = [0u8; 32];
        txid.copy_from_slice(bytes);
        created_txids.push(txid);
    }
    Ok(UndoRecord { spent, created_txids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebit_consensus::NULL_OUTPOINT_INDEX;

    #[test]
    fn block_index_roundtrips() {
        let entry = BlockIndexEntry {
            prev_hash: Some([0xab; 32]),
            height: 42,
            time: 1_600_000_000,
            bits: 0x1d00ffff,
            version: 4,
            chain_work: BigUint::from(123456789u64),
            tx_count: 3,
            chain_tx_count: 10,
            file_no: 1,
            data_offset: 80,
            undo_offset: 0,
            status: STATUS_HAVE_DATA | STATUS_HAVE_UNDO,
            validity: ValidityTier::Scripts,
            skip_ptr: Some([0xcd; 32]),
            sequence_id: 7,
        };
        let encoded = encode_block_index(&entry);
        let decoded = decode_block_index(&encoded).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn genesis_block_index_has_no_prev() {
        let entry = BlockIndexEntry {
            prev_hash: None,
            height: 0,
            time: 1_231_006_505,
            bits: 0x1d00ffff,
            version: 1,
            chain_work: BigUint::from(1u64),
            tx_count: 1,
            chain_tx_count: 1,
            file_no: 0,
            data_offset: 0,
            undo_offset: 0,
            status: STATUS_HAVE_DATA,
            validity: ValidityTier::Chain,
            skip_ptr: None,
            sequence_id: 0,
        };
        let decoded = decode_block_index(&encode_block_index(&entry)).unwrap();
        assert!(decoded.prev_hash.is_none());
        assert!(decoded.skip_ptr.is_none());
    }

    #[test]
    fn outpoint_key_roundtrips() {
        let op = Outpoint { tx_hash: [0xcd; 32], index: 7 };
        let decoded = decode_outpoint_key(&encode_outpoint_key(&op)).unwrap();
        assert_eq!(op, decoded);
    }

    #[test]
    fn coins_trims_trailing_tombstones() {
        let coins = Coins {
            height: 10,
            is_coinbase: true,
            outputs: vec![
                Some(TxOutput { value: 5, script_pubkey: vec![1] }),
                None,
                None,
            ],
        };
        let encoded = encode_coins(&coins);
        let decoded = decode_coins(&encoded).unwrap();
        assert_eq!(decoded.outputs.len(), 1, "trailing tombstones must not be persisted");
        assert_eq!(decoded.outputs[0].as_ref().unwrap().value, 5);
    }

    #[test]
    fn coins_keeps_interior_tombstone() {
        let coins = Coins {
            height: 10,
            is_coinbase: false,
            outputs: vec![
                None,
                Some(TxOutput { value: 5, script_pubkey: vec![1] }),
            ],
        };
        let decoded = decode_coins(&encode_coins(&coins)).unwrap();
        assert_eq!(decoded.outputs.len(), 2);
        assert!(decoded.outputs[0].is_none());
        assert_eq!(decoded.get(1).unwrap().value, 5);
    }

    #[test]
    fn undo_record_roundtrips() {
        let record = UndoRecord {
            spent: vec![UndoEntry {
                outpoint: Outpoint { tx_hash: [0x11; 32], index: 0 },
                restored_output: TxOutput { value: 1000, script_pubkey: vec![0xaa; 10] },
                restored_height: 5,
                restored_is_coinbase: false,
            }],
            created_txids: vec![[0x22; 32]],
        };
        let decoded = decode_undo_record(&encode_undo_record(&record)).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn coinbase_outpoint_index_is_sentinel() {
        let op = Outpoint { tx_hash: [0; 32], index: NULL_OUTPOINT_INDEX };
        assert_eq!(op.index, u32::MAX);
    }

    #[test]
    fn compact_size_len_matches_encoded_prefix() {
        assert_eq!(compact_size_bytes_len(300), compact_size_encode(300).len());
    }
}
