//! Fixed-size codec for the records stored in the per-address levels.
//!
//! Each indexed transaction is one 16-byte big-endian record:
//!
//! ```text
//!   Field           Type      Size
//!   block id        u32       4 bytes
//!   start offset    u32       4 bytes
//!   tx length       u32       4 bytes
//!   block index     u32       4 bytes
//! ```
//!
//! The block id is the compact identifier handed out by the block-ID
//! oracle; the offset and length locate the serialized transaction within
//! its block, and the block index is the transaction's ordinal within its
//! tree.

use crate::chain::types::{BlockHash, TxLoc};
use crate::error::{IndexError, Result};

/// Serialized size of one index entry.
pub const TX_ENTRY_SIZE: usize = 16;

/// Region of a serialized block occupied by one transaction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockRegion {
    pub hash: BlockHash,
    pub offset: u32,
    pub len: u32,
}

/// A fetched index entry with its block id resolved back to a hash.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TxIndexEntry {
    pub block_region: BlockRegion,
    pub block_index: u32,
}

/// Serializes one entry into its fixed 16-byte form.
pub fn serialize_entry(block_id: u32, tx_loc: TxLoc, block_index: u32) -> [u8; TX_ENTRY_SIZE] {
    let mut serialized = [0u8; TX_ENTRY_SIZE];
    serialized[0..4].copy_from_slice(&block_id.to_be_bytes());
    serialized[4..8].copy_from_slice(&(tx_loc.tx_start as u32).to_be_bytes());
    serialized[8..12].copy_from_slice(&(tx_loc.tx_len as u32).to_be_bytes());
    serialized[12..16].copy_from_slice(&block_index.to_be_bytes());
    serialized
}

fn u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decodes one entry, resolving the leading 4-byte block id to its block
/// hash through the supplied lookup.
pub fn deserialize_entry<F>(serialized: &[u8], fetch_block_hash: F) -> Result<TxIndexEntry>
where
    F: Fn(&[u8]) -> Result<BlockHash>,
{
    if serialized.len() < TX_ENTRY_SIZE {
        return Err(IndexError::Corruption("unexpected end of data".into()));
    }

    let hash = fetch_block_hash(&serialized[0..4])?;
    Ok(TxIndexEntry {
        block_region: BlockRegion {
            hash,
            offset: u32_be(&serialized[4..8]),
            len: u32_be(&serialized[8..12]),
        },
        block_index: u32_be(&serialized[12..16]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(id: &[u8]) -> Result<BlockHash> {
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(id);
        Ok(BlockHash(hash))
    }

    #[test]
    fn entry_round_trip() {
        let serialized = serialize_entry(9, TxLoc { tx_start: 1234, tx_len: 210 }, 3);
        assert_eq!(serialized.len(), TX_ENTRY_SIZE);

        let entry = deserialize_entry(&serialized, resolve).unwrap();
        assert_eq!(entry.block_region.offset, 1234);
        assert_eq!(entry.block_region.len, 210);
        assert_eq!(entry.block_index, 3);
        assert_eq!(&entry.block_region.hash.as_bytes()[..4], &9u32.to_be_bytes());
    }

    #[test]
    fn short_input_is_corruption() {
        let err = deserialize_entry(&[0u8; TX_ENTRY_SIZE - 1], resolve).unwrap_err();
        assert!(matches!(err, IndexError::Corruption(msg) if msg.contains("unexpected end")));
    }

    #[test]
    fn fields_are_big_endian() {
        let serialized = serialize_entry(0x01020304, TxLoc { tx_start: 0x0a0b0c0d, tx_len: 1 }, 2);
        assert_eq!(&serialized[0..4], &[1, 2, 3, 4]);
        assert_eq!(&serialized[4..8], &[0x0a, 0x0b, 0x0c, 0x0d]);
    }
}
