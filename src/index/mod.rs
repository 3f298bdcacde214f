//! The address index: every address mapped to the ordered transactions
//! that reference it, either crediting or debiting the address.  Entries
//! are ordered by appearance in the chain, first by block and then by
//! position inside the block.  A memory-only mirror covers transactions
//! still in the memory pool.

pub mod block_scan;
pub mod entry;
pub mod key;
pub mod levels;
pub mod unconfirmed;

use crate::chain::address::Address;
use crate::chain::types::{Block, BlockHash, Transaction, TxHash, HASH_SIZE};
use crate::core::subscriber::ShutdownFlag;
use crate::debug::DebugTimer;
use crate::error::{IndexError, Result};
use crate::index::block_scan::{index_block, PrevScripter, WriteIndexData};
use crate::index::entry::{serialize_entry, TxIndexEntry};
use crate::index::key::addr_to_key;
use crate::index::levels::{fetch_index_entries, put_index_entry, remove_index_entries, IndexBucket};
use crate::index::unconfirmed::UnconfirmedIndex;
use crate::runtime::mdb::Mdb;
use borsh::{BorshDeserialize, BorshSerialize};
use std::sync::Arc;
use tracing::{error, info};

/// Human-readable name for the index.
pub const ADDR_INDEX_NAME: &str = "address index";

/// Current version of the address index.
pub const ADDR_INDEX_VERSION: u32 = 2;

/// Namespace prefix that houses the index inside the shared database.
pub const ADDR_INDEX_NAMESPACE: &[u8] = b"txbyaddridx/";

// Reserved metadata keys inside the namespace.  Both are shorter than the
// 22-byte level keys, so they can never collide with address data.
const TIP_KEY: &[u8] = b"tip";
const VERSION_KEY: &[u8] = b"ver";

/// Source of the compact block ids stored in index entries.
pub trait BlockIdOracle {
    /// Resolves a block hash to its assigned id.
    fn id_by_hash(&self, hash: &BlockHash) -> Result<u32>;

    /// Resolves a serialized 4-byte id back to the block hash.
    fn hash_by_id(&self, serialized_id: &[u8]) -> Result<BlockHash>;
}

impl<O: BlockIdOracle + ?Sized> BlockIdOracle for Arc<O> {
    fn id_by_hash(&self, hash: &BlockHash) -> Result<u32> {
        (**self).id_by_hash(hash)
    }

    fn hash_by_id(&self, serialized_id: &[u8]) -> Result<BlockHash> {
        (**self).hash_by_id(serialized_id)
    }
}

impl<O: BlockIdOracle + ?Sized> BlockIdOracle for &O {
    fn id_by_hash(&self, hash: &BlockHash) -> Result<u32> {
        (**self).id_by_hash(hash)
    }

    fn hash_by_id(&self, serialized_id: &[u8]) -> Result<BlockHash> {
        (**self).hash_by_id(serialized_id)
    }
}

/// Ordered notification delivered to the index for each block event.
pub enum IndexNtfn {
    Connect {
        block: Arc<Block>,
        prev_scripts: Arc<dyn PrevScripter + Send + Sync>,
        treasury_enabled: bool,
    },
    Disconnect {
        block: Arc<Block>,
        prev_scripts: Arc<dyn PrevScripter + Send + Sync>,
        treasury_enabled: bool,
    },
}

#[derive(BorshSerialize, BorshDeserialize)]
struct IndexTip {
    hash: [u8; HASH_SIZE],
    height: u32,
}

/// The transaction-by-address index over an injected bucket and block-ID
/// oracle.  All mutating operations assume the single-writer discipline:
/// one `connect_block`/`disconnect_block` at a time, inside whatever
/// transactional scope the bucket provides.
pub struct AddrIndex<B, O> {
    bucket: B,
    oracle: O,
    unconfirmed: UnconfirmedIndex,
}

impl<B: IndexBucket, O: BlockIdOracle> AddrIndex<B, O> {
    pub fn new(bucket: B, oracle: O) -> Self {
        Self { bucket, oracle, unconfirmed: UnconfirmedIndex::new() }
    }

    pub fn name(&self) -> &'static str {
        ADDR_INDEX_NAME
    }

    pub fn version(&self) -> u32 {
        ADDR_INDEX_VERSION
    }

    /// The index requires the referenced inputs of every transaction in
    /// order to index the spending side.
    pub fn needs_inputs(&self) -> bool {
        true
    }

    /// Prepares the index for use: verifies the recorded version and
    /// writes the initial metadata on first use.
    pub fn init(&self, shutdown: &ShutdownFlag) -> Result<()> {
        if shutdown.is_interrupted() {
            return Err(IndexError::InterruptRequested);
        }

        match self.bucket.get(VERSION_KEY)? {
            None => {
                self.bucket.put(VERSION_KEY, &ADDR_INDEX_VERSION.to_le_bytes())?;
                info!(version = ADDR_INDEX_VERSION, "created {}", ADDR_INDEX_NAME);
                Ok(())
            }
            Some(raw) if raw.len() == 4 => {
                let version = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                if version != ADDR_INDEX_VERSION {
                    return Err(IndexError::Corruption(format!(
                        "{} version {} does not match required version {}; drop and rebuild",
                        ADDR_INDEX_NAME, version, ADDR_INDEX_VERSION
                    )));
                }
                Ok(())
            }
            Some(_) => {
                Err(IndexError::Corruption(format!("invalid {} version record", ADDR_INDEX_NAME)))
            }
        }
    }

    /// Current tip of the index, or `None` before the first connect.
    pub fn tip(&self) -> Result<Option<(BlockHash, u32)>> {
        match self.bucket.get(TIP_KEY)? {
            None => Ok(None),
            Some(raw) => {
                let tip = IndexTip::try_from_slice(&raw).map_err(|e| {
                    IndexError::Corruption(format!("invalid {} tip record: {e}", ADDR_INDEX_NAME))
                })?;
                Ok(Some((BlockHash(tip.hash), tip.height)))
            }
        }
    }

    fn put_tip(&self, hash: &BlockHash, height: u32) -> Result<()> {
        let tip = IndexTip { hash: *hash.as_bytes(), height };
        let raw = borsh::to_vec(&tip)
            .map_err(|e| IndexError::Assert(format!("tip record failed to encode: {e}")))?;
        self.bucket.put(TIP_KEY, &raw)
    }

    /// Adds a mapping for every address referenced by the block's
    /// transactions and advances the tip.
    pub fn connect_block(
        &self,
        block: &Block,
        prev_scripts: &dyn PrevScripter,
        treasury_enabled: bool,
    ) -> Result<()> {
        let _timer = DebugTimer::new("addrindex", "connect_block");

        // The byte offset and length of each transaction within the
        // serialized block.
        let (tx_locs, stake_tx_locs) = block.tx_loc();

        let block_hash = block.hash();
        let block_id = self.oracle.id_by_hash(&block_hash)?;

        // Build all of the address to transaction mappings in a local map
        // before touching the bucket.
        let mut addrs_to_txns = WriteIndexData::new();
        index_block(&mut addrs_to_txns, block, prev_scripts, treasury_enabled);

        let stake_idxs_start = tx_locs.len();
        for (addr_key, tx_idxs) in &addrs_to_txns {
            for &tx_idx in tx_idxs {
                // Pick the location table and ordinal for the tree the
                // transaction lives in.
                let (locs, block_index) = if tx_idx >= stake_idxs_start {
                    (&stake_tx_locs, tx_idx - stake_idxs_start)
                } else {
                    (&tx_locs, tx_idx)
                };

                let entry = serialize_entry(block_id, locs[block_index], block_index as u32);
                put_index_entry(&self.bucket, addr_key, &entry)?;
            }
        }

        self.put_tip(&block_hash, block.header.height)
    }

    /// Removes the mappings added by the block and rewinds the tip to its
    /// parent.
    pub fn disconnect_block(
        &self,
        block: &Block,
        prev_scripts: &dyn PrevScripter,
        treasury_enabled: bool,
    ) -> Result<()> {
        let _timer = DebugTimer::new("addrindex", "disconnect_block");

        // Rebuild the same mappings the connect produced; their counts
        // say how many entries each address loses.
        let mut addrs_to_txns = WriteIndexData::new();
        index_block(&mut addrs_to_txns, block, prev_scripts, treasury_enabled);

        for (addr_key, tx_idxs) in &addrs_to_txns {
            remove_index_entries(&self.bucket, addr_key, tx_idxs.len())?;
        }

        self.put_tip(&block.header.prev_block, block.header.height.saturating_sub(1))
    }

    /// Returns entries identifying each transaction that involves the
    /// address, honoring skip/limit and direction, along with the number
    /// of entries actually skipped.  Only confirmed transactions are
    /// included; see [`AddrIndex::unconfirmed_txns_for_address`].
    pub fn entries_for_address(
        &self,
        addr: &Address,
        num_to_skip: u32,
        num_requested: u32,
        reverse: bool,
    ) -> Result<(Vec<TxIndexEntry>, u32)> {
        let addr_key = addr_to_key(addr)?;
        fetch_index_entries(&self.bucket, &addr_key, num_to_skip, num_requested, reverse, |id| {
            self.oracle.hash_by_id(id)
        })
    }

    /// Adds all addresses related to the transaction to the unconfirmed
    /// mirror.
    pub fn add_unconfirmed_tx(
        &self,
        tx: Arc<Transaction>,
        prev_scripts: &dyn PrevScripter,
        treasury_enabled: bool,
    ) {
        self.unconfirmed.add_unconfirmed_tx(tx, prev_scripts, treasury_enabled);
    }

    /// Removes the transaction from the unconfirmed mirror.
    pub fn remove_unconfirmed_tx(&self, tx_hash: &TxHash) {
        self.unconfirmed.remove_unconfirmed_tx(tx_hash);
    }

    /// Returns the unconfirmed transactions involving the address.
    pub fn unconfirmed_txns_for_address(&self, addr: &Address) -> Vec<Arc<Transaction>> {
        self.unconfirmed.unconfirmed_txns_for_address(addr)
    }

    /// Applies one ordered block notification.  Connect failures abort
    /// the caller's transaction; disconnect failures are logged and the
    /// tip rewind is abandoned with them (best effort, matching the
    /// recovery path that rebuilds the index).
    pub fn process_notification(&self, ntfn: &IndexNtfn) -> Result<()> {
        match ntfn {
            IndexNtfn::Connect { block, prev_scripts, treasury_enabled } => {
                self.connect_block(block, prev_scripts.as_ref(), *treasury_enabled)?;
            }
            IndexNtfn::Disconnect { block, prev_scripts, treasury_enabled } => {
                if let Err(e) =
                    self.disconnect_block(block, prev_scripts.as_ref(), *treasury_enabled)
                {
                    error!(
                        block = %block.hash(),
                        "{}: unable to disconnect block: {e}",
                        ADDR_INDEX_NAME
                    );
                }
            }
        }
        Ok(())
    }
}

/// Drops the address index from the database entirely.
pub fn drop_addr_index(db: &Mdb, shutdown: &ShutdownFlag) -> Result<()> {
    if shutdown.is_interrupted() {
        return Err(IndexError::InterruptRequested);
    }

    info!("dropping {}", ADDR_INDEX_NAME);
    let removed = db.delete_prefix(&[])?;
    info!(keys = removed, "dropped {}", ADDR_INDEX_NAME);
    Ok(())
}
