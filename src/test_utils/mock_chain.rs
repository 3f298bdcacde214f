//! In-memory stand-ins for the index's collaborators: a bucket, a block
//! oracle and a previous-script source.

use crate::chain::types::{Block, BlockHash, OutPoint, TxTree};
use crate::error::{IndexError, Result};
use crate::index::block_scan::PrevScripter;
use crate::index::levels::IndexBucket;
use crate::index::BlockIdOracle;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Plain in-memory bucket.  The snapshot accessor makes byte-level state
/// comparisons possible in tests.
#[derive(Default)]
pub struct MemoryBucket {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full copy of the bucket contents.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.map.read().unwrap().clone()
    }

    /// Stores a raw value, bypassing the index; used to stage corrupt
    /// data.
    pub fn insert_raw(&self, key: &[u8], value: &[u8]) {
        self.map.write().unwrap().insert(key.to_vec(), value.to_vec());
    }
}

impl IndexBucket for MemoryBucket {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.write().unwrap().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.map.write().unwrap().remove(key);
        Ok(())
    }
}

/// In-memory chain view: block ids, block hashes and the scripts of every
/// output of every registered block.
#[derive(Default)]
pub struct MockChain {
    prev_scripts: HashMap<OutPoint, (u16, Vec<u8>)>,
    ids_by_hash: HashMap<BlockHash, u32>,
    hashes_by_id: HashMap<u32, BlockHash>,
    next_id: u32,
}

impl MockChain {
    pub fn new() -> Self {
        Self { next_id: 1, ..Self::default() }
    }

    /// Assigns the block an id (if it has none yet) and records every
    /// output of both trees as a resolvable previous script.
    pub fn register(&mut self, block: &Block) -> u32 {
        let hash = block.hash();
        let id = *self.ids_by_hash.entry(hash).or_insert_with(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        });
        self.hashes_by_id.insert(id, hash);

        for (tree, txns) in [
            (TxTree::Regular, &block.transactions),
            (TxTree::Stake, &block.stake_transactions),
        ] {
            for tx in txns {
                let tx_hash = tx.hash();
                for (vout, txout) in tx.outputs.iter().enumerate() {
                    let outpoint = OutPoint { hash: tx_hash, index: vout as u32, tree };
                    self.prev_scripts.insert(outpoint, (txout.version, txout.pk_script.clone()));
                }
            }
        }

        id
    }
}

impl PrevScripter for MockChain {
    fn prev_script(&self, outpoint: &OutPoint) -> Option<(u16, Vec<u8>)> {
        self.prev_scripts.get(outpoint).cloned()
    }
}

impl BlockIdOracle for MockChain {
    fn id_by_hash(&self, hash: &BlockHash) -> Result<u32> {
        self.ids_by_hash
            .get(hash)
            .copied()
            .ok_or_else(|| IndexError::Assert(format!("no block id assigned for block {hash}")))
    }

    fn hash_by_id(&self, serialized_id: &[u8]) -> Result<BlockHash> {
        if serialized_id.len() != 4 {
            return Err(IndexError::Corruption("serialized block id must be 4 bytes".into()));
        }
        let id = u32::from_be_bytes([
            serialized_id[0],
            serialized_id[1],
            serialized_id[2],
            serialized_id[3],
        ]);
        self.hashes_by_id
            .get(&id)
            .copied()
            .ok_or_else(|| IndexError::Corruption(format!("no block hash recorded for id {id}")))
    }
}
