use crate::chain::types::{BlockHash, HASH_SIZE};
use crate::error::{IndexError, Result};
use crate::index::BlockIdOracle;
use crate::runtime::mdb::Mdb;

/// Durable mapping between block hashes and the compact 32-bit ids the
/// index stores in its entries.
///
/// Storage keys:
/// - `id/{hash}` -> id_be4
/// - `hash/{id_be4}` -> block_hash
/// - `next` -> next unassigned id (LE)
///
/// Ids are assigned sequentially starting at 1 so that 0 never appears in
/// a serialized entry.
pub struct BlockIdStore {
    mdb: Mdb,
}

impl BlockIdStore {
    const ID_PREFIX: &'static [u8] = b"id/";
    const HASH_PREFIX: &'static [u8] = b"hash/";
    const NEXT_KEY: &'static [u8] = b"next";

    pub fn new(mdb: Mdb) -> Self {
        Self { mdb }
    }

    fn id_key(hash: &BlockHash) -> Vec<u8> {
        let mut key = Self::ID_PREFIX.to_vec();
        key.extend_from_slice(hash.as_bytes());
        key
    }

    fn hash_key(id: u32) -> Vec<u8> {
        let mut key = Self::HASH_PREFIX.to_vec();
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    /// Returns the id already assigned to the hash, or assigns and
    /// records the next free one.
    pub fn register_block(&self, hash: &BlockHash) -> Result<u32> {
        if let Some(raw) = self.mdb.get(&Self::id_key(hash))? {
            return decode_id(&raw);
        }

        let next = match self.mdb.get(Self::NEXT_KEY)? {
            Some(raw) if raw.len() == 4 => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            Some(_) => {
                return Err(IndexError::Corruption("invalid next block id value".into()));
            }
            None => 1,
        };

        self.mdb.put(&Self::id_key(hash), &next.to_be_bytes())?;
        self.mdb.put(&Self::hash_key(next), hash.as_bytes())?;
        self.mdb.put(Self::NEXT_KEY, &(next + 1).to_le_bytes())?;
        Ok(next)
    }
}

fn decode_id(raw: &[u8]) -> Result<u32> {
    if raw.len() != 4 {
        return Err(IndexError::Corruption("invalid block id value".into()));
    }
    Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

impl BlockIdOracle for BlockIdStore {
    fn id_by_hash(&self, hash: &BlockHash) -> Result<u32> {
        match self.mdb.get(&Self::id_key(hash))? {
            Some(raw) => decode_id(&raw),
            None => Err(IndexError::Assert(format!("no block id assigned for block {hash}"))),
        }
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

        match self.mdb.get(&Self::hash_key(id))? {
            Some(raw) if raw.len() == HASH_SIZE => {
                let mut hash = [0u8; HASH_SIZE];
                hash.copy_from_slice(&raw);
                Ok(BlockHash(hash))
            }
            Some(_) => Err(IndexError::Corruption(format!("invalid block hash for id {id}"))),
            None => Err(IndexError::Corruption(format!("no block hash recorded for id {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_store() -> (BlockIdStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Mdb::open_db(temp_dir.path()).unwrap();
        (BlockIdStore::new(Mdb::from_db(Arc::clone(&db), b"blockids/")), temp_dir)
    }

    #[test]
    fn ids_are_sequential_and_stable() {
        let (store, _temp) = create_test_store();

        let hash_a = BlockHash([1; HASH_SIZE]);
        let hash_b = BlockHash([2; HASH_SIZE]);

        assert_eq!(store.register_block(&hash_a).unwrap(), 1);
        assert_eq!(store.register_block(&hash_b).unwrap(), 2);
        // Re-registering returns the original assignment.
        assert_eq!(store.register_block(&hash_a).unwrap(), 1);

        assert_eq!(store.id_by_hash(&hash_b).unwrap(), 2);
        assert_eq!(store.hash_by_id(&2u32.to_be_bytes()).unwrap(), hash_b);
    }

    #[test]
    fn unknown_lookups_fail() {
        let (store, _temp) = create_test_store();

        let missing = BlockHash([9; HASH_SIZE]);
        assert!(matches!(store.id_by_hash(&missing), Err(IndexError::Assert(_))));
        assert!(matches!(store.hash_by_id(&7u32.to_be_bytes()), Err(IndexError::Corruption(_))));
        assert!(matches!(store.hash_by_id(&[1, 2]), Err(IndexError::Corruption(_))));
    }
}
