use rocksdb::{BlockBasedOptions, Cache, Direction, IteratorMode, Options, ReadOptions, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::index::levels::IndexBucket;

/// ===== Cache / open-time tuning =====
/// LRU block cache shared by data and index/filter blocks.
pub const ROCKS_BLOCK_CACHE_BYTES: usize = 256 << 20; // 256 MiB

/// Bloom filter bits/key (helps point lookups).
pub const BLOOM_BITS_PER_KEY: f64 = 10.0;
/// ====================================

/// A namespaced view over one shared RocksDB instance.  Every key passed
/// in is relative; the namespace prefix keeps unrelated stores from
/// colliding inside the same database.
#[derive(Clone)]
pub struct Mdb {
    db: Arc<DB>,
    prefix: Vec<u8>,
}

impl Mdb {
    pub fn from_db(db: Arc<DB>, prefix: impl AsRef<[u8]>) -> Self {
        Self { db, prefix: prefix.as_ref().to_vec() }
    }

    /// Opens (or creates) a database at `path` with the index's tuned
    /// options and returns the shared handle for namespacing.
    pub fn open_db(path: impl AsRef<Path>) -> Result<Arc<DB>> {
        let cache = Cache::new_lru_cache(ROCKS_BLOCK_CACHE_BYTES);

        let mut table = BlockBasedOptions::default();
        table.set_block_cache(&cache);
        // Keep hot metadata in the cache alongside data blocks.
        table.set_cache_index_and_filter_blocks(true);
        table.set_pin_l0_filter_and_index_blocks_in_cache(true);
        table.set_bloom_filter(BLOOM_BITS_PER_KEY, false);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        // Keep readers open (avoid fd thrash).
        opts.set_max_open_files(-1);
        opts.set_block_based_table_factory(&table);

        let db = DB::open(&opts, path)?;
        Ok(Arc::new(db))
    }

    #[inline]
    pub fn prefixed(&self, k: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + k.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(k);
        out
    }

    #[inline]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn get(&self, k: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(self.prefixed(k))?)
    }

    pub fn put(&self, k: &[u8], v: &[u8]) -> Result<()> {
        Ok(self.db.put(self.prefixed(k), v)?)
    }

    pub fn delete(&self, k: &[u8]) -> Result<()> {
        Ok(self.db.delete(self.prefixed(k))?)
    }

    /// Returns every relative key under `rel_prefix`, in key order.
    pub fn scan_prefix(&self, rel_prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let start = self.prefixed(rel_prefix);

        let mut ro = ReadOptions::default();
        ro.set_total_order_seek(true);

        let it = self.db.iterator_opt(IteratorMode::From(&start, Direction::Forward), ro);
        let mut keys = Vec::new();
        for kv in it {
            let (k_full, _v) = kv.map_err(IndexError::from)?;
            if !k_full.starts_with(&start) {
                break;
            }
            // Strip the namespace prefix so callers see relative keys.
            keys.push(k_full[self.prefix.len()..].to_vec());
        }
        Ok(keys)
    }

    /// Deletes every key under `rel_prefix` in one batch.  Returns the
    /// number of keys removed.
    pub fn delete_prefix(&self, rel_prefix: &[u8]) -> Result<usize> {
        let keys = self.scan_prefix(rel_prefix)?;
        let mut wb = WriteBatch::default();
        for k in &keys {
            wb.delete(self.prefixed(k));
        }
        self.db.write(wb)?;
        Ok(keys.len())
    }
}

impl IndexBucket for Mdb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Mdb::get(self, key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Mdb::put(self, key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        Mdb::delete(self, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_test_db() -> (Arc<DB>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Mdb::open_db(temp_dir.path()).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn namespaces_do_not_collide() {
        let (db, _temp) = open_test_db();
        let a = Mdb::from_db(Arc::clone(&db), b"a/");
        let b = Mdb::from_db(Arc::clone(&db), b"b/");

        a.put(b"key", b"alpha").unwrap();
        b.put(b"key", b"beta").unwrap();

        assert_eq!(a.get(b"key").unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(b.get(b"key").unwrap(), Some(b"beta".to_vec()));

        a.delete(b"key").unwrap();
        assert_eq!(a.get(b"key").unwrap(), None);
        assert_eq!(b.get(b"key").unwrap(), Some(b"beta".to_vec()));
    }

    #[test]
    fn scan_prefix_returns_relative_keys_in_order() {
        let (db, _temp) = open_test_db();
        let mdb = Mdb::from_db(db, b"ns/");

        mdb.put(b"x/2", b"2").unwrap();
        mdb.put(b"x/1", b"1").unwrap();
        mdb.put(b"y/1", b"other").unwrap();

        let keys = mdb.scan_prefix(b"x/").unwrap();
        assert_eq!(keys, vec![b"x/1".to_vec(), b"x/2".to_vec()]);
    }

    #[test]
    fn delete_prefix_clears_only_the_namespace() {
        let (db, _temp) = open_test_db();
        let target = Mdb::from_db(Arc::clone(&db), b"drop/");
        let keep = Mdb::from_db(db, b"keep/");

        target.put(b"1", b"x").unwrap();
        target.put(b"2", b"y").unwrap();
        keep.put(b"1", b"z").unwrap();

        let removed = target.delete_prefix(&[]).unwrap();
        assert_eq!(removed, 2);
        assert!(target.scan_prefix(&[]).unwrap().is_empty());
        assert_eq!(keep.get(b"1").unwrap(), Some(b"z".to_vec()));
    }
}
