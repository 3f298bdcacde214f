//! Shared harness for integration tests: a throwaway RocksDB-backed
//! index plus an in-memory chain supplying previous scripts.

// Not every test binary uses every helper.
#![allow(dead_code)]

use addrdex::chain::types::Block;
use addrdex::config::{AppConfig, Network};
use addrdex::error::Result;
use addrdex::runtime::mdb::Mdb;
use addrdex::runtime::{open_addr_index, AddrIndexHandle};
use addrdex::test_utils::MockChain;
use tempfile::TempDir;

pub struct TestIndex {
    pub handle: AddrIndexHandle,
    pub chain: MockChain,
    _temp: TempDir,
}

pub fn open_test_index() -> TestIndex {
    let temp = TempDir::new().expect("temp dir");
    let cfg = AppConfig {
        db_path: temp.path().to_string_lossy().into_owned(),
        network: Network::Simnet,
    };
    let handle = open_addr_index(&cfg).expect("open index");
    TestIndex { handle, chain: MockChain::new(), _temp: temp }
}

impl TestIndex {
    /// Registers the block with the chain view and the block-ID store,
    /// then connects it.
    pub fn connect(&mut self, block: &Block) -> Result<()> {
        self.chain.register(block);
        self.handle.block_ids.register_block(&block.hash())?;
        self.handle.index.connect_block(block, &self.chain, false)
    }

    pub fn disconnect(&mut self, block: &Block) -> Result<()> {
        self.handle.index.disconnect_block(block, &self.chain, false)
    }

    /// Byte-level snapshot of the index namespace.
    pub fn index_snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        snapshot_namespace(&self.handle.index_mdb)
    }
}

pub fn snapshot_namespace(mdb: &Mdb) -> Vec<(Vec<u8>, Vec<u8>)> {
    let keys = mdb.scan_prefix(&[]).expect("scan namespace");
    keys.into_iter()
        .map(|k| {
            let v = mdb.get(&k).expect("read key").expect("key present");
            (k, v)
        })
        .collect()
}
