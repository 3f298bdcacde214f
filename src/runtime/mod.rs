pub mod block_ids;
pub mod mdb;

use crate::config::AppConfig;
use crate::index::{AddrIndex, ADDR_INDEX_NAMESPACE};
use crate::runtime::block_ids::BlockIdStore;
use crate::runtime::mdb::Mdb;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Namespace prefix for the block hash <-> id mapping.
pub const BLOCK_IDS_NAMESPACE: &[u8] = b"blockids/";

/// The wired-up index plus the handles the host needs around it: the
/// block-ID store for registering incoming blocks and the namespaced
/// database view for dropping the index.
pub struct AddrIndexHandle {
    pub index: AddrIndex<Mdb, Arc<BlockIdStore>>,
    pub block_ids: Arc<BlockIdStore>,
    pub index_mdb: Mdb,
}

/// Opens the database named by the configuration and wires the address
/// index against it.  Call [`AddrIndex::init`] before first use; blocks
/// must be registered with the returned [`BlockIdStore`] before their
/// connect notification is dispatched.
pub fn open_addr_index(cfg: &AppConfig) -> Result<AddrIndexHandle> {
    let db = Mdb::open_db(&cfg.db_path)
        .with_context(|| format!("failed to open database at {}", cfg.db_path))?;
    info!(db_path = %cfg.db_path, network = cfg.network.name(), "opened index database");

    let index_mdb = Mdb::from_db(Arc::clone(&db), ADDR_INDEX_NAMESPACE);
    let block_ids = Arc::new(BlockIdStore::new(Mdb::from_db(db, BLOCK_IDS_NAMESPACE)));
    let index = AddrIndex::new(index_mdb.clone(), Arc::clone(&block_ids));

    Ok(AddrIndexHandle { index, block_ids, index_mdb })
}
