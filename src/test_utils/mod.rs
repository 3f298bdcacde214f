// Test utilities shared by unit and integration tests.

pub mod chain_builder;
pub mod mock_chain;

pub use chain_builder::{commitment_script, p2pkh_script, stake_tagged_script, TestBlockBuilder};
pub use mock_chain::{MemoryBucket, MockChain};
