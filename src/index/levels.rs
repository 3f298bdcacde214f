//! Level-based storage for per-address entry sequences.
//!
//! Every address owns a small set of levels, each stored under its own
//! bucket key.  Level 0 holds at most [`LEVEL0_MAX_ENTRIES`] entries and
//! each subsequent level doubles the maximum of the previous one.  New
//! entries append to level 0 until it fills, at which point the whole
//! level is merged into the first level with room and every full level
//! below shifts up by one, leaving level 0 empty for the new entry.
//! Lower levels therefore hold newer entries, and entries within a level
//! run oldest to newest, so concatenating levels highest-first yields the
//! full sequence in insertion order.
//!
//! The scheme is a balance between space and write cost, similar to a
//! log-structured merge tree: one key per entry would duplicate the
//! address hash per transaction, while one value per address would make
//! appends rewrite the whole history.  Levels give logarithmic insertion
//! and retrieval.
//!
//! Removal is the awkward direction.  After trimming entries from the
//! newest end, every level above 0 must again be empty, half full, or
//! completely full, with no empty level sitting below a populated one, so
//! the remainder is squashed downward and any data stranded above is
//! backfilled.  All removal writes are staged in a scratch map and flushed
//! once.

use crate::error::{IndexError, Result};
use crate::index::entry::{deserialize_entry, TxIndexEntry, TX_ENTRY_SIZE};
use crate::index::key::{key_for_level, AddrKey};
use crate::chain::types::BlockHash;
use std::collections::HashMap;

/// Maximum number of entries stored in level 0; level n holds
/// `2^n` times this.
pub const LEVEL0_MAX_ENTRIES: usize = 8;

/// Storage the level scheme operates against.  Implementations only need
/// point reads, writes and deletes; iteration stays outside the core.
pub trait IndexBucket {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, key: &[u8]) -> Result<()>;
}

impl<B: IndexBucket + ?Sized> IndexBucket for &B {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
}

/// Maximum number of entries allowed for the given level.
pub fn max_entries_for_level(level: u8) -> usize {
    LEVEL0_MAX_ENTRIES << level
}

/// Minimum number of entries required for the given level to be
/// populated: one entry in level 0 plus every level below filled.
pub fn min_entries_to_reach_level(level: u8) -> usize {
    let mut max_entries = LEVEL0_MAX_ENTRIES;
    let mut min_required = 1;
    for _ in 1..=level {
        min_required += max_entries;
        max_entries *= 2;
    }
    min_required
}

fn load_level<B: IndexBucket>(
    bucket: &B,
    addr_key: &AddrKey,
    level: u8,
) -> Result<Option<Vec<u8>>> {
    let data = bucket.get(&key_for_level(addr_key, level))?;
    if let Some(data) = &data {
        if data.len() % TX_ENTRY_SIZE != 0 {
            return Err(IndexError::Corruption(format!(
                "level {} for address key {} has length {} which is not a multiple of {}",
                level,
                addr_key,
                data.len(),
                TX_ENTRY_SIZE
            )));
        }
    }
    Ok(data)
}

/// Appends one serialized entry for the address, cascading full levels
/// upward as needed.
pub fn put_index_entry<B: IndexBucket>(
    bucket: &B,
    addr_key: &AddrKey,
    new_data: &[u8; TX_ENTRY_SIZE],
) -> Result<()> {
    // Append to level 0 and return when it fits; this is the common path.
    let mut max_level_bytes = LEVEL0_MAX_ENTRIES * TX_ENTRY_SIZE;
    let level0_key = key_for_level(addr_key, 0);
    let level0_data = bucket.get(&level0_key)?.unwrap_or_default();
    if level0_data.len() + new_data.len() <= max_level_bytes {
        let mut merged = level0_data;
        merged.extend_from_slice(new_data);
        return bucket.put(&level0_key, &merged);
    }

    // Level 0 is full, so merge levels upward until one has room.
    let mut prev_level_data = level0_data;
    let mut cur_level: u8 = 0;
    loop {
        // Each new level holds twice as much as the previous one.
        cur_level += 1;
        max_level_bytes *= 2;

        // Move on while the current level is full.
        let cur_level_key = key_for_level(addr_key, cur_level);
        let cur_level_data = bucket.get(&cur_level_key)?.unwrap_or_default();
        if cur_level_data.len() == max_level_bytes {
            prev_level_data = cur_level_data;
            continue;
        }

        // This level has room: append the previous level's data to it.
        let mut merged = cur_level_data;
        merged.extend_from_slice(&prev_level_data);
        bucket.put(&cur_level_key, &merged)?;

        // Move every full level below up by one.  Walking downward means
        // each level is read before the next iteration overwrites it, so
        // the pre-mutation contents propagate even though the bucket is
        // write-through.
        for merge_level in (1..cur_level).rev() {
            let merge_level_key = key_for_level(addr_key, merge_level);
            let prev_data = bucket.get(&key_for_level(addr_key, merge_level - 1))?;
            bucket.put(&merge_level_key, &prev_data.unwrap_or_default())?;
        }
        break;
    }

    // Level 0 is now free for the new entry.
    bucket.put(&level0_key, new_data)
}

/// Fetches entries for the address honoring skip/limit and direction.
/// Returns the decoded entries and the number actually skipped, which can
/// be less than requested when fewer entries exist.
pub fn fetch_index_entries<B, F>(
    bucket: &B,
    addr_key: &AddrKey,
    num_to_skip: u32,
    num_requested: u32,
    reverse: bool,
    fetch_block_hash: F,
) -> Result<(Vec<TxIndexEntry>, u32)>
where
    B: IndexBucket,
    F: Fn(&[u8]) -> Result<BlockHash>,
{
    // Forward fetches need every level because skip and limit count from
    // the oldest entry (the highest level).  Reverse fetches can stop as
    // soon as enough of the newest data has accumulated.
    let wanted_bytes = (num_to_skip as usize + num_requested as usize) * TX_ENTRY_SIZE;
    let mut level: u8 = 0;
    let mut serialized: Vec<u8> = Vec::new();
    while !reverse || serialized.len() < wanted_bytes {
        let level_data = match load_level(bucket, addr_key, level)? {
            Some(data) if !data.is_empty() => data,
            // Stop when there are no more levels.
            _ => break,
        };

        // Higher levels hold older entries, so prepend them.
        let mut prepended = Vec::with_capacity(level_data.len() + serialized.len());
        prepended.extend_from_slice(&level_data);
        prepended.extend_from_slice(&serialized);
        serialized = prepended;
        level += 1;
    }

    // When more entries are skipped than exist, report how many there
    // actually were.
    let num_entries = (serialized.len() / TX_ENTRY_SIZE) as u32;
    if num_to_skip >= num_entries {
        return Ok((Vec::new(), num_entries));
    }

    if num_requested == 0 {
        return Ok((Vec::new(), num_to_skip));
    }

    let num_to_load = (num_entries - num_to_skip).min(num_requested);
    let mut results = Vec::with_capacity(num_to_load as usize);
    for i in 0..num_to_load {
        let offset = if reverse {
            ((num_entries - num_to_skip - i - 1) as usize) * TX_ENTRY_SIZE
        } else {
            ((num_to_skip + i) as usize) * TX_ENTRY_SIZE
        };

        let entry = deserialize_entry(&serialized[offset..], &fetch_block_hash).map_err(
            |err| match err {
                IndexError::Corruption(msg) => IndexError::Corruption(format!(
                    "failed to deserialize entry for address key {}: {}",
                    addr_key, msg
                )),
                other => other,
            },
        )?;
        results.push(entry);
    }

    Ok((results, num_to_skip))
}

/// Removes the specified number of entries from the newest end of the
/// address's sequence and rebalances the levels.  Fails with an assertion
/// error when the address holds fewer than `count` entries.
pub fn remove_index_entries<B: IndexBucket>(
    bucket: &B,
    addr_key: &AddrKey,
    count: usize,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }

    // All mutations are staged here (empty data marking a deletion) and
    // applied in one pass at the end; several exit paths need the flush
    // and staging halves the bucket reads.
    let mut pending_updates: HashMap<u8, Vec<u8>> = HashMap::new();
    let apply_pending = |pending: &HashMap<u8, Vec<u8>>| -> Result<()> {
        for (&level, data) in pending {
            let cur_level_key = key_for_level(addr_key, level);
            if data.is_empty() {
                bucket.delete(&cur_level_key)?;
            } else {
                bucket.put(&cur_level_key, data)?;
            }
        }
        Ok(())
    };

    // Walk forward through the levels removing entries until the
    // requested count is gone.  Entirely emptied lower levels are
    // backfilled below.
    let mut highest_loaded_level: u8 = 0;
    let mut num_remaining = count;
    let mut level: u8 = 0;
    while num_remaining > 0 {
        let cur_level_data =
            load_level(bucket, addr_key, level)?.unwrap_or_default();
        if cur_level_data.is_empty() {
            return Err(IndexError::Assert(format!(
                "not enough entries for address key {} to delete {} entries",
                addr_key, count
            )));
        }
        highest_loaded_level = level;

        // Drop the whole level or just the newest tail of it.
        let num_entries = cur_level_data.len() / TX_ENTRY_SIZE;
        if num_remaining >= num_entries {
            pending_updates.insert(level, Vec::new());
            num_remaining -= num_entries;
            level += 1;
            continue;
        }

        let offset_end = cur_level_data.len() - num_remaining * TX_ENTRY_SIZE;
        pending_updates.insert(level, cur_level_data[..offset_end].to_vec());
        num_remaining = 0;
    }

    // When level 0 kept at least one entry nothing moved between levels,
    // so only the staged trims need writing.
    if !pending_updates[&0].is_empty() {
        return apply_pending(&pending_updates);
    }

    // One or more lower levels are now empty, and the highest loaded
    // level may have been trimmed.  Squash what remains of it into the
    // lowest levels possible: every level above 0 must end up empty, half
    // full, or completely full, and must keep enough entries below it to
    // stay legal, so work downward peeling off either a full or half
    // level's worth at each step.  Whatever is left lands in level 0 (the
    // loop guarantees it fits).  Track the lowest level cleared here so
    // the backfill below knows how deep it must reach.
    let mut lowest_empty_level: u8 = u8::MAX;
    let mut cur_level_data = pending_updates.get(&highest_loaded_level).cloned().unwrap_or_default();
    let mut cur_level_max_entries = max_entries_for_level(highest_loaded_level);
    for level in (1..=highest_loaded_level).rev() {
        let num_entries = cur_level_data.len() / TX_ENTRY_SIZE;
        let prev_level_max_entries = cur_level_max_entries / 2;
        let min_prev_required = min_entries_to_reach_level(level - 1);
        if num_entries < prev_level_max_entries + min_prev_required {
            // Not enough left for this level to stay populated; push
            // everything down.
            lowest_empty_level = level;
            pending_updates.insert(level, Vec::new());
        } else {
            // Keep a full or half level here, whichever still leaves the
            // minimum required below.
            let take = if num_entries >= cur_level_max_entries + min_prev_required {
                cur_level_max_entries
            } else {
                prev_level_max_entries
            };
            let offset = take * TX_ENTRY_SIZE;
            pending_updates.insert(level, cur_level_data[..offset].to_vec());
            cur_level_data = cur_level_data[offset..].to_vec();
        }

        cur_level_max_entries = prev_level_max_entries;
    }
    let carry_is_empty = cur_level_data.is_empty();
    pending_updates.insert(0, cur_level_data);
    if carry_is_empty {
        lowest_empty_level = 0;
    }

    // With the highest loaded level emptied, the level above it may still
    // hold data that now floats above a gap; pull it down until the
    // structure is stable again.
    while pending_updates[&highest_loaded_level].is_empty() {
        let next_level = highest_loaded_level + 1;
        let mut level_data = match load_level(bucket, addr_key, next_level)? {
            Some(data) if !data.is_empty() => data,
            _ => break,
        };
        pending_updates.insert(next_level, level_data.clone());
        highest_loaded_level = next_level;

        // A half-full top level moves down a level wholesale, which keeps
        // the halving below uniform; the vacated level is then itself a
        // candidate for backfilling on the next pass.
        let mut level = next_level;
        let mut cur_level_max_entries = max_entries_for_level(level);
        if level_data.len() / TX_ENTRY_SIZE != cur_level_max_entries {
            pending_updates.insert(level, Vec::new());
            pending_updates.insert(level - 1, level_data.clone());
            level -= 1;
            cur_level_max_entries /= 2;
        }

        // Backfill the remaining empty levels by iteratively halving the
        // data until the lowest empty level is reached.
        while level > lowest_empty_level {
            let offset = (cur_level_max_entries / 2) * TX_ENTRY_SIZE;
            pending_updates.insert(level, level_data[..offset].to_vec());
            level_data = level_data[offset..].to_vec();
            pending_updates.insert(level - 1, level_data.clone());
            level -= 1;
            cur_level_max_entries /= 2;
        }

        lowest_empty_level = highest_loaded_level;
    }

    apply_pending(&pending_updates)
}
