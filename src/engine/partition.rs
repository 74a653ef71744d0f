//! Pure shard and batch splitting.

use crate::store::RecordId;

/// Split `ids` into `shard_count` contiguous shards whose sizes differ by at
/// most one, larger shards first. The union of the shards is exactly `ids`.
pub fn partition(ids: &[RecordId], shard_count: usize) -> Vec<Vec<RecordId>> {
    assert!(shard_count > 0, "shard_count must be positive");

    let base = ids.len() / shard_count;
    let remainder = ids.len() % shard_count;

    let mut shards = Vec::with_capacity(shard_count);
    let mut offset = 0;
    for i in 0..shard_count {
        let size = base + usize::from(i < remainder);
        shards.push(ids[offset..offset + size].to_vec());
        offset += size;
    }
    shards
}

/// Slice a shard into consecutive batches of at most `batch_size` ids; only
/// the final batch may be shorter.
pub fn into_batches(shard: &[RecordId], batch_size: usize) -> Vec<Vec<RecordId>> {
    assert!(batch_size > 0, "batch_size must be positive");
    shard.chunks(batch_size).map(<[RecordId]>::to_vec).collect()
}
