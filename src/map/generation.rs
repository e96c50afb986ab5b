// MIT License
//
// Copyright (c) 2026 the clt developers
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use super::bucket::Bucket;
use crate::lock;

use std::{
    mem,
    sync::atomic::{self, Ordering},
};

use crossbeam_epoch::{Guard, Shared};
use parking_lot::{Mutex, MutexGuard};

/// One snapshot of the table's shape: a fixed number of buckets divided
/// into contiguous ranges, each range owned by one shard mutex.
///
/// A generation's shape never changes after construction. Its bucket
/// *contents* are mutated in place while it is the map's active generation;
/// once superseded it is read-only until the epoch collector reclaims it.
///
/// Bucket `i` belongs to shard `i / shard_width` with
/// `shard_width = ceil(bucket_count / concurrency)`. The range lives inside
/// the shard's mutex, so bucket access without the owning lock does not
/// typecheck.
#[derive(Debug)]
pub(crate) struct Generation<K, V> {
    shards: Box<[Mutex<Box<[Bucket<K, V>]>>]>,
    bucket_count: usize,
    shard_width: usize,
}

impl<K, V> Generation<K, V> {
    /// Creates a generation with `concurrency` shard locks over
    /// `bucket_count` empty buckets.
    pub(crate) fn with_concurrency_and_capacity(concurrency: usize, bucket_count: usize) -> Self {
        assert!(concurrency >= 1);
        assert!(concurrency <= bucket_count);

        let shard_width = bucket_count.div_ceil(concurrency);

        let shards = (0..concurrency)
            .map(|shard_index| {
                let owned = bucket_count
                    .saturating_sub(shard_index * shard_width)
                    .min(shard_width);

                Mutex::new((0..owned).map(|_| Bucket::default()).collect())
            })
            .collect();

        Self {
            shards,
            bucket_count,
            shard_width,
        }
    }

    pub(crate) fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.bucket_count as u64) as usize
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub(crate) fn concurrency(&self) -> usize {
        self.shards.len()
    }

    /// Acquires the shard lock owning `bucket_index`, blocking.
    pub(crate) fn lock(&self, bucket_index: usize) -> ShardGuard<'_, K, V> {
        let shard_index = bucket_index / self.shard_width;

        ShardGuard {
            guard: self.shards[shard_index].lock(),
            base: shard_index * self.shard_width,
        }
    }

    /// Acquires every shard lock at once; resize only.
    pub(crate) fn lock_all(&self) -> Vec<MutexGuard<'_, Box<[Bucket<K, V>]>>> {
        lock::lock_all(&self.shards)
    }
}

impl<K: Eq, V> Generation<K, V> {
    /// Rehashes an entry against this generation's bucket count and inserts
    /// it without locking.
    ///
    /// Sound only while this generation is exclusively owned, i.e. built
    /// during a resize but not yet published.
    pub(crate) fn seed(&mut self, hash: u64, key: K, value: V) {
        let bucket_index = self.bucket_index(hash);
        let shard_index = bucket_index / self.shard_width;
        let base = shard_index * self.shard_width;

        self.shards[shard_index].get_mut()[bucket_index - base].insert(key, value);
    }
}

/// Exclusive access to one shard's bucket range, indexed by table-wide
/// bucket index.
pub(crate) struct ShardGuard<'g, K, V> {
    guard: MutexGuard<'g, Box<[Bucket<K, V>]>>,
    base: usize,
}

impl<'g, K, V> ShardGuard<'g, K, V> {
    pub(crate) fn bucket(&self, bucket_index: usize) -> &Bucket<K, V> {
        &self.guard[bucket_index - self.base]
    }

    pub(crate) fn bucket_mut(&mut self, bucket_index: usize) -> &mut Bucket<K, V> {
        &mut self.guard[bucket_index - self.base]
    }
}

/// Schedules `ptr` for destruction once no pinned thread can still be
/// reading it.
///
/// # Safety
///
/// `ptr` must have been permanently unlinked from its `Atomic` before this
/// is called, and no new reference to it may be created afterwards.
pub(crate) unsafe fn defer_acquire_destroy<'g, T>(guard: &'g Guard, ptr: Shared<'g, T>) {
    assert!(!ptr.is_null());

    guard.defer_unchecked(move || {
        atomic::fence(Ordering::Acquire);
        mem::drop(ptr.into_owned());
    });
}
