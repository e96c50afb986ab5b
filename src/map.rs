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

//! A resizeable concurrent hash map with striped locking and chained
//! buckets.

pub(crate) mod bucket;
pub(crate) mod generation;


use generation::Generation;

use std::{
    borrow::Borrow,
    cmp,
    hash::{BuildHasher, Hash},
    mem,
    sync::atomic::{self, AtomicBool, AtomicUsize, Ordering},
};

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};

/// Default hasher for `HashMap`.
///
/// This is currently [aHash], a hashing algorithm designed around
/// acceleration by the [AES-NI] instruction set on x86 processors. aHash is
/// not cryptographically secure, but is fast and resistant to DoS attacks.
///
/// [aHash]: https://docs.rs/ahash
/// [AES-NI]: https://en.wikipedia.org/wiki/AES_instruction_set
pub type DefaultHashBuilder = ahash::RandomState;

/// Chain length past which an insertion triggers a resize, unless a custom
/// limit is chosen per instantiation.
pub const DEFAULT_MAX_LOAD_FACTOR: usize = 4;

/// Upper bound on the number of shard locks a map will grow to.
///
/// Maps configured to grow their concurrency double their shard count on
/// every resize until they reach this many locks.
pub const MAX_CONCURRENCY: usize = 1024;

/// A resizeable concurrent hash map with striped locking and chained
/// buckets.
///
/// The table is split into shards, each a mutex over a contiguous range of
/// buckets, so operations on keys owned by different shards never contend.
/// The whole table (bucket storage plus shard locks) forms one
/// *generation* whose shape is fixed at construction; growing the table
/// builds a new generation, re-hashes every entry into it, and publishes it
/// with a single atomic pointer swap. Writers detect a swap that happened
/// between loading the generation and acquiring their shard lock and
/// retry against the new generation; superseded generations are reclaimed
/// through [`crossbeam_epoch`] once the last thread still reading them
/// moves on.
///
/// Lookups acquire the owning shard lock for the duration of one chain
/// scan, so they never observe a partially written entry; they do not
/// re-validate the generation, so a lookup racing a resize may be served
/// from the generation it loaded even though a newer one was published
/// meanwhile. Operations on the same key are serialized by the owning
/// shard lock; absence of a key is an ordinary `None`, never an error.
///
/// An insertion that leaves a chain longer than `MAX_LOAD_FACTOR` entries
/// performs the resize itself before returning, synchronously; a flag per
/// map keeps concurrent load-factor breaches from resizing more than once.
/// The bucket count grows to `2n + 1` (odd, to spread clustered hashes) and
/// the shard count doubles up to [`MAX_CONCURRENCY`] when the map is
/// configured to grow it.
///
/// The default hashing algorithm is [aHash]; any [`BuildHasher`] can be
/// supplied per map with [`with_concurrency_capacity_and_hasher`]. Key
/// types must implement [`Hash`] and [`Eq`]. Insertion requires `K` and `V`
/// to be [`Clone`]: a resize copies every live entry into the new
/// generation while late readers may still be scanning the old one.
///
/// [aHash]: https://docs.rs/ahash
/// [`BuildHasher`]: https://doc.rust-lang.org/std/hash/trait.BuildHasher.html
/// [`with_concurrency_capacity_and_hasher`]: #method.with_concurrency_capacity_and_hasher
/// [`Hash`]: https://doc.rust-lang.org/std/hash/trait.Hash.html
/// [`Eq`]: https://doc.rust-lang.org/std/cmp/trait.Eq.html
/// [`Clone`]: https://doc.rust-lang.org/std/clone/trait.Clone.html
pub struct HashMap<
    K: Hash + Eq,
    V,
    S: BuildHasher = DefaultHashBuilder,
    const MAX_LOAD_FACTOR: usize = DEFAULT_MAX_LOAD_FACTOR,
> {
    generation: Atomic<Generation<K, V>>,
    len: AtomicUsize,
    build_hasher: S,
    grow_concurrency: bool,
    resizing: AtomicBool,
    #[cfg(test)]
    resizes_in_flight: AtomicUsize,
    #[cfg(test)]
    resizes_completed: AtomicUsize,
}

#[cfg(feature = "num-cpus")]
impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder, DEFAULT_MAX_LOAD_FACTOR> {
    /// Creates an empty `HashMap` with one shard lock per CPU and one
    /// bucket per shard.
    pub fn new() -> Self {
        Self::with_concurrency(num_cpus::get())
    }

    /// Creates an empty `HashMap` with one shard lock per CPU and at least
    /// `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_concurrency_and_capacity(num_cpus::get(), capacity)
    }
}

#[cfg(feature = "num-cpus")]
impl<K: Hash + Eq, V> Default for HashMap<K, V, DefaultHashBuilder, DEFAULT_MAX_LOAD_FACTOR> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder, DEFAULT_MAX_LOAD_FACTOR> {
    /// Creates an empty `HashMap` with `concurrency` shard locks and one
    /// bucket per shard.
    ///
    /// The shard count doubles on resize, up to [`MAX_CONCURRENCY`].
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self::with_concurrency_and_capacity(concurrency, concurrency)
    }

    /// Creates an empty `HashMap` with `concurrency` shard locks and at
    /// least `capacity` buckets.
    ///
    /// The bucket count is coerced up to at least `concurrency` so that
    /// every shard owns a bucket. The shard count doubles on resize, up to
    /// [`MAX_CONCURRENCY`].
    pub fn with_concurrency_and_capacity(concurrency: usize, capacity: usize) -> Self {
        Self::with_concurrency_capacity_and_hasher(
            concurrency,
            capacity,
            true,
            DefaultHashBuilder::default(),
        )
    }
}

impl<K: Hash + Eq, V, S: BuildHasher, const MAX_LOAD_FACTOR: usize>
    HashMap<K, V, S, MAX_LOAD_FACTOR>
{
    /// Creates an empty `HashMap` with `concurrency` shard locks, at least
    /// `max(capacity, concurrency)` buckets, and `build_hasher` to hash
    /// keys.
    ///
    /// `grow_concurrency` selects whether the shard count doubles on each
    /// resize (capped at [`MAX_CONCURRENCY`]) or stays fixed for the map's
    /// lifetime.
    ///
    /// # Panics
    ///
    /// Panics if `concurrency` is zero.
    pub fn with_concurrency_capacity_and_hasher(
        concurrency: usize,
        capacity: usize,
        grow_concurrency: bool,
        build_hasher: S,
    ) -> Self {
        assert!(concurrency >= 1);

        let bucket_count = cmp::max(capacity, concurrency);

        Self {
            generation: Atomic::new(Generation::with_concurrency_and_capacity(
                concurrency,
                bucket_count,
            )),
            len: AtomicUsize::new(0),
            build_hasher,
            grow_concurrency,
            resizing: AtomicBool::new(false),
            #[cfg(test)]
            resizes_in_flight: AtomicUsize::new(0),
            #[cfg(test)]
            resizes_completed: AtomicUsize::new(0),
        }
    }

    /// Returns the number of elements that are confirmed to have been
    /// inserted into this map.
    ///
    /// Because `HashMap` can be updated concurrently, this function
    /// reflects the number of insert operations that have returned to the
    /// user. In-progress insertions are not counted.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns true if this `HashMap` contains no confirmed inserted
    /// elements.
    ///
    /// In-progress insertions into this `HashMap` are not considered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of elements this `HashMap` can hold before an
    /// insertion can trigger a resize, assuming keys distribute uniformly
    /// over the buckets.
    ///
    /// If invoked concurrently with insertions, a larger generation may
    /// already have been published by the time this returns.
    pub fn capacity(&self) -> usize {
        let guard = &crossbeam_epoch::pin();
        let (_, generation) = self.current(guard);

        generation.bucket_count() * MAX_LOAD_FACTOR
    }

    /// Returns the number of shard locks in the map's current generation.
    pub fn concurrency(&self) -> usize {
        let guard = &crossbeam_epoch::pin();
        let (_, generation) = self.current(guard);

        generation.concurrency()
    }

    /// Returns a copy of the value corresponding to `key`.
    ///
    /// `Q` can be any borrowed form of `K`, but [`Hash`] and [`Eq`] on `Q`
    /// *must* match that of `K`. If your `V` does not implement [`Clone`],
    /// use [`get_and`] instead.
    ///
    /// [`Hash`]: https://doc.rust-lang.org/std/hash/trait.Hash.html
    /// [`Eq`]: https://doc.rust-lang.org/std/cmp/trait.Eq.html
    /// [`Clone`]: https://doc.rust-lang.org/std/clone/trait.Clone.html
    /// [`get_and`]: #method.get_and
    pub fn get<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
    {
        self.get_and(key, V::clone)
    }

    /// Invokes `with_value` with a reference to the value corresponding to
    /// `key`, if there is one, and returns its result.
    ///
    /// The owning shard lock is held while `with_value` runs; keep it
    /// short.
    ///
    /// `Q` can be any borrowed form of `K`, but [`Hash`] and [`Eq`] on `Q`
    /// *must* match that of `K`.
    ///
    /// [`Hash`]: https://doc.rust-lang.org/std/hash/trait.Hash.html
    /// [`Eq`]: https://doc.rust-lang.org/std/cmp/trait.Eq.html
    pub fn get_and<Q: ?Sized + Hash + Eq, F: FnOnce(&V) -> T, T>(
        &self,
        key: &Q,
        with_value: F,
    ) -> Option<T>
    where
        K: Borrow<Q>,
    {
        let hash = bucket::hash(&self.build_hasher, key);

        let guard = &crossbeam_epoch::pin();
        let (_, generation) = self.current(guard);

        // no generation re-check: a lookup racing a resize may be served
        // from the generation it loaded, which is never mutated once
        // superseded
        let bucket_index = generation.bucket_index(hash);
        let shard = generation.lock(bucket_index);

        shard.bucket(bucket_index).get(key).map(with_value)
    }

    /// Inserts a key-value pair, then returns the value previously
    /// associated with `key`, if any.
    ///
    /// If the insertion leaves the key's chain longer than
    /// `MAX_LOAD_FACTOR` entries and no other thread is already growing the
    /// table, this call grows the table before returning. `K` and `V` must
    /// implement [`Clone`] so a resize can copy live entries into the new
    /// generation while late readers still scan the old one.
    ///
    /// [`Clone`]: https://doc.rust-lang.org/std/clone/trait.Clone.html
    pub fn insert(&self, key: K, value: V) -> Option<V>
    where
        K: Clone,
        V: Clone,
    {
        let hash = bucket::hash(&self.build_hasher, &key);
        let guard = &crossbeam_epoch::pin();

        loop {
            let (generation_ptr, generation) = self.current(guard);
            let bucket_index = generation.bucket_index(hash);
            let mut shard = generation.lock(bucket_index);

            // a resize may have been published between loading the
            // generation and acquiring the lock; holding the shard lock
            // pins the generation, so a successful re-check stays valid
            if self.generation.load(Ordering::Acquire, guard) != generation_ptr {
                continue;
            }

            let (previous, chain_len) = shard.bucket_mut(bucket_index).insert(key, value);

            if previous.is_none() {
                self.len.fetch_add(1, Ordering::Relaxed);
            }

            let resize_claimed = chain_len > MAX_LOAD_FACTOR
                && self
                    .resizing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok();

            mem::drop(shard);

            if resize_claimed {
                self.resize(guard);
            }

            return previous;
        }
    }

    /// Removes the entry corresponding to `key`, returning its value.
    ///
    /// Removing an absent key is a no-op and returns [`None`].
    ///
    /// `Q` can be any borrowed form of `K`, but [`Hash`] and [`Eq`] on `Q`
    /// *must* match that of `K`.
    ///
    /// [`None`]: https://doc.rust-lang.org/std/option/enum.Option.html#variant.None
    /// [`Hash`]: https://doc.rust-lang.org/std/hash/trait.Hash.html
    /// [`Eq`]: https://doc.rust-lang.org/std/cmp/trait.Eq.html
    pub fn remove<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        let hash = bucket::hash(&self.build_hasher, key);
        let guard = &crossbeam_epoch::pin();

        loop {
            let (generation_ptr, generation) = self.current(guard);
            let bucket_index = generation.bucket_index(hash);
            let mut shard = generation.lock(bucket_index);

            if self.generation.load(Ordering::Acquire, guard) != generation_ptr {
                continue;
            }

            let previous = shard.bucket_mut(bucket_index).remove(key);

            if previous.is_some() {
                self.len.fetch_sub(1, Ordering::Relaxed);
            }

            return previous;
        }
    }

    /// Builds, fills, and publishes the successor of the current
    /// generation.
    ///
    /// Must only be called by the thread that flipped `self.resizing` from
    /// clear to set; that claim is what keeps concurrent load-factor
    /// breaches from growing the table more than once.
    fn resize(&self, guard: &Guard)
    where
        K: Clone,
        V: Clone,
    {
        #[cfg(test)]
        {
            assert_eq!(self.resizes_in_flight.fetch_add(1, Ordering::SeqCst), 0);
        }

        let (generation_ptr, generation) = self.current(guard);
        let shards = generation.lock_all();

        if self.generation.load(Ordering::Acquire, guard) != generation_ptr {
            // a newer generation is already live; the growth this claim
            // was for has happened
            #[cfg(test)]
            self.resizes_in_flight.fetch_sub(1, Ordering::SeqCst);

            self.resizing.store(false, Ordering::Release);

            return;
        }

        let new_concurrency = if self.grow_concurrency {
            cmp::min(2 * generation.concurrency(), MAX_CONCURRENCY)
        } else {
            generation.concurrency()
        };
        let new_bucket_count = 2 * generation.bucket_count() + 1;

        let mut next = Generation::with_concurrency_and_capacity(new_concurrency, new_bucket_count);

        // every writer is excluded by the held shard locks and every entry
        // re-hashes against the new bucket count; entries are cloned, not
        // moved, since late readers may still scan the old generation
        for shard in shards.iter() {
            for bucket in shard.iter() {
                for (key, value) in bucket.entries() {
                    let hash = bucket::hash(&self.build_hasher, key);
                    next.seed(hash, key.clone(), value.clone());
                }
            }
        }

        let previous = self.generation.swap(Owned::new(next), Ordering::AcqRel, guard);
        unsafe { generation::defer_acquire_destroy(guard, previous) };

        #[cfg(test)]
        {
            self.resizes_completed.fetch_add(1, Ordering::SeqCst);
            self.resizes_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        self.resizing.store(false, Ordering::Release);
    }

    fn current<'g>(
        &self,
        guard: &'g Guard,
    ) -> (Shared<'g, Generation<K, V>>, &'g Generation<K, V>) {
        let generation_ptr = self.generation.load_consume(guard);

        // the constructor installs a generation and publication only ever
        // swaps in another one, so the pointer is never null
        (generation_ptr, unsafe { generation_ptr.deref() })
    }

    #[cfg(test)]
    pub(crate) fn bucket_count(&self) -> usize {
        let guard = &crossbeam_epoch::pin();
        self.current(guard).1.bucket_count()
    }

    #[cfg(test)]
    pub(crate) fn resizes_completed(&self) -> usize {
        self.resizes_completed.load(Ordering::SeqCst)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher, const MAX_LOAD_FACTOR: usize> Drop
    for HashMap<K, V, S, MAX_LOAD_FACTOR>
{
    fn drop(&mut self) {
        // ensure all loads have the most recent data available
        atomic::fence(Ordering::Acquire);

        // relaxed ordering is fine for the swap itself: drop takes a
        // mutable reference, so no other thread can hold a reference to
        // the map
        let guard = unsafe { crossbeam_epoch::unprotected() };
        let generation_ptr = self.generation.swap(Shared::null(), Ordering::Relaxed, guard);

        assert!(!generation_ptr.is_null());

        mem::drop(unsafe { generation_ptr.into_owned() });
    }
}
