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

use std::{
    borrow::Borrow,
    hash::{BuildHasher, Hash, Hasher},
    mem,
};

/// A chain of entries sharing a bucket index.
///
/// Buckets perform no synchronization of their own; callers must hold the
/// owning shard's lock, which the guard types in
/// [`generation`](super::generation) enforce. Entries are unordered and keys
/// are unique within a chain.
#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Eq, V> Bucket<K, V> {
    /// Returns a reference to the value associated with `key`, if any.
    pub(crate) fn get<Q: ?Sized + Eq>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.find(key).map(|i| &self.entries[i].1)
    }

    /// Inserts or overwrites the entry for `key`, returning the previous
    /// value and the length of the chain after the operation.
    ///
    /// The chain length is what the map's load-factor trigger inspects; it
    /// is returned here so the caller does not traverse the chain twice.
    pub(crate) fn insert(&mut self, key: K, value: V) -> (Option<V>, usize) {
        let previous = match self.find(&key) {
            Some(i) => Some(mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));

                None
            }
        };

        (previous, self.entries.len())
    }

    /// Removes the entry for `key`, returning its value.
    ///
    /// Removing an absent key is a no-op, not an error.
    pub(crate) fn remove<Q: ?Sized + Eq>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        self.find(key).map(|i| self.entries.swap_remove(i).1)
    }

    fn find<Q: ?Sized + Eq>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn entries(&self) -> impl Iterator<Item = &(K, V)> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) fn hash<K: ?Sized + Hash, H: BuildHasher>(build_hasher: &H, key: &K) -> u64 {
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);

    hasher.finish()
}
