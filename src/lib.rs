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

//! A resizeable concurrent hash map with striped locking.
//!
//! Buckets are chained and grouped into shards, one mutex per shard, so
//! threads working on different key ranges never contend. Growing the
//! table never blocks unrelated keys: the resizing thread takes every
//! shard lock of the current table snapshot (a *generation*), re-hashes
//! the entries into a larger snapshot, and publishes it with one atomic
//! pointer swap; writers that raced the swap notice and retry against the
//! new generation. Superseded generations are reclaimed with
//! [`crossbeam_epoch`] once the last reader is done with them.
//!
//! The whole-table lock acquisition lives in [`lock::lock_all`] and does
//! not impose a lock ordering on per-key operations; see its
//! documentation for the rotation scheme that keeps it deadlock-free.
//!
//! # Examples
//!
//! ```
//! let map = clt::HashMap::with_concurrency(4);
//!
//! map.insert("foo", 1);
//! assert_eq!(map.get("foo"), Some(1));
//!
//! map.remove("foo");
//! assert_eq!(map.get("foo"), None);
//! ```

pub mod lock;
pub mod map;

pub use map::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
    };

    use map::DefaultHashBuilder;

    const ITERATIONS: i32 = 100_000;

    fn poll_for(map: &HashMap<i32, String>, key: i32) -> String {
        loop {
            if let Some(value) = map.get(&key) {
                return value;
            }

            std::hint::spin_loop();
        }
    }

    fn five_thread_scenario(map: HashMap<i32, String>) {
        let map = Arc::new(map);

        let reader_a = {
            let map = Arc::clone(&map);

            thread::spawn(move || {
                for idx in 0..ITERATIONS {
                    assert_eq!(poll_for(&map, idx), format!("AAAAAAA = {}", idx));
                }
            })
        };

        let reader_b = {
            let map = Arc::clone(&map);

            thread::spawn(move || {
                for idx in ITERATIONS..2 * ITERATIONS {
                    assert_eq!(poll_for(&map, idx), format!("BBBBBBB = {}", idx));
                }
            })
        };

        let writer_a = {
            let map = Arc::clone(&map);

            thread::spawn(move || {
                for idx in 0..ITERATIONS {
                    map.insert(idx, format!("AAAAAAA = {}", idx));
                }
            })
        };

        let writer_b = {
            let map = Arc::clone(&map);

            thread::spawn(move || {
                for idx in ITERATIONS..2 * ITERATIONS {
                    map.insert(idx, format!("BBBBBBB = {}", idx));
                }
            })
        };

        let writer_c = {
            let map = Arc::clone(&map);

            thread::spawn(move || {
                for idx in 2 * ITERATIONS..3 * ITERATIONS {
                    map.insert(idx, format!("CCCCCCC = {}", idx));
                }
            })
        };

        for handle in [reader_a, reader_b, writer_a, writer_b, writer_c] {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), 3 * ITERATIONS as usize);
    }

    #[test]
    fn parallel_write_read_values() {
        five_thread_scenario(HashMap::with_concurrency_and_capacity(64, 256));
    }

    #[test]
    fn parallel_write_read_values_with_fixed_concurrency() {
        let map = HashMap::with_concurrency_capacity_and_hasher(
            256,
            256,
            false,
            DefaultHashBuilder::default(),
        );

        five_thread_scenario(map);
    }

    #[test]
    fn fixed_concurrency_never_grows_locks() {
        let map: HashMap<i32, i32> =
            HashMap::with_concurrency_capacity_and_hasher(4, 4, false, DefaultHashBuilder::default());

        for i in 0..4096 {
            map.insert(i, i);
        }

        assert_eq!(map.concurrency(), 4);
        assert!(map.capacity() > 16);
    }

    #[test]
    fn parallel_write_remove_read_values() {
        let map = Arc::new(HashMap::with_concurrency_and_capacity(64, 256));
        let reader_is_done = Arc::new(AtomicBool::new(false));

        let reader = {
            let map = Arc::clone(&map);
            let reader_is_done = Arc::clone(&reader_is_done);

            thread::spawn(move || {
                for idx in 0..ITERATIONS {
                    assert_eq!(poll_for(&map, idx), format!("AAAAAAA = {}", idx));
                }

                reader_is_done.store(true, Ordering::Relaxed);
            })
        };

        let writer = {
            let map = Arc::clone(&map);
            let reader_is_done = Arc::clone(&reader_is_done);

            thread::spawn(move || {
                while !reader_is_done.load(Ordering::Relaxed) {
                    for idx in 0..ITERATIONS {
                        map.insert(idx, format!("AAAAAAA = {}", idx));
                        map.remove(&(idx - 20));
                    }
                }
            })
        };

        reader.join().unwrap();
        writer.join().unwrap();
    }
}
