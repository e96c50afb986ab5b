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

//! Deadlock-free acquisition of a whole slice of mutexes.

use std::mem;

use crossbeam_utils::Backoff;
use parking_lot::{Mutex, MutexGuard};

/// Acquires every mutex in `locks`, returning the guards in index order.
///
/// No global lock ordering is imposed on other users of `locks`: this
/// function coexists with threads that acquire any single mutex, blocking
/// or not, as long as no other thread ever holds two of them at once.
///
/// One mutex, the anchor, is acquired blocking, then the rest are
/// try-locked in rotating order starting just past the anchor. A failed
/// try-lock releases everything taken during that rotation (the anchor is
/// kept) and the rotation restarts; if the very first slot past the anchor
/// is the one that fails, the anchor is released as well and the procedure
/// restarts anchored at the next index. Every pass either grows the held
/// set or advances the anchor, so the acquisition eventually succeeds;
/// latency under contention is traded for freedom from a global order.
///
/// Guards may be dropped in any order. Since no other holder ever takes a
/// second lock while owning one, release order cannot create a cycle.
///
/// # Panics
///
/// Panics if `locks` is empty.
pub fn lock_all<T>(locks: &[Mutex<T>]) -> Vec<MutexGuard<'_, T>> {
    assert!(!locks.is_empty());

    let len = locks.len();
    let backoff = Backoff::new();
    let mut anchor = 0;

    loop {
        let mut held: Vec<Option<MutexGuard<'_, T>>> = Vec::with_capacity(len);
        held.resize_with(len, || None);
        held[anchor] = Some(locks[anchor].lock());

        loop {
            let mut blocked_at = None;

            for offset in 1..len {
                let index = (anchor + offset) % len;

                match locks[index].try_lock() {
                    Some(guard) => held[index] = Some(guard),
                    None => {
                        blocked_at = Some(offset);
                        break;
                    }
                }
            }

            match blocked_at {
                None => return held.into_iter().map(|guard| guard.unwrap()).collect(),
                Some(offset) => {
                    for taken in 1..offset {
                        held[(anchor + taken) % len] = None;
                    }

                    if offset == 1 {
                        break;
                    }
                }
            }
        }

        // the slot right past the anchor is busy; release the anchor,
        // rotate onto the busy slot, and let whoever holds it finish first
        mem::drop(held);
        anchor = (anchor + 1) % len;
        backoff.snooze();
    }
}
