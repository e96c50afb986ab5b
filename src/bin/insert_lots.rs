use clt::HashMap;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

// soak test: hammer inserts over a rolling key range for a few seconds so
// the table grows under contention, then check nothing was lost
fn main() {
    const NUM_THREADS: usize = 64;
    const KEY_RANGE: usize = 1 << 20;

    let keep_running = Arc::new(AtomicBool::new(true));
    let map = Arc::new(HashMap::with_concurrency(NUM_THREADS));
    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let keep_running = Arc::clone(&keep_running);
            let map = Arc::clone(&map);

            thread::spawn(move || {
                let mut key = i;

                while keep_running.load(Ordering::Relaxed) {
                    map.insert(key % KEY_RANGE, key);
                    key += NUM_THREADS;
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_secs(5));
    keep_running.store(false, Ordering::Relaxed);

    for result in threads.into_iter().map(|t| t.join()) {
        assert!(result.is_ok());
    }

    println!("{} entries", map.len());
}
