use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const PRUNE_THRESHOLD: usize = 256;

/// Hands out one mutex per song id so writes to the same song never
/// interleave, while different songs proceed in parallel.
#[derive(Default)]
pub struct IdLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdLocks {
    pub fn get(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.len() > PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(id.to_string()).or_default())
    }
}
