//! Deadline queue keyed by path
//!
//! Each path has at most one live deadline. Rescheduling pushes a fresh heap
//! entry and leaves the old one behind; stale entries are recognized by
//! their sequence number and discarded when they reach the top.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct DebounceQueue {
    heap: BinaryHeap<Reverse<(Instant, u64, PathBuf)>>,
    live: HashMap<PathBuf, (Instant, u64)>,
    seq: u64,
}

impl DebounceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `path`'s deadline to `due`, replacing any earlier one.
    pub fn schedule(&mut self, path: PathBuf, due: Instant) {
        self.seq += 1;
        self.live.insert(path.clone(), (due, self.seq));
        self.heap.push(Reverse((due, self.seq, path)));
    }

    /// Push `path`'s deadline to `due` only if it is already pending.
    /// Returns whether it was.
    pub fn extend(&mut self, path: &Path, due: Instant) -> bool {
        if !self.live.contains_key(path) {
            return false;
        }
        self.schedule(path.to_path_buf(), due);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.live.contains_key(path)
    }

    /// Earliest live deadline.
    pub fn next_due(&mut self) -> Option<Instant> {
        self.drop_stale();
        self.heap.peek().map(|Reverse((due, _, _))| *due)
    }

    /// Remove and return every path whose deadline is at or before `now`,
    /// earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready = Vec::new();
        while let Some(due) = self.next_due() {
            if due > now {
                break;
            }
            if let Some(Reverse((_, _, path))) = self.heap.pop() {
                self.live.remove(&path);
                ready.push(path);
            }
        }
        ready
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn drop_stale(&mut self) {
        loop {
            let stale = match self.heap.peek() {
                Some(Reverse((_, seq, path))) => {
                    self.live.get(path).is_none_or(|(_, live)| live != seq)
                }
                None => false,
            };
            if !stale {
                break;
            }
            self.heap.pop();
        }
    }
}
