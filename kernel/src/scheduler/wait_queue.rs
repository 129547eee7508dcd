// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::thread::ThreadNode;
use alloc::vec::Vec;

struct WaitEntry {
    thread: ThreadNode,
    seq: u64,
}

/// Blocked threads ordered by effective priority, FIFO within a level.
/// The insertion stamp keeps ties deterministic even after priorities
/// drift while waiting.
pub(crate) struct WaitQueue {
    entries: Vec<WaitEntry>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert_by_priority(&mut self, thread: ThreadNode, seq: u64) {
        let priority = thread.priority();
        let at = self
            .entries
            .iter()
            .position(|e| e.thread.priority() < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, WaitEntry { thread, seq });
    }

    /// Take the highest-priority waiter. Priorities may have changed
    /// since insertion, so order is re-established first.
    pub fn pop_highest(&mut self) -> Option<ThreadNode> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.sort_by(|a, b| {
            b.thread
                .priority()
                .cmp(&a.thread.priority())
                .then(a.seq.cmp(&b.seq))
        });
        Some(self.entries.remove(0).thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{refresh_priority, Thread, ThreadKind, ThreadNode};
    use alloc::sync::Arc;
    use teal_platform::Context;

    fn stub(tid: usize, priority: u8) -> ThreadNode {
        Arc::new(Thread::new(
            tid,
            "stub",
            ThreadKind::Normal,
            priority,
            Context::bootstrap(),
        ))
    }

    #[test]
    fn pops_highest_first_fifo_ties() {
        let mut w = WaitQueue::new();
        w.insert_by_priority(stub(1, 31), 1);
        w.insert_by_priority(stub(2, 40), 2);
        w.insert_by_priority(stub(3, 31), 3);
        assert_eq!(w.pop_highest().unwrap().tid(), 2);
        assert_eq!(w.pop_highest().unwrap().tid(), 1);
        assert_eq!(w.pop_highest().unwrap().tid(), 3);
        assert!(w.pop_highest().is_none());
    }

    #[test]
    fn reorders_after_priority_drift() {
        let mut w = WaitQueue::new();
        let sleeper = stub(1, 10);
        w.insert_by_priority(sleeper.clone(), 1);
        w.insert_by_priority(stub(2, 30), 2);
        // The low waiter gets a donation while queued.
        sleeper.set_base_priority(50);
        refresh_priority(&sleeper);
        assert_eq!(w.pop_highest().unwrap().tid(), 1);
        assert_eq!(w.pop_highest().unwrap().tid(), 2);
    }
}
