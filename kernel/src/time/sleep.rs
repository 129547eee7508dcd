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
use alloc::collections::VecDeque;

/// Sleeping threads ordered by wake tick, FIFO among equal ticks. The
/// thread's `wake_tick` field is set before insertion.
pub(crate) struct SleepQueue {
    queue: VecDeque<ThreadNode>,
}

impl SleepQueue {
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, t: ThreadNode) {
        let wake = t.wake_tick.get();
        let at = self
            .queue
            .iter()
            .position(|queued| queued.wake_tick.get() > wake)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, t);
    }

    /// The front sleeper, if due.
    pub fn pop_expired(&mut self, now: u64) -> Option<ThreadNode> {
        if self.queue.front()?.wake_tick.get() <= now {
            self.queue.pop_front()
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{Thread, ThreadKind, ThreadNode};
    use alloc::sync::Arc;
    use teal_platform::Context;

    fn sleeper(tid: usize, wake: u64) -> ThreadNode {
        let t = Arc::new(Thread::new(
            tid,
            "sleeper",
            ThreadKind::Normal,
            31,
            Context::bootstrap(),
        ));
        t.wake_tick.set(wake);
        t
    }

    #[test]
    fn wakes_in_tick_order_fifo_ties() {
        let mut q = SleepQueue::new();
        q.push(sleeper(1, 10));
        q.push(sleeper(2, 5));
        q.push(sleeper(3, 10));
        assert!(q.pop_expired(4).is_none());
        assert_eq!(q.pop_expired(5).unwrap().tid(), 2);
        assert!(q.pop_expired(9).is_none());
        assert_eq!(q.pop_expired(12).unwrap().tid(), 1);
        assert_eq!(q.pop_expired(12).unwrap().tid(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn drains_everything_due_at_once() {
        let mut q = SleepQueue::new();
        for tid in 0..4 {
            q.push(sleeper(tid, 3));
        }
        let mut woken = 0;
        while q.pop_expired(3).is_some() {
            woken += 1;
        }
        assert_eq!(woken, 4);
    }
}
