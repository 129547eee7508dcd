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
use alloc::{collections::VecDeque, sync::Arc};

/// Runnable threads, highest effective priority first. Insertion goes
/// after every thread of equal priority, so dispatch is FIFO within a
/// priority level. Linear; the queues stay short.
pub(crate) struct ReadyQueue {
    queue: VecDeque<ThreadNode>,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, t: ThreadNode) {
        let priority = t.priority();
        let at = self
            .queue
            .iter()
            .position(|queued| queued.priority() < priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, t);
    }

    pub fn pop_front(&mut self) -> Option<ThreadNode> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<&ThreadNode> {
        self.queue.front()
    }

    /// Re-establish order after a member's priority changed under it.
    pub fn reposition(&mut self, t: &ThreadNode) {
        if let Some(at) = self.queue.iter().position(|queued| Arc::ptr_eq(queued, t)) {
            let node = self.queue.remove(at).expect("position lied");
            self.push(node);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{Thread, ThreadKind};
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
    fn orders_by_descending_priority() {
        let mut q = ReadyQueue::new();
        q.push(stub(1, 10));
        q.push(stub(2, 40));
        q.push(stub(3, 20));
        assert_eq!(q.pop_front().unwrap().priority(), 40);
        assert_eq!(q.pop_front().unwrap().priority(), 20);
        assert_eq!(q.pop_front().unwrap().priority(), 10);
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut q = ReadyQueue::new();
        q.push(stub(1, 31));
        q.push(stub(2, 31));
        q.push(stub(3, 31));
        assert_eq!(q.pop_front().unwrap().tid(), 1);
        assert_eq!(q.pop_front().unwrap().tid(), 2);
        assert_eq!(q.pop_front().unwrap().tid(), 3);
    }

    #[test]
    fn higher_arrival_goes_ahead_of_lower_but_behind_equal() {
        let mut q = ReadyQueue::new();
        q.push(stub(1, 31));
        q.push(stub(2, 20));
        q.push(stub(3, 31));
        let order: alloc::vec::Vec<usize> = core::iter::from_fn(|| q.pop_front())
            .map(|t| t.tid())
            .collect();
        assert_eq!(order, [1, 3, 2]);
    }

    #[test]
    fn reposition_follows_priority_change() {
        let mut q = ReadyQueue::new();
        let low = stub(1, 10);
        q.push(low.clone());
        q.push(stub(2, 30));
        assert_eq!(q.front().unwrap().tid(), 2);
        // Donation bumps the low thread while it sits in the queue.
        low.set_base_priority(45);
        crate::thread::refresh_priority(&low);
        q.reposition(&low);
        assert_eq!(q.front().unwrap().tid(), 1);
        assert_eq!(q.len(), 2);
    }
}
