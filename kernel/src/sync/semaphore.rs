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

use crate::{
    irq::IrqGuard,
    scheduler::{self, Sched, WaitQueue},
    startup::{Kernel, KernelRef},
};
use alloc::sync::{Arc, Weak};
use core::cell::{Cell, RefCell};

/// Counting semaphore. Waiters park in effective-priority order and the
/// highest is woken on `up`.
pub struct Semaphore {
    kernel: Weak<Kernel>,
    value: Cell<usize>,
    waiters: RefCell<WaitQueue>,
}

// Interior state is only touched inside the scheduler's critical section.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub fn new(k: &KernelRef, value: usize) -> Self {
        Self::with_kernel(Arc::downgrade(k), value)
    }

    pub(crate) fn with_kernel(kernel: Weak<Kernel>, value: usize) -> Self {
        Self {
            kernel,
            value: Cell::new(value),
            waiters: RefCell::new(WaitQueue::new()),
        }
    }

    fn kernel(&self) -> KernelRef {
        self.kernel.upgrade().expect("kernel context is gone")
    }

    pub fn value(&self) -> usize {
        let k = self.kernel();
        let _g = k.sched.lock();
        self.value.get()
    }

    /// Down or "P". Sleeps until the value is positive, then takes one.
    /// Must not be called in interrupt context; interrupts may be off,
    /// in which case the next scheduled thread turns them back on.
    pub fn down(&self) {
        let k = self.kernel();
        let mut g = k.sched.lock();
        assert!(!g.in_interrupt, "semaphore down in interrupt context");
        while self.value.get() == 0 {
            let cur = g.current().clone();
            let seq = g.next_seq();
            self.waiters.borrow_mut().insert_by_priority(cur, seq);
            g = scheduler::block_current(&k, g);
        }
        self.value.set(self.value.get() - 1);
    }

    /// Down only if that needs no waiting. Safe in interrupt context.
    pub fn try_down(&self) -> bool {
        let k = self.kernel();
        let mut g = k.sched.lock();
        self.try_down_locked(&mut g)
    }

    /// Up or "V". Wakes the highest-priority waiter, then lets it take
    /// the CPU if it outranks the caller. Safe in interrupt context.
    pub fn up(&self) {
        let k = self.kernel();
        let mut g = k.sched.lock();
        self.up_locked(&mut g);
        scheduler::preempt_if_needed(&k, g);
    }

    pub(crate) fn try_down_locked(&self, _sched: &mut Sched) -> bool {
        if self.value.get() == 0 {
            return false;
        }
        self.value.set(self.value.get() - 1);
        true
    }

    /// The wait side of `down` for callers composing larger primitives:
    /// queue the current thread and park it once, without looping on the
    /// value.
    pub(crate) fn wait_locked<'a>(
        &self,
        k: &'a Kernel,
        mut g: IrqGuard<'a, Sched>,
    ) -> IrqGuard<'a, Sched> {
        let cur = g.current().clone();
        let seq = g.next_seq();
        self.waiters.borrow_mut().insert_by_priority(cur, seq);
        scheduler::block_current(k, g)
    }

    pub(crate) fn up_locked(&self, sched: &mut Sched) {
        self.value.set(self.value.get() + 1);
        // Donor priorities may have moved while waiters slept, so the
        // queue re-sorts before the front is taken.
        let woken = self.waiters.borrow_mut().pop_highest();
        if let Some(t) = woken {
            scheduler::unblock(sched, t);
        }
    }
}
