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

//! Owner-tracked mutex with priority donation. A thread blocked here
//! lends its effective priority to the holder, transitively through
//! whatever locks the holder itself is waiting on. Non-recursive; only
//! the holder may release.

use crate::{
    scheduler,
    startup::{Kernel, KernelRef},
    sync::Semaphore,
    thread::{self, ThreadNode},
};
use alloc::sync::{Arc, Weak};
use core::cell::RefCell;

pub struct Mutex {
    kernel: Weak<Kernel>,
    weak_self: Weak<Mutex>,
    sema: Semaphore,
    owner: RefCell<Option<ThreadNode>>,
}

// Owner and donation bookkeeping are only touched inside the scheduler's
// critical section.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub fn new(k: &KernelRef) -> Arc<Self> {
        Self::with_kernel(Arc::downgrade(k))
    }

    pub(crate) fn with_kernel(kernel: Weak<Kernel>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            sema: Semaphore::with_kernel(kernel.clone(), 1),
            kernel,
            weak_self: weak_self.clone(),
            owner: RefCell::new(None),
        })
    }

    fn kernel(&self) -> KernelRef {
        self.kernel.upgrade().expect("kernel context is gone")
    }

    pub(crate) fn holder_locked(&self) -> Option<ThreadNode> {
        self.owner.borrow().clone()
    }

    pub fn holder(&self) -> Option<ThreadNode> {
        let k = self.kernel();
        let _g = k.sched.lock();
        self.owner.borrow().clone()
    }

    pub fn held_by_current(&self) -> bool {
        let k = self.kernel();
        let g = k.sched.lock();
        let cur = g.current().clone();
        let held = self
            .owner
            .borrow()
            .as_ref()
            .map(|h| Arc::ptr_eq(h, &cur))
            .unwrap_or(false);
        drop(g);
        held
    }

    /// Acquire, donating priority to the holder while waiting.
    pub fn lock(&self) {
        let k = self.kernel();
        let mut g = k.sched.lock();
        assert!(!g.in_interrupt, "lock acquire in interrupt context");
        let cur = g.current().clone();
        if let Some(holder) = self.owner.borrow().as_ref() {
            if Arc::ptr_eq(holder, &cur) {
                panic!("thread '{}' re-acquired a lock it holds", cur.name());
            }
        }
        while !self.sema.try_down_locked(&mut g) {
            let holder = self
                .owner
                .borrow()
                .clone()
                .expect("contended lock has no holder");
            *cur.waiting_on.borrow_mut() = Some(self.weak_self.clone());
            holder.donors.borrow_mut().push(cur.clone());
            thread::donate_along_chain(&mut g, &cur);
            g = self.sema.wait_locked(&k, g);
            // Woken by a release (or outraced by another acquirer). The
            // releaser already dropped our donation edge.
            *cur.waiting_on.borrow_mut() = None;
        }
        *self.owner.borrow_mut() = Some(cur);
    }

    pub fn try_lock(&self) -> bool {
        let k = self.kernel();
        let mut g = k.sched.lock();
        let cur = g.current().clone();
        if !self.sema.try_down_locked(&mut g) {
            return false;
        }
        *self.owner.borrow_mut() = Some(cur);
        true
    }

    /// Release. Donations received through this lock are returned before
    /// the next waiter is woken.
    pub fn unlock(&self) {
        let k = self.kernel();
        let mut g = k.sched.lock();
        let cur = g.current().clone();
        {
            let owner = self.owner.borrow();
            match owner.as_ref() {
                Some(holder) if Arc::ptr_eq(holder, &cur) => {}
                Some(_) => panic!(
                    "thread '{}' released a lock it does not hold",
                    cur.name()
                ),
                None => panic!("released a lock that is not held"),
            }
        }
        cur.donors.borrow_mut().retain(|donor| {
            let donates_through_us = donor
                .waiting_on
                .borrow()
                .as_ref()
                .map(|w| Weak::ptr_eq(w, &self.weak_self))
                .unwrap_or(false);
            !donates_through_us
        });
        thread::refresh_priority(&cur);
        *self.owner.borrow_mut() = None;
        self.sema.up_locked(&mut g);
        scheduler::preempt_if_needed(&k, g);
    }
}
