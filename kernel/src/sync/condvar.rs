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

//! Mesa-style condition variable. Signalling does not hand over the
//! lock; a woken waiter re-acquires it and must re-check its predicate.

use crate::{
    startup::{Kernel, KernelRef},
    sync::{Mutex, Semaphore},
    thread::ThreadNode,
};
use alloc::{
    sync::{Arc, Weak},
    vec::Vec,
};
use core::cell::RefCell;

struct CondWaiter {
    thread: ThreadNode,
    wake: Arc<Semaphore>,
}

pub struct Condvar {
    kernel: Weak<Kernel>,
    waiters: RefCell<Vec<CondWaiter>>,
}

// The waiter list is only touched inside the scheduler's critical
// section.
unsafe impl Send for Condvar {}
unsafe impl Sync for Condvar {}

impl Condvar {
    pub fn new(k: &KernelRef) -> Self {
        Self {
            kernel: Arc::downgrade(k),
            waiters: RefCell::new(Vec::new()),
        }
    }

    fn kernel(&self) -> KernelRef {
        self.kernel.upgrade().expect("kernel context is gone")
    }

    /// Atomically release `lock` and wait for a signal, then re-acquire.
    pub fn wait(&self, lock: &Mutex) {
        let k = self.kernel();
        let wake = Arc::new(Semaphore::new(&k, 0));
        {
            let g = k.sched.lock();
            let cur = g.current().clone();
            assert!(
                lock.holder_locked()
                    .map(|h| Arc::ptr_eq(&h, &cur))
                    .unwrap_or(false),
                "condvar wait without holding the lock"
            );
            self.waiters.borrow_mut().push(CondWaiter {
                thread: cur,
                wake: wake.clone(),
            });
            drop(g);
        }
        lock.unlock();
        wake.down();
        lock.lock();
    }

    /// Wake the waiter whose thread has the highest effective priority
    /// right now.
    pub fn signal(&self, lock: &Mutex) {
        if let Some(picked) = self.take_best(lock) {
            picked.wake.up();
        }
    }

    pub fn broadcast(&self, lock: &Mutex) {
        while let Some(picked) = self.take_best(lock) {
            picked.wake.up();
        }
    }

    fn take_best(&self, lock: &Mutex) -> Option<CondWaiter> {
        let k = self.kernel();
        let g = k.sched.lock();
        let cur = g.current().clone();
        assert!(
            lock.holder_locked()
                .map(|h| Arc::ptr_eq(&h, &cur))
                .unwrap_or(false),
            "condvar signal without holding the lock"
        );
        let mut waiters = self.waiters.borrow_mut();
        let mut best: Option<usize> = None;
        for (at, w) in waiters.iter().enumerate() {
            let better = match best {
                None => true,
                Some(b) => w.thread.priority() > waiters[b].thread.priority(),
            };
            if better {
                best = Some(at);
            }
        }
        best.map(|at| waiters.remove(at))
    }
}
