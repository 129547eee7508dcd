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

//! Dispatch. Owns the running thread pointer, the ready queue, the sleep
//! queue and the destruction queue, all behind the kernel's interrupt
//! lock. Exactly one thread is Running; the idle thread runs when the
//! ready queue is empty and is never queued itself.

use crate::{
    irq::IrqGuard,
    startup::Kernel,
    thread::{self, ThreadNode},
    time::sleep::SleepQueue,
    zombie::ZombieQueue,
};
use alloc::sync::Arc;
use teal_platform::Context;

mod idle;
mod ready_queue;
mod wait_queue;

pub(crate) use idle::idle_loop;
pub(crate) use ready_queue::ReadyQueue;
pub(crate) use wait_queue::WaitQueue;

pub(crate) struct Sched {
    pub(crate) ready: ReadyQueue,
    pub(crate) sleepers: SleepQueue,
    current: Option<ThreadNode>,
    idle: Option<ThreadNode>,
    pub(crate) zombies: ZombieQueue,
    pub(crate) ticks: u64,
    pub(crate) slice: u64,
    pub(crate) in_interrupt: bool,
    pub(crate) yield_pending: bool,
    seq: u64,
}

impl Sched {
    pub(crate) fn new() -> Self {
        Self {
            ready: ReadyQueue::new(),
            sleepers: SleepQueue::new(),
            current: None,
            idle: None,
            zombies: ZombieQueue::new(),
            ticks: 0,
            slice: 0,
            in_interrupt: false,
            yield_pending: false,
            seq: 0,
        }
    }

    pub(crate) fn current(&self) -> &ThreadNode {
        self.current.as_ref().expect("scheduler not started")
    }

    pub(crate) fn set_current(&mut self, t: ThreadNode) {
        self.current = Some(t);
    }

    fn take_current(&mut self) -> ThreadNode {
        self.current.take().expect("scheduler not started")
    }

    pub(crate) fn idle_thread(&self) -> ThreadNode {
        self.idle.clone().expect("no idle thread")
    }

    pub(crate) fn set_idle(&mut self, t: ThreadNode) {
        self.idle = Some(t);
    }

    /// Monotone stamp used to keep FIFO order among equal-priority
    /// waiters.
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn pop_expired(&mut self, now: u64) -> Option<ThreadNode> {
        self.sleepers.pop_expired(now)
    }
}

/// Switch away from the current thread. The caller has already moved it
/// out of Running and parked it wherever it belongs (ready queue, a wait
/// list, the sleep queue). Returns with the lock re-taken once the
/// calling thread is dispatched again.
fn schedule<'a>(k: &'a Kernel, mut g: IrqGuard<'a, Sched>) -> IrqGuard<'a, Sched> {
    let prev = g.take_current();
    let next = match g.ready.pop_front() {
        Some(t) => t,
        None => g.idle_thread(),
    };
    g.slice = 0;
    assert!(next.transfer_state(thread::READY, thread::RUNNING));
    k.note_running(&next);
    g.set_current(next.clone());
    if Arc::ptr_eq(&prev, &next) {
        return g;
    }
    #[cfg(feature = "debugging_scheduler")]
    log::trace!(
        "switch {} (pri {}) -> {} (pri {})",
        prev.name(),
        prev.priority(),
        next.name(),
        next.priority()
    );
    if let Some(vm) = next.address_space() {
        vm.activate();
    }
    drop(g);
    Context::switch(prev.context(), next.context());
    // Dispatched again. First act on the way back in: free whatever died
    // while we were off the CPU.
    let mut g = k.sched.lock();
    g.zombies.reclaim();
    g
}

/// Requeue the current thread and dispatch. The idle thread goes back
/// to its standby slot instead of the queue.
fn yield_current<'a>(k: &'a Kernel, mut g: IrqGuard<'a, Sched>) -> IrqGuard<'a, Sched> {
    let cur = g.current().clone();
    assert!(cur.transfer_state(thread::RUNNING, thread::READY));
    if !cur.is_idle() {
        g.ready.push(cur);
    }
    schedule(k, g)
}

/// Voluntarily give up the CPU, staying runnable.
pub fn yield_me(k: &Kernel) {
    let g = k.sched.lock();
    assert!(!g.in_interrupt, "yield inside an interrupt handler");
    let g = yield_current(k, g);
    drop(g);
}

/// Park the current thread. It must already sit in the wait structure it
/// will be woken from; it runs again only after an explicit unblock.
pub(crate) fn block_current<'a>(k: &'a Kernel, g: IrqGuard<'a, Sched>) -> IrqGuard<'a, Sched> {
    assert!(!g.in_interrupt, "block inside an interrupt handler");
    let cur = g.current().clone();
    assert!(!cur.is_idle(), "the idle thread cannot block");
    assert!(cur.transfer_state(thread::RUNNING, thread::BLOCKED));
    schedule(k, g)
}

/// Make a blocked thread runnable. Deliberately does not preempt; callers
/// that want preemption follow up with `preempt_if_needed`.
pub(crate) fn unblock(sched: &mut Sched, t: ThreadNode) {
    assert!(
        t.transfer_state(thread::BLOCKED, thread::READY),
        "unblocking a thread that is not blocked"
    );
    sched.ready.push(t);
}

/// Give way if the front of the ready queue strictly outranks the
/// current thread. Inside an interrupt handler the yield is deferred to
/// the handler's return path.
pub(crate) fn preempt_if_needed<'a>(k: &'a Kernel, mut g: IrqGuard<'a, Sched>) {
    let cur_pri = g.current().priority();
    let front_pri = match g.ready.front() {
        Some(t) => t.priority(),
        None => return,
    };
    if front_pri <= cur_pri {
        return;
    }
    if g.in_interrupt {
        g.yield_pending = true;
        return;
    }
    let g = yield_current(k, g);
    drop(g);
}

/// Terminate the current thread. The object goes on the destruction
/// queue; the next scheduling pass frees it. A thread never frees its
/// own stack.
pub(crate) fn retire_me(k: &Kernel) -> ! {
    let mut g = k.sched.lock();
    let prev = g.take_current();
    assert!(!prev.is_idle(), "the idle thread cannot exit");
    assert!(prev.transfer_state(thread::RUNNING, thread::DYING));
    g.zombies.push(prev);
    let next = match g.ready.pop_front() {
        Some(t) => t,
        None => g.idle_thread(),
    };
    g.slice = 0;
    assert!(next.transfer_state(thread::READY, thread::RUNNING));
    k.note_running(&next);
    g.set_current(next.clone());
    if let Some(vm) = next.address_space() {
        vm.activate();
    }
    let resume = next.context().resume_handle();
    drop(next);
    drop(g);
    resume.handoff()
}
