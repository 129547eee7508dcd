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
    config,
    process::{ChildInfo, FdTable},
    scheduler::Sched,
    startup::KernelRef,
    sync::Mutex,
    types::{AtomicUint, ThreadPriority, Tid, Uint},
};
use alloc::{
    string::String,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{
    cell::{Cell, RefCell},
    sync::atomic::Ordering,
};
use teal_platform::{Context, File, VmSpace};

mod builder;
pub use builder::{spawn, Builder};
pub(crate) use builder::queue_ready;

pub type ThreadNode = Arc<Thread>;

pub const CREATED: Uint = 0;
pub const READY: Uint = 1;
pub const RUNNING: Uint = 2;
pub const BLOCKED: Uint = 3;
pub const DYING: Uint = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThreadKind {
    Normal,
    Idle,
}

/// A kernel thread, and for user processes the process as well: the user
/// parts (address space, fd table, exec image, child records) ride on the
/// thread object.
///
/// Everything below the `state` word is protected by the scheduler's
/// critical section; one thread touches another's fields only with
/// interrupts off.
pub struct Thread {
    tid: Tid,
    name: String,
    kind: ThreadKind,
    magic: u32,
    state: AtomicUint,
    context: Context,

    base_priority: Cell<ThreadPriority>,
    priority: Cell<ThreadPriority>,
    /// Threads blocked on any lock this thread holds.
    pub(crate) donors: RefCell<Vec<ThreadNode>>,
    /// The lock this thread is blocked on, if any. Non-owning: the lock
    /// outlives the wait by construction.
    pub(crate) waiting_on: RefCell<Option<Weak<Mutex>>>,
    pub(crate) wake_tick: Cell<u64>,

    pub(crate) exit_status: Cell<i32>,
    pub(crate) self_info: RefCell<Option<Arc<ChildInfo>>>,
    pub(crate) children: RefCell<Vec<Arc<ChildInfo>>>,
    pub(crate) vm: RefCell<Option<Arc<dyn VmSpace>>>,
    pub(crate) fds: RefCell<FdTable>,
    pub(crate) exec_file: RefCell<Option<Arc<dyn File>>>,
}

// Field access is serialized by the scheduler lock; the context hand-off
// orders accesses made from different host threads.
unsafe impl Send for Thread {}
unsafe impl Sync for Thread {}

impl Thread {
    pub(crate) fn new(
        tid: Tid,
        name: &str,
        kind: ThreadKind,
        priority: ThreadPriority,
        context: Context,
    ) -> Self {
        let mut name: String = name.into();
        name.truncate(config::THREAD_NAME_MAX);
        Self {
            tid,
            name,
            kind,
            magic: config::THREAD_MAGIC,
            state: AtomicUint::new(CREATED),
            context,
            base_priority: Cell::new(priority),
            priority: Cell::new(priority),
            donors: RefCell::new(Vec::new()),
            waiting_on: RefCell::new(None),
            wake_tick: Cell::new(0),
            exit_status: Cell::new(0),
            self_info: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            vm: RefCell::new(None),
            fds: RefCell::new(FdTable::new()),
            exec_file: RefCell::new(None),
        }
    }

    #[inline]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.kind == ThreadKind::Idle
    }

    #[inline]
    pub fn state(&self) -> Uint {
        self.state.load(Ordering::Relaxed)
    }

    pub fn state_to_str(&self) -> &str {
        match self.state() {
            CREATED => "created",
            READY => "ready",
            RUNNING => "running",
            BLOCKED => "blocked",
            DYING => "dying",
            _ => "unknown",
        }
    }

    #[inline]
    pub(crate) fn transfer_state(&self, from: Uint, to: Uint) -> bool {
        self.assert_alive();
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    /// Effective priority: the scheduler keys on this.
    #[inline]
    pub fn priority(&self) -> ThreadPriority {
        self.priority.get()
    }

    #[inline]
    pub fn base_priority(&self) -> ThreadPriority {
        self.base_priority.get()
    }

    #[inline]
    pub(crate) fn set_base_priority(&self, p: ThreadPriority) {
        self.base_priority.set(p);
    }

    #[inline]
    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub fn address_space(&self) -> Option<Arc<dyn VmSpace>> {
        self.vm.borrow().clone()
    }

    #[inline]
    pub(crate) fn assert_alive(&self) {
        assert_eq!(self.magic, config::THREAD_MAGIC, "thread object corrupted");
    }
}

/// Wrap the already-running boot flow of control into a thread object.
pub(crate) fn adopt_bootstrap(k: &KernelRef, name: &str) -> ThreadNode {
    let t = Arc::new(Thread::new(
        k.alloc_tid(),
        name,
        ThreadKind::Normal,
        config::PRI_DEFAULT,
        Context::bootstrap(),
    ));
    assert!(t.transfer_state(CREATED, RUNNING));
    t
}

/// The thread currently holding the CPU.
pub fn current(k: &KernelRef) -> ThreadNode {
    k.sched.lock().current().clone()
}

/// Recompute a thread's effective priority from its base and its donors.
pub(crate) fn refresh_priority(t: &ThreadNode) {
    let mut best = t.base_priority.get();
    for donor in t.donors.borrow().iter() {
        best = best.max(donor.priority());
    }
    t.priority.set(best);
}

/// Push a donor's priority down the chain of lock holders it is blocked
/// behind. The walk is bounded: running past the bound means the lock
/// graph is malformed, and the remainder is simply not updated.
pub(crate) fn donate_along_chain(sched: &mut Sched, donor: &ThreadNode) {
    let mut t = donor.clone();
    for _ in 0..config::DONATION_DEPTH {
        let lock = t.waiting_on.borrow().as_ref().and_then(Weak::upgrade);
        let Some(lock) = lock else {
            break;
        };
        let Some(holder) = lock.holder_locked() else {
            break;
        };
        if holder.is_idle() {
            break;
        }
        refresh_priority(&holder);
        if holder.state() == READY {
            sched.ready.reposition(&holder);
        }
        t = holder;
    }
}

/// Change a thread's base priority. Donated priority is unaffected. If
/// the target sits in the ready queue it is reordered; whenever the
/// change leaves a ready thread above the running one, the CPU changes
/// hands at once.
pub fn set_priority_of(k: &KernelRef, t: &ThreadNode, priority: ThreadPriority) {
    let priority = priority.min(config::PRI_MAX);
    let mut g = k.sched.lock();
    t.set_base_priority(priority);
    refresh_priority(t);
    if t.state() == READY {
        g.ready.reposition(t);
    }
    crate::scheduler::preempt_if_needed(k, g);
}

/// Change the current thread's base priority; gives way on the spot if
/// the effective priority drops below a ready thread's.
pub fn set_priority(k: &KernelRef, priority: ThreadPriority) {
    let cur = current(k);
    set_priority_of(k, &cur, priority);
}

pub fn get_priority(k: &KernelRef) -> ThreadPriority {
    k.sched.lock().current().priority()
}
