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

//! Kernel bring-up. All scheduler singletons live in one `Kernel` value;
//! threads and synchronization primitives carry a back-reference to it, so
//! the context travels implicitly once the system is up.

use crate::{
    config,
    irq::IrqLock,
    logger,
    scheduler::{self, Sched},
    sync::Mutex,
    thread::{self, Builder, ThreadKind, ThreadNode},
    types::Tid,
};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use teal_platform::{FileSystem, Machine};

pub type KernelRef = Arc<Kernel>;

pub struct Kernel {
    pub(crate) machine: Arc<Machine>,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) sched: IrqLock<Sched>,
    pub(crate) fs_lock: Arc<Mutex>,
    next_tid: AtomicUsize,
    ticks_hint: AtomicU64,
    running_hint: AtomicUsize,
}

impl Kernel {
    /// Boot the threading system. The calling thread of execution becomes
    /// the `main` kernel thread; the idle thread is created and parked.
    pub fn bring_up(machine: Arc<Machine>, fs: Arc<dyn FileSystem>) -> KernelRef {
        let kernel = Arc::new_cyclic(|weak| Kernel {
            sched: IrqLock::new(machine.clone(), Sched::new()),
            fs_lock: Mutex::with_kernel(weak.clone()),
            machine,
            fs,
            next_tid: AtomicUsize::new(1),
            ticks_hint: AtomicU64::new(0),
            running_hint: AtomicUsize::new(0),
        });
        logger::init(&kernel);

        let main = thread::adopt_bootstrap(&kernel, "main");
        kernel.note_running(&main);
        let idle = {
            let k = kernel.clone();
            Builder::new(&kernel, "idle", move || scheduler::idle_loop(k))
                .set_priority(config::PRI_MIN)
                .kind(ThreadKind::Idle)
                .build()
        };
        assert!(idle.transfer_state(thread::CREATED, thread::READY));
        {
            let mut g = kernel.sched.lock();
            g.set_current(main);
            g.set_idle(idle);
        }
        log::info!("kernel is up");
        kernel
    }

    pub(crate) fn alloc_tid(&self) -> Tid {
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }

    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    pub(crate) fn note_running(&self, t: &ThreadNode) {
        self.running_hint.store(t.tid(), Ordering::Relaxed);
    }

    pub(crate) fn note_tick(&self, now: u64) {
        self.ticks_hint.store(now, Ordering::Relaxed);
    }

    pub(crate) fn ticks_hint(&self) -> u64 {
        self.ticks_hint.load(Ordering::Relaxed)
    }

    pub(crate) fn running_hint(&self) -> usize {
        self.running_hint.load(Ordering::Relaxed)
    }
}
