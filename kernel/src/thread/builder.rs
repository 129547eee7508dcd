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

use super::{Thread, ThreadKind, ThreadNode, CREATED, READY};
use crate::{config, process, scheduler, startup::KernelRef, types::ThreadPriority};
use alloc::{boxed::Box, string::String, sync::Arc};
use teal_platform::Context;

pub struct Builder {
    kernel: KernelRef,
    name: String,
    priority: ThreadPriority,
    kind: ThreadKind,
    entry: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Builder {
    pub fn new<F>(k: &KernelRef, name: &str, entry: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            kernel: k.clone(),
            name: name.into(),
            priority: config::PRI_DEFAULT,
            kind: ThreadKind::Normal,
            entry: Some(Box::new(entry)),
        }
    }

    #[inline]
    pub fn set_priority(mut self, priority: ThreadPriority) -> Self {
        self.priority = priority.min(config::PRI_MAX);
        self
    }

    #[inline]
    pub(crate) fn kind(mut self, kind: ThreadKind) -> Self {
        self.kind = kind;
        self
    }

    /// Create the thread object without making it runnable.
    pub fn build(mut self) -> ThreadNode {
        let entry = self.entry.take().expect("thread entry consumed twice");
        let k = self.kernel.clone();
        let context = Context::spawn(Box::new(move || {
            first_run(&k);
            entry();
            process::exit(&k, 0);
        }));
        Arc::new(Thread::new(
            self.kernel.alloc_tid(),
            &self.name,
            self.kind,
            self.priority,
            context,
        ))
    }

    /// Create the thread and hand it to the scheduler. The creator is
    /// preempted on the spot if the new thread outranks it.
    pub fn start(self) -> ThreadNode {
        let k = self.kernel.clone();
        let t = self.build();
        queue_ready(&k, t.clone());
        t
    }
}

pub(crate) fn queue_ready(k: &KernelRef, t: ThreadNode) {
    let mut g = k.sched.lock();
    assert!(t.transfer_state(CREATED, READY));
    g.ready.push(t);
    scheduler::preempt_if_needed(k, g);
}

fn first_run(k: &KernelRef) {
    let mut g = k.sched.lock();
    g.zombies.reclaim();
}

pub fn spawn<F>(k: &KernelRef, name: &str, priority: ThreadPriority, f: F) -> ThreadNode
where
    F: FnOnce() + Send + 'static,
{
    Builder::new(k, name, f).set_priority(priority).start()
}
