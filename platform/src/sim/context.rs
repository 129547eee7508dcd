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

use std::sync::{Arc, Condvar, Mutex};

/// Run permit for one kernel thread. Granting before the owner parks is
/// fine; the permit is consumed on wakeup.
struct Slot {
    runnable: Mutex<bool>,
    wakeup: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            runnable: Mutex::new(false),
            wakeup: Condvar::new(),
        }
    }

    fn grant(&self) {
        let mut runnable = self.runnable.lock().unwrap();
        *runnable = true;
        self.wakeup.notify_one();
    }

    fn wait(&self) {
        let mut runnable = self.runnable.lock().unwrap();
        while !*runnable {
            runnable = self.wakeup.wait(runnable).unwrap();
        }
        *runnable = false;
    }
}

/// Saved CPU state of one kernel thread, backed by a parked host thread.
pub struct Context {
    slot: Arc<Slot>,
}

impl Context {
    /// Context for a thread of execution that already exists: the boot
    /// thread. It is considered running; its permit is empty until it
    /// switches away and somebody grants it back.
    pub fn bootstrap() -> Self {
        Self {
            slot: Arc::new(Slot::new()),
        }
    }

    /// Back a new kernel thread. The host thread starts parked and runs
    /// `entry` once first scheduled. `entry` must never return: its last
    /// act is a handoff that parks the host thread for good.
    pub fn spawn(entry: Box<dyn FnOnce() + Send + 'static>) -> Self {
        let slot = Arc::new(Slot::new());
        let parked = slot.clone();
        std::thread::Builder::new()
            .spawn(move || {
                parked.wait();
                entry();
            })
            .expect("host thread spawn failed");
        Self { slot }
    }

    /// Transfer the CPU: wake `next`, park the caller until its own
    /// context is switched back to.
    pub fn switch(prev: &Context, next: &Context) {
        next.slot.grant();
        prev.slot.wait();
    }

    /// Detachable permit for a context, used when the caller must drop
    /// every reference to the thread objects before the final transfer.
    pub fn resume_handle(&self) -> ResumeHandle {
        ResumeHandle {
            slot: self.slot.clone(),
        }
    }
}

pub struct ResumeHandle {
    slot: Arc<Slot>,
}

impl ResumeHandle {
    /// Wake the target and never run again.
    pub fn handoff(self) -> ! {
        self.slot.grant();
        drop(self.slot);
        loop {
            std::thread::park();
        }
    }
}
