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

//! Deterministic host-threaded machine. Each kernel thread is backed by a
//! parked OS thread; exactly one holds the run permit at any moment, so
//! kernel code observes a single CPU. Interrupts are a disable-depth
//! counter and ticks are delivered only at explicit interrupt points.

mod context;
mod fs;
mod vm;

pub use context::{Context, ResumeHandle};
pub use fs::SimFileSystem;
pub use vm::SimVmSpace;

use crate::{frame::UserFrame, vm::VmSpace};
use std::sync::{
    atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering},
    Arc, RwLock,
};

type UserProgram = dyn Fn(UserFrame) -> i32 + Send + Sync;

pub struct Machine {
    irq_depth: AtomicUsize,
    frames_left: Arc<AtomicI64>,
    next_frame: Arc<AtomicU64>,
    user_program: RwLock<Option<Arc<UserProgram>>>,
}

impl Machine {
    pub fn new() -> Arc<Self> {
        Self::with_frame_quota(i64::MAX)
    }

    /// Machine with a bounded pool of user frames, for exercising
    /// allocation-failure paths.
    pub fn with_frame_quota(frames: i64) -> Arc<Self> {
        Arc::new(Self {
            irq_depth: AtomicUsize::new(0),
            frames_left: Arc::new(AtomicI64::new(frames)),
            next_frame: Arc::new(AtomicU64::new(1)),
            user_program: RwLock::new(None),
        })
    }

    /// Shrink or refill the frame pool mid-run.
    pub fn set_frame_quota(&self, frames: i64) {
        self.frames_left.store(frames, Ordering::SeqCst);
    }

    pub fn disable_interrupts(&self) -> usize {
        let prior = self.irq_depth.load(Ordering::SeqCst);
        self.irq_depth.store(prior + 1, Ordering::SeqCst);
        prior
    }

    pub fn restore_interrupts(&self, prior: usize) {
        self.irq_depth.store(prior, Ordering::SeqCst);
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.irq_depth.load(Ordering::SeqCst) == 0
    }

    /// Fresh user address space drawing on this machine's frame pool.
    pub fn create_vm(&self) -> Option<Arc<dyn VmSpace>> {
        if self.frames_left.load(Ordering::SeqCst) <= 0 {
            log::warn!("frame pool exhausted, refusing a new address space");
            return None;
        }
        Some(Arc::new(SimVmSpace::with_pool(
            self.frames_left.clone(),
            self.next_frame.clone(),
        )))
    }

    /// Install the code that stands in for user mode. It receives the
    /// entry register frame and returns the program's exit status; any
    /// syscalls it makes run on the process's own thread.
    pub fn set_user_program<F>(&self, program: F)
    where
        F: Fn(UserFrame) -> i32 + Send + Sync + 'static,
    {
        *self.user_program.write().unwrap() = Some(Arc::new(program));
    }

    /// The IRET stand-in. Runs the installed user program to completion
    /// and reports its exit status. With no program installed the
    /// "process" exits immediately with status 0.
    pub fn run_user(&self, frame: UserFrame) -> i32 {
        let program = self.user_program.read().unwrap().clone();
        match program {
            Some(p) => p(frame),
            None => 0,
        }
    }

    pub fn console_write(&self, s: &str) {
        print!("{s}");
    }

    pub fn power_off(&self) -> ! {
        log::info!("machine: power off");
        println!("machine: power off");
        loop {
            std::thread::park();
        }
    }
}
