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

#![cfg_attr(not(test), no_std)]

//! Threading and synchronization core of the Teal kernel: the preemptive
//! priority scheduler, sleep/wake timing, priority-donating locks, and the
//! user-process lifecycle built on top of them. Hardware is reached only
//! through the capabilities in `teal_platform`.

pub extern crate alloc;

pub mod config;
pub mod error;
pub mod irq;
mod logger;
pub mod process;
pub mod scheduler;
pub mod startup;
pub mod sync;
pub mod syscalls;
pub mod thread;
pub mod time;
pub mod types;
mod zombie;

pub use startup::{Kernel, KernelRef};
