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

#![no_std]

//! Build-time constants shared by every crate in the workspace.

/// Timer interrupts per second.
pub const TICKS_PER_SECOND: u64 = 100;

/// A thread is preempted after running this many ticks in a row.
pub const TIME_SLICE: u64 = 4;

/// Lowest thread priority. The idle thread runs at this priority.
pub const PRI_MIN: u8 = 0;
/// Priority assigned to threads that do not ask for one.
pub const PRI_DEFAULT: u8 = 31;
/// Highest thread priority.
pub const PRI_MAX: u8 = 63;

/// Upper bound on the lock chain walked while donating priority.
/// A well-formed system never comes close; the bound guards against
/// malformed acquisition orders.
pub const DONATION_DEPTH: usize = 8;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u64 = PAGE_SIZE - 1;

/// Top of the user stack. The initial stack page is mapped just below.
pub const USER_STACK: u64 = 0x4748_0000;

/// First kernel virtual address. User pointers must stay below this.
pub const KERN_BASE: u64 = 0x80_0400_0000;

/// Per-process file descriptor table size. Descriptors 0 and 1 are
/// reserved for the console.
pub const FD_MAX: usize = 64;

/// Maximum thread name length, excluding the terminator.
pub const THREAD_NAME_MAX: usize = 15;

/// Longest command line accepted by exec, in bytes.
pub const CMDLINE_MAX: usize = PAGE_SIZE as usize;

/// Upper bound on ELF program headers.
pub const ELF_PHNUM_MAX: u16 = 1024;

/// Stamped into every thread object; checked to catch stack overruns
/// that scribble over the object.
pub const THREAD_MAGIC: u32 = 0x7EA1_C0DE;
