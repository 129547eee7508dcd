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

#![cfg_attr(not(feature = "sim"), no_std)]

//! Machine-facing capabilities of the kernel. The kernel never touches
//! hardware directly; it drives an address space, a file system and a CPU
//! context through the interfaces defined here. A backend provides the
//! concrete `Machine` and `Context` types; `sim` is the deterministic
//! host-threaded backend used by the test suite.

pub extern crate alloc;

pub mod frame;
pub mod fs;
pub mod vm;

pub use frame::UserFrame;
pub use fs::{File, FileSystem};
pub use vm::VmSpace;

cfg_if::cfg_if! {
    if #[cfg(feature = "sim")] {
        mod sim;
        pub use sim::{Context, Machine, ResumeHandle, SimFileSystem, SimVmSpace};
    }
}
