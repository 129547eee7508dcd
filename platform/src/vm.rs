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

/// A user address space. One per process; created fresh for exec and fork
/// and destroyed when the owner exits. All addresses are user virtual
/// addresses; the kernel reaches user memory only through this interface.
pub trait VmSpace: Send + Sync {
    /// Map a zeroed frame at the page containing `upage`. `upage` must be
    /// page aligned. Fails if the page is already mapped or no frame is
    /// available.
    fn map_page(&self, upage: u64, writable: bool) -> bool;

    /// Physical address backing `vaddr`, if mapped.
    fn translate(&self, vaddr: u64) -> Option<u64>;

    /// Copy out of the space. Fails if any byte of the range is unmapped.
    fn read_bytes(&self, vaddr: u64, buf: &mut [u8]) -> bool;

    /// Copy into the space, ignoring the writable bit (kernel access).
    /// Fails if any byte of the range is unmapped.
    fn write_bytes(&self, vaddr: u64, data: &[u8]) -> bool;

    /// Visit every mapped page with its writable bit, in ascending page
    /// order. Stops and reports false as soon as the visitor does.
    fn for_each_page(&self, visit: &mut dyn FnMut(u64, bool) -> bool) -> bool;

    /// Make this the active address space.
    fn activate(&self);
}
