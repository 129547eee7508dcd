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

use crate::config::FD_MAX;
use alloc::{sync::Arc, vec::Vec};
use teal_platform::File;

/// Console input.
pub const FD_STDIN: i32 = 0;
/// Console output.
pub const FD_STDOUT: i32 = 1;

const FD_FIRST_FILE: usize = 2;

/// Per-process descriptor table. Fixed size; descriptors 0 and 1 are the
/// console and never hold a file.
pub struct FdTable {
    slots: Vec<Option<Arc<dyn File>>>,
}

impl FdTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: (0..FD_MAX).map(|_| None).collect(),
        }
    }

    /// Lowest free descriptor from 2 up.
    pub(crate) fn install(&mut self, file: Arc<dyn File>) -> Option<i32> {
        for fd in FD_FIRST_FILE..self.slots.len() {
            if self.slots[fd].is_none() {
                self.slots[fd] = Some(file);
                return Some(fd as i32);
            }
        }
        None
    }

    pub(crate) fn get(&self, fd: i32) -> Option<Arc<dyn File>> {
        if fd < 0 {
            return None;
        }
        self.slots.get(fd as usize)?.clone()
    }

    pub(crate) fn close(&mut self, fd: i32) -> Option<Arc<dyn File>> {
        if fd < 0 {
            return None;
        }
        self.slots.get_mut(fd as usize)?.take()
    }

    pub(crate) fn take_all(&mut self) -> Vec<Arc<dyn File>> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// Arc clones of the open slots, positions preserved. The clones are
    /// duplicated into real handles under the file-system lock.
    pub(crate) fn snapshot(&self) -> Vec<Option<Arc<dyn File>>> {
        self.slots.clone()
    }

    pub(crate) fn from_slots(slots: Vec<Option<Arc<dyn File>>>) -> Self {
        assert_eq!(slots.len(), FD_MAX);
        Self { slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teal_platform::{FileSystem, SimFileSystem};

    fn open_one() -> Arc<dyn File> {
        let fs = SimFileSystem::new();
        fs.install("f", b"hello");
        fs.open("f").unwrap()
    }

    #[test]
    fn allocates_lowest_from_two() {
        let mut t = FdTable::new();
        assert_eq!(t.install(open_one()), Some(2));
        assert_eq!(t.install(open_one()), Some(3));
        assert!(t.close(2).is_some());
        assert_eq!(t.install(open_one()), Some(2));
    }

    #[test]
    fn console_descriptors_hold_no_file() {
        let t = FdTable::new();
        assert!(t.get(FD_STDIN).is_none());
        assert!(t.get(FD_STDOUT).is_none());
        assert!(t.get(-1).is_none());
        assert!(t.get(FD_MAX as i32).is_none());
    }

    #[test]
    fn take_all_empties_the_table() {
        let mut t = FdTable::new();
        t.install(open_one());
        t.install(open_one());
        assert_eq!(t.take_all().len(), 2);
        assert!(t.take_all().is_empty());
    }
}
