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

use crate::thread::{self, ThreadNode};
use alloc::vec::Vec;

/// Threads that exited but could not free themselves. Drained by
/// whichever thread is scheduled next, and by idle; never by the thread
/// being destroyed.
pub(crate) struct ZombieQueue {
    retired: Vec<ThreadNode>,
}

impl ZombieQueue {
    pub const fn new() -> Self {
        Self {
            retired: Vec::new(),
        }
    }

    pub fn push(&mut self, t: ThreadNode) {
        debug_assert_eq!(t.state(), thread::DYING);
        self.retired.push(t);
    }

    pub fn reclaim(&mut self) {
        for t in self.retired.drain(..) {
            debug_assert_eq!(t.state(), thread::DYING);
            #[cfg(feature = "debugging_scheduler")]
            log::trace!("reclaim thread {} ({})", t.tid(), t.name());
            drop(t);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.retired.len()
    }
}
