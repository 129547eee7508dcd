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

use crate::vm::VmSpace;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc, Mutex,
    },
};
use teal_kconfig::{PAGE_MASK, PAGE_SIZE};

#[derive(Debug)]
struct Page {
    data: Vec<u8>,
    writable: bool,
    frame: u64,
}

/// Address space over host memory: 4 KiB frames keyed by user page.
#[derive(Debug)]
pub struct SimVmSpace {
    pages: Mutex<BTreeMap<u64, Page>>,
    frames_left: Arc<AtomicI64>,
    next_frame: Arc<AtomicU64>,
}

impl SimVmSpace {
    /// Standalone space with an unbounded private frame pool.
    pub fn new() -> Self {
        Self::with_pool(
            Arc::new(AtomicI64::new(i64::MAX)),
            Arc::new(AtomicU64::new(1)),
        )
    }

    pub(crate) fn with_pool(frames_left: Arc<AtomicI64>, next_frame: Arc<AtomicU64>) -> Self {
        Self {
            pages: Mutex::new(BTreeMap::new()),
            frames_left,
            next_frame,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }
}

impl Default for SimVmSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl VmSpace for SimVmSpace {
    fn map_page(&self, upage: u64, writable: bool) -> bool {
        assert_eq!(upage & PAGE_MASK, 0, "map_page wants an aligned page");
        let mut pages = self.pages.lock().unwrap();
        if pages.contains_key(&upage) {
            return false;
        }
        if self.frames_left.fetch_sub(1, Ordering::SeqCst) <= 0 {
            self.frames_left.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        let frame = self.next_frame.fetch_add(1, Ordering::SeqCst);
        pages.insert(
            upage,
            Page {
                data: vec![0; PAGE_SIZE as usize],
                writable,
                frame,
            },
        );
        true
    }

    fn translate(&self, vaddr: u64) -> Option<u64> {
        let pages = self.pages.lock().unwrap();
        let page = pages.get(&(vaddr & !PAGE_MASK))?;
        Some(page.frame * PAGE_SIZE + (vaddr & PAGE_MASK))
    }

    fn read_bytes(&self, vaddr: u64, buf: &mut [u8]) -> bool {
        let pages = self.pages.lock().unwrap();
        let mut va = vaddr;
        let mut done = 0;
        while done < buf.len() {
            let Some(page) = pages.get(&(va & !PAGE_MASK)) else {
                return false;
            };
            let off = (va & PAGE_MASK) as usize;
            let n = (buf.len() - done).min(PAGE_SIZE as usize - off);
            buf[done..done + n].copy_from_slice(&page.data[off..off + n]);
            done += n;
            va += n as u64;
        }
        true
    }

    fn write_bytes(&self, vaddr: u64, data: &[u8]) -> bool {
        let mut pages = self.pages.lock().unwrap();
        let mut va = vaddr;
        let mut done = 0;
        while done < data.len() {
            let Some(page) = pages.get_mut(&(va & !PAGE_MASK)) else {
                return false;
            };
            let off = (va & PAGE_MASK) as usize;
            let n = (data.len() - done).min(PAGE_SIZE as usize - off);
            page.data[off..off + n].copy_from_slice(&data[done..done + n]);
            done += n;
            va += n as u64;
        }
        true
    }

    fn for_each_page(&self, visit: &mut dyn FnMut(u64, bool) -> bool) -> bool {
        let pages = self.pages.lock().unwrap();
        for (upage, page) in pages.iter() {
            if !visit(*upage, page.writable) {
                return false;
            }
        }
        true
    }

    fn activate(&self) {}
}

impl Drop for SimVmSpace {
    fn drop(&mut self) {
        let released = self.pages.lock().unwrap().len() as i64;
        self.frames_left.fetch_add(released, Ordering::SeqCst);
    }
}
