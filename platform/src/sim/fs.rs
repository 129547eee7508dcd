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

use crate::fs::{File, FileSystem};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, RwLock,
    },
};

struct Inode {
    data: RwLock<Vec<u8>>,
    deny_write: AtomicUsize,
}

struct SimFile {
    inode: Arc<Inode>,
    pos: Mutex<usize>,
}

impl File for SimFile {
    fn size(&self) -> usize {
        self.inode.data.read().unwrap().len()
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        let mut pos = self.pos.lock().unwrap();
        let n = self.read_at(*pos, buf);
        *pos += n;
        n
    }

    fn write(&self, data: &[u8]) -> usize {
        if self.inode.deny_write.load(Ordering::SeqCst) > 0 {
            return 0;
        }
        let mut contents = self.inode.data.write().unwrap();
        let mut pos = self.pos.lock().unwrap();
        if *pos >= contents.len() {
            return 0;
        }
        let n = data.len().min(contents.len() - *pos);
        contents[*pos..*pos + n].copy_from_slice(&data[..n]);
        *pos += n;
        n
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let contents = self.inode.data.read().unwrap();
        if offset >= contents.len() {
            return 0;
        }
        let n = buf.len().min(contents.len() - offset);
        buf[..n].copy_from_slice(&contents[offset..offset + n]);
        n
    }

    fn deny_write(&self) {
        self.inode.deny_write.fetch_add(1, Ordering::SeqCst);
    }

    fn allow_write(&self) {
        let prior = self.inode.deny_write.fetch_sub(1, Ordering::SeqCst);
        assert!(prior > 0, "allow_write without matching deny_write");
    }

    fn duplicate(&self) -> Arc<dyn File> {
        Arc::new(SimFile {
            inode: self.inode.clone(),
            pos: Mutex::new(*self.pos.lock().unwrap()),
        })
    }
}

/// In-memory file system. Removal unlinks the name; open handles keep
/// the contents alive.
pub struct SimFileSystem {
    inodes: Mutex<BTreeMap<String, Arc<Inode>>>,
}

impl SimFileSystem {
    pub fn new() -> Self {
        Self {
            inodes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Drop a ready-made file in, for tests and boot images.
    pub fn install(&self, name: &str, contents: &[u8]) {
        self.inodes.lock().unwrap().insert(
            name.into(),
            Arc::new(Inode {
                data: RwLock::new(contents.to_vec()),
                deny_write: AtomicUsize::new(0),
            }),
        );
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inodes.lock().unwrap().contains_key(name)
    }

    /// Whether writes are currently denied on a linked file.
    pub fn write_denied(&self, name: &str) -> bool {
        self.inodes
            .lock()
            .unwrap()
            .get(name)
            .map(|inode| inode.deny_write.load(Ordering::SeqCst) > 0)
            .unwrap_or(false)
    }
}

impl Default for SimFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for SimFileSystem {
    fn create(&self, name: &str, initial_size: usize) -> bool {
        let mut inodes = self.inodes.lock().unwrap();
        if inodes.contains_key(name) {
            return false;
        }
        inodes.insert(
            name.into(),
            Arc::new(Inode {
                data: RwLock::new(vec![0; initial_size]),
                deny_write: AtomicUsize::new(0),
            }),
        );
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.inodes.lock().unwrap().remove(name).is_some()
    }

    fn open(&self, name: &str) -> Option<Arc<dyn File>> {
        let inode = self.inodes.lock().unwrap().get(name)?.clone();
        Some(Arc::new(SimFile {
            inode,
            pos: Mutex::new(0),
        }))
    }
}
