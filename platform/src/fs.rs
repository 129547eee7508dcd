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

use alloc::sync::Arc;

/// The file system collaborator. Not thread safe by contract: the kernel
/// serializes every call behind its global file-system lock.
pub trait FileSystem: Send + Sync {
    /// Create an empty file of `initial_size` bytes. Fails if the name
    /// already exists.
    fn create(&self, name: &str, initial_size: usize) -> bool;

    /// Unlink a file. Open handles keep the contents alive.
    fn remove(&self, name: &str) -> bool;

    /// Open an independent handle with its own cursor.
    fn open(&self, name: &str) -> Option<Arc<dyn File>>;
}

/// An open file handle. Dropping the handle closes it.
pub trait File: Send + Sync {
    fn size(&self) -> usize;

    /// Read at the cursor, advancing it. Short reads happen at end of
    /// file only.
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Write at the cursor, advancing it. Never grows the file; returns
    /// 0 while writes are denied.
    fn write(&self, data: &[u8]) -> usize;

    /// Positional read; does not move the cursor.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize;

    /// Block writes through any handle of the underlying file. Calls
    /// nest; each must be undone by `allow_write`.
    fn deny_write(&self);

    fn allow_write(&self);

    /// New handle over the same file with a copy of this cursor.
    fn duplicate(&self) -> Arc<dyn File>;
}
