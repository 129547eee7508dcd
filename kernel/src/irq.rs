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

//! Scoped interrupts-off critical sections. Disabling interrupts is the
//! kernel's only mutual-exclusion primitive for scheduler state; every
//! mutation of the ready queue, sleep queue, thread status or donation
//! graph happens behind an `IrqGuard`.

use alloc::sync::Arc;
use core::{
    cell::{Cell, UnsafeCell},
    ops::{Deref, DerefMut},
};
use teal_platform::Machine;

pub struct IrqLockRaw {
    machine: Arc<Machine>,
    prior: Cell<usize>,
}

impl IrqLockRaw {
    pub fn new(machine: Arc<Machine>) -> Self {
        Self {
            machine,
            prior: Cell::new(0),
        }
    }

    #[inline]
    fn raw_lock(&self) {
        self.prior.replace(self.machine.disable_interrupts());
    }

    #[inline]
    fn raw_unlock(&self) {
        self.machine.restore_interrupts(self.prior.get());
    }
}

pub struct IrqLock<T> {
    lock: IrqLockRaw,
    inner: UnsafeCell<T>,
}

// A single thread runs at a time and every access goes through lock();
// the context hand-off orders accesses from different host threads.
unsafe impl<T: Send> Send for IrqLock<T> {}
unsafe impl<T: Send> Sync for IrqLock<T> {}

impl<T> IrqLock<T> {
    pub fn new(machine: Arc<Machine>, element: T) -> Self {
        IrqLock {
            lock: IrqLockRaw::new(machine),
            inner: UnsafeCell::new(element),
        }
    }

    pub fn lock(&self) -> IrqGuard<'_, T> {
        self.lock.raw_lock();
        IrqGuard { lock: self }
    }
}

pub struct IrqGuard<'a, T> {
    lock: &'a IrqLock<T>,
}

impl<'a, T> Deref for IrqGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<'a, T> DerefMut for IrqGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<'a, T> Drop for IrqGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.lock.raw_unlock();
    }
}
