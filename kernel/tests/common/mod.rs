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

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use teal_kernel::{Kernel, KernelRef};
use teal_platform::{FileSystem, Machine, SimFileSystem, VmSpace};

/// Fresh machine, in-memory file system, booted kernel. The calling test
/// thread becomes the `main` kernel thread.
pub fn boot() -> (KernelRef, Arc<Machine>, Arc<SimFileSystem>) {
    let machine = Machine::new();
    let fs = Arc::new(SimFileSystem::new());
    let kernel = Kernel::bring_up(machine.clone(), fs.clone());
    (kernel, machine, fs)
}

/// Boot over a caller-supplied file system.
pub fn boot_with_fs(fs: Arc<dyn FileSystem>) -> (KernelRef, Arc<Machine>) {
    let machine = Machine::new();
    let kernel = Kernel::bring_up(machine.clone(), fs);
    (kernel, machine)
}

pub type Events = Arc<Mutex<Vec<(&'static str, u64)>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(events: &Events, what: &'static str, tick: u64) {
    events.lock().unwrap().push((what, tick));
}

pub fn snapshot(events: &Events) -> Vec<(&'static str, u64)> {
    events.lock().unwrap().clone()
}

/// Smallest loadable program: one executable PT_LOAD holding a `ret`.
pub fn trivial_elf() -> Vec<u8> {
    const EHDR_SIZE: usize = 64;
    const PHDR_SIZE: usize = 56;
    const ENTRY: u64 = 0x40_0000;
    let body = [0xc3u8];

    let mut img = vec![0u8; 0x1000 + body.len()];
    img[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    img[4] = 2; // ELFCLASS64
    img[5] = 1; // little endian
    img[6] = 1; // EV_CURRENT
    img[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    img[18..20].copy_from_slice(&0x3eu16.to_le_bytes()); // x86-64
    img[20..24].copy_from_slice(&1u32.to_le_bytes());
    img[24..32].copy_from_slice(&ENTRY.to_le_bytes());
    img[32..40].copy_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
    img[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    img[56..58].copy_from_slice(&1u16.to_le_bytes());

    let p = EHDR_SIZE;
    img[p..p + 4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
    img[p + 4..p + 8].copy_from_slice(&5u32.to_le_bytes()); // R+X
    img[p + 8..p + 16].copy_from_slice(&0x1000u64.to_le_bytes());
    img[p + 16..p + 24].copy_from_slice(&ENTRY.to_le_bytes());
    img[p + 32..p + 40].copy_from_slice(&(body.len() as u64).to_le_bytes());
    img[p + 40..p + 48].copy_from_slice(&(body.len() as u64).to_le_bytes());
    img[0x1000..0x1000 + body.len()].copy_from_slice(&body);
    img
}

/// Read a little-endian u64 out of a user address space.
pub fn read_user_u64(vm: &Arc<dyn VmSpace>, at: u64) -> u64 {
    let mut b = [0u8; 8];
    assert!(vm.read_bytes(at, &mut b), "unmapped user address {at:#x}");
    u64::from_le_bytes(b)
}

/// Read a NUL-terminated string out of a user address space.
pub fn read_user_cstr(vm: &Arc<dyn VmSpace>, at: u64) -> String {
    let mut out = Vec::new();
    let mut a = at;
    loop {
        let mut b = [0u8; 1];
        assert!(vm.read_bytes(a, &mut b), "unmapped user address {a:#x}");
        if b[0] == 0 {
            break;
        }
        out.push(b[0]);
        a += 1;
    }
    String::from_utf8(out).unwrap()
}

/// The argv vector of the current process, as laid out at user entry.
pub fn read_argv(vm: &Arc<dyn VmSpace>, frame: &teal_platform::UserFrame) -> Vec<String> {
    let mut argv = Vec::new();
    for i in 0..frame.rdi {
        let ptr = read_user_u64(vm, frame.rsi + i * 8);
        argv.push(read_user_cstr(vm, ptr));
    }
    argv
}
