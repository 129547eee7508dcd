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

//! The system-call surface. Arguments arriving from user mode are raw
//! addresses; every pointer is checked to be non-null, below the kernel
//! split and mapped before it is touched. A violation terminates the
//! offending process with status -1 and the kernel carries on.

use crate::{
    config::{CMDLINE_MAX, KERN_BASE, PAGE_MASK, PAGE_SIZE},
    error::{code, Error},
    process::{self, with_fs, FD_STDIN, FD_STDOUT},
    startup::KernelRef,
    thread,
    types::Tid,
};
use alloc::{string::String, sync::Arc};
use teal_platform::{File, UserFrame, VmSpace};

pub fn sys_halt(k: &KernelRef) -> ! {
    k.machine.power_off()
}

pub fn sys_exit(k: &KernelRef, status: i32) -> ! {
    process::exit(k, status)
}

pub fn sys_fork(k: &KernelRef, name_uaddr: u64, frame: &UserFrame) -> isize {
    let name = match user_string(k, name_uaddr) {
        Ok(s) => s,
        Err(_) => kill_current(k),
    };
    process::fork(k, &name, frame)
}

/// Returns only on failure; the new image never comes back here.
pub fn sys_exec(k: &KernelRef, cmd_uaddr: u64) -> isize {
    let cmd = match user_string(k, cmd_uaddr) {
        Ok(s) => s,
        Err(_) => kill_current(k),
    };
    process::exec(k, &cmd)
}

pub fn sys_wait(k: &KernelRef, child_tid: Tid) -> isize {
    process::wait(k, child_tid)
}

pub fn sys_create(k: &KernelRef, path_uaddr: u64, initial_size: usize) -> bool {
    let path = match user_string(k, path_uaddr) {
        Ok(s) => s,
        Err(_) => kill_current(k),
    };
    if path.is_empty() {
        return false;
    }
    with_fs(k, |fs| fs.create(&path, initial_size))
}

pub fn sys_remove(k: &KernelRef, path_uaddr: u64) -> bool {
    let path = match user_string(k, path_uaddr) {
        Ok(s) => s,
        Err(_) => kill_current(k),
    };
    with_fs(k, |fs| fs.remove(&path))
}

pub fn sys_open(k: &KernelRef, path_uaddr: u64) -> isize {
    let path = match user_string(k, path_uaddr) {
        Ok(s) => s,
        Err(_) => kill_current(k),
    };
    let Some(file) = with_fs(k, |fs| fs.open(&path)) else {
        return -1;
    };
    let cur = thread::current(k);
    let g = k.sched.lock();
    let fd = cur.fds.borrow_mut().install(file);
    drop(g);
    fd.map(|fd| fd as isize).unwrap_or(-1)
}

pub fn sys_filesize(k: &KernelRef, fd: i32) -> isize {
    let Some(file) = fd_file(k, fd) else {
        return -1;
    };
    with_fs(k, |_| file.size() as isize)
}

pub fn sys_read(k: &KernelRef, fd: i32, buf_uaddr: u64, len: usize) -> isize {
    if len == 0 {
        return 0;
    }
    let Some(vm) = current_vm(k) else {
        return -1;
    };
    if !check_user_range(&vm, buf_uaddr, len) {
        kill_current(k);
    }
    if fd == FD_STDIN {
        // No console input line in this machine; report end of input.
        return 0;
    }
    let Some(file) = fd_file(k, fd) else {
        return -1;
    };
    let mut kbuf = alloc::vec![0u8; len];
    let n = with_fs(k, |_| file.read(&mut kbuf));
    if !vm.write_bytes(buf_uaddr, &kbuf[..n]) {
        kill_current(k);
    }
    n as isize
}

pub fn sys_write(k: &KernelRef, fd: i32, buf_uaddr: u64, len: usize) -> isize {
    if len == 0 {
        return 0;
    }
    let Some(vm) = current_vm(k) else {
        return -1;
    };
    if !check_user_range(&vm, buf_uaddr, len) {
        kill_current(k);
    }
    let mut kbuf = alloc::vec![0u8; len];
    if !vm.read_bytes(buf_uaddr, &mut kbuf) {
        kill_current(k);
    }
    if fd == FD_STDOUT {
        k.machine
            .console_write(&String::from_utf8_lossy(&kbuf));
        return len as isize;
    }
    let Some(file) = fd_file(k, fd) else {
        return -1;
    };
    with_fs(k, |_| file.write(&kbuf)) as isize
}

pub fn sys_close(k: &KernelRef, fd: i32) -> isize {
    let cur = thread::current(k);
    let taken = {
        let g = k.sched.lock();
        let taken = cur.fds.borrow_mut().close(fd);
        drop(g);
        taken
    };
    match taken {
        Some(file) => {
            with_fs(k, move |_| drop(file));
            0
        }
        None => -1,
    }
}

fn fd_file(k: &KernelRef, fd: i32) -> Option<Arc<dyn File>> {
    let cur = thread::current(k);
    let g = k.sched.lock();
    let file = cur.fds.borrow().get(fd);
    drop(g);
    file
}

fn current_vm(k: &KernelRef) -> Option<Arc<dyn VmSpace>> {
    let cur = thread::current(k);
    let g = k.sched.lock();
    let vm = cur.vm.borrow().clone();
    drop(g);
    vm
}

fn kill_current(k: &KernelRef) -> ! {
    log::info!("bad user pointer, killing current process");
    process::exit(k, -1)
}

/// Every page of [uaddr, uaddr+len) must be a mapped user address.
fn check_user_range(vm: &Arc<dyn VmSpace>, uaddr: u64, len: usize) -> bool {
    if uaddr == 0 {
        return false;
    }
    let Some(end) = uaddr.checked_add(len as u64) else {
        return false;
    };
    if end > KERN_BASE {
        return false;
    }
    let mut page = uaddr & !PAGE_MASK;
    while page < end {
        if vm.translate(page).is_none() {
            return false;
        }
        page += PAGE_SIZE;
    }
    true
}

/// Copy a NUL-terminated string out of user memory. A string longer than
/// the buffer is truncated with the terminator at `kbuf[len - 1]`.
pub(crate) fn copy_user_string(
    vm: &Arc<dyn VmSpace>,
    uaddr: u64,
    kbuf: &mut [u8],
) -> Result<usize, Error> {
    assert!(!kbuf.is_empty());
    if uaddr == 0 || uaddr >= KERN_BASE {
        return Err(code::EFAULT);
    }
    for i in 0..kbuf.len() {
        let at = uaddr + i as u64;
        if at >= KERN_BASE {
            return Err(code::EFAULT);
        }
        let mut byte = [0u8; 1];
        if !vm.read_bytes(at, &mut byte) {
            return Err(code::EFAULT);
        }
        kbuf[i] = byte[0];
        if byte[0] == 0 {
            return Ok(i);
        }
    }
    let last = kbuf.len() - 1;
    kbuf[last] = 0;
    Ok(last)
}

fn user_string(k: &KernelRef, uaddr: u64) -> Result<String, Error> {
    let vm = current_vm(k).ok_or(code::EFAULT)?;
    let mut kbuf = alloc::vec![0u8; CMDLINE_MAX];
    let n = copy_user_string(&vm, uaddr, &mut kbuf)?;
    let s = core::str::from_utf8(&kbuf[..n]).map_err(Error::from)?;
    Ok(s.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teal_platform::SimVmSpace;

    fn vm_with(at: u64, bytes: &[u8]) -> Arc<dyn VmSpace> {
        let vm = SimVmSpace::new();
        assert!(vm.map_page(at & !PAGE_MASK, true));
        assert!(vm.write_bytes(at, bytes));
        Arc::new(vm)
    }

    #[test]
    fn copies_a_short_string() {
        let vm = vm_with(0x5000, b"hello\0");
        let mut kbuf = [0u8; 32];
        let n = copy_user_string(&vm, 0x5000, &mut kbuf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&kbuf[..6], b"hello\0");
    }

    #[test]
    fn truncates_with_terminator_at_the_last_slot() {
        let vm = vm_with(0x5000, b"abcdefgh\0");
        let mut kbuf = [0xffu8; 4];
        let n = copy_user_string(&vm, 0x5000, &mut kbuf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&kbuf, b"abc\0");
    }

    #[test]
    fn rejects_null_kernel_and_unmapped_pointers() {
        let vm = vm_with(0x5000, b"x\0");
        let mut kbuf = [0u8; 8];
        assert!(copy_user_string(&vm, 0, &mut kbuf).is_err());
        assert!(copy_user_string(&vm, KERN_BASE, &mut kbuf).is_err());
        assert!(copy_user_string(&vm, 0x9000, &mut kbuf).is_err());
    }

    #[test]
    fn range_check_covers_every_page() {
        let vm = SimVmSpace::new();
        assert!(vm.map_page(0x4000, true));
        let vm: Arc<dyn VmSpace> = Arc::new(vm);
        assert!(check_user_range(&vm, 0x4000, 0x800));
        // Second half of the range spills onto an unmapped page.
        assert!(!check_user_range(&vm, 0x4800, 0x1000));
        assert!(!check_user_range(&vm, 0, 8));
        assert!(!check_user_range(&vm, KERN_BASE - 4, 8));
    }
}
