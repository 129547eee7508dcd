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

//! User-process lifecycle: initd, fork, exec, wait, exit. A process is a
//! kernel thread carrying an address space, a descriptor table and a
//! write-denied executable image.

pub(crate) mod elf;
mod fd;
pub(crate) mod ustack;

pub use fd::{FdTable, FD_STDIN, FD_STDOUT};

use crate::{
    config,
    error::{code, Error},
    scheduler,
    startup::KernelRef,
    sync::Semaphore,
    thread::{self, Builder, ThreadNode},
    types::Tid,
};
use alloc::{
    string::String,
    sync::Arc,
    vec::Vec,
};
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use teal_platform::{File, FileSystem, UserFrame, VmSpace};

/// Parent-side record of a child. Shared between both threads and kept
/// by the parent until `wait` consumes it, however the child dies.
pub struct ChildInfo {
    tid: AtomicUsize,
    exit_status: AtomicI32,
    exited: AtomicBool,
    waited: AtomicBool,
    completion: Semaphore,
}

impl ChildInfo {
    fn new(k: &KernelRef) -> Arc<Self> {
        Arc::new(Self {
            tid: AtomicUsize::new(0),
            exit_status: AtomicI32::new(0),
            exited: AtomicBool::new(false),
            waited: AtomicBool::new(false),
            completion: Semaphore::new(k, 0),
        })
    }

    pub fn tid(&self) -> Tid {
        self.tid.load(Ordering::SeqCst)
    }

    fn set_tid(&self, tid: Tid) {
        self.tid.store(tid, Ordering::SeqCst);
    }

    fn record_exit(&self, status: i32) {
        self.exit_status.store(status, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
        self.completion.up();
    }
}

/// Parent/child rendezvous for fork, alive until the child reports.
struct ForkHandshake {
    frame: UserFrame,
    done: Semaphore,
    success: AtomicBool,
}

/// Run `f` with the file system, holding the global file-system lock
/// across the call.
pub fn with_fs<R>(k: &KernelRef, f: impl FnOnce(&dyn FileSystem) -> R) -> R {
    k.fs_lock.lock();
    let r = f(&*k.fs);
    k.fs_lock.unlock();
    r
}

/// Launch the first user program. The new thread is named after the
/// first token of `cmdline` and exec's the rest on its first run; the
/// caller becomes its parent and may `wait` on the returned tid.
pub fn create_initd(k: &KernelRef, cmdline: &str) -> Result<Tid, Error> {
    if cmdline.len() >= config::CMDLINE_MAX {
        return Err(code::EINVAL);
    }
    let name = cmdline.split_whitespace().next().ok_or(code::EINVAL)?;
    let info = ChildInfo::new(k);
    let child = {
        let k_child = k.clone();
        let cmd: String = cmdline.into();
        Builder::new(k, name, move || initd(k_child, cmd)).build()
    };
    info.set_tid(child.tid());
    {
        let g = k.sched.lock();
        let parent = g.current().clone();
        parent.children.borrow_mut().push(info.clone());
        *child.self_info.borrow_mut() = Some(info);
        drop(g);
    }
    let tid = child.tid();
    thread::queue_ready(k, child);
    Ok(tid)
}

fn initd(k: KernelRef, cmd: String) {
    let _ = exec(&k, &cmd);
    // Reached only when the program could not be loaded.
    exit(&k, -1)
}

/// Clone the current process. The child gets a copy of the address
/// space, descriptor table and executable image, and resumes in user
/// mode from `parent_frame` with rax forced to 0. Returns the child tid,
/// or -1 if any part of the duplication failed.
pub fn fork(k: &KernelRef, name: &str, parent_frame: &UserFrame) -> isize {
    let parent = thread::current(k);
    let info = ChildInfo::new(k);
    let handshake = Arc::new(ForkHandshake {
        frame: *parent_frame,
        done: Semaphore::new(k, 0),
        success: AtomicBool::new(false),
    });
    let child = {
        let k_child = k.clone();
        let parent = parent.clone();
        let handshake = handshake.clone();
        let info = info.clone();
        Builder::new(k, name, move || do_fork(k_child, parent, handshake, info)).build()
    };
    info.set_tid(child.tid());
    {
        let g = k.sched.lock();
        parent.children.borrow_mut().push(info.clone());
        drop(g);
    }
    let tid = child.tid() as isize;
    thread::queue_ready(k, child);
    handshake.done.down();
    if handshake.success.load(Ordering::SeqCst) {
        tid
    } else {
        let g = k.sched.lock();
        parent.children.borrow_mut().retain(|c| !Arc::ptr_eq(c, &info));
        drop(g);
        -1
    }
}

/// Child half of fork, on the child thread.
fn do_fork(k: KernelRef, parent: ThreadNode, handshake: Arc<ForkHandshake>, info: Arc<ChildInfo>) {
    let cur = thread::current(&k);
    match duplicate_parent(&k, &parent, &cur) {
        Ok(()) => {
            {
                let g = k.sched.lock();
                *cur.self_info.borrow_mut() = Some(info);
                drop(g);
            }
            handshake.success.store(true, Ordering::SeqCst);
            let mut frame = handshake.frame;
            frame.rax = 0;
            handshake.done.up();
            drop(parent);
            drop(handshake);
            drop(cur);
            let status = k.machine.run_user(frame);
            exit(&k, status)
        }
        Err(err) => {
            log::warn!("fork into '{}' failed: {}", cur.name(), err);
            drop(info);
            handshake.done.up();
            drop(parent);
            drop(handshake);
            drop(cur);
            exit(&k, -1)
        }
    }
}

fn duplicate_parent(k: &KernelRef, parent: &ThreadNode, cur: &ThreadNode) -> Result<(), Error> {
    // The parent sleeps on the handshake; its tables are stable. Snapshot
    // the handles with interrupts off, duplicate under the fs lock.
    let (parent_vm, fd_snapshot, parent_exec) = {
        let g = k.sched.lock();
        let vm = parent.vm.borrow().clone();
        let fds = parent.fds.borrow().snapshot();
        let exec_file = parent.exec_file.borrow().clone();
        drop(g);
        (vm, fds, exec_file)
    };

    let vm_copy: Option<Arc<dyn VmSpace>> = match parent_vm {
        Some(src) => {
            let dst = k.machine.create_vm().ok_or(code::ENOMEM)?;
            let mut page = alloc::vec![0u8; config::PAGE_SIZE as usize];
            let complete = src.for_each_page(&mut |upage, writable| {
                dst.map_page(upage, writable)
                    && src.read_bytes(upage, &mut page)
                    && dst.write_bytes(upage, &page)
            });
            if !complete {
                return Err(code::ENOMEM);
            }
            Some(dst)
        }
        None => None,
    };

    let (fd_copy, exec_copy) = with_fs(k, move |_| {
        let fds: Vec<Option<Arc<dyn File>>> = fd_snapshot
            .into_iter()
            .map(|slot| slot.map(|f| f.duplicate()))
            .collect();
        let exec_file = parent_exec.map(|f| {
            let dup = f.duplicate();
            dup.deny_write();
            dup
        });
        (fds, exec_file)
    });

    {
        let g = k.sched.lock();
        *cur.vm.borrow_mut() = vm_copy;
        *cur.fds.borrow_mut() = FdTable::from_slots(fd_copy);
        *cur.exec_file.borrow_mut() = exec_copy;
        drop(g);
    }
    Ok(())
}

/// Replace the current process image. Returns only on failure (-1), with
/// the previous address space and executable intact; on success the new
/// program runs and this call never returns.
pub fn exec(k: &KernelRef, cmdline: &str) -> isize {
    if cmdline.len() >= config::CMDLINE_MAX {
        return -1;
    }
    let args: Vec<String> = cmdline.split_whitespace().map(String::from).collect();
    if args.is_empty() {
        return -1;
    }
    let Some(vm) = k.machine.create_vm() else {
        return -1;
    };
    let cur = thread::current(k);
    vm.activate();
    match load_image(k, &args, &vm) {
        Ok((frame, image)) => {
            let (old_vm, old_image) = {
                let g = k.sched.lock();
                let old_vm = cur.vm.borrow_mut().replace(vm);
                let old_image = cur.exec_file.borrow_mut().replace(image);
                drop(g);
                (old_vm, old_image)
            };
            if let Some(f) = old_image {
                with_fs(k, move |_| {
                    f.allow_write();
                    drop(f);
                });
            }
            drop(old_vm);
            drop(cur);
            let status = k.machine.run_user(frame);
            exit(k, status)
        }
        Err(err) => {
            log::warn!("exec: {}: load failed ({})", args[0], err);
            let old_vm = {
                let g = k.sched.lock();
                let old_vm = cur.vm.borrow().clone();
                drop(g);
                old_vm
            };
            if let Some(old) = old_vm {
                old.activate();
            }
            drop(vm);
            -1
        }
    }
}

fn load_image(
    k: &KernelRef,
    args: &[String],
    vm: &Arc<dyn VmSpace>,
) -> Result<(UserFrame, Arc<dyn File>), Error> {
    let image = with_fs(k, |fs| fs.open(&args[0])).ok_or(code::ENOENT)?;
    let entry = elf::load(&image, vm)?;
    let mut frame = UserFrame::user_entry();
    frame.rip = entry;
    ustack::build(vm, args, &mut frame)?;
    with_fs(k, |_| image.deny_write());
    Ok((frame, image))
}

/// Terminate the current process: publish the status to the parent,
/// close every descriptor, release the executable image, tear down the
/// address space, then die.
pub fn exit(k: &KernelRef, status: i32) -> ! {
    let cur = thread::current(k);
    let (info, open_files, image, vm, children) = {
        let g = k.sched.lock();
        cur.exit_status.set(status);
        let info = cur.self_info.borrow_mut().take();
        let open_files = cur.fds.borrow_mut().take_all();
        let image = cur.exec_file.borrow_mut().take();
        let vm = cur.vm.borrow_mut().take();
        let children: Vec<Arc<ChildInfo>> = cur.children.borrow_mut().drain(..).collect();
        drop(g);
        (info, open_files, image, vm, children)
    };
    if image.is_some() {
        log::info!("{}: exit({})", cur.name(), status);
    }
    if !open_files.is_empty() || image.is_some() {
        with_fs(k, move |_| {
            drop(open_files);
            if let Some(f) = image {
                f.allow_write();
                drop(f);
            }
        });
    }
    // Address space teardown: the thread record lets go first, then the
    // space itself is destroyed.
    drop(vm);
    drop(children);
    if let Some(info) = info {
        info.record_exit(status);
    }
    drop(cur);
    scheduler::retire_me(k)
}

/// Reap a child: block until it exits, return its status, and forget the
/// record. Fails with -1 for an unknown tid or a child already waited
/// for.
pub fn wait(k: &KernelRef, child_tid: Tid) -> isize {
    let cur = thread::current(k);
    let info = {
        let g = k.sched.lock();
        let found = cur
            .children
            .borrow()
            .iter()
            .find(|c| c.tid() == child_tid)
            .cloned();
        drop(g);
        found
    };
    let Some(info) = info else {
        return -1;
    };
    if info.waited.swap(true, Ordering::SeqCst) {
        return -1;
    }
    info.completion.down();
    let status = info.exit_status.load(Ordering::SeqCst);
    {
        let g = k.sched.lock();
        cur.children.borrow_mut().retain(|c| !Arc::ptr_eq(c, &info));
        drop(g);
    }
    status as isize
}
