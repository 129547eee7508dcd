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

use crate::startup::{Kernel, KernelRef};
use alloc::{
    format,
    sync::{Arc, Weak},
};
use log::{LevelFilter, Metadata, Record};
use spin::Once;
use teal_platform::Machine;

static CONSOLE: Once<Arc<Machine>> = Once::new();
static KERNEL: Once<Weak<Kernel>> = Once::new();
static LOGGER: KernelLogger = KernelLogger;

struct KernelLogger;

/// Route the `log` facade through the machine console. Stamps come from
/// lock-free mirrors of the tick counter and the running tid, so logging
/// is legal anywhere, including inside critical sections.
pub(crate) fn init(kernel: &KernelRef) {
    CONSOLE.call_once(|| kernel.machine.clone());
    KERNEL.call_once(|| Arc::downgrade(kernel));
    if log::set_logger(&LOGGER).is_ok() {
        #[cfg(feature = "debugging_scheduler")]
        log::set_max_level(LevelFilter::Trace);
        #[cfg(not(feature = "debugging_scheduler"))]
        log::set_max_level(LevelFilter::Info);
    }
}

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(console) = CONSOLE.get() else {
            return;
        };
        let (ticks, tid) = KERNEL
            .get()
            .and_then(Weak::upgrade)
            .map(|k| (k.ticks_hint(), k.running_hint()))
            .unwrap_or((0, 0));
        console.console_write(&format!(
            "[T:{:06} TH:{}][{}] {}\n",
            ticks,
            tid,
            record.level(),
            record.args()
        ));
    }

    fn flush(&self) {}
}
