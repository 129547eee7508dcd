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

//! Kernel time. A monotone tick counter drives sleep wake-ups and time
//! slicing. The clock collaborator delivers ticks in interrupt context
//! through `interrupt_tick`; in the sim backend that is the idle loop
//! and whatever running code stands in for the hardware timer line.

use crate::{config, scheduler, startup::KernelRef};

pub(crate) mod sleep;

pub const WAITING_FOREVER: u64 = u64::MAX;

/// Ticks since boot.
pub fn ticks(k: &KernelRef) -> u64 {
    k.sched.lock().ticks
}

pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * (1000 / config::TICKS_PER_SECOND)
}

/// Put the current thread to sleep until `ticks` ticks have elapsed.
/// Sleeping for 0 ticks is a plain yield.
pub fn sleep(k: &KernelRef, ticks: u64) {
    if ticks == 0 {
        scheduler::yield_me(k);
        return;
    }
    let mut g = k.sched.lock();
    assert!(!g.in_interrupt, "sleep in interrupt context");
    let cur = g.current().clone();
    assert!(!cur.is_idle(), "the idle thread cannot sleep");
    cur.wake_tick.set(g.ticks.saturating_add(ticks));
    g.sleepers.push(cur);
    let g = scheduler::block_current(k, g);
    drop(g);
}

/// One timer interrupt: advance the clock, wake expired sleepers, account
/// the time slice, and on the way out yield if a higher-priority thread
/// became ready or the slice ran dry.
pub fn interrupt_tick(k: &KernelRef) {
    assert!(
        k.machine.interrupts_enabled(),
        "timer interrupt delivered with interrupts off"
    );
    let fire = {
        let mut g = k.sched.lock();
        assert!(!g.in_interrupt, "timer interrupt re-entered");
        g.in_interrupt = true;
        g.ticks += 1;
        let now = g.ticks;
        k.note_tick(now);
        loop {
            let expired = match g.pop_expired(now) {
                Some(t) => t,
                None => break,
            };
            scheduler::unblock(&mut g, expired);
        }
        g.slice += 1;
        if g.slice >= config::TIME_SLICE {
            g.slice = 0;
            g.yield_pending = true;
        }
        let cur_pri = g.current().priority();
        if g
            .ready
            .front()
            .map(|t| t.priority() > cur_pri)
            .unwrap_or(false)
        {
            g.yield_pending = true;
        }
        g.in_interrupt = false;
        let fire = g.yield_pending;
        g.yield_pending = false;
        fire
    };
    if fire {
        scheduler::yield_me(k);
    }
}
