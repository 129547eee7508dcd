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

use crate::{scheduler, startup::KernelRef, time};

/// Body of the idle thread. Reclaims retired threads, then either gives
/// way to runnable work or lets the clock advance; waking a sleeper makes
/// the tick's exit path preempt us.
pub(crate) fn idle_loop(k: KernelRef) -> ! {
    loop {
        let runnable = {
            let mut g = k.sched.lock();
            g.zombies.reclaim();
            !g.ready.is_empty()
        };
        if runnable {
            scheduler::yield_me(&k);
            continue;
        }
        time::interrupt_tick(&k);
    }
}
