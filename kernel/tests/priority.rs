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

//! Priority scheduling, donation through locks, and the sync primitives
//! built on the scheduler.

mod common;

use common::{boot, events, record, snapshot};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use teal_kconfig::{DONATION_DEPTH, PRI_DEFAULT, PRI_MAX};
use teal_kernel::{
    sync::{Condvar, Mutex, Semaphore},
    thread, time,
};

#[test]
fn creating_a_higher_priority_thread_preempts_the_creator() {
    let (k, _machine, _fs) = boot();
    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        thread::spawn(&k, "hi", PRI_MAX, move || {
            ran.store(true, Ordering::SeqCst);
        });
    }
    // The new thread already ran to completion.
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn set_priority_round_trips_and_yields_when_lowered() {
    let (k, _machine, _fs) = boot();
    assert_eq!(thread::get_priority(&k), PRI_DEFAULT);

    thread::set_priority(&k, 45);
    assert_eq!(thread::get_priority(&k), 45);

    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        thread::spawn(&k, "mid", 40, move || {
            ran.store(true, Ordering::SeqCst);
        });
    }
    // 40 < 45: no preemption yet.
    assert!(!ran.load(Ordering::SeqCst));

    // Dropping below the waiter hands the CPU over on the spot.
    thread::set_priority(&k, 20);
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(thread::get_priority(&k), 20);
}

#[test]
fn raising_a_ready_thread_above_the_runner_preempts() {
    let (k, _machine, _fs) = boot();
    let ran = Arc::new(AtomicBool::new(false));
    let t = {
        let ran = ran.clone();
        thread::spawn(&k, "boosted", 20, move || {
            ran.store(true, Ordering::SeqCst);
        })
    };
    assert!(!ran.load(Ordering::SeqCst));
    thread::set_priority_of(&k, &t, 50);
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(t.base_priority(), 50);
}

#[test]
fn nested_donation_raises_the_whole_chain() {
    let (k, _machine, _fs) = boot();
    let a = Mutex::new(&k);
    let b = Mutex::new(&k);

    a.lock();
    assert_eq!(thread::get_priority(&k), PRI_DEFAULT);

    {
        let kk = k.clone();
        let a = a.clone();
        let b = b.clone();
        thread::spawn(&k, "mid", 32, move || {
            b.lock();
            a.lock();
            // Resumed once main released A; high still waits on B.
            assert_eq!(thread::get_priority(&kk), 40);
            a.unlock();
            b.unlock();
            assert_eq!(thread::get_priority(&kk), 32);
        });
    }
    // mid ran, took B, and now blocks on A donating to us.
    assert_eq!(thread::get_priority(&k), 32);

    {
        let kk = k.clone();
        let b = b.clone();
        thread::spawn(&k, "high", 40, move || {
            b.lock();
            assert_eq!(thread::get_priority(&kk), 40);
            b.unlock();
        });
    }
    // high blocks on B; its priority flows through mid to us.
    assert_eq!(thread::get_priority(&k), 40);

    a.unlock();
    // Donation through A is gone and mid outranks us from here on.
    assert_eq!(thread::get_priority(&k), PRI_DEFAULT);
}

#[test]
fn donations_from_two_locks_fall_away_one_by_one() {
    let (k, _machine, _fs) = boot();
    let a = Mutex::new(&k);
    let b = Mutex::new(&k);

    a.lock();
    b.lock();

    {
        let a = a.clone();
        thread::spawn(&k, "x", 33, move || {
            a.lock();
            a.unlock();
        });
    }
    assert_eq!(thread::get_priority(&k), 33);

    {
        let b = b.clone();
        thread::spawn(&k, "y", 36, move || {
            b.lock();
            b.unlock();
        });
    }
    assert_eq!(thread::get_priority(&k), 36);

    // x is woken but y still donates through B.
    a.unlock();
    assert_eq!(thread::get_priority(&k), 36);

    b.unlock();
    assert_eq!(thread::get_priority(&k), PRI_DEFAULT);
}

#[test]
fn donation_stops_at_the_hop_limit() {
    let (k, _machine, _fs) = boot();
    let count = DONATION_DEPTH + 2;
    let locks: Vec<Arc<Mutex>> = (0..count).map(|_| Mutex::new(&k)).collect();
    let head_gate = Arc::new(Semaphore::new(&k, 0));

    let mut chain = Vec::new();
    for i in 0..count {
        let own = locks[i].clone();
        let prev = (i > 0).then(|| locks[i - 1].clone());
        let gate = head_gate.clone();
        let name = format!("link{i}");
        let t = thread::spawn(&k, &name, 32 + i as u8, move || {
            own.lock();
            match prev {
                // Block on the predecessor's lock, donating down the
                // chain.
                Some(prev) => {
                    prev.lock();
                    prev.unlock();
                }
                // Head of the chain parks holding its lock.
                None => gate.down(),
            }
            own.unlock();
        });
        chain.push(t);
    }

    // The last link's priority reached through DONATION_DEPTH holders
    // and no further.
    let last_priority = 32 + (count as u8) - 1;
    assert_eq!(chain[1].priority(), last_priority);
    assert_eq!(chain[DONATION_DEPTH].priority(), last_priority);
    // The head saw only the donation that was within reach.
    assert_eq!(chain[0].priority(), last_priority - 1);

    // Unwind: the head releases and the chain cascades down.
    head_gate.up();
    for t in &chain {
        assert_eq!(t.priority(), t.base_priority());
    }
}

#[test]
fn semaphore_wakes_waiters_by_priority() {
    let (k, _machine, _fs) = boot();
    let sema = Arc::new(Semaphore::new(&k, 0));
    let ev = events();

    for (name, priority) in [("w35", 35u8), ("w33", 33), ("w34", 34)] {
        let sema = sema.clone();
        let ev = ev.clone();
        let kk = k.clone();
        thread::spawn(&k, name, priority, move || {
            sema.down();
            record(&ev, name, time::ticks(&kk));
        });
    }
    sema.up();
    sema.up();
    sema.up();
    let order: Vec<&str> = snapshot(&ev).iter().map(|(n, _)| *n).collect();
    assert_eq!(order, ["w35", "w34", "w33"]);
}

#[test]
fn semaphore_up_after_down_restores_the_value() {
    let (k, _machine, _fs) = boot();
    let sema = Semaphore::new(&k, 1);
    sema.down();
    assert_eq!(sema.value(), 0);
    sema.up();
    assert_eq!(sema.value(), 1);
    assert!(sema.try_down());
    assert!(!sema.try_down());
}

#[test]
fn condvar_signals_the_highest_priority_waiter() {
    let (k, _machine, _fs) = boot();
    let lock = Mutex::new(&k);
    let cond = Arc::new(Condvar::new(&k));
    let ev = events();

    for (name, priority) in [("low", 33u8), ("high", 36)] {
        let lock = lock.clone();
        let cond = cond.clone();
        let ev = ev.clone();
        let kk = k.clone();
        thread::spawn(&k, name, priority, move || {
            lock.lock();
            cond.wait(&lock);
            record(&ev, name, time::ticks(&kk));
            lock.unlock();
        });
    }

    lock.lock();
    cond.signal(&lock);
    lock.unlock();
    lock.lock();
    cond.signal(&lock);
    lock.unlock();

    let order: Vec<&str> = snapshot(&ev).iter().map(|(n, _)| *n).collect();
    assert_eq!(order, ["high", "low"]);
}

#[test]
fn condvar_wakeup_is_mesa_style() {
    let (k, _machine, _fs) = boot();
    let lock = Mutex::new(&k);
    let cond = Arc::new(Condvar::new(&k));
    let ready = Arc::new(AtomicBool::new(false));
    let consumed = Arc::new(AtomicBool::new(false));

    {
        let lock = lock.clone();
        let cond = cond.clone();
        let ready = ready.clone();
        let consumed = consumed.clone();
        thread::spawn(&k, "consumer", 35, move || {
            lock.lock();
            // Woken consumers re-check; the signal carries no predicate.
            while !ready.load(Ordering::SeqCst) {
                cond.wait(&lock);
            }
            consumed.store(true, Ordering::SeqCst);
            lock.unlock();
        });
    }

    // Signal without making the predicate true: the consumer must go
    // back to waiting instead of proceeding.
    lock.lock();
    cond.signal(&lock);
    lock.unlock();
    assert!(!consumed.load(Ordering::SeqCst));

    lock.lock();
    ready.store(true, Ordering::SeqCst);
    cond.signal(&lock);
    lock.unlock();
    assert!(consumed.load(Ordering::SeqCst));
}

#[test]
fn condvar_broadcast_wakes_everyone() {
    let (k, _machine, _fs) = boot();
    let lock = Mutex::new(&k);
    let cond = Arc::new(Condvar::new(&k));
    let ev = events();

    for name in ["p", "q", "r"] {
        let lock = lock.clone();
        let cond = cond.clone();
        let ev = ev.clone();
        let kk = k.clone();
        thread::spawn(&k, name, 33, move || {
            lock.lock();
            cond.wait(&lock);
            record(&ev, name, time::ticks(&kk));
            lock.unlock();
        });
    }

    lock.lock();
    cond.broadcast(&lock);
    lock.unlock();
    assert_eq!(snapshot(&ev).len(), 3);
}

#[test]
#[should_panic(expected = "re-acquired")]
fn recursive_acquire_is_fatal() {
    let (k, _machine, _fs) = boot();
    let lock = Mutex::new(&k);
    lock.lock();
    lock.lock();
}

#[test]
#[should_panic(expected = "not held")]
fn releasing_an_unheld_lock_is_fatal() {
    let (k, _machine, _fs) = boot();
    let lock = Mutex::new(&k);
    lock.unlock();
}
