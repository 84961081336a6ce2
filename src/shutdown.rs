// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct Inner {
    running: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

/// The process-wide running flag. Every long-lived loop checks it, and clearing it
/// asks all of them to wind down.
///
/// Checking the flag never blocks, so the audio callback can look at it too.
#[derive(Clone)]
pub struct RunningFlag {
    inner: Arc<Inner>,
}

impl RunningFlag {
    /// Creates a new flag in the running state.
    pub fn new() -> RunningFlag {
        RunningFlag {
            inner: Arc::new(Inner {
                running: AtomicBool::new(true),
                lock: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Clears the flag and wakes everything waiting on it.
    pub fn stop(&self) {
        let _guard = self.inner.lock.lock();
        self.inner.running.store(false, Ordering::Release);
        self.inner.condvar.notify_all();
    }

    /// Blocks until the flag is cleared.
    pub fn wait(&self) {
        let mut guard = self.inner.lock.lock();
        while self.is_running() {
            self.inner.condvar.wait(&mut guard);
        }
    }

    /// Blocks until the flag is cleared or the timeout passes. Returns true if
    /// still running.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock.lock();
        if self.is_running() {
            self.inner.condvar.wait_for(&mut guard, timeout);
        }
        self.is_running()
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}
