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
use std::time::{Duration, Instant};

/// Wakes a loop on a fixed period measured from when the ticker started.
///
/// Tick `n` fires at `start + n * period`, so time spent between ticks never
/// accumulates into drift. Ticks that were missed entirely are skipped rather
/// than fired back to back.
pub struct Ticker {
    start: Instant,
    period: Duration,
    ticks: u64,
}

impl Ticker {
    /// Starts a ticker now.
    pub fn new(period: Duration) -> Ticker {
        Ticker::starting_at(Instant::now(), period)
    }

    pub fn starting_at(start: Instant, period: Duration) -> Ticker {
        Ticker {
            start,
            period,
            ticks: 0,
        }
    }
    /// When the next tick is due.
    pub fn deadline(&self) -> Instant {
        self.start + self.elapsed_at(self.ticks + 1)
    }

    /// Time from the start to the given tick. Exact for any tick count a
    /// process will live to see.
    fn elapsed_at(&self, tick: u64) -> Duration {
        let nanos = self.period.as_nanos() * tick as u128;
        let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
        Duration::new(secs, (nanos % 1_000_000_000) as u32)
    }

    /// Sleeps until the next tick. Returns the number of ticks that were skipped
    /// because the caller fell behind.
    pub fn wait(&mut self) -> u32 {
        let now = Instant::now();
        let deadline = self.deadline();
        if deadline > now {
            self.ticks += 1;
            spin_sleep::sleep(deadline.saturating_duration_since(Instant::now()));
            return 0;
        }

        let behind = now.duration_since(deadline);
        let skipped = u64::try_from(behind.as_nanos() / self.period.as_nanos().max(1))
            .unwrap_or(u64::MAX - self.ticks - 1);
        self.ticks += skipped + 1;
        u32::try_from(skipped).unwrap_or(u32::MAX)
    }
}
