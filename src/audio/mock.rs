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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::{info, span, Level};

use super::{LoopReader, CHANNELS};
use crate::clock::Ticker;
use crate::shutdown::RunningFlag;

/// A mock device. Pulls chunks in real time like a sound card would, but doesn't
/// actually play anything.
#[derive(Clone)]
pub struct Device {
    name: String,
    is_playing: Arc<AtomicBool>,
    /// Total frames pulled so far.
    frames: Arc<AtomicUsize>,
    /// Whether any pulled chunk had sound in it.
    heard: Arc<AtomicBool>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            is_playing: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicUsize::new(0)),
            heard: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true if the device is currently playing.
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    pub fn frames_pulled(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }

    /// Returns true if anything but silence has been pulled, and resets the flag.
    pub fn take_heard(&self) -> bool {
        self.heard.swap(false, Ordering::Relaxed)
    }
}

fn chunk_period(reader: &LoopReader) -> Duration {
    Duration::from_secs_f64(reader.chunk_frames() as f64 / reader.sample_rate() as f64)
}

impl super::Device for Device {
    fn play(&self, mut reader: LoopReader, running: RunningFlag) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "audio output (mock)");
        let _enter = span.enter();

        info!(device = self.name, "Starting mock output.");
        self.is_playing.store(true, Ordering::Relaxed);

        let mut chunk = Vec::new();
        let mut period = chunk_period(&reader);
        let mut ticker = Ticker::new(period);
        while running.is_running() {
            reader.next_chunk(&mut chunk);
            self.frames
                .fetch_add(chunk.len() / CHANNELS as usize, Ordering::Relaxed);
            if chunk.iter().any(|&s| s != 0) {
                self.heard.store(true, Ordering::Relaxed);
            }

            // The chunk size follows the tempo.
            let next_period = chunk_period(&reader);
            if next_period != period {
                period = next_period;
                ticker = Ticker::starting_at(ticker.deadline(), period);
            }
            ticker.wait();
        }

        self.is_playing.store(false, Ordering::Relaxed);
        info!(device = self.name, "Mock output stopped.");
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
