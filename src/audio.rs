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
use std::{error::Error, fmt, sync::Arc};

use crate::config;
use crate::shutdown::RunningFlag;

pub mod cpal;
pub mod looper;
pub mod mock;
pub mod thread_priority;

pub use looper::{LoopPlayer, LoopReader};

/// Output is always interleaved stereo.
pub const CHANNELS: u16 = 2;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Plays the loop from the reader until the running flag is cleared.
    fn play(&self, reader: LoopReader, running: RunningFlag) -> Result<(), Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the audio configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
