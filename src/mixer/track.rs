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
use crate::audio::CHANNELS;
use crate::sequencer::LoopingStatistics;

use super::{saturate, scale};

/// A track's private one-bar loop buffer.
///
/// Hits are mixed in and out incrementally. An [`TrackMix::erase`] exactly inverts
/// a prior [`TrackMix::add`] made with the same sample, offset and volume, unless the
/// add saturated.
pub struct TrackMix {
    buffer: Vec<i16>,
}

impl TrackMix {
    /// Creates a silent buffer one bar long at the given statistics.
    pub fn new(stats: &LoopingStatistics) -> TrackMix {
        TrackMix {
            buffer: vec![0; stats.bar_length_frames() * CHANNELS as usize],
        }
    }

    /// Discards the contents and resizes to one silent bar at the given statistics.
    pub fn reset(&mut self, stats: &LoopingStatistics) {
        self.buffer.clear();
        self.buffer
            .resize(stats.bar_length_frames() * CHANNELS as usize, 0);
    }

    /// Mixes an interleaved stereo sample into the buffer starting at the given frame.
    pub fn add(&mut self, sample: &[i16], frame_offset: usize, volume: f32) {
        self.apply(sample, frame_offset, volume, 1);
    }

    /// Removes a previously added sample from the buffer.
    pub fn erase(&mut self, sample: &[i16], frame_offset: usize, volume: f32) {
        self.apply(sample, frame_offset, volume, -1);
    }

    fn apply(&mut self, sample: &[i16], frame_offset: usize, volume: f32, sign: i32) {
        let channels = CHANNELS as usize;
        let start = frame_offset * channels;
        if start >= self.buffer.len() {
            return;
        }

        // Anything past the end of the bar is dropped; there is no wraparound.
        let destination = &mut self.buffer[start..];
        for (mixed, frame) in destination
            .chunks_exact_mut(channels)
            .zip(sample.chunks_exact(channels))
        {
            for (out, &value) in mixed.iter_mut().zip(frame) {
                *out = saturate(*out as i32 + sign * scale(value, volume));
            }
        }
    }

    /// The interleaved loop buffer.
    pub fn buffer(&self) -> &[i16] {
        &self.buffer
    }

    /// Number of frames in the buffer.
    pub fn frames(&self) -> usize {
        self.buffer.len() / CHANNELS as usize
    }

    pub fn is_silent(&self) -> bool {
        self.buffer.iter().all(|&s| s == 0)
    }
}
