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

//! Loop buffer mixing.
//!
//! All buffers are interleaved stereo 16-bit PCM holding exactly one bar. Every
//! arithmetic step saturates to the 16-bit range instead of wrapping.
//!
//! - [`TrackMix`] incrementally adds and erases sample hits in a track's private buffer.
//! - [`master_mix`] composites the active track buffers into the buffer handed to playback.

mod master;
mod track;

pub use master::{master_mix, LoopBuffer};
pub use track::TrackMix;

/// Clamps a widened sample back into the 16-bit signed range.
#[inline]
pub fn saturate(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Scales a sample by a gain, truncating toward zero.
///
/// Adds and erases must scale identically for an erase to invert its add.
#[inline]
pub fn scale(sample: i16, gain: f32) -> i32 {
    (sample as f32 * gain) as i32
}
