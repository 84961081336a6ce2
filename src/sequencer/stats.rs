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
use std::fmt;

use super::{BEATS_PER_BAR, N_TRACK_SUBDIVISIONS};

/// Tempo-derived frame counts that govern loop buffer sizing and subdivision timing.
///
/// The subdivision width is derived first so that a bar is always an exact
/// multiple of it: `frames_per_subdivision * N_TRACK_SUBDIVISIONS == bar_length_frames`
/// and `beat_interval_frames * BEATS_PER_BAR == bar_length_frames`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopingStatistics {
    bpm: u8,
    sample_rate: u32,
    beat_interval_frames: usize,
    bar_length_frames: usize,
    frames_per_subdivision: usize,
}

impl LoopingStatistics {
    /// Computes the statistics for the given tempo. Returns None for a tempo of zero.
    pub fn from_bpm(bpm: u8, sample_rate: u32) -> Option<LoopingStatistics> {
        if bpm == 0 {
            return None;
        }

        let subdivisions_per_beat = N_TRACK_SUBDIVISIONS / BEATS_PER_BAR;
        let frames_per_subdivision =
            sample_rate as usize * 60 / (bpm as usize * subdivisions_per_beat);

        Some(LoopingStatistics {
            bpm,
            sample_rate,
            beat_interval_frames: frames_per_subdivision * subdivisions_per_beat,
            bar_length_frames: frames_per_subdivision * N_TRACK_SUBDIVISIONS,
            frames_per_subdivision,
        })
    }

    /// The tempo these statistics were derived from.
    pub fn bpm(&self) -> u8 {
        self.bpm
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn beat_interval_frames(&self) -> usize {
        self.beat_interval_frames
    }

    pub fn bar_length_frames(&self) -> usize {
        self.bar_length_frames
    }

    pub fn frames_per_subdivision(&self) -> usize {
        self.frames_per_subdivision
    }

    /// The frame offset of the given subdivision from the start of the bar.
    pub fn subdivision_offset(&self, subdivision: usize) -> usize {
        subdivision * self.frames_per_subdivision
    }
}

impl fmt::Display for LoopingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bpm ({} frames/bar, {} frames/subdivision)",
            self.bpm, self.bar_length_frames, self.frames_per_subdivision
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_bpm_rejected() {
        assert!(LoopingStatistics::from_bpm(0, 44100).is_none());
    }

    #[test]
    fn test_bar_is_exact_multiple_for_every_bpm() {
        for bpm in 1..=u8::MAX {
            let stats = LoopingStatistics::from_bpm(bpm, 44100).unwrap();
            assert_eq!(
                stats.frames_per_subdivision() * N_TRACK_SUBDIVISIONS,
                stats.bar_length_frames(),
                "subdivisions don't tile the bar at {} bpm",
                bpm
            );
            assert_eq!(
                stats.beat_interval_frames() * BEATS_PER_BAR,
                stats.bar_length_frames(),
                "beats don't tile the bar at {} bpm",
                bpm
            );
        }
    }

    #[test]
    fn test_120_bpm() {
        let stats = LoopingStatistics::from_bpm(120, 44100).unwrap();
        assert_eq!(stats.frames_per_subdivision(), 5512);
        assert_eq!(stats.beat_interval_frames(), 22048);
        assert_eq!(stats.bar_length_frames(), 88192);
        assert_eq!(stats.subdivision_offset(4), stats.beat_interval_frames());
    }

    #[test]
    fn test_bpm_change_leaves_no_residue() {
        let slow = LoopingStatistics::from_bpm(60, 48000).unwrap();
        let fast = LoopingStatistics::from_bpm(120, 48000).unwrap();
        assert_eq!(slow.bar_length_frames(), fast.bar_length_frames() * 2);
        assert_eq!(
            fast,
            LoopingStatistics::from_bpm(120, 48000).unwrap(),
            "statistics should only depend on bpm and sample rate"
        );
    }
}
