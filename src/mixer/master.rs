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
use std::sync::Arc;

use super::{saturate, scale};
use crate::sequencer::LoopingStatistics;

/// A one-bar master buffer together with the statistics it was mixed at. The two
/// always travel together.
#[derive(Clone, Debug)]
pub struct LoopBuffer {
    samples: Arc<[i16]>,
    stats: LoopingStatistics,
}

impl LoopBuffer {
    pub fn new(samples: Vec<i16>, stats: LoopingStatistics) -> LoopBuffer {
        LoopBuffer {
            samples: samples.into(),
            stats,
        }
    }

    /// A silent bar at the given statistics.
    pub fn silent(stats: LoopingStatistics) -> LoopBuffer {
        LoopBuffer::new(
            vec![0; stats.bar_length_frames() * crate::audio::CHANNELS as usize],
            stats,
        )
    }

    /// The interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn stats(&self) -> &LoopingStatistics {
        &self.stats
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }
}

/// Composites the active track buffers into a fresh master buffer of `len` samples.
///
/// Each track is attenuated by `1 / active.len()`, so adding or removing a track
/// changes the loudness of the others. With no active tracks the result is silence.
pub fn master_mix(len: usize, active: &[&[i16]]) -> Vec<i16> {
    let mut master = vec![0i16; len];
    if active.is_empty() {
        return master;
    }

    let gain = 1.0 / active.len() as f32;
    for track in active {
        for (out, &value) in master.iter_mut().zip(track.iter()) {
            *out = saturate(*out as i32 + scale(value, gain));
        }
    }

    master
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_no_active_tracks_is_silent() {
        let master = master_mix(16, &[]);
        assert_eq!(master, vec![0; 16]);
    }

    #[test]
    fn test_single_track_passes_through() {
        let track = vec![100, -200, 300, i16::MAX, i16::MIN];
        assert_eq!(master_mix(track.len(), &[&track]), track);
    }

    #[test]
    fn test_normalization() {
        let loud = vec![3000i16; 8];
        let silent = vec![0i16; 8];

        for k in 1..=5usize {
            let mut tracks: Vec<&[i16]> = vec![&loud];
            tracks.extend(std::iter::repeat(silent.as_slice()).take(k - 1));
            let master = master_mix(8, &tracks);
            assert_eq!(master[0], 3000 / k as i16, "wrong gain for {} tracks", k);
        }

        // k tracks at the same level sum back to that level.
        let tracks: Vec<&[i16]> = std::iter::repeat(loud.as_slice()).take(3).collect();
        assert_eq!(master_mix(8, &tracks), loud);
    }

    #[test]
    fn test_full_scale_tracks_stay_in_range() {
        let high = vec![i16::MAX; 4];
        let low = vec![i16::MIN; 4];
        let master = master_mix(4, &[&high, &high]);
        assert!(master.iter().all(|&s| s == i16::MAX - 1 || s == i16::MAX));
        let master = master_mix(4, &[&low, &low]);
        assert_eq!(master, low);
    }

    #[test]
    fn test_short_tracks_leave_tail_silent() {
        let track = vec![10i16; 2];
        assert_eq!(master_mix(4, &[&track]), vec![10, 10, 0, 0]);
    }
}
