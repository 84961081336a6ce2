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

//! The double-buffered loop player.
//!
//! The mixing thread publishes master buffers through a [`LoopPlayer`] and the audio
//! output pulls samples through the paired [`LoopReader`]. They share two slots, the
//! index of the slot being played and a pending flag, all behind one mutex. Publishing
//! writes the slot that isn't playing and raises the flag. The reader only swaps at
//! the top of a pull or when the loop wraps, never partway through copying, and the
//! copy itself happens without the lock held.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::CHANNELS;
use crate::mixer::{saturate, LoopBuffer};
use crate::samples::Sample;

struct Slots {
    buffers: [LoopBuffer; 2],
    /// The slot being played.
    current: usize,
    /// A freshly published buffer waits in the other slot.
    pending: bool,
    paused: bool,
    /// Set on every pause or resume. The reader goes back to the downbeat when it
    /// sees this, even if it never saw the paused state in between.
    rewind: bool,
    /// A one-shot sample waiting to be picked up by the reader.
    audition: Option<Arc<Sample>>,
}

impl Slots {
    /// Makes the pending slot current, if there is one.
    fn swap(&mut self) -> Option<LoopBuffer> {
        if !self.pending {
            return None;
        }
        self.current ^= 1;
        self.pending = false;
        Some(self.buffers[self.current].clone())
    }
}

/// The publishing side of the player. Owned by the mixing thread.
pub struct LoopPlayer {
    slots: Arc<Mutex<Slots>>,
}

impl LoopPlayer {
    /// Creates a player that starts out looping the given buffer.
    pub fn new(initial: LoopBuffer) -> (LoopPlayer, LoopReader) {
        let slots = Arc::new(Mutex::new(Slots {
            buffers: [initial.clone(), initial.clone()],
            current: 0,
            pending: false,
            paused: false,
            rewind: false,
            audition: None,
        }));

        let reader = LoopReader {
            slots: slots.clone(),
            buffer: initial,
            position: 0,
            paused: false,
            voice: None,
        };
        (LoopPlayer { slots }, reader)
    }

    /// Hands a new master buffer to the reader. It's picked up at the next pull
    /// or loop boundary. A buffer published before the previous one was picked up
    /// replaces it.
    pub fn publish(&self, buffer: LoopBuffer) {
        let mut slots = self.slots.lock();
        let next = slots.current ^ 1;
        // The displaced buffer is freed here rather than on the audio thread.
        let _old = std::mem::replace(&mut slots.buffers[next], buffer);
        slots.pending = true;
    }

    /// Pausing outputs silence. Pausing and resuming both rewind to the downbeat.
    pub fn set_paused(&self, paused: bool) {
        let mut slots = self.slots.lock();
        slots.paused = paused;
        slots.rewind = true;
    }

    /// Plays a sample once on top of the loop. Replaces any audition in progress.
    pub fn audition(&self, sample: Arc<Sample>) {
        self.slots.lock().audition = Some(sample);
    }
}

/// The pulling side of the player. Owned by the audio output.
pub struct LoopReader {
    slots: Arc<Mutex<Slots>>,
    /// The buffer being played.
    buffer: LoopBuffer,
    /// Playback position as a sample index into the buffer.
    position: usize,
    paused: bool,
    /// The audition being played and its sample position.
    voice: Option<(Arc<Sample>, usize)>,
}

impl LoopReader {
    /// Picks up published state. Never waits for the lock; if the publisher holds
    /// it, this pull keeps going with what it has.
    fn sync(&mut self) {
        let Some(mut slots) = self.slots.try_lock() else {
            return;
        };
        let swapped = slots.swap();
        let paused = slots.paused;
        let rewind = std::mem::take(&mut slots.rewind);
        let audition = slots.audition.take();
        drop(slots);

        if let Some(buffer) = swapped {
            self.swap_to(buffer);
        }
        if rewind {
            self.position = 0;
        }
        self.paused = paused;
        if let Some(sample) = audition {
            self.voice = Some((sample, 0));
        }
    }

    /// Switches buffers, keeping the same place in the bar.
    fn swap_to(&mut self, buffer: LoopBuffer) {
        let channels = CHANNELS as usize;
        let old_width = self.buffer.stats().frames_per_subdivision().max(1);
        let new_width = buffer.stats().frames_per_subdivision();

        let frame = self.position / channels;
        let subdivision = frame / old_width;
        let into = (frame % old_width).min(new_width.saturating_sub(1));
        let position = (subdivision * new_width + into) * channels + self.position % channels;

        if new_width != old_width {
            debug!(subdivision, stats = %buffer.stats(), "Swapped to new tempo");
        }

        self.position = if position < buffer.samples().len() {
            position
        } else {
            0
        };
        self.buffer = buffer;
    }

    /// Fills the output with interleaved stereo samples, looping the bar.
    pub fn fill(&mut self, out: &mut [i16]) {
        self.sync();

        let mut written = 0;
        while written < out.len() {
            if self.paused || self.buffer.samples().is_empty() {
                out[written..].fill(0);
                break;
            }

            let samples = self.buffer.samples();
            let n = (samples.len() - self.position).min(out.len() - written);
            out[written..written + n].copy_from_slice(&samples[self.position..self.position + n]);
            written += n;
            self.position += n;

            if self.position >= samples.len() {
                self.position = 0;
                // Start of a new loop iteration.
                self.sync();
            }
        }

        self.mix_voice(out);
    }

    /// Mixes the audition in on top of whatever was just written.
    fn mix_voice(&mut self, out: &mut [i16]) {
        let Some((sample, position)) = &mut self.voice else {
            return;
        };
        let data = sample.data();
        let n = (data.len() - *position).min(out.len());
        for (dst, &src) in out.iter_mut().zip(&data[*position..*position + n]) {
            *dst = saturate(*dst as i32 + src as i32);
        }
        *position += n;
        if *position >= data.len() {
            self.voice = None;
        }
    }

    /// Number of frames in one pull chunk: one subdivision of the current buffer.
    pub fn chunk_frames(&self) -> usize {
        self.buffer.stats().frames_per_subdivision()
    }

    /// Pulls the next chunk of one subdivision into the given buffer.
    pub fn next_chunk(&mut self, out: &mut Vec<i16>) {
        // Sync first so the chunk is sized for the buffer it will come from.
        self.sync();
        out.clear();
        out.resize(self.chunk_frames() * CHANNELS as usize, 0);
        self.fill(out);
    }

    /// The current playback frame within the bar.
    pub fn frame(&self) -> usize {
        self.position / CHANNELS as usize
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.stats().sample_rate()
    }
}
