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

//! Decodes sample files into engine-ready PCM.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{info, warn};

use super::Sample;
use crate::audio::CHANNELS;

/// Errors produced while loading a sample file.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Audio file error in {path}: {source}")]
    Audio {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("No audio track found in {0}")]
    NoTrack(PathBuf),

    #[error("Sample rate not specified in {0}")]
    UnknownSampleRate(PathBuf),
}

/// Loads sample files and converts them to interleaved stereo 16-bit PCM at the
/// engine sample rate.
pub struct SampleLoader {
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> SampleLoader {
        SampleLoader { target_sample_rate }
    }

    /// Loads and converts a sample file.
    pub fn load(&self, path: &Path) -> Result<Sample, SampleError> {
        info!(path = ?path, "Loading sample into memory");

        let (samples, channel_count, source_rate) = Self::decode(path)?;
        let stereo = Self::to_stereo(&samples, channel_count);

        let stereo = if source_rate != self.target_sample_rate {
            info!(
                source_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            Self::transcode_samples(&stereo, CHANNELS, source_rate, self.target_sample_rate)
        } else {
            stereo
        };

        let sample = Sample::new(
            stereo.into_iter().map(to_i16).collect(),
            self.target_sample_rate,
        );

        info!(
            path = ?path,
            channels = channel_count,
            sample_rate = self.target_sample_rate,
            duration_ms = sample.duration().as_millis(),
            "Sample loaded"
        );

        Ok(sample)
    }

    /// Decodes every packet of the first audio track into interleaved f32 samples.
    /// Returns the samples, the channel count and the sample rate.
    fn decode(path: &Path) -> Result<(Vec<f32>, u16, u32), SampleError> {
        let audio_err = |source| SampleError::Audio {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|source| SampleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(audio_err)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SampleError::NoTrack(path.to_path_buf()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SampleError::UnknownSampleRate(path.to_path_buf()))?;
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(audio_err)?;

        let mut samples = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(audio_err(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count() as u16;
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(path = ?path, err = e, "Skipping undecodable packet");
                }
                Err(e) => return Err(audio_err(e)),
            }
        }

        Ok((samples, channels.max(1), sample_rate))
    }

    /// Converts interleaved samples with any channel count to interleaved stereo.
    /// Mono is duplicated to both sides; channels beyond the second are dropped.
    fn to_stereo(samples: &[f32], channel_count: u16) -> Vec<f32> {
        match channel_count {
            2 => samples.to_vec(),
            1 => samples.iter().flat_map(|&s| [s, s]).collect(),
            n => samples
                .chunks_exact(n as usize)
                .flat_map(|frame| [frame[0], frame[1]])
                .collect(),
        }
    }

    /// Transcodes samples from one sample rate to another using linear interpolation.
    /// Linear interpolation is sufficient for drum hits and one-shots.
    fn transcode_samples(
        samples: &[f32],
        channel_count: u16,
        source_rate: u32,
        target_rate: u32,
    ) -> Vec<f32> {
        let ratio = target_rate as f64 / source_rate as f64;
        let channels = channel_count as usize;
        let source_frames = samples.len() / channels;
        let target_frames = (source_frames as f64 * ratio).ceil() as usize;

        let mut output = Vec::with_capacity(target_frames * channels);

        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let idx0 = source_frame * channels + channel;
                let idx1 = (source_frame + 1) * channels + channel;

                let s0 = samples.get(idx0).copied().unwrap_or(0.0);
                let s1 = samples.get(idx1).copied().unwrap_or(s0);

                output.push(s0 + (s1 - s0) * frac);
            }
        }

        output
    }
}

/// Converts a normalized float sample to 16-bit, saturating at full scale.
fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_load_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 44100, &[1000, -1000, 2000, -2000, i16::MAX, i16::MIN]).unwrap();

        let sample = SampleLoader::new(44100).load(&path).unwrap();
        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(
            sample.data(),
            &[1000, -1000, 2000, -2000, i16::MAX, i16::MIN]
        );
    }

    #[test]
    fn test_load_mono_wav_duplicates_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 44100, &[100, 200, 300]).unwrap();

        let sample = SampleLoader::new(44100).load(&path).unwrap();
        assert_eq!(sample.data(), &[100, 100, 200, 200, 300, 300]);
        assert_eq!(sample.frames(), 3);
    }

    #[test]
    fn test_load_transcodes_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("low.wav");
        let samples: Vec<i16> = (0..2205).map(|i| (i % 100) as i16 * 10).collect();
        write_wav(&path, 1, 22050, &samples).unwrap();

        let sample = SampleLoader::new(44100).load(&path).unwrap();
        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(sample.frames(), 4410);
        assert_eq!(&sample.data()[0..4], &[0, 0, 5, 5]);
    }

    #[test]
    fn test_missing_file() {
        let result = SampleLoader::new(44100).load(Path::new("/nonexistent/kick.wav"));
        assert!(matches!(result, Err(SampleError::Io { .. })));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        assert!(SampleLoader::new(44100).load(&path).is_err());
    }

    #[test]
    fn test_to_stereo_drops_extra_channels() {
        let stereo = SampleLoader::to_stereo(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3);
        assert_eq!(stereo, vec![0.1, 0.2, 0.4, 0.5]);
    }

    #[test]
    fn test_transcode_stereo() {
        // Stereo: L=1.0, R=-1.0 alternating
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

        let result = SampleLoader::transcode_samples(&source_samples, 2, 44100, 48000);

        // Check that channels are preserved
        assert!(result.len() >= 8);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }

    #[test]
    fn test_to_i16_saturates() {
        assert_eq!(to_i16(1.0), i16::MAX);
        assert_eq!(to_i16(-1.0), i16::MIN);
        assert_eq!(to_i16(2.5), i16::MAX);
        assert_eq!(to_i16(0.0), 0);
    }
}
