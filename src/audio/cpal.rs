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
use std::{error::Error, fmt};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thread_priority::ThreadPriorityValue;
use tracing::{error, info, span, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::{Device as AudioDevice, LoopReader, CHANNELS};
use crate::config;
use crate::shutdown::RunningFlag;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The sample rate to open the stream at.
    sample_rate: u32,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds the output callback. The loop is always read as 16-bit and converted to
/// whatever the device wants.
fn create_callback<T>(
    mut reader: LoopReader,
    priority: ThreadPriorityValue,
    rt_audio: bool,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let mut scratch: Vec<i16> = Vec::new();
    let mut priority_set = false;
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);

        scratch.resize(data.len(), 0);
        reader.fill(&mut scratch);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can output stereo.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels >= CHANNELS {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        sample_rate: super::DEFAULT_SAMPLE_RATE,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. "default" picks the default output device of the
    /// default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let sample_rate = config.sample_rate();

        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            return Ok(Device {
                name: device.name()?,
                max_channels: CHANNELS,
                host_id: host.id(),
                device,
                sample_rate,
            });
        }

        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(mut device) => {
                device.sample_rate = sample_rate;
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }

    fn build_stream(
        &self,
        reader: LoopReader,
        sample_format: cpal::SampleFormat,
    ) -> Result<cpal::Stream, Box<dyn Error>> {
        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let priority = callback_thread_priority();
        let rt_audio = rt_audio_enabled();
        let on_error = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::I16 => self.device.build_output_stream(
                &config,
                create_callback::<i16>(reader, priority, rt_audio),
                on_error,
                None,
            )?,
            cpal::SampleFormat::I32 => self.device.build_output_stream(
                &config,
                create_callback::<i32>(reader, priority, rt_audio),
                on_error,
                None,
            )?,
            _ => self.device.build_output_stream(
                &config,
                create_callback::<f32>(reader, priority, rt_audio),
                on_error,
                None,
            )?,
        };
        Ok(stream)
    }
}

impl AudioDevice for Device {
    fn play(&self, reader: LoopReader, running: RunningFlag) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "audio output (cpal)");
        let _enter = span.enter();

        let sample_format = self.device.default_output_config()?.sample_format();
        info!(
            device = self.name,
            sample_rate = self.sample_rate,
            ?sample_format,
            "Opening output stream"
        );

        let stream = self.build_stream(reader, sample_format)?;
        stream.play()?;
        info!("CPAL output stream started successfully");

        // The stream plays for as long as it's alive.
        running.wait();

        drop(stream);
        info!(device = self.name, "Output stream stopped");
        Ok(())
    }
}
