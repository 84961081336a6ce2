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
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};

/// Ports tried in order when none are configured.
pub const DEFAULT_PORTS: [&str; 5] = [
    "/dev/tty.usbmodem12301",
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
    "/dev/ttyACM0",
    "/dev/ttyACM1",
];
const DEFAULT_BAUD_RATE: u32 = 9600;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// A YAML representation of the serial link to the controller hardware.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Serial {
    /// Candidate ports, tried in order.
    ports: Option<Vec<String>>,

    /// Baud rate (default: 9600)
    baud_rate: Option<u32>,

    /// How long a single read may stall before it gives up (default: 100ms).
    read_timeout: Option<String>,

    /// How long to wait after opening a port for the board to reset (default: 500ms).
    settle_delay: Option<String>,
}

impl Serial {
    /// Returns the candidate ports.
    pub fn ports(&self) -> Vec<String> {
        match &self.ports {
            Some(ports) => ports.clone(),
            None => DEFAULT_PORTS.iter().map(|port| port.to_string()).collect(),
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE)
    }

    pub fn read_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("serial.read_timeout", &self.read_timeout, DEFAULT_READ_TIMEOUT)
    }

    pub fn settle_delay(&self) -> Result<Duration, ConfigError> {
        parse_duration("serial.settle_delay", &self.settle_delay, DEFAULT_SETTLE_DELAY)
    }
}
