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
use std::io::Read;
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, span, trace, warn, Level};

use super::DriverError;
use crate::channel::ActionSender;
use crate::config;
use crate::protocol::{Action, DecodeError, FrameDecoder};
use crate::shutdown::RunningFlag;

/// How long to wait between passes over the port list while reconnecting.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("no serial port could be opened (tried {})", .tried.join(", "))]
    NoPort { tried: Vec<String> },

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
}

/// A driver that decodes frames from the controller hardware over a serial link.
pub struct Driver {
    ports: Vec<String>,
    baud_rate: u32,
    read_timeout: Duration,
    settle_delay: Duration,
}

impl Driver {
    pub fn new(config: &config::Serial) -> Result<Driver, config::ConfigError> {
        Ok(Driver {
            ports: config.ports(),
            baud_rate: config.baud_rate(),
            read_timeout: config.read_timeout()?,
            settle_delay: config.settle_delay()?,
        })
    }

    /// Opens a single port as 8N1 and gives the board time to reset.
    fn open(&self, name: &str, running: &RunningFlag) -> Result<Box<dyn SerialPort>, SerialError> {
        let port = serialport::new(name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open()?;

        // Opening the port resets most boards. Whatever they print while booting
        // is thrown away.
        running.wait_timeout(self.settle_delay);
        port.clear(ClearBuffer::All)?;
        Ok(port)
    }

    /// Tries each candidate port in order and returns the first one that opens.
    fn connect(&self, running: &RunningFlag) -> Option<(String, Box<dyn SerialPort>)> {
        for name in &self.ports {
            if !running.is_running() {
                return None;
            }
            match self.open(name, running) {
                Ok(port) => {
                    info!(port = %name, baud_rate = self.baud_rate, "Opened serial port.");
                    return Some((name.clone(), port));
                }
                Err(e) => debug!(port = %name, err = %e, "Unable to open serial port"),
            }
        }
        None
    }

    /// Waits until some port opens again. Returns None on shutdown.
    fn reconnect(&self, running: &RunningFlag) -> Option<(String, Box<dyn SerialPort>)> {
        loop {
            if let Some(connection) = self.connect(running) {
                return Some(connection);
            }
            if !running.wait_timeout(RECONNECT_INTERVAL) {
                return None;
            }
        }
    }
}

/// Moves decoded actions onto the channel until the connection fails or the
/// process shuts down.
fn pump<R: Read>(decoder: &mut FrameDecoder<R>, actions: &ActionSender) -> Result<(), DecodeError> {
    while actions.is_running() {
        match decoder.next_action()? {
            Some(Action::Noop) => trace!("Ignoring noop frame"),
            Some(action) => {
                debug!(%action, "Decoded action");
                if !actions.push(action) {
                    return Ok(());
                }
            }
            None => {}
        }
    }
    Ok(())
}

/// Pumps each connection until it fails, then asks `reconnect` for the next one.
/// Stops when `reconnect` gives up or the process shuts down.
fn run<R, F>(actions: &ActionSender, connection: (String, R), mut reconnect: F)
where
    R: Read,
    F: FnMut(&RunningFlag) -> Option<(String, R)>,
{
    let (mut name, transport) = connection;
    let mut decoder = FrameDecoder::new(transport);
    while let Err(e) = pump(&mut decoder, actions) {
        warn!(port = %name, err = %e, "Lost serial connection, reconnecting.");
        match reconnect(actions.running()) {
            Some((new_name, transport)) => {
                name = new_name;
                decoder = FrameDecoder::new(transport);
            }
            None => break,
        }
    }
    info!(port = %name, "Serial driver stopped.");
}

impl super::Driver for Driver {
    fn monitor_actions(&self, actions: ActionSender) -> Result<(), DriverError> {
        let span = span!(Level::INFO, "serial driver");
        let _enter = span.enter();

        let Some(connection) = self.connect(actions.running()) else {
            if !actions.is_running() {
                return Ok(());
            }
            return Err(SerialError::NoPort {
                tried: self.ports.clone(),
            }
            .into());
        };

        run(&actions, connection, |running| self.reconnect(running));
        Ok(())
    }
}

/// Lists the serial ports on this machine.
pub fn list_ports() -> Result<Vec<String>, SerialError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|port| port.port_name)
        .collect())
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::time::Instant;

    use super::*;
    use crate::channel::action_channel;
    use crate::controller::Driver as _;

    fn driver(ports: &[&str]) -> Driver {
        Driver {
            ports: ports.iter().map(|port| port.to_string()).collect(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_no_port_is_fatal() {
        let driver = driver(&["/nonexistent/ttyDRUM0", "/nonexistent/ttyDRUM1"]);
        let (tx, _rx) = action_channel(4, RunningFlag::new());

        let start = Instant::now();
        match driver.monitor_actions(tx) {
            Err(DriverError::Serial(SerialError::NoPort { tried })) => {
                assert_eq!(tried.len(), 2)
            }
            other => panic!("expected no port error, got {:?}", other),
        }
        // Nothing opened, so nothing waited for a reset.
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_shutdown_before_connect() {
        let driver = driver(&["/nonexistent/ttyDRUM0"]);
        let running = RunningFlag::new();
        running.stop();
        let (tx, _rx) = action_channel(4, running);
        assert!(driver.monitor_actions(tx).is_ok());
    }

    #[test]
    fn test_pump_until_closed() {
        let mut bytes = vec![0x13, 0x37];
        bytes.extend(Action::ToggleTrackBeat { track: 1, beat: 2 }.encode().unwrap());
        // Unknown message type.
        bytes.extend([0xAA, 0x42, 1, 0]);
        bytes.extend(Action::SetBpm { bpm: 100 }.encode().unwrap());

        let (tx, rx) = action_channel(8, RunningFlag::new());
        let mut decoder = FrameDecoder::new(Cursor::new(bytes));
        assert!(matches!(
            pump(&mut decoder, &tx),
            Err(DecodeError::Closed)
        ));
        assert_eq!(
            rx.drain().collect::<Vec<_>>(),
            vec![
                Action::ToggleTrackBeat { track: 1, beat: 2 },
                Action::SetBpm { bpm: 100 }
            ]
        );
    }

    #[test]
    fn test_reconnect_resumes_decoding() {
        let (tx, rx) = action_channel(8, RunningFlag::new());
        let first = Action::ToggleTrackBeat { track: 0, beat: 4 }.encode().unwrap();
        let mut second = Some((
            "ttyDRUM1".to_string(),
            Cursor::new(Action::SetBpm { bpm: 90 }.encode().unwrap()),
        ));

        let mut reconnects = 0;
        run(&tx, ("ttyDRUM0".to_string(), Cursor::new(first)), |running| {
            reconnects += 1;
            let next = second.take();
            if next.is_none() {
                // Nothing left to connect to, so shut down while reconnecting.
                running.stop();
            }
            next
        });

        assert_eq!(reconnects, 2);
        assert_eq!(
            rx.drain().collect::<Vec<_>>(),
            vec![
                Action::ToggleTrackBeat { track: 0, beat: 4 },
                Action::SetBpm { bpm: 90 }
            ]
        );
        assert!(!tx.is_running());
    }

    #[test]
    fn test_reconnect_gives_up_on_shutdown() {
        let driver = driver(&["/nonexistent/ttyDRUM0"]);
        let running = RunningFlag::new();
        let stopper = {
            let running = running.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                running.stop();
            })
        };

        let start = Instant::now();
        assert!(driver.reconnect(&running).is_none());
        // Woken by the shutdown rather than sleeping out the interval.
        assert!(start.elapsed() < RECONNECT_INTERVAL);
        stopper.join().unwrap();
    }

    #[test]
    fn test_pump_stops_on_shutdown() {
        let running = RunningFlag::new();
        let (tx, rx) = action_channel(8, running.clone());
        running.stop();

        let bytes = Action::ClearAll.encode().unwrap();
        let mut decoder = FrameDecoder::new(Cursor::new(bytes));
        assert!(pump(&mut decoder, &tx).is_ok());
        assert_eq!(rx.drain().count(), 0);
    }
}
