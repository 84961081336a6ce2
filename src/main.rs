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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use drumloop::audio;
use drumloop::config::Machine;
use drumloop::controller::{keyboard, serial, Driver};
use drumloop::engine::Engine;
use drumloop::samples::SampleCache;
use drumloop::shutdown::RunningFlag;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=drumloop drum machine

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/drumloop
ExecStart=/usr/local/bin/drumloop start "$DRUMLOOP_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=drumloop.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A looping drum machine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the drum machine.
    Start {
        /// The path to the drum machine config.
        config_path: String,
        /// Read commands from the keyboard instead of the serial controller.
        #[arg(short, long)]
        keyboard: bool,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available serial ports.
    Ports {},
    /// Loads and verifies every instrument in the given config.
    Instruments {
        /// The path to the drum machine config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config_path,
            keyboard: use_keyboard,
        } => {
            let machine = Machine::deserialize(&PathBuf::from(&config_path))?;
            let driver: Arc<dyn Driver> = if use_keyboard {
                Arc::new(keyboard::Driver::new())
            } else {
                Arc::new(serial::Driver::new(&machine.serial())?)
            };
            let device = audio::get_device(&machine.audio())?;
            let running = RunningFlag::new();
            let engine = Engine::start(&machine, device, driver, running.clone())?;

            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Received interrupt, shutting down."),
                    Err(e) => error!(err = %e, "Unable to listen for interrupt, shutting down."),
                }
                running.stop();
            });

            tokio::task::spawn_blocking(move || engine.join()).await??;
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Ports {} => {
            let ports = serial::list_ports()?;

            if ports.is_empty() {
                println!("No serial ports found.");
                return Ok(());
            }

            println!("Ports:");
            for port in ports {
                println!("- {}", port);
            }
        }
        Commands::Instruments { config_path } => {
            let machine = Machine::deserialize(&PathBuf::from(&config_path))?;
            let cache = SampleCache::new(machine.instrument_table(), machine.audio().sample_rate());

            if cache.table().is_empty() {
                println!("No instruments configured.");
                return Ok(());
            }

            let mut failures = 0;
            println!("Instruments (count: {}):", cache.table().len());
            for (id, path) in cache.table().iter() {
                match cache.load(id) {
                    Ok(sample) => println!(
                        "- {}: {} ({:.3}s)",
                        id,
                        path.display(),
                        sample.duration().as_secs_f64()
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("- {}: {} FAILED: {}", id, path.display(), e);
                    }
                }
            }

            if failures > 0 {
                return Err(format!("{} instrument(s) failed to load", failures).into());
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
