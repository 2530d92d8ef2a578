// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

// Reliable link layer over a serial line
mod app;
mod error;
mod frame;
mod link;
mod protocol;
mod receiver;
mod serial;
mod timer;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use log::{error, info};
use serialport::{DataBits, Parity, StopBits};
use std::path::PathBuf;
use std::time::Duration;
use app::DATA_HEADER_LEN;
use error::AppError;
use link::{Disconnected, Link, LinkConfig, Role};
use serial::RealSerialPort;

#[derive(Parser)]
#[command(name = "serlink")]
#[command(about = "Stop-and-wait reliable file transfer over an RS-232 line", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS")]
    stop_bits: u8,

    /// Transmissions of a frame before giving up
    #[arg(short, long, default_value = "3", value_name = "N",
          value_parser = clap::value_parser!(u32).range(1..))]
    retransmissions: u32,

    /// Seconds to wait for a reply before retransmitting
    #[arg(short, long, default_value = "3", value_name = "SECS",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Largest payload carried by one information frame
    #[arg(long, default_value_t = protocol::MAX_PAYLOAD_SIZE, value_name = "BYTES",
          value_parser = RangedU64ValueParser::<usize>::new()
              .range(DATA_HEADER_LEN as u64 + 1..=protocol::MAX_PAYLOAD_LIMIT as u64))]
    max_payload: usize,

    /// Print link statistics when the connection closes
    #[arg(long)]
    statistics: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file, initiating the connection
    Send {
        /// File to send
        file: PathBuf,
    },
    /// Wait for a connection and receive one file
    Receive {
        /// Directory to save the received file
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn parse_data_bits(bits: u8) -> Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity)),
    }
}

fn parse_stop_bits(bits: u8) -> Result<StopBits, String> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(format!("Invalid stop bits: {}. Must be 1 or 2", bits)),
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let line_settings = parse_data_bits(cli.data_bits).and_then(|data_bits| {
        Ok((data_bits, parse_parity(&cli.parity)?, parse_stop_bits(cli.stop_bits)?))
    });
    let (data_bits, parity, stop_bits) = match line_settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let role = match cli.command {
        Commands::Send { .. } => Role::Initiator,
        Commands::Receive { .. } => Role::Responder,
    };
    let config = LinkConfig {
        port: cli.port.clone(),
        role,
        baud_rate: cli.baud,
        retransmissions: cli.retransmissions,
        timeout: Duration::from_secs(cli.timeout),
        max_payload: cli.max_payload,
    };

    info!("Opening serial port: {}", config.port);
    info!("Settings: {} baud, {:?}, {:?}, {:?}", config.baud_rate, data_bits, parity, stop_bits);

    let serial_port = match RealSerialPort::open(&config.port, config.baud_rate, data_bits, parity, stop_bits) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };

    let link = Link::new(Box::new(serial_port), config);
    let result = match cli.command {
        Commands::Send { file } => send(link, file, cli.statistics),
        Commands::Receive { output_dir } => receive(link, output_dir, cli.statistics),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Transfer failed: {}", e);
        std::process::exit(1);
    }
}

fn send(link: Link<Disconnected>, file: PathBuf, statistics: bool) -> Result<(), AppError> {
    if !file.exists() {
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", file.display()),
        )));
    }

    let mut link = link.open()?;
    let sent = app::send_file(&mut link, &file)?;
    link.close(statistics)?;
    info!("File sent successfully ({} bytes)", sent);
    Ok(())
}

fn receive(link: Link<Disconnected>, output_dir: PathBuf, statistics: bool) -> Result<(), AppError> {
    if !output_dir.is_dir() {
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Output directory not found: {}", output_dir.display()),
        )));
    }

    let mut link = link.open()?;
    let path = app::receive_file(&mut link, &output_dir)?;
    link.close(statistics)?;
    info!("File received successfully: {}", path.display());
    Ok(())
}
