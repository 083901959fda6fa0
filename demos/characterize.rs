//! Characterization run: set a current source on the LNBoard, sweep the SMU across its output
//! and print the measured currents.
//!
//! Usage: `cargo run --example characterize [BUS_PIRATE_PORT] [SMU_HOST:PORT]`
//!
//! Log output is controlled with `RUST_LOG`, e.g. `RUST_LOG=lnboard=debug`.

use std::{env, net::TcpStream, time::Duration};

use fugit::MicrosDurationU32;
use inquire::{Select, Text};
use lnboard::{
    board::{BoardConfig, LnBoard, LnChips},
    bus::MuxedBus,
    buspirate::{BusPirate, Peripherals, Speed},
    pca9542a::Pca9542a,
    smu::{Smu, SmuChannel, SourceMode, Sweep},
};

// Configuration constants - adjust these for your setup
const BUS_PIRATE_BAUD_RATE: u32 = 115200;
const SERIAL_TIMEOUT_MS: u64 = 100;
const DEFAULT_SMU_ADDRESS: &str = "172.31.228.86:5025";
// A full sweep takes a while before the SMU answers the fetch.
const SMU_TIMEOUT_MS: u64 = 10_000;
const SOURCE_CURRENT_A: f64 = 100e-6;
const SOURCE_VREF_V: f64 = 1.024;
const SMU_NPLC: f64 = 4.0;
const SMU_CURRENT_LIMIT_A: f64 = 1.0;
const SWEEP_POINTS: u16 = 100;

/// Adapts a `std::io` stream (serial port or socket) to `embedded_io`.
pub struct PortWrapper<T>(T);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::ConnectionRefused => embedded_io::ErrorKind::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset => embedded_io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::ConnectionAborted => embedded_io::ErrorKind::ConnectionAborted,
            std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            // Sockets report an expired read timeout as WouldBlock on some platforms.
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                embedded_io::ErrorKind::TimedOut
            }
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl<T> embedded_io::ErrorType for PortWrapper<T> {
    type Error = IoError;
}

impl<T: std::io::Read> embedded_io::Read for PortWrapper<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl<T: std::io::Write> embedded_io::Write for PortWrapper<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");
        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }
        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();
        Select::new("Select the Bus Pirate serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });
    let smu_address = env::args().nth(2).unwrap_or_else(|| {
        Text::new("SMU address:")
            .with_default(DEFAULT_SMU_ADDRESS)
            .prompt()
            .expect("Failed to read SMU address")
    });

    // Bus Pirate
    let port = serialport::new(&port_name, BUS_PIRATE_BAUD_RATE)
        .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");
    let mut gateway: BusPirate<_> = BusPirate::new(PortWrapper(port));
    gateway.enter_i2c_mode().expect("Bus Pirate did not enter I2C mode");
    gateway.set_speed(Speed::Khz400).unwrap();
    gateway
        .configure(Peripherals::new().with_power(true).with_pullups(true))
        .unwrap();

    // LNBoard
    let bus = MuxedBus::new(Pca9542a::new(gateway, false, false, false));
    let chips = LnChips::new(&bus);
    let mut board = LnBoard::new(&chips, BoardConfig::default()).unwrap();
    board.init().expect("Failed to initialise the board");

    let setting = board
        .isource_a
        .set_current(SOURCE_CURRENT_A, Some(SOURCE_VREF_V))
        .unwrap();
    println!(
        "Source A: {:?} range, code {}, {:.1} Ohm, {:.3} uA expected",
        setting.range,
        setting.code,
        setting.resistance,
        setting.current() * 1e6
    );

    // SMU
    let socket = TcpStream::connect(&smu_address).expect("Failed to connect to the SMU");
    socket
        .set_read_timeout(Some(Duration::from_millis(SMU_TIMEOUT_MS)))
        .unwrap();
    let mut smu: Smu<_> = Smu::new(PortWrapper(socket));
    println!("SMU: {}", smu.identify().unwrap());
    smu.reset().unwrap();
    smu.set_nplc(SmuChannel::One, SMU_NPLC).unwrap();
    smu.configure_voltage_source(SmuChannel::One, 0.0).unwrap();
    smu.configure_voltage_source(SmuChannel::Two, 0.0).unwrap();
    smu.set_current_limit(SmuChannel::One, SMU_CURRENT_LIMIT_A).unwrap();

    let sweep = Sweep {
        mode: SourceMode::Voltage,
        start: 0.0,
        stop: 5.0,
        points: SWEEP_POINTS,
        period: MicrosDurationU32::millis(10),
    };
    smu.configure_sweep(SmuChannel::One, &sweep).unwrap();
    smu.set_output(SmuChannel::One, true).unwrap();
    let samples: heapless::Vec<f64, 128> = smu.read_array(SmuChannel::One).unwrap();
    smu.set_output(SmuChannel::One, false).unwrap();

    let step = (sweep.stop - sweep.start) / (sweep.points - 1) as f64;
    println!("\n  V_out [V]    I_out [uA]");
    for (i, current) in samples.iter().enumerate() {
        println!("{:>9.3} {:>13.3}", sweep.start + step * i as f64, current * 1e6);
    }

    let reading = board.isource_a.get_current_detailed().unwrap();
    println!("\nBoard read back: {reading:#?}");
}
