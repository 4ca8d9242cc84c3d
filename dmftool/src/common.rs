use dmflib::{SerialLink, Session, SessionConfig};

use crate::board::BoardClient;

#[derive(clap::Args, Debug, Clone)]
pub struct SerialPortArgs {
    #[arg(default_value_t = default_serial_port())]
    pub port: String,
    #[arg(short, long, default_value_t = dmflib::protocol::BAUD_RATE)]
    pub baud: u32,
    /// Treat the port as a plain file instead of a serial device.
    #[arg(long)]
    pub plain_file: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LinkArgs {
    /// Turn off the frame CRC in both directions.
    #[arg(long)]
    pub no_crc: bool,
    /// Reply timeout in microseconds.
    #[arg(long, default_value_t = dmflib::protocol::TIMEOUT_MICROSECONDS)]
    pub timeout_micros: u32,
    /// How long to wait after opening the port before talking, so a
    /// board that resets on open has time to come back.
    #[arg(long, default_value_t = 2000)]
    pub settle_ms: u64,
}

impl LinkArgs {
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            crc_enabled: !self.no_crc,
            timeout_micros: self.timeout_micros,
        }
    }
}

pub fn default_serial_port() -> String {
    if let Ok(infos) = serialport::available_ports() {
        if let Some(info) = infos.into_iter().next() {
            return info.port_name;
        }
    }

    // not great, but reasonable fallback
    "/dev/ttyUSB0".to_owned()
}

#[derive(Debug)]
pub enum SerialPort {
    Serial(Box<dyn serialport::SerialPort>),
    File(std::fs::File),
}

impl std::io::Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.read(buf),
            Self::File(port) => port.read(buf),
        }
    }
}

impl std::io::Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::File(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::File(port) => port.flush(),
        }
    }
}

impl SerialPortArgs {
    pub fn open(&self) -> anyhow::Result<SerialPort> {
        if self.plain_file {
            let port = std::fs::File::options()
                .read(true)
                .write(true)
                .open(&self.port)?;

            Ok(SerialPort::File(port))
        } else {
            let mut port = serialport::new(&self.port, self.baud).open()?;
            // short timeout: it bounds how long the link worker sits in
            // a read while writes queue up
            port.set_timeout(std::time::Duration::from_millis(10))?;
            Ok(SerialPort::Serial(port))
        }
    }
}

/// Open the port and stand up a host session on it.
pub fn connect(
    port_args: &SerialPortArgs,
    link_args: &LinkArgs,
) -> anyhow::Result<Session<SerialLink, BoardClient>> {
    let port = port_args.open()?;
    let link = SerialLink::new(port);
    if link_args.settle_ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(link_args.settle_ms));
    }
    Ok(Session::new_with(
        link,
        BoardClient::default(),
        link_args.config(),
    ))
}
