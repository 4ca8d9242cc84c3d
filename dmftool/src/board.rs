//! The demo droplet-board command set: channel states behind the
//! application command range, one handler for each side of the link.

use dmflib::protocol::{reply_command, PayloadBuffer, ReturnCode};
use dmflib::{DeviceInfo, Handler};

pub const CMD_GET_NUMBER_OF_CHANNELS: u8 = 0x87;
pub const CMD_GET_STATE_OF_ALL_CHANNELS: u8 = 0x88;
pub const CMD_SET_STATE_OF_ALL_CHANNELS: u8 = 0x89;
pub const CMD_GET_STATE_OF_CHANNEL: u8 = 0x8a;
pub const CMD_SET_STATE_OF_CHANNEL: u8 = 0x8b;

/// What the host learned from the board so far.
#[derive(Debug, Default)]
pub struct BoardClient {
    /// Metadata strings, indexed by reply command (`0x00..=0x06`).
    pub metadata: [Option<String>; 7],
    pub n_channels: Option<u16>,
    pub all_states: Option<Vec<u8>>,
    pub channel_state: Option<(u16, u8)>,
}

impl Handler for BoardClient {
    fn process_reply(&mut self, cmd: u8, return_code: ReturnCode, payload: &mut PayloadBuffer) {
        if !return_code.is_ok() {
            return;
        }
        match cmd {
            0x00..=0x06 => {
                self.metadata[cmd as usize] = payload.read_string().ok().map(str::to_owned);
            }
            _ if cmd == reply_command(CMD_GET_NUMBER_OF_CHANNELS) => {
                self.n_channels = payload.read_u16().ok();
            }
            _ if cmd == reply_command(CMD_GET_STATE_OF_ALL_CHANNELS) => {
                let mut states = vec![0u8; payload.remaining()];
                if payload.read_bytes(&mut states).is_ok() {
                    self.all_states = Some(states);
                }
            }
            _ if cmd == reply_command(CMD_GET_STATE_OF_CHANNEL) => {
                if let (Ok(channel), Ok(state)) = (payload.read_u16(), payload.read_u8()) {
                    self.channel_state = Some((channel, state));
                }
            }
            _ => {}
        }
    }
}

pub const SIMULATOR_INFO: DeviceInfo = DeviceInfo {
    protocol_name: "dmf-link",
    protocol_version: "0.1",
    device_name: "dmftool simulator",
    manufacturer: "dmftool",
    hardware_version: "none",
    software_version: env!("CARGO_PKG_VERSION"),
    url: "https://github.com/wheelerlab/dmf-link",
};

/// The device side: an array of channel states and nothing else.
#[derive(Debug)]
pub struct BoardSim {
    states: Vec<u8>,
    verbose: bool,
}

impl BoardSim {
    pub fn new(channels: u16, verbose: bool) -> Self {
        Self {
            states: vec![0; channels as usize],
            verbose,
        }
    }

    fn log(&self, message: impl FnOnce() -> String) {
        if self.verbose {
            println!("<<< {}", message());
        }
    }
}

impl Handler for BoardSim {
    fn device_info(&self) -> Option<&DeviceInfo> {
        Some(&SIMULATOR_INFO)
    }

    fn process_command(&mut self, cmd: u8, payload: &mut PayloadBuffer) -> ReturnCode {
        match cmd {
            CMD_GET_NUMBER_OF_CHANNELS => {
                self.log(|| "get number of channels".to_owned());
                if payload.payload_length() != 0 {
                    return ReturnCode::BAD_PACKET_SIZE;
                }
                match payload.write_u16(self.states.len() as u16) {
                    Ok(()) => ReturnCode::OK,
                    Err(_) => ReturnCode::GENERAL_ERROR,
                }
            }
            CMD_GET_STATE_OF_ALL_CHANNELS => {
                self.log(|| "get state of all channels".to_owned());
                if payload.payload_length() != 0 {
                    return ReturnCode::BAD_PACKET_SIZE;
                }
                match payload.write_bytes(&self.states) {
                    Ok(()) => ReturnCode::OK,
                    Err(_) => ReturnCode::GENERAL_ERROR,
                }
            }
            CMD_SET_STATE_OF_ALL_CHANNELS => {
                self.log(|| "set state of all channels".to_owned());
                if payload.payload_length() != self.states.len() {
                    return ReturnCode::BAD_PACKET_SIZE;
                }
                match payload.read_bytes(&mut self.states) {
                    Ok(()) => ReturnCode::OK,
                    Err(_) => ReturnCode::GENERAL_ERROR,
                }
            }
            CMD_GET_STATE_OF_CHANNEL => {
                if payload.payload_length() != 2 {
                    return ReturnCode::BAD_PACKET_SIZE;
                }
                let channel = match payload.read_u16() {
                    Ok(c) => c,
                    Err(_) => return ReturnCode::GENERAL_ERROR,
                };
                self.log(|| format!("get state of channel {}", channel));
                match self.states.get(channel as usize) {
                    Some(&state) => {
                        let ok =
                            payload.write_u16(channel).is_ok() && payload.write_u8(state).is_ok();
                        if ok {
                            ReturnCode::OK
                        } else {
                            ReturnCode::GENERAL_ERROR
                        }
                    }
                    None => ReturnCode::BAD_INDEX,
                }
            }
            CMD_SET_STATE_OF_CHANNEL => {
                if payload.payload_length() != 3 {
                    return ReturnCode::BAD_PACKET_SIZE;
                }
                let (channel, state) = match (payload.read_u16(), payload.read_u8()) {
                    (Ok(c), Ok(s)) => (c, s),
                    _ => return ReturnCode::GENERAL_ERROR,
                };
                self.log(|| format!("set state of channel {} to {}", channel, state));
                match self.states.get_mut(channel as usize) {
                    Some(slot) => {
                        *slot = state;
                        ReturnCode::OK
                    }
                    None => ReturnCode::BAD_INDEX,
                }
            }
            _ => {
                self.log(|| format!("unknown command {:#04x}", cmd));
                ReturnCode::UNKNOWN_COMMAND
            }
        }
    }
}
