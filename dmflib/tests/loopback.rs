//! Two sessions talking to each other over an in-memory link: the
//! device end serves a small channel board, the host end drives it.

use dmflib::pipe::{self, PipeTransport};
use dmflib::protocol::{commands, PayloadBuffer, ReturnCode};
use dmflib::{DeviceInfo, Handler, Session, SessionConfig};

const CMD_GET_NUMBER_OF_CHANNELS: u8 = 0x87;
const CMD_GET_STATE_OF_CHANNEL: u8 = 0x8a;
const CMD_SET_STATE_OF_CHANNEL: u8 = 0x8b;

const BOARD_INFO: DeviceInfo = DeviceInfo {
    protocol_name: "dmf-link",
    protocol_version: "0.1",
    device_name: "loopback board",
    manufacturer: "integration tests",
    hardware_version: "1.0",
    software_version: "0.1.0",
    url: "http://example.invalid/dmf",
};

const CHANNELS: usize = 40;

struct Board {
    states: [u8; CHANNELS],
}

impl Handler for Board {
    fn device_info(&self) -> Option<&DeviceInfo> {
        Some(&BOARD_INFO)
    }

    fn process_command(&mut self, cmd: u8, payload: &mut PayloadBuffer) -> ReturnCode {
        match cmd {
            CMD_GET_NUMBER_OF_CHANNELS => {
                if payload.payload_length() != 0 {
                    return ReturnCode::BAD_PACKET_SIZE;
                }
                match payload.write_u16(CHANNELS as u16) {
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
                if channel as usize >= CHANNELS {
                    return ReturnCode::BAD_INDEX;
                }
                let ok = payload.write_u16(channel).is_ok()
                    && payload.write_u8(self.states[channel as usize]).is_ok();
                if ok {
                    ReturnCode::OK
                } else {
                    ReturnCode::GENERAL_ERROR
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
                if channel as usize >= CHANNELS {
                    return ReturnCode::BAD_INDEX;
                }
                self.states[channel as usize] = state;
                ReturnCode::OK
            }
            _ => ReturnCode::UNKNOWN_COMMAND,
        }
    }
}

#[derive(Default)]
struct Client {
    strings: Vec<String>,
    channel_count: Option<u16>,
    channel_state: Option<(u16, u8)>,
}

impl Handler for Client {
    fn process_reply(&mut self, cmd: u8, return_code: ReturnCode, payload: &mut PayloadBuffer) {
        if !return_code.is_ok() {
            return;
        }
        match cmd {
            0x00..=0x06 => {
                if let Ok(s) = payload.read_string() {
                    self.strings.push(s.to_owned());
                }
            }
            0x07 => self.channel_count = payload.read_u16().ok(),
            0x0a => {
                if let (Ok(channel), Ok(state)) = (payload.read_u16(), payload.read_u8()) {
                    self.channel_state = Some((channel, state));
                }
            }
            _ => {}
        }
    }
}

struct Harness {
    host: Session<PipeTransport, Client>,
    device_thread: Option<std::thread::JoinHandle<()>>,
}

impl Harness {
    fn start(config: SessionConfig) -> Self {
        let (host_end, device_end) = pipe::pair();
        let mut device: Session<_, _> = Session::new_with(
            device_end,
            Board {
                states: [0; CHANNELS],
            },
            config,
        );
        let device_thread = std::thread::spawn(move || {
            while device.listen().is_ok() {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });
        Self {
            host: Session::new_with(host_end, Client::default(), config),
            device_thread: Some(device_thread),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        // closing either end takes the whole pipe down, which stops
        // the device thread
        self.host.transport_mut().close();
        if let Some(thread) = self.device_thread.take() {
            let _ = thread.join();
        }
    }
}

fn fast() -> SessionConfig {
    SessionConfig {
        crc_enabled: true,
        timeout_micros: 200_000,
    }
}

#[test]
fn metadata_queries() {
    let mut harness = Harness::start(fast());
    let host = &mut harness.host;

    for cmd in [
        commands::GET_PROTOCOL_NAME,
        commands::GET_PROTOCOL_VERSION,
        commands::GET_DEVICE_NAME,
        commands::GET_MANUFACTURER,
        commands::GET_HARDWARE_VERSION,
        commands::GET_SOFTWARE_VERSION,
        commands::GET_URL,
    ] {
        assert_eq!(host.send_command(cmd), ReturnCode::OK);
    }

    assert_eq!(
        host.handler().strings,
        vec![
            "dmf-link",
            "0.1",
            "loopback board",
            "integration tests",
            "1.0",
            "0.1.0",
            "http://example.invalid/dmf",
        ]
    );
}

#[test]
fn channel_count_query() {
    let mut harness = Harness::start(fast());
    let host = &mut harness.host;

    assert_eq!(host.send_command(CMD_GET_NUMBER_OF_CHANNELS), ReturnCode::OK);
    assert_eq!(host.handler().channel_count, Some(CHANNELS as u16));
}

#[test]
fn set_then_get_channel_state() {
    let mut harness = Harness::start(fast());
    let host = &mut harness.host;

    host.payload_mut().write_u16(7).unwrap();
    host.payload_mut().write_u8(1).unwrap();
    assert_eq!(host.send_command(CMD_SET_STATE_OF_CHANNEL), ReturnCode::OK);

    host.payload_mut().write_u16(7).unwrap();
    assert_eq!(host.send_command(CMD_GET_STATE_OF_CHANNEL), ReturnCode::OK);
    assert_eq!(host.handler().channel_state, Some((7, 1)));
}

#[test]
fn bad_index_and_bad_packet_size() {
    let mut harness = Harness::start(fast());
    let host = &mut harness.host;

    // out of range channel
    host.payload_mut().write_u16(CHANNELS as u16).unwrap();
    host.payload_mut().write_u8(1).unwrap();
    assert_eq!(
        host.send_command(CMD_SET_STATE_OF_CHANNEL),
        ReturnCode::BAD_INDEX
    );

    // wrong argument size
    host.payload_mut().write_u8(7).unwrap();
    assert_eq!(
        host.send_command(CMD_GET_STATE_OF_CHANNEL),
        ReturnCode::BAD_PACKET_SIZE
    );

    // command the board does not implement
    assert_eq!(host.send_command(0xfe), ReturnCode::UNKNOWN_COMMAND);
}

#[test]
fn crc_disabled_sessions_interoperate() {
    let config = SessionConfig {
        crc_enabled: false,
        timeout_micros: 200_000,
    };
    let mut harness = Harness::start(config);
    let host = &mut harness.host;

    assert_eq!(host.send_command(CMD_GET_NUMBER_OF_CHANNELS), ReturnCode::OK);
    assert_eq!(host.handler().channel_count, Some(CHANNELS as u16));
}

#[test]
fn consecutive_exchanges_reuse_the_session() {
    let mut harness = Harness::start(fast());
    let host = &mut harness.host;

    for i in 0..10u16 {
        let channel = i % CHANNELS as u16;
        host.payload_mut().write_u16(channel).unwrap();
        host.payload_mut().write_u8((i % 2) as u8).unwrap();
        assert_eq!(host.send_command(CMD_SET_STATE_OF_CHANNEL), ReturnCode::OK);
    }
}

#[test]
fn silent_device_times_out() {
    let (host_end, _device_end) = pipe::pair();
    let mut host: Session<_, _> = Session::new_with(
        host_end,
        Client::default(),
        SessionConfig {
            crc_enabled: true,
            timeout_micros: 100_000,
        },
    );

    let start = std::time::Instant::now();
    assert_eq!(host.send_command(0x90), ReturnCode::TIMEOUT);
    assert!(start.elapsed() >= std::time::Duration::from_micros(100_000));

    // next exchange starts fresh
    assert_eq!(host.send_command(0x91), ReturnCode::TIMEOUT);
}
