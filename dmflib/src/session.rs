//! One end of a command/reply exchange: transport + framer + handler.
//!
//! A [Session] owns the payload buffer, the packet decoder, and the
//! dispatch state for one link. The same type serves both roles: a
//! device runs [Session::listen] from its main loop and answers
//! requests; a host calls [Session::send_command] and blocks until the
//! matching reply lands or the timeout expires. At most one request is
//! in flight per session, so replies are matched positionally: the next
//! reply packet to arrive belongs to the outstanding request.

use crate::protocol::decode::{DecodeError, Decoder, Packet};
use crate::protocol::encode::send_packet;
use crate::protocol::payload::PayloadBuffer;
use crate::protocol::{
    commands, is_request, reply_command, ReturnCode, MAX_PAYLOAD_LENGTH, TIMEOUT_MICROSECONDS,
};
use crate::transport::Transport;

/// The metadata strings a device serves for the reserved requests
/// `0x80..=0x86`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    pub protocol_name: &'static str,
    pub protocol_version: &'static str,
    pub device_name: &'static str,
    pub manufacturer: &'static str,
    pub hardware_version: &'static str,
    pub software_version: &'static str,
    pub url: &'static str,
}

impl DeviceInfo {
    fn string_for(&self, cmd: u8) -> Option<&'static str> {
        match cmd {
            commands::GET_PROTOCOL_NAME => Some(self.protocol_name),
            commands::GET_PROTOCOL_VERSION => Some(self.protocol_version),
            commands::GET_DEVICE_NAME => Some(self.device_name),
            commands::GET_MANUFACTURER => Some(self.manufacturer),
            commands::GET_HARDWARE_VERSION => Some(self.hardware_version),
            commands::GET_SOFTWARE_VERSION => Some(self.software_version),
            commands::GET_URL => Some(self.url),
            _ => None,
        }
    }
}

/// The application half of a session.
///
/// The framer never looks inside payloads; everything a command means
/// lives behind this trait. Implementations borrow the payload buffer
/// only for the duration of each call.
pub trait Handler<const N: usize = { MAX_PAYLOAD_LENGTH }> {
    /// Metadata served for the reserved requests. A session without
    /// device info treats them like any other command.
    fn device_info(&self) -> Option<&DeviceInfo> {
        None
    }

    /// Handle a request. `cmd` is the request byte as sent (high bit
    /// set). Read arguments and serialize results through `payload`;
    /// the framer appends the returned code and emits the reply.
    fn process_command(&mut self, cmd: u8, payload: &mut PayloadBuffer<N>) -> ReturnCode {
        let _ = (cmd, payload);
        ReturnCode::UNKNOWN_COMMAND
    }

    /// Consume a reply. `cmd` is the reply byte (high bit clear); the
    /// return code has already been stripped from the payload.
    fn process_reply(&mut self, cmd: u8, return_code: ReturnCode, payload: &mut PayloadBuffer<N>) {
        let _ = (cmd, return_code, payload);
    }
}

/// A handler that ignores everything. Useful for sessions that only
/// originate commands and never inspect replies.
impl<const N: usize> Handler<N> for () {}

/// Per-session protocol settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    pub crc_enabled: bool,
    /// Reply timeout for [Session::send_command].
    pub timeout_micros: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            crc_enabled: true,
            timeout_micros: TIMEOUT_MICROSECONDS,
        }
    }
}

/// One pairing of a transport with a framer and its handler.
pub struct Session<T, H, const N: usize = { MAX_PAYLOAD_LENGTH }> {
    transport: T,
    handler: H,
    payload: PayloadBuffer<N>,
    decoder: Decoder,
    crc_enabled: bool,
    timeout_micros: u32,
    waiting_for_reply: bool,
    return_code: ReturnCode,
    #[cfg(feature = "std")]
    time_cmd_sent: Option<std::time::Instant>,
}

impl<T, H, const N: usize> Session<T, H, N>
where
    T: Transport,
    H: Handler<N>,
{
    pub fn new(transport: T, handler: H) -> Self {
        Self::new_with(transport, handler, SessionConfig::default())
    }

    pub fn new_with(transport: T, handler: H, config: SessionConfig) -> Self {
        Self {
            transport,
            handler,
            payload: PayloadBuffer::new(),
            decoder: Decoder::new(config.crc_enabled),
            crc_enabled: config.crc_enabled,
            timeout_micros: config.timeout_micros,
            waiting_for_reply: false,
            return_code: ReturnCode::OK,
            #[cfg(feature = "std")]
            time_cmd_sent: None,
        }
    }

    /// The return code latched by the most recent exchange.
    pub fn return_code(&self) -> ReturnCode {
        self.return_code
    }

    pub fn crc_enabled(&self) -> bool {
        self.crc_enabled
    }

    pub fn connected(&self) -> bool {
        self.transport.is_open()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The shared payload buffer. Serialize command arguments here
    /// before [Session::send_command].
    pub fn payload_mut(&mut self) -> &mut PayloadBuffer<N> {
        &mut self.payload
    }

    /// Drain every byte currently available from the transport,
    /// dispatching completed packets inline. The device main-loop entry
    /// point; call it again on the next loop iteration.
    pub fn listen(&mut self) -> Result<(), crate::transport::TransportError> {
        while let Some(byte) = self.transport.read_byte()? {
            self.process_byte(byte);
        }
        Ok(())
    }

    fn process_byte(&mut self, byte: u8) {
        match self.decoder.feed(byte, &mut self.payload) {
            Ok(None) => {}
            Ok(Some(packet)) => self.dispatch(packet),
            Err(error) => {
                // recovered locally: the decoder has already reset. A
                // waiting host learns about it through the return code;
                // a device stays silent and lets the host time out.
                if self.waiting_for_reply {
                    self.return_code = match error {
                        DecodeError::Oversize { .. } => ReturnCode::BAD_PACKET_SIZE,
                        DecodeError::BadCrc { .. } => ReturnCode::BAD_CRC,
                    };
                    self.waiting_for_reply = false;
                }
            }
        }
    }

    fn dispatch(&mut self, packet: Packet) {
        if is_request(packet.command) {
            // a request never finalizes a pending wait; the reply to
            // our own outstanding command is still owed
            let return_code = self.run_command(packet.command);
            self.send_reply(packet.command, return_code);
        } else {
            match self.payload.strip_last() {
                Some(code) => {
                    let code = ReturnCode(code);
                    self.handler
                        .process_reply(packet.command, code, &mut self.payload);
                    self.return_code = code;
                }
                // a reply must at least carry its return code
                None => self.return_code = ReturnCode::BAD_PACKET_SIZE,
            }
            self.payload.clear();
            self.waiting_for_reply = false;
        }
    }

    fn run_command(&mut self, cmd: u8) -> ReturnCode {
        let info_string = self
            .handler
            .device_info()
            .and_then(|info| info.string_for(cmd));
        if let Some(s) = info_string {
            if self.payload.payload_length() != 0 {
                return ReturnCode::BAD_PACKET_SIZE;
            }
            self.payload.clear();
            return match self.payload.write_str(s) {
                Ok(()) => ReturnCode::OK,
                Err(_) => ReturnCode::BAD_PACKET_SIZE,
            };
        }
        self.handler.process_command(cmd, &mut self.payload)
    }

    fn send_reply(&mut self, request_cmd: u8, return_code: ReturnCode) {
        if self.payload.write_u8(return_code.0).is_err() {
            // handler filled the buffer to the brim; a bare error code
            // still fits once the payload is dropped
            self.payload.clear();
            let _ = self.payload.write_u8(ReturnCode::BAD_PACKET_SIZE.0);
        }
        if send_packet(
            &mut self.transport,
            self.crc_enabled,
            reply_command(request_cmd),
            &mut self.payload,
        )
        .is_err()
        {
            self.payload.clear();
        }
    }
}

#[cfg(feature = "std")]
impl<T, H, const N: usize> Session<T, H, N>
where
    T: Transport,
    H: Handler<N>,
{
    /// Send `command` with whatever has been serialized into the
    /// payload buffer, then block until the reply arrives or the
    /// timeout expires. Returns the exchange's return code; transport
    /// failures come back as [ReturnCode::NOT_CONNECTED], silence as
    /// [ReturnCode::TIMEOUT].
    pub fn send_command(&mut self, command: u8) -> ReturnCode {
        debug_assert!(is_request(command));

        if !self.transport.is_open() {
            self.payload.clear();
            self.return_code = ReturnCode::NOT_CONNECTED;
            return self.return_code;
        }

        self.time_cmd_sent = Some(std::time::Instant::now());
        if send_packet(
            &mut self.transport,
            self.crc_enabled,
            command,
            &mut self.payload,
        )
        .is_err()
        {
            self.payload.clear();
            self.return_code = ReturnCode::NOT_CONNECTED;
            return self.return_code;
        }

        self.wait_for_reply()
    }

    fn wait_for_reply(&mut self) -> ReturnCode {
        self.waiting_for_reply = true;
        while self.waiting_for_reply {
            match self.transport.read_byte() {
                Ok(Some(byte)) => self.process_byte(byte),
                Ok(None) => {
                    if self.timed_out() {
                        self.return_code = ReturnCode::TIMEOUT;
                        self.waiting_for_reply = false;
                    } else {
                        std::thread::yield_now();
                    }
                }
                Err(_) => {
                    self.return_code = ReturnCode::NOT_CONNECTED;
                    self.waiting_for_reply = false;
                }
            }
        }
        self.return_code
    }

    fn timed_out(&self) -> bool {
        self.time_cmd_sent
            .map(|sent| sent.elapsed().as_micros() > self.timeout_micros as u128)
            .unwrap_or(true)
    }
}
