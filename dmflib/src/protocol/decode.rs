//! The receive-side packet state machine.
//!
//! The decoder is fed one raw transport byte at a time and rebuilds at
//! most one packet per frame into the session's [PayloadBuffer]. State
//! is implicit in `bytes_received` and `header_length`: byte 0 is the
//! command, byte 1 (and 2, for long payloads) the announced length,
//! then payload bytes, then the optional two CRC bytes. An unescaped
//! frame boundary anywhere resets the count and silently discards the
//! partial packet; completion is decided purely by byte count.

use super::crc;
use super::escape::{Unescaped, Unescaper};
use super::payload::PayloadBuffer;
use super::FRAME_BOUNDARY;

/// A completed packet. The payload itself is in the session's
/// [PayloadBuffer], cursors reset and ready to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub command: u8,
    pub payload_length: usize,
}

/// A frame the decoder had to throw away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The announced payload length exceeds the buffer capacity. The
    /// rest of the frame will be discarded up to the next boundary.
    Oversize { command: u8, announced: usize },
    /// The frame completed but its CRC residue was nonzero.
    BadCrc { command: u8 },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            DecodeError::Oversize { command, announced } => write!(
                f,
                "oversize packet (command {:#04x}, announced {} bytes)",
                command, announced
            ),
            DecodeError::BadCrc { command } => {
                write!(f, "crc check failed (command {:#04x})", command)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// Byte-driven decoder for one direction of a link.
pub struct Decoder {
    crc_enabled: bool,
    command: u8,
    header_length: usize,
    payload_length: usize,
    bytes_received: usize,
    unescaper: Unescaper,
    rx_crc: Option<crc::Digest>,
}

impl Decoder {
    pub fn new(crc_enabled: bool) -> Self {
        Self {
            crc_enabled,
            command: 0,
            header_length: 0,
            payload_length: 0,
            bytes_received: 0,
            unescaper: Unescaper::new(),
            rx_crc: None,
        }
    }

    pub fn crc_enabled(&self) -> bool {
        self.crc_enabled
    }

    /// True if a frame is partially received.
    pub fn mid_packet(&self) -> bool {
        self.bytes_received > 0
    }

    /// Abandon any partial frame.
    pub fn reset(&mut self) {
        self.bytes_received = 0;
        self.unescaper.reset();
        self.rx_crc = None;
    }

    /// Consume one raw transport byte.
    ///
    /// Returns `Ok(Some(..))` when this byte completed a packet, whose
    /// payload is now in `payload` with both cursors reset. Frames the
    /// decoder discards on its own (partial packet cut off by a
    /// boundary) are not reported; frames that carried a detectable
    /// fault come back as [DecodeError].
    pub fn feed<const N: usize>(
        &mut self,
        raw: u8,
        payload: &mut PayloadBuffer<N>,
    ) -> Result<Option<Packet>, DecodeError> {
        let Some(Unescaped { byte, escaped }) = self.unescaper.feed(raw) else {
            return Ok(None);
        };

        if byte == FRAME_BOUNDARY && !escaped {
            // new frame; any packet in progress is lost
            self.bytes_received = 0;
            self.rx_crc = None;
            return Ok(None);
        }

        if self.bytes_received == 0 {
            self.command = byte;
            if self.crc_enabled {
                self.rx_crc = Some(crc::digest());
            }
        } else if self.bytes_received == 1 {
            if byte & 0x80 != 0 {
                self.header_length = 3;
                self.payload_length = ((byte & 0x7f) as usize) << 8;
            } else {
                self.header_length = 2;
                self.payload_length = byte as usize;
            }
        } else if self.bytes_received == 2 && self.header_length == 3 {
            self.payload_length += byte as usize;
        } else if self.bytes_received - self.header_length < self.payload_length {
            payload.store(self.bytes_received - self.header_length, byte);
        }
        // anything else is a trailing CRC byte: folded below, not stored

        if let Some(digest) = self.rx_crc.as_mut() {
            digest.update(&[byte]);
        }
        self.bytes_received += 1;

        if self.bytes_received == self.header_length && self.payload_length > N {
            let err = DecodeError::Oversize {
                command: self.command,
                announced: self.payload_length,
            };
            self.reset();
            return Err(err);
        }

        let trailer = if self.crc_enabled { 2 } else { 0 };
        if self.bytes_received == self.header_length + self.payload_length + trailer {
            let packet = Packet {
                command: self.command,
                payload_length: self.payload_length,
            };
            self.bytes_received = 0;
            payload.set_received(packet.payload_length);
            if let Some(digest) = self.rx_crc.take() {
                if digest.finalize() != 0 {
                    return Err(DecodeError::BadCrc {
                        command: packet.command,
                    });
                }
            }
            return Ok(Some(packet));
        }

        Ok(None)
    }
}
