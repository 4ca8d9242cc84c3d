//! Byte transparency for the framed link.
//!
//! `0x7E` marks a frame boundary on the wire, so neither it nor the
//! escape introducer `0x7D` may appear literally inside a frame. Both
//! are sent as `0x7D` followed by the byte XOR `0x20`.

use super::{CONTROL_ESCAPE, ESCAPE_XOR, FRAME_BOUNDARY};
use crate::transport::{Transport, TransportError};

/// Write one frame byte, escaping it if necessary.
///
/// The frame boundary itself must never pass through here; the encoder
/// writes it to the transport directly at start-of-frame.
pub fn write_escaped<T>(transport: &mut T, byte: u8) -> Result<(), TransportError>
where
    T: Transport,
{
    if byte == FRAME_BOUNDARY || byte == CONTROL_ESCAPE {
        transport.write_byte(CONTROL_ESCAPE)?;
        transport.write_byte(byte ^ ESCAPE_XOR)
    } else {
        transport.write_byte(byte)
    }
}

/// A logical byte recovered from the raw stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Unescaped {
    pub byte: u8,
    /// True if this byte came out of an escape sequence. An unescaped
    /// `0x7E` is a frame boundary; an escaped one is payload data.
    pub escaped: bool,
}

/// Receive-side escape state: exactly one flag, armed by `0x7D`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Unescaper {
    un_escaping: bool,
}

impl Unescaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw byte; yields zero or one logical bytes.
    pub fn feed(&mut self, raw: u8) -> Option<Unescaped> {
        if raw == CONTROL_ESCAPE {
            self.un_escaping = true;
            None
        } else if self.un_escaping {
            self.un_escaping = false;
            Some(Unescaped {
                byte: raw ^ ESCAPE_XOR,
                escaped: true,
            })
        } else {
            Some(Unescaped {
                byte: raw,
                escaped: false,
            })
        }
    }

    /// Drop any half-seen escape sequence.
    pub fn reset(&mut self) {
        self.un_escaping = false;
    }
}
