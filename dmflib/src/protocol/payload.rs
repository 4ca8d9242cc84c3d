//! The payload buffer shared by the send and receive paths.
//!
//! One fixed array, no allocation, and a pair of cursors: `bytes_written`
//! marks where the next serialized byte lands, `bytes_read` where the
//! next deserialized byte comes from. Multi-byte values are always
//! little-endian on the wire, assembled byte by byte so neither side's
//! alignment or endianness leaks in.
//!
//! A device reuses the same buffer to build its reply while the request
//! payload is still in it: reads consume the request from the front
//! while writes restart at offset zero, overwriting bytes already
//! consumed. This mirrors the half-duplex exchange, where at most one
//! payload direction is live at a time.

use super::MAX_PAYLOAD_LENGTH;

/// A payload access that could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// Appending would exceed the buffer capacity.
    Overflow,
    /// Reading would pass the end of the valid payload.
    ReadPastEnd,
    /// A string read found no NUL terminator in the valid payload.
    MissingTerminator,
    /// A string read produced bytes that are not UTF-8.
    InvalidString,
}

impl core::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            PayloadError::Overflow => write!(f, "payload buffer overflow"),
            PayloadError::ReadPastEnd => write!(f, "read past end of payload"),
            PayloadError::MissingTerminator => write!(f, "string is not zero-terminated"),
            PayloadError::InvalidString => write!(f, "string is not valid utf-8"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PayloadError {}

/// Fixed-size payload storage with serialize/deserialize cursors.
#[derive(Debug, Clone)]
pub struct PayloadBuffer<const N: usize = { MAX_PAYLOAD_LENGTH }> {
    buf: [u8; N],
    /// Valid length of a received payload; zero on the send path.
    len: usize,
    bytes_written: usize,
    bytes_read: usize,
}

impl<const N: usize> PayloadBuffer<N> {
    pub fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
            bytes_written: 0,
            bytes_read: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Length of the payload currently held: the received length after
    /// a packet completes, or the serialized length while building one.
    pub fn payload_length(&self) -> usize {
        self.len.max(self.bytes_written)
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Bytes left to deserialize.
    pub fn remaining(&self) -> usize {
        self.payload_length().saturating_sub(self.bytes_read)
    }

    /// Forget everything: cursors and valid length back to zero.
    pub fn clear(&mut self) {
        self.len = 0;
        self.bytes_written = 0;
        self.bytes_read = 0;
    }

    /// The serialized bytes awaiting transmission.
    pub(crate) fn written(&self) -> &[u8] {
        &self.buf[..self.bytes_written]
    }

    /// Store one received payload byte. Used by the packet decoder.
    pub(crate) fn store(&mut self, index: usize, byte: u8) {
        self.buf[index] = byte;
    }

    /// A packet just completed with `len` payload bytes; reset both
    /// cursors for the dispatch that follows.
    pub(crate) fn set_received(&mut self, len: usize) {
        debug_assert!(len <= N);
        self.len = len;
        self.bytes_written = 0;
        self.bytes_read = 0;
    }

    /// Drop and return the last valid byte (the return code of a reply).
    pub(crate) fn strip_last(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.buf[self.len])
    }

    // serialize

    /// Append raw bytes at the write cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PayloadError> {
        if self.bytes_written + bytes.len() > N {
            return Err(PayloadError::Overflow);
        }
        self.buf[self.bytes_written..self.bytes_written + bytes.len()].copy_from_slice(bytes);
        self.bytes_written += bytes.len();
        Ok(())
    }

    pub fn write_u8(&mut self, val: u8) -> Result<(), PayloadError> {
        self.write_bytes(&[val])
    }

    pub fn write_u16(&mut self, val: u16) -> Result<(), PayloadError> {
        self.write_bytes(&val.to_le_bytes())
    }

    pub fn write_u32(&mut self, val: u32) -> Result<(), PayloadError> {
        self.write_bytes(&val.to_le_bytes())
    }

    pub fn write_f32(&mut self, val: f32) -> Result<(), PayloadError> {
        self.write_bytes(&val.to_le_bytes())
    }

    /// Append a zero-terminated string.
    pub fn write_str(&mut self, val: &str) -> Result<(), PayloadError> {
        self.write_bytes(val.as_bytes())?;
        self.write_u8(0)
    }

    // deserialize

    /// Consume `dst.len()` bytes at the read cursor.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), PayloadError> {
        if self.bytes_read + dst.len() > self.payload_length() {
            return Err(PayloadError::ReadPastEnd);
        }
        dst.copy_from_slice(&self.buf[self.bytes_read..self.bytes_read + dst.len()]);
        self.bytes_read += dst.len();
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, PayloadError> {
        let mut bytes = [0; 1];
        self.read_bytes(&mut bytes)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, PayloadError> {
        let mut bytes = [0; 2];
        self.read_bytes(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32, PayloadError> {
        let mut bytes = [0; 4];
        self.read_bytes(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_f32(&mut self) -> Result<f32, PayloadError> {
        let mut bytes = [0; 4];
        self.read_bytes(&mut bytes)?;
        Ok(f32::from_le_bytes(bytes))
    }

    /// Consume a zero-terminated string, advancing past the terminator.
    pub fn read_string(&mut self) -> Result<&str, PayloadError> {
        let valid = &self.buf[self.bytes_read..self.payload_length()];
        let nul = valid
            .iter()
            .position(|b| *b == 0)
            .ok_or(PayloadError::MissingTerminator)?;
        let s = core::str::from_utf8(&valid[..nul]).map_err(|_| PayloadError::InvalidString)?;
        self.bytes_read += nul + 1;
        Ok(s)
    }
}

impl<const N: usize> Default for PayloadBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
