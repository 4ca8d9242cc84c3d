//! The send-side packet builder.

use super::crc;
use super::escape::write_escaped;
use super::payload::PayloadBuffer;
use super::FRAME_BOUNDARY;
use crate::transport::{Transport, TransportError};

fn fold(digest: &mut Option<crc::Digest>, byte: u8) {
    if let Some(digest) = digest.as_mut() {
        digest.update(&[byte]);
    }
}

/// Frame and transmit the serialized payload under `command`.
///
/// Emits the leading boundary unescaped, then command, length byte(s),
/// payload, and (when enabled) the CRC low byte first, everything after
/// the boundary transparency-escaped. The CRC is folded over the
/// pre-escape bytes. There is no trailing boundary. On return the
/// payload cursors are reset for the next exchange.
pub fn send_packet<T, const N: usize>(
    transport: &mut T,
    crc_enabled: bool,
    command: u8,
    payload: &mut PayloadBuffer<N>,
) -> Result<(), TransportError>
where
    T: Transport,
{
    let payload_length = payload.bytes_written();
    debug_assert!(payload_length <= 0x7fff);

    transport.write_byte(FRAME_BOUNDARY)?;

    let mut digest = crc_enabled.then(crc::digest);
    fold(&mut digest, command);
    write_escaped(transport, command)?;

    if payload_length < 128 {
        fold(&mut digest, payload_length as u8);
        write_escaped(transport, payload_length as u8)?;
    } else {
        let high = ((0x8000 | payload_length as u16) >> 8) as u8;
        let low = (payload_length & 0xff) as u8;
        fold(&mut digest, high);
        write_escaped(transport, high)?;
        fold(&mut digest, low);
        write_escaped(transport, low)?;
    }

    for i in 0..payload_length {
        let byte = payload.written()[i];
        fold(&mut digest, byte);
        write_escaped(transport, byte)?;
    }

    if let Some(digest) = digest {
        let crc = digest.finalize();
        write_escaped(transport, (crc & 0xff) as u8)?;
        write_escaped(transport, (crc >> 8) as u8)?;
    }

    payload.clear();
    Ok(())
}

#[cfg(test)]
mod test {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::super::decode::{Decoder, Packet};
    use super::*;
    use crate::transport::pipe;

    fn capture<const N: usize>(
        crc_enabled: bool,
        command: u8,
        payload: &mut PayloadBuffer<N>,
    ) -> Vec<u8> {
        let (mut a, mut b) = pipe::pair();
        send_packet(&mut a, crc_enabled, command, payload).unwrap();
        let mut out = Vec::new();
        while let Some(byte) = b.read_byte().unwrap() {
            out.push(byte);
        }
        out
    }

    #[test]
    fn empty_request_wire_bytes() {
        let mut payload = PayloadBuffer::<32>::new();
        assert_eq!(
            capture(true, 0xa0, &mut payload),
            vec![0x7e, 0xa0, 0x00, 0x79, 0xb0]
        );
    }

    #[test]
    fn payload_boundary_byte_is_escaped() {
        let mut payload = PayloadBuffer::<32>::new();
        payload.write_u8(0x7e).unwrap();
        let wire = capture(true, 0xa1, &mut payload);
        assert_eq!(&wire[..5], &[0x7e, 0xa1, 0x01, 0x7d, 0x5e]);
    }

    #[test]
    fn cursors_reset_after_send() {
        let mut payload = PayloadBuffer::<32>::new();
        payload.write_u16(0x1234).unwrap();
        capture(true, 0xa1, &mut payload);
        assert_eq!(payload.bytes_written(), 0);
        assert_eq!(payload.payload_length(), 0);
    }

    #[test]
    fn long_payload_uses_two_length_bytes() {
        let mut payload: PayloadBuffer = PayloadBuffer::new();
        payload.write_bytes(&[0u8; 200]).unwrap();
        let wire = capture(true, 0xa2, &mut payload);
        assert_eq!(&wire[..4], &[0x7e, 0xa2, 0x80, 0xc8]);
    }

    fn round_trips(crc_enabled: bool, command: u8, data: &[u8]) -> bool {
        let mut payload: PayloadBuffer = PayloadBuffer::new();
        payload.write_bytes(data).unwrap();
        let wire = capture(crc_enabled, command, &mut payload);

        let mut decoder = Decoder::new(crc_enabled);
        let mut delivered = Vec::new();
        for byte in wire {
            match decoder.feed(byte, &mut payload) {
                Ok(Some(packet)) => delivered.push(packet),
                Ok(None) => {}
                Err(_) => return false,
            }
        }

        let mut received = vec![0u8; data.len()];
        delivered
            == vec![Packet {
                command,
                payload_length: data.len(),
            }]
            && payload.read_bytes(&mut received).is_ok()
            && received == data
    }

    #[derive(Debug, Clone)]
    struct WirePayload(Vec<u8>);

    impl Arbitrary for WirePayload {
        fn arbitrary(g: &mut Gen) -> Self {
            // bias towards the bytes that exercise escaping, and spill
            // past the one-byte length boundary now and then
            let len = usize::arbitrary(g) % 300;
            let mut data = Vec::with_capacity(len);
            for _ in 0..len {
                data.push(match u8::arbitrary(g) % 5 {
                    0 => 0x7e,
                    1 => 0x7d,
                    _ => u8::arbitrary(g),
                });
            }
            WirePayload(data)
        }
    }

    #[quickcheck]
    fn any_packet_round_trips(command: u8, payload: WirePayload) -> bool {
        let command = command | 0x80;
        round_trips(true, command, &payload.0) && round_trips(false, command, &payload.0)
    }

    #[quickcheck]
    fn two_packets_back_to_back_round_trip(first: WirePayload, second: WirePayload) -> bool {
        let mut payload: PayloadBuffer = PayloadBuffer::new();
        let mut wire = Vec::new();
        payload.write_bytes(&first.0).unwrap();
        wire.extend(capture(true, 0x90, &mut payload));
        payload.write_bytes(&second.0).unwrap();
        wire.extend(capture(true, 0x91, &mut payload));

        let mut decoder = Decoder::new(true);
        let mut delivered = Vec::new();
        for byte in wire {
            match decoder.feed(byte, &mut payload) {
                Ok(Some(packet)) => delivered.push(packet.command),
                Ok(None) => {}
                Err(_) => return false,
            }
        }
        delivered == vec![0x90, 0x91]
    }
}
