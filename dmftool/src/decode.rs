use dmflib::protocol::{is_request, Decoder, PayloadBuffer, ReturnCode};

#[derive(clap::Args, Debug)]
pub struct DecodeOpts {
    /// File holding the captured raw bytes.
    dump: String,
    /// The capture was taken from a link running without CRCs.
    #[arg(long)]
    no_crc: bool,
}

impl crate::ToolRun for DecodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let raw = std::fs::read(&self.dump)?;

        let mut decoder = Decoder::new(!self.no_crc);
        let mut payload: PayloadBuffer = PayloadBuffer::new();
        let mut packets = 0usize;

        for byte in raw {
            match decoder.feed(byte, &mut payload) {
                Ok(None) => {}
                Ok(Some(packet)) => {
                    packets += 1;
                    let kind = if is_request(packet.command) {
                        "request"
                    } else {
                        "reply"
                    };
                    println!(
                        "{} {:#04x}, {} byte payload",
                        kind, packet.command, packet.payload_length
                    );

                    let mut data = vec![0u8; packet.payload_length];
                    payload.read_bytes(&mut data)?;
                    if !is_request(packet.command) {
                        if let Some(code) = data.last() {
                            println!("  return code: {}", ReturnCode(*code));
                        }
                    }
                    if !data.is_empty() {
                        hexdump::hexdump(&data);
                    }
                    println!();
                }
                Err(e) => {
                    eprintln!("!!! {}", e);
                }
            }
        }

        if decoder.mid_packet() {
            eprintln!("(capture ends mid-packet)");
        }
        println!("{} packets", packets);
        Ok(())
    }
}
