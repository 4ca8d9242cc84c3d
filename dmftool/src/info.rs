use dmflib::protocol::{commands, reply_command};

use crate::common;

#[derive(clap::Args, Debug)]
pub struct InfoOpts {
    #[command(flatten)]
    port: common::SerialPortArgs,
    #[command(flatten)]
    link: common::LinkArgs,
}

const QUERIES: [(u8, &str); 7] = [
    (commands::GET_PROTOCOL_NAME, "protocol name"),
    (commands::GET_PROTOCOL_VERSION, "protocol version"),
    (commands::GET_DEVICE_NAME, "device name"),
    (commands::GET_MANUFACTURER, "manufacturer"),
    (commands::GET_HARDWARE_VERSION, "hardware version"),
    (commands::GET_SOFTWARE_VERSION, "software version"),
    (commands::GET_URL, "url"),
];

impl crate::ToolRun for InfoOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut session = common::connect(&self.port, &self.link)?;

        for (cmd, label) in QUERIES {
            let code = session.send_command(cmd);
            if code.is_ok() {
                let value = session.handler().metadata[reply_command(cmd) as usize]
                    .as_deref()
                    .unwrap_or("(not a string)");
                println!("{:>17}: {}", label, value);
            } else {
                println!("{:>17}: <{}>", label, code);
            }
        }

        Ok(())
    }
}
