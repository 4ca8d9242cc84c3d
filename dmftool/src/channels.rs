use anyhow::Context;

use crate::board::{
    CMD_GET_NUMBER_OF_CHANNELS, CMD_GET_STATE_OF_ALL_CHANNELS, CMD_GET_STATE_OF_CHANNEL,
    CMD_SET_STATE_OF_CHANNEL,
};
use crate::common;

#[derive(clap::Args, Debug)]
pub struct ChannelsOpts {
    #[command(flatten)]
    port: common::SerialPortArgs,
    #[command(flatten)]
    link: common::LinkArgs,
}

impl crate::ToolRun for ChannelsOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut session = common::connect(&self.port, &self.link)?;

        let code = session.send_command(CMD_GET_NUMBER_OF_CHANNELS);
        anyhow::ensure!(code.is_ok(), "channel count query failed: {}", code);
        let count = session
            .handler()
            .n_channels
            .context("reply carried no channel count")?;
        println!("{} channels", count);

        let code = session.send_command(CMD_GET_STATE_OF_ALL_CHANNELS);
        anyhow::ensure!(code.is_ok(), "channel state query failed: {}", code);
        let states = session
            .handler()
            .all_states
            .as_deref()
            .context("reply carried no channel states")?;

        for (i, state) in states.iter().enumerate() {
            if *state != 0 {
                println!("channel {:>4}: on", i);
            }
        }
        let active = states.iter().filter(|s| **s != 0).count();
        println!("{} of {} active", active, states.len());

        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct SetChannelOpts {
    /// Channel index.
    channel: u16,
    /// New state: 0 (off) or 1 (on).
    state: u8,
    #[command(flatten)]
    port: common::SerialPortArgs,
    #[command(flatten)]
    link: common::LinkArgs,
}

impl crate::ToolRun for SetChannelOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut session = common::connect(&self.port, &self.link)?;

        session.payload_mut().write_u16(self.channel)?;
        session.payload_mut().write_u8(self.state)?;
        let code = session.send_command(CMD_SET_STATE_OF_CHANNEL);
        anyhow::ensure!(code.is_ok(), "set channel failed: {}", code);

        // read it back rather than trusting the OK
        session.payload_mut().write_u16(self.channel)?;
        let code = session.send_command(CMD_GET_STATE_OF_CHANNEL);
        anyhow::ensure!(code.is_ok(), "readback failed: {}", code);
        let (channel, state) = session
            .handler()
            .channel_state
            .context("reply carried no channel state")?;
        anyhow::ensure!(
            channel == self.channel && state == self.state,
            "readback disagrees: channel {} is {}",
            channel,
            state
        );

        println!("channel {} set to {}", self.channel, self.state);
        Ok(())
    }
}
