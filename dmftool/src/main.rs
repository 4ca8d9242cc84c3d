use clap::Parser;

mod board;
mod channels;
mod common;
mod decode;
mod info;
mod simulate;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(Parser, Debug)]
#[command(
    name = "dmftool",
    version,
    about = "Talk to droplet control boards over the dmf-link serial protocol"
)]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Query the device metadata strings.
    Info(info::InfoOpts),
    /// Query the channel count and every channel state.
    Channels(channels::ChannelsOpts),
    /// Set the state of one channel.
    SetChannel(channels::SetChannelOpts),
    /// Serve the device side of the protocol on a port.
    Simulate(simulate::SimulateOpts),
    /// Decode a captured raw byte stream.
    Decode(decode::DecodeOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Info(o) => o.run(),
            Channels(o) => o.run(),
            SetChannel(o) => o.run(),
            Simulate(o) => o.run(),
            Decode(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    ToolOptions::parse().command.run()
}
