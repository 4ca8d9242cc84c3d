use dmflib::{SerialLink, Session};

use crate::board::BoardSim;
use crate::common;

#[derive(clap::Args, Debug)]
pub struct SimulateOpts {
    #[command(flatten)]
    port: common::SerialPortArgs,
    #[command(flatten)]
    link: common::LinkArgs,
    /// How many channels the simulated board has.
    #[arg(long, default_value_t = 120)]
    channels: u16,
    /// Announce every handled command on stdout.
    #[arg(short, long)]
    verbose: bool,
}

impl crate::ToolRun for SimulateOpts {
    fn run(&self) -> anyhow::Result<()> {
        let port = self.port.open()?;
        let link = SerialLink::new(port);
        let mut session: Session<_, _> = Session::new_with(
            link,
            BoardSim::new(self.channels, self.verbose),
            self.link.config(),
        );

        println!(
            "simulating a {}-channel board on {}",
            self.channels, self.port.port
        );

        while session.listen().is_ok() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        println!("port closed, stopping");
        Ok(())
    }
}
