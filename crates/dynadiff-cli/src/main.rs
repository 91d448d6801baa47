mod command;
mod telemetry;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
