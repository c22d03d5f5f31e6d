mod command;
mod model;
mod schema;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
