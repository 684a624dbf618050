use anyhow::Result;
use ghdigest::cli::Cli;

fn main() -> Result<()> {
    ghdigest::logging::init();
    let cli = Cli::parse();
    cli.execute()
}
