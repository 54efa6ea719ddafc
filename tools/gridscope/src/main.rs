use clap::Parser;
use gridscope::cli::{Cli, Commands};
use miette::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = args.config.load()?;

    match args.action {
        Commands::Encode(opts) => opts.encode(&config)?,
        Commands::Decode(opts) => opts.decode(&config)?,
        Commands::Config(opts) => opts.show(&config)?,
    }

    Ok(())
}
