use clap::Parser;
use tracing_subscriber::EnvFilter;
use training::run::{run, DistillArgs};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();
    let args = DistillArgs::parse();
    run(args)
}
