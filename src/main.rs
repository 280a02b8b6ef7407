//! a refreshing terminal status display.

use {
    anyhow::Context,
    clap::Parser,
    jamesmon::{App, Cancel, Config, cli::Args},
    tracing::{info, level_filters::LevelFilter},
};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // the report owns stdout, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(args.log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.merge_args(&args);
    info!(?config, "starting");

    let cancel = Cancel::new();
    ctrlc::set_handler({
        let cancel = cancel.clone();
        move || cancel.cancel()
    })
    .context("failed to install the interrupt handler")?;

    App::new(&config)
        .context("failed to start")?
        .run(cancel)
        .context("stopped")
}
