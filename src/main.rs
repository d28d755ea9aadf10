//! ausvotes: retrieval and harmonisation of Australian election and boundary datasets.
use clap::Parser;
use color_eyre::eyre::Result;
use tracing::level_filters::LevelFilter;

mod app;

/// `-v`/`-q` arrive as a `log` filter; the subscriber wants a `tracing` one.
fn level_filter(filter: log::LevelFilter) -> LevelFilter {
    match filter {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = app::Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level_filter(cli.verbose.log_level_filter()))
        .with_target(false)
        .init();

    app::actual(cli)
}
