// bases/playlist_cli/src/main.rs
mod app;
mod args;
mod config;
mod output;
mod picker;

use app::App;
use args::Args;
use clap::Parser;
use color_eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let default_filter = if args.verbose {
        "playlist_pull=debug,playlist_pipeline=debug"
    } else {
        "playlist_pull=info,playlist_pipeline=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = App::new(args);

    if let Err(error) = app.run().await {
        app.print_error(&error);
        std::process::exit(1);
    }
    Ok(())
}
