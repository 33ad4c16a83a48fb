use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cascade::{Cascade, Outcome};
use crate::catalog::{AwsCli, Catalog, ModelDirectory};
use crate::config::{CatalogConfig, KeyResolver};
use crate::picker::TablePicker;
use crate::tui::Tui;

mod cascade;
mod catalog;
mod cli;
mod config;
mod picker;
mod record;
mod theme;
mod tui;
mod ui;

pub use theme::Theme;

const FRAME_RATE: f64 = 30.0;
const TICK_RATE: f64 = 8.0;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = initialize_logging()?;
    info!("Starting craws");

    let args = cli::Args::parse();

    let config = config::load()?;
    let resolver = Arc::new(KeyResolver::new(Arc::new(config.keybindings.clone())));
    let theme = theme::theme_from_name(&config.theme.name);

    let catalog = build_catalog(&config.catalog, args).await?;
    let cascade = Cascade::start(catalog)
        .await
        .wrap_err("Failed to read service metadata")?;

    let mut tui = Tui::new(FRAME_RATE, TICK_RATE)?;
    tui.enter()?;

    let mut picker = TablePicker::new(tui, theme, resolver, config.picker.lookahead);
    let outcome = cascade.run(&mut picker).await;
    picker.into_surface().exit()?;

    match outcome? {
        Outcome::Done(record) => println!("{record}"),
        Outcome::Aborted => info!("Nothing selected"),
    }

    Ok(())
}

/// Wire the model directory and the AWS CLI together, letting command-line
/// flags win over the config file.
async fn build_catalog(config: &CatalogConfig, args: cli::Args) -> Result<Catalog> {
    let models_dir = match args.models.or_else(|| config.models_dir.clone()) {
        Some(dir) => dir,
        None => ModelDirectory::discover().await.ok_or_else(|| {
            eyre!("No service models found; install the AWS CLI or botocore, or pass --models")
        })?,
    };
    info!(models_dir = %models_dir.display(), "Using service models");

    let client = AwsCli::new(&config.aws_command, config.page_size)
        .with_profile(args.profile.or_else(|| config.profile.clone()))
        .with_region(args.region.or_else(|| config.region.clone()));

    Ok(Catalog::new(
        Arc::new(ModelDirectory::new(models_dir)),
        Arc::new(client),
    ))
}

fn initialize_logging() -> Result<WorkerGuard> {
    let directory = dirs::data_local_dir().map_or_else(
        || std::path::PathBuf::from("logs"),
        |path| path.join("craws").join("logs"),
    );
    std::fs::create_dir_all(&directory)?;

    let file_appender = tracing_appender::rolling::daily(&directory, "craws.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .init();

    Ok(guard)
}
