use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image_mill::config::AppConfig;
use image_mill::web_server;
use image_mill::{BatchAttachment, ImageItem, ImageMill, SearchParam, SyncOperation};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "image-mill", about = "Keep a remote image search index in sync and query it")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve,
    /// Add the images listed in a JSON file to the index.
    Add(BatchArgs),
    /// Remove the images listed in a JSON file from the index.
    Delete(BatchArgs),
    /// Search the index by picture.
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// JSON array of {"pic_name", "product_id", "image_url"} objects.
    #[arg(long)]
    images: PathBuf,
    #[arg(long)]
    instance: String,
    #[arg(long)]
    category: Option<u32>,
    #[arg(long, default_value = "")]
    attr: String,
}

#[derive(Args, Debug)]
struct SearchArgs {
    image_url: String,
    #[arg(long)]
    instance: String,
    #[arg(long)]
    category: Option<u32>,
    #[arg(long, default_value = "")]
    attr: String,
    #[arg(long, default_value_t = 0)]
    offset: i64,
    #[arg(long, default_value_t = 0)]
    limit: i64,
    /// Drop repeated product ids.
    #[arg(long)]
    dedup: bool,
    /// Download the picture as given, without the configured URL rewrite.
    #[arg(long)]
    origin: bool,
}

async fn run_batch(mill: &ImageMill, args: BatchArgs, operation: SyncOperation) -> Result<()> {
    let raw = std::fs::read_to_string(&args.images)
        .with_context(|| format!("cannot read {}", args.images.display()))?;
    let images: Vec<ImageItem> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a list of images", args.images.display()))?;
    let attachment = BatchAttachment {
        instance_name: args.instance,
        category_id: args.category,
        str_attr: args.attr,
    };

    let report = mill.sync_images(&images, &attachment, operation).await?;
    info!(
        "{} finished: {} of {} images succeeded",
        operation,
        report.succeeded.len(),
        images.len()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_search(mill: &ImageMill, args: SearchArgs) -> Result<()> {
    let param = SearchParam {
        image_url: args.image_url,
        use_origin_image: args.origin,
        offset: args.offset,
        limit: args.limit,
        str_attr: args.attr,
        is_removal: args.dedup,
        instance_name: args.instance,
        category_id: args.category,
    };
    let result = mill.search_image(&param).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::new()?;

    // Initialize env_logger based on config.log_level
    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting image-mill against {}", config.endpoint);
    let mill = Arc::new(ImageMill::new(&config)?);

    match cli.command {
        Command::Serve => web_server::start_web_server(Arc::new(config), mill).await?,
        Command::Add(args) => run_batch(&mill, args, SyncOperation::Add).await?,
        Command::Delete(args) => run_batch(&mill, args, SyncOperation::Delete).await?,
        Command::Search(args) => run_search(&mill, args).await?,
    }

    info!("image-mill finished");
    Ok(())
}
