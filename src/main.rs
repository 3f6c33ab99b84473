// src/main.rs - Command line entry point

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;

use catalog_admin::catalog::{
    CatalogApi, Deadline, FormOptions, MessageSurface, PictureFile, ProductDraft, RetryFetcher, Settlement,
    SubmissionOrchestrator,
};
use catalog_admin::config::{AppConfig, ConfigManager, DEFAULT_ENV_PREFIX};
use catalog_admin::error::Result;
use catalog_admin::logging::{LogLevel, Logger, LoggingManager};
use catalog_admin::platform::create_network;

#[derive(Parser)]
#[command(
    name = "catalog-admin",
    version = catalog_admin::VERSION,
    about = "Back-office client for the catalog backend",
    long_about = None
)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend address, overrides configuration and environment
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve the product list, retrying until the deadline
    List,
    /// Show the categories and brands offered when creating an item
    Options,
    /// Create an item
    CreateItem {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        stock: String,
        #[arg(long, value_name = "FILE")]
        picture: PathBuf,
        #[arg(long, value_name = "ID")]
        category: String,
        #[arg(long, value_name = "ID")]
        brand: String,
    },
    /// Create a brand
    CreateBrand {
        #[arg(long)]
        name: String,
    },
    /// Print the merged configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = load_config(&cli).await?;
    let config = config_manager.get_config().await?;

    let mut logging = LoggingManager::new(config.logging.clone());
    if cli.verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    logging.initialize().await?;
    let logger = logging.create_logger("cli");

    for problem in config_manager.validate().await? {
        logger.warn(format!("Invalid configuration '{}': {}", problem.key, problem.message));
    }

    let exit_code = match &cli.command {
        Commands::ShowConfig => show_config(&config_manager).await,
        command => run_command(command, &config, &logger).await?,
    };

    logging.shutdown();
    if exit_code != 0 {
        process::exit(exit_code);
    }
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<ConfigManager> {
    let mut manager = match &cli.config {
        Some(path) => ConfigManager::with_config_file(path)?,
        None => {
            let mut manager = ConfigManager::new();
            manager.add_env_layer("environment", DEFAULT_ENV_PREFIX, 1000);
            manager
        }
    };

    if let Some(base_url) = &cli.base_url {
        manager.add_memory_layer("command_line", json!({ "api": { "base_url": base_url } }), 2000);
    }

    manager.load().await?;
    Ok(manager)
}

async fn run_command(command: &Commands, config: &AppConfig, logger: &Logger) -> Result<i32> {
    let network = create_network(&config.api)?;
    let api = CatalogApi::from_config(&config.api, network);
    let messages = MessageSurface::new(config.api.message_ttl(), config.api.clear_policy);

    match command {
        Commands::List => Ok(list_products(&api, config).await),
        Commands::Options => Ok(show_options(&api).await),
        Commands::CreateItem {
            name,
            description,
            price,
            stock,
            picture,
            category,
            brand,
        } => {
            let draft = ProductDraft {
                name: name.clone(),
                description: description.clone(),
                price_raw: price.clone(),
                stock_raw: stock.clone(),
                picture: PictureFile::from_path(picture).await?,
                category_id: category.as_str().into(),
                brand_id: brand.as_str().into(),
            };

            let orchestrator = SubmissionOrchestrator::new(api, messages);
            match orchestrator.submit(draft).await {
                Ok(id) => {
                    logger.info(format!("Created item {}", id));
                    println!("{}", id);
                    Ok(0)
                }
                Err(failure) => {
                    match failure.message() {
                        Some(message) => eprintln!("{}", message),
                        None => eprintln!("Item was not created (status {:?})", failure.status()),
                    }
                    Ok(1)
                }
            }
        }
        Commands::CreateBrand { name } => {
            let orchestrator = SubmissionOrchestrator::new(api, messages);
            match orchestrator.create_brand(name.as_str()).await {
                Ok(Some(brand)) => {
                    logger.info(format!("Created brand {}", brand.id));
                    println!("{}\t{}", brand.id, brand.name);
                    Ok(0)
                }
                Ok(None) => {
                    logger.info(format!("Created brand {}", name));
                    println!("Brand created");
                    Ok(0)
                }
                Err(failure) => {
                    eprintln!("{}", failure.message().unwrap_or("Brand was not created"));
                    Ok(1)
                }
            }
        }
        Commands::ShowConfig => Ok(0),
    }
}

async fn list_products(api: &CatalogApi, config: &AppConfig) -> i32 {
    let fetcher = RetryFetcher::new();
    let mut updates = fetcher.subscribe();

    let watcher = tokio::spawn(async move {
        let mut last_message = None;
        while updates.changed().await.is_ok() {
            let message = updates.borrow_and_update().error_message.clone();
            if let Some(text) = message.as_deref().filter(|_| message != last_message) {
                eprintln!("{}", text);
            }
            last_message = message;
        }
    });

    let deadline = Deadline::arm(config.api.list_deadline());
    let interrupt = tokio::spawn({
        let token = deadline.token().clone();
        async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        tracing::info!("Interrupted, stopping after the current attempt");
                        token.cancel();
                    }
                }
                _ = token.cancelled() => {}
            }
        }
    });

    let settlement = fetcher.run(api, &deadline).await;
    deadline.expire();
    let _ = interrupt.await;
    let state = fetcher.state();
    drop(fetcher);
    let _ = watcher.await;

    if settlement != Settlement::Success {
        return 1;
    }

    for product in &state.products {
        let price = product.price.map(|p| format!("{:.2}", p)).unwrap_or_default();
        let stock = product.stock.map(|s| s.to_string()).unwrap_or_default();
        println!("{}\t{}\t{}\t{}", product.id, product.name, price, stock);
    }
    0
}

async fn show_options(api: &CatalogApi) -> i32 {
    match FormOptions::load(api).await {
        Ok(options) => {
            println!("Categories:");
            for category in &options.categories {
                println!("  {}\t{}", category.id, category.name);
            }
            println!("Brands:");
            for brand in &options.brands {
                println!("  {}\t{}", brand.id, brand.name);
            }
            0
        }
        Err(error) => {
            eprintln!("{}", error);
            1
        }
    }
}

async fn show_config(manager: &ConfigManager) -> i32 {
    let merged = manager.debug_config().await;
    match serde_json::to_string_pretty(&merged) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(error) => {
            eprintln!("Failed to render configuration: {}", error);
            1
        }
    }
}
