//! QR Cards CLI tool
//!
//! A command-line tool for turning catalog product IDs into printable QR cards.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qr_cards::cards::{generate_cards, CardsOptions};
use qr_cards::catalog::HttpCatalog;
use qr_cards::config::Config;
use qr_cards::ingest::{read_product_ids_from_path, require_product_ids, save_product_ids};
use qr_cards::qr::{generate_qr_codes, ItemStatus, QrCodeEncoder, QrEmitter, TinyUrl};

/// QR Cards - Product QR codes laid out as printable PDF cards
#[derive(Parser)]
#[command(name = "qr-cards")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Store the product IDs from an export
    qr-cards import productos.csv

    # Fetch every stored product and write its QR code
    QR_CARDS_API_KEY=... qr-cards generate

    # Lay the QR codes out as cards and open the result
    qr-cards cards --open")]
struct Cli {
    /// Configuration file (defaults to ./qr-cards.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read product IDs from a CSV file and store them
    Import {
        /// CSV file with a "Product ID" column, separated by ';'
        input: PathBuf,

        /// Where to store the ID list
        #[arg(long)]
        ids_file: Option<PathBuf>,
    },

    /// Fetch the stored products and write one QR image per product
    Generate {
        /// Catalog webservice key
        #[arg(long, env = "QR_CARDS_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Stored ID list
        #[arg(long)]
        ids_file: Option<PathBuf>,

        /// Directory for QR images
        #[arg(long)]
        qr_dir: Option<PathBuf>,
    },

    /// Lay the QR images out as cards and build the PDF document
    Cards {
        /// Directory with QR images
        #[arg(long)]
        qr_dir: Option<PathBuf>,

        /// Directory for the per-page PDFs
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Merged PDF file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TrueType font for card text (Helvetica when omitted)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { input, ids_file } => {
            if let Some(path) = ids_file {
                config.paths.ids_file = path;
            }
            cmd_import(&input, &config)
        }
        Commands::Generate { api_key, ids_file, qr_dir } => {
            if api_key.is_some() {
                config.catalog.api_key = api_key;
            }
            if let Some(path) = ids_file {
                config.paths.ids_file = path;
            }
            if let Some(dir) = qr_dir {
                config.paths.qr_dir = dir;
            }
            cmd_generate(&config)
        }
        Commands::Cards { qr_dir, output_dir, output, font, open } => {
            if let Some(dir) = qr_dir {
                config.paths.qr_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.paths.output_dir = dir;
            }
            if font.is_some() {
                config.paths.font_path = font;
            }
            cmd_cards(&config, output, open)
        }
        Commands::Info { input } => cmd_info(&input),
    }
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Replace the stored ID list with the IDs from a CSV file
fn cmd_import(input: &Path, config: &Config) -> Result<()> {
    let ids = read_product_ids_from_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    save_product_ids(&config.paths.ids_file, &ids)?;

    eprintln!(
        "Stored {} product IDs in {}",
        ids.len(),
        config.paths.ids_file.display()
    );
    Ok(())
}

/// Generate QR codes for every stored product ID
fn cmd_generate(config: &Config) -> Result<()> {
    // Checked before the catalog client so a missing key is not reported first
    let ids = require_product_ids(&config.paths.ids_file)?;

    let catalog = HttpCatalog::new(&config.catalog)
        .context("Set the key with --api-key, QR_CARDS_API_KEY or [catalog] api_key")?;
    let shortener = TinyUrl::new(&config.shortener)?;
    let encoder = QrCodeEncoder;
    let emitter = QrEmitter::new(config, &shortener, &encoder);

    eprintln!("Generating QR codes for {} products...", ids.len());
    let report = generate_qr_codes(&ids, &catalog, &emitter)?;

    for item in &report.items {
        if let ItemStatus::Skipped { reason } = &item.status {
            eprintln!("  {}: {}", item.id, reason);
        }
    }
    eprintln!(
        "Generated: {}, already present: {}, skipped: {}",
        report.generated(),
        report.existing(),
        report.skipped()
    );
    eprintln!("QR codes in: {}", config.paths.qr_dir.display());
    Ok(())
}

/// Build the card document from the QR directory
fn cmd_cards(config: &Config, output: Option<PathBuf>, open: bool) -> Result<()> {
    let mut options = CardsOptions::from_config(config);
    options.output_path = output;

    let result = generate_cards(&options)?;
    info!("{} cards on {} pages", result.cards.len(), result.plans.len());

    match result.merged {
        Some(merged) => {
            eprintln!("Output: {}", merged.display());
            if open {
                open_file(&merged)?;
            }
        }
        None => eprintln!("No QR images found in {}", options.qr_dir.display()),
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: &Path) -> Result<()> {
    let metadata = qr_cards::pdf::extract_metadata(input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(producer) = metadata.producer {
        println!("Producer: {}", producer);
    }
    if let Some(created) = metadata.created {
        println!("Created: {}", created);
    }

    Ok(())
}
