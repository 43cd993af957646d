use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rfd::FileDialog;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use dream_garage::config::Config;
use dream_garage::handoff::{
    garage_test_drive_message, PartInquiry, PurchaseInquiry, TestDriveRequest, WhatsAppLink,
};
use dream_garage::media::ImageAttachments;
use dream_garage::state::{Garage, SqliteStorage, Vehicle};

/// Image extensions picked up when walking a folder
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

#[derive(Parser)]
#[command(name = "dream-garage")]
#[command(version)]
#[command(about = "Dream Garage favorites and inline image compression")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "dream-garage.toml")]
    config: PathBuf,

    /// Storage database (overrides config file)
    #[arg(short = 'd', long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the liked vehicles
    Garage {
        #[command(subcommand)]
        action: GarageAction,
    },
    /// Compress images into data URIs ready for a listing
    Compress {
        /// Image files or folders
        paths: Vec<PathBuf>,

        /// Choose files with the native file picker
        #[arg(long)]
        pick: bool,

        /// Data URI size ceiling in bytes (overrides config file)
        #[arg(long, value_name = "BYTES")]
        max_bytes: Option<usize>,

        /// Write each data URI to <OUT>/<name>.txt
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Print a prefilled WhatsApp link
    Whatsapp {
        #[command(subcommand)]
        message: WhatsappMessage,
    },
}

#[derive(Subcommand)]
enum GarageAction {
    /// List liked vehicles, oldest first
    List,
    /// Like or unlike the vehicle described by a catalog JSON file
    Toggle { vehicle: PathBuf },
    /// Check whether a vehicle id is liked
    Liked { id: String },
    /// Remove every liked vehicle
    Clear,
    /// Link booking a test drive for every liked vehicle
    Share,
}

#[derive(Subcommand)]
enum WhatsappMessage {
    TestDrive {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        vehicle: String,
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "09:00")]
        time: String,
    },
    Purchase {
        #[arg(long)]
        vehicle: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "Cash")]
        payment: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Part {
        #[arg(long)]
        part: Option<String>,
        #[arg(long)]
        number: Option<String>,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        vehicle: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dream_garage={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(&cli.config)?;
    if let Some(db_path) = cli.db_path {
        config.storage.db_path = Some(db_path);
    }

    match cli.command {
        Command::Garage { action } => run_garage(&config, action),
        Command::Compress {
            paths,
            pick,
            max_bytes,
            out,
        } => {
            if let Some(max_bytes) = max_bytes {
                config.compression.max_size_bytes = max_bytes;
            }
            run_compress(&config, paths, pick, out).await
        }
        Command::Whatsapp { message } => {
            let text = match message {
                WhatsappMessage::TestDrive {
                    name,
                    phone,
                    vehicle,
                    date,
                    time,
                } => TestDriveRequest {
                    name,
                    phone,
                    vehicle,
                    date,
                    time,
                }
                .message(),
                WhatsappMessage::Purchase {
                    vehicle,
                    name,
                    email,
                    phone,
                    payment,
                    notes,
                } => PurchaseInquiry {
                    vehicle,
                    name,
                    email,
                    phone,
                    payment_method: payment,
                    notes,
                }
                .message(),
                WhatsappMessage::Part {
                    part,
                    number,
                    quantity,
                    name,
                    phone,
                    vehicle,
                    message,
                } => PartInquiry {
                    part_name: part,
                    part_number: number,
                    quantity,
                    name,
                    phone,
                    vehicle_info: vehicle,
                    message,
                }
                .message(),
            };
            println!("{}", WhatsAppLink::new(&config.handoff.whatsapp_number, text));
            Ok(())
        }
    }
}

fn open_garage(config: &Config) -> Result<Garage<SqliteStorage>> {
    let storage = match &config.storage.db_path {
        Some(path) => SqliteStorage::open(path),
        None => SqliteStorage::new(),
    }
    .context("Failed to open garage storage")?
    .with_quota(config.storage.quota_bytes);

    Ok(Garage::with_key(storage, config.storage.key.clone()))
}

fn run_garage(config: &Config, action: GarageAction) -> Result<()> {
    let mut garage = open_garage(config)?;
    let display = &config.display;

    match action {
        GarageAction::List => {
            if garage.is_empty() {
                println!("Garage empty");
            }
            for vehicle in garage.liked_vehicles().iter() {
                let sold = if vehicle.is_sold() { "  [SOLD]" } else { "" };
                println!(
                    "{:<12} {:<32} {:>14}{}",
                    vehicle.id,
                    vehicle.title(),
                    display.currency.format_price(vehicle.price, display.exchange_rate),
                    sold
                );
            }
        }
        GarageAction::Toggle { vehicle } => {
            let json = std::fs::read_to_string(&vehicle)
                .with_context(|| format!("Failed to read {}", vehicle.display()))?;
            let vehicle = Vehicle::from_json(&json).context("Not a catalog vehicle")?;
            let title = vehicle.title();
            if garage.toggle_like(vehicle) {
                println!("❤️  Added {} to Dream Garage ({} saved)", title, garage.len());
            } else {
                println!("Removed {} ({} saved)", title, garage.len());
            }
        }
        GarageAction::Liked { id } => {
            println!("{}", garage.is_liked(&id));
        }
        GarageAction::Clear => {
            let removed = garage.len();
            garage.clear_garage();
            println!("Cleared {} vehicles", removed);
        }
        GarageAction::Share => {
            if garage.is_empty() {
                bail!("Garage is empty, like a vehicle first");
            }
            let text = garage_test_drive_message(&garage.liked_vehicles());
            println!("{}", WhatsAppLink::new(&config.handoff.whatsapp_number, text));
        }
    }

    Ok(())
}

async fn run_compress(
    config: &Config,
    paths: Vec<PathBuf>,
    pick: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut files = expand_paths(&paths);
    if pick {
        if let Some(picked) = FileDialog::new()
            .set_title("Select Images")
            .add_filter("Images", &IMAGE_EXTENSIONS)
            .pick_files()
        {
            files.extend(picked);
        }
    }
    if files.is_empty() {
        bail!("No images to compress");
    }

    let mut attachments = ImageAttachments::new(
        config.compression.max_images,
        config.compression.options(),
    );
    let report = attachments.add_files(&files).await;

    for path in &report.skipped {
        println!(
            "⏭️  {} skipped, limit of {} images",
            path.display(),
            config.compression.max_images
        );
    }
    for (path, e) in &report.failed {
        println!("❌ {}: {}", path.display(), e);
    }

    if let Some(out) = &out {
        std::fs::create_dir_all(out)
            .with_context(|| format!("Failed to create {}", out.display()))?;
    }
    for (path, uri) in report.added.iter().zip(attachments.images()) {
        match &out {
            Some(dir) => {
                let target = dir.join(output_name(path));
                std::fs::write(&target, uri)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                println!(
                    "✅ {} -> {} ({} KB)",
                    path.display(),
                    target.display(),
                    uri.len() / 1024
                );
            }
            None => println!("✅ {} ({} KB)", path.display(), uri.len() / 1024),
        }
    }

    info!(
        "Compression done: {} added, {} failed, {} skipped",
        report.added.len(),
        report.failed.len(),
        report.skipped.len()
    );
    if report.added.is_empty() {
        bail!("Failed to process images");
    }
    Ok(())
}

/// Files as given, folders walked recursively for image extensions
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && has_image_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    if files.is_empty() && !paths.is_empty() {
        warn!("No images found under the given paths");
    }
    files
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn output_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.txt", stem)
}
