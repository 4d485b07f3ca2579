use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use spooltag_core::lookup::{COLORS, MANUFACTURERS, MATERIALS};
use spooltag_core::protocol::DEFAULT_MANUFACTURER;
use spooltag_core::{PcscTransport, SessionConfig, TagRecord, TagService};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Filament spool RFID tag tool", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML session config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// PC/SC reader name (defaults to the first reader)
    #[arg(long, global = true)]
    reader: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the spool tag on the reader
    Read {
        /// Print the record as TOML
        #[arg(long)]
        toml: bool,
    },
    /// Write material/color/manufacturer codes and verify them
    Write {
        /// Material code (1-50)
        #[arg(short, long)]
        material: u32,

        /// Color code (1-24)
        #[arg(short, long)]
        color: u32,

        /// Manufacturer code (0-255)
        #[arg(long, default_value_t = DEFAULT_MANUFACTURER)]
        manufacturer: u32,
    },
    /// List known codes
    Tables {
        #[arg(value_enum, default_value_t = Table::All)]
        table: Table,
    },
    /// List attached PC/SC readers
    Readers,
    /// Write a default config file
    InitConfig {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Table {
    All,
    Materials,
    Colors,
    Manufacturers,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::WARN.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)?,
        None => SessionConfig::default(),
    };
    if args.reader.is_some() {
        config.reader = args.reader.clone();
    }

    match args.command {
        Command::Tables { table } => {
            print_tables(table);
            Ok(())
        }
        Command::InitConfig { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config.save_to_file(&path)?;
            info!(path = %path.display(), "Config written");
            Ok(())
        }
        Command::Readers => {
            let service = open_service(config)?;
            for name in service.transport().list_readers()? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Read { toml } => {
            let service = open_service(config)?;
            let record = service.read_tag()?;
            if toml {
                print!("{}", toml::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
            Ok(())
        }
        Command::Write {
            material,
            color,
            manufacturer,
        } => {
            let service = open_service(config)?;
            service.write_tag(material, color, manufacturer)?;
            println!("Tag written and verified");
            Ok(())
        }
    }
}

fn open_service(config: SessionConfig) -> Result<TagService<PcscTransport>> {
    let transport = PcscTransport::new(config.reader.clone());
    let service = TagService::new(transport, config);
    if !service.initialize_capability() {
        bail!("NFC is not supported on this host (is the PC/SC service running?)");
    }
    let config = service.config();
    info!(
        sector = config.sector,
        keys = config.auth_keys.len(),
        reader = config.reader.as_deref().unwrap_or("<first>"),
        "Tag service ready"
    );
    Ok(service)
}

fn print_record(record: &TagRecord) {
    println!(
        "Material:     {} ({})",
        record.material_name, record.material_code
    );
    println!(
        "Color:        {} ({}) {}",
        record.color_name, record.color_code, record.color_rgb
    );
    println!(
        "Manufacturer: {} ({})",
        record.manufacturer_name, record.manufacturer_code
    );
    println!("Raw:          {}", record.raw_hex());
}

fn print_tables(table: Table) {
    if matches!(table, Table::All | Table::Materials) {
        println!("Materials:");
        for m in MATERIALS {
            println!("  {:>3}  {}", m.code, m.name);
        }
    }
    if matches!(table, Table::All | Table::Colors) {
        println!("Colors:");
        for c in COLORS {
            println!("  {:>3}  {:<14} {}", c.code, c.name, c.rgb);
        }
    }
    if matches!(table, Table::All | Table::Manufacturers) {
        println!("Manufacturers:");
        for m in MANUFACTURERS {
            println!("  {:>3}  {}", m.code, m.name);
        }
    }
}
