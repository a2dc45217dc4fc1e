//! bucketkv CLI
//!
//! Command-line maintenance tool for a bucketkv database file.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process;

use bucketkv::{Config, Engine, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// bucketkv CLI
#[derive(Parser, Debug)]
#[command(name = "bucketkv-cli")]
#[command(about = "CLI for bucketkv databases")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./bucketkv.redb")]
    db: PathBuf,

    /// Open the database read-only
    #[arg(long)]
    read_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get (bucket:key)
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set (bucket:key)
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Increment a counter
    Incr {
        /// The counter key
        key: String,

        /// Amount to add
        #[arg(short, long, default_value = "1", allow_hyphen_values = true)]
        delta: i64,
    },

    /// List entries under a prefix
    List {
        /// Key prefix (empty lists everything)
        #[arg(default_value = "")]
        prefix: String,

        /// Start at this key (must start with the prefix)
        #[arg(short, long)]
        seek: Option<String>,

        /// Print keys only
        #[arg(short, long)]
        keys_only: bool,
    },

    /// List bucket names
    Buckets,

    /// Write a snapshot to a file
    Backup {
        /// Output file
        file: PathBuf,
    },

    /// Replace the database with a snapshot file
    Restore {
        /// Snapshot file
        file: PathBuf,
    },

    /// Delete every bucket
    DropAll,

    /// Delete every key in the bucket named by a prefix
    DropPrefix {
        /// Prefix naming the bucket (bucket or bucket:...)
        prefix: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bucketkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .path(&args.db)
        .read_only(args.read_only)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&engine, args.command) {
        tracing::error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn run(engine: &Engine, command: Commands) -> Result<()> {
    match command {
        Commands::Get { key } => match engine.get(key.as_bytes(), false)? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            engine.set(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.remove(key.as_bytes())?;
            println!("OK");
        }
        Commands::Incr { key, delta } => {
            let value = engine.increment(key.as_bytes(), 0, delta)?;
            println!("{}", value);
        }
        Commands::List {
            prefix,
            seek,
            keys_only,
        } => {
            let seek = seek.unwrap_or_else(|| prefix.clone());
            engine.enumerate(prefix.as_bytes(), seek.as_bytes(), keys_only, |entry| {
                let key = String::from_utf8_lossy(&entry.key);
                match &entry.value {
                    Some(value) => println!("{}\t{}", key, String::from_utf8_lossy(value)),
                    None => println!("{}", key),
                }
                ControlFlow::Continue(())
            })?;
        }
        Commands::Buckets => {
            for bucket in engine.buckets()? {
                println!("{}", String::from_utf8_lossy(&bucket));
            }
        }
        Commands::Backup { file } => {
            let writer = BufWriter::new(File::create(&file)?);
            let sequence = engine.backup(writer, 0)?;
            println!("backup written to {} (sequence {})", file.display(), sequence);
        }
        Commands::Restore { file } => {
            let reader = BufReader::new(File::open(&file)?);
            engine.restore(reader)?;
            println!("restored from {}", file.display());
        }
        Commands::DropAll => {
            engine.drop_all()?;
            println!("OK");
        }
        Commands::DropPrefix { prefix } => {
            engine.drop_with_prefix(prefix.as_bytes())?;
            println!("OK");
        }
    }
    Ok(())
}
