// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pkgsync::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, MIN_CHUNK_SIZE, RepoLayout, StoreConfig,
    TransferConfig,
};
use pkgsync::pipeline::{self, RunSummary};
use pkgsync::store::{LocalStore, ObjectStore, S3Store};
use pkgsync::transfer::Executor;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const MIB: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(name = "pkgsync")]
#[command(author, version, about = "Reconcile package repositories and publish them to object storage", long_about = None)]
struct Cli {
    /// Print the plan without transferring anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Write a JSON summary of the run to this path
    #[arg(long, global = true, value_name = "PATH")]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the next repository state from freshly built packages
    Promote {
        /// Repository name (database is <name>.db.tar.gz)
        #[arg(long, env = "repo_name")]
        repo_name: String,
        /// Directory with the freshly built packages and their database
        #[arg(long, env = "src_repo_path", default_value = "./src_repo")]
        src_repo_path: PathBuf,
        /// Directory with the currently published packages and database
        #[arg(long, env = "dest_repo_path", default_value = "./dest_repo")]
        dest_repo_path: PathBuf,
        /// Directory that receives the complete new repository
        #[arg(long, env = "output_path", default_value = "./new_packages")]
        output_path: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Sync a local mirror with the repository published in the bucket
    Mirror {
        /// Repository name (database is <name>.db.tar.gz)
        #[arg(long, env = "repo_name")]
        repo_name: String,
        /// Local repository directory holding the local database
        #[arg(long, default_value = ".")]
        local_dir: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Upload a repository directory to the bucket
    Upload {
        /// Directory to upload recursively
        #[arg(long, env = "output_path", default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

/// Object store connection, normally provided by CI environment variables
#[derive(Args)]
struct StoreArgs {
    /// Bucket name; without it no object store is used
    #[arg(long, env = "S3_BUCKET_NAME")]
    bucket: Option<String>,
    /// Custom S3-compatible endpoint URL
    #[arg(long, env = "S3_ENDPOINT_URL")]
    endpoint: Option<String>,
    #[arg(long, env = "S3_ACCESS_KEY_ID", hide_env_values = true)]
    access_key: Option<String>,
    #[arg(long, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_key: Option<String>,
    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    region: String,
    /// Key prefix inside the bucket
    #[arg(long = "root-path", env = "dest_path", default_value = "")]
    root_path: String,
    /// Upload objects without the public-read ACL
    #[arg(long)]
    private: bool,
    /// Use a local directory as the bucket; takes precedence over S3
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

/// Where objects are stored
enum StoreTarget {
    S3(StoreConfig),
    Directory(PathBuf),
}

impl StoreArgs {
    /// `None` when neither a store directory nor a bucket is configured
    fn target(&self) -> Option<StoreTarget> {
        match &self.store_dir {
            Some(dir) => Some(StoreTarget::Directory(dir.clone())),
            None => self.config().map(StoreTarget::S3),
        }
    }

    /// `None` when no bucket is configured
    fn config(&self) -> Option<StoreConfig> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        let bucket = non_empty(&self.bucket)?;
        let mut config = StoreConfig::new(bucket).with_root_prefix(&self.root_path);
        config.endpoint = non_empty(&self.endpoint);
        config.access_key = non_empty(&self.access_key);
        config.secret_key = non_empty(&self.secret_key);
        config.region = self.region.clone();
        config.public_read = !self.private;
        Some(config)
    }
}

#[derive(Args)]
struct TransferArgs {
    /// Multipart chunk size and single-upload threshold, in MiB
    #[arg(long, value_name = "MIB", default_value_t = DEFAULT_CHUNK_SIZE / MIB)]
    chunk_size: u64,
    /// Concurrent file transfers, and concurrent parts per file
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

impl TransferArgs {
    fn config(&self) -> Result<TransferConfig> {
        let chunk_size = self
            .chunk_size
            .checked_mul(MIB)
            .with_context(|| format!("Chunk size of {} MiB is too large", self.chunk_size))?;
        let config = TransferConfig {
            chunk_size,
            concurrency: self.concurrency,
        };
        if config.chunk_size > 0 && config.chunk_size < MIN_CHUNK_SIZE {
            warn!(
                "Chunk size {} MiB is below the 5 MiB minimum most S3 stores accept",
                self.chunk_size
            );
        }
        Ok(config)
    }
}

fn build_executor(store: Option<StoreTarget>, transfer: TransferConfig) -> Result<Executor> {
    let executor = match store {
        Some(StoreTarget::S3(config)) => {
            let store: Arc<dyn ObjectStore> =
                Arc::new(S3Store::new(&config).context("Failed to configure object store")?);
            Executor::new(store, transfer)?
        }
        Some(StoreTarget::Directory(dir)) => {
            let store = LocalStore::new(&dir)
                .with_context(|| format!("Failed to open store directory {}", dir.display()))?;
            info!("Using directory store {}", store.root().display());
            Executor::new(Arc::new(store), transfer)?
        }
        None => Executor::local(transfer)?,
    };
    Ok(executor)
}

fn require_store(store: &StoreArgs) -> Result<StoreTarget> {
    store
        .target()
        .context("An object store is required: set S3_BUCKET_NAME, --bucket or --store-dir")
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if dry_run {
        println!("Planned {} operation(s) (dry run):", summary.operations.len());
        for op in &summary.operations {
            println!("  {}", op);
        }
        return;
    }

    match &summary.report {
        Some(report) => {
            println!("Completed {} operation(s)", report.completed());
            println!("  Uploaded: {}", report.uploaded);
            println!("  Downloaded: {}", report.downloaded);
            println!("  Copied: {}", report.copied);
            println!("  Deleted: {}", report.deleted);
            println!("  Multipart uploads: {}", report.multipart_sessions);
            println!("  Bytes transferred: {}", report.bytes_transferred);
            if report.signatures_skipped > 0 {
                println!("  Signatures skipped: {}", report.signatures_skipped);
            }
        }
        None => println!("Nothing to do"),
    }
}

fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let summary = match cli.command {
        Commands::Promote {
            repo_name,
            src_repo_path,
            dest_repo_path,
            output_path,
            store,
            transfer,
        } => {
            let layout = RepoLayout {
                repo_name,
                source_dir: src_repo_path,
                dest_dir: dest_repo_path,
                output_dir: output_path,
            };
            let executor = build_executor(store.target(), transfer.config()?)?;
            pipeline::promote(&layout, &executor, cli.dry_run)
                .with_context(|| format!("Promotion of {} failed", layout.repo_name))?
        }
        Commands::Mirror {
            repo_name,
            local_dir,
            store,
            transfer,
        } => {
            let executor = build_executor(Some(require_store(&store)?), transfer.config()?)?;
            pipeline::mirror(&repo_name, &local_dir, &executor, cli.dry_run)
                .with_context(|| format!("Mirror sync of {} failed", repo_name))?
        }
        Commands::Upload {
            output_dir,
            store,
            transfer,
        } => {
            let executor = build_executor(Some(require_store(&store)?), transfer.config()?)?;
            pipeline::upload(&output_dir, &executor, cli.dry_run)
                .with_context(|| format!("Upload of {} failed", output_dir.display()))?
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pkgsync", &mut io::stdout());
            return Ok(());
        }
    };

    print_summary(&summary, cli.dry_run);
    if let Some(path) = &cli.report {
        write_report(path, &summary)?;
    }
    Ok(())
}
