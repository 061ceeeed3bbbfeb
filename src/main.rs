use clap::{Args, Parser, Subcommand};
use gallery_index::config::{self, SiteConfig};
use gallery_index::imaging::RustCodec;
use gallery_index::index::ContentIndexCache;
use gallery_index::optimize::{BatchRequest, Optimizer};
use gallery_index::output;
use gallery_index::storage::{LocalStorage, Permission, StorageHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "gallery-index")]
#[command(about = "Content index and WebP variant optimizer for photo galleries")]
#[command(long_about = "\
Content index and WebP variant optimizer for photo galleries

Operates on a storage root laid out as:

  site/
  ├── galleries/
  │   ├── family/
  │   │   ├── gallery.yaml         # title, description, cover, order, tags, ...
  │   │   ├── photos.yaml          # per-photo title, description, hidden, order
  │   │   ├── park.jpg             # original
  │   │   └── park_800w.webp       # generated variant
  │   └── trips/japan/             # nested gallery
  ├── posts/hello-world.md         # YAML front matter: title, date, cover, draft
  ├── pages/about.md               # YAML front matter: title, order, showInNav
  └── _cache/
      ├── content-index.json       # index snapshot
      └── optimize-progress.json   # optimization counter

Variants are generated for every ladder width smaller than the original.
'optimize' runs one chunk; pass the returned nextOffset and runId to resume.

Run 'gallery-index gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Path to config.toml (missing file means stock defaults)
    #[arg(
        long,
        short,
        default_value = "config.toml",
        env = "GALLERY_INDEX_CONFIG",
        global = true
    )]
    config: PathBuf,

    /// Storage root, overriding `storage.root`
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build, show or invalidate the content index
    #[command(subcommand)]
    Index(IndexCommand),
    /// Show optimization status
    Status,
    /// Optimize one chunk of images
    Optimize(OptimizeArgs),
    /// Optimize every image, chunk by chunk
    OptimizeAll(OptimizeAllArgs),
    /// Delete variants whose width is no longer in the ladder
    CleanupOldSizes,
    /// Report which storage operations are permitted
    CheckPermissions,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum IndexCommand {
    /// Rescan storage and persist a fresh index
    Build,
    /// Print the current index, building it if needed
    Show {
        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },
    /// Delete the cached index
    Invalidate,
}

#[derive(Args)]
struct OptimizeArgs {
    /// Position in the candidate list
    #[arg(long, default_value_t = 0)]
    offset: usize,
    /// Images in this chunk (default: optimizer.default_limit)
    #[arg(long)]
    limit: Option<usize>,
    /// Delete existing variants before regenerating
    #[arg(long)]
    cleanup: bool,
    /// Run to resume (required when offset > 0)
    #[arg(long)]
    run_id: Option<Uuid>,
}

#[derive(Args)]
struct OptimizeAllArgs {
    /// Images per chunk (default: optimizer.default_limit)
    #[arg(long)]
    limit: Option<usize>,
    /// Delete existing variants before regenerating
    #[arg(long)]
    cleanup: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let site = config::load_config(&cli.config)?;
    let storage = open_storage(&cli, &site)?;
    let index = Arc::new(ContentIndexCache::new(
        storage.clone(),
        site.content.clone(),
        &site.index,
    ));
    let optimizer = Optimizer::new(
        storage.clone(),
        index.clone(),
        RustCodec::new(),
        &site.images,
        &site.optimizer,
    );

    match cli.command {
        Command::Index(IndexCommand::Build) => {
            let snapshot = index.build().await?;
            output::print_index_summary(&snapshot);
        }
        Command::Index(IndexCommand::Show { json }) => {
            let snapshot = index.get().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                output::print_index_summary(&snapshot);
            }
        }
        Command::Index(IndexCommand::Invalidate) => {
            index.invalidate().await?;
            println!("Invalidated {}", index.key());
        }
        Command::Status => {
            output::print_status(&optimizer.status().await?);
        }
        Command::Optimize(args) => {
            let response = optimizer
                .optimize_batch(BatchRequest {
                    offset: args.offset,
                    limit: args.limit,
                    cleanup: args.cleanup,
                    run_id: args.run_id,
                })
                .await?;
            output::print_batch(&response);
            if response.has_more {
                println!(
                    "Next: --offset {} --run-id {}",
                    response.next_offset, response.run_id
                );
            }
        }
        Command::OptimizeAll(args) => {
            let summary = optimizer
                .run_all(args.limit, args.cleanup, output::print_batch)
                .await?;
            output::print_run_summary(&summary);
        }
        Command::CleanupOldSizes => {
            output::print_cleanup(&optimizer.cleanup_old_sizes().await?);
        }
        Command::CheckPermissions => {
            let checks: Vec<_> = Permission::ALL
                .iter()
                .map(|p| (*p, storage.check_permission(*p)))
                .collect();
            output::print_permissions(storage.name(), &checks);
        }
        // Printed before storage is opened.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Local storage rooted at `--root`, else `storage.root` relative to the
/// config file.
fn open_storage(cli: &Cli, site: &SiteConfig) -> Result<StorageHandle, Box<dyn std::error::Error>> {
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| config::storage_root(site, &cli.config));
    let storage = LocalStorage::new("local", &root)?.read_only(site.storage.read_only);
    Ok(Arc::new(storage))
}
