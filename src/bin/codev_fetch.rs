//! codev-fetch: fetch remote artifacts through the local cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use codev_fetch::{
    CacheAwareResourceAccessor, FetchConfig, FileCandidates, ResourceLocation, ResourceRequest,
    Sha1Hash,
};

/// Fetch remote artifacts through the codev cache
#[derive(Parser)]
#[command(name = "codev-fetch")]
#[command(version)]
#[command(about = "Cache-aware fetching of remote build artifacts")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache directory (overrides the configuration file).
    #[arg(long, env = "CODEV_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Make a remote resource available locally and print its path
    Get {
        /// Resource URL
        url: String,
        /// Known SHA-1 of the resource
        #[arg(long)]
        sha1: Option<Sha1Hash>,
        /// Local file that may already hold the content (repeatable)
        #[arg(long = "candidate")]
        candidates: Vec<PathBuf>,
        /// Destination path (default: inside the cache directory)
        #[arg(short, long)]
        dest: Option<PathBuf>,
        /// Revalidate against the origin even if the cached copy is fresh
        #[arg(long)]
        refresh: bool,
        /// Maximum age of cached entries in seconds (0 disables the age check)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },

    /// List cached resources
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = FetchConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.cache_dir {
        config = config.cache_dir(dir);
    }

    match args.command {
        Command::Get {
            url,
            sha1,
            candidates,
            dest,
            refresh,
            max_age_secs,
        } => {
            let refresh_all = config.refresh_all || refresh;
            config = config.refresh_all(refresh_all);
            match max_age_secs {
                Some(0) => config = config.no_max_age(),
                Some(secs) => config = config.max_age(Duration::from_secs(secs)),
                None => {}
            }

            let accessor = CacheAwareResourceAccessor::from_config(config)?;
            let location = ResourceLocation::parse(&url)?;

            let mut request = ResourceRequest::new(location);
            if let Some(sha1) = sha1 {
                request = request.sha1(sha1);
            }
            if let Some(dest) = dest {
                request = request.destination(dest);
            }
            if !candidates.is_empty() {
                let candidates = FileCandidates::new(candidates)
                    .with_checksum_cache(accessor.checksum_cache().clone());
                request = request.candidates(Arc::new(candidates));
            }

            match accessor.get_resource(request).await? {
                Some(resource) => println!("{}", resource.file().display()),
                None => {
                    eprintln!("{url}: not available");
                    std::process::exit(2);
                }
            }
        }

        Command::List => {
            let accessor = CacheAwareResourceAccessor::from_config(config)?;
            let snapshot = accessor.index().snapshot();
            if snapshot.is_empty() {
                println!("cache is empty");
            } else {
                let mut entries: Vec<_> = snapshot.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (location, entry) in entries {
                    println!(
                        "{location} -> {} (cached {})",
                        entry.cached_file.display(),
                        entry.cached_at.to_rfc3339()
                    );
                }
            }
        }
    }

    Ok(())
}
