//! therapy-sync binary entry point.

use std::sync::Arc;

use therapy_sync::api::{serve, AppOptions, AppState};
use therapy_sync::cli::{self, Args};
use therapy_sync::config::Config;
use therapy_sync::media::FsObjectStore;
use therapy_sync::repository::{Fixture, MemoryRepository};
use therapy_sync::{logging, SystemClock};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'therapy-sync --help' for more information.");
            std::process::exit(2);
        }
    };

    if args.help {
        cli::print_help();
        return;
    }
    if args.version {
        cli::print_version();
        return;
    }

    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args)?;
    logging::init_with_filter(config.log_filter())?;

    info!("therapy-sync v{}", env!("CARGO_PKG_VERSION"));

    let repository = match config.repository.fixture {
        Some(ref path) => {
            let fixture = Fixture::from_file(path)?;
            info!(
                sessions = fixture.sessions.len(),
                exercise_sessions = fixture.exercise_sessions.len(),
                "Loaded repository fixture from {}",
                path.display()
            );
            MemoryRepository::from_fixture(fixture)
        }
        None => {
            warn!("No repository fixture configured; every session lookup will miss");
            MemoryRepository::new()
        }
    };

    let objects = FsObjectStore::new(&config.media.storage_dir, &config.media.public_base_url);
    info!("Storing uploaded media under {}", objects.root().display());

    let tokens = config.token_store();
    if tokens.count() == 0 {
        warn!("No auth tokens configured; all API calls will be rejected");
    }

    let state = AppState::with_options(
        Arc::new(repository),
        Arc::new(objects),
        tokens,
        AppOptions {
            clock: Arc::new(SystemClock),
            governor: config.governor_config(),
            media: config.media_config()?,
        },
    );

    serve(config.to_server_config()?, state).await?;
    info!("therapy-sync stopped");
    Ok(())
}
