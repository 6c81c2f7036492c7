use std::sync::Arc;

use tracing::{error, info};

use cloudbox::{
    Backend, Config, DiskStore, FileStore, MemoryStore, SqliteStore, StorageBackend, WebServer,
};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = cloudbox::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        cloudbox::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("cloudbox {}", env!("CARGO_PKG_VERSION"));
    info!(backend = %config.storage.backend, "Opening file store");

    let result = match config.storage.backend {
        StorageBackend::Memory => serve(&config, MemoryStore::new()).await,
        StorageBackend::File => match DiskStore::open(&config.storage.data_dir).await {
            Ok(store) => serve(&config, store).await,
            Err(e) => Err(e),
        },
        StorageBackend::Sqlite => match SqliteStore::open(&config.storage.database_path).await {
            Ok(store) => serve(&config, store).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Run the HTTP server on `store` until shutdown, then close the store.
async fn serve<S: Backend>(config: &Config, store: S) -> cloudbox::Result<()> {
    let store = Arc::new(store);
    let served = match WebServer::new(config, Arc::clone(&store)) {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = store.close().await {
        error!("Failed to close the file store: {}", e);
    }
    served
}
